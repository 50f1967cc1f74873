/// Core domain types shared by the session, history, and request registry.
use std::fmt;

/// Opaque handle to a retrievable document. Allocated and interpreted only
/// by the library; the session stores, compares, and passes these around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Anchor(
    /// Library-assigned slot.
    pub(crate) usize,
);

/// How a fetched document should be written to an output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Formatted text, as the user sees it on screen.
    Rendered,
    /// The raw bytes as retrieved.
    Source,
}

/// The link a document was reached through: ordinal `ordinal` out of
/// `count` child links of the document it was followed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowedLink {
    /// Number of child links the origin document had.
    pub count: usize,
    /// One-based ordinal of the link that was taken.
    pub ordinal: usize,
}

impl FollowedLink {
    /// The sibling link `offset` positions away, if the origin has one.
    pub fn step(self, offset: isize) -> Option<Self> {
        let ordinal = self.ordinal.checked_add_signed(offset)?;
        if ordinal == 0 || ordinal > self.count {
            return None;
        }
        return Some(Self { count: self.count, ordinal });
    }
}

/// Whether a request drives the visible session or runs unattended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Output goes to a file, pipe, or stdout with no paging.
    Batch,
    /// The main conversational request; output is paged.
    Interactive,
}

/// How a main request's completion should be entered into history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Arrived by going back; pops the backtrack trail.
    Backtrack,
    /// First document of the session.
    Start,
    /// Goto, recall, home, manual, search: a plain jump from `origin`.
    Jump {
        /// The document that was displayed when the jump was issued.
        origin: Option<Anchor>,
    },
    /// Followed a numbered link out of `origin`, directly or by NEXT/PREVIOUS.
    Link {
        /// Which link was taken.
        link: FollowedLink,
        /// The document the link belongs to.
        origin: Anchor,
    },
}

/// Identifier of an active request. Unique for the lifetime of a registry
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(
    /// Monotonic counter value.
    pub(crate) u64,
);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "#{}", self.0);
    }
}
