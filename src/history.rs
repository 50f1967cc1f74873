//! Visited-document log: append-only, with backtrack, recall, and
//! next/previous addressing over the same entries.

use crate::types::{Anchor, FollowedLink, Navigation};

/// One successfully loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The numbered link taken from `origin`, when the document was reached
    /// through one.
    pub link: Option<FollowedLink>,
    /// The document displayed when this one was requested.
    pub origin: Option<Anchor>,
    /// The document that was loaded.
    pub visited: Anchor,
}

/// The session's history. Entries are only ever appended, in the order
/// their fetches completed. Going back is a new forward navigation to an
/// older document; the backtrack trail is a stack of entry positions layered
/// over the log.
#[derive(Debug, Default)]
pub struct History {
    /// Every document reached, oldest first.
    entries: Vec<HistoryEntry>,
    /// Positions in `entries` that BACK unwinds through, newest last.
    trail: Vec<usize>,
}

impl History {
    /// Target of BACK: the entry below the top of the trail, or the bottom
    /// of the trail once everything above it has been unwound.
    pub fn backtrack(&self) -> Option<Anchor> {
        if !self.can_backtrack() {
            return None;
        }
        let position = self
            .trail
            .len()
            .checked_sub(2)
            .map_or_else(|| return self.trail.first(), |below_top| return self.trail.get(below_top))?;
        return self.entries.get(*position).map(|entry| return entry.visited);
    }

    /// True iff there is a document other than the latest one to go back to.
    pub fn can_backtrack(&self) -> bool {
        return self.entries.len() >= 2;
    }

    /// True iff the latest document was reached through a numbered link and
    /// its origin has a sibling link `offset` positions away.
    pub fn can_move_by(&self, offset: isize) -> bool {
        return self.move_by(offset).is_some();
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// The link to replay for NEXT (`+1`) or PREVIOUS (`-1`): the origin of
    /// the latest document and the sibling of the link taken out of it.
    /// The library resolves that link to its destination.
    pub fn move_by(&self, offset: isize) -> Option<(Anchor, FollowedLink)> {
        let latest = self.entries.last()?;
        let origin = latest.origin?;
        let sibling = latest.link?.step(offset)?;
        return Some((origin, sibling));
    }

    /// Non-failing accessor for listings: the `n`th entry (one-based), or
    /// `None` past either end.
    pub fn read(&self, n: usize) -> Option<&HistoryEntry> {
        let index = n.checked_sub(1)?;
        return self.entries.get(index);
    }

    /// Document at one-based position `n` of the full log.
    pub fn recall(&self, n: usize) -> Option<Anchor> {
        return self.read(n).map(|entry| return entry.visited);
    }

    /// Append the document a completed navigation arrived at.
    pub fn record(&mut self, visited: Anchor, navigation: Navigation) {
        let (origin, link) = match navigation {
            Navigation::Backtrack | Navigation::Start => (None, None),
            Navigation::Jump { origin } => (origin, None),
            Navigation::Link { link, origin } => (Some(origin), Some(link)),
        };
        let position = self.entries.len();
        self.entries.push(HistoryEntry { link, origin, visited });

        match navigation {
            Navigation::Backtrack if self.trail.len() > 1 => {
                self.trail.pop();
            },
            Navigation::Backtrack if !self.trail.is_empty() => {},
            _ => self.trail.push(position),
        }
        log::debug!("history: recorded entry {} ({navigation:?})", self.len());
    }
}

#[cfg(test)]
#[allow(clippy::missing_assert_message, clippy::missing_panics_doc, reason = "assertions name what they check")]
mod tests {
    use super::*;

    fn link(ordinal: usize, count: usize) -> FollowedLink {
        return FollowedLink { count, ordinal };
    }

    #[test]
    fn read_returns_each_record_in_order_and_none_past_the_end() {
        let mut history = History::default();
        history.record(Anchor(10), Navigation::Start);
        history.record(Anchor(11), Navigation::Jump { origin: Some(Anchor(10)) });
        history.record(Anchor(12), Navigation::Link { link: link(2, 4), origin: Anchor(11) });

        assert_eq!(history.read(1).map(|e| e.visited), Some(Anchor(10)));
        assert_eq!(history.read(2).map(|e| e.origin), Some(Some(Anchor(10))));
        assert_eq!(history.read(3).and_then(|e| e.link), Some(link(2, 4)));
        assert!(history.read(4).is_none());
        assert!(history.read(0).is_none());
    }

    #[test]
    fn backtrack_needs_two_entries() {
        let mut history = History::default();
        assert!(!history.can_backtrack());
        assert_eq!(history.backtrack(), None);

        history.record(Anchor(1), Navigation::Start);
        assert!(!history.can_backtrack());
        assert_eq!(history.backtrack(), None);

        history.record(Anchor(2), Navigation::Jump { origin: Some(Anchor(1)) });
        assert!(history.can_backtrack());
        assert_eq!(history.backtrack(), Some(Anchor(1)));
    }

    #[test]
    fn backtrack_unwinds_like_a_stack_while_the_log_grows() {
        let mut history = History::default();
        history.record(Anchor(1), Navigation::Start);
        history.record(Anchor(2), Navigation::Jump { origin: Some(Anchor(1)) });
        history.record(Anchor(3), Navigation::Jump { origin: Some(Anchor(2)) });

        assert_eq!(history.backtrack(), Some(Anchor(2)));
        history.record(Anchor(2), Navigation::Backtrack);
        assert_eq!(history.len(), 4);

        assert_eq!(history.backtrack(), Some(Anchor(1)));
        history.record(Anchor(1), Navigation::Backtrack);
        assert_eq!(history.len(), 5);

        // Fully unwound: BACK keeps returning to the start document.
        assert_eq!(history.backtrack(), Some(Anchor(1)));
        assert_eq!(history.recall(1), Some(Anchor(1)));
        assert_eq!(history.recall(3), Some(Anchor(3)));
    }

    #[test]
    fn recall_is_one_based_and_bounded() {
        let mut history = History::default();
        history.record(Anchor(7), Navigation::Start);
        history.record(Anchor(8), Navigation::Jump { origin: Some(Anchor(7)) });

        assert_eq!(history.recall(0), None);
        assert_eq!(history.recall(1), Some(Anchor(7)));
        assert_eq!(history.recall(2), Some(Anchor(8)));
        assert_eq!(history.recall(3), None);
    }

    #[test]
    fn move_by_replays_sibling_links_of_the_origin() {
        let mut history = History::default();
        history.record(Anchor(1), Navigation::Start);
        assert!(!history.can_move_by(1));

        history.record(Anchor(5), Navigation::Link { link: link(1, 2), origin: Anchor(1) });
        assert!(history.can_move_by(1));
        assert!(!history.can_move_by(-1));
        assert_eq!(history.move_by(1), Some((Anchor(1), link(2, 2))));

        history.record(Anchor(6), Navigation::Link { link: link(2, 2), origin: Anchor(1) });
        assert!(!history.can_move_by(1));
        assert_eq!(history.move_by(-1), Some((Anchor(1), link(1, 2))));
    }

    #[test]
    fn jumps_and_backtracks_clear_the_step_relation() {
        let mut history = History::default();
        history.record(Anchor(1), Navigation::Start);
        history.record(Anchor(2), Navigation::Link { link: link(1, 3), origin: Anchor(1) });
        history.record(Anchor(1), Navigation::Backtrack);
        assert!(!history.can_move_by(1));
        assert!(!history.can_move_by(-1));
    }
}
