//! Contract between the session and the document library: address
//! resolution, asynchronous fetching, and the displayed-document accessors.

use std::io::{self, Write};

use crossbeam_channel::Sender;

use crate::command::Scroll;
use crate::error::Error;
use crate::types::{Anchor, Format, RequestId};

/// Terminal status of one fetch, delivered to the session's event queue.
#[derive(Debug)]
pub struct Completion {
    /// The document that was fetched.
    pub anchor: Anchor,
    /// Raw bytes on success, a reason on failure.
    pub outcome: Result<Vec<u8>, String>,
    /// The request the fetch was issued for.
    pub request: RequestId,
}

/// A source of documents. The session owns one and only ever calls it from
/// its own thread; fetches report back through the completion sender.
pub trait Library {
    /// Printable address of a document.
    fn address(&self, doc: Anchor) -> String;

    /// True if the displayed text of `doc` has a page below the current one.
    fn can_scroll_down(&self, doc: Anchor) -> bool;

    /// True if the displayed text of `doc` has a page above the current one.
    fn can_scroll_up(&self, doc: Anchor) -> bool;

    /// Destination of numbered link `n` (one-based) of a presented document.
    fn child_link(&self, doc: Anchor, n: usize) -> Option<Anchor>;

    /// Number of numbered links in a presented document.
    fn child_link_count(&self, doc: Anchor) -> usize;

    /// Paint the current page of a presented document.
    ///
    /// # Errors
    ///
    /// Returns any error from writing to `out`.
    fn display(&self, doc: Anchor, out: &mut dyn Write) -> io::Result<()>;

    /// Start fetching `doc` for `request`. Never blocks; the outcome arrives
    /// later as a `Completion` on `done`.
    fn fetch(&mut self, doc: Anchor, request: RequestId, done: &Sender<Completion>);

    /// True if a presented document accepts keyword search.
    fn is_index(&self, doc: Anchor) -> bool;

    /// Make fetched bytes the displayed text of `doc`, starting at its top.
    fn present(&mut self, doc: Anchor, body: &[u8], format: Format);

    /// Write a whole document, as fetched, to a batch sink.
    ///
    /// # Errors
    ///
    /// Returns any error from writing to `out`.
    fn render(&self, doc: Anchor, body: &[u8], format: Format, out: &mut dyn Write) -> io::Result<()>;

    /// Turn an absolute or relative address into a document handle. The
    /// same address always yields the same handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Address` if the address is malformed.
    fn resolve(&mut self, address: &str, base: Option<Anchor>) -> Result<Anchor, Error>;

    /// Move within a presented document and paint the page moved to.
    ///
    /// # Errors
    ///
    /// Returns any error from writing to `out`.
    fn scroll(&mut self, doc: Anchor, scroll: Scroll, out: &mut dyn Write) -> io::Result<()>;

    /// The document holding the results of searching index `doc` for
    /// `keywords`. Fetching it performs the search.
    ///
    /// # Errors
    ///
    /// Returns `Error::Navigation` if `doc` is not an index.
    fn search(&mut self, keywords: &str, doc: Anchor) -> Result<Anchor, Error>;

    /// Change the page geometry used for subsequent presentation.
    fn set_page_size(&mut self, height: usize, width: usize);

    /// Title of a presented document, if it declares one.
    fn title(&self, doc: Anchor) -> Option<String>;

    /// Write every page of a presented document, without pausing.
    ///
    /// # Errors
    ///
    /// Returns any error from writing to `out`.
    fn write_all(&self, doc: Anchor, out: &mut dyn Write) -> io::Result<()>;
}
