//! Active request registry: every fetch in flight, the one main request
//! whose completion drives the prompt, and the output sink each writes to.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Child;
use std::thread;

use crossbeam_channel::Sender;

use crate::error::Error;
use crate::types::{Anchor, Format, Mode, Navigation, RequestId};

/// A fetch that has been issued and not yet completed, failed, or cancelled.
#[derive(Debug)]
pub struct ActiveRequest {
    /// Rendered text or raw source.
    pub format: Format,
    /// Registry-assigned identifier.
    pub id: RequestId,
    /// Interactive (paged) or batch (dumped whole).
    pub mode: Mode,
    /// How a main request's arrival enters history; `None` for side requests.
    pub navigation: Option<Navigation>,
    /// Where the fetched document goes.
    pub sink: Sink,
    /// The document being fetched, once the library has resolved it.
    pub target: Option<Anchor>,
}

/// Exit of a pipe command that was fed its document off the session thread.
#[derive(Debug)]
pub struct PipeExit {
    /// The command line as given.
    pub command: String,
    /// `Ok` if the document went in whole and the command succeeded.
    pub outcome: Result<(), Error>,
}

/// The tracked set of active requests. Mutated only by the session thread.
#[derive(Debug, Default)]
pub struct Registry {
    /// The request whose completion regenerates the prompt, if any.
    main: Option<RequestId>,
    /// Next identifier to hand out.
    next_id: u64,
    /// Registered requests by identifier.
    requests: BTreeMap<RequestId, ActiveRequest>,
}

/// Private output destination of a request. Side requests never share a
/// sink, so their output cannot interleave.
#[derive(Debug)]
pub enum Sink {
    /// The session's own screen, through the main document.
    Display,
    /// A file opened by SAVE (`>`, `>>`, `>!`).
    File {
        /// Open handle, positioned for writing or appending.
        file: File,
        /// Where it lives, for messages.
        path: PathBuf,
    },
    /// Standard input of a shell command, for `|` and PRINT.
    Pipe {
        /// The running command.
        child: Child,
        /// The command line as given.
        command: String,
    },
    /// A borrowed writer supplied by a non-interactive run.
    Stream,
}

impl Registry {
    /// Allocate and register a request. Interactive requests are paged onto
    /// the display; batch requests are written whole to their sink.
    pub fn create(&mut self, mode: Mode, sink: Sink) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.requests.insert(id, ActiveRequest {
            format: Format::Rendered,
            id,
            mode,
            navigation: None,
            sink,
            target: None,
        });
        log::debug!("thread {id}: created ({mode:?}), {} active", self.requests.len());
        return id;
    }

    /// Unregister and release a request. Unknown identifiers are a no-op.
    pub fn destroy(&mut self, id: RequestId) -> Option<ActiveRequest> {
        if self.main == Some(id) {
            self.main = None;
        }
        let removed = self.requests.remove(&id);
        if removed.is_some() {
            log::debug!("thread {id}: destroyed, {} active", self.requests.len());
        }
        return removed;
    }

    /// Drain the registry at shutdown. Outstanding fetches are abandoned;
    /// their late completions find nothing to deliver to.
    pub fn destroy_all(&mut self) -> usize {
        let drained = self.requests.len();
        self.main = None;
        for (_, request) in std::mem::take(&mut self.requests) {
            log::debug!("thread {}: abandoned at shutdown", request.id);
            request.sink.abandon();
        }
        return drained;
    }

    /// Look up a registered request.
    pub fn get_mut(&mut self, id: RequestId) -> Option<&mut ActiveRequest> {
        return self.requests.get_mut(&id);
    }

    /// True while any request other than the main one is registered.
    pub fn has_side_requests(&self) -> bool {
        return self.requests.keys().any(|id| return Some(*id) != self.main);
    }

    /// True if `id` is the current main request.
    pub fn is_main(&self, id: RequestId) -> bool {
        return self.main == Some(id);
    }

    /// Number of registered requests.
    pub fn len(&self) -> usize {
        return self.requests.len();
    }

    /// Make `id` the main request. A previous main request is abandoned and
    /// returned.
    pub fn set_main(&mut self, id: RequestId) -> Option<ActiveRequest> {
        let previous = self.main.replace(id).filter(|old| return *old != id);
        return previous.and_then(|old| return self.requests.remove(&old));
    }
}

impl Sink {
    /// Drop the sink without waiting on anything. A pipe command still
    /// running is killed.
    pub fn abandon(self) {
        match self {
            Self::Display | Self::Stream => {},
            Self::File { mut file, path } => {
                if let Err(e) = file.flush() {
                    log::warn!("{}: {e}", path.display());
                }
            },
            Self::Pipe { mut child, command } => {
                if let Err(e) = child.kill() {
                    log::debug!("{command}: {e}");
                }
                let _ = child.wait();
            },
        }
    }

    /// Hand a side request's rendered document to the sink. Files are
    /// written here. A pipe command is fed and waited for on its own thread,
    /// which reports the exit on `pipe_done`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if writing a file fails.
    pub fn deliver(self, text: Vec<u8>, pipe_done: &Sender<PipeExit>) -> Result<(), Error> {
        match self {
            Self::Display | Self::Stream => {},
            Self::File { mut file, path } => {
                file.write_all(&text)?;
                file.flush()?;
                log::debug!("saved {} bytes to {}", text.len(), path.display());
            },
            Self::Pipe { child, command } => {
                let pipe_done = pipe_done.clone();
                thread::spawn(move || {
                    let outcome = feed(child, &command, &text);
                    let _ = pipe_done.send(PipeExit { command, outcome });
                });
            },
        }
        return Ok(());
    }

    /// Close the sink of a batch run, waiting for a pipe command to exit.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if flushing or waiting fails, or `Error::Navigation`
    /// carrying the command's exit status when it fails.
    pub fn finish(self) -> Result<(), Error> {
        return match self {
            Self::Display | Self::Stream => Ok(()),
            Self::File { mut file, .. } => Ok(file.flush()?),
            Self::Pipe { child, command } => feed(child, &command, &[]),
        };
    }

    /// Writer for the fetched document, or `None` for the display sink,
    /// which the library paints itself.
    pub fn writer(&mut self) -> Option<&mut dyn Write> {
        return match self {
            Self::Display | Self::Stream => None,
            Self::File { file, .. } => Some(file),
            Self::Pipe { child, .. } => child.stdin.as_mut().map(|stdin| return stdin as &mut dyn Write),
        };
    }
}

/// Write `text` to a command's input, close it, and wait for the command.
/// A command that stops reading early is not an error.
///
/// # Errors
///
/// Returns `Error::Io` if writing or waiting fails, or `Error::Navigation`
/// carrying the exit status when the command fails.
fn feed(mut child: Child, command: &str, text: &[u8]) -> Result<(), Error> {
    let written = child.stdin.take().map_or(Ok(()), |mut stdin| return stdin.write_all(text));
    let status = child.wait()?;
    if let Err(e) = written
        && e.kind() != io::ErrorKind::BrokenPipe
    {
        return Err(Error::Io(e));
    }
    if !status.success() {
        return Err(Error::navigation(format!("  {command}  returns {status}")));
    }
    return Ok(());
}
