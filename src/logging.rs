//! `log` backend: trace to stderr in verbose mode, everything to an
//! optional append-only log file.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{LevelFilter, Log, Metadata, Record};

/// Prefix for trace lines on stderr.
const TRACE_PREFIX: &str = "Line Mode Browser";

/// Shared verbose-mode switch. The session toggles it; the logger reads it.
#[derive(Debug, Clone, Default)]
pub struct Verbosity(Arc<AtomicBool>);

impl Verbosity {
    /// Whether trace output is currently shown.
    pub fn is_on(&self) -> bool {
        return self.0.load(Ordering::Relaxed);
    }

    /// A switch starting in the given state.
    pub fn new(on: bool) -> Self {
        return Self(Arc::new(AtomicBool::new(on)));
    }

    /// Flip verbose mode and return the new state.
    pub fn toggle(&self) -> bool {
        return !self.0.fetch_xor(true, Ordering::Relaxed);
    }
}

/// The process logger.
struct Logger {
    /// Append-only log file, when `-l` was given.
    file: Option<Mutex<File>>,
    /// Verbose switch shared with the session.
    verbosity: Verbosity,
}

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        return self.file.is_some() || self.verbosity.is_on();
    }

    fn flush(&self) {
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            let _ = file.flush();
        }
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if self.verbosity.is_on() {
            eprintln!("{TRACE_PREFIX}: {}", record.args());
        }
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            let _ = writeln!(file, "{} {}: {}", record.level(), record.target(), record.args());
        }
    }
}

/// Install the process logger and return the verbose switch for the
/// session. `log_root` names the log file prefix; the process id is
/// appended so concurrent browsers do not share a file.
pub fn install(verbose: bool, log_root: Option<&str>) -> Verbosity {
    let verbosity = Verbosity::new(verbose);
    let mut open_failure = None;
    let file = log_root.and_then(|root| {
        let name = format!("{root}-{}", std::process::id());
        return match OpenOptions::new().create(true).append(true).open(&name) {
            Ok(file) => Some(Mutex::new(file)),
            Err(e) => {
                open_failure = Some(format!("Can't open log file {name}: {e}"));
                None
            },
        };
    });

    let logger = Logger { file, verbosity: verbosity.clone() };
    if log::set_logger(Box::leak(Box::new(logger))).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
    if let Some(message) = open_failure {
        eprintln!("{TRACE_PREFIX}: {message}");
    }
    return verbosity;
}

#[cfg(test)]
#[allow(clippy::missing_assert_message, clippy::missing_panics_doc, reason = "assertions name what they check")]
mod tests {
    use super::Verbosity;

    #[test]
    fn toggle_flips_and_reports_the_new_state() {
        let verbosity = Verbosity::new(false);
        let shared = verbosity.clone();
        assert!(verbosity.toggle());
        assert!(shared.is_on());
        assert!(!shared.toggle());
        assert!(!verbosity.is_on());
    }
}
