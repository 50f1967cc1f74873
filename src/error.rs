/// Crate-level error types for the browser session.
use std::path::PathBuf;

/// Every error names the address, file, or input that caused it, so the
/// session can report it on one line and carry on.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A target address is malformed or cannot be resolved against its base.
    #[error("bad address `{address}`: {reason}")]
    Address {
        /// The address as the user or document gave it.
        address: String,
        /// Why it could not be resolved.
        reason: String,
    },

    /// An explicit config file does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// The retrieval layer failed to fetch a resolved document.
    #[error("can't access document `{address}`: {reason}")]
    Fetch {
        /// Address of the document that failed.
        address: String,
        /// Description of the failure.
        reason: String,
    },

    /// Plain `>` refuses to clobber an existing file.
    #[error("{}: File exists", path.display())]
    FileExists {
        /// The file that already exists.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem or a child process.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// A command needs an argument the user did not give.
    #[error("Name of the {what} missing.")]
    MissingArgument {
        /// What was expected, e.g. "new local directory".
        what: &'static str,
    },

    /// A command's precondition does not hold in the current state.
    #[error("{reason}")]
    Navigation {
        /// User-facing explanation.
        reason: String,
    },

    /// The output file for a non-interactive run cannot be opened.
    #[error("can't open file for writing: {}: {source}", path.display())]
    OutputOpen {
        /// The requested output file.
        path: PathBuf,
        /// The underlying open error.
        source: std::io::Error,
    },

    /// Remote guests must type QUIT in full.
    #[error("Please type \"quit\" in full to leave www.")]
    QuitNotInFull,

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// No dispatch rule matched and the document is not searchable.
    #[error("Bad command ({input}), for list of commands type help.")]
    UnrecognizedCommand {
        /// The input line as typed.
        input: String,
    },

    /// `SET` named a setting that does not exist.
    #[error("unknown setting: `{key}`")]
    UnknownSetting {
        /// The offending key.
        key: String,
    },
}

impl Error {
    /// Shorthand for a `Navigation` error.
    pub fn navigation(reason: impl Into<String>) -> Self {
        return Self::Navigation { reason: reason.into() };
    }
}
