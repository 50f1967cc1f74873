use std::fmt;
use std::path::Path;

use crate::error::Error;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".linemode.toml";

/// Fallback page height when neither the user nor `LINES` says otherwise.
pub const DEFAULT_PAGE_HEIGHT: usize = 24;

/// Default page width, one less than a classic 80-column terminal.
pub const DEFAULT_PAGE_WIDTH: usize = 79;

/// Smallest and largest usable page heights.
const PAGE_HEIGHT_RANGE: (usize, usize) = (5, 200);

/// Smallest and largest usable page widths.
const PAGE_WIDTH_RANGE: (usize, usize) = (10, 150);

/// Browser settings loaded from `.linemode.toml` or an explicit `--config`.
/// Missing keys take the built-in defaults. The same shape is accepted by
/// the SET command as a TOML fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Page shown by `--command-help`.
    pub command_help: String,
    /// Start page when no address is given on the command line.
    pub home: Option<String>,
    /// Target of the MANUAL command.
    pub manual: String,
    /// Page height override; `None` means "ask the terminal".
    pub page_height: Option<usize>,
    /// Page width.
    pub page_width: usize,
    /// Shell command that PRINT pipes the document into.
    pub print_command: String,
    /// Heading printed above the reference list.
    pub ref_heading: String,
}

/// Raw TOML structure. Every key is optional so that files and SET
/// fragments can name only what they change.
#[derive(serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LinemodeTomlConfig {
    command_help: Option<String>,
    home: Option<String>,
    manual: Option<String>,
    page_height: Option<usize>,
    page_width: Option<usize>,
    print_command: Option<String>,
    ref_heading: Option<String>,
}

impl Config {
    /// Apply a TOML fragment on top of the current settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSetting` for keys the browser does not have,
    /// or `Error::TomlDe` if the fragment is malformed.
    pub fn apply(&mut self, fragment: &str) -> Result<(), Error> {
        let table: toml::Table = toml::from_str(fragment)?;
        if let Some(key) = table.keys().find(|key| return !Self::is_known_key(key)) {
            return Err(Error::UnknownSetting { key: key.clone() });
        }
        let raw: LinemodeTomlConfig = toml::Value::Table(table).try_into()?;
        self.merge(raw);
        return Ok(());
    }

    /// Built-in settings.
    fn defaults() -> Self {
        return Self {
            command_help: "http://info.cern.ch/hypertext/WWW/LineMode/Defaults/CommandLine.html".to_string(),
            home: None,
            manual: "http://info.cern.ch/hypertext/WWW/LineMode/Defaults/QuickGuide.html".to_string(),
            page_height: None,
            page_width: DEFAULT_PAGE_WIDTH,
            print_command: "lpr".to_string(),
            ref_heading: "*** References from this document ***".to_string(),
        };
    }

    /// Keys accepted in config files and SET fragments.
    fn is_known_key(key: &str) -> bool {
        return matches!(
            key,
            "command_help" | "home" | "manual" | "page_height" | "page_width" | "print_command" | "ref_heading"
        );
    }

    /// Load settings. An explicit path must exist; without one, `.linemode.toml`
    /// in `root` is used if present and defaults otherwise. A file that exists
    /// but is malformed is always an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if an explicit path is missing,
    /// `Error::Io` if reading fails, or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, Error> {
        let path = explicit.map_or_else(|| return root.join(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        let mut config = Self::defaults();
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let raw: LinemodeTomlConfig = toml::from_str(&content)?;
                config.merge(raw);
                log::debug!("config: loaded {}", path.display());
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit.is_some() {
                    return Err(Error::ConfigNotFound { path });
                }
            },
            Err(e) => return Err(Error::Io(e)),
        }

        if let Ok(command) = std::env::var("WWW_PRINT_COMMAND") {
            config.print_command = command;
        }
        return Ok(config);
    }

    /// Overwrite every field the raw config names.
    fn merge(&mut self, raw: LinemodeTomlConfig) {
        if let Some(command_help) = raw.command_help {
            self.command_help = command_help;
        }
        if raw.home.is_some() {
            self.home = raw.home;
        }
        if let Some(manual) = raw.manual {
            self.manual = manual;
        }
        if let Some(height) = raw.page_height {
            self.page_height = Some(clamp_page_height(height));
        }
        if let Some(width) = raw.page_width {
            self.page_width = clamp_page_width(width);
        }
        if let Some(print_command) = raw.print_command {
            self.print_command = print_command;
        }
        if let Some(ref_heading) = raw.ref_heading {
            self.ref_heading = ref_heading;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        return Self::defaults();
    }
}

impl fmt::Display for Config {
    /// Render as TOML, the same form SET accepts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "command_help = {:?}", self.command_help)?;
        if let Some(home) = &self.home {
            writeln!(f, "home = {home:?}")?;
        }
        writeln!(f, "manual = {:?}", self.manual)?;
        if let Some(height) = self.page_height {
            writeln!(f, "page_height = {height}")?;
        }
        writeln!(f, "page_width = {}", self.page_width)?;
        writeln!(f, "print_command = {:?}", self.print_command)?;
        return writeln!(f, "ref_heading = {:?}", self.ref_heading);
    }
}

/// Clamp a page height into the usable range.
pub fn clamp_page_height(height: usize) -> usize {
    return height.clamp(PAGE_HEIGHT_RANGE.0, PAGE_HEIGHT_RANGE.1);
}

/// Clamp a page width into the usable range.
pub fn clamp_page_width(width: usize) -> usize {
    return width.clamp(PAGE_WIDTH_RANGE.0, PAGE_WIDTH_RANGE.1);
}
