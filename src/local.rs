//! Document library over the local filesystem. Files are read as markup,
//! directories are listed as links, and `index?kw+kw` addresses search an
//! index document. Fetches run on worker threads.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::thread;

use crossbeam_channel::Sender;
use walkdir::WalkDir;

use crate::command::Scroll;
use crate::error::Error;
use crate::library::{Completion, Library};
use crate::markup::{self, Markup};
use crate::text::Text;
use crate::types::{Anchor, Format, RequestId};

/// Scheme prefix accepted for local documents.
const FILE_SCHEME: &str = "file";

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Location {
    /// A file or directory.
    File(PathBuf),
    /// A keyword search of an index file.
    Query {
        /// The index searched.
        index: PathBuf,
        /// Keywords, all of which must match.
        keywords: Vec<String>,
    },
    /// An address with a scheme this library has no access method for.
    Remote(String),
}

/// A document that has been fetched and is ready to display.
#[derive(Debug)]
struct Presented {
    /// Accepts keyword search.
    is_index: bool,
    /// Lines as displayed, before wrapping.
    lines: Vec<String>,
    /// Resolved link destinations; `None` where the target was malformed.
    links: Vec<Option<Anchor>>,
    /// Paged view of `lines`.
    text: Text,
    /// Declared title.
    title: Option<String>,
}

/// Local-filesystem library.
#[derive(Debug)]
pub struct LocalLibrary {
    /// Handle for each location seen so far.
    anchors: HashMap<Location, Anchor>,
    /// Presented documents by handle.
    documents: HashMap<Anchor, Presented>,
    /// Location of each handle; `Anchor(n)` is `locations[n]`.
    locations: Vec<Location>,
    /// Screen rows per page, prompt included.
    page_height: usize,
    /// Screen columns.
    page_width: usize,
    /// Show `[n]` after link labels.
    show_anchors: bool,
}

impl LocalLibrary {
    /// Directory relative addresses are taken from.
    ///
    /// # Errors
    ///
    /// Returns `Error::Address` if there is no base and the working directory
    /// cannot be determined.
    fn base_dir(&self, base: Option<Anchor>) -> Result<PathBuf, Error> {
        let location = base.and_then(|anchor| return self.locations.get(anchor.0));
        let dir = match location {
            Some(Location::File(path)) if path.is_dir() => Some(path.clone()),
            Some(Location::File(path) | Location::Query { index: path, .. }) => path.parent().map(Path::to_path_buf),
            Some(Location::Remote(_)) | None => None,
        };
        if let Some(dir) = dir {
            return Ok(dir);
        }
        return std::env::current_dir().map_err(|e| {
            return Error::Address { address: String::new(), reason: format!("no working directory: {e}") };
        });
    }

    /// Return the handle for `location`, allocating one the first time.
    fn intern(&mut self, location: Location) -> Anchor {
        if let Some(anchor) = self.anchors.get(&location) {
            return *anchor;
        }
        let anchor = Anchor(self.locations.len());
        self.locations.push(location.clone());
        self.anchors.insert(location, anchor);
        return anchor;
    }

    /// A library paging for a `page_height` by `page_width` screen.
    pub fn new(page_height: usize, page_width: usize, show_anchors: bool) -> Self {
        return Self {
            anchors: HashMap::new(),
            documents: HashMap::new(),
            locations: Vec::new(),
            page_height,
            page_width,
            show_anchors,
        };
    }

    /// Read fetched bytes as markup or source.
    fn read(&self, body: &[u8], format: Format) -> Markup {
        let source = String::from_utf8_lossy(body);
        return match format {
            Format::Rendered => markup::parse(&source, self.show_anchors),
            Format::Source => markup::plain(&source),
        };
    }
}

impl Library for LocalLibrary {
    fn address(&self, doc: Anchor) -> String {
        return match self.locations.get(doc.0) {
            Some(Location::File(path)) => path.display().to_string(),
            Some(Location::Query { index, keywords }) => format!("{}?{}", index.display(), keywords.join("+")),
            Some(Location::Remote(address)) => address.clone(),
            None => String::new(),
        };
    }

    fn can_scroll_down(&self, doc: Anchor) -> bool {
        return self.documents.get(&doc).is_some_and(|presented| return presented.text.can_scroll_down());
    }

    fn can_scroll_up(&self, doc: Anchor) -> bool {
        return self.documents.get(&doc).is_some_and(|presented| return presented.text.can_scroll_up());
    }

    fn child_link(&self, doc: Anchor, n: usize) -> Option<Anchor> {
        let presented = self.documents.get(&doc)?;
        return presented.links.get(n.checked_sub(1)?).copied().flatten();
    }

    fn child_link_count(&self, doc: Anchor) -> usize {
        return self.documents.get(&doc).map_or(0, |presented| return presented.links.len());
    }

    fn display(&self, doc: Anchor, out: &mut dyn Write) -> io::Result<()> {
        return self.documents.get(&doc).map_or(Ok(()), |presented| return presented.text.display(out));
    }

    fn fetch(&mut self, doc: Anchor, request: RequestId, done: &Sender<Completion>) {
        let location = self.locations.get(doc.0).cloned();
        let address = self.address(doc);
        let done = done.clone();
        log::debug!("thread {request}: fetching {address}");
        thread::spawn(move || {
            let outcome = location
                .map_or_else(|| return Err("unknown document".to_string()), |location| return load(&location, &address));
            let _ = done.send(Completion { anchor: doc, outcome, request });
        });
    }

    fn is_index(&self, doc: Anchor) -> bool {
        return self.documents.get(&doc).is_some_and(|presented| return presented.is_index);
    }

    fn present(&mut self, doc: Anchor, body: &[u8], format: Format) {
        let markup = self.read(body, format);
        let mut links = Vec::with_capacity(markup.links.len());
        for target in &markup.links {
            match self.resolve(target, Some(doc)) {
                Ok(anchor) => links.push(Some(anchor)),
                Err(e) => {
                    log::warn!("{e}");
                    links.push(None);
                },
            }
        }
        let text = Text::new(&markup.lines, self.page_height, self.page_width);
        self.documents.insert(doc, Presented {
            is_index: markup.is_index,
            lines: markup.lines,
            links,
            text,
            title: markup.title,
        });
    }

    fn render(&self, _doc: Anchor, body: &[u8], format: Format, out: &mut dyn Write) -> io::Result<()> {
        if format == Format::Source {
            return out.write_all(body);
        }
        let markup = self.read(body, format);
        return Text::new(&markup.lines, self.page_height, self.page_width).write_all(out);
    }

    fn resolve(&mut self, address: &str, base: Option<Anchor>) -> Result<Anchor, Error> {
        let bad = |reason: &str| {
            return Error::Address { address: address.to_string(), reason: reason.to_string() };
        };
        if address.is_empty() {
            return Err(bad("empty address"));
        }
        if address.contains(char::is_whitespace) {
            return Err(bad("addresses cannot contain blanks"));
        }

        let local = match scheme(address) {
            Some(scheme) if scheme.eq_ignore_ascii_case(FILE_SCHEME) => {
                let rest = address.get(scheme.len().saturating_add(1)..).unwrap_or_default();
                rest.strip_prefix("//").unwrap_or(rest)
            },
            Some(_) => return Ok(self.intern(Location::Remote(address.to_string()))),
            None => address,
        };

        let (path, query) = local.split_once('?').map_or((local, None), |(path, query)| return (path, Some(query)));
        let path = Path::new(path);
        let joined = if path.is_absolute() { path.to_path_buf() } else { self.base_dir(base)?.join(path) };
        let path = normalize_path(&joined);

        let keywords: Vec<String> = query
            .unwrap_or_default()
            .split('+')
            .filter(|word| return !word.is_empty())
            .map(str::to_string)
            .collect();
        let location =
            if keywords.is_empty() { Location::File(path) } else { Location::Query { index: path, keywords } };
        return Ok(self.intern(location));
    }

    fn scroll(&mut self, doc: Anchor, scroll: Scroll, out: &mut dyn Write) -> io::Result<()> {
        let Some(presented) = self.documents.get_mut(&doc) else {
            return Ok(());
        };
        presented.text.scroll(scroll);
        return presented.text.display(out);
    }

    fn search(&mut self, keywords: &str, doc: Anchor) -> Result<Anchor, Error> {
        let index = match self.locations.get(doc.0) {
            Some(Location::File(path)) if self.is_index(doc) => path.clone(),
            _ => return Err(Error::navigation(format!("{} is not a searchable index", self.address(doc)))),
        };
        let keywords: Vec<String> = keywords.split_whitespace().map(str::to_string).collect();
        if keywords.is_empty() {
            return Ok(doc);
        }
        return Ok(self.intern(Location::Query { index, keywords }));
    }

    fn set_page_size(&mut self, height: usize, width: usize) {
        self.page_height = height;
        self.page_width = width;
        for presented in self.documents.values_mut() {
            presented.text = Text::new(&presented.lines, height, width);
        }
    }

    fn title(&self, doc: Anchor) -> Option<String> {
        return self.documents.get(&doc).and_then(|presented| return presented.title.clone());
    }

    fn write_all(&self, doc: Anchor, out: &mut dyn Write) -> io::Result<()> {
        return self.documents.get(&doc).map_or(Ok(()), |presented| return presented.text.write_all(out));
    }
}

/// Markup for a directory: one link per entry, sorted by name.
///
/// # Errors
///
/// Returns the reason the directory could not be read.
fn list_directory(dir: &Path) -> Result<String, String> {
    let mut out = format!("# Directory {}\n\n", dir.display());
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| return e.to_string())?;
        let name = entry.file_name().to_string_lossy();
        let suffix = if entry.file_type().is_dir() { "/" } else { "" };
        let _ = writeln!(out, "[{name}{suffix}]({})", entry.path().display());
    }
    return Ok(out);
}

/// Read a location's bytes. Runs on a fetch worker.
///
/// # Errors
///
/// Returns a one-line reason on failure.
fn load(location: &Location, address: &str) -> Result<Vec<u8>, String> {
    return match location {
        Location::File(path) if path.is_dir() => list_directory(path).map(String::into_bytes),
        Location::File(path) => std::fs::read(path).map_err(|e| return e.to_string()),
        Location::Query { index, keywords } => {
            let source = std::fs::read_to_string(index).map_err(|e| return e.to_string())?;
            Ok(markup::search_results(address, &source, keywords).into_bytes())
        },
        Location::Remote(address) => {
            let scheme = scheme(address).unwrap_or_default();
            Err(format!("no access method for `{scheme}`"))
        },
    };
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else if !matches!(components.last(), Some(Component::RootDir)) {
                    components.push(component);
                }
            },
            other => components.push(other),
        }
    }
    return components.iter().collect();
}

/// URL scheme of an address, if it has one.
fn scheme(address: &str) -> Option<&str> {
    let (scheme, _) = address.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| return c.is_ascii_alphabetic())
        && chars.all(|c| return c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
    return valid.then_some(scheme);
}
