//! Non-interactive runs: fetch one document, write it whole to a file or
//! standard output, optionally followed by its reference list.

use std::io::{self, Write};

use crate::config::DEFAULT_PAGE_HEIGHT;
use crate::error::Error;
use crate::library::Library;
use crate::markup;
use crate::registry::{Registry, Sink};
use crate::screens;
use crate::text::Text;
use crate::types::{Format, Mode};

/// How a batch run writes its document.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Rendered text or raw source.
    pub format: Format,
    /// Append the reference list after the document.
    pub list_references: bool,
    /// Heading of the reference list.
    pub ref_heading: String,
}

/// Render marked-up text read from standard input.
///
/// # Errors
///
/// Returns any error from writing to `out`.
pub fn filter(source: &str, format: Format, show_anchors: bool, page_width: usize, out: &mut dyn Write) -> io::Result<()> {
    if format == Format::Source {
        return out.write_all(source.as_bytes());
    }
    let markup = markup::parse(source, show_anchors);
    return Text::new(&markup.lines, DEFAULT_PAGE_HEIGHT, page_width).write_all(out);
}

/// Fetch `address` (searched for `keywords` when given) and write it into
/// `sink`, or to standard output for `Sink::Stream`.
///
/// # Errors
///
/// Returns `Error::Address` or `Error::Fetch` if the document cannot be
/// loaded, and `Error::Io` if writing fails.
pub fn run<L: Library>(
    library: &mut L,
    address: &str,
    keywords: &[String],
    options: &BatchOptions,
    sink: Sink,
) -> Result<(), Error> {
    let address = if keywords.is_empty() { address.to_string() } else { format!("{address}?{}", keywords.join("+")) };
    let target = library.resolve(&address, None)?;

    let mut registry = Registry::default();
    let (done, inbox) = crossbeam_channel::unbounded();
    let id = registry.create(Mode::Batch, sink);
    if let Some(request) = registry.get_mut(id) {
        request.format = options.format;
        request.target = Some(target);
    }
    library.fetch(target, id, &done);

    let completion = inbox
        .recv()
        .map_err(|e| return Error::Fetch { address: address.clone(), reason: e.to_string() })?;
    let request = registry
        .destroy(completion.request)
        .ok_or_else(|| return Error::Fetch { address: address.clone(), reason: "request lost".to_string() })?;
    log::debug!("batch: {} requests left", registry.len());
    let body = completion
        .outcome
        .map_err(|reason| return Error::Fetch { address: library.address(target), reason })?;

    let mut sink = request.sink;
    let mut stdout = io::stdout().lock();
    {
        let writer: &mut dyn Write = sink.writer().unwrap_or(&mut stdout);
        library.render(target, &body, options.format, writer)?;
        if options.list_references {
            library.present(target, &body, options.format);
            let labels: Vec<String> = (1..=library.child_link_count(target))
                .map(|n| {
                    return library.child_link(target, n).map_or_else(
                        || return "(unusable address)".to_string(),
                        |child| return library.address(child),
                    );
                })
                .collect();
            writer.write_all(screens::reference_list(&options.ref_heading, &labels).as_bytes())?;
        }
        writer.flush()?;
    }
    return sink.finish();
}

#[cfg(test)]
#[allow(clippy::missing_assert_message, clippy::missing_panics_doc, reason = "assertions name what they check")]
mod tests {
    use std::fs::File;

    use super::*;
    use crate::local::LocalLibrary;

    fn options(format: Format, list_references: bool) -> BatchOptions {
        return BatchOptions { format, list_references, ref_heading: "Refs".to_string() };
    }

    #[test]
    fn writes_the_whole_document_with_references() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "# Doc\nOne [two](two.txt)\n").unwrap();
        let out_path = dir.path().join("out.txt");
        let sink = Sink::File { file: File::create(&out_path).unwrap(), path: out_path.clone() };

        let mut library = LocalLibrary::new(5, 79, true);
        run(&mut library, doc.to_str().unwrap(), &[], &options(Format::Rendered, true), sink).unwrap();

        let written = std::fs::read_to_string(&out_path).unwrap();
        let expected = format!("# Doc\nOne two[1]\n\nRefs\n[1] {}\n", dir.path().join("two.txt").display());
        assert_eq!(written, expected);
    }

    #[test]
    fn source_format_writes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.txt");
        std::fs::write(&doc, "# Doc\n[x](y.txt)\n").unwrap();
        let out_path = dir.path().join("out.txt");
        let sink = Sink::File { file: File::create(&out_path).unwrap(), path: out_path.clone() };

        let mut library = LocalLibrary::new(24, 79, true);
        run(&mut library, doc.to_str().unwrap(), &[], &options(Format::Source, false), sink).unwrap();
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "# Doc\n[x](y.txt)\n");
    }

    #[test]
    fn unreachable_document_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = LocalLibrary::new(24, 79, true);
        let missing = dir.path().join("missing.txt");
        let result = run(&mut library, missing.to_str().unwrap(), &[], &options(Format::Rendered, false), Sink::Stream);
        assert!(matches!(result, Err(Error::Fetch { .. })));
    }

    #[test]
    fn filter_renders_markup() {
        let mut out = Vec::new();
        filter("# T\nsee [x](y)\n", Format::Rendered, false, 79, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "# T\nsee x\n");
    }
}
