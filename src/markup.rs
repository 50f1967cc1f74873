//! Minimal hypertext markup read by the local library.
//!
//! A document is plain text with three conventions: a first line `# Title`
//! names it, `[label](target)` is a numbered link shown as `label[n]`, and a
//! line `<ISINDEX>` marks it as searchable.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Line that marks a document as a searchable index.
const INDEX_MARKER: &str = "<ISINDEX>";

/// `[label](target)` links.
///
/// # Panics
///
/// Panics on first use if the hardcoded pattern is invalid (compile-time invariant).
#[allow(clippy::expect_used, reason = "hardcoded pattern")]
static LINK: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"\[([^\]\n]*)\]\(([^)\s]+)\)").expect("valid regex"));

/// A document as the browser shows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup {
    /// True if the source carried the index marker.
    pub is_index: bool,
    /// Displayed lines, links replaced by their labels.
    pub lines: Vec<String>,
    /// Link targets in order of appearance; link `n` is `links[n - 1]`.
    pub links: Vec<String>,
    /// Declared title.
    pub title: Option<String>,
}

/// Read marked-up text. With `show_anchors` unset, link numbers are left
/// out of the displayed lines; the links still exist.
pub fn parse(source: &str, show_anchors: bool) -> Markup {
    let mut markup = Markup::default();
    let mut seen_text = false;
    for line in source.lines() {
        if line.trim().eq_ignore_ascii_case(INDEX_MARKER) {
            markup.is_index = true;
            continue;
        }
        if !seen_text
            && let Some(title) = line.strip_prefix("# ")
        {
            markup.title = Some(title.trim().to_string());
        }
        seen_text = seen_text || !line.trim().is_empty();

        let rendered = LINK.replace_all(line, |cap: &Captures<'_>| {
            markup.links.push(cap[2].to_string());
            let label = &cap[1];
            if show_anchors {
                return format!("{label}[{}]", markup.links.len());
            }
            return label.to_string();
        });
        markup.lines.push(rendered.into_owned());
    }
    return markup;
}

/// Show source verbatim: no title, links, or index marker are recognised.
pub fn plain(source: &str) -> Markup {
    return Markup {
        is_index: false,
        lines: source.lines().map(str::to_string).collect(),
        links: Vec::new(),
        title: None,
    };
}

/// Build the result document for a keyword search: the index's lines that
/// contain every keyword, ignoring case. Links on matching lines stay links.
pub fn search_results(index_address: &str, source: &str, keywords: &[String]) -> String {
    let wanted: Vec<String> = keywords.iter().map(|k| return k.to_lowercase()).collect();
    let mut out = format!("# Search results for {}\n\n", keywords.join(" "));
    let mut hits = 0_usize;
    for line in source.lines() {
        if line.starts_with("# ") || line.trim().eq_ignore_ascii_case(INDEX_MARKER) {
            continue;
        }
        let lower = line.to_lowercase();
        if wanted.iter().all(|k| return lower.contains(k.as_str())) {
            out.push_str(line);
            out.push('\n');
            hits = hits.saturating_add(1);
        }
    }
    if hits == 0 {
        out.push_str("Nothing in ");
        out.push_str(index_address);
        out.push_str(" matches.\n");
    }
    return out;
}
