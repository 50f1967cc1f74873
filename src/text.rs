//! Paged text of a displayed document.

use std::io::{self, Write};

use crate::command::Scroll;

/// Printed under the last page of a document.
pub const END_MARK: &str = "     [End]";

/// A document's lines, wrapped to the page width, with a scroll position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    /// Wrapped lines.
    lines: Vec<String>,
    /// Lines shown per page; one screen row is left for the prompt.
    page: usize,
    /// Index of the first line on the current page.
    top: usize,
}

impl Text {
    /// True if there is a page below the current one.
    pub fn can_scroll_down(&self) -> bool {
        return self.top.saturating_add(self.page) < self.lines.len();
    }

    /// True if there is a page above the current one.
    pub const fn can_scroll_up(&self) -> bool {
        return self.top > 0;
    }

    /// Write the current page, followed by the end mark on the last one.
    ///
    /// # Errors
    ///
    /// Returns any error from writing to `out`.
    pub fn display(&self, out: &mut dyn Write) -> io::Result<()> {
        for line in self.lines.iter().skip(self.top).take(self.page) {
            writeln!(out, "{line}")?;
        }
        if !self.can_scroll_down() {
            writeln!(out, "{END_MARK}")?;
        }
        return Ok(());
    }

    /// Paginate `lines` for a screen `height` rows high and `width` columns wide.
    pub fn new(lines: &[String], height: usize, width: usize) -> Self {
        let lines = lines.iter().flat_map(|line| return wrap(line, width)).collect();
        return Self { lines, page: height.saturating_sub(1).max(1), top: 0 };
    }

    /// Move the scroll position. Moving past either end stays at that end.
    pub fn scroll(&mut self, scroll: Scroll) {
        self.top = match scroll {
            Scroll::Bottom => self.lines.len().saturating_sub(self.page),
            Scroll::Down if self.can_scroll_down() => self.top.saturating_add(self.page),
            Scroll::Down => self.top,
            Scroll::Top => 0,
            Scroll::Up => self.top.saturating_sub(self.page),
        };
    }

    /// Write every line, unpaged.
    ///
    /// # Errors
    ///
    /// Returns any error from writing to `out`.
    pub fn write_all(&self, out: &mut dyn Write) -> io::Result<()> {
        for line in &self.lines {
            writeln!(out, "{line}")?;
        }
        return Ok(());
    }
}

/// Break a line into rows of at most `width` characters, at a blank where
/// one is available.
fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    let mut rest = line.trim_end();
    while rest.chars().count() > width {
        let cut = rest.char_indices().nth(width).map_or(rest.len(), |(offset, _)| return offset);
        let head = rest.get(..cut).unwrap_or(rest);
        let split = if rest.get(cut..).is_some_and(|tail| return tail.starts_with(' ')) {
            cut
        } else {
            head.rfind(' ').filter(|offset| return *offset > 0).unwrap_or(cut)
        };
        rows.push(rest.get(..split).unwrap_or(rest).trim_end().to_string());
        rest = rest.get(split..).unwrap_or_default().trim_start();
    }
    rows.push(rest.to_string());
    return rows;
}
