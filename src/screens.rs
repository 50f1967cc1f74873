//! Text screens the session prints on request: help, the recall list, and
//! the reference list.

use std::fmt::Write as _;

use crate::prompt::PromptState;

/// What the help screen needs to know beyond the prompt state.
#[derive(Debug, Clone, Copy)]
pub struct HelpContext<'a> {
    /// Address of the current document.
    pub address: &'a str,
    /// Title of the current document.
    pub title: Option<&'a str>,
    /// Local user; shell, save, and directory commands are listed.
    pub trusted: bool,
    /// Verbose mode is on.
    pub verbose: bool,
}

/// Help screen listing exactly the commands legal in `state`.
pub fn help(state: &PromptState, context: &HelpContext<'_>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "\n\nLine Mode Browser version {}   COMMANDS AVAILABLE\n\n",
        env!("CARGO_PKG_VERSION")
    );
    let reading = context.title.map_or_else(
        || return format!("You are reading a document whose address is\n    '{}' \n\n", context.address),
        |title| return format!("You are reading\n \"{title}\"\nwhose address is\n  {}\n\n", context.address),
    );
    out.push_str(&reading);

    if state.can_scroll_down {
        out.push_str("  <RETURN>        Move down one page within the document.\n");
        out.push_str("  BOttom          Go to the last page of the document.\n");
    }
    if state.can_scroll_up {
        out.push_str("  Top             Return to the first page of the document.\n");
        out.push_str("  Up              Move up one page within the document\n");
    }
    if state.link_count > 0 {
        out.push_str("  List            List the references from this document. *\n");
        let _ = writeln!(
            out,
            "  <number>        Select a referenced document by number (from 1 to {}).",
            state.link_count
        );
    }
    if state.is_index {
        out.push_str("  Find <words>    Search this index for given words (separated by spaces).\n");
    }
    if state.can_backtrack {
        out.push_str("  Recall          List visited documents.\n");
        out.push_str("  Recall <number> Return to a previously visited document\n");
        out.push_str("                  as numbered in the recall list.\n");
        out.push_str("  HOme            Return to the starting document.\n");
        out.push_str("  Back            Move back to the last document.\n");
    }
    if state.can_step_forward {
        out.push_str("  Next            Take next link from last document.\n");
    }
    if state.can_step_back {
        out.push_str("  Previous        Take previous link from last document.\n");
    }
    out.push_str("  REFresh         Refresh screen with current document\n");
    out.push_str("  Go <address>    Go to document of given [relative] address\n");

    if context.trusted {
        out.push_str("  PRInt           Print text of this document. *\n");
        out.push_str("  ! <command>     Execute shell <command> without leaving.\n");
        out.push_str("  > <file>        Save the text of this document in <file>. *\n");
        out.push_str("                  If <file> exists use '>!' to overwrite it.\n");
        out.push_str("  >> <file>       Append the text of this document to <file>. *\n");
        out.push_str("  | <command>     Pipe this document to the shell <command>. *\n");
        out.push_str("  CD <directory>  Change local working directory.\n");
        out.push_str("* Prefix these commands with \"Source \" to use raw source.\n\n");
    }

    out.push_str("  Ps              Print text of this document to Terminal's Slave printer.\n");
    let _ = writeln!(out, "  Verbose         Switch to {}verbose mode.", if context.verbose { "non-" } else { "" });
    out.push_str("  SEt <setting>   Change a setting, e.g. SEt page_width = 60; SEt alone lists them.\n");
    out.push_str("  Help            Display this page.\n");
    out.push_str("  Manual          Jump to the online manual for this program\n");
    out.push_str("  Quit            Leave the www program.\n");
    out.push('\n');
    return out;
}

/// The recall list: every visited document, numbered from one.
pub fn recall_list(labels: &[String]) -> String {
    let mut out = String::from("\n  Documents you have visited:-\n\n");
    for (n, label) in labels.iter().enumerate() {
        let _ = writeln!(out, "R {:2})   {label}", n.saturating_add(1));
    }
    out.push('\n');
    return out;
}

/// The reference list of the current document under `heading`.
pub fn reference_list(heading: &str, labels: &[String]) -> String {
    if labels.is_empty() {
        return "\n\nThere are no references from this document.\n\n".to_string();
    }
    let mut out = format!("\n{heading}\n");
    for (n, label) in labels.iter().enumerate() {
        let _ = writeln!(out, "[{}] {label}", n.saturating_add(1));
    }
    return out;
}
