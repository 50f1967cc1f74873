//! Prompt composer: the one-line list of commands legal right now.

/// Rendered width above which the Quit hint is left out.
const QUIT_HINT_BUDGET: usize = 47;

/// Everything the prompt depends on. Two equal states render equal prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools, reason = "each flag is an independent prompt clause")]
pub struct PromptState {
    /// History has a document to go back to.
    pub can_backtrack: bool,
    /// The current page is not the last.
    pub can_scroll_down: bool,
    /// The current page is not the first.
    pub can_scroll_up: bool,
    /// PREVIOUS would replay a sibling link.
    pub can_step_back: bool,
    /// NEXT would replay a sibling link.
    pub can_step_forward: bool,
    /// The document accepts keyword search.
    pub is_index: bool,
    /// Numbered links in the document.
    pub link_count: usize,
}

/// Render the prompt, terminated by a newline. Clauses appear in a fixed
/// order, each only when its condition holds.
pub fn compose(state: &PromptState) -> String {
    let mut clauses: Vec<String> = Vec::new();
    if state.is_index {
        clauses.push("FIND <keywords>".to_string());
    }
    match state.link_count {
        0 => {},
        1 => clauses.push("1".to_string()),
        n => clauses.push(format!("1-{n}")),
    }
    if state.can_backtrack {
        clauses.push("Back".to_string());
    }
    if state.can_step_forward {
        clauses.push("Next".to_string());
    }
    if state.can_step_back {
        clauses.push("Previous".to_string());
    }
    if state.can_scroll_up {
        clauses.push("Up".to_string());
    }
    if state.can_scroll_down {
        clauses.push("<RETURN> for more".to_string());
    }

    let mut prompt = String::new();
    for clause in &clauses {
        prompt.push_str(clause);
        prompt.push_str(", ");
    }
    if prompt.len() <= QUIT_HINT_BUDGET {
        prompt.push_str("Quit, ");
    }
    prompt.push_str("or Help: \n");
    return prompt;
}
