//! Navigation dispatcher: turns one line of user input into a `Command`
//! value. Pure; performs no I/O and consults only the `Context` snapshot.

use std::path::PathBuf;

use crate::error::Error;

/// Characters that separate words on the command line.
const WORD_SEPARATORS: &[char] = &[' ', '\t', '\n', '\r'];

/// Keyword commands in matching priority order. A typed word selects the
/// first enabled entry it is a case-insensitive prefix of.
const KEYWORDS: &[(&str, Keyword, Gate)] = &[
    ("BACK", Keyword::Back, Gate::Always),
    ("BOTTOM", Keyword::Bottom, Gate::Always),
    ("CD", Keyword::ChangeDirectory, Gate::Trusted),
    ("DOWN", Keyword::Down, Gate::Always),
    ("EXIT", Keyword::Exit, Gate::Always),
    ("FIND", Keyword::Find, Gate::Index),
    ("GOTO", Keyword::Goto, Gate::Always),
    ("HELP", Keyword::Help, Gate::Always),
    ("HOME", Keyword::Home, Gate::Always),
    ("KEYWORDS", Keyword::Find, Gate::Index),
    ("LIST", Keyword::List, Gate::Always),
    ("LCD", Keyword::ChangeDirectory, Gate::Trusted),
    ("MANUAL", Keyword::Manual, Gate::Always),
    ("NEXT", Keyword::Next, Gate::Always),
    ("PREVIOUS", Keyword::Previous, Gate::Always),
    ("PRINT", Keyword::Print, Gate::Trusted),
    ("PS", Keyword::SlavePrint, Gate::Always),
    ("QUIT", Keyword::Quit, Gate::Always),
    ("RECALL", Keyword::Recall, Gate::Always),
    ("RETURN", Keyword::Exit, Gate::Always),
    ("REFRESH", Keyword::Refresh, Gate::Always),
    ("SET", Keyword::Set, Gate::Always),
    ("TOP", Keyword::Top, Gate::Always),
    ("UP", Keyword::Up, Gate::Always),
    ("VERBOSE", Keyword::Verbose, Gate::Always),
];

/// Modifier word that switches the command after it to raw source.
const SOURCE_MODIFIER: &str = "SOURCE";

/// What the session should do in response to one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Load the document BACK leads to.
    Back,
    /// Change the local working directory.
    ChangeDirectory(String),
    /// Load an address, relative to the current document.
    Goto(String),
    /// Show the help screen.
    Help,
    /// Return to the first document.
    Home,
    /// Abandon everything and terminate.
    Interrupt,
    /// Follow numbered link `n` of the current document.
    Link(usize),
    /// Print the reference list.
    List,
    /// Load the online manual.
    Manual,
    /// Nothing to do beyond re-prompting.
    Noop,
    /// Feed the current document into a shell command.
    Pipe(String),
    /// Feed the current document into the configured print command.
    Print,
    /// Leave the browser.
    Quit,
    /// Recall entry `n` of history, or list history when `None`.
    Recall(Option<usize>),
    /// Redisplay the current page.
    Refresh,
    /// Save the current document into a file.
    Save {
        /// How an existing file is treated.
        mode: SaveMode,
        /// Target file.
        path: PathBuf,
    },
    /// Move within the current document.
    Scroll(Scroll),
    /// Keyword search of the current index document.
    Search(String),
    /// Change a setting (TOML fragment), or show settings when empty.
    Set(String),
    /// Run a shell command.
    Shell(String),
    /// Write the whole document to the terminal's slave printer.
    SlavePrint,
    /// Take the next (`1`) or previous (`-1`) link from the last document.
    Step(isize),
    /// Toggle verbose mode.
    Verbose,
}

/// A parsed command: the action plus the SOURCE modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// What to do.
    pub action: Action,
    /// SOURCE was given: save, pipe, print, and list use raw source.
    pub source: bool,
}

/// The state the dispatcher interprets input against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// The current document accepts keyword search.
    pub is_index: bool,
    /// Number of numbered links in the current document.
    pub link_count: usize,
    /// Local user (not a remote guest): shell, pipe, print, save, and
    /// directory commands are available.
    pub trusted: bool,
}

/// Which predicate enables a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    /// Always enabled.
    Always,
    /// Only while the current document is an index.
    Index,
    /// Only for trusted (local) users.
    Trusted,
}

/// Keyword commands, before their arguments are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    /// BACK
    Back,
    /// BOTTOM
    Bottom,
    /// CD, LCD
    ChangeDirectory,
    /// DOWN
    Down,
    /// EXIT, RETURN
    Exit,
    /// FIND, KEYWORDS
    Find,
    /// GOTO
    Goto,
    /// HELP
    Help,
    /// HOME
    Home,
    /// LIST
    List,
    /// MANUAL
    Manual,
    /// NEXT
    Next,
    /// PREVIOUS
    Previous,
    /// PRINT
    Print,
    /// QUIT
    Quit,
    /// RECALL
    Recall,
    /// REFRESH
    Refresh,
    /// SET
    Set,
    /// PS
    SlavePrint,
    /// TOP
    Top,
    /// UP
    Up,
    /// VERBOSE
    Verbose,
}

/// How SAVE treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// `>>`: append.
    Append,
    /// `>`: refuse if the file exists.
    Create,
    /// `>!`: overwrite unconditionally.
    Overwrite,
}

/// Movement within the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    /// Last page.
    Bottom,
    /// Next page.
    Down,
    /// First page.
    Top,
    /// Previous page.
    Up,
}

/// A word of input and the byte offset it starts at.
#[derive(Debug, Clone, Copy)]
struct Word<'a> {
    /// Offset of the word in the line.
    start: usize,
    /// The word itself.
    text: &'a str,
}

/// Input split into words, with access to "this word and everything after".
struct Words<'a> {
    /// The full line as typed.
    line: &'a str,
    /// Words in order.
    words: Vec<Word<'a>>,
}

impl<'a> Words<'a> {
    /// The `n`th word.
    fn get(&self, n: usize) -> Option<&'a str> {
        return self.words.get(n).map(|word| return word.text);
    }

    /// Split a line on blanks.
    fn new(line: &'a str) -> Self {
        let mut words = Vec::new();
        let mut start = None;
        for (offset, c) in line.char_indices() {
            match (start, WORD_SEPARATORS.contains(&c)) {
                (None, false) => start = Some(offset),
                (Some(begin), true) => {
                    words.push(Word { start: begin, text: line.get(begin..offset).unwrap_or_default() });
                    start = None;
                },
                _ => {},
            }
        }
        if let Some(begin) = start {
            words.push(Word { start: begin, text: line.get(begin..).unwrap_or_default() });
        }
        return Self { line, words };
    }

    /// Word `n` and the rest of the line after it, trailing blanks removed.
    fn rest(&self, n: usize) -> Option<&'a str> {
        let word = self.words.get(n)?;
        return self.line.get(word.start..).map(|rest| return rest.trim_end_matches(WORD_SEPARATORS));
    }
}

/// Case-insensitive "is `typed` an abbreviation of `keyword`".
fn abbreviates(typed: &str, keyword: &str) -> bool {
    return !typed.is_empty()
        && keyword.get(..typed.len()).is_some_and(|head| return head.eq_ignore_ascii_case(typed));
}

/// Leading decimal digits of a word, as a number.
fn leading_number(word: &str) -> Option<usize> {
    let end = word.find(|c: char| return !c.is_ascii_digit()).unwrap_or(word.len());
    return word.get(..end).and_then(|digits| return digits.parse().ok());
}

/// The first keyword enabled in `context` that `typed` abbreviates.
fn match_keyword(typed: &str, context: &Context) -> Option<Keyword> {
    return KEYWORDS
        .iter()
        .find(|(name, _, gate)| {
            let enabled = match gate {
                Gate::Always => true,
                Gate::Index => context.is_index,
                Gate::Trusted => context.trusted,
            };
            return enabled && abbreviates(typed, name);
        })
        .map(|(_, keyword, _)| return *keyword);
}

/// Interpret one input line.
///
/// Empty input scrolls down. A leading `SOURCE` (abbreviable) is stripped
/// first and recorded on the command. Then, in priority order: a link
/// number within range, a keyword, `?`, the interrupt key `Z`, and the
/// trusted-only `>`, `|`, and `!` commands. Anything else is a keyword
/// search when the document is an index.
///
/// # Errors
///
/// Returns `Error::UnrecognizedCommand` when nothing matches and the document
/// is not searchable, `Error::MissingArgument` for commands given without
/// their argument, and `Error::QuitNotInFull` when a remote guest
/// abbreviates QUIT.
pub fn parse(line: &str, context: &Context) -> Result<Command, Error> {
    let words = Words::new(line);
    let mut first = 0_usize;
    let mut source = false;
    while let Some(word) = words.get(first)
        && abbreviates(word, SOURCE_MODIFIER)
    {
        source = true;
        first = first.saturating_add(1);
    }

    let Some(this_word) = words.get(first) else {
        let action = if source { Action::Noop } else { Action::Scroll(Scroll::Down) };
        return Ok(Command { action, source });
    };
    let this_command = words.rest(first).unwrap_or(this_word);
    let next = first.saturating_add(1);

    if let Some(action) = dispatch(this_word, this_command, &words, next, context)? {
        return Ok(Command { action, source });
    }

    if context.is_index {
        return Ok(Command { action: search(this_command), source });
    }
    return Err(Error::UnrecognizedCommand { input: this_command.to_string() });
}

/// Match the first word. `Ok(None)` means "no command", so the caller falls
/// back to searching or reporting.
///
/// # Errors
///
/// See [`parse`].
fn dispatch(
    this_word: &str,
    this_command: &str,
    words: &Words<'_>,
    next: usize,
    context: &Context,
) -> Result<Option<Action>, Error> {
    if this_word.starts_with(|c: char| return c.is_ascii_digit()) {
        return Ok(leading_number(this_word)
            .filter(|n| return (1..=context.link_count).contains(n))
            .map(Action::Link));
    }

    if let Some(keyword) = match_keyword(this_word, context) {
        return keyword_action(keyword, this_word, this_command, words, next, context);
    }

    let punctuation = match this_word.chars().next() {
        Some('?') => Some(Action::Help),
        Some('Z' | 'z') if this_word.len() == 1 => Some(Action::Interrupt),
        Some('>') if context.trusted => Some(save(this_word, words.get(next))?),
        Some('|') if context.trusted => Some(shell_tail(this_command, '|', Action::Pipe)?),
        Some('!') if context.trusted => Some(shell_tail(this_command, '!', Action::Shell)?),
        _ => None,
    };
    return Ok(punctuation);
}

/// Build the action for a matched keyword.
///
/// # Errors
///
/// See [`parse`].
fn keyword_action(
    keyword: Keyword,
    this_word: &str,
    this_command: &str,
    words: &Words<'_>,
    next: usize,
    context: &Context,
) -> Result<Option<Action>, Error> {
    let next_word = words.get(next);
    let other_words = words.rest(next);

    let action = match keyword {
        Keyword::Back => Action::Back,
        Keyword::Bottom => Action::Scroll(Scroll::Bottom),
        Keyword::ChangeDirectory => match next_word {
            Some(directory) => Action::ChangeDirectory(directory.to_string()),
            None => return Err(Error::MissingArgument { what: "new local directory" }),
        },
        Keyword::Down => Action::Scroll(Scroll::Down),
        Keyword::Exit => Action::Quit,
        Keyword::Find => other_words.map_or(Action::Noop, search),
        Keyword::Goto => match next_word {
            Some(address) => Action::Goto(address.to_string()),
            None => return Ok(None),
        },
        Keyword::Help => Action::Help,
        Keyword::Home => Action::Home,
        Keyword::List => Action::List,
        Keyword::Manual => Action::Manual,
        Keyword::Next => Action::Step(1),
        Keyword::Previous => Action::Step(-1),
        Keyword::Print => Action::Print,
        Keyword::Quit => {
            if !context.trusted && !this_word.eq_ignore_ascii_case("quit") {
                return Err(Error::QuitNotInFull);
            }
            Action::Quit
        },
        Keyword::Recall => match next_word {
            None => Action::Recall(None),
            Some(number) => match leading_number(number).filter(|n| return *n > 0) {
                Some(n) => Action::Recall(Some(n)),
                None => return Err(Error::UnrecognizedCommand { input: this_command.to_string() }),
            },
        },
        Keyword::Refresh => Action::Refresh,
        Keyword::Set => Action::Set(other_words.unwrap_or_default().to_string()),
        Keyword::SlavePrint => Action::SlavePrint,
        Keyword::Top => Action::Scroll(Scroll::Top),
        Keyword::Up => Action::Scroll(Scroll::Up),
        Keyword::Verbose => Action::Verbose,
    };
    return Ok(Some(action));
}

/// Parse `>file`, `>> file`, `>!file` and friends. The file name is the rest
/// of the first word or, if that is empty, the next word.
///
/// # Errors
///
/// Returns `Error::MissingArgument` when no file name is given.
fn save(this_word: &str, next_word: Option<&str>) -> Result<Action, Error> {
    let after = this_word.strip_prefix('>').unwrap_or(this_word);
    let (mode, attached) = if let Some(rest) = after.strip_prefix('>') {
        (SaveMode::Append, rest)
    } else if let Some(rest) = after.strip_prefix('!') {
        (SaveMode::Overwrite, rest)
    } else {
        (SaveMode::Create, after)
    };
    let name = if attached.is_empty() { next_word } else { Some(attached) };
    return name
        .map(|name| return Action::Save { mode, path: PathBuf::from(name) })
        .ok_or(Error::MissingArgument { what: "file" });
}

/// Search action for a keyword string, normalising blanks.
fn search(keywords: &str) -> Action {
    let words: Vec<&str> = keywords.split(WORD_SEPARATORS).filter(|w| return !w.is_empty()).collect();
    if words.is_empty() {
        return Action::Noop;
    }
    return Action::Search(words.join(" "));
}

/// The shell command after a leading `|` or `!`.
///
/// # Errors
///
/// Returns `Error::MissingArgument` when nothing follows the prefix.
fn shell_tail(this_command: &str, prefix: char, action: fn(String) -> Action) -> Result<Action, Error> {
    let tail = this_command.strip_prefix(prefix).unwrap_or(this_command).trim();
    if tail.is_empty() {
        return Err(Error::MissingArgument { what: "command" });
    }
    return Ok(action(tail.to_string()));
}
