//! Session loop: reads one command at a time, issues fetches, and reacts to
//! their completion. Everything the session knows lives in one `Session`
//! value owned by the session thread; fetch workers and pipe feeders only
//! ever talk to it through channels.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command as Process, Stdio};

use crossbeam_channel::{Receiver, Sender, select};

use crate::command::{self, Action, Command, Context, SaveMode, Scroll};
use crate::config::{Config, DEFAULT_PAGE_HEIGHT};
use crate::error::Error;
use crate::history::History;
use crate::library::{Completion, Library};
use crate::logging::Verbosity;
use crate::prompt::{self, PromptState};
use crate::registry::{ActiveRequest, PipeExit, Registry, Sink};
use crate::screens::{self, HelpContext};
use crate::types::{Anchor, FollowedLink, Format, Mode, Navigation};

/// Exit status when the first document cannot be loaded.
pub const FIRST_DOCUMENT_UNREACHABLE: u8 = 2;

/// Switches the terminal's slave printer on.
const SLAVE_PRINTER_ON: &str = "\x1b[5i";

/// Switches the terminal's slave printer off.
const SLAVE_PRINTER_OFF: &str = "\x1b[4i";

/// One event from the input reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// End of input.
    Closed,
    /// A line, without its trailing newline.
    Line(String),
}

/// Where the session loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The main request is outstanding; input is buffered meanwhile.
    AwaitingFetch,
    /// Ready for the next command.
    AwaitingInput,
    /// Finished, with the process exit status.
    Terminated(u8),
}

/// An interactive browsing session.
pub struct Session<L, W> {
    /// Configuration, changeable with SET.
    config: Config,
    /// The displayed document, once the first fetch has completed.
    current: Option<Anchor>,
    /// Fetch workers send completions here.
    done: Sender<Completion>,
    /// Documents reached so far.
    history: History,
    /// Completions, consumed only by the session thread.
    inbox: Receiver<Completion>,
    /// No more input will arrive.
    input_closed: bool,
    /// Source of documents.
    library: L,
    /// Screen.
    out: W,
    /// Input read while a fetch was outstanding.
    pending: VecDeque<Input>,
    /// Pipe feeders report here when their command exits.
    pipe_done: Sender<PipeExit>,
    /// Pipe exits, consumed only by the session thread.
    pipe_inbox: Receiver<PipeExit>,
    /// Pipe commands fed and not yet reaped.
    pipes_running: usize,
    /// The prompt for the current state has been written.
    prompted: bool,
    /// Requests in flight.
    registry: Registry,
    /// Loop position.
    state: State,
    /// Local user, not a remote guest.
    trusted: bool,
    /// Verbose switch shared with the logger.
    verbosity: Verbosity,
}

impl<L: Library, W: Write> Session<L, W> {
    /// Handle one input event.
    fn accept(&mut self, input: Input) {
        match input {
            Input::Closed => {
                self.input_closed = true;
                self.drain_side_requests();
                self.state = State::Terminated(0);
            },
            Input::Line(line) => {
                self.prompted = false;
                let context = self.context();
                let result = match command::parse(&line, &context) {
                    Ok(command) => {
                        log::debug!("dispatch: {command:?}");
                        self.execute(command)
                    },
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    self.report(&e);
                }
                self.settle();
            },
        }
    }

    /// Wait for the main request while buffering input. Only the interrupt
    /// key is acted on before the fetch completes.
    fn await_fetch(&mut self, input: &Receiver<Input>) {
        let inbox = self.inbox.clone();
        let pipe_inbox = self.pipe_inbox.clone();
        if self.input_closed {
            if let Ok(completion) = inbox.recv() {
                self.complete(completion);
            }
            return;
        }
        select! {
            recv(inbox) -> completion => {
                if let Ok(completion) = completion {
                    self.complete(completion);
                }
            },
            recv(pipe_inbox) -> exit => {
                if let Ok(exit) = exit {
                    self.reap(exit);
                }
            },
            recv(input) -> event => match event {
                Ok(Input::Line(line)) if is_interrupt(&line) => self.interrupt(),
                Ok(Input::Line(line)) => self.pending.push_back(Input::Line(line)),
                Ok(Input::Closed) | Err(_) => {
                    self.input_closed = true;
                    self.pending.push_back(Input::Closed);
                },
            },
        }
    }

    /// Prompt, then take the next buffered or fresh input. Side-request
    /// completions are handled while waiting.
    fn await_input(&mut self, input: &Receiver<Input>) {
        if let Err(e) = self.show_prompt() {
            log::warn!("prompt: {e}");
        }
        if let Some(event) = self.pending.pop_front() {
            self.accept(event);
            return;
        }
        if self.input_closed {
            self.accept(Input::Closed);
            return;
        }
        let inbox = self.inbox.clone();
        let pipe_inbox = self.pipe_inbox.clone();
        select! {
            recv(inbox) -> completion => {
                if let Ok(completion) = completion {
                    self.complete(completion);
                }
            },
            recv(pipe_inbox) -> exit => {
                if let Ok(exit) = exit {
                    self.reap(exit);
                }
            },
            recv(input) -> event => self.accept(event.unwrap_or(Input::Closed)),
        }
    }

    /// CD and LCD.
    ///
    /// # Errors
    ///
    /// Returns `Error::Navigation` if the directory cannot be entered.
    fn change_directory(&mut self, dir: &str) -> Result<(), Error> {
        std::env::set_current_dir(dir).map_err(|e| return Error::navigation(format!("{dir}: {e}")))?;
        let now = std::env::current_dir()?;
        writeln!(self.out, "\nLocal directory is now:\n {}", now.display())?;
        return Ok(());
    }

    /// Route a completion to its request. Completions for requests that have
    /// been abandoned are dropped.
    fn complete(&mut self, completion: Completion) {
        let is_main = self.registry.is_main(completion.request);
        let Some(request) = self.registry.destroy(completion.request) else {
            log::debug!("thread {}: completed after being abandoned", completion.request);
            return;
        };
        if request.target != Some(completion.anchor) {
            log::warn!("thread {}: completed for an unexpected document", request.id);
        }
        log::debug!("thread {}: {:?} request completed", request.id, request.mode);
        if is_main {
            self.complete_main(request, completion);
        } else {
            self.complete_side(request, completion);
        }
    }

    /// The main request finished: record and display on success; on failure
    /// stay on the previous document, or give up if there is none.
    fn complete_main(&mut self, request: ActiveRequest, completion: Completion) {
        let anchor = completion.anchor;
        self.prompted = false;
        match completion.outcome {
            Ok(body) => {
                self.library.present(anchor, &body, request.format);
                if let Some(navigation) = request.navigation {
                    self.history.record(anchor, navigation);
                }
                self.current = Some(anchor);
                self.state = State::AwaitingInput;
                if let Err(e) = self.library.display(anchor, &mut self.out) {
                    self.report(&Error::Io(e));
                }
            },
            Err(reason) => {
                let error = Error::Fetch { address: self.library.address(anchor), reason };
                log::warn!("thread {}: {error}", request.id);
                self.report(&error);
                if self.current.is_none() {
                    self.state = State::Terminated(FIRST_DOCUMENT_UNREACHABLE);
                    return;
                }
                self.state = State::AwaitingInput;
            },
        }
        self.settle();
    }

    /// A save, pipe, or print request finished fetching: hand the document
    /// to its sink. Pipe commands run on without the session waiting.
    fn complete_side(&mut self, request: ActiveRequest, completion: Completion) {
        let result = match completion.outcome {
            Ok(body) => self.deliver(request.sink, completion.anchor, &body, request.format),
            Err(reason) => {
                request.sink.abandon();
                Err(Error::Fetch { address: self.library.address(completion.anchor), reason })
            },
        };
        if let Err(e) = result {
            self.report(&e);
        }
    }

    /// What the dispatcher interprets the next line against.
    fn context(&self) -> Context {
        let state = self.prompt_state();
        return Context { is_index: state.is_index, link_count: state.link_count, trusted: self.trusted };
    }

    /// Render a side request's document and pass it to `sink`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the document cannot be rendered or written.
    fn deliver(&mut self, sink: Sink, doc: Anchor, body: &[u8], format: Format) -> Result<(), Error> {
        let mut text = Vec::new();
        if let Err(e) = self.library.render(doc, body, format, &mut text) {
            sink.abandon();
            return Err(Error::Io(e));
        }
        if matches!(sink, Sink::Pipe { .. }) {
            self.pipes_running = self.pipes_running.saturating_add(1);
        }
        return sink.deliver(text, &self.pipe_done);
    }

    /// The displayed document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Navigation` before the first document has arrived.
    fn displayed(&self) -> Result<Anchor, Error> {
        return self.current.ok_or_else(|| return Error::navigation("No document is being displayed."));
    }

    /// Wait for outstanding save, pipe, and print requests so their sinks
    /// are complete before the session ends.
    fn drain_side_requests(&mut self) {
        let inbox = self.inbox.clone();
        let pipe_inbox = self.pipe_inbox.clone();
        while self.registry.has_side_requests() || self.pipes_running > 0 {
            select! {
                recv(inbox) -> completion => match completion {
                    Ok(completion) => self.complete(completion),
                    Err(_) => return,
                },
                recv(pipe_inbox) -> exit => match exit {
                    Ok(exit) => self.reap(exit),
                    Err(_) => return,
                },
            }
        }
    }

    /// Run one parsed command.
    ///
    /// # Errors
    ///
    /// Returns the error to report; the session stays where it was.
    fn execute(&mut self, command: Command) -> Result<(), Error> {
        let format = if command.source { Format::Source } else { Format::Rendered };
        match command.action {
            Action::Back => {
                let target = self.history.backtrack().ok_or_else(|| {
                    return Error::navigation("The BACK command cannot be used, as there are no previous documents");
                })?;
                self.load(target, Navigation::Backtrack, format);
            },
            Action::ChangeDirectory(dir) => self.change_directory(&dir)?,
            Action::Goto(address) => {
                let target = self.library.resolve(&address, self.current)?;
                self.load(target, Navigation::Jump { origin: self.current }, format);
            },
            Action::Help => self.help()?,
            Action::Home => match self.history.recall(1) {
                Some(first) if self.history.can_backtrack() => {
                    self.load(first, Navigation::Jump { origin: self.current }, format);
                },
                _ => self.scroll(Scroll::Top)?,
            },
            Action::Interrupt => self.interrupt(),
            Action::Link(n) => self.follow(n, format)?,
            Action::List => self.list_references(!command.source)?,
            Action::Manual => {
                let target = self.library.resolve(&self.config.manual, self.current)?;
                self.load(target, Navigation::Jump { origin: self.current }, format);
            },
            Action::Noop => {},
            Action::Pipe(shell_command) => self.pipe(&shell_command, format)?,
            Action::Print => {
                let print_command = self.config.print_command.clone();
                self.pipe(&print_command, format)?;
            },
            Action::Quit => self.state = State::Terminated(0),
            Action::Recall(n) => self.recall(n, format)?,
            Action::Refresh => {
                let doc = self.displayed()?;
                self.library.display(doc, &mut self.out)?;
            },
            Action::Save { mode, path } => self.save(mode, &path, format)?,
            Action::Scroll(scroll) => self.scroll(scroll)?,
            Action::Search(keywords) => self.search(&keywords, format)?,
            Action::Set(fragment) => self.set(&fragment)?,
            Action::Shell(shell_command) => self.shell(&shell_command)?,
            Action::SlavePrint => self.slave_print()?,
            Action::Step(offset) => self.step(offset, format)?,
            Action::Verbose => {
                let on = self.verbosity.toggle();
                writeln!(self.out, "\n  Verbose mode {}.", if on { "ON" } else { "OFF" })?;
            },
        }
        return Ok(());
    }

    /// Follow numbered link `n` of the displayed document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Navigation` if the link has no usable destination.
    fn follow(&mut self, n: usize, format: Format) -> Result<(), Error> {
        let origin = self.displayed()?;
        let target = self
            .library
            .child_link(origin, n)
            .ok_or_else(|| return Error::navigation(format!("Reference [{n}] has no usable address.")))?;
        let link = FollowedLink { count: self.library.child_link_count(origin), ordinal: n };
        self.load(target, Navigation::Link { link, origin }, format);
        return Ok(());
    }

    /// Print the help screen.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the screen cannot be written.
    fn help(&mut self) -> Result<(), Error> {
        let doc = self.displayed()?;
        let address = self.library.address(doc);
        let title = self.library.title(doc);
        let context =
            HelpContext { address: &address, title: title.as_deref(), trusted: self.trusted, verbose: self.verbosity.is_on() };
        let text = screens::help(&self.prompt_state(), &context);
        self.out.write_all(text.as_bytes())?;
        return Ok(());
    }

    /// Abandon everything and stop.
    fn interrupt(&mut self) {
        log::info!("interrupted");
        self.state = State::Terminated(0);
    }

    /// True when no command could ever lead anywhere from here.
    fn is_dead_end(&self) -> bool {
        let Some(doc) = self.current else {
            return false;
        };
        return !self.library.can_scroll_down(doc)
            && self.library.child_link_count(doc) == 0
            && !self.library.is_index(doc)
            && !self.history.can_backtrack();
    }

    /// Title of a document, or its address when it has none.
    fn label(&self, doc: Anchor, titles: bool) -> String {
        let title = if titles { self.library.title(doc) } else { None };
        return title.unwrap_or_else(|| return self.library.address(doc));
    }

    /// Print the reference list.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the list cannot be written.
    fn list_references(&mut self, titles: bool) -> Result<(), Error> {
        let doc = self.displayed()?;
        let labels: Vec<String> = (1..=self.library.child_link_count(doc))
            .map(|n| {
                return self.library.child_link(doc, n).map_or_else(
                    || return "(unusable address)".to_string(),
                    |target| return self.label(target, titles),
                );
            })
            .collect();
        let text = screens::reference_list(&self.config.ref_heading, &labels);
        self.out.write_all(text.as_bytes())?;
        return Ok(());
    }

    /// Issue a main request. A main request still outstanding is abandoned.
    fn load(&mut self, target: Anchor, navigation: Navigation, format: Format) {
        let id = self.registry.create(Mode::Interactive, Sink::Display);
        if let Some(request) = self.registry.get_mut(id) {
            request.format = format;
            request.navigation = Some(navigation);
            request.target = Some(target);
        }
        if let Some(abandoned) = self.registry.set_main(id) {
            log::debug!("thread {}: abandoned for {id}", abandoned.id);
        }
        self.library.fetch(target, id, &self.done);
        self.state = State::AwaitingFetch;
    }

    /// A session over `library`, writing to `out`. Call [`Session::start`]
    /// before [`Session::run`].
    pub fn new(library: L, out: W, config: Config, trusted: bool, verbosity: Verbosity) -> Self {
        let (done, inbox) = crossbeam_channel::unbounded();
        let (pipe_done, pipe_inbox) = crossbeam_channel::unbounded();
        return Self {
            config,
            current: None,
            done,
            history: History::default(),
            inbox,
            input_closed: false,
            library,
            out,
            pending: VecDeque::new(),
            pipe_done,
            pipe_inbox,
            pipes_running: 0,
            prompted: false,
            registry: Registry::default(),
            state: State::AwaitingInput,
            trusted,
            verbosity,
        };
    }

    /// Feed the document into a shell command's standard input.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the command cannot be started.
    fn pipe(&mut self, shell_command: &str, format: Format) -> Result<(), Error> {
        self.out.flush()?;
        let child = Process::new("sh").arg("-c").arg(shell_command).stdin(Stdio::piped()).spawn()?;
        return self.side_request(Sink::Pipe { child, command: shell_command.to_string() }, format);
    }

    /// Inputs to the prompt and help screen.
    fn prompt_state(&self) -> PromptState {
        let Some(doc) = self.current else {
            return PromptState::default();
        };
        return PromptState {
            can_backtrack: self.history.can_backtrack(),
            can_scroll_down: self.library.can_scroll_down(doc),
            can_scroll_up: self.library.can_scroll_up(doc),
            can_step_back: self.history.can_move_by(-1),
            can_step_forward: self.history.can_move_by(1),
            is_index: self.library.is_index(doc),
            link_count: self.library.child_link_count(doc),
        };
    }

    /// A fed pipe command has exited.
    fn reap(&mut self, exit: PipeExit) {
        self.pipes_running = self.pipes_running.saturating_sub(1);
        log::debug!("{}: exited", exit.command);
        if let Err(e) = exit.outcome {
            self.report(&e);
        }
    }

    /// RECALL: list history, or load entry `n`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Navigation` if there is nothing to recall or `n` is
    /// past the end of the list.
    fn recall(&mut self, n: Option<usize>, format: Format) -> Result<(), Error> {
        if !self.history.can_backtrack() {
            return Err(Error::navigation("No other documents to recall."));
        }
        let Some(n) = n else {
            let labels: Vec<String> = (1_usize..)
                .map_while(|i| return self.history.read(i).map(|entry| return self.label(entry.visited, true)))
                .collect();
            self.out.write_all(screens::recall_list(&labels).as_bytes())?;
            return Ok(());
        };
        let target = self
            .history
            .recall(n)
            .ok_or_else(|| return Error::navigation(format!("There is no document number {n} in the recall list.")))?;
        self.load(target, Navigation::Jump { origin: self.current }, format);
        return Ok(());
    }

    /// Report a recoverable error on the screen.
    fn report(&mut self, error: &Error) {
        self.prompted = false;
        log::debug!("reported: {error}");
        if let Err(e) = writeln!(self.out, "\n  {error}") {
            log::warn!("screen: {e}");
        }
    }

    /// Drive the session until it terminates. Returns the exit status.
    pub fn run(&mut self, input: &Receiver<Input>) -> u8 {
        loop {
            match self.state {
                State::AwaitingFetch => self.await_fetch(input),
                State::AwaitingInput => self.await_input(input),
                State::Terminated(status) => {
                    let abandoned = self.registry.destroy_all();
                    log::debug!("session: terminated with status {status}, {abandoned} requests abandoned");
                    if let Err(e) = self.out.flush() {
                        log::warn!("screen: {e}");
                    }
                    return status;
                },
            }
        }
    }

    /// Save the document into a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileExists` when plain `>` finds the file present, or
    /// `Error::Io` if it cannot be opened.
    fn save(&mut self, mode: SaveMode, path: &Path, format: Format) -> Result<(), Error> {
        let file = match mode {
            SaveMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
            SaveMode::Create => OpenOptions::new().write(true).create_new(true).open(path).map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    return Error::FileExists { path: path.to_path_buf() };
                }
                return Error::Io(e);
            })?,
            SaveMode::Overwrite => File::create(path)?,
        };
        log::debug!("saving to {}", path.display());
        return self.side_request(Sink::File { file, path: path.to_path_buf() }, format);
    }

    /// Scroll the displayed document. Scrolling down from the last page
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the page cannot be written.
    fn scroll(&mut self, scroll: Scroll) -> Result<(), Error> {
        let doc = self.displayed()?;
        if scroll == Scroll::Down && !self.library.can_scroll_down(doc) {
            return Ok(());
        }
        self.library.scroll(doc, scroll, &mut self.out)?;
        return Ok(());
    }

    /// Keyword search of the displayed index, shared by FIND, KEYWORDS, and
    /// plain input on an index.
    ///
    /// # Errors
    ///
    /// Returns `Error::Navigation` if the document is not an index.
    fn search(&mut self, keywords: &str, format: Format) -> Result<(), Error> {
        let doc = self.displayed()?;
        let query = self.library.search(keywords, doc)?;
        self.load(query, Navigation::Jump { origin: Some(doc) }, format);
        return Ok(());
    }

    /// SET: show settings, or apply a TOML fragment.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSetting` or `Error::TomlDe` for bad fragments.
    fn set(&mut self, fragment: &str) -> Result<(), Error> {
        if fragment.trim().is_empty() {
            write!(self.out, "\n{}\n", self.config)?;
            return Ok(());
        }
        self.config.apply(fragment)?;
        let height = self.config.page_height.unwrap_or(DEFAULT_PAGE_HEIGHT);
        self.library.set_page_size(height, self.config.page_width);
        return Ok(());
    }

    /// Allow the event loop to settle after an action: a session with no
    /// way forward ends here.
    fn settle(&mut self) {
        if self.state == State::AwaitingInput && self.is_dead_end() {
            log::info!("No way out of here, so I exit!");
            self.state = State::Terminated(0);
        }
    }

    /// Run a shell command to completion.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if it cannot be run and `Error::Navigation` if it
    /// fails.
    fn shell(&mut self, shell_command: &str) -> Result<(), Error> {
        log::debug!("Executing {shell_command}");
        self.out.flush()?;
        let status = Process::new("sh").arg("-c").arg(shell_command).status()?;
        if !status.success() {
            return Err(Error::navigation(format!("  {shell_command}  returns {status}")));
        }
        return Ok(());
    }

    /// Write the prompt if the state has changed since it was last written.
    ///
    /// # Errors
    ///
    /// Returns any error from writing to the screen.
    fn show_prompt(&mut self) -> io::Result<()> {
        if self.prompted {
            return Ok(());
        }
        self.prompted = true;
        self.out.write_all(prompt::compose(&self.prompt_state()).as_bytes())?;
        return self.out.flush();
    }

    /// Reload the displayed document into its own sink.
    ///
    /// # Errors
    ///
    /// Returns `Error::Navigation` when there is no displayed document.
    fn side_request(&mut self, sink: Sink, format: Format) -> Result<(), Error> {
        let doc = self.displayed()?;
        let id = self.registry.create(Mode::Batch, sink);
        if let Some(request) = self.registry.get_mut(id) {
            request.format = format;
            request.target = Some(doc);
        }
        self.library.fetch(doc, id, &self.done);
        return Ok(());
    }

    /// PS: the whole document framed for the terminal's slave printer, then
    /// back to the top.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the screen cannot be written.
    fn slave_print(&mut self) -> Result<(), Error> {
        let doc = self.displayed()?;
        write!(self.out, "{SLAVE_PRINTER_ON}\x0c")?;
        self.library.write_all(doc, &mut self.out)?;
        write!(self.out, "\x0c{SLAVE_PRINTER_OFF}")?;
        self.library.scroll(doc, Scroll::Top, &mut self.out)?;
        return Ok(());
    }

    /// Begin the session by loading `address`, or searching it when
    /// `keywords` are given.
    pub fn start(&mut self, address: &str, keywords: &[String]) {
        let address =
            if keywords.is_empty() { address.to_string() } else { format!("{address}?{}", keywords.join("+")) };
        match self.library.resolve(&address, None) {
            Ok(first) => self.load(first, Navigation::Start, Format::Rendered),
            Err(e) => {
                self.report(&e);
                self.state = State::Terminated(FIRST_DOCUMENT_UNREACHABLE);
            },
        }
    }

    /// NEXT and PREVIOUS.
    ///
    /// # Errors
    ///
    /// Returns `Error::Navigation` explaining why no sibling link exists.
    fn step(&mut self, offset: isize, format: Format) -> Result<(), Error> {
        let Some((origin, link)) = self.history.move_by(offset) else {
            let name = if offset > 0 { "NEXT" } else { "PREVIOUS" };
            let no_last = if self.history.can_backtrack() { "" } else { " document as there is no last" };
            return Err(Error::navigation(format!("Can't take the {name} link from the last{no_last} document.")));
        };
        let target = self
            .library
            .child_link(origin, link.ordinal)
            .ok_or_else(|| return Error::navigation(format!("Reference [{}] has no usable address.", link.ordinal)))?;
        self.load(target, Navigation::Link { link, origin }, format);
        return Ok(());
    }
}

/// The interrupt keystroke, acted on even while a fetch is outstanding.
fn is_interrupt(line: &str) -> bool {
    return line.trim().eq_ignore_ascii_case("z");
}

#[cfg(test)]
#[allow(clippy::missing_assert_message, clippy::missing_panics_doc, reason = "assertions name what they check")]
mod tests {
    use std::path::PathBuf;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::local::LocalLibrary;
    use crate::types::RequestId;

    /// A directory of linked documents:
    /// home.txt links to a.txt and b.txt; a.txt and b.txt link back home.
    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("home.txt"), "# Home\nSee [alpha](a.txt) or [beta](b.txt).\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "# Alpha\nBack [home](home.txt).\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "# Beta\nBack [home](home.txt).\n").unwrap();
        std::fs::write(dir.path().join("leaf.txt"), "# Leaf\nNothing here.\n").unwrap();
        return dir;
    }

    fn path(dir: &tempfile::TempDir, name: &str) -> String {
        return dir.path().join(name).display().to_string();
    }

    fn new_session(trusted: bool) -> Session<LocalLibrary, Vec<u8>> {
        return Session::new(LocalLibrary::new(24, 79, true), Vec::new(), Config::default(), trusted, Verbosity::new(false));
    }

    fn drive(session: &mut Session<LocalLibrary, Vec<u8>>, start: &str, lines: &[&str]) -> u8 {
        let (tx, rx) = crossbeam_channel::unbounded();
        for line in lines {
            tx.send(Input::Line((*line).to_string())).unwrap();
        }
        drop(tx);
        session.start(start, &[]);
        return session.run(&rx);
    }

    fn output(session: &Session<LocalLibrary, Vec<u8>>) -> String {
        return String::from_utf8_lossy(&session.out).into_owned();
    }

    fn visited(session: &Session<LocalLibrary, Vec<u8>>) -> Vec<String> {
        return (1..)
            .map_while(|n| return session.history.read(n).map(|entry| return session.library.address(entry.visited)))
            .collect();
    }

    /// A library whose fetches never complete.
    struct Stalled;

    impl Library for Stalled {
        fn address(&self, _doc: Anchor) -> String {
            return "anywhere".to_string();
        }

        fn can_scroll_down(&self, _doc: Anchor) -> bool {
            return false;
        }

        fn can_scroll_up(&self, _doc: Anchor) -> bool {
            return false;
        }

        fn child_link(&self, _doc: Anchor, _n: usize) -> Option<Anchor> {
            return None;
        }

        fn child_link_count(&self, _doc: Anchor) -> usize {
            return 0;
        }

        fn display(&self, _doc: Anchor, _out: &mut dyn Write) -> io::Result<()> {
            return Ok(());
        }

        fn fetch(&mut self, _doc: Anchor, _request: RequestId, _done: &Sender<Completion>) {}

        fn is_index(&self, _doc: Anchor) -> bool {
            return false;
        }

        fn present(&mut self, _doc: Anchor, _body: &[u8], _format: Format) {}

        fn render(&self, _doc: Anchor, _body: &[u8], _format: Format, _out: &mut dyn Write) -> io::Result<()> {
            return Ok(());
        }

        fn resolve(&mut self, _address: &str, _base: Option<Anchor>) -> Result<Anchor, Error> {
            return Ok(Anchor(0));
        }

        fn scroll(&mut self, _doc: Anchor, _scroll: Scroll, _out: &mut dyn Write) -> io::Result<()> {
            return Ok(());
        }

        fn search(&mut self, _keywords: &str, _doc: Anchor) -> Result<Anchor, Error> {
            return Err(Error::navigation("not an index"));
        }

        fn set_page_size(&mut self, _height: usize, _width: usize) {}

        fn title(&self, _doc: Anchor) -> Option<String> {
            return None;
        }

        fn write_all(&self, _doc: Anchor, _out: &mut dyn Write) -> io::Result<()> {
            return Ok(());
        }
    }

    /// Wait up to ten seconds for `path` to appear.
    fn wait_for(path: &Path) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if path.exists() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        return false;
    }

    #[test]
    fn follows_links_and_goes_back() {
        let dir = site();
        let mut session = new_session(true);
        let status = drive(&mut session, &path(&dir, "home.txt"), &["1", "back"]);
        assert_eq!(status, 0);
        assert_eq!(visited(&session), vec![path(&dir, "home.txt"), path(&dir, "a.txt"), path(&dir, "home.txt")]);
        assert_eq!(session.history.recall(1), session.current);
        let out = output(&session);
        assert!(out.contains("See alpha[1] or beta[2]."));
        assert!(out.contains("1-2, Quit, or Help: "));
        assert!(out.contains("1, Back, Next, Quit, or Help: "));
        assert!(out.contains("1-2, Back, Quit, or Help: "));
    }

    #[test]
    fn recall_past_the_end_is_reported_and_changes_nothing() {
        let dir = site();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "home.txt"), &["1", "recall 3", "recall"]);
        assert_eq!(session.history.len(), 2);
        let out = output(&session);
        let prompt = "1, Back, Next, Quit, or Help: \n";
        let error = "\n  There is no document number 3 in the recall list.\n";
        assert!(out.contains(&format!("{prompt}{error}{prompt}")), "prompt changed around the error: {out}");
        assert!(out.contains("R  1)   Home\nR  2)   Alpha\n"));
    }

    #[test]
    fn recall_needs_another_document() {
        let dir = site();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "home.txt"), &["recall 1"]);
        assert!(output(&session).contains("No other documents to recall."));
        assert_eq!(session.history.len(), 1);
    }

    #[test]
    fn next_and_previous_replay_sibling_links() {
        let dir = site();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "home.txt"), &["previous", "1", "next", "previous"]);
        assert_eq!(
            visited(&session),
            vec![path(&dir, "home.txt"), path(&dir, "a.txt"), path(&dir, "b.txt"), path(&dir, "a.txt")]
        );
        assert!(output(&session).contains("Can't take the PREVIOUS link from the last document as there is no last document."));
    }

    #[test]
    fn dead_end_document_terminates_the_session() {
        let dir = site();
        let mut session = new_session(true);
        let status = drive(&mut session, &path(&dir, "leaf.txt"), &["1", "help"]);
        assert_eq!(status, 0);
        assert_eq!(session.history.len(), 1);
        assert!(!output(&session).contains("COMMANDS AVAILABLE"));
    }

    #[test]
    fn unreachable_first_document_is_fatal() {
        let dir = site();
        let mut session = new_session(true);
        let status = drive(&mut session, &path(&dir, "missing.txt"), &["1"]);
        assert_eq!(status, FIRST_DOCUMENT_UNREACHABLE);
        assert!(output(&session).contains("can't access document"));
    }

    #[test]
    fn failed_fetch_keeps_the_previous_document() {
        let dir = site();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "home.txt"), &["go nowhere.txt", "2"]);
        assert_eq!(visited(&session), vec![path(&dir, "home.txt"), path(&dir, "b.txt")]);
    }

    #[test]
    fn unrecognized_input_is_reported() {
        let dir = site();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "home.txt"), &["frobnicate now"]);
        assert!(output(&session).contains("Bad command (frobnicate now), for list of commands type help."));
    }

    #[test]
    fn guests_must_spell_out_quit() {
        let dir = site();
        let mut session = new_session(false);
        drive(&mut session, &path(&dir, "home.txt"), &["q", "quit", "1"]);
        assert!(output(&session).contains("Please type \"quit\" in full to leave www."));
        assert_eq!(session.history.len(), 1);
    }

    #[test]
    fn interrupt_abandons_an_outstanding_fetch() {
        let mut session =
            Session::new(Stalled, Vec::new(), Config::default(), true, Verbosity::new(false));
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Input::Line("z".to_string())).unwrap();
        tx.send(Input::Line("1".to_string())).unwrap();
        session.start("anywhere", &[]);
        assert_eq!(session.state, State::AwaitingFetch);
        assert_eq!(session.registry.len(), 1);

        let status = session.run(&rx);
        assert_eq!(status, 0);
        assert_eq!(session.state, State::Terminated(0));
        assert_eq!(session.history.len(), 0);
        assert_eq!(session.current, None);
        assert_eq!(session.registry.len(), 0);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn plain_save_refuses_an_existing_file_but_overwrite_does_not() {
        let dir = site();
        let target = dir.path().join("out.txt");
        std::fs::write(&target, "old").unwrap();

        let mut session = new_session(true);
        let refuse = format!("> {}", target.display());
        drive(&mut session, &path(&dir, "home.txt"), &[&refuse]);
        assert!(output(&session).contains("File exists"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");

        let mut session = new_session(true);
        let overwrite = format!(">! {}", target.display());
        drive(&mut session, &path(&dir, "home.txt"), &[&overwrite]);
        let saved = std::fs::read_to_string(&target).unwrap();
        assert!(saved.contains("See alpha[1] or beta[2]."));
    }

    #[test]
    fn source_save_and_append() {
        let dir = site();
        let target: PathBuf = dir.path().join("log.txt");
        let mut session = new_session(true);
        let first = format!("source >>{}", target.display());
        let second = format!(">> {}", target.display());
        drive(&mut session, &path(&dir, "home.txt"), &[&first, &second]);
        let saved = std::fs::read_to_string(&target).unwrap();
        assert!(saved.contains("See [alpha](a.txt) or [beta](b.txt)."));
        assert!(saved.contains("See alpha[1] or beta[2]."));
    }

    #[test]
    fn pipe_feeds_the_document_to_a_command() {
        let dir = site();
        let target = dir.path().join("piped.txt");
        let mut session = new_session(true);
        let pipe = format!("| cat > {}", target.display());
        drive(&mut session, &path(&dir, "home.txt"), &[&pipe]);
        assert!(std::fs::read_to_string(&target).unwrap().contains("See alpha[1]"));
    }

    #[test]
    fn commands_run_while_a_pipe_command_is_still_running() {
        let dir = site();
        let fed = dir.path().join("fed");
        let finished = dir.path().join("finished");
        let early = dir.path().join("early");
        let start = path(&dir, "home.txt");
        let pipe = format!("| cat > /dev/null; touch '{}'; sleep 3; touch '{}'", fed.display(), finished.display());

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Input::Line(pipe)).unwrap();
        let browsing = thread::spawn(move || {
            let mut session = new_session(true);
            session.start(&start, &[]);
            return session.run(&rx);
        });

        assert!(wait_for(&fed), "pipe command was never fed");
        let check = format!("! test -e '{}' && touch '{}'", finished.display(), early.display());
        tx.send(Input::Line(check)).unwrap();
        tx.send(Input::Line("quit".to_string())).unwrap();

        assert_eq!(browsing.join().unwrap(), 0);
        assert!(early.exists(), "shell command waited for the pipe command to exit");
    }

    #[test]
    fn reference_list_uses_titles_of_loaded_documents() {
        let dir = site();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "home.txt"), &["1", "back", "list"]);
        let out = output(&session);
        assert!(out.contains("*** References from this document ***\n[1] Alpha\n"));
        assert!(out.contains(&format!("[2] {}\n", path(&dir, "b.txt"))));
    }

    #[test]
    fn search_of_an_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("phones.txt"), "# Phones\n<ISINDEX>\nAlice 1234\nBob 5678\n").unwrap();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "phones.txt"), &["alice"]);
        assert_eq!(session.history.len(), 2);
        let out = output(&session);
        assert!(out.contains("FIND <keywords>, Quit, or Help: "));
        assert!(out.contains("Alice 1234"));
    }

    #[test]
    fn source_search_shows_raw_results() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cats.txt"), "# Cats\n<ISINDEX>\nSee [tabby](tabby.txt) cats\nSiamese\n").unwrap();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "cats.txt"), &["source find tabby"]);
        assert_eq!(session.history.len(), 2);
        let out = output(&session);
        let (_, results) = out.split_once("# Search results for tabby").unwrap();
        assert!(results.contains("See [tabby](tabby.txt) cats"));
        assert!(!results.contains("tabby[1]"));
    }

    #[test]
    fn set_changes_settings_for_the_session() {
        let dir = site();
        let mut session = new_session(true);
        drive(&mut session, &path(&dir, "home.txt"), &["set ref_heading = \"Links\"", "list", "set colour = 1"]);
        let out = output(&session);
        assert!(out.contains("\nLinks\n[1] "));
        assert!(out.contains("unknown setting: `colour`"));
    }

    #[test]
    fn verbose_toggles_the_shared_switch() {
        let dir = site();
        let mut session = new_session(true);
        let verbosity = session.verbosity.clone();
        drive(&mut session, &path(&dir, "home.txt"), &["verbose"]);
        assert!(verbosity.is_on());
        assert!(output(&session).contains("Verbose mode ON."));
    }
}
