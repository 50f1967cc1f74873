#![allow(clippy::cargo_common_metadata, reason = "unpublished binary with no repository")]

mod batch;
mod command;
mod config;
mod error;
mod history;
mod library;
mod local;
mod logging;
mod markup;
mod prompt;
mod registry;
mod screens;
mod session;
mod text;
mod types;

use std::fs::File;
use std::io::{self, BufRead as _, Read as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use crossbeam_channel::Sender;

use crate::batch::BatchOptions;
use crate::config::{Config, DEFAULT_PAGE_HEIGHT, clamp_page_height, clamp_page_width};
use crate::error::Error;
use crate::local::LocalLibrary;
use crate::registry::Sink;
use crate::session::{FIRST_DOCUMENT_UNREACHABLE, Input, Session};
use crate::types::Format;

/// Exit status when the configuration cannot be loaded.
const CONFIG_FAILURE: u8 = 1;

/// Exit status when the `-o` output file cannot be opened.
const OUTPUT_OPEN_FAILURE: u8 = 3;

/// Line-mode hypertext browser for dumb terminals.
#[derive(Parser)]
#[command(name = "linemode", version)]
#[allow(clippy::struct_excessive_bools, reason = "clap switches")]
struct Cli {
    /// Document to start from (path, `file:` address, or `index?keywords`).
    address: Option<String>,

    /// Search the start document for these keywords.
    keywords: Vec<String>,

    /// Start at the command-line help page.
    #[arg(long)]
    command_help: bool,

    /// Settings file; a missing file is an error.
    #[arg(long, env = "WWW_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Render a document read from standard input and exit.
    #[arg(long)]
    filter: bool,

    /// Run for a remote guest logged in from HOST; local commands are disabled.
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Append the reference list (non-interactive).
    #[arg(long)]
    listrefs: bool,

    /// Append a trace of the session to ROOT-<pid>.
    #[arg(short = 'l', long = "log", value_name = "ROOT", num_args = 0..=1, default_missing_value = "WWW-log")]
    log: Option<String>,

    /// Hide `[n]` link numbers.
    #[arg(long)]
    no_anchors: bool,

    /// Write the document whole to standard output and exit.
    #[arg(short = 'n', long = "non-interactive")]
    non_interactive: bool,

    /// Write the document to FILE and exit.
    #[arg(short = 'o', long, value_name = "FILE", num_args = 0..=1, default_missing_value = "WWW-out")]
    output: Option<PathBuf>,

    /// Screen height in lines.
    #[arg(short = 'p', long = "page-height", value_name = "LINES")]
    page_height: Option<usize>,

    /// Screen width in columns.
    #[arg(short = 'w', long = "page-width", value_name = "COLUMNS")]
    page_width: Option<usize>,

    /// Heading for the reference list.
    #[arg(long, value_name = "TEXT")]
    refhead: Option<String>,

    /// Write raw source instead of rendered text (non-interactive).
    #[arg(long)]
    source: bool,

    /// Trace what the browser is doing on standard error.
    #[arg(short, long)]
    verbose: bool,
}

/// Parse options, load settings, then browse interactively or run once.
fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = logging::install(cli.verbose, cli.log.as_deref());

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(CONFIG_FAILURE);
        },
    };

    if cli.filter {
        return run_filter(&cli, &config);
    }

    let start = start_address(&cli, &config);
    if cli.non_interactive || cli.output.is_some() || cli.source || cli.listrefs {
        return run_batch(&cli, &config, &start);
    }

    let height = cli
        .page_height
        .or(config.page_height)
        .or_else(|| return std::env::var("LINES").ok().and_then(|lines| return lines.trim().parse().ok()))
        .map_or(DEFAULT_PAGE_HEIGHT, clamp_page_height);
    config.page_height = Some(height);

    let trusted = cli.host.is_none();
    if let Some(host) = &cli.host {
        log::info!("remote guest from {host}");
    }
    let library = LocalLibrary::new(height, config.page_width, !cli.no_anchors);
    let (tx, rx) = crossbeam_channel::unbounded();
    spawn_input_reader(tx);

    let mut session = Session::new(library, io::stdout(), config, trusted, verbosity);
    session.start(&start, &cli.keywords);
    return ExitCode::from(session.run(&rx));
}

/// Settings from the config file, then command-line overrides.
///
/// # Errors
///
/// Returns errors from `Config::load`.
fn load_config(cli: &Cli) -> Result<Config, Error> {
    let mut config = Config::load(Path::new("."), cli.config.as_deref())?;
    if let Some(heading) = &cli.refhead {
        config.ref_heading.clone_from(heading);
    }
    if let Some(height) = cli.page_height {
        config.page_height = Some(clamp_page_height(height));
    }
    if let Some(width) = cli.page_width {
        config.page_width = clamp_page_width(width);
    }
    return Ok(config);
}

/// One document, written whole, then exit.
fn run_batch(cli: &Cli, config: &Config, start: &str) -> ExitCode {
    let sink = match &cli.output {
        Some(path) => match File::create(path) {
            Ok(file) => Sink::File { file, path: path.clone() },
            Err(source) => {
                eprintln!("error: {}", Error::OutputOpen { path: path.clone(), source });
                return ExitCode::from(OUTPUT_OPEN_FAILURE);
            },
        },
        None => Sink::Stream,
    };
    let options = BatchOptions {
        format: if cli.source { Format::Source } else { Format::Rendered },
        list_references: cli.listrefs,
        ref_heading: config.ref_heading.clone(),
    };
    let height = config.page_height.unwrap_or(DEFAULT_PAGE_HEIGHT);
    let mut library = LocalLibrary::new(height, config.page_width, !cli.no_anchors);
    return match batch::run(&mut library, start, &cli.keywords, &options, sink) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ (Error::Address { .. } | Error::Fetch { .. })) => {
            eprintln!("error: {e}");
            ExitCode::from(FIRST_DOCUMENT_UNREACHABLE)
        },
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    };
}

/// `--filter`: render standard input to standard output.
fn run_filter(cli: &Cli, config: &Config) -> ExitCode {
    let mut source = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut source) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    let format = if cli.source { Format::Source } else { Format::Rendered };
    let mut stdout = io::stdout().lock();
    return match batch::filter(&source, format, !cli.no_anchors, config.page_width, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    };
}

/// Read standard input line by line on its own thread so the session can
/// wait on input and fetch completions together.
fn spawn_input_reader(tx: Sender<Input>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(Input::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Input::Closed);
    });
}

/// The first document: the command line, the command-line help page, the
/// configured home page, or the working directory.
fn start_address(cli: &Cli, config: &Config) -> String {
    if cli.command_help {
        return config.command_help.clone();
    }
    return cli.address.clone().or_else(|| return config.home.clone()).unwrap_or_else(|| return ".".to_string());
}
