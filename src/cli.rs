//! Command-line interface module for dirsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Logging setup
//! - Resolving and persisting the watched directory
//! - The interactive and silent (headless) launch modes

use crate::config::{ConfigError, Settings};
use crate::file_category::Category;
use crate::listener::{LogListener, category_channel};
use crate::output::OutputFormatter;
use crate::watcher::{EngineConfig, EngineError, SortingEngine};
use clap::Parser;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Watch a directory and sort new files into category folders.
#[derive(Debug, Parser)]
#[command(name = "dirsort", version, about)]
pub struct Args {
    /// Directory to watch (defaults to the saved directory)
    pub directory: Option<PathBuf>,

    /// Run without interactive controls using the saved directory
    #[arg(long)]
    pub silent: bool,

    /// Settings file to use instead of the default lookup
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Remember the chosen directory for later runs
    #[arg(long, conflicts_with = "silent")]
    pub save: bool,

    /// Milliseconds to wait before moving a new file
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

/// How the process was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Prompted/argument path, live status lines, stop on Enter.
    Interactive,
    /// Saved path only, log output only, runs until terminated.
    Silent,
}

impl Args {
    pub fn mode(&self) -> LaunchMode {
        if self.silent {
            LaunchMode::Silent
        } else {
            LaunchMode::Interactive
        }
    }
}

/// Errors reported by the command-line front end.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Please select a downloads folder.")]
    NoDirectory,
    #[error("Nowhere to save settings; set HOME or pass --config")]
    NoSettingsLocation,
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise silent mode logs at `info` and the
/// interactive mode only at `warn`, both raised to `debug` by `--verbose`.
pub fn init_logging(mode: LaunchMode, verbose: bool) {
    let default_level = match (verbose, mode) {
        (true, _) => "debug",
        (false, LaunchMode::Silent) => "info",
        (false, LaunchMode::Interactive) => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Ignore the error from a subscriber that was already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Runs the selected launch mode.
pub fn run(args: Args) -> Result<(), CliError> {
    init_logging(args.mode(), args.verbose);

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(ms) = args.debounce_ms {
        settings.watch.debounce_ms = ms;
    }

    match args.mode() {
        LaunchMode::Interactive => run_interactive(&args, settings),
        LaunchMode::Silent => run_silent(&args, settings),
    }
}

/// Interactive mode: choose a directory, sort until the user presses Enter.
fn run_interactive(args: &Args, mut settings: Settings) -> Result<(), CliError> {
    let stdin = io::stdin();

    let (directory, prompted) = match resolve_directory(args.directory.as_deref(), &settings) {
        Some(directory) => (directory, false),
        None => (prompt_directory(&mut stdin.lock())?, true),
    };

    let (listener, stream) = category_channel();
    let config = EngineConfig::from_settings(&settings)?;
    let mut engine = SortingEngine::new(config, Arc::new(listener));
    let remember = args.save || prompted;
    start_and_remember(
        &mut engine,
        &directory,
        remember,
        &mut settings,
        args.config.as_deref(),
    )?;

    OutputFormatter::success(&format!("File sorting started on {}", directory.display()));
    let spinner =
        OutputFormatter::watch_spinner("Watching for new files, press Enter to stop".to_string());

    let printer_spinner = spinner.clone();
    let printer = thread::spawn(move || {
        let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
        for event in stream.events() {
            printer_spinner.println(OutputFormatter::moved_line(&event));
            *counts.entry(event.category).or_insert(0) += 1;
        }
        counts
    });

    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;

    let stopped = engine.stop();
    // Dropping the engine lets the stream end once in-flight moves finish
    drop(engine);
    let counts = printer.join().unwrap_or_default();
    spinner.finish_and_clear();
    stopped?;

    OutputFormatter::success("File sorting stopped.");
    if !counts.is_empty() {
        OutputFormatter::summary_table(&counts);
    }
    Ok(())
}

/// Silent mode: sort the saved directory until the process is terminated.
fn run_silent(args: &Args, settings: Settings) -> Result<(), CliError> {
    let directory = match args.directory.as_deref() {
        Some(directory) => directory.to_path_buf(),
        None => settings.watch_directory()?.to_path_buf(),
    };

    let config = EngineConfig::from_settings(&settings)?;
    let mut engine = SortingEngine::new(config, Arc::new(LogListener));
    engine.start(&directory)?;
    info!(path = %directory.display(), "running in silent mode");

    loop {
        thread::park_timeout(Duration::from_secs(3600));
    }
}

/// Starts the engine and, if asked, saves the directory it now watches.
///
/// A directory the engine rejects is never saved.
fn start_and_remember(
    engine: &mut SortingEngine,
    directory: &Path,
    remember: bool,
    settings: &mut Settings,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    engine.start(directory)?;
    if remember {
        settings.watch.directory = Some(directory.to_path_buf());
        persist(settings, config_path)?;
    }
    Ok(())
}

/// Picks the directory given on the command line, else the saved one.
fn resolve_directory(arg: Option<&Path>, settings: &Settings) -> Option<PathBuf> {
    arg.map(Path::to_path_buf)
        .or_else(|| settings.watch.directory.clone())
}

/// Asks for a directory on the terminal.
fn prompt_directory(input: &mut impl BufRead) -> Result<PathBuf, CliError> {
    print!("Downloads folder: ");
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(CliError::NoDirectory);
    }
    Ok(PathBuf::from(trimmed))
}

/// Saves settings where they were loaded from, or to the home config file.
fn persist(settings: &Settings, config_path: Option<&Path>) -> Result<(), CliError> {
    let target = Settings::locate(config_path)
        .or_else(Settings::home_config_path)
        .ok_or(CliError::NoSettingsLocation)?;
    settings.save(&target)?;
    info!(path = %target.display(), "saved settings");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_args_modes() {
        let args = Args::parse_from(["dirsort", "--silent"]);
        assert_eq!(args.mode(), LaunchMode::Silent);
        assert!(args.directory.is_none());

        let args = Args::parse_from(["dirsort", "/dl", "--save", "--debounce-ms", "250"]);
        assert_eq!(args.mode(), LaunchMode::Interactive);
        assert_eq!(args.directory, Some(PathBuf::from("/dl")));
        assert!(args.save);
        assert_eq!(args.debounce_ms, Some(250));
    }

    #[test]
    fn test_save_conflicts_with_silent() {
        assert!(Args::try_parse_from(["dirsort", "--silent", "--save"]).is_err());
    }

    #[test]
    fn test_resolve_directory_prefers_argument() {
        let mut settings = Settings::default();
        settings.watch.directory = Some(PathBuf::from("/saved"));

        assert_eq!(
            resolve_directory(Some(Path::new("/arg")), &settings),
            Some(PathBuf::from("/arg"))
        );
        assert_eq!(
            resolve_directory(None, &settings),
            Some(PathBuf::from("/saved"))
        );
        assert_eq!(resolve_directory(None, &Settings::default()), None);
    }

    #[test]
    fn test_prompt_directory() {
        let mut input = Cursor::new("  /home/me/Downloads \n");
        assert_eq!(
            prompt_directory(&mut input).unwrap(),
            PathBuf::from("/home/me/Downloads")
        );

        let mut empty = Cursor::new("\n");
        assert!(matches!(
            prompt_directory(&mut empty),
            Err(CliError::NoDirectory)
        ));
    }

    #[test]
    fn test_persist_to_explicit_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.watch.directory = Some(PathBuf::from("/dl"));
        persist(&settings, Some(&path)).unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded.watch.directory, Some(PathBuf::from("/dl")));
    }

    #[test]
    fn test_rejected_directory_is_not_saved() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        let typo = temp_dir.path().join("Downlaods");

        let mut settings = Settings::default();
        let mut engine = SortingEngine::new(EngineConfig::default(), Arc::new(LogListener));
        let result =
            start_and_remember(&mut engine, &typo, true, &mut settings, Some(&path));

        assert!(matches!(result, Err(CliError::Engine(EngineError::Path { .. }))));
        assert!(!path.exists());
        assert_eq!(settings.watch.directory, None);
    }

    #[test]
    fn test_accepted_directory_is_saved() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        let downloads = temp_dir.path().join("Downloads");
        std::fs::create_dir(&downloads).unwrap();

        let mut settings = Settings::default();
        let mut engine = SortingEngine::new(EngineConfig::default(), Arc::new(LogListener));
        start_and_remember(&mut engine, &downloads, true, &mut settings, Some(&path))
            .expect("start failed");
        engine.stop().unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded.watch.directory, Some(downloads));
    }
}
