//! The sorting engine.
//!
//! [`SortingEngine`] watches one directory (non-recursively) for newly
//! created files. Each creation event is filtered on the dispatcher thread
//! and then handed to its own worker thread, which waits out the debounce
//! delay, classifies the file and moves it into its category folder. A slow
//! or failing file never holds up the next one.
//!
//! The watch itself lives in a [`WatchHandle`] that is opened by
//! [`SortingEngine::start`] and closed by [`SortingEngine::stop`].

use crate::config::{ConfigError, IgnoreReason, IgnoreRules, Settings};
use crate::file_category::classify_path;
use crate::file_organizer::{FileOrganizer, OrganizeError};
use crate::listener::{MoveEvent, MoveListener, MoveOutcome};
use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default bound on how long [`SortingEngine::stop`] waits for the watch to
/// release.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle errors surfaced to the caller of `start`/`stop`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The root directory is missing, unusable, or its category folders
    /// could not be created.
    #[error("Cannot sort into {}: {source}", path.display())]
    Path {
        path: PathBuf,
        source: OrganizeError,
    },
    /// `start` was called while a watch is active.
    #[error("Already watching {}", .0.display())]
    AlreadyRunning(PathBuf),
    /// `stop` was called with no active watch.
    #[error("Sorting engine is not running")]
    NotRunning,
    /// The filesystem watch could not be registered.
    #[error("Failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
    /// The monitoring thread could not be spawned.
    #[error("Failed to spawn monitoring thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// The watch did not release within the shutdown timeout.
    #[error("Watch on {} did not shut down within {timeout:?}", path.display())]
    ShutdownTimeout { path: PathBuf, timeout: Duration },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Lifecycle state of a [`SortingEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopping,
}

/// Engine tuning, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wait between a file appearing and it being moved.
    pub debounce: Duration,
    pub shutdown_timeout: Duration,
    pub ignore: IgnoreRules,
}

impl EngineConfig {
    /// Builds the engine configuration from persisted settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            debounce: settings.debounce(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            ignore: settings.ignore_rules()?,
        })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(crate::config::DEFAULT_DEBOUNCE_MS),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            ignore: IgnoreRules::default(),
        }
    }
}

/// State shared by the dispatcher and every worker of one watch session.
struct SortContext {
    root: PathBuf,
    debounce: Duration,
    ignore: IgnoreRules,
    listener: Arc<dyn MoveListener>,
    accepting: AtomicBool,
}

impl SortContext {
    /// Filters one creation and, if it qualifies, schedules its move.
    fn dispatch(self: &Arc<Self>, path: PathBuf) {
        if path.is_dir() {
            debug!(path = %path.display(), "ignoring created directory");
            return;
        }

        match self.ignore.check(&path) {
            Some(IgnoreReason::Incomplete) => {
                debug!(path = %path.display(), "skipping incomplete download");
                return;
            }
            Some(IgnoreReason::Excluded) => {
                debug!(path = %path.display(), "skipping excluded file");
                return;
            }
            None => {}
        }

        let ctx = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("dirsort-worker".to_string())
            .spawn(move || ctx.debounce_and_sort(path));
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn worker thread");
        }
    }

    fn debounce_and_sort(&self, path: PathBuf) {
        thread::sleep(self.debounce);

        if !self.accepting.load(Ordering::Acquire) {
            debug!(path = %path.display(), "engine stopped during debounce, leaving file");
            return;
        }

        self.sort(path);
    }

    /// Classifies and moves one file, reporting success to the listener.
    ///
    /// Failures are logged and swallowed so monitoring continues.
    fn sort(&self, path: PathBuf) -> MoveEvent {
        let category = classify_path(&path);

        let outcome = match FileOrganizer::move_to_category(&self.root, &path, category) {
            Ok(destination) => MoveOutcome::Moved(destination),
            Err(e) => {
                error!(
                    path = %path.display(),
                    category = %category,
                    error = %e,
                    "error moving file"
                );
                MoveOutcome::Failed(e.to_string())
            }
        };

        let event = MoveEvent::new(path, category, outcome);
        if let MoveOutcome::Moved(destination) = &event.outcome {
            debug!(
                source = %event.source.display(),
                destination = %destination.display(),
                "moved file to {} folder",
                category
            );
            self.listener.file_sorted(&event);
        }
        event
    }
}

/// Paths reported as newly created files by a watch event.
///
/// Folder creations and every non-creation event yield nothing. Creations
/// of unknown kind are passed through and resolved against the filesystem
/// by the dispatcher.
fn created_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths,
        _ => Vec::new(),
    }
}

fn run_dispatcher(events: Receiver<notify::Result<Event>>, ctx: Arc<SortContext>) {
    // Ends once the watcher is dropped and releases its sender
    for result in events {
        match result {
            Ok(event) => {
                if !ctx.accepting.load(Ordering::Acquire) {
                    continue;
                }
                for path in created_paths(event) {
                    ctx.dispatch(path);
                }
            }
            Err(e) => warn!(error = %e, "watch error"),
        }
    }
}

/// An open watch on one directory.
///
/// Dropping the handle without closing it through the engine still deregisters the
/// watch but does not wait for the dispatcher.
pub struct WatchHandle {
    root: PathBuf,
    watcher: RecommendedWatcher,
    ctx: Arc<SortContext>,
    dispatcher: JoinHandle<()>,
    finished: Receiver<()>,
}

impl WatchHandle {
    fn open(
        root: &Path,
        config: &EngineConfig,
        listener: Arc<dyn MoveListener>,
    ) -> EngineResult<Self> {
        let watch_error = |source: notify::Error| EngineError::Watch {
            path: root.to_path_buf(),
            source,
        };

        let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(event_tx).map_err(watch_error)?;
        watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        let ctx = Arc::new(SortContext {
            root: root.to_path_buf(),
            debounce: config.debounce,
            ignore: config.ignore.clone(),
            listener,
            accepting: AtomicBool::new(true),
        });

        let (finished_tx, finished) = mpsc::channel();
        let dispatcher_ctx = Arc::clone(&ctx);
        let dispatcher = thread::Builder::new()
            .name("dirsort-dispatch".to_string())
            .spawn(move || {
                run_dispatcher(event_rx, dispatcher_ctx);
                let _ = finished_tx.send(());
            })
            .map_err(EngineError::Spawn)?;

        Ok(Self {
            root: root.to_path_buf(),
            watcher,
            ctx,
            dispatcher,
            finished,
        })
    }

    /// The watched directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stops accepting events, deregisters the watch and waits up to
    /// `timeout` for the dispatcher thread to finish.
    ///
    /// Moves already past their debounce wait may still complete afterwards.
    fn close(self, timeout: Duration) -> EngineResult<()> {
        let Self {
            root,
            mut watcher,
            ctx,
            dispatcher,
            finished,
        } = self;

        ctx.accepting.store(false, Ordering::Release);
        if let Err(e) = watcher.unwatch(&root) {
            // The directory may already be gone; dropping the watcher below
            // still releases it.
            debug!(path = %root.display(), error = %e, "unwatch failed");
        }
        drop(watcher);

        match finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if dispatcher.join().is_err() {
                    error!(path = %root.display(), "dispatcher thread panicked");
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(path = %root.display(), ?timeout, "watch did not shut down in time");
                Err(EngineError::ShutdownTimeout {
                    path: root,
                    timeout,
                })
            }
        }
    }
}

/// Watches a directory and sorts new files into category folders.
///
/// # Examples
///
/// ```no_run
/// use dirsort::listener::category_channel;
/// use dirsort::watcher::{EngineConfig, SortingEngine};
/// use std::sync::Arc;
///
/// let (listener, categories) = category_channel();
/// let mut engine = SortingEngine::new(EngineConfig::default(), Arc::new(listener));
/// engine.start("/home/me/Downloads")?;
///
/// for category in categories.take(3) {
///     println!("File moved to {} folder", category);
/// }
///
/// engine.stop()?;
/// # Ok::<(), dirsort::watcher::EngineError>(())
/// ```
pub struct SortingEngine {
    config: EngineConfig,
    listener: Arc<dyn MoveListener>,
    state: EngineState,
    handle: Option<WatchHandle>,
}

impl SortingEngine {
    pub fn new(config: EngineConfig, listener: Arc<dyn MoveListener>) -> Self {
        Self {
            config,
            listener,
            state: EngineState::Idle,
            handle: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The directory being watched, while running.
    pub fn root(&self) -> Option<&Path> {
        self.handle.as_ref().map(WatchHandle::root)
    }

    /// Creates the category folders under `root` and starts watching it.
    ///
    /// # Errors
    ///
    /// * `AlreadyRunning` if a watch is active (nothing changes)
    /// * `Path` if `root` is missing, not a writable directory, or a
    ///   category folder cannot be created
    /// * `Watch` / `Spawn` if monitoring cannot be set up
    pub fn start(&mut self, root: impl AsRef<Path>) -> EngineResult<()> {
        let root = root.as_ref();

        if let Some(handle) = &self.handle {
            return Err(EngineError::AlreadyRunning(handle.root().to_path_buf()));
        }

        FileOrganizer::ensure_category_dirs(root).map_err(|e| EngineError::Path {
            path: root.to_path_buf(),
            source: e,
        })?;

        let handle = WatchHandle::open(root, &self.config, Arc::clone(&self.listener))?;
        self.handle = Some(handle);
        self.state = EngineState::Running;

        info!(path = %root.display(), debounce = ?self.config.debounce, "started watching");
        Ok(())
    }

    /// Stops watching and waits for the watch to be released.
    ///
    /// The engine is back in [`EngineState::Idle`] afterwards, even when the
    /// shutdown timed out, and can be started again.
    ///
    /// # Errors
    ///
    /// * `NotRunning` if there is no active watch (nothing changes)
    /// * `ShutdownTimeout` if the watch did not release in time
    pub fn stop(&mut self) -> EngineResult<()> {
        let handle = self.handle.take().ok_or(EngineError::NotRunning)?;
        let root = handle.root().to_path_buf();

        self.state = EngineState::Stopping;
        let result = handle.close(self.config.shutdown_timeout);
        self.state = EngineState::Idle;

        if result.is_ok() {
            info!(path = %root.display(), "stopped watching");
        }
        result
    }
}

impl Drop for SortingEngine {
    fn drop(&mut self) {
        if self.handle.is_some()
            && let Err(e) = self.stop()
        {
            error!(error = %e, "failed to stop sorting engine on drop");
        }
    }
}

impl std::fmt::Debug for SortingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortingEngine")
            .field("state", &self.state)
            .field("root", &self.root())
            .field("debounce", &self.config.debounce)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::Category;
    use crate::listener::category_channel;
    use std::fs;
    use tempfile::TempDir;

    fn context(root: &Path, listener: Arc<dyn MoveListener>) -> Arc<SortContext> {
        Arc::new(SortContext {
            root: root.to_path_buf(),
            debounce: Duration::ZERO,
            ignore: IgnoreRules::default(),
            listener,
            accepting: AtomicBool::new(true),
        })
    }

    #[test]
    fn test_created_paths_filters_kinds() {
        let file = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/dl/a.pdf"));
        assert_eq!(created_paths(file), vec![PathBuf::from("/dl/a.pdf")]);

        let any = Event::new(EventKind::Create(CreateKind::Any))
            .add_path(PathBuf::from("/dl/b.zip"));
        assert_eq!(created_paths(any), vec![PathBuf::from("/dl/b.zip")]);

        let folder = Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/dl/PDFs"));
        assert!(created_paths(folder).is_empty());

        let removed = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("/dl/a.pdf"));
        assert!(created_paths(removed).is_empty());
    }

    #[test]
    fn test_sort_moves_and_notifies() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (listener, stream) = category_channel();
        let ctx = context(root, Arc::new(listener));

        let file = root.join("photo.JPG");
        fs::write(&file, "jpg").unwrap();

        let event = ctx.sort(file.clone());
        assert_eq!(event.category, Category::Images);
        assert_eq!(
            event.outcome,
            MoveOutcome::Moved(root.join("Images").join("photo.JPG"))
        );
        assert_eq!(stream.drain().len(), 1);
    }

    #[test]
    fn test_sort_failure_is_contained() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (listener, stream) = category_channel();
        let ctx = context(root, Arc::new(listener));

        let event = ctx.sort(root.join("vanished.pdf"));
        assert!(matches!(event.outcome, MoveOutcome::Failed(_)));
        assert!(stream.drain().is_empty());

        let file = root.join("next.zip");
        fs::write(&file, "zip").unwrap();
        let event = ctx.sort(file);
        assert!(event.destination().is_some());
        let delivered: Vec<_> = stream.drain().into_iter().map(|e| e.category).collect();
        assert_eq!(delivered, vec![Category::Archives]);
    }

    #[test]
    fn test_stopped_context_leaves_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (listener, stream) = category_channel();
        let ctx = context(root, Arc::new(listener));

        let file = root.join("late.mp4");
        fs::write(&file, "mp4").unwrap();
        ctx.accepting.store(false, Ordering::Release);
        ctx.debounce_and_sort(file.clone());

        assert!(file.exists());
        assert!(stream.drain().is_empty());
    }

    #[test]
    fn test_start_missing_root_is_path_error() {
        let temp_dir = TempDir::new().unwrap();
        let (listener, _stream) = category_channel();
        let mut engine = SortingEngine::new(EngineConfig::default(), Arc::new(listener));

        let result = engine.start(temp_dir.path().join("missing"));
        assert!(matches!(result, Err(EngineError::Path { .. })));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let (listener, _stream) = category_channel();
        let mut engine = SortingEngine::new(EngineConfig::default(), Arc::new(listener));

        assert!(matches!(engine.stop(), Err(EngineError::NotRunning)));

        engine.start(temp_dir.path()).expect("start failed");
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.root(), Some(temp_dir.path()));
        for category in Category::ALL {
            assert!(temp_dir.path().join(category.dir_name()).is_dir());
        }

        assert!(matches!(
            engine.start(temp_dir.path()),
            Err(EngineError::AlreadyRunning(_))
        ));
        assert_eq!(engine.state(), EngineState::Running);

        engine.stop().expect("stop failed");
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.root().is_none());
        assert!(matches!(engine.stop(), Err(EngineError::NotRunning)));

        // Restart over the existing folder set
        engine.start(temp_dir.path()).expect("restart failed");
        engine.stop().expect("second stop failed");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 8);
    }
}
