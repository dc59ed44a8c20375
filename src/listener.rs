//! Status notifications emitted by the sorting engine.
//!
//! The engine reports every successful move to a [`MoveListener`] handed to
//! it at construction. [`category_channel`] builds a listener backed by a
//! channel whose receiving half is a lazy, unbounded iterator of categories,
//! one per sorted file.

use crate::file_category::Category;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::info;

/// How handling a single created file ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The file now lives at this path.
    Moved(PathBuf),
    /// The move failed; the reason has already been logged.
    Failed(String),
}

/// Record of one processed creation event.
#[derive(Debug, Clone)]
pub struct MoveEvent {
    /// Where the file was created.
    pub source: PathBuf,
    /// The category its extension resolved to.
    pub category: Category,
    pub outcome: MoveOutcome,
    /// When the move attempt finished.
    pub at: DateTime<Local>,
}

impl MoveEvent {
    pub fn new(source: PathBuf, category: Category, outcome: MoveOutcome) -> Self {
        Self {
            source,
            category,
            outcome,
            at: Local::now(),
        }
    }

    /// Destination path if the move succeeded.
    pub fn destination(&self) -> Option<&PathBuf> {
        match &self.outcome {
            MoveOutcome::Moved(path) => Some(path),
            MoveOutcome::Failed(_) => None,
        }
    }
}

/// Receives a notification for every file the engine sorted.
///
/// Called from worker threads, possibly concurrently. Failed moves are
/// never reported here.
pub trait MoveListener: Send + Sync {
    fn file_sorted(&self, event: &MoveEvent);
}

/// Listener that only writes a log line per sorted file.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl MoveListener for LogListener {
    fn file_sorted(&self, event: &MoveEvent) {
        info!(
            source = %event.source.display(),
            category = %event.category,
            "file moved to {} folder",
            event.category
        );
    }
}

/// Listener half of a category channel.
#[derive(Debug)]
pub struct ChannelListener {
    tx: Sender<MoveEvent>,
}

impl MoveListener for ChannelListener {
    fn file_sorted(&self, event: &MoveEvent) {
        // A dropped receiver just means nobody is watching the stream anymore
        let _ = self.tx.send(event.clone());
    }
}

/// Receiving half of a category channel.
///
/// Iterating yields categories in the order moves completed and blocks until
/// the next one arrives. The iterator ends once the engine holding the
/// matching [`ChannelListener`] has been dropped.
#[derive(Debug)]
pub struct CategoryStream {
    rx: Receiver<MoveEvent>,
}

impl CategoryStream {
    /// Waits up to `timeout` for the next sorted file.
    ///
    /// Returns `None` on timeout or once the sender is gone.
    pub fn next_timeout(&self, timeout: Duration) -> Option<MoveEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns every event already delivered without blocking.
    pub fn drain(&self) -> Vec<MoveEvent> {
        self.rx.try_iter().collect()
    }

    /// Blocking iterator over the full move events.
    pub fn events(&self) -> impl Iterator<Item = MoveEvent> + '_ {
        self.rx.iter()
    }
}

impl Iterator for CategoryStream {
    type Item = Category;

    fn next(&mut self) -> Option<Category> {
        self.rx.recv().ok().map(|event| event.category)
    }
}

/// Creates a connected listener/stream pair. Use a fresh pair per session.
pub fn category_channel() -> (ChannelListener, CategoryStream) {
    let (tx, rx) = mpsc::channel();
    (
        ChannelListener { tx },
        CategoryStream { rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn moved(name: &str, category: Category) -> MoveEvent {
        let source = Path::new("/dl").join(name);
        let dest = Path::new("/dl").join(category.dir_name()).join(name);
        MoveEvent::new(source, category, MoveOutcome::Moved(dest))
    }

    #[test]
    fn test_channel_delivers_categories_in_order() {
        let (listener, stream) = category_channel();
        listener.file_sorted(&moved("a.pdf", Category::Pdfs));
        listener.file_sorted(&moved("b.mp3", Category::Audio));
        drop(listener);

        let categories: Vec<_> = stream.collect();
        assert_eq!(categories, vec![Category::Pdfs, Category::Audio]);
    }

    #[test]
    fn test_next_timeout_on_empty_stream() {
        let (_listener, stream) = category_channel();
        assert!(stream.next_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_listener_survives_dropped_stream() {
        let (listener, stream) = category_channel();
        drop(stream);
        listener.file_sorted(&moved("c.zip", Category::Archives));
    }

    #[test]
    fn test_destination_only_for_moved() {
        let ok = moved("a.pdf", Category::Pdfs);
        assert_eq!(
            ok.destination(),
            Some(&Path::new("/dl/PDFs/a.pdf").to_path_buf())
        );

        let failed = MoveEvent::new(
            PathBuf::from("/dl/x.txt"),
            Category::Documents,
            MoveOutcome::Failed("locked".to_string()),
        );
        assert!(failed.destination().is_none());
    }
}
