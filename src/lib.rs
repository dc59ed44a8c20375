//! dirsort - keep a downloads folder tidy as files arrive
//!
//! This library watches a directory for newly created files and moves each
//! one into a category subfolder (`PDFs`, `Images`, `Software`, `Documents`,
//! `Audio`, `Video`, `Archives`, `Others`) chosen by its extension. Every
//! successful move is reported to an injected listener.

pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod listener;
pub mod output;
pub mod watcher;

pub use config::{ConfigError, IgnoreRules, Settings};
pub use file_category::{Category, FileMapper, classify, classify_path};
pub use file_organizer::{FileOrganizer, MoveError, OrganizeError};
pub use listener::{CategoryStream, MoveEvent, MoveListener, MoveOutcome, category_channel};
pub use watcher::{EngineConfig, EngineError, EngineState, SortingEngine};
