/// Moving files into category directories.
///
/// This module materialises the category folders under a watched directory
/// and performs the single-file move used by the sorting engine, including
/// the name-conflict policy and the cross-device fallback.
use crate::file_category::Category;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while preparing folders or moving a file.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The base directory is missing, not a directory, or read-only.
    #[error("Invalid base path {}: {source}", path.display())]
    InvalidBasePath { path: PathBuf, source: io::Error },

    /// Failed to create a category directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// The file disappeared before it could be moved.
    #[error("File vanished before it could be moved: {}", path.display())]
    SourceMissing { path: PathBuf },

    /// The path has no file name component to carry over.
    #[error("File has no name component: {}", path.display())]
    NoFileName { path: PathBuf },

    /// The rename itself failed.
    #[error("Failed to move {} to {}: {error}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },

    /// A cross-device copy failed; any partial destination was removed.
    #[error("Failed to copy {} to {} across devices: {error}", from.display(), to.display())]
    CrossDeviceCopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },

    /// A cross-device copy succeeded but the original could not be removed,
    /// leaving the file in both places.
    #[error(
        "Copied {} to {} but could not remove the original: {error}",
        from.display(),
        to.display()
    )]
    SourceNotRemoved {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },
}

/// Per-file move failure as surfaced by the sorting engine.
pub type MoveError = OrganizeError;

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Organizes files by moving them into category subdirectories.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Creates every category directory under `base_path`.
    ///
    /// Directories that already exist are left alone, so calling this
    /// repeatedly is safe. Returns the created (or existing) directories in
    /// [`Category::ALL`] order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBasePath` if `base_path` does not exist, is not a
    /// directory or is read-only, and `DirectoryCreationFailed` if a
    /// category folder cannot be created.
    pub fn ensure_category_dirs(base_path: &Path) -> OrganizeResult<Vec<PathBuf>> {
        Self::validate_base_path(base_path)?;

        Category::ALL
            .iter()
            .map(|category| -> OrganizeResult<PathBuf> {
                let category_path = base_path.join(category.dir_name());
                fs::create_dir_all(&category_path).map_err(|e| {
                    OrganizeError::DirectoryCreationFailed {
                        path: category_path.clone(),
                        source: e,
                    }
                })?;
                Ok(category_path)
            })
            .collect()
    }

    fn validate_base_path(base_path: &Path) -> OrganizeResult<()> {
        let invalid = |kind: io::ErrorKind, reason: &str| OrganizeError::InvalidBasePath {
            path: base_path.to_path_buf(),
            source: io::Error::new(kind, reason.to_string()),
        };

        let metadata = fs::metadata(base_path).map_err(|e| OrganizeError::InvalidBasePath {
            path: base_path.to_path_buf(),
            source: e,
        })?;

        if !metadata.is_dir() {
            return Err(invalid(io::ErrorKind::NotADirectory, "not a directory"));
        }
        if metadata.permissions().readonly() {
            return Err(invalid(io::ErrorKind::PermissionDenied, "directory is read-only"));
        }
        Ok(())
    }

    /// Moves a file into its category directory within the base path.
    ///
    /// The file name is preserved. If a file with the same name already
    /// exists in the category directory, the moved file is renamed to
    /// `name (1).ext`, `name (2).ext` and so on, using the lowest free index.
    /// Existing files are never overwritten.
    ///
    /// Returns the final destination path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::file_category::Category;
    /// use dirsort::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// let result = FileOrganizer::move_to_category(
    ///     Path::new("/home/me/Downloads"),
    ///     Path::new("/home/me/Downloads/report.pdf"),
    ///     Category::Pdfs,
    /// );
    ///
    /// match result {
    ///     Ok(dest) => println!("Moved to {}", dest.display()),
    ///     Err(e) => eprintln!("Move failed: {}", e),
    /// }
    /// ```
    pub fn move_to_category(
        base_path: &Path,
        file_path: &Path,
        category: Category,
    ) -> OrganizeResult<PathBuf> {
        if !file_path.exists() {
            return Err(OrganizeError::SourceMissing {
                path: file_path.to_path_buf(),
            });
        }

        let category_path = base_path.join(category.dir_name());
        fs::create_dir_all(&category_path).map_err(|e| OrganizeError::DirectoryCreationFailed {
            path: category_path.clone(),
            source: e,
        })?;

        let destination_path = Self::claim_destination(&category_path, file_path)?;

        // The rename replaces the empty placeholder left by the claim
        match fs::rename(file_path, &destination_path) {
            Ok(()) => Ok(destination_path),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(
                    source = %file_path.display(),
                    destination = %destination_path.display(),
                    "rename crosses devices, falling back to copy"
                );
                Self::copy_then_remove(file_path, &destination_path)?;
                Ok(destination_path)
            }
            Err(e) => {
                Self::release_claim(&destination_path);
                if e.kind() == io::ErrorKind::NotFound && !file_path.exists() {
                    return Err(OrganizeError::SourceMissing {
                        path: file_path.to_path_buf(),
                    });
                }
                Err(OrganizeError::FileMoveFailure {
                    from: file_path.to_path_buf(),
                    to: destination_path,
                    error: e,
                })
            }
        }
    }

    /// Reserves the first free destination name in `category_path`.
    ///
    /// The name is taken by creating an empty file with `create_new`, so two
    /// concurrent moves can never pick the same destination.
    fn claim_destination(category_path: &Path, file_path: &Path) -> OrganizeResult<PathBuf> {
        let file_name = file_path
            .file_name()
            .ok_or_else(|| OrganizeError::NoFileName {
                path: file_path.to_path_buf(),
            })?;
        let stem = file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = file_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut index = 0u32;
        loop {
            let candidate = if index == 0 {
                category_path.join(file_name)
            } else {
                category_path.join(format!("{} ({}){}", stem, index, extension))
            };

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(_) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => index += 1,
                Err(e) => {
                    return Err(OrganizeError::FileMoveFailure {
                        from: file_path.to_path_buf(),
                        to: candidate,
                        error: e,
                    });
                }
            }
        }
    }

    fn release_claim(destination: &Path) {
        if let Err(e) = fs::remove_file(destination) {
            warn!(
                destination = %destination.display(),
                error = %e,
                "could not remove reserved destination"
            );
        }
    }

    /// Copies across devices and removes the source. Not retried.
    fn copy_then_remove(source: &Path, destination: &Path) -> OrganizeResult<()> {
        Self::copy_then_remove_with(source, destination, |path| fs::remove_file(path))
    }

    fn copy_then_remove_with(
        source: &Path,
        destination: &Path,
        remove_source: impl FnOnce(&Path) -> io::Result<()>,
    ) -> OrganizeResult<()> {
        if let Err(e) = fs::copy(source, destination) {
            if destination.exists() {
                Self::release_claim(destination);
            }
            return Err(OrganizeError::CrossDeviceCopyFailed {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                error: e,
            });
        }

        remove_source(source).map_err(|e| OrganizeError::SourceNotRemoved {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            error: e,
        })
    }
}
