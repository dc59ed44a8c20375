/// File categorization by extension.
///
/// This module maps file extensions to one of eight fixed categories. The
/// mapping is total: any extension that is not listed, and files with no
/// extension at all, land in [`Category::Others`].
///
/// # Examples
///
/// ```
/// use dirsort::file_category::{Category, classify};
///
/// assert_eq!(classify("pdf"), Category::Pdfs);
/// assert_eq!(classify(".JPG"), Category::Images);
/// assert_eq!(classify("unknown"), Category::Others);
/// ```
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// A destination category for sorted files.
///
/// Each category owns one subfolder directly under the watched directory,
/// named exactly after [`Category::dir_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// PDF documents
    Pdfs,
    /// Raster and camera raw images
    Images,
    /// Installers, executables and scripts
    Software,
    /// Office documents and plain text
    Documents,
    /// Audio files (MP3, WAV, FLAC, etc.)
    Audio,
    /// Video files (MP4, MKV, AVI, etc.)
    Video,
    /// Compressed archives
    Archives,
    /// Everything else, including files without an extension
    Others,
}

impl Category {
    /// Every category, in the order their folders are created.
    pub const ALL: [Category; 8] = [
        Category::Pdfs,
        Category::Images,
        Category::Software,
        Category::Documents,
        Category::Audio,
        Category::Video,
        Category::Archives,
        Category::Others,
    ];

    /// Returns the directory name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::file_category::Category;
    ///
    /// assert_eq!(Category::Pdfs.dir_name(), "PDFs");
    /// assert_eq!(Category::Others.dir_name(), "Others");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Pdfs => "PDFs",
            Category::Images => "Images",
            Category::Software => "Software",
            Category::Documents => "Documents",
            Category::Audio => "Audio",
            Category::Video => "Video",
            Category::Archives => "Archives",
            Category::Others => "Others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Static extension table. Extensions are stored lower-case without a dot.
const EXTENSION_RULES: &[(Category, &[&str])] = &[
    (Category::Pdfs, &["pdf"]),
    (
        Category::Images,
        &[
            "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "raw", "cr2", "nef", "orf", "sr2",
        ],
    ),
    (Category::Software, &["exe", "msi", "bat", "sh", "py", "js"]),
    (
        Category::Documents,
        &[
            "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "odt",
        ],
    ),
    (Category::Audio, &["mp3", "wav", "aac", "flac", "ogg", "m4a"]),
    (
        Category::Video,
        &["mp4", "avi", "mkv", "mov", "wmv", "flv", "mpg", "mpeg"],
    ),
    (Category::Archives, &["zip", "rar", "7z", "tar", "gz", "bz2"]),
];

static DEFAULT_MAPPER: LazyLock<FileMapper> = LazyLock::new(FileMapper::new);

/// Maps file extensions to categories.
///
/// Built once from the static extension table; lookups are case-insensitive
/// and never fail.
#[derive(Debug, Clone)]
pub struct FileMapper {
    extension_map: HashMap<&'static str, Category>,
}

impl FileMapper {
    /// Creates a new `FileMapper` holding the standard extension table.
    pub fn new() -> Self {
        let extension_map = EXTENSION_RULES
            .iter()
            .flat_map(|(category, extensions)| extensions.iter().map(move |ext| (*ext, *category)))
            .collect();
        Self { extension_map }
    }

    /// Maps a file extension to a category.
    ///
    /// A single leading dot is ignored, so `"pdf"` and `".pdf"` resolve the
    /// same way. Unknown or empty extensions resolve to [`Category::Others`].
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::file_category::{Category, FileMapper};
    ///
    /// let mapper = FileMapper::default();
    /// assert_eq!(mapper.extension_to_category("PNG"), Category::Images);
    /// assert_eq!(mapper.extension_to_category(".tar"), Category::Archives);
    /// assert_eq!(mapper.extension_to_category(""), Category::Others);
    /// ```
    pub fn extension_to_category(&self, ext: &str) -> Category {
        let normalized = ext.strip_prefix('.').unwrap_or(ext).to_lowercase();
        self.extension_map
            .get(normalized.as_str())
            .copied()
            .unwrap_or(Category::Others)
    }

    /// Determines the category of a file from its path's extension.
    pub fn categorize_path(&self, path: &Path) -> Category {
        match path.extension() {
            Some(ext) => self.extension_to_category(&ext.to_string_lossy()),
            None => Category::Others,
        }
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies an extension with the standard table.
pub fn classify(extension: &str) -> Category {
    DEFAULT_MAPPER.extension_to_category(extension)
}

/// Classifies a file by the extension of its path.
///
/// ```
/// use dirsort::file_category::{Category, classify_path};
/// use std::path::Path;
///
/// assert_eq!(classify_path(Path::new("backup.tar.gz")), Category::Archives);
/// assert_eq!(classify_path(Path::new("README")), Category::Others);
/// ```
pub fn classify_path(path: &Path) -> Category {
    DEFAULT_MAPPER.categorize_path(path)
}
