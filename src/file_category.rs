//! Built-in file categories and the extension table behind them.
//!
//! Each category carries a default destination folder name. The
//! [`ExtensionTable`] maps normalized extensions (lowercase, leading dot) to a
//! category; anything it does not know about lands in [`Category::Other`].
//!
//! # Examples
//!
//! ```
//! use fileflow::file_category::{Category, ExtensionTable};
//!
//! let table = ExtensionTable::default();
//! assert_eq!(table.category_of(".png"), Some(Category::Images));
//! assert_eq!(table.category_of(".pdf"), Some(Category::Docs));
//! assert_eq!(Category::Docs.folder_name(), "Docs");
//! ```

use std::collections::HashMap;

/// A broad file category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Raster and vector images (JPG, PNG, SVG, ...)
    Images,
    /// Documents, spreadsheets and presentations (PDF, DOCX, XLSX, ...)
    Docs,
    /// Video files (MP4, MKV, MOV, ...)
    Videos,
    /// Audio files (MP3, FLAC, WAV, ...)
    Audio,
    /// Compressed archives (ZIP, 7Z, TAR, ...)
    Archives,
    /// Source code and structured text (RS, PY, JSON, ...)
    Code,
    /// Anything not recognized
    Other,
}

impl Category {
    /// Returns the default destination folder name for this category.
    ///
    /// ```
    /// use fileflow::file_category::Category;
    ///
    /// assert_eq!(Category::Images.folder_name(), "Images");
    /// assert_eq!(Category::Other.folder_name(), "Other");
    /// ```
    pub fn folder_name(&self) -> &'static str {
        match self {
            Category::Images => "Images",
            Category::Docs => "Docs",
            Category::Videos => "Videos",
            Category::Audio => "Audio",
            Category::Archives => "Archives",
            Category::Code => "Code",
            Category::Other => "Other",
        }
    }
}

/// Maps file extensions to categories.
///
/// Keys are stored normalized, so lookups are case-insensitive and accept the
/// extension with or without its leading dot.
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    extension_map: HashMap<String, Category>,
}

impl ExtensionTable {
    /// Creates a table holding the standard mappings.
    pub fn new() -> Self {
        let mut table = Self {
            extension_map: HashMap::new(),
        };
        table.populate_standard_mappings();
        table
    }

    fn populate_standard_mappings(&mut self) {
        const STANDARD: &[(Category, &[&str])] = &[
            (
                Category::Images,
                &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "svg"],
            ),
            (
                Category::Docs,
                &[
                    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "md", "csv", "rtf",
                    "odt",
                ],
            ),
            (
                Category::Videos,
                &["mp4", "avi", "mov", "mkv", "flv", "wmv", "webm"],
            ),
            (
                Category::Audio,
                &["mp3", "wav", "aac", "flac", "ogg", "m4a", "wma"],
            ),
            (
                Category::Archives,
                &["zip", "rar", "tar", "gz", "7z", "bz2"],
            ),
            (
                Category::Code,
                &[
                    "py", "js", "java", "c", "cpp", "cs", "go", "php", "rb", "html", "css", "sh",
                    "sql", "json", "xml", "yaml", "yml", "rs", "swift", "kt", "pl", "lua", "dart",
                    "ts", "tsx", "jsx", "asm", "h", "hpp", "m",
                ],
            ),
        ];

        for (category, extensions) in STANDARD {
            for ext in *extensions {
                self.add_extension_mapping(ext, *category);
            }
        }
    }

    /// Adds (or replaces) an extension to category mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map
            .insert(crate::classifier::normalize_extension(ext), category);
    }

    /// Looks up the category for an extension.
    ///
    /// ```
    /// use fileflow::file_category::{Category, ExtensionTable};
    ///
    /// let table = ExtensionTable::default();
    /// assert_eq!(table.category_of("MP3"), Some(Category::Audio));
    /// assert_eq!(table.category_of(".xyz"), None);
    /// ```
    pub fn category_of(&self, ext: &str) -> Option<Category> {
        self.extension_map
            .get(&crate::classifier::normalize_extension(ext))
            .copied()
    }

    /// Returns the category for an extension, falling back to [`Category::Other`].
    pub fn categorize(&self, ext: &str) -> Category {
        self.category_of(ext).unwrap_or(Category::Other)
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_folder_names() {
        assert_eq!(Category::Images.folder_name(), "Images");
        assert_eq!(Category::Docs.folder_name(), "Docs");
        assert_eq!(Category::Videos.folder_name(), "Videos");
        assert_eq!(Category::Audio.folder_name(), "Audio");
        assert_eq!(Category::Archives.folder_name(), "Archives");
        assert_eq!(Category::Code.folder_name(), "Code");
        assert_eq!(Category::Other.folder_name(), "Other");
    }

    #[test]
    fn test_category_of_accepts_dotted_and_bare() {
        let table = ExtensionTable::default();
        assert_eq!(table.category_of(".jpg"), Some(Category::Images));
        assert_eq!(table.category_of("jpg"), Some(Category::Images));
    }

    #[test]
    fn test_category_of_case_insensitive() {
        let table = ExtensionTable::default();
        assert_eq!(table.category_of(".PDF"), Some(Category::Docs));
        assert_eq!(table.category_of(".Mp4"), Some(Category::Videos));
    }

    #[test]
    fn test_categorize_defaults_to_other() {
        let table = ExtensionTable::default();
        assert_eq!(table.categorize(""), Category::Other);
        assert_eq!(table.categorize(".unknownext"), Category::Other);
    }

    #[test]
    fn test_custom_mapping() {
        let mut table = ExtensionTable::default();
        table.add_extension_mapping(".heic", Category::Images);
        assert_eq!(table.category_of("heic"), Some(Category::Images));
    }
}
