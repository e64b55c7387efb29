//! Lazy traversal of the include roots.
//!
//! Excluded and hidden directories are pruned before they are entered, so
//! nothing beneath them is ever yielded. Directories that cannot be listed are
//! skipped and the walk carries on.

use crate::config::{Config, ConfigError, ScanFilter};
use crate::journal::{JOURNAL_FILE_NAME, Journal};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A candidate file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Exact suffix including the dot, case preserved; empty when the file
    /// has no extension.
    pub extension: String,
}

impl ScanEntry {
    pub fn new(path: PathBuf) -> Self {
        let extension = extension_of(&path);
        Self { path, extension }
    }
}

/// Returns the extension of `path` with its leading dot, or an empty string.
///
/// ```
/// use fileflow::scanner::extension_of;
/// use std::path::Path;
///
/// assert_eq!(extension_of(Path::new("/a/photo.JPG")), ".JPG");
/// assert_eq!(extension_of(Path::new("/a/archive.tar.gz")), ".gz");
/// assert_eq!(extension_of(Path::new("/a/.bashrc")), "");
/// assert_eq!(extension_of(Path::new("/a/README")), "");
/// ```
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Walks a set of include roots.
#[derive(Debug, Clone)]
pub struct Scanner {
    roots: Vec<PathBuf>,
    filter: ScanFilter,
    recursive: bool,
    excluded: Vec<PathBuf>,
}

impl Scanner {
    pub fn new(roots: Vec<PathBuf>, filter: ScanFilter, recursive: bool) -> Self {
        Self {
            roots,
            filter,
            recursive,
            excluded: Vec::new(),
        }
    }

    /// Never yields the file at `path`, wherever it sits under the roots.
    pub fn excluding(mut self, path: &Path) -> Self {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.excluded.contains(&path) {
            self.excluded.push(path);
        }
        self
    }

    /// Builds a scanner over every include root of `config`, skipping the
    /// journal the configuration points at.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let scanner = Self::new(
            config.roots.iter().map(|r| r.path.clone()).collect(),
            config.compile_filter()?,
            config.recursive,
        );
        Ok(scanner.excluding(Journal::for_config(config).path()))
    }

    /// Starts a fresh traversal. Each call walks the filesystem again.
    pub fn scan(&self) -> ScanIter {
        ScanIter {
            pending_roots: self.roots.clone().into_iter(),
            walker: None,
            filter: self.filter.clone(),
            excluded: self.excluded.clone(),
            max_depth: if self.recursive { usize::MAX } else { 1 },
        }
    }
}

/// Iterator over [`ScanEntry`] values, one root after another.
///
/// Entries within a directory are visited in file-name order so a given
/// snapshot always scans the same way.
pub struct ScanIter {
    pending_roots: std::vec::IntoIter<PathBuf>,
    walker: Option<walkdir::IntoIter>,
    filter: ScanFilter,
    excluded: Vec<PathBuf>,
    max_depth: usize,
}

impl ScanIter {
    fn is_excluded(&self, path: &Path) -> bool {
        let name = path.file_name();
        self.excluded
            .iter()
            .filter(|excluded| excluded.file_name() == name)
            .any(|excluded| {
                excluded == path
                    || fs::canonicalize(path).is_ok_and(|canonical| &canonical == excluded)
            })
    }

    fn next_walker(&mut self) -> Option<walkdir::IntoIter> {
        for root in self.pending_roots.by_ref() {
            if !root.is_dir() {
                tracing::debug!(root = %root.display(), "include root missing, skipping");
                continue;
            }
            return Some(
                WalkDir::new(root)
                    .min_depth(1)
                    .max_depth(self.max_depth)
                    .sort_by_file_name()
                    .into_iter(),
            );
        }
        None
    }
}

impl Iterator for ScanIter {
    type Item = ScanEntry;

    fn next(&mut self) -> Option<ScanEntry> {
        loop {
            if self.walker.is_none() {
                self.walker = Some(self.next_walker()?);
            }
            let walker = self.walker.as_mut()?;

            let entry = match walker.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    tracing::debug!(
                        path = ?e.path(),
                        error = %e,
                        "skipping unreadable location"
                    );
                    continue;
                }
                None => {
                    self.walker = None;
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if !self.filter.should_descend(&name) {
                    tracing::debug!(dir = %entry.path().display(), "pruned directory");
                    walker.skip_current_dir();
                }
                continue;
            }

            // Never hand a journal to the planner.
            if name == JOURNAL_FILE_NAME || self.is_excluded(entry.path()) {
                continue;
            }

            if file_type.is_file() && self.filter.should_include_file(&name) {
                return Some(ScanEntry::new(entry.into_path()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(base: &Path, rel: &str) {
        let path = base.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, rel).expect("write file");
    }

    fn scan_names(root: &Path, excludes: &[&str], hidden: bool, recursive: bool) -> Vec<String> {
        let filter = ScanFilter::new(hidden, excludes).expect("filter");
        let scanner = Scanner::new(vec![root.to_path_buf()], filter, recursive);
        let mut names: Vec<String> = scanner
            .scan()
            .map(|e| {
                e.path
                    .strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_non_recursive_lists_only_top_level_files() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.jpg");
        touch(temp.path(), "sub/b.jpg");

        assert_eq!(scan_names(temp.path(), &[], false, false), vec!["a.jpg"]);
    }

    #[test]
    fn test_recursive_descends() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.jpg");
        touch(temp.path(), "sub/deeper/b.jpg");

        assert_eq!(
            scan_names(temp.path(), &[], false, true),
            vec!["a.jpg", "sub/deeper/b.jpg"]
        );
    }

    #[test]
    fn test_excluded_files_never_yielded() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "x.tmp");
        touch(temp.path(), "sub/y.tmp");
        touch(temp.path(), "keep.txt");

        assert_eq!(scan_names(temp.path(), &["*.tmp"], false, true), vec!["keep.txt"]);
        assert_eq!(scan_names(temp.path(), &["*.tmp"], false, false), vec!["keep.txt"]);
    }

    #[test]
    fn test_excluded_directory_is_pruned() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "node_modules/pkg/index.js");
        touch(temp.path(), "node_modules/readme.md");
        touch(temp.path(), "src/app.js");

        assert_eq!(
            scan_names(temp.path(), &["node_modules"], false, true),
            vec!["src/app.js"]
        );
    }

    #[test]
    fn test_hidden_entries() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), ".env");
        touch(temp.path(), ".cache/data.bin");
        touch(temp.path(), "visible.txt");

        assert_eq!(scan_names(temp.path(), &[], false, true), vec!["visible.txt"]);
        assert_eq!(
            scan_names(temp.path(), &[], true, true),
            vec![".cache/data.bin", ".env", "visible.txt"]
        );
    }

    #[test]
    fn test_journal_is_never_scanned() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), JOURNAL_FILE_NAME);
        touch(temp.path(), "a.txt");

        assert_eq!(scan_names(temp.path(), &[], true, true), vec!["a.txt"]);
    }

    #[test]
    fn test_excluded_path_is_never_scanned() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "moves.jsonl");
        touch(temp.path(), "sub/moves.jsonl");

        let filter = ScanFilter::new::<&str>(false, &[]).unwrap();
        let scanner = Scanner::new(vec![temp.path().to_path_buf()], filter, true)
            .excluding(&temp.path().join("moves.jsonl"));
        let paths: Vec<_> = scanner.scan().map(|e| e.path).collect();

        assert_eq!(paths, vec![temp.path().join("sub").join("moves.jsonl")]);
    }

    #[test]
    fn test_configured_journal_is_never_scanned() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "moves.jsonl");
        touch(temp.path(), "a.txt");

        let mut config = Config::new(vec![crate::config::IncludeRoot::new(temp.path())]);
        config.journal = Some(temp.path().join("moves.jsonl"));
        let names: Vec<_> = Scanner::from_config(&config)
            .unwrap()
            .scan()
            .map(|e| e.path)
            .collect();

        assert_eq!(names, vec![temp.path().join("a.txt")]);
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.txt");

        let filter = ScanFilter::new::<&str>(false, &[]).unwrap();
        let scanner = Scanner::new(
            vec![temp.path().join("missing"), temp.path().to_path_buf()],
            filter,
            true,
        );
        let entries: Vec<_> = scanner.scan().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].extension, ".txt");
    }

    #[test]
    fn test_scan_is_restartable() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.txt");
        touch(temp.path(), "b.txt");

        let filter = ScanFilter::new::<&str>(false, &[]).unwrap();
        let scanner = Scanner::new(vec![temp.path().to_path_buf()], filter, true);
        let first: Vec<_> = scanner.scan().collect();
        let second: Vec<_> = scanner.scan().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_extensionless_file_has_empty_extension() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Makefile");

        let filter = ScanFilter::new::<&str>(false, &[]).unwrap();
        let scanner = Scanner::new(vec![temp.path().to_path_buf()], filter, false);
        let entries: Vec<_> = scanner.scan().collect();
        assert_eq!(entries[0].extension, "");
    }
}
