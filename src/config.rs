//! Pipeline configuration.
//!
//! The configuration is stored as TOML and validated once at load time. The
//! rest of the crate only ever sees a validated [`Config`]; a configuration
//! that fails to load or validate is replaced wholesale by the built-in
//! defaults (see [`Config::load_or_default`]).
//!
//! # Configuration File Format
//!
//! ```toml
//! include_hidden = false
//! recursive = true
//! conflict_policy = "suffix"
//! exclude_globs = ["*.tmp", "node_modules", ".git"]
//! preview_limit = 1000
//!
//! [overrides]
//! ".jpg" = "Photos"
//!
//! [[roots]]
//! path = "/home/me/Downloads"
//! destination = "/home/me/Sorted"
//!
//! [[custom_rules]]
//! name = "Music"
//! extensions = [".mp3", ".flac"]
//! destination = "Music"
//! ```

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file looked up first.
pub const LOCAL_CONFIG_FILE: &str = ".fileflowrc.toml";

/// Smallest accepted value for [`Config::preview_limit`].
pub const MIN_PREVIEW_LIMIT: usize = 100;
/// Largest accepted value for [`Config::preview_limit`].
pub const MAX_PREVIEW_LIMIT: usize = 10_000;

/// Errors that can occur while loading, validating or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// IO error while reading or writing configuration.
    #[error("IO error on configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    Parse(String),

    /// The configuration could not be serialized.
    #[error("Could not serialize configuration: {0}")]
    Serialize(String),

    /// An exclude glob does not compile.
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// One or more fields failed validation.
    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Strategy for a destination that is already occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the conflict unresolved and report it.
    #[default]
    Skip,
    /// Pick a free `name (k).ext` alternative.
    Suffix,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictPolicy::Skip => write!(f, "skip"),
            ConflictPolicy::Suffix => write!(f, "suffix"),
        }
    }
}

/// A directory tree to scan, with the tree its files are sorted into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeRoot {
    /// Absolute directory to scan.
    pub path: PathBuf,
    /// Where classified files land. Defaults to `path` itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

impl IncludeRoot {
    /// A root that sorts files in place.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            destination: None,
        }
    }

    /// A root whose files are sorted into a separate tree.
    pub fn with_destination(path: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            destination: Some(destination.into()),
        }
    }

    /// The tree this root's classified files are placed under.
    pub fn destination_root(&self) -> &Path {
        self.destination.as_deref().unwrap_or(&self.path)
    }
}

/// A named rule sending a set of extensions to one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRule {
    pub name: String,
    pub extensions: Vec<String>,
    pub destination: String,
}

impl CustomRule {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        extensions: impl IntoIterator<Item = S>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
            destination: destination.into(),
        }
    }
}

/// Validated pipeline configuration.
///
/// Scalar fields come first so the struct serializes to valid TOML
/// (plain values must precede tables).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Whether hidden files and directories (leading `.`) are scanned.
    #[serde(default)]
    pub include_hidden: bool,

    /// Whether subdirectories are scanned.
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Shell-style patterns matched against file and directory base names.
    #[serde(default)]
    pub exclude_globs: Vec<String>,

    /// Advisory cap for how many plan items a front end displays. The
    /// pipeline itself never truncates.
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,

    /// Explicit journal location. Defaults to a hidden file in the first root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,

    /// Extension to folder overrides; highest precedence.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,

    #[serde(default)]
    pub roots: Vec<IncludeRoot>,

    /// Checked in order; the first rule containing an extension wins.
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
}

fn default_recursive() -> bool {
    true
}

fn default_preview_limit() -> usize {
    1000
}

impl Config {
    /// A bare configuration over the given roots: no excludes, no rules, no
    /// overrides, `skip` policy, recursive, hidden files ignored.
    pub fn new(roots: Vec<IncludeRoot>) -> Self {
        Self {
            include_hidden: false,
            recursive: default_recursive(),
            conflict_policy: ConflictPolicy::default(),
            exclude_globs: Vec::new(),
            preview_limit: default_preview_limit(),
            journal: None,
            overrides: BTreeMap::new(),
            roots,
            custom_rules: Vec::new(),
        }
    }

    /// Load configuration, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.fileflowrc.toml` in the current directory
    /// 3. Look for `<config dir>/fileflow/config.toml`
    /// 4. Fall back to the built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read, parsed or validated.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.is_file() {
            return Self::load_from_file(&local_config);
        }

        if let Some(user_config) = default_config_path()
            && user_config.is_file()
        {
            return Self::load_from_file(&user_config);
        }

        Ok(Self::default())
    }

    /// Like [`Config::load`], but any failure yields the built-in defaults.
    ///
    /// The error, if any, is logged and handed back so a front end can show it
    /// once; the pipeline never runs on a partially valid configuration.
    pub fn load_or_default(config_path: Option<&Path>) -> (Self, Option<ConfigError>) {
        match Self::load(config_path) {
            Ok(config) => (config, None),
            Err(e) => {
                tracing::warn!(error = %e, "configuration rejected, using defaults");
                (Self::default(), Some(e))
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes this configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks every field, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.roots.is_empty() {
            errors.push("roots should contain at least one include root".to_string());
        }
        for (i, root) in self.roots.iter().enumerate() {
            if !root.path.is_absolute() {
                errors.push(format!(
                    "roots[{}].path should be absolute: {}",
                    i,
                    root.path.display()
                ));
            }
            if let Some(dest) = &root.destination
                && !dest.is_absolute()
            {
                errors.push(format!(
                    "roots[{}].destination should be absolute: {}",
                    i,
                    dest.display()
                ));
            }
        }

        for (i, rule) in self.custom_rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                errors.push(format!("custom_rules[{}].name should not be empty", i));
            }
            if rule.destination.trim().is_empty() {
                errors.push(format!("custom_rules[{}].destination should not be empty", i));
            }
            if rule.extensions.iter().all(|e| e.trim().is_empty()) {
                errors.push(format!(
                    "custom_rules[{}].extensions should list at least one extension",
                    i
                ));
            }
        }

        for (ext, folder) in &self.overrides {
            if folder.trim().is_empty() {
                errors.push(format!("overrides['{}'] should name a folder", ext));
            }
        }

        if !(MIN_PREVIEW_LIMIT..=MAX_PREVIEW_LIMIT).contains(&self.preview_limit) {
            errors.push(format!(
                "preview_limit should be between {} and {}",
                MIN_PREVIEW_LIMIT, MAX_PREVIEW_LIMIT
            ));
        }

        for pattern in &self.exclude_globs {
            if let Err(e) = Pattern::new(pattern) {
                errors.push(
                    ConfigError::InvalidGlob {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    }
                    .to_string(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Compiles the scan filter (hidden-file toggle plus exclude globs).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidGlob`] for the first pattern that fails.
    pub fn compile_filter(&self) -> Result<ScanFilter, ConfigError> {
        ScanFilter::new(self.include_hidden, &self.exclude_globs)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self::new(vec![IncludeRoot::new(default_include_root())]);
        config.exclude_globs = [
            "*.partial",
            "*.tmp",
            "*.bak",
            "*.swp",
            "node_modules",
            ".git",
            "dist",
            "build",
            "__pycache__",
            "Thumbs.db",
            ".DS_Store",
            "*.log",
            "*.cache",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        config.custom_rules = vec![CustomRule::new(
            "Music",
            [".mp3", ".wav", ".aac", ".flac", ".ogg", ".m4a", ".wma"],
            "Music",
        )];
        config
    }
}

/// Returns the per-user configuration file location, if a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fileflow").join("config.toml"))
}

/// `~/Downloads` when it exists, the home directory otherwise.
fn default_include_root() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => {
            let downloads = home.join("Downloads");
            if downloads.is_dir() { downloads } else { home }
        }
        None => std::env::temp_dir(),
    }
}

/// Compiled hidden-file and exclude-glob filter used by the scanner.
///
/// Patterns are matched against base names only, shell style. Matching is
/// case-insensitive on Windows and case-sensitive elsewhere.
#[derive(Debug, Clone)]
pub struct ScanFilter {
    include_hidden: bool,
    exclude_patterns: Vec<Pattern>,
}

impl ScanFilter {
    /// Compiles the given patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidGlob`] for the first pattern that fails.
    pub fn new<S: AsRef<str>>(include_hidden: bool, patterns: &[S]) -> Result<Self, ConfigError> {
        let exclude_patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_hidden,
            exclude_patterns,
        })
    }

    /// Whether a file with this base name should be yielded.
    pub fn should_include_file(&self, file_name: &str) -> bool {
        if !self.include_hidden && is_hidden(file_name) {
            return false;
        }
        !self.is_excluded(file_name)
    }

    /// Whether a directory with this base name should be descended into.
    pub fn should_descend(&self, dir_name: &str) -> bool {
        self.should_include_file(dir_name)
    }

    /// Whether a base name matches any exclude glob.
    pub fn is_excluded(&self, name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: !cfg!(windows),
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_with(name, options))
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn absolute(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.conflict_policy, ConflictPolicy::Skip);
        assert!(config.recursive);
        assert!(!config.include_hidden);
        assert_eq!(config.roots.len(), 1);
    }

    #[test]
    fn test_parse_full_document() {
        let root = absolute("inbox");
        let dest = absolute("sorted");
        let doc = format!(
            r#"
conflict_policy = "suffix"
recursive = false
exclude_globs = ["*.tmp"]

[overrides]
".jpg" = "Photos"

[[roots]]
path = "{}"
destination = "{}"

[[custom_rules]]
name = "Music"
extensions = [".mp3"]
destination = "Tunes"
"#,
            root.display().to_string().replace('\\', "\\\\"),
            dest.display().to_string().replace('\\', "\\\\"),
        );

        let config = Config::from_toml(&doc).expect("valid config");
        assert_eq!(config.conflict_policy, ConflictPolicy::Suffix);
        assert!(!config.recursive);
        assert_eq!(config.roots[0].destination_root(), dest.as_path());
        assert_eq!(config.overrides.get(".jpg").map(String::as_str), Some("Photos"));
        assert_eq!(config.custom_rules[0].destination, "Tunes");
        assert_eq!(config.preview_limit, 1000);
    }

    #[test]
    fn test_unknown_conflict_policy_rejected() {
        let doc = r#"
conflict_policy = "overwrite"
"#;
        assert!(matches!(Config::from_toml(doc), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::new(vec![IncludeRoot::new("relative/path")]);
        config.custom_rules.push(CustomRule::new("", Vec::<String>::new(), " "));
        config.preview_limit = 5;
        config.exclude_globs.push("[unclosed".to_string());

        match config.validate() {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors.len(), 6, "{:?}", errors);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_empty_roots() {
        let config = Config::new(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_falls_back_on_invalid_file() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "roots = 5").expect("write config");

        let (config, error) = Config::load_or_default(Some(&path));
        assert!(error.is_some());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_missing_explicit_file_is_error() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::new(vec![IncludeRoot::with_destination(
            temp.path().join("in"),
            temp.path().join("out"),
        )]);
        config.conflict_policy = ConflictPolicy::Suffix;
        config
            .overrides
            .insert(".png".to_string(), "Screens".to_string());
        config
            .custom_rules
            .push(CustomRule::new("Books", [".epub"], "Books"));

        config.save(&path).expect("save");
        let loaded = Config::load(Some(&path)).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_filter_hides_dotfiles_by_default() {
        let filter = ScanFilter::new::<&str>(false, &[]).unwrap();
        assert!(!filter.should_include_file(".DS_Store"));
        assert!(!filter.should_descend(".git"));
        assert!(filter.should_include_file("photo.jpg"));
    }

    #[test]
    fn test_filter_includes_dotfiles_when_enabled() {
        let filter = ScanFilter::new::<&str>(true, &[]).unwrap();
        assert!(filter.should_include_file(".env"));
        assert!(filter.should_descend(".config"));
    }

    #[test]
    fn test_filter_matches_base_names() {
        let filter = ScanFilter::new(true, &["*.tmp", "node_modules", "file?.txt"]).unwrap();
        assert!(filter.is_excluded("x.tmp"));
        assert!(filter.is_excluded("node_modules"));
        assert!(filter.is_excluded("file1.txt"));
        assert!(!filter.is_excluded("file12.txt"));
        assert!(!filter.is_excluded("my_node_modules"));
    }

    #[test]
    fn test_filter_invalid_glob() {
        let result = ScanFilter::new(false, &["[invalid"]);
        assert!(matches!(result, Err(ConfigError::InvalidGlob { .. })));
    }
}
