//! Extension to destination-folder resolution.
//!
//! Lookup order is: explicit overrides, then custom rules (first rule that
//! lists the extension wins), then the built-in category table. Anything left
//! over goes to the `Other` folder, so [`RuleSet::resolve`] is total.

use crate::config::{Config, CustomRule};
use crate::file_category::{Category, ExtensionTable};
use std::collections::HashMap;

/// Normalizes an extension to its canonical form: trimmed, lowercase, with a
/// leading dot. The empty string stays empty.
///
/// ```
/// use fileflow::classifier::normalize_extension;
///
/// assert_eq!(normalize_extension("JPG"), ".jpg");
/// assert_eq!(normalize_extension(" .Tar "), ".tar");
/// assert_eq!(normalize_extension(""), "");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    extensions: Vec<String>,
    destination: String,
}

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    overrides: HashMap<String, String>,
    custom_rules: Vec<CompiledRule>,
    builtin: ExtensionTable,
}

impl RuleSet {
    /// Builds a rule set from override pairs and custom rules, on top of the
    /// built-in table. Blank override targets and blank rule destinations are
    /// ignored rather than producing an empty folder name.
    pub fn new<'a>(
        overrides: impl IntoIterator<Item = (&'a String, &'a String)>,
        custom_rules: &[CustomRule],
    ) -> Self {
        let overrides = overrides
            .into_iter()
            .filter(|(_, folder)| !folder.trim().is_empty())
            .map(|(ext, folder)| (normalize_extension(ext), folder.trim().to_string()))
            .collect();

        let custom_rules = custom_rules
            .iter()
            .filter(|rule| !rule.destination.trim().is_empty())
            .map(|rule| CompiledRule {
                extensions: rule
                    .extensions
                    .iter()
                    .map(|e| normalize_extension(e))
                    .filter(|e| !e.is_empty())
                    .collect(),
                destination: rule.destination.trim().to_string(),
            })
            .collect();

        Self {
            overrides,
            custom_rules,
            builtin: ExtensionTable::default(),
        }
    }

    /// Builds the rule set described by a configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.overrides, &config.custom_rules)
    }

    /// Resolves an extension (any case, with or without the dot) to a
    /// destination folder name. Never fails and never returns an empty name.
    ///
    /// ```
    /// use fileflow::classifier::RuleSet;
    ///
    /// let rules = RuleSet::default();
    /// assert_eq!(rules.resolve(".JPG"), "Images");
    /// assert_eq!(rules.resolve("txt"), "Docs");
    /// assert_eq!(rules.resolve(""), "Other");
    /// ```
    pub fn resolve(&self, ext: &str) -> &str {
        let ext = normalize_extension(ext);
        if ext.is_empty() {
            return Category::Other.folder_name();
        }

        if let Some(folder) = self.overrides.get(&ext) {
            return folder;
        }

        if let Some(rule) = self
            .custom_rules
            .iter()
            .find(|rule| rule.extensions.contains(&ext))
        {
            return &rule.destination;
        }

        self.builtin.categorize(&ext).folder_name()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(std::iter::empty(), &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_builtin_categories() {
        let rules = RuleSet::default();
        assert_eq!(rules.resolve(".jpg"), "Images");
        assert_eq!(rules.resolve(".pdf"), "Docs");
        assert_eq!(rules.resolve(".mkv"), "Videos");
        assert_eq!(rules.resolve(".flac"), "Audio");
        assert_eq!(rules.resolve(".7z"), "Archives");
        assert_eq!(rules.resolve(".rs"), "Code");
    }

    #[test]
    fn test_resolve_is_total() {
        let rules = RuleSet::default();
        for ext in ["", ".", "..", " ", "noext", ".UNKNOWN", "\u{e9}", ".tar.gz", "*"] {
            assert!(!rules.resolve(ext).is_empty(), "empty folder for {:?}", ext);
        }
        assert_eq!(rules.resolve("."), "Other");
        assert_eq!(rules.resolve(".weird"), "Other");
    }

    #[test]
    fn test_override_beats_custom_rule() {
        let map = overrides(&[(".mp3", "Podcasts")]);
        let rules = RuleSet::new(&map, &[CustomRule::new("Music", [".mp3"], "Music")]);
        assert_eq!(rules.resolve(".mp3"), "Podcasts");
    }

    #[test]
    fn test_custom_rule_beats_builtin() {
        let rules = RuleSet::new(
            std::iter::empty(),
            &[CustomRule::new("Shots", ["PNG"], "Screenshots")],
        );
        assert_eq!(rules.resolve(".png"), "Screenshots");
        assert_eq!(rules.resolve(".jpg"), "Images");
    }

    #[test]
    fn test_first_custom_rule_wins() {
        let rules = RuleSet::new(
            std::iter::empty(),
            &[
                CustomRule::new("A", [".epub"], "Books"),
                CustomRule::new("B", [".epub"], "Reading"),
            ],
        );
        assert_eq!(rules.resolve("epub"), "Books");
    }

    #[test]
    fn test_override_keys_normalized() {
        let map = overrides(&[("JPG", "Photos")]);
        let rules = RuleSet::new(&map, &[]);
        assert_eq!(rules.resolve(".jpg"), "Photos");
        assert_eq!(rules.resolve(".JPG"), "Photos");
    }

    #[test]
    fn test_blank_targets_ignored() {
        let map = overrides(&[(".jpg", "  ")]);
        let rules = RuleSet::new(&map, &[CustomRule::new("Empty", [".jpg"], "")]);
        assert_eq!(rules.resolve(".jpg"), "Images");
    }
}
