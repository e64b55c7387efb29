//! Destination conflict helpers shared by the planner and the applier.
//!
//! A destination is *occupied* when a file already exists there or when an
//! earlier item of the same pass has claimed it. Under the `suffix` policy an
//! occupied destination is replaced by the first free `name (k).ext`.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Trailing ` (k)` counter on a file stem.
static COUNTER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.*) \((?P<n>\d+)\)$").expect("counter suffix regex is valid")
});

/// Largest trailing counter that is continued rather than treated as part of
/// the name.
const MAX_COUNTER: u64 = u32::MAX as u64;

/// Splits a file name into the stem used for numbering and the starting
/// counter.
///
/// `photo` yields `("photo", 1)`; `photo (3)` yields `("photo", 4)`. A
/// counter too large to continue stays in the name and numbering restarts at 1.
fn numbering_base(stem: &str) -> (String, u64) {
    if let Some(caps) = COUNTER_SUFFIX.captures(stem)
        && let Ok(n) = caps["n"].parse::<u64>()
        && n < MAX_COUNTER
    {
        return (caps["base"].to_string(), n + 1);
    }
    (stem.to_string(), 1)
}

/// Candidate names for an occupied destination, in the order they are tried.
///
/// ```
/// use fileflow::conflict::suffixed_candidates;
/// use std::path::PathBuf;
///
/// let mut names = suffixed_candidates(&PathBuf::from("/d/photo.jpg"));
/// assert_eq!(names.next(), Some(PathBuf::from("/d/photo (1).jpg")));
/// assert_eq!(names.next(), Some(PathBuf::from("/d/photo (2).jpg")));
///
/// let mut names = suffixed_candidates(&PathBuf::from("/d/photo (4).jpg"));
/// assert_eq!(names.next(), Some(PathBuf::from("/d/photo (5).jpg")));
/// ```
pub fn suffixed_candidates(dest: &Path) -> impl Iterator<Item = PathBuf> + use<> {
    let parent = dest.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = crate::scanner::extension_of(dest);
    let (base, start) = numbering_base(&stem);

    (start..).map(move |n| parent.join(format!("{} ({}){}", base, n, extension)))
}

/// Destinations already claimed within one pass, mapped to the source that
/// claimed them.
///
/// Local to a single preview or apply pass; never shared between passes.
#[derive(Debug, Default)]
pub struct Claims {
    claimed: HashMap<PathBuf, PathBuf>,
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `dest` as claimed by `source`.
    pub fn claim(&mut self, dest: PathBuf, source: PathBuf) {
        self.claimed.insert(dest, source);
    }

    /// The source that claimed `dest`, if any.
    pub fn claimant(&self, dest: &Path) -> Option<&Path> {
        self.claimed.get(dest).map(PathBuf::as_path)
    }

    pub fn is_claimed(&self, dest: &Path) -> bool {
        self.claimed.contains_key(dest)
    }

    /// Whether `dest` is taken on disk or by an earlier claim.
    pub fn is_occupied(&self, dest: &Path) -> bool {
        self.is_claimed(dest) || dest.exists()
    }

    /// First suffixed alternative to `dest` that is neither on disk nor claimed.
    pub fn free_alternative(&self, dest: &Path) -> PathBuf {
        suffixed_candidates(dest)
            .find(|candidate| !self.is_occupied(candidate))
            .unwrap_or_else(|| dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_numbering_base() {
        assert_eq!(numbering_base("photo"), ("photo".to_string(), 1));
        assert_eq!(numbering_base("photo (1)"), ("photo".to_string(), 2));
        assert_eq!(numbering_base("photo (12)"), ("photo".to_string(), 13));
        assert_eq!(numbering_base("photo(1)"), ("photo(1)".to_string(), 1));
        assert_eq!(numbering_base("a (b)"), ("a (b)".to_string(), 1));
    }

    #[test]
    fn test_huge_counter_restarts_numbering() {
        let stem = format!("photo ({})", u64::MAX);
        assert_eq!(numbering_base(&stem), (stem.clone(), 1));
        assert_eq!(
            numbering_base("photo (99999999999999999999999)"),
            ("photo (99999999999999999999999)".to_string(), 1)
        );

        let dest = PathBuf::from(format!("/d/{}.jpg", stem));
        let first = suffixed_candidates(&dest).next().unwrap();
        assert_ne!(first, dest);
        assert_eq!(first, PathBuf::from(format!("/d/{} (1).jpg", stem)));
    }

    #[test]
    fn test_candidates_without_extension() {
        let mut names = suffixed_candidates(Path::new("/d/README"));
        assert_eq!(names.next(), Some(PathBuf::from("/d/README (1)")));
    }

    #[test]
    fn test_free_alternative_skips_existing_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("photo.jpg"), "a").unwrap();
        fs::write(temp.path().join("photo (1).jpg"), "b").unwrap();

        let claims = Claims::new();
        assert_eq!(
            claims.free_alternative(&temp.path().join("photo.jpg")),
            temp.path().join("photo (2).jpg")
        );
    }

    #[test]
    fn test_free_alternative_skips_claims() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("x.png");

        let mut claims = Claims::new();
        claims.claim(dest.clone(), PathBuf::from("/src/a/x.png"));
        claims.claim(temp.path().join("x (1).png"), PathBuf::from("/src/b/x.png"));

        assert!(claims.is_occupied(&dest));
        assert_eq!(claims.free_alternative(&dest), temp.path().join("x (2).png"));
        assert_eq!(claims.claimant(&dest), Some(Path::new("/src/a/x.png")));
        assert!(claims.is_claimed(&temp.path().join("x (1).png")));
    }
}
