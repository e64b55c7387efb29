//! Showing a path in the native file browser.

use std::path::{Path, PathBuf};

/// What [`reveal`] would hand to the system: a directory as-is, or the folder
/// containing a file. `None` when the path does not exist.
pub fn reveal_target(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        Some(path.to_path_buf())
    } else if path.exists() {
        path.parent().map(Path::to_path_buf)
    } else {
        None
    }
}

/// Opens the folder holding `path` with the system default application.
///
/// Best effort: a missing path is ignored and a failure to launch is logged.
pub fn reveal(path: &Path) {
    let Some(target) = reveal_target(path) else {
        tracing::debug!(path = %path.display(), "nothing to reveal");
        return;
    };

    if let Err(e) = open::that(&target) {
        tracing::warn!(path = %target.display(), error = %e, "failed to open with system");
    }
}
