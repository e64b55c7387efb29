/// Undo functionality for reverting applied moves.
///
/// Undo replays the journal backwards and moves each recorded file from where
/// the move put it back to where it was. The journal itself is only read;
/// restored entries stay in it until an explicit reset.
use crate::applier::relocate;
use crate::conflict::suffixed_candidates;
use crate::journal::{Journal, JournalEntry, JournalError};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that stop an undo pass before it starts.
#[derive(Debug, Error)]
pub enum UndoError {
    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Why a single entry could not be restored.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("could not create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not back up {}: {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to restore file: {0}")]
    MoveFailed(#[source] io::Error),
}

/// What happened to one journal entry during undo.
#[derive(Debug)]
pub enum UndoOutcome {
    /// Moved back. `backup` is set when something occupying the original
    /// location had to be renamed out of the way first.
    Restored {
        entry: JournalEntry,
        backup: Option<PathBuf>,
    },
    /// Nothing at the recorded destination anymore.
    Missing { entry: JournalEntry },
    Failed {
        entry: JournalEntry,
        error: RestoreError,
    },
}

impl fmt::Display for UndoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restored { entry, .. } => write!(
                f,
                "[UNDONE] {} -> {}",
                entry.dest_after.display(),
                entry.src_before.display()
            ),
            Self::Missing { entry } => write!(f, "[MISSING] {}", entry.dest_after.display()),
            Self::Failed { entry, error } => write!(
                f,
                "[ERROR] Could not undo {}: {}",
                entry.dest_after.display(),
                error
            ),
        }
    }
}

/// Represents the result of an undo pass.
#[derive(Debug, Default)]
pub struct UndoReport {
    pub outcomes: Vec<UndoOutcome>,
}

impl UndoReport {
    pub fn restored(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UndoOutcome::Restored { .. }))
            .count()
    }

    pub fn missing(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UndoOutcome::Missing { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UndoOutcome::Failed { .. }))
            .count()
    }

    /// Files that were in the way of a restore, at their backup names.
    pub fn backups(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|o| match o {
            UndoOutcome::Restored {
                backup: Some(path), ..
            } => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn total_processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if every entry was restored.
    pub fn is_complete_success(&self) -> bool {
        self.restored() == self.outcomes.len()
    }
}

/// Manages undo passes over a journal.
pub struct UndoManager;

impl UndoManager {
    /// Reverses the most recent apply pass: every entry carrying the latest
    /// timestamp, last appended first.
    ///
    /// # Edge Cases Handled
    ///
    /// * **File not found**: reported as missing, the pass continues
    /// * **File name conflict**: the occupant is backed up with a timestamp suffix
    /// * **Permission denied**: reported as a failure with the reason
    /// * **Missing or empty journal**: an empty report
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fileflow::journal::Journal;
    /// use fileflow::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// let journal = Journal::in_root(Path::new("/path/to/directory"));
    /// match UndoManager::undo_latest(&journal) {
    ///     Ok(report) => println!("Restored {} files", report.restored()),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo_latest(journal: &Journal) -> Result<UndoReport, UndoError> {
        Self::undo_latest_with(journal, |_| {})
    }

    /// Like [`UndoManager::undo_latest`], calling `on_outcome` after each entry.
    pub fn undo_latest_with<F>(journal: &Journal, on_outcome: F) -> Result<UndoReport, UndoError>
    where
        F: FnMut(&UndoOutcome),
    {
        let entries = journal.entries()?;
        let Some(latest) = entries.iter().map(|e| e.time).max() else {
            tracing::info!(journal = %journal.path().display(), "nothing to undo");
            return Ok(UndoReport::default());
        };

        let batch = entries.into_iter().filter(|e| e.time == latest).rev();
        Ok(Self::restore_all(batch, on_outcome))
    }

    /// Reverses every journaled move, most recently appended first, regardless
    /// of which pass made it.
    pub fn undo_all(journal: &Journal) -> Result<UndoReport, UndoError> {
        Self::undo_all_with(journal, |_| {})
    }

    pub fn undo_all_with<F>(journal: &Journal, on_outcome: F) -> Result<UndoReport, UndoError>
    where
        F: FnMut(&UndoOutcome),
    {
        Ok(Self::restore_all(journal.entries_rev()?, on_outcome))
    }

    /// Number of entries [`UndoManager::undo_latest`] would process.
    pub fn latest_batch_len(journal: &Journal) -> Result<usize, UndoError> {
        let entries = journal.entries()?;
        let latest = entries.iter().map(|e| e.time).max();
        Ok(entries.iter().filter(|e| Some(e.time) == latest).count())
    }

    fn restore_all<I, F>(entries: I, mut on_outcome: F) -> UndoReport
    where
        I: IntoIterator<Item = JournalEntry>,
        F: FnMut(&UndoOutcome),
    {
        let mut report = UndoReport::default();
        for entry in entries {
            let outcome = Self::restore_file(entry);
            match &outcome {
                UndoOutcome::Restored { entry, .. } => tracing::info!(
                    from = %entry.dest_after.display(),
                    to = %entry.src_before.display(),
                    "restored"
                ),
                UndoOutcome::Missing { entry } => {
                    tracing::info!(path = %entry.dest_after.display(), "nothing to restore")
                }
                UndoOutcome::Failed { entry, error } => tracing::warn!(
                    path = %entry.dest_after.display(),
                    error = %error,
                    "restore failed"
                ),
            }
            on_outcome(&outcome);
            report.outcomes.push(outcome);
        }
        report
    }

    /// Restores a single file to its original location.
    ///
    /// Anything already at the original location is backed up first.
    fn restore_file(entry: JournalEntry) -> UndoOutcome {
        if !entry.dest_after.is_file() {
            return UndoOutcome::Missing { entry };
        }

        if let Some(parent) = entry.src_before.parent()
            && let Err(source) = fs::create_dir_all(parent)
        {
            let error = RestoreError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source,
            };
            return UndoOutcome::Failed { entry, error };
        }

        let mut backup = None;
        if fs::symlink_metadata(&entry.src_before).is_ok() {
            let backup_path = Self::generate_backup_path(&entry.src_before);
            if let Err(source) = relocate(&entry.src_before, &backup_path) {
                let error = RestoreError::BackupFailed {
                    path: entry.src_before.clone(),
                    source,
                };
                return UndoOutcome::Failed { entry, error };
            }
            tracing::info!(backup = %backup_path.display(), "backed up file in the way");
            backup = Some(backup_path);
        }

        match relocate(&entry.dest_after, &entry.src_before) {
            Ok(()) => UndoOutcome::Restored { entry, backup },
            Err(source) => UndoOutcome::Failed {
                entry,
                error: RestoreError::MoveFailed(source),
            },
        }
    }

    /// Generates a backup path for a file by appending a timestamp.
    ///
    /// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let backup_name = format!("{}.bak.{}", filename, timestamp);
        let backup = match original_path.parent() {
            Some(parent) => parent.join(backup_name),
            None => PathBuf::from(backup_name),
        };

        if fs::symlink_metadata(&backup).is_err() {
            return backup;
        }
        suffixed_candidates(&backup)
            .find(|candidate| fs::symlink_metadata(candidate).is_err())
            .unwrap_or(backup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, secs).unwrap()
    }

    /// Puts a file at `dest_after` and journals it as moved from `src_before`.
    fn record_move(journal: &Journal, src_before: &Path, dest_after: &Path, time: DateTime<Utc>) {
        fs::create_dir_all(dest_after.parent().unwrap()).unwrap();
        fs::write(dest_after, src_before.to_string_lossy().as_bytes()).unwrap();
        journal
            .append(&JournalEntry::new(
                src_before.to_path_buf(),
                dest_after.to_path_buf(),
                time,
            ))
            .unwrap();
    }

    #[test]
    fn test_undo_no_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal = Journal::in_root(temp_dir.path());

        let report = UndoManager::undo_latest(&journal).expect("missing journal is not an error");
        assert_eq!(report.total_processed(), 0);
        let report = UndoManager::undo_all(&journal).unwrap();
        assert_eq!(report.total_processed(), 0);
    }

    #[test]
    fn test_undo_latest_only_touches_last_batch() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let journal = Journal::in_root(base);

        record_move(&journal, &base.join("old.txt"), &base.join("Docs/old.txt"), at(1));
        record_move(&journal, &base.join("a.jpg"), &base.join("Images/a.jpg"), at(2));
        record_move(&journal, &base.join("b.jpg"), &base.join("Images/b.jpg"), at(2));

        assert_eq!(UndoManager::latest_batch_len(&journal).unwrap(), 2);
        let report = UndoManager::undo_latest(&journal).unwrap();

        assert_eq!(report.restored(), 2);
        assert!(report.is_complete_success());
        assert!(base.join("a.jpg").is_file());
        assert!(base.join("b.jpg").is_file());
        assert!(base.join("Docs/old.txt").is_file());
        assert!(!base.join("old.txt").exists());
        // Journal is untouched.
        assert_eq!(journal.entries().unwrap().len(), 3);
    }

    #[test]
    fn test_undo_latest_is_lifo() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let journal = Journal::in_root(base);

        record_move(&journal, &base.join("a.jpg"), &base.join("Images/a.jpg"), at(5));
        record_move(&journal, &base.join("b.jpg"), &base.join("Images/b.jpg"), at(5));

        let mut order = Vec::new();
        UndoManager::undo_latest_with(&journal, |o| order.push(o.to_string())).unwrap();
        assert!(order[0].contains("b.jpg"));
        assert!(order[1].contains("a.jpg"));
    }

    #[test]
    fn test_undo_all_restores_everything_in_reverse() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let journal = Journal::in_root(base);

        // The same file moved twice: a.txt -> Docs/a.txt -> Archive/a.txt.
        journal
            .append(&JournalEntry::new(base.join("a.txt"), base.join("Docs/a.txt"), at(1)))
            .unwrap();
        record_move(&journal, &base.join("Docs/a.txt"), &base.join("Archive/a.txt"), at(2));

        let report = UndoManager::undo_all(&journal).unwrap();

        assert_eq!(report.restored(), 2);
        assert!(base.join("a.txt").is_file());
        assert!(!base.join("Docs/a.txt").exists());
        assert!(!base.join("Archive/a.txt").exists());
    }

    #[test]
    fn test_undo_with_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let journal = Journal::in_root(base);
        journal
            .append(&JournalEntry::new(
                base.join("nonexistent.txt"),
                base.join("Docs/nonexistent.txt"),
                at(0),
            ))
            .unwrap();
        record_move(&journal, &base.join("real.txt"), &base.join("Docs/real.txt"), at(0));

        let report = UndoManager::undo_all(&journal).unwrap();

        assert_eq!(report.restored(), 1);
        assert_eq!(report.missing(), 1);
        assert!(!report.is_complete_success());
        let missing = report
            .outcomes
            .iter()
            .find(|o| matches!(o, UndoOutcome::Missing { .. }))
            .unwrap();
        assert_eq!(
            missing.to_string(),
            format!("[MISSING] {}", base.join("Docs/nonexistent.txt").display())
        );
    }

    #[test]
    fn test_undo_with_file_name_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let journal = Journal::in_root(base);
        let original = base.join("test.txt");
        record_move(&journal, &original, &base.join("Docs/test.txt"), at(0));

        // Something new appeared at the original location.
        fs::write(&original, "new content").unwrap();

        let report = UndoManager::undo_latest(&journal).unwrap();
        assert_eq!(report.restored(), 1);

        let backups: Vec<_> = report.backups().map(Path::to_path_buf).collect();
        assert_eq!(backups.len(), 1);
        assert!(
            backups[0]
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("test.txt.bak.")
        );
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "new content");
        assert_eq!(
            fs::read_to_string(&original).unwrap(),
            original.to_string_lossy()
        );
    }

    #[test]
    fn test_undo_recreates_missing_parent() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let journal = Journal::in_root(base);
        let original = base.join("gone").join("deep").join("x.pdf");
        record_move(&journal, &original, &base.join("Docs/x.pdf"), at(0));

        let report = UndoManager::undo_all(&journal).unwrap();
        assert_eq!(report.restored(), 1);
        assert!(original.is_file());
    }

    #[test]
    fn test_backup_path_format() {
        let backup = UndoManager::generate_backup_path(Path::new("/nowhere/file.txt"));
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        let stamp = name.strip_prefix("file.txt.bak.").unwrap();
        assert_eq!(stamp.len(), "20251109-143052".len());
        assert_eq!(&stamp[8..9], "-");
    }
}
