//! Executes MOVE plan items against the filesystem and journals each move.
//!
//! Plan items are re-resolved against the filesystem as it is *now*, with the
//! same conflict policy the planner used, because time passes between preview
//! and apply. Per-item failures become [`ApplyOutcome::Failed`] entries and the
//! pass carries on with the next item.

use crate::config::ConflictPolicy;
use crate::conflict::Claims;
use crate::hash::files_identical;
use crate::journal::{Journal, JournalEntry, JournalError, journal_time};
use crate::planner::{Action, PlanItem};
use crate::stream::{CancelToken, CancellableExt};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a single move could not be carried out.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("source is not a regular file")]
    NotAFile,

    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    MoveFailed(#[source] io::Error),

    #[error("move would not be undoable: {0}")]
    Unjournalable(#[source] JournalError),
}

/// What happened to one MOVE item.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Moved and journaled.
    Moved { source: PathBuf, destination: PathBuf },
    /// Dry run: this is where the file would have gone.
    DryRun { source: PathBuf, destination: PathBuf },
    /// An identical file already occupies the destination; nothing moved.
    Duplicate { source: PathBuf, existing: PathBuf },
    /// The destination is occupied and the policy is `skip`.
    Skipped { source: PathBuf, existing: PathBuf },
    /// The move failed; the source is where it was.
    Failed {
        source: PathBuf,
        destination: PathBuf,
        error: ApplyError,
    },
    /// The move happened but could not be recorded, so undo will not see it.
    Unjournaled {
        source: PathBuf,
        destination: PathBuf,
        error: JournalError,
    },
}

impl ApplyOutcome {
    pub fn source(&self) -> &Path {
        match self {
            Self::Moved { source, .. }
            | Self::DryRun { source, .. }
            | Self::Duplicate { source, .. }
            | Self::Skipped { source, .. }
            | Self::Failed { source, .. }
            | Self::Unjournaled { source, .. } => source,
        }
    }

    /// True when the file now lives at its destination.
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. } | Self::Unjournaled { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Unjournaled { .. })
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moved {
                source,
                destination,
            } => write!(f, "[MOVED] {} --> {}", source.display(), destination.display()),
            Self::DryRun {
                source,
                destination,
            } => write!(
                f,
                "[DRY RUN] Moving {} --> {}",
                source.display(),
                destination.display()
            ),
            Self::Duplicate { source, existing } => {
                write!(f, "[DUPLICATE] {} == {}", source.display(), existing.display())
            }
            Self::Skipped { source, existing } => write!(
                f,
                "[SKIPPED] {} (destination exists: {})",
                source.display(),
                existing.display()
            ),
            Self::Failed {
                source,
                destination,
                error,
            } => write!(
                f,
                "[ERROR] Could not move {} to {}: {}",
                source.display(),
                destination.display(),
                error
            ),
            Self::Unjournaled {
                source,
                destination,
                error,
            } => write!(
                f,
                "[MOVED] {} --> {} (not journaled: {})",
                source.display(),
                destination.display(),
                error
            ),
        }
    }
}

/// Everything one apply pass did.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub outcomes: Vec<ApplyOutcome>,
    /// SKIP and CONFLICT items passed over without action.
    pub ignored: usize,
    /// The pass stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl ApplyReport {
    fn count(&self, pred: impl Fn(&ApplyOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|&o| pred(o)).count()
    }

    pub fn moved(&self) -> usize {
        self.count(ApplyOutcome::is_moved)
    }

    pub fn would_move(&self) -> usize {
        self.count(|o| matches!(o, ApplyOutcome::DryRun { .. }))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| matches!(o, ApplyOutcome::Duplicate { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ApplyOutcome::Skipped { .. }))
    }

    pub fn errors(&self) -> usize {
        self.count(ApplyOutcome::is_error)
    }
}

enum Resolution {
    Free(PathBuf),
    Duplicate(PathBuf),
    Occupied(PathBuf),
}

/// Carries out MOVE items, journaling each completed move.
pub struct Applier<'a> {
    journal: &'a Journal,
    policy: ConflictPolicy,
    dry_run: bool,
}

impl<'a> Applier<'a> {
    pub fn new(journal: &'a Journal, policy: ConflictPolicy) -> Self {
        Self {
            journal,
            policy,
            dry_run: false,
        }
    }

    /// In dry-run mode conflicts are resolved and reported, but nothing on
    /// disk or in the journal changes.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn apply<I>(&self, plan: I) -> ApplyReport
    where
        I: IntoIterator<Item = PlanItem>,
    {
        self.apply_with(plan, &CancelToken::new(), |_| {})
    }

    /// Applies `plan`, calling `on_outcome` as each MOVE item is settled.
    ///
    /// Once `token` is cancelled no further items are pulled from `plan`.
    /// Moves already made stay made.
    pub fn apply_with<I, F>(&self, plan: I, token: &CancelToken, mut on_outcome: F) -> ApplyReport
    where
        I: IntoIterator<Item = PlanItem>,
        F: FnMut(&ApplyOutcome),
    {
        // Every entry of one pass shares a timestamp so the pass undoes as a batch.
        let batch_time = journal_time(Utc::now());
        let mut claims = Claims::new();
        let mut report = ApplyReport::default();

        for item in plan.into_iter().until_cancelled(token) {
            if item.action != Action::Move {
                report.ignored += 1;
                continue;
            }
            let outcome = self.apply_item(item, &mut claims, batch_time);
            on_outcome(&outcome);
            report.outcomes.push(outcome);
        }

        report.cancelled = token.is_cancelled();
        if report.cancelled {
            tracing::info!(
                settled = report.outcomes.len(),
                "apply cancelled; completed moves are kept"
            );
        }
        report
    }

    fn apply_item(&self, item: PlanItem, claims: &mut Claims, time: DateTime<Utc>) -> ApplyOutcome {
        let PlanItem {
            source,
            destination,
            ..
        } = item;

        let destination = match self.resolve(&source, destination, claims) {
            Resolution::Free(destination) => destination,
            Resolution::Duplicate(existing) => {
                tracing::info!(
                    source = %source.display(),
                    existing = %existing.display(),
                    "duplicate left in place"
                );
                return ApplyOutcome::Duplicate { source, existing };
            }
            Resolution::Occupied(existing) => {
                return ApplyOutcome::Skipped { source, existing };
            }
        };

        if self.dry_run {
            claims.claim(destination.clone(), source.clone());
            return ApplyOutcome::DryRun {
                source,
                destination,
            };
        }

        // Encode before moving: a move the journal cannot hold could never be undone.
        let entry = JournalEntry::new(source.clone(), destination.clone(), time);
        let line = match entry.encode() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(source = %source.display(), error = %e, "move not journalable");
                return ApplyOutcome::Failed {
                    source,
                    destination,
                    error: ApplyError::Unjournalable(e),
                };
            }
        };

        if let Err(error) = move_file(&source, &destination) {
            tracing::warn!(
                source = %source.display(),
                destination = %destination.display(),
                error = %error,
                "move failed"
            );
            return ApplyOutcome::Failed {
                source,
                destination,
                error,
            };
        }
        claims.claim(destination.clone(), source.clone());

        match self.journal.append_line(&line) {
            Ok(()) => {
                tracing::info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    "moved"
                );
                ApplyOutcome::Moved {
                    source,
                    destination,
                }
            }
            Err(error) => {
                tracing::warn!(
                    destination = %destination.display(),
                    error = %error,
                    "moved but could not journal"
                );
                ApplyOutcome::Unjournaled {
                    source,
                    destination,
                    error,
                }
            }
        }
    }

    /// Re-checks a planned destination against the current disk state and the
    /// destinations this pass has already taken.
    fn resolve(&self, source: &Path, destination: PathBuf, claims: &Claims) -> Resolution {
        let occupant = if destination.exists() {
            destination.clone()
        } else if let Some(claimant) = claims.claimant(&destination) {
            claimant.to_path_buf()
        } else {
            return Resolution::Free(destination);
        };

        if files_identical(source, &occupant) {
            return Resolution::Duplicate(destination);
        }

        match self.policy {
            ConflictPolicy::Suffix => Resolution::Free(claims.free_alternative(&destination)),
            ConflictPolicy::Skip => Resolution::Occupied(destination),
        }
    }
}

fn move_file(source: &Path, destination: &Path) -> Result<(), ApplyError> {
    let metadata = fs::symlink_metadata(source).map_err(ApplyError::MoveFailed)?;
    if !metadata.is_file() {
        return Err(ApplyError::NotAFile);
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|source| ApplyError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    relocate(source, destination).map_err(ApplyError::MoveFailed)
}

/// Renames `from` to `to`, copying and removing when they sit on different
/// filesystems.
pub(crate) fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(from = %from.display(), to = %to.display(), "cross-device move");
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
