//! The operations a shell calls: preview, apply, undo and reset, all bound
//! to one validated [`Config`] and one [`Journal`].

use crate::applier::{Applier, ApplyOutcome, ApplyReport};
use crate::config::{Config, ConfigError};
use crate::journal::{Journal, JournalError};
use crate::planner::{PlanItem, Planner, Preview};
use crate::stream::{CancelToken, StreamWorker};
use crate::undo::{UndoError, UndoManager, UndoOutcome, UndoReport};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start preview worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One configured pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    journal: Journal,
}

impl Pipeline {
    /// A pipeline journaling wherever `config` says.
    pub fn new(config: Config) -> Self {
        let journal = Journal::for_config(&config);
        Self { config, journal }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// A planner over the configured roots that never plans this pipeline's
    /// own journal.
    pub fn planner(&self) -> Result<Planner, ConfigError> {
        Ok(Planner::from_config(&self.config)?.excluding(self.journal.path()))
    }

    /// A fresh, lazy preview pass on the calling thread.
    pub fn preview(&self) -> Result<Preview, ConfigError> {
        Ok(self.planner()?.into_preview())
    }

    /// Runs a preview pass on a worker thread, handing items over through a
    /// buffer of `capacity`. Cancelling `token` stops the worker.
    pub fn preview_stream(
        &self,
        token: CancelToken,
        capacity: usize,
    ) -> Result<StreamWorker<PlanItem>, PipelineError> {
        let planner = self.planner()?;
        let worker = StreamWorker::spawn(move || planner.into_preview(), capacity, token)?;
        Ok(worker)
    }

    pub fn apply<I>(&self, plan: I, dry_run: bool) -> ApplyReport
    where
        I: IntoIterator<Item = PlanItem>,
    {
        self.applier(dry_run).apply(plan)
    }

    pub fn apply_with<I, F>(
        &self,
        plan: I,
        dry_run: bool,
        token: &CancelToken,
        on_outcome: F,
    ) -> ApplyReport
    where
        I: IntoIterator<Item = PlanItem>,
        F: FnMut(&ApplyOutcome),
    {
        self.applier(dry_run).apply_with(plan, token, on_outcome)
    }

    fn applier(&self, dry_run: bool) -> Applier<'_> {
        Applier::new(&self.journal, self.config.conflict_policy).dry_run(dry_run)
    }

    pub fn undo_latest(&self) -> Result<UndoReport, UndoError> {
        UndoManager::undo_latest(&self.journal)
    }

    pub fn undo_latest_with<F>(&self, on_outcome: F) -> Result<UndoReport, UndoError>
    where
        F: FnMut(&UndoOutcome),
    {
        UndoManager::undo_latest_with(&self.journal, on_outcome)
    }

    pub fn undo_all(&self) -> Result<UndoReport, UndoError> {
        UndoManager::undo_all(&self.journal)
    }

    pub fn undo_all_with<F>(&self, on_outcome: F) -> Result<UndoReport, UndoError>
    where
        F: FnMut(&UndoOutcome),
    {
        UndoManager::undo_all_with(&self.journal, on_outcome)
    }

    pub fn reset_journal(&self) -> Result<(), JournalError> {
        self.journal.reset()
    }
}
