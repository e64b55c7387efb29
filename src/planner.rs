//! The preview engine.
//!
//! Turns scanned files into [`PlanItem`]s: where each file would go and
//! whether it would be moved, left alone, or reported as a conflict. Planning
//! never touches the filesystem beyond reading it.

use crate::classifier::RuleSet;
use crate::config::{Config, ConfigError, ConflictPolicy, IncludeRoot};
use crate::conflict::Claims;
use crate::hash::files_identical;
use crate::scanner::{ScanEntry, ScanIter, Scanner};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// What the pipeline intends to do with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Relocate the file to the destination.
    Move,
    /// Leave the file where it is.
    Skip,
    /// The destination is occupied and the policy left it unresolved.
    Conflict,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Move => "MOVE",
            Action::Skip => "SKIP",
            Action::Conflict => "CONFLICT",
        };
        // Honor width/alignment so callers can column-align actions.
        f.pad(label)
    }
}

/// One proposed file action. Produced fresh by every preview pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanItem {
    pub source: PathBuf,
    pub action: Action,
    pub destination: PathBuf,
}

impl PlanItem {
    pub fn new(source: PathBuf, action: Action, destination: PathBuf) -> Self {
        Self {
            source,
            action,
            destination,
        }
    }
}

impl fmt::Display for PlanItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<8} | {} -> {}",
            self.action,
            self.source.display(),
            self.destination.display()
        )
    }
}

/// Builds move plans from scanned files.
#[derive(Debug, Clone)]
pub struct Planner {
    scanner: Scanner,
    rules: RuleSet,
    roots: Vec<IncludeRoot>,
    policy: ConflictPolicy,
}

impl Planner {
    pub fn new(
        scanner: Scanner,
        rules: RuleSet,
        roots: Vec<IncludeRoot>,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            scanner,
            rules,
            roots,
            policy,
        }
    }

    /// Builds a planner for everything `config` describes.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Scanner::from_config(config)?,
            RuleSet::from_config(config),
            config.roots.clone(),
            config.conflict_policy,
        ))
    }

    /// Leaves the file at `path` out of every pass.
    pub fn excluding(mut self, path: &Path) -> Self {
        self.scanner = self.scanner.excluding(path);
        self
    }

    /// Starts a lazy preview pass over a fresh scan.
    pub fn preview(&self) -> Preview {
        self.clone().into_preview()
    }

    /// Like [`Planner::preview`], consuming the planner.
    pub fn into_preview(self) -> Preview {
        Preview {
            scan: self.scanner.scan(),
            planner: self,
            claims: Claims::new(),
        }
    }

    /// The include root owning `source`: the longest root path that prefixes it.
    pub fn owning_root(&self, source: &Path) -> Option<&IncludeRoot> {
        self.roots
            .iter()
            .filter(|root| source.starts_with(&root.path))
            .max_by_key(|root| root.path.components().count())
    }

    /// Plans a single scanned file against the claims made so far in this pass.
    pub fn plan_entry(&self, entry: &ScanEntry, claims: &mut Claims) -> PlanItem {
        let source = &entry.path;
        let folder = self.rules.resolve(&entry.extension);

        let parent_name = source
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_lowercase());
        if parent_name.as_deref() == Some(folder.to_lowercase().as_str()) {
            return PlanItem::new(source.clone(), Action::Skip, source.clone());
        }

        let Some(file_name) = source.file_name() else {
            return PlanItem::new(source.clone(), Action::Skip, source.clone());
        };

        let destination_root = match self.owning_root(source) {
            Some(root) => root.destination_root().to_path_buf(),
            None => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        let destination = destination_root.join(folder).join(file_name);

        if lexical_normalize(&destination) == lexical_normalize(source) {
            return PlanItem::new(source.clone(), Action::Skip, destination);
        }

        let occupant = if destination.exists() {
            Some(destination.clone())
        } else {
            claims.claimant(&destination).map(Path::to_path_buf)
        };

        let Some(occupant) = occupant else {
            claims.claim(destination.clone(), source.clone());
            return PlanItem::new(source.clone(), Action::Move, destination);
        };

        if files_identical(source, &occupant) {
            tracing::debug!(
                source = %source.display(),
                duplicate_of = %occupant.display(),
                "identical file already at destination"
            );
            return PlanItem::new(source.clone(), Action::Skip, destination);
        }

        match self.policy {
            ConflictPolicy::Suffix => {
                let candidate = claims.free_alternative(&destination);
                claims.claim(candidate.clone(), source.clone());
                PlanItem::new(source.clone(), Action::Move, candidate)
            }
            ConflictPolicy::Skip => PlanItem::new(source.clone(), Action::Conflict, destination),
        }
    }
}

/// A lazy preview pass. Owns the set of destinations claimed so far.
pub struct Preview {
    planner: Planner,
    scan: ScanIter,
    claims: Claims,
}

impl Iterator for Preview {
    type Item = PlanItem;

    fn next(&mut self) -> Option<PlanItem> {
        let entry = self.scan.next()?;
        let item = self.planner.plan_entry(&entry, &mut self.claims);
        tracing::trace!(%item, "planned");
        Some(item)
    }
}

/// Removes `.` components and folds `..` lexically, without touching the disk.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
