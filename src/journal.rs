//! Append-only record of completed moves.
//!
//! The journal is a JSON Lines file, one object per completed move:
//!
//! ```text
//! {"src_before":"/in/a.jpg","dest_after":"/in/Images/a.jpg","time":"2025-01-31T09:15:02Z"}
//! ```
//!
//! Entries are only ever appended. Undo reads them but never rewrites them;
//! the only way to drop entries is an explicit [`Journal::reset`]. Readers
//! skip lines that do not parse.

use crate::config::Config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Hidden file name used when the journal lives inside an include root.
pub const JOURNAL_FILE_NAME: &str = ".fileflow_journal.jsonl";

/// Errors raised while reading or writing the journal file itself.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Failed to {action} journal {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode journal entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Journal timestamps are UTC with second precision: `YYYY-MM-DDTHH:MM:SSZ`.
mod utc_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

/// One completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Where the file was before the move.
    pub src_before: PathBuf,
    /// Where the move put it.
    pub dest_after: PathBuf,
    #[serde(with = "utc_seconds")]
    pub time: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(src_before: PathBuf, dest_after: PathBuf, time: DateTime<Utc>) -> Self {
        Self {
            src_before,
            dest_after,
            time,
        }
    }

    /// Serializes the entry as one journal line. Fails for paths that are not
    /// valid UTF-8, which the JSON format cannot hold.
    pub fn encode(&self) -> Result<String, JournalError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses one journal line. Blank, malformed or incomplete lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<Self>(line) {
            Ok(entry)
                if !entry.src_before.as_os_str().is_empty()
                    && !entry.dest_after.as_os_str().is_empty() =>
            {
                Some(entry)
            }
            Ok(_) => {
                tracing::debug!(line, "journal entry with empty path skipped");
                None
            }
            Err(e) => {
                tracing::debug!(line, error = %e, "malformed journal line skipped");
                None
            }
        }
    }
}

/// Truncates a timestamp to the second, the precision the journal stores.
pub fn journal_time(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or(time)
}

/// Handle on one journal file.
///
/// The handle is passed explicitly to whatever appends to or replays the
/// journal; nothing derives the location implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The journal stored under its hidden name inside `root`.
    pub fn in_root(root: &Path) -> Self {
        Self::new(root.join(JOURNAL_FILE_NAME))
    }

    /// The journal a configuration points at: the explicit `journal` path if
    /// set, otherwise the hidden file inside the first include root.
    pub fn for_config(config: &Config) -> Self {
        match (&config.journal, config.roots.first()) {
            (Some(path), _) => Self::new(path.clone()),
            (None, Some(root)) => Self::in_root(&root.path),
            (None, None) => Self::new(JOURNAL_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn io_error(&self, action: &'static str) -> impl FnOnce(std::io::Error) -> JournalError + '_ {
        move |source| JournalError::Io {
            action,
            path: self.path.clone(),
            source,
        }
    }

    /// Appends one entry and flushes it to disk.
    pub fn append(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        self.append_line(&entry.encode()?)
    }

    /// Appends a line produced by [`JournalEntry::encode`].
    pub fn append_line(&self, line: &str) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(self.io_error("create directory for"))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(self.io_error("open"))?;
        writeln!(file, "{}", line).map_err(self.io_error("append to"))?;
        file.sync_data().map_err(self.io_error("sync"))?;
        Ok(())
    }

    /// Reads every well-formed entry in append order. A missing journal reads
    /// as empty.
    pub fn entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        Ok(self
            .read_lines()?
            .iter()
            .filter_map(|line| JournalEntry::parse(line))
            .collect())
    }

    /// Well-formed entries, most recently appended first.
    pub fn entries_rev(&self) -> Result<impl Iterator<Item = JournalEntry> + use<>, JournalError> {
        let lines = self.read_lines()?;
        Ok(lines
            .into_iter()
            .rev()
            .filter_map(|line| JournalEntry::parse(&line)))
    }

    fn read_lines(&self) -> Result<Vec<String>, JournalError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error("open")(e)),
        };

        let mut lines = Vec::new();
        for raw in BufReader::new(file).split(b'\n') {
            let raw = raw.map_err(self.io_error("read"))?;
            match String::from_utf8(raw) {
                Ok(line) => lines.push(line),
                Err(e) => tracing::debug!(error = %e, "journal line with invalid UTF-8 skipped"),
            }
        }
        Ok(lines)
    }

    /// Replaces the journal with an empty file.
    pub fn reset(&self) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(self.io_error("create directory for"))?;
        }
        File::create(&self.path).map_err(self.io_error("reset"))?;
        tracing::info!(journal = %self.path.display(), "journal reset");
        Ok(())
    }
}
