//! Durable ledger of last-synchronized state per source id.
//!
//! The ledger is the system's only memory between runs. [`Ledger`] is the
//! in-memory map; [`LedgerStore`] persists it as pretty-printed JSON with
//! atomic-replace semantics: the file on disk is always either the old
//! content or the new content, even across a crash mid-commit.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::model::LedgerRecord;

/// In-memory ledger, keyed by source id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    records: BTreeMap<String, LedgerRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_id: &str) -> Option<&LedgerRecord> {
        self.records.get(source_id)
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.records.contains_key(source_id)
    }

    /// Insert or replace the record for its source id.
    pub fn upsert(&mut self, record: LedgerRecord) {
        self.records.insert(record.source_id.clone(), record);
    }

    /// Remove the record for a source id, returning it if present.
    pub fn remove(&mut self, source_id: &str) -> Option<LedgerRecord> {
        self.records.remove(source_id)
    }

    /// All known source ids, in order.
    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Records in source-id order.
    pub fn iter(&self) -> impl Iterator<Item = &LedgerRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// File-backed persistence for the ledger.
///
/// Single-process, single-run: concurrent committers are not supported.
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted ledger. A missing file is a first run and
    /// yields an empty ledger; any other read failure is fatal since the
    /// reconciler cannot proceed without knowing prior state.
    pub fn load(&self) -> Result<Ledger, LedgerError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Ledger::new()),
            Err(e) => {
                return Err(LedgerError::ReadFailed {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| LedgerError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Atomically replace the persisted ledger.
    ///
    /// Writes to `<path>.tmp`, flushes to disk, then renames over the
    /// target. Never truncates the live file in place, so a crash at any
    /// point leaves either the old or the new content readable.
    pub fn commit(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let data = serde_json::to_string_pretty(ledger).map_err(|e| LedgerError::CommitFailed {
            path: self.path.clone(),
            source: std::io::Error::other(e),
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let write_tmp = |data: &str| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(data.as_bytes())?;
            file.sync_all()?;
            Ok(())
        };

        write_tmp(&data)
            .and_then(|_| std::fs::rename(&tmp_path, &self.path))
            .map_err(|e| LedgerError::CommitFailed {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Read-modify-commit a single record insertion.
    pub fn upsert(&self, record: LedgerRecord) -> Result<(), LedgerError> {
        let mut ledger = self.load()?;
        ledger.upsert(record);
        self.commit(&ledger)
    }

    /// Read-modify-commit a single record removal.
    pub fn remove(&self, source_id: &str) -> Result<(), LedgerError> {
        let mut ledger = self.load()?;
        ledger.remove(source_id);
        self.commit(&ledger)
    }
}
