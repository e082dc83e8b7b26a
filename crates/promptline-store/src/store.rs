//! Result file ⇄ ordered record map
//!
//! The whole file is rewritten after every batch via `.tmp` + rename, so a
//! reader never observes a partial array.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::item::{IdentityKey, WorkItem};
use crate::record::ResultRecord;

/// Records of one result file, in first-seen order.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    records: Vec<ResultRecord>,
    index: HashMap<IdentityKey, usize>,
}

impl RecordStore {
    /// Empty store that will flush to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Load existing records, or start empty if the file does not exist.
    ///
    /// A later record with an already-seen key replaces the earlier one in
    /// the earlier one's position.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let mut store = Self::new(path);
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let records: Vec<ResultRecord> =
            serde_json::from_str(&text).map_err(|e| StoreError::parse(path, e))?;

        let loaded = records.len();
        for record in records {
            store.upsert(record);
        }
        if store.len() < loaded {
            log::debug!(
                "{}: {} duplicate records collapsed",
                path.display(),
                loaded - store.len()
            );
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&ResultRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    /// Insert a record, replacing any record with the same key in place.
    pub fn upsert(&mut self, record: ResultRecord) {
        let key = record.key();
        match self.index.get(&key) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Record to work on for `item`.
    ///
    /// A terminal record comes back unchanged. Otherwise a pending
    /// placeholder carrying the existing `fail_count` (0 for a new item).
    pub fn merge(&self, item: &WorkItem, true_answer: &Value, max_fail_count: u32) -> ResultRecord {
        match self.get(&item.key()) {
            Some(existing) if existing.is_terminal(max_fail_count) => existing.clone(),
            Some(existing) => {
                let mut placeholder = ResultRecord::pending(item, true_answer.clone());
                placeholder.fail_count = existing.fail_count;
                placeholder.extra = existing.extra.clone();
                placeholder
            }
            None => ResultRecord::pending(item, true_answer.clone()),
        }
    }

    /// Whether `key` still needs an API call: no record yet, or a record that
    /// is neither terminal nor out of attempts.
    pub fn needs_processing(&self, key: &IdentityKey, max_fail_count: u32) -> bool {
        !matches!(self.get(key), Some(record) if record.is_terminal(max_fail_count))
    }

    /// Items to process, in input order, each identity key at most once.
    pub fn select<'a>(&self, items: &'a [WorkItem], max_fail_count: u32) -> Vec<&'a WorkItem> {
        let mut seen = HashSet::new();
        items
            .iter()
            .filter(|item| {
                let key = item.key();
                self.needs_processing(&key, max_fail_count) && seen.insert(key)
            })
            .collect()
    }

    /// Atomically rewrite the result file with every record.
    ///
    /// Output is a 4-space indented JSON array with non-ASCII text left
    /// unescaped. Flushing an unchanged store produces identical bytes.
    pub fn flush(&self) -> Result<(), StoreError> {
        let bytes = encode(&self.records).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;

        let tmp = tmp_path(&self.path);
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            std::fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            StoreError::io(&self.path, e)
        })
    }
}

fn encode(records: &[ResultRecord]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut ser)?;
    Ok(buf)
}

/// Remove `*{suffix}.tmp` files left in `dir` by a flush that never reached
/// its rename. Returns how many were removed.
pub fn cleanup_tmp_files(dir: &Path, suffix: &str) -> Result<usize, StoreError> {
    let pattern = format!("{suffix}.tmp");
    let mut removed = 0;
    let entries = std::fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        let stale = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&pattern));
        if stale && path.is_file() {
            log::warn!("Removing stale tmp file: {}", path.display());
            std::fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
