// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Persistent signer state.
//!
//! A stateful signature key is only safe while its index never moves
//! backwards, so the store enforces three invariants the in-memory signer
//! cannot: saved indices are monotonic per identifier, every save is a
//! durable replace (temp file, fsync, rename, fsync the directory), and an
//! advisory exclusive lock is held for the whole lifetime of the store so
//! two processes cannot interleave saves.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, XmssError};

/// One persisted record per signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub identifier: String,
    /// Next unused one-time key index.
    pub index: u64,
    pub height: u32,
}

/// File-backed store mapping key identifiers to their signing state.
///
/// The file body is a JSON object keyed by identifier. A missing, empty or
/// malformed file reads as an empty mapping; it never blocks a load.
pub struct XmssStateStore {
    path: PathBuf,
    // Held (locked) for the lifetime of the store.
    _lock_file: File,
}

impl XmssStateStore {
    /// Opens the store at `path`, taking the exclusive advisory lock on a
    /// sibling `.lock` file. Blocks until the lock is available.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = path.with_extension("lock");

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                XmssError::PersistenceFailure(format!(
                    "cannot open lock file {}: {}",
                    lock_path.display(),
                    e
                ))
            })?;
        lock_file.lock_exclusive().map_err(|e| {
            XmssError::PersistenceFailure(format!(
                "cannot lock {}: {}",
                lock_path.display(),
                e
            ))
        })?;

        debug!(path = %path.display(), "opened state store");
        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Records the state of the key `identifier`.
    ///
    /// Rejects any index below the currently persisted one; re-saving the
    /// same index is allowed so a crashed caller can retry idempotently.
    pub fn save(&self, identifier: &str, index: u64, height: u32) -> Result<()> {
        let mut states = self.read_all();

        if let Some(existing) = states.get(identifier) {
            if index < existing.index {
                return Err(XmssError::PersistenceFailure(format!(
                    "monotonicity violation for '{}': index {} is below persisted {}",
                    identifier, index, existing.index
                )));
            }
        }

        states.insert(
            identifier.to_string(),
            StateRecord {
                identifier: identifier.to_string(),
                index,
                height,
            },
        );
        self.write_all(&states)?;

        debug!(identifier, index, height, "persisted signer state");
        Ok(())
    }

    /// Loads the record for `identifier`, if one was ever saved.
    pub fn load(&self, identifier: &str) -> Option<StateRecord> {
        self.read_all().remove(identifier)
    }

    /// Removes the record for `identifier`. Removing an absent record is
    /// not an error.
    pub fn delete(&self, identifier: &str) -> Result<()> {
        let mut states = self.read_all();
        if states.remove(identifier).is_some() {
            self.write_all(&states)?;
        }
        Ok(())
    }

    fn read_all(&self) -> HashMap<String, StateRecord> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(_) => return HashMap::new(),
        };
        if content.iter().all(|b| b.is_ascii_whitespace()) {
            return HashMap::new();
        }
        match serde_json::from_slice(&content) {
            Ok(states) => states,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "malformed state file, treating as empty"
                );
                HashMap::new()
            }
        }
    }

    /// Durably replaces the whole mapping: write a temp file in the same
    /// directory, fsync it, rename it over the target, fsync the directory.
    fn write_all(&self, states: &HashMap<String, StateRecord>) -> Result<()> {
        let json = serde_json::to_vec_pretty(states)
            .map_err(|e| XmssError::PersistenceFailure(format!("cannot encode state: {}", e)))?;

        let tmp_path = self.path.with_extension("tmp");
        let persist = |e: std::io::Error| {
            XmssError::PersistenceFailure(format!(
                "cannot write {}: {}",
                self.path.display(),
                e
            ))
        };

        let mut tmp = File::create(&tmp_path).map_err(persist)?;
        tmp.write_all(&json).map_err(persist)?;
        tmp.sync_all().map_err(persist)?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path).map_err(persist)?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let dir = File::open(parent).map_err(persist)?;
        dir.sync_all().map_err(persist)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = XmssStateStore::open(dir.path().join("state.json")).unwrap();

        store.save("key-a", 3, 10).unwrap();
        let record = store.load("key-a").unwrap();
        assert_eq!(record.identifier, "key-a");
        assert_eq!(record.index, 3);
        assert_eq!(record.height, 10);
    }

    #[test]
    fn missing_identifier_loads_nothing() {
        let dir = tempdir().unwrap();
        let store = XmssStateStore::open(dir.path().join("state.json")).unwrap();
        assert_eq!(store.load("nobody"), None);
    }

    #[test]
    fn records_are_independent() {
        let dir = tempdir().unwrap();
        let store = XmssStateStore::open(dir.path().join("state.json")).unwrap();

        store.save("key-a", 1, 10).unwrap();
        store.save("key-b", 7, 16).unwrap();
        assert_eq!(store.load("key-a").unwrap().index, 1);
        assert_eq!(store.load("key-b").unwrap().index, 7);
    }

    #[test]
    fn regressing_index_is_rejected() {
        let dir = tempdir().unwrap();
        let store = XmssStateStore::open(dir.path().join("state.json")).unwrap();

        store.save("key-a", 5, 10).unwrap();
        assert_eq!(store.save("key-a", 4, 10).is_err(), true);
        // Unchanged and advancing indices are fine.
        store.save("key-a", 5, 10).unwrap();
        store.save("key-a", 6, 10).unwrap();
        assert_eq!(store.load("key-a").unwrap().index, 6);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = XmssStateStore::open(&path).unwrap();
            store.save("key-a", 9, 10).unwrap();
        }

        // Simulated crash and restart: a fresh store over the same file.
        let store = XmssStateStore::open(&path).unwrap();
        assert_eq!(store.load("key-a").unwrap().index, 9);
        assert_eq!(store.save("key-a", 2, 10).is_err(), true);
    }

    #[test]
    fn empty_file_reads_as_empty_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"").unwrap();

        let store = XmssStateStore::open(&path).unwrap();
        assert_eq!(store.load("key-a"), None);
        store.save("key-a", 1, 10).unwrap();
        assert_eq!(store.load("key-a").unwrap().index, 1);
    }

    #[test]
    fn malformed_file_reads_as_empty_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{not json!").unwrap();

        let store = XmssStateStore::open(&path).unwrap();
        assert_eq!(store.load("key-a"), None);
    }

    #[test]
    fn delete_removes_only_the_named_record() {
        let dir = tempdir().unwrap();
        let store = XmssStateStore::open(dir.path().join("state.json")).unwrap();

        store.save("key-a", 1, 10).unwrap();
        store.save("key-b", 2, 10).unwrap();
        store.delete("key-a").unwrap();
        assert_eq!(store.load("key-a"), None);
        assert_eq!(store.load("key-b").unwrap().index, 2);

        // Deleting a missing record is a no-op.
        store.delete("key-c").unwrap();
    }

    #[test]
    fn file_is_json_keyed_by_identifier() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = XmssStateStore::open(&path).unwrap();
        store.save("key-a", 4, 10).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, StateRecord> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["key-a"].index, 4);
    }
}
