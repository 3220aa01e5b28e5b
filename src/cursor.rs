// src/cursor.rs

//! Per-source cursor persistence.
//!
//! The cursor store maps each source id to the highest announcement
//! identifier already processed. It is the only state that survives across
//! runs. `flush` is the only operation with an external side effect; it
//! writes atomically (temp file + rename) and is called at most once per
//! run, only if some cursor advanced.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Mapping source id -> last seen identifier.
#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
    cursors: HashMap<String, u64>,
    dirty: bool,
}

impl CursorStore {
    /// Load the store from a JSON file. A missing or corrupt file is
    /// treated as empty state so one bad file cannot block all sources.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cursors = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!("Cursor file {:?} is corrupt: {}. Starting empty.", path, e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                log::warn!("Cursor file {:?} unreadable: {}. Starting empty.", path, e);
                HashMap::new()
            }
        };

        Self {
            path,
            cursors,
            dirty: false,
        }
    }

    /// Last seen identifier for a source, 0 if none recorded.
    pub fn last_seen(&self, source_id: &str) -> u64 {
        self.cursors.get(source_id).copied().unwrap_or(0)
    }

    /// Advance a source's cursor, but only upward. Returns true if the
    /// cursor moved.
    pub fn record_if_advanced(&mut self, source_id: &str, candidate_max: u64) -> bool {
        if candidate_max > self.last_seen(source_id) {
            self.cursors.insert(source_id.to_string(), candidate_max);
            self.dirty = true;
            return true;
        }
        false
    }

    /// Whether any cursor advanced since load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the entire mapping atomically (write to temp, then rename).
    pub fn flush(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = serde_json::to_vec_pretty(&self.cursors)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;

        self.dirty = false;
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all cursors, sorted by source id (for the status view).
    pub fn entries(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<_> = self
            .cursors
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty_state() {
        let tmp = TempDir::new().unwrap();
        let store = CursorStore::load(tmp.path().join("cursors.json"));
        assert_eq!(store.last_seen("library"), 0);
        assert!(!store.is_dirty());
    }

    #[test]
    fn corrupt_file_is_swallowed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cursors.json");
        fs::write(&path, "{not json").unwrap();

        let store = CursorStore::load(&path);
        assert_eq!(store.last_seen("library"), 0);
    }

    #[test]
    fn record_only_advances_upward() {
        let tmp = TempDir::new().unwrap();
        let mut store = CursorStore::load(tmp.path().join("cursors.json"));

        assert!(store.record_if_advanced("dorm", 15));
        assert!(!store.record_if_advanced("dorm", 15));
        assert!(!store.record_if_advanced("dorm", 10));
        assert_eq!(store.last_seen("dorm"), 15);
        assert!(store.record_if_advanced("dorm", 20));
        assert_eq!(store.last_seen("dorm"), 20);
    }

    #[test]
    fn flush_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data").join("cursors.json");

        let mut store = CursorStore::load(&path);
        store.record_if_advanced("library", 1234);
        store.record_if_advanced("cse_job", 88);
        store.flush().unwrap();
        assert!(!store.is_dirty());

        let reloaded = CursorStore::load(&path);
        assert_eq!(reloaded.last_seen("library"), 1234);
        assert_eq!(reloaded.last_seen("cse_job"), 88);
        assert_eq!(reloaded.entries().len(), 2);
    }

    #[test]
    fn flush_writes_pretty_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cursors.json");

        let mut store = CursorStore::load(&path);
        store.record_if_advanced("library", 7);
        store.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains('\n'));
        assert!(content.contains("\"library\": 7"));
    }
}
