use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use labnote_core::{
    ExperimentRecord, NewRecord, RecordContent, RecordId, RecordPatch, legacy, sequence_after,
};

use crate::error::StorageError;
use crate::notify::{ChangeListener, ChangeNotifier, Subscription};
use crate::traits::RecordStore;

/// Record store kept in a single JSON file in the local notebook format.
///
/// The file holds a camelCase array, newest first. Opening an existing file
/// migrates it in place, so entries that lacked ids or sequence numbers get
/// stable values before anything else reads them.
pub struct LocalStore {
    path: PathBuf,
    notifier: ChangeNotifier,
    last_digest: Option<blake3::Hash>,
}

impl LocalStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let mut store = Self {
            path: path.into(),
            notifier: ChangeNotifier::new(),
            last_digest: None,
        };
        if let Some(raw) = store.read_raw()? {
            let records = legacy::decode_records(&raw)?;
            let normalized = legacy::encode_records(&records)?;
            if normalized != raw {
                info!(path = %store.path.display(), count = records.len(), "migrating notebook file");
                store.write_encoded(&normalized)?;
            } else {
                store.last_digest = Some(blake3::hash(raw.as_bytes()));
            }
        }
        Ok(store)
    }

    /// Like [`LocalStore::open`], but a notebook that does not exist yet
    /// starts with one blank record numbered 1, created at `timestamp`.
    pub fn open_seeded(path: impl Into<PathBuf>, timestamp: i64) -> Result<Self, StorageError> {
        let mut store = Self::open(path)?;
        if !store.path.exists() {
            let created_at = DateTime::from_timestamp_millis(timestamp).unwrap_or_else(Utc::now);
            let blank = ExperimentRecord {
                id: RecordId::new(),
                user_id: None,
                sequence_number: 1,
                timestamp,
                content: RecordContent::default(),
                created_at,
                updated_at: created_at,
            };
            info!(path = %store.path.display(), "starting new notebook");
            store.commit(&[blank])?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn read_records(&self) -> Result<Vec<ExperimentRecord>, StorageError> {
        match self.read_raw()? {
            Some(raw) => Ok(legacy::decode_records(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the file atomically so readers never see a partial array.
    fn write_encoded(&mut self, encoded: &str) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(encoded.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;
        self.last_digest = Some(blake3::hash(encoded.as_bytes()));
        Ok(())
    }

    fn commit(&mut self, records: &[ExperimentRecord]) -> Result<(), StorageError> {
        let encoded = legacy::encode_records(records)?;
        self.write_encoded(&encoded)?;
        if self.notifier.has_listeners() {
            self.notifier.notify(records);
        }
        Ok(())
    }
}

impl RecordStore for LocalStore {
    fn list(&self) -> Result<Vec<ExperimentRecord>, StorageError> {
        self.read_records()
    }

    fn create(&mut self, record: NewRecord) -> Result<ExperimentRecord, StorageError> {
        let mut records = self.read_records()?;
        let max = records.iter().map(|r| r.sequence_number).max().unwrap_or(0);
        let sequence_number = if record.sequence_number > max {
            record.sequence_number
        } else {
            let allocated = sequence_after(max)?;
            debug!(requested = record.sequence_number, allocated, "sequence number already taken");
            allocated
        };

        let now = Utc::now();
        let stored = ExperimentRecord {
            id: RecordId::new(),
            user_id: None,
            sequence_number,
            timestamp: record.timestamp,
            content: record.content,
            created_at: now,
            updated_at: now,
        };
        records.insert(0, stored.clone());
        self.commit(&records)?;

        debug!(record = %stored.id, sequence_number, "record inserted");
        Ok(stored)
    }

    fn update(
        &mut self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<ExperimentRecord, StorageError> {
        let mut records = self.read_records()?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        patch.apply_to(&mut record.content);
        record.updated_at = Utc::now();
        let updated = record.clone();
        self.commit(&records)?;

        debug!(record = %id, "record updated");
        Ok(updated)
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StorageError> {
        let mut records = self.read_records()?;
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        records.remove(index);
        self.commit(&records)?;

        debug!(record = %id, "record deleted");
        Ok(())
    }

    fn subscribe(&mut self, listener: ChangeListener) -> Subscription {
        self.notifier.subscribe(listener)
    }

    fn poll_changes(&mut self) -> Result<bool, StorageError> {
        let raw = self.read_raw()?;
        let digest = raw.as_deref().map(|r| blake3::hash(r.as_bytes()));
        if digest == self.last_digest {
            return Ok(false);
        }
        self.last_digest = digest;
        debug!(path = %self.path.display(), "notebook file changed on disk");
        if self.notifier.has_listeners() {
            match raw.as_deref().map(legacy::decode_records).transpose() {
                Ok(records) => self.notifier.notify(&records.unwrap_or_default()),
                Err(e) => warn!(error = %e, "changed notebook file could not be decoded"),
            }
        }
        Ok(true)
    }
}
