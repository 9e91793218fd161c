pub mod backup;
pub mod error;
pub mod undo;

pub use backup::LocalBackup;
pub use error::EngineError;
pub use undo::{DeletionBuffer, RecordSnapshot};

use crossbeam_channel::{Receiver, unbounded};
use tracing::{debug, info, warn};

use labnote_core::{
    Clock, ExperimentRecord, ExportDocument, NewRecord, RecordContent, RecordId, RecordPatch,
    SystemClock, export, next_sequence_number,
};
use labnote_storage::{RecordStore, Subscription};

/// Where the current in-memory listing came from after [`Notebook::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Store,
    Backup,
}

/// Owns the in-memory record list and keeps it consistent with a store.
///
/// Edits and deletes are applied locally before the store confirms them and
/// rolled back if it refuses. Creates are not: new records appear once the
/// store's change notification has been applied. Any failure replaces the
/// single user-facing error message; nothing is retried.
pub struct Notebook {
    store: Box<dyn RecordStore>,
    records: Vec<ExperimentRecord>,
    deleted: DeletionBuffer,
    backup: Option<LocalBackup>,
    clock: Box<dyn Clock>,
    last_error: Option<String>,
    changes: Receiver<Vec<ExperimentRecord>>,
    _subscription: Subscription,
}

impl Notebook {
    pub fn new(mut store: Box<dyn RecordStore>) -> Self {
        let (tx, changes) = unbounded();
        let subscription = store.subscribe(Box::new(move |records: &[ExperimentRecord]| {
            // The receiver lives as long as the notebook; a closed channel
            // only means the notebook is being torn down.
            let _ = tx.send(records.to_vec());
        }));
        Self {
            store,
            records: Vec::new(),
            deleted: DeletionBuffer::unbounded(),
            backup: None,
            clock: Box::new(SystemClock),
            last_error: None,
            changes,
            _subscription: subscription,
        }
    }

    pub fn with_backup(mut self, backup: LocalBackup) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_undo_depth(mut self, max_depth: usize) -> Self {
        self.deleted = DeletionBuffer::with_max_depth(max_depth);
        self
    }

    pub fn records(&self) -> &[ExperimentRecord] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&ExperimentRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn undo_depth(&self) -> usize {
        self.deleted.depth()
    }

    /// The record that [`Notebook::undo_delete`] would bring back.
    pub fn next_undo(&self) -> Option<&ExperimentRecord> {
        self.deleted.peek()
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Fetch the full listing from the store, falling back to the local
    /// backup when the store fails.
    pub fn load(&mut self) -> Result<LoadSource, EngineError> {
        self.discard_pending_changes();
        let err = match self.store.list() {
            Ok(records) => {
                info!(count = records.len(), "records loaded");
                self.replace_records(records);
                return Ok(LoadSource::Store);
            }
            Err(e) => EngineError::from(e),
        };
        warn!(error = %err, "load failed");

        let cached = match self.backup.as_ref().map(LocalBackup::load) {
            Some(Ok(cached)) => cached,
            Some(Err(e)) => {
                warn!(error = %e, "local backup unreadable, ignoring");
                None
            }
            None => None,
        };
        match cached {
            Some(records) => {
                info!(count = records.len(), "using local backup");
                self.records = records;
                self.last_error = Some(format!("{err} (using local backup)"));
                Ok(LoadSource::Backup)
            }
            None => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Pick up changes committed elsewhere and apply the newest pending
    /// listing. Returns whether the in-memory list was replaced.
    pub fn sync(&mut self) -> Result<bool, EngineError> {
        if let Err(e) = self.store.poll_changes() {
            return Err(self.fail("sync", e.into()));
        }
        Ok(self.apply_pending_changes())
    }

    fn apply_pending_changes(&mut self) -> bool {
        match self.changes.try_iter().last() {
            Some(records) => {
                debug!(count = records.len(), "applying change notification");
                self.replace_records(records);
                true
            }
            None => false,
        }
    }

    fn discard_pending_changes(&mut self) {
        let dropped = self.changes.try_iter().count();
        if dropped > 0 {
            debug!(dropped, "superseded change notifications discarded");
        }
    }

    fn replace_records(&mut self, records: Vec<ExperimentRecord>) {
        self.records = records;
        if let Some(backup) = &self.backup
            && let Err(e) = backup.save(&self.records)
        {
            warn!(error = %e, "could not write local backup");
        }
    }

    /// Reload after a failed mutation. If the store is still failing, the
    /// rolled-back local state stays as it is.
    fn resync_after_failure(&mut self) {
        self.discard_pending_changes();
        match self.store.list() {
            Ok(records) => self.replace_records(records),
            Err(e) => warn!(error = %e, "reload after failure also failed"),
        }
    }

    fn fail(&mut self, action: &str, err: EngineError) -> EngineError {
        warn!(action, error = %err, "notebook operation failed");
        self.last_error = Some(err.to_string());
        err
    }

    fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Create a blank record numbered after the current highest one.
    pub fn create(&mut self) -> Result<ExperimentRecord, EngineError> {
        let content = RecordContent {
            experimenter: self
                .records
                .first()
                .map(|r| r.content.experimenter.clone())
                .unwrap_or_default(),
            ..RecordContent::default()
        };
        self.submit_new(content, "create")
    }

    /// Create a new record carrying all of `source`'s content.
    pub fn duplicate(&mut self, source: RecordId) -> Result<ExperimentRecord, EngineError> {
        let Some(content) = self.record(source).map(|r| r.content.clone()) else {
            return Err(self.fail("duplicate", EngineError::RecordNotFound(source.to_string())));
        };
        self.submit_new(content, "duplicate")
    }

    fn submit_new(
        &mut self,
        content: RecordContent,
        action: &str,
    ) -> Result<ExperimentRecord, EngineError> {
        let sequence_number = match next_sequence_number(&self.records) {
            Ok(n) => n,
            Err(e) => return Err(self.fail(action, e.into())),
        };
        let new = NewRecord {
            sequence_number,
            timestamp: self.clock.now_millis(),
            content,
        };
        match self.store.create(new) {
            Ok(stored) => {
                debug!(action, record = %stored.id, sequence = stored.sequence_number, "record created");
                self.apply_pending_changes();
                Ok(stored)
            }
            Err(e) => Err(self.fail(action, e.into())),
        }
    }

    /// Apply `patch` locally, then submit it. On failure the record is put
    /// back exactly as it was and the list is reloaded.
    pub fn update(
        &mut self,
        id: RecordId,
        patch: RecordPatch,
    ) -> Result<ExperimentRecord, EngineError> {
        let Some(snapshot) = RecordSnapshot::capture(&self.records, id) else {
            return Err(self.fail("update", EngineError::RecordNotFound(id.to_string())));
        };
        patch.apply_to(&mut self.records[snapshot.position].content);

        match self.store.update(id, &patch) {
            Ok(stored) => {
                self.apply_pending_changes();
                Ok(stored)
            }
            Err(e) => {
                snapshot.restore(&mut self.records);
                let err = self.fail("update", e.into());
                self.resync_after_failure();
                Err(err)
            }
        }
    }

    /// Remove a record locally and from the store. It becomes undoable only
    /// after the store confirms the delete.
    pub fn delete(&mut self, id: RecordId) -> Result<(), EngineError> {
        let Some(index) = self.position(id) else {
            return Err(self.fail("delete", EngineError::RecordNotFound(id.to_string())));
        };
        let snapshot = RecordSnapshot {
            position: index,
            record: self.records.remove(index),
        };

        match self.store.delete(id) {
            Ok(()) => {
                self.deleted.push(snapshot.record);
                self.apply_pending_changes();
                Ok(())
            }
            Err(e) => {
                snapshot.restore(&mut self.records);
                let err = self.fail("delete", e.into());
                self.resync_after_failure();
                Err(err)
            }
        }
    }

    /// Re-create the most recently deleted record as a new record.
    ///
    /// The entry is consumed even if the store refuses the create.
    pub fn undo_delete(&mut self) -> Result<Option<ExperimentRecord>, EngineError> {
        let Some(entry) = self.deleted.pop() else {
            return Ok(None);
        };
        debug!(original = %entry.id, "restoring deleted record");
        self.submit_new(entry.content, "undo delete").map(Some)
    }

    /// Render the current list for download. Touches neither the list nor
    /// the store.
    pub fn export(&self) -> Result<ExportDocument, EngineError> {
        Ok(export::export_records(&self.records, self.clock.now())?)
    }
}
