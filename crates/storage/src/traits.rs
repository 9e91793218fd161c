use labnote_core::{ExperimentRecord, NewRecord, RecordId, RecordPatch};

use crate::error::StorageError;
use crate::notify::{ChangeListener, Subscription};

/// A persistent table of experiment records.
///
/// Every committed insert, update or delete pushes a fresh full listing to
/// subscribers; there are no per-row diffs.
pub trait RecordStore: Send {
    /// All records, newest first.
    fn list(&self) -> Result<Vec<ExperimentRecord>, StorageError>;

    /// Insert a record and return it as stored. The store assigns the id,
    /// the owner and the bookkeeping instants; it may raise the sequence
    /// number if another session already used it.
    fn create(&mut self, record: NewRecord) -> Result<ExperimentRecord, StorageError>;

    fn update(
        &mut self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<ExperimentRecord, StorageError>;

    fn delete(&mut self, id: RecordId) -> Result<(), StorageError>;

    fn subscribe(&mut self, listener: ChangeListener) -> Subscription;

    /// Look for commits made through other handles on the same backing
    /// storage and notify subscribers if any were seen.
    fn poll_changes(&mut self) -> Result<bool, StorageError>;
}
