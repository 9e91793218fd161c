use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use labnote_core::{ExperimentRecord, NewRecord, RecordId, RecordPatch};
use labnote_storage::{ChangeListener, RecordStore, StorageError, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Create,
    Update,
    Delete,
    Poll,
}

const OP_COUNT: usize = 5;

impl StoreOp {
    pub const ALL: [StoreOp; OP_COUNT] = [
        StoreOp::List,
        StoreOp::Create,
        StoreOp::Update,
        StoreOp::Delete,
        StoreOp::Poll,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
struct FaultState {
    failing: [AtomicBool; OP_COUNT],
    calls: [AtomicUsize; OP_COUNT],
}

/// Shared control over a [`FlakyStore`], kept by the test after the store
/// itself has been handed to a notebook.
#[derive(Clone, Default)]
pub struct FaultSwitch(Arc<FaultState>);

impl FaultSwitch {
    pub fn fail(&self, op: StoreOp) {
        self.0.failing[op.index()].store(true, Ordering::SeqCst);
    }

    pub fn heal(&self, op: StoreOp) {
        self.0.failing[op.index()].store(false, Ordering::SeqCst);
    }

    pub fn fail_all(&self) {
        StoreOp::ALL.iter().for_each(|op| self.fail(*op));
    }

    pub fn heal_all(&self) {
        StoreOp::ALL.iter().for_each(|op| self.heal(*op));
    }

    pub fn is_failing(&self, op: StoreOp) -> bool {
        self.0.failing[op.index()].load(Ordering::SeqCst)
    }

    /// Number of times `op` reached the store, failed or not.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.0.calls[op.index()].load(Ordering::SeqCst)
    }

    fn enter(&self, op: StoreOp) -> Result<(), StorageError> {
        self.0.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        if self.is_failing(op) {
            return Err(StorageError::Unavailable(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

/// Wraps a real store and fails chosen operations on demand.
pub struct FlakyStore {
    inner: Box<dyn RecordStore>,
    faults: FaultSwitch,
}

impl FlakyStore {
    pub fn new(inner: Box<dyn RecordStore>) -> (Self, FaultSwitch) {
        let faults = FaultSwitch::default();
        (
            Self {
                inner,
                faults: faults.clone(),
            },
            faults,
        )
    }
}

impl RecordStore for FlakyStore {
    fn list(&self) -> Result<Vec<ExperimentRecord>, StorageError> {
        self.faults.enter(StoreOp::List)?;
        self.inner.list()
    }

    fn create(&mut self, record: NewRecord) -> Result<ExperimentRecord, StorageError> {
        self.faults.enter(StoreOp::Create)?;
        self.inner.create(record)
    }

    fn update(
        &mut self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<ExperimentRecord, StorageError> {
        self.faults.enter(StoreOp::Update)?;
        self.inner.update(id, patch)
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StorageError> {
        self.faults.enter(StoreOp::Delete)?;
        self.inner.delete(id)
    }

    fn subscribe(&mut self, listener: ChangeListener) -> Subscription {
        self.inner.subscribe(listener)
    }

    fn poll_changes(&mut self) -> Result<bool, StorageError> {
        self.faults.enter(StoreOp::Poll)?;
        self.inner.poll_changes()
    }
}
