use std::collections::VecDeque;

use labnote_core::{ExperimentRecord, RecordId};

/// Records removed by the user, most recent last.
///
/// The store deletes rows outright, so an entry here is only the content
/// needed to re-create the record; restoring it yields a new identity.
pub struct DeletionBuffer {
    entries: VecDeque<ExperimentRecord>,
    max_depth: Option<usize>,
}

impl Default for DeletionBuffer {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl DeletionBuffer {
    pub fn unbounded() -> Self {
        Self {
            entries: VecDeque::new(),
            max_depth: None,
        }
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_depth: Some(max_depth),
        }
    }

    pub fn push(&mut self, record: ExperimentRecord) {
        self.entries.push_back(record);
        // Enforce depth limit by dropping oldest entry
        if let Some(max) = self.max_depth
            && self.entries.len() > max
        {
            self.entries.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<ExperimentRecord> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&ExperimentRecord> {
        self.entries.back()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A record as it was before an optimistic mutation, with its list position.
#[derive(Debug, Clone)]
pub struct RecordSnapshot {
    pub position: usize,
    pub record: ExperimentRecord,
}

impl RecordSnapshot {
    pub fn capture(records: &[ExperimentRecord], id: RecordId) -> Option<Self> {
        records
            .iter()
            .position(|r| r.id == id)
            .map(|position| Self {
                position,
                record: records[position].clone(),
            })
    }

    /// Put the record back: replace it in place if it is still listed,
    /// otherwise reinsert it where it was.
    pub fn restore(self, records: &mut Vec<ExperimentRecord>) {
        match records.iter().position(|r| r.id == self.record.id) {
            Some(index) => records[index] = self.record,
            None => {
                let at = self.position.min(records.len());
                records.insert(at, self.record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use labnote_core::RecordContent;

    fn record(seq: i64) -> ExperimentRecord {
        let now = Utc::now();
        ExperimentRecord {
            id: RecordId::new(),
            user_id: None,
            sequence_number: seq,
            timestamp: now.timestamp_millis(),
            content: RecordContent::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pops_most_recent_first() {
        let mut buffer = DeletionBuffer::unbounded();
        let a = record(1);
        let b = record(2);
        buffer.push(a.clone());
        buffer.push(b.clone());
        assert_eq!(buffer.depth(), 2);
        assert_eq!(buffer.pop().map(|r| r.id), Some(b.id));
        assert_eq!(buffer.pop().map(|r| r.id), Some(a.id));
        assert!(buffer.pop().is_none());
    }

    #[test]
    fn bounded_buffer_drops_oldest() {
        let mut buffer = DeletionBuffer::with_max_depth(2);
        let first = record(1);
        buffer.push(first.clone());
        buffer.push(record(2));
        buffer.push(record(3));
        assert_eq!(buffer.depth(), 2);
        assert!(buffer.pop().is_some());
        assert!(buffer.pop().is_some_and(|r| r.id != first.id));
        assert!(buffer.pop().is_none());
    }

    #[test]
    fn snapshot_restores_position() {
        let mut records = vec![record(3), record(2), record(1)];
        let snapshot = RecordSnapshot::capture(&records, records[1].id).unwrap();
        let removed = records.remove(1);
        snapshot.restore(&mut records);
        assert_eq!(records[1], removed);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn snapshot_replaces_edited_record() {
        let mut records = vec![record(2), record(1)];
        let snapshot = RecordSnapshot::capture(&records, records[0].id).unwrap();
        records[0].content.observations = "optimistic".into();
        snapshot.restore(&mut records);
        assert_eq!(records[0].content.observations, "");
        assert_eq!(records.len(), 2);
    }
}
