use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use labnote_core::{
    ExperimentRecord, NewRecord, OwnerId, RecordContent, RecordId, RecordPatch, TransistorSize,
    sequence_after,
};

use crate::error::StorageError;
use crate::notify::{ChangeListener, ChangeNotifier, Subscription};
use crate::traits::RecordStore;

const RECORD_COLUMNS: &str = "id, user_id, sequence_number, timestamp, experimenter, transistors, capacitors, voltages, waveform_image, observations, created_at, updated_at";

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn encode_map<T: Serialize>(map: &T) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(map).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_map<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    rmp_serde::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn to_instant(micros: i64, label: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StorageError::Serialization(format!("invalid {label} instant")))
}

/// Record store backed by a SQLite database.
///
/// Writes require an owner; rows created through this handle carry it as
/// `user_id`. Commits from other connections to the same file are picked up
/// by [`RecordStore::poll_changes`] through `PRAGMA data_version`.
pub struct SqliteStore {
    conn: Connection,
    owner: Option<OwnerId>,
    notifier: ChangeNotifier,
    data_version: i64,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        crate::schema::init_schema(&conn)?;
        let data_version = read_data_version(&conn)?;
        Ok(Self {
            conn,
            owner: None,
            notifier: ChangeNotifier::new(),
            data_version,
        })
    }

    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn set_owner(&mut self, owner: Option<OwnerId>) {
        self.owner = owner;
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn get(&self, id: RecordId) -> Result<Option<ExperimentRecord>, StorageError> {
        fetch_record(&self.conn, id)
    }

    /// Push a fresh listing to subscribers after a committed write.
    fn broadcast(&self) {
        if !self.notifier.has_listeners() {
            return;
        }
        match self.list() {
            Ok(records) => self.notifier.notify(&records),
            Err(e) => warn!(error = %e, "change committed but re-list failed"),
        }
    }
}

fn read_data_version(conn: &Connection) -> Result<i64, StorageError> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

type RawRow = (
    Vec<u8>,
    Option<Vec<u8>>,
    i64,
    i64,
    String,
    Vec<u8>,
    Vec<u8>,
    Vec<u8>,
    Option<String>,
    String,
    i64,
    i64,
);

fn read_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

fn decode_row(raw: RawRow) -> Result<ExperimentRecord, StorageError> {
    let (
        id_bytes,
        user_id_bytes,
        sequence_number,
        timestamp,
        experimenter,
        transistors,
        capacitors,
        voltages,
        waveform_image,
        observations,
        created_at,
        updated_at,
    ) = raw;

    let user_id = match user_id_bytes {
        Some(bytes) => Some(OwnerId::from_bytes(to_array::<16>(bytes, "user_id")?)),
        None => None,
    };
    let transistors: BTreeMap<String, TransistorSize> = decode_map(&transistors)?;

    Ok(ExperimentRecord {
        id: RecordId::from_bytes(to_array::<16>(id_bytes, "id")?),
        user_id,
        sequence_number,
        timestamp,
        content: RecordContent {
            experimenter,
            transistors,
            capacitors: decode_map(&capacitors)?,
            voltages: decode_map(&voltages)?,
            waveform_image,
            observations,
        },
        created_at: to_instant(created_at, "created_at")?,
        updated_at: to_instant(updated_at, "updated_at")?,
    })
}

fn fetch_record(conn: &Connection, id: RecordId) -> Result<Option<ExperimentRecord>, StorageError> {
    let raw = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM experiment_records WHERE id = ?1"),
            rusqlite::params![id.as_bytes().as_slice()],
            read_raw,
        )
        .optional()?;
    raw.map(decode_row).transpose()
}

/// Sequence number to store for a create requesting `requested`.
///
/// Runs inside the insert transaction, so two sessions that computed the
/// same number from stale listings still end up with distinct values.
fn allocate_sequence(tx: &Transaction, requested: i64) -> Result<i64, StorageError> {
    let max: i64 = tx.query_row(
        "SELECT COALESCE(MAX(sequence_number), 0) FROM experiment_records",
        [],
        |row| row.get(0),
    )?;
    if requested > max {
        return Ok(requested);
    }
    let allocated = sequence_after(max)?;
    debug!(requested, allocated, "sequence number already taken");
    Ok(allocated)
}

fn map_write_error(err: rusqlite::Error, id: RecordId) -> StorageError {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            StorageError::Rejected(format!("constraint violation on record {id}"))
        }
        other => StorageError::Sqlite(other),
    }
}

impl RecordStore for SqliteStore {
    fn list(&self) -> Result<Vec<ExperimentRecord>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM experiment_records ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], read_raw)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(decode_row(row?)?);
        }
        Ok(result)
    }

    fn create(&mut self, record: NewRecord) -> Result<ExperimentRecord, StorageError> {
        let owner = self.owner.ok_or(StorageError::NotAuthenticated)?;
        let id = RecordId::new();
        let now = Utc::now();

        let tx = self.conn.transaction()?;
        let sequence_number = allocate_sequence(&tx, record.sequence_number)?;
        let content = &record.content;
        tx.execute(
            &format!(
                "INSERT INTO experiment_records ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            rusqlite::params![
                id.as_bytes().as_slice(),
                owner.as_bytes().as_slice(),
                sequence_number,
                record.timestamp,
                content.experimenter,
                encode_map(&content.transistors)?,
                encode_map(&content.capacitors)?,
                encode_map(&content.voltages)?,
                content.waveform_image,
                content.observations,
                now.timestamp_micros(),
                now.timestamp_micros(),
            ],
        )
        .map_err(|e| map_write_error(e, id))?;
        let stored = fetch_record(&tx, id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        tx.commit()?;

        debug!(record = %id, sequence_number, "record inserted");
        self.broadcast();
        Ok(stored)
    }

    fn update(
        &mut self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<ExperimentRecord, StorageError> {
        let tx = self.conn.transaction()?;
        let mut record =
            fetch_record(&tx, id)?.ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        patch.apply_to(&mut record.content);
        record.updated_at = Utc::now();

        let content = &record.content;
        tx.execute(
            "UPDATE experiment_records SET experimenter = ?1, transistors = ?2, capacitors = ?3, voltages = ?4, waveform_image = ?5, observations = ?6, updated_at = ?7 WHERE id = ?8",
            rusqlite::params![
                content.experimenter,
                encode_map(&content.transistors)?,
                encode_map(&content.capacitors)?,
                encode_map(&content.voltages)?,
                content.waveform_image,
                content.observations,
                record.updated_at.timestamp_micros(),
                id.as_bytes().as_slice(),
            ],
        )
        .map_err(|e| map_write_error(e, id))?;
        tx.commit()?;

        debug!(record = %id, "record updated");
        self.broadcast();
        Ok(record)
    }

    fn delete(&mut self, id: RecordId) -> Result<(), StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM experiment_records WHERE id = ?1",
            rusqlite::params![id.as_bytes().as_slice()],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }

        debug!(record = %id, "record deleted");
        self.broadcast();
        Ok(())
    }

    fn subscribe(&mut self, listener: ChangeListener) -> Subscription {
        self.notifier.subscribe(listener)
    }

    fn poll_changes(&mut self) -> Result<bool, StorageError> {
        let version = read_data_version(&self.conn)?;
        if version == self.data_version {
            return Ok(false);
        }
        self.data_version = version;
        debug!(version, "external commit detected");
        self.broadcast();
        Ok(true)
    }
}
