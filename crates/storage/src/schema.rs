use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS experiment_records (
    rowid INTEGER PRIMARY KEY,
    id BLOB NOT NULL UNIQUE CHECK (length(id) = 16),
    user_id BLOB CHECK (user_id IS NULL OR length(user_id) = 16),
    sequence_number INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    experimenter TEXT NOT NULL DEFAULT '',
    transistors BLOB NOT NULL,
    capacitors BLOB NOT NULL,
    voltages BLOB NOT NULL,
    waveform_image TEXT,
    observations TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_created ON experiment_records (created_at DESC);
CREATE INDEX IF NOT EXISTS idx_records_owner ON experiment_records (user_id);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        init_schema(&conn)?;
        let version: i32 =
            conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        assert_eq!(version, SCHEMA_VERSION);
        Ok(())
    }
}
