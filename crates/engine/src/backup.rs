use std::fs;
use std::path::{Path, PathBuf};

use labnote_core::{ExperimentRecord, legacy};

use crate::error::EngineError;

/// On-disk copy of the last listing the store returned, read back when the
/// store cannot be reached.
#[derive(Debug, Clone)]
pub struct LocalBackup {
    path: PathBuf,
}

impl LocalBackup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, records: &[ExperimentRecord]) -> Result<(), EngineError> {
        let encoded = legacy::encode_records(records)?;
        fs::write(&self.path, encoded)
            .map_err(|e| EngineError::Backup(format!("{}: {e}", self.path.display())))
    }

    /// `Ok(None)` when no backup has been written yet.
    pub fn load(&self) -> Result<Option<Vec<ExperimentRecord>>, EngineError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::Backup(format!("{}: {e}", self.path.display()))),
        };
        legacy::decode_records(&raw)
            .map(Some)
            .map_err(|e| EngineError::Backup(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_backup_is_none() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let backup = LocalBackup::new(dir.path().join("backup.json"));
        assert!(backup.load()?.is_none());
        Ok(())
    }

    #[test]
    fn corrupt_backup_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("backup.json");
        fs::write(&path, "[{\"id\": ")?;
        let backup = LocalBackup::new(&path);
        assert!(matches!(backup.load(), Err(EngineError::Backup(_))));
        Ok(())
    }
}
