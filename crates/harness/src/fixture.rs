use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration};
use tempfile::TempDir;

use labnote_core::{Clock, OwnerId, SteppingClock};
use labnote_engine::{LocalBackup, Notebook};
use labnote_storage::{LocalStore, RecordStore, SqliteStore};

use crate::flaky::{FaultSwitch, FlakyStore};

const START_MS: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z

/// A clock that starts at a fixed instant and advances 1ms per reading.
pub fn stepping_clock() -> Box<dyn Clock> {
    let start = DateTime::from_timestamp_millis(START_MS).unwrap_or_default();
    Box::new(SteppingClock::new(start, Duration::milliseconds(1)))
}

/// A loaded notebook over a fault-injectable store in a scratch directory.
pub struct TestNotebook {
    pub notebook: Notebook,
    pub faults: FaultSwitch,
    pub owner: Option<OwnerId>,
    dir: TempDir,
}

impl TestNotebook {
    /// SQLite-backed notebook with an authenticated owner and a local backup.
    pub fn sqlite() -> Result<Self, Box<dyn std::error::Error>> {
        Self::sqlite_with_undo_depth(None)
    }

    /// Like [`TestNotebook::sqlite`], optionally capping the undo buffer.
    pub fn sqlite_with_undo_depth(
        undo_depth: Option<usize>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let owner = OwnerId::new();
        let store = SqliteStore::open(path_str(&dir.path().join("notebook.db"))?)?.with_owner(owner);
        let mut t = Self::build(dir, Box::new(store), Some(owner))?;
        if let Some(depth) = undo_depth {
            t.notebook = t.notebook.with_undo_depth(depth);
        }
        Ok(t)
    }

    /// SQLite-backed notebook whose store has no owner, so creates are refused.
    pub fn sqlite_anonymous() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = SqliteStore::open(path_str(&dir.path().join("notebook.db"))?)?;
        Self::build(dir, Box::new(store), None)
    }

    /// Notebook over the local JSON file store.
    pub fn local() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = LocalStore::open(dir.path().join("notebook.json"))?;
        Self::build(dir, Box::new(store), None)
    }

    /// Local JSON notebook whose file already holds `contents`.
    pub fn local_with_contents(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notebook.json");
        std::fs::write(&path, contents)?;
        let store = LocalStore::open(path)?;
        Self::build(dir, Box::new(store), None)
    }

    fn build(
        dir: TempDir,
        store: Box<dyn RecordStore>,
        owner: Option<OwnerId>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (flaky, faults) = FlakyStore::new(store);
        let mut notebook = Notebook::new(Box::new(flaky))
            .with_backup(LocalBackup::new(dir.path().join("backup.json")))
            .with_clock(stepping_clock());
        notebook.load()?;
        Ok(Self {
            notebook,
            faults,
            owner,
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("notebook.db")
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.path().join("backup.json")
    }

    /// A second notebook on the same SQLite file, as if opened in another tab.
    pub fn second_session(&self) -> Result<Notebook, Box<dyn std::error::Error>> {
        let mut store = SqliteStore::open(path_str(&self.db_path())?)?;
        store.set_owner(self.owner);
        let mut notebook = Notebook::new(Box::new(store)).with_clock(stepping_clock());
        notebook.load()?;
        Ok(notebook)
    }
}

fn path_str(path: &Path) -> Result<&str, Box<dyn std::error::Error>> {
    path.to_str().ok_or_else(|| "non-utf8 scratch path".into())
}
