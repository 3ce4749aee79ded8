//! Export history kept in a single SQLite table.
//!
//! The database is opened for every operation and closed when it returns, so
//! nothing holds a lock between calls. Each statement is atomic on its own;
//! there are no multi-statement transactions.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::error::Result;

/// Timestamp layout stored in the `timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row id assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One exported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    /// Row id, increasing with insertion order.
    pub id: RecordId,
    /// Path of the exported file as it was written.
    pub file_name: String,
    /// Local time of the export, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
}

impl HistoryRecord {
    /// Base name of the exported file, for display.
    #[must_use]
    pub fn display_name(&self) -> String {
        Path::new(&self.file_name).file_name().map_or_else(
            || self.file_name.clone(),
            |f| f.to_string_lossy().into_owned(),
        )
    }

    /// Whether the exported file is still on disk.
    #[must_use]
    pub fn file_exists(&self) -> bool {
        Path::new(&self.file_name).exists()
    }
}

/// What happened to the file on disk during [`HistoryStore::delete`].
#[derive(Debug)]
pub enum FileRemoval {
    /// The file existed and was removed.
    Removed,
    /// There was no file to remove.
    Absent,
    /// The file could not be removed. Records were still deleted.
    Failed(io::Error),
}

/// Outcome of [`HistoryStore::delete`].
#[derive(Debug)]
pub struct DeleteReport {
    /// File removal result.
    pub file: FileRemoval,
    /// Number of history rows removed.
    pub records_removed: usize,
}

impl DeleteReport {
    /// `true` unless removing the file failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !matches!(self.file, FileRemoval::Failed(_))
    }
}

/// Handle to the history database file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    db_path: PathBuf,
}

impl HistoryStore {
    /// Point the store at `db_path`, creating the file and table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            db_path: db_path.into(),
        };

        if let Some(parent) = store.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        store.connect()?;
        log::debug!("history database at {}", store.db_path.display());
        Ok(store)
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name   TEXT,
                timestamp   TEXT
            )",
            [],
        )?;
        Ok(conn)
    }

    /// Append a record for `file_name` stamped with the current local time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be written.
    pub fn record(&self, file_name: &str) -> Result<RecordId> {
        let conn = self.connect()?;
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        conn.execute(
            "INSERT INTO history (file_name, timestamp) VALUES (?1, ?2)",
            params![file_name, timestamp],
        )?;
        let id = RecordId(conn.last_insert_rowid());
        log::debug!("recorded {file_name} as #{id}");
        Ok(id)
    }

    /// All records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn list(&self) -> Result<Vec<HistoryRecord>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT id, file_name, timestamp FROM history ORDER BY id DESC")?;

        let rows = stmt.query_map([], |row| {
            Ok(HistoryRecord {
                id: RecordId(row.get(0)?),
                file_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                timestamp: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    /// Remove `file_name` from disk and drop every record with that exact name.
    ///
    /// A missing file is not an error. A file that cannot be removed is
    /// reported in [`DeleteReport::file`] and the records are dropped anyway.
    ///
    /// # Errors
    ///
    /// Returns an error only if the database cannot be written.
    pub fn delete(&self, file_name: &str) -> Result<DeleteReport> {
        let file = match fs::remove_file(file_name) {
            Ok(()) => FileRemoval::Removed,
            Err(e) if e.kind() == io::ErrorKind::NotFound => FileRemoval::Absent,
            Err(e) => {
                log::warn!("failed to remove {file_name}: {e}");
                FileRemoval::Failed(e)
            }
        };

        let conn = self.connect()?;
        let records_removed =
            conn.execute("DELETE FROM history WHERE file_name = ?1", params![file_name])?;

        log::info!("deleted {file_name} ({records_removed} record(s), file {file:?})");
        Ok(DeleteReport {
            file,
            records_removed,
        })
    }

    /// Drop records whose file no longer exists. Returns how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read or written.
    pub fn prune_missing(&self) -> Result<usize> {
        let missing: Vec<HistoryRecord> = self
            .list()?
            .into_iter()
            .filter(|r| !r.file_exists())
            .collect();

        let conn = self.connect()?;
        let mut removed = 0;
        for record in &missing {
            removed += conn.execute("DELETE FROM history WHERE id = ?1", params![record.id.0])?;
        }

        if removed > 0 {
            log::info!("pruned {removed} dangling history record(s)");
        }
        Ok(removed)
    }
}
