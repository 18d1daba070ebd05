use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::version::catalog::CatalogStorer;
use crate::version::error::CacheError;
use crate::version::model::{Version, VersionsData, group_and_sort};

/// Raw `versions` row before timestamp conversion
struct VersionRow {
    version: Version,
    fetched_at_ms: Option<i64>,
}

/// SQLite-backed catalog store
pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    pub fn new(db_path: &Path) -> Result<Self, CacheError> {
        info!("Initializing cache database at {:?}", db_path);

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!("Database connection established");

        let cache = Self {
            conn: Mutex::new(conn),
        };

        cache.create_schema()?;
        info!("Cache initialized successfully");

        Ok(cache)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn create_schema(&self) -> Result<(), CacheError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS catalog (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                fetched_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS versions (
                tag TEXT PRIMARY KEY,
                major INTEGER NOT NULL,
                minor INTEGER NOT NULL,
                patch INTEGER NOT NULL,
                rc INTEGER NOT NULL,
                is_rc INTEGER NOT NULL,
                full_version TEXT NOT NULL,
                fetched_at INTEGER
            )
            "#,
            [],
        )?;

        debug!("Database schema created successfully");
        Ok(())
    }

    fn to_datetime(ms: i64) -> Result<DateTime<Utc>, CacheError> {
        DateTime::from_timestamp_millis(ms).ok_or(CacheError::InvalidTimestamp(ms))
    }

    /// Remove the stored catalog
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM versions", [])?;
        tx.execute("DELETE FROM catalog", [])?;
        tx.commit()?;
        info!("Cleared version catalog");
        Ok(())
    }
}

impl CatalogStorer for Cache {
    fn load_catalog(&self) -> Result<Option<VersionsData>, CacheError> {
        let conn = self.lock_conn()?;

        let fetched_at: Option<i64> = conn
            .query_row("SELECT fetched_at FROM catalog WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(fetched_at) = fetched_at else {
            debug!("No catalog stored yet");
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT tag, major, minor, patch, rc, is_rc, full_version, fetched_at
            FROM versions
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(VersionRow {
                    version: Version {
                        tag: row.get(0)?,
                        major: row.get(1)?,
                        minor: row.get(2)?,
                        patch: row.get(3)?,
                        candidate_number: row.get(4)?,
                        is_release_candidate: row.get(5)?,
                        full_version: row.get(6)?,
                        fetched_at: None,
                    },
                    fetched_at_ms: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let versions = rows
            .into_iter()
            .map(|row| {
                let mut version = row.version;
                version.fetched_at = row.fetched_at_ms.map(Self::to_datetime).transpose()?;
                Ok(version)
            })
            .collect::<Result<Vec<_>, CacheError>>()?;

        debug!("Loaded {} cached versions", versions.len());

        Ok(Some(VersionsData {
            fetched_at: Self::to_datetime(fetched_at)?,
            groups: group_and_sort(versions),
        }))
    }

    fn save_catalog(&self, data: &VersionsData) -> Result<(), CacheError> {
        debug!("Saving catalog with {} versions", data.len());

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        // The catalog is replaced as a whole
        tx.execute("DELETE FROM versions", [])?;
        tx.execute(
            r#"
            INSERT INTO catalog (id, fetched_at) VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET fetched_at = excluded.fetched_at
            "#,
            [data.fetched_at.timestamp_millis()],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO versions
                    (tag, major, minor, patch, rc, is_rc, full_version, fetched_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for v in data.versions() {
                stmt.execute((
                    &v.tag,
                    v.major,
                    v.minor,
                    v.patch,
                    v.candidate_number,
                    v.is_release_candidate,
                    &v.full_version,
                    v.fetched_at.map(|t| t.timestamp_millis()),
                ))?;
            }
        }

        tx.commit()?;

        debug!("Successfully saved catalog");
        Ok(())
    }
}
