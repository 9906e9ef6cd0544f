//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::SiteStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{IndexEntry, LemmaRecord, PageRecord, SiteRecord};
use crate::EngineError;
use chrono::Utc;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SITE_COLUMNS: &str = "id, name, url, status, last_error, status_time";
const PAGE_COLUMNS: &str = "id, site_id, path, code, content";
const LEMMA_COLUMNS: &str = "id, site_id, lemma, frequency";
const ENTRY_COLUMNS: &str = "id, page_id, lemma_id, occurrences";

const UPSERT_ENTRY_SQL: &str = "INSERT INTO index_entries (page_id, lemma_id, occurrences) VALUES (?1, ?2, ?3)
     ON CONFLICT(page_id, lemma_id) DO UPDATE SET occurrences = occurrences + excluded.occurrences";

/// SQLite storage backend
///
/// The connection sits behind a mutex, so each trait method runs as one
/// serialized unit and the composite mutations run as transactions.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(EngineError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
    }
}

/// Maps uniqueness failures to `StorageError::ConstraintViolation`
///
/// Other constraint failures (foreign key, NOT NULL, CHECK) stay plain SQLite
/// errors: retrying them cannot succeed.
fn map_insert_error(err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                ) =>
        {
            StorageError::ConstraintViolation(
                message.clone().unwrap_or_else(|| failure.to_string()),
            )
        }
        _ => StorageError::Sqlite(err),
    }
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    Ok(SiteRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        status: SiteStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(SiteStatus::Failed),
        last_error: row.get(4)?,
        status_time: row.get(5)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        path: row.get(2)?,
        code: row.get(3)?,
        content: row.get(4)?,
    })
}

fn lemma_from_row(row: &Row<'_>) -> rusqlite::Result<LemmaRecord> {
    Ok(LemmaRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        lemma: row.get(2)?,
        frequency: row.get(3)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<IndexEntry> {
    Ok(IndexEntry {
        id: row.get(0)?,
        page_id: row.get(1)?,
        lemma_id: row.get(2)?,
        occurrences: row.get(3)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Sites =====

    fn find_all_sites(&self) -> StorageResult<Vec<SiteRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM sites ORDER BY id", SITE_COLUMNS))?;
        let sites = stmt
            .query_map([], site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn find_site(&self, site_id: i64) -> StorageResult<Option<SiteRecord>> {
        let conn = self.conn()?;
        let site = conn
            .query_row(
                &format!("SELECT {} FROM sites WHERE id = ?1", SITE_COLUMNS),
                params![site_id],
                site_from_row,
            )
            .optional()?;
        Ok(site)
    }

    fn find_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>> {
        let conn = self.conn()?;
        let site = conn
            .query_row(
                &format!("SELECT {} FROM sites WHERE url = ?1", SITE_COLUMNS),
                params![url],
                site_from_row,
            )
            .optional()?;
        Ok(site)
    }

    fn insert_site(
        &self,
        name: &str,
        url: &str,
        status: SiteStatus,
    ) -> StorageResult<SiteRecord> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO sites (name, url, status, status_time) VALUES (?1, ?2, ?3, ?4)",
            params![name, url, status.to_db_string(), now],
        )
        .map_err(map_insert_error)?;

        Ok(SiteRecord {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            url: url.to_string(),
            status,
            last_error: None,
            status_time: now,
        })
    }

    fn update_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE sites SET status = ?1, last_error = ?2, status_time = ?3 WHERE id = ?4",
            params![status.to_db_string(), last_error, now, site_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }
        Ok(())
    }

    fn touch_site(&self, site_id: i64) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE sites SET status_time = ?1 WHERE id = ?2",
            params![now, site_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }
        Ok(())
    }

    fn delete_site(&self, site_id: i64) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sites WHERE id = ?1", params![site_id])?;
        Ok(())
    }

    // ===== Pages =====

    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>> {
        let conn = self.conn()?;
        let page = conn
            .query_row(
                &format!(
                    "SELECT {} FROM pages WHERE site_id = ?1 AND path = ?2",
                    PAGE_COLUMNS
                ),
                params![site_id, path],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn find_page_by_id(&self, page_id: i64) -> StorageResult<Option<PageRecord>> {
        let conn = self.conn()?;
        let page = conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
                params![page_id],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn upsert_page(
        &self,
        site_id: i64,
        path: &str,
        code: i32,
        content: &str,
    ) -> StorageResult<PageRecord> {
        let conn = self.conn()?;
        let id: i64 = conn
            .query_row(
                "INSERT INTO pages (site_id, path, code, content) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(site_id, path) DO UPDATE SET code = excluded.code, content = excluded.content
                 RETURNING id",
                params![site_id, path, code, content],
                |row| row.get(0),
            )
            .map_err(map_insert_error)?;

        Ok(PageRecord {
            id,
            site_id,
            path: path.to_string(),
            code,
            content: content.to_string(),
        })
    }

    fn update_page(&self, page_id: i64, code: i32, content: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE pages SET code = ?1, content = ?2 WHERE id = ?3",
            params![code, content, page_id],
        )?;
        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn count_pages(&self, site_id: Option<i64>) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = match site_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM pages WHERE site_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    // ===== Lemmas =====

    fn find_lemma(&self, site_id: i64, lemma: &str) -> StorageResult<Option<LemmaRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM lemmas WHERE site_id = ?1 AND lemma = ?2",
                    LEMMA_COLUMNS
                ),
                params![site_id, lemma],
                lemma_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn find_lemma_by_id(&self, lemma_id: i64) -> StorageResult<Option<LemmaRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM lemmas WHERE id = ?1", LEMMA_COLUMNS),
                params![lemma_id],
                lemma_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn insert_lemma(
        &self,
        site_id: i64,
        lemma: &str,
        frequency: i64,
    ) -> StorageResult<LemmaRecord> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO lemmas (site_id, lemma, frequency) VALUES (?1, ?2, ?3)",
            params![site_id, lemma, frequency],
        )
        .map_err(map_insert_error)?;

        Ok(LemmaRecord {
            id: conn.last_insert_rowid(),
            site_id,
            lemma: lemma.to_string(),
            frequency,
        })
    }

    fn adjust_lemma_frequency(&self, lemma_id: i64, delta: i64) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE lemmas SET frequency = frequency + ?1 WHERE id = ?2",
            params![delta, lemma_id],
        )?;
        Ok(())
    }

    fn count_lemmas(&self, site_id: Option<i64>) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = match site_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM lemmas WHERE site_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM lemmas", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    // ===== Index entries =====

    fn find_entries_by_page(&self, page_id: i64) -> StorageResult<Vec<IndexEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM index_entries WHERE page_id = ?1 ORDER BY id",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![page_id], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn find_entries_by_lemma(&self, lemma_id: i64) -> StorageResult<Vec<IndexEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM index_entries WHERE lemma_id = ?1 ORDER BY page_id",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![lemma_id], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn find_entry(&self, page_id: i64, lemma_id: i64) -> StorageResult<Option<IndexEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM index_entries WHERE page_id = ?1 AND lemma_id = ?2",
                    ENTRY_COLUMNS
                ),
                params![page_id, lemma_id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn upsert_entry(&self, page_id: i64, lemma_id: i64, occurrences: i64) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(UPSERT_ENTRY_SQL, params![page_id, lemma_id, occurrences])?;
        Ok(())
    }

    fn delete_entries_by_page(&self, page_id: i64) -> StorageResult<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM index_entries WHERE page_id = ?1",
            params![page_id],
        )?;
        Ok(deleted as u64)
    }

    // ===== Composite index mutations =====

    fn attach_lemma(&self, page_id: i64, lemma_id: i64, occurrences: i64) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE lemmas SET frequency = frequency + ?1 WHERE id = ?2",
            params![occurrences, lemma_id],
        )?;
        tx.execute(UPSERT_ENTRY_SQL, params![page_id, lemma_id, occurrences])?;
        tx.commit()?;
        Ok(())
    }

    fn insert_lemma_with_entry(
        &self,
        site_id: i64,
        page_id: i64,
        lemma: &str,
        occurrences: i64,
    ) -> StorageResult<LemmaRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO lemmas (site_id, lemma, frequency) VALUES (?1, ?2, ?3)",
            params![site_id, lemma, occurrences],
        )
        .map_err(map_insert_error)?;
        let lemma_id = tx.last_insert_rowid();
        tx.execute(UPSERT_ENTRY_SQL, params![page_id, lemma_id, occurrences])?;
        tx.commit()?;

        Ok(LemmaRecord {
            id: lemma_id,
            site_id,
            lemma: lemma.to_string(),
            frequency: occurrences,
        })
    }

    fn retract_page(&self, page_id: i64) -> StorageResult<Vec<IndexEntry>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let entries = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM index_entries WHERE page_id = ?1 ORDER BY id",
                ENTRY_COLUMNS
            ))?;
            let rows = stmt.query_map(params![page_id], entry_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        for entry in &entries {
            tx.execute(
                "UPDATE lemmas SET frequency = frequency - ?1 WHERE id = ?2",
                params![entry.occurrences, entry.lemma_id],
            )?;
        }
        tx.execute(
            "DELETE FROM index_entries WHERE page_id = ?1",
            params![page_id],
        )?;
        tx.commit()?;

        Ok(entries)
    }
}
