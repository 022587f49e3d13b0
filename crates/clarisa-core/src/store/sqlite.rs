//! SQLite-backed replica store.

use super::traits::ReplicaStore;
use crate::config::SyncConfig;
use crate::error::{ClarisaError, Result};
use crate::models::{Institution, InstitutionLocation, LocElement, NewInstitutionLocation};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const INSTITUTION_COLUMNS: &str = "id, name, acronym, website_link, program_id, \
     institution_type_id, added, parent_id, created_at, updated_at, is_active, \
     created_by, updated_by, modification_justification";

const LOCATION_COLUMNS: &str = "id, institution_id, loc_element_id, is_headquater, city";

const LOC_ELEMENT_COLUMNS: &str =
    "id, name, iso_alpha_2, iso_alpha_3, iso_numeric, parent_id, element_type_id, is_active";

/// SQLite replica of the Clarisa tables.
///
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ClarisaError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&db_path).map_err(|e| ClarisaError::Database {
            message: format!("Failed to open replica database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            ",
        )?;

        Self::from_connection(conn, Some(db_path))
    }

    /// Create a throwaway in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        Self::ensure_schema(&conn)?;
        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Database path, `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS institutions (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                acronym TEXT,
                website_link TEXT,
                program_id INTEGER,
                institution_type_id INTEGER NOT NULL,
                added TEXT NOT NULL,
                parent_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                is_active INTEGER NOT NULL,
                created_by INTEGER NOT NULL,
                updated_by INTEGER,
                modification_justification TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_institutions_updated
                ON institutions(updated_at);

            CREATE TABLE IF NOT EXISTS loc_elements (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                iso_alpha_2 TEXT,
                iso_alpha_3 TEXT,
                iso_numeric INTEGER,
                parent_id INTEGER,
                element_type_id INTEGER,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS institution_locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                institution_id INTEGER NOT NULL,
                loc_element_id INTEGER,
                is_headquater INTEGER NOT NULL,
                city TEXT
            );

            -- Natural key of a location
            CREATE UNIQUE INDEX IF NOT EXISTS idx_institution_locations_key
                ON institution_locations(institution_id, loc_element_id);
            "#,
        )
        .map_err(|e| ClarisaError::Database {
            message: format!("Failed to initialize replica schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ClarisaError::database("Failed to acquire connection lock"))
    }

    /// Insert or replace reference elements.
    pub fn upsert_loc_elements(&self, elements: &[LocElement]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO loc_elements
                    (id, name, iso_alpha_2, iso_alpha_3, iso_numeric, parent_id,
                     element_type_id, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for el in elements {
                stmt.execute(params![
                    el.id,
                    el.name,
                    el.iso_alpha_2,
                    el.iso_alpha_3,
                    el.iso_numeric,
                    el.parent_id,
                    el.element_type_id,
                    el.is_active,
                ])?;
            }
        }
        tx.commit()?;
        Ok(elements.len())
    }

    /// Every institution, ordered by id.
    pub fn list_institutions(&self) -> Result<Vec<Institution>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM institutions ORDER BY id",
            INSTITUTION_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_institution)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every location, ordered by surrogate id.
    pub fn list_locations(&self) -> Result<Vec<InstitutionLocation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM institution_locations ORDER BY id",
            LOCATION_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_location)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Run a `SELECT ... WHERE <column> IN (...)` in bounded chunks.
    fn select_in<T>(
        &self,
        columns: &str,
        table: &str,
        key_column: &str,
        ids: &[i64],
        map_row: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut out = Vec::new();
        for chunk in ids.chunks(SyncConfig::LOOKUP_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                columns, table, key_column, placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), map_row)?;
            for row in rows {
                out.push(row?);
            }
        }

        debug!("Loaded {} rows from {} for {} keys", out.len(), table, ids.len());
        Ok(out)
    }
}

impl ReplicaStore for SqliteStore {
    fn last_updated_institution(&self) -> Result<Option<Institution>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM institutions
                     WHERE updated_at IS NOT NULL
                     ORDER BY updated_at DESC
                     LIMIT 1",
                    INSTITUTION_COLUMNS
                ),
                [],
                row_to_institution,
            )
            .optional()
            .map_err(|e| ClarisaError::Database {
                message: format!("Failed to query last updated institution: {}", e),
                source: Some(e),
            })?;
        Ok(row)
    }

    fn find_institutions_by_ids(&self, ids: &[i64]) -> Result<Vec<Institution>> {
        self.select_in(INSTITUTION_COLUMNS, "institutions", "id", ids, row_to_institution)
    }

    fn insert_institutions(&self, rows: &[Institution]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO institutions ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                INSTITUTION_COLUMNS
            ))?;
            for inst in rows {
                stmt.execute(params![
                    inst.id,
                    inst.name,
                    inst.acronym,
                    inst.website_link,
                    inst.program_id,
                    inst.institution_type_id,
                    format_ts(&inst.added),
                    inst.parent_id,
                    format_ts(&inst.created_at),
                    inst.updated_at.as_ref().map(format_ts),
                    inst.is_active,
                    inst.created_by,
                    inst.updated_by,
                    inst.modification_justification,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Inserted {} institutions", rows.len());
        Ok(rows.len())
    }

    fn list_loc_elements(&self) -> Result<Vec<LocElement>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM loc_elements ORDER BY id",
            LOC_ELEMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_loc_element)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn find_locations_by_institution_ids(&self, ids: &[i64]) -> Result<Vec<InstitutionLocation>> {
        self.select_in(
            LOCATION_COLUMNS,
            "institution_locations",
            "institution_id",
            ids,
            row_to_location,
        )
    }

    fn insert_locations(&self, rows: &[NewInstitutionLocation]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO institution_locations
                    (institution_id, loc_element_id, is_headquater, city)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for loc in rows {
                stmt.execute(params![
                    loc.institution_id,
                    loc.loc_element_id,
                    loc.is_headquater,
                    loc.city,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Inserted {} institution locations", rows.len());
        Ok(rows.len())
    }
}

/// Fixed-precision UTC text so lexical order matches time order.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_institution(row: &Row<'_>) -> rusqlite::Result<Institution> {
    let updated_at: Option<String> = row.get(9)?;
    Ok(Institution {
        id: row.get(0)?,
        name: row.get(1)?,
        acronym: row.get(2)?,
        website_link: row.get(3)?,
        program_id: row.get(4)?,
        institution_type_id: row.get(5)?,
        added: parse_ts(6, row.get(6)?)?,
        parent_id: row.get(7)?,
        created_at: parse_ts(8, row.get(8)?)?,
        updated_at: updated_at.map(|v| parse_ts(9, v)).transpose()?,
        is_active: row.get(10)?,
        created_by: row.get(11)?,
        updated_by: row.get(12)?,
        modification_justification: row.get(13)?,
    })
}

fn row_to_location(row: &Row<'_>) -> rusqlite::Result<InstitutionLocation> {
    Ok(InstitutionLocation {
        id: row.get(0)?,
        institution_id: row.get(1)?,
        loc_element_id: row.get(2)?,
        is_headquater: row.get(3)?,
        city: row.get(4)?,
    })
}

fn row_to_loc_element(row: &Row<'_>) -> rusqlite::Result<LocElement> {
    Ok(LocElement {
        id: row.get(0)?,
        name: row.get(1)?,
        iso_alpha_2: row.get(2)?,
        iso_alpha_3: row.get(3)?,
        iso_numeric: row.get(4)?,
        parent_id: row.get(5)?,
        element_type_id: row.get(6)?,
        is_active: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn institution(id: i64, updated_at: Option<DateTime<Utc>>) -> Institution {
        let added = Utc.with_ymd_and_hms(2020, 10, 8, 20, 5, 59).unwrap();
        Institution {
            id,
            name: format!("Institution {}", id),
            acronym: None,
            website_link: Some("https://example.org".into()),
            program_id: None,
            institution_type_id: 60,
            added,
            parent_id: None,
            created_at: added,
            updated_at,
            is_active: true,
            created_by: 1082,
            updated_by: Some(1082),
            modification_justification: None,
        }
    }

    fn location(institution_id: i64, loc_element_id: Option<i64>) -> NewInstitutionLocation {
        NewInstitutionLocation {
            institution_id,
            loc_element_id,
            is_headquater: true,
            city: None,
        }
    }

    #[test]
    fn test_insert_and_find_institutions() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        store
            .insert_institutions(&[institution(1, Some(now)), institution(2, None)])
            .unwrap();

        let found = store.find_institutions_by_ids(&[2, 3]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
        assert_eq!(found[0].website_link.as_deref(), Some("https://example.org"));
        assert!(found[0].updated_at.is_none());
        assert!(store.find_institutions_by_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_timestamps_roundtrip_at_millisecond_precision() {
        let store = SqliteStore::in_memory().unwrap();
        let ts = Utc.timestamp_millis_opt(1_710_777_775_194).unwrap();
        store.insert_institutions(&[institution(7, Some(ts))]).unwrap();

        let row = store.find_institutions_by_ids(&[7]).unwrap().remove(0);
        assert_eq!(row.updated_at, Some(ts));
    }

    #[test]
    fn test_last_updated_institution() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.last_updated_institution().unwrap().is_none());

        let base = Utc.with_ymd_and_hms(2024, 1, 18, 21, 25, 41).unwrap();
        store
            .insert_institutions(&[
                institution(1, Some(base)),
                institution(2, Some(base + Duration::days(60))),
                institution(3, None),
            ])
            .unwrap();

        let last = store.last_updated_institution().unwrap().unwrap();
        assert_eq!(last.id, 2);
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_institutions(&[institution(1, None)]).unwrap();

        let result = store.insert_institutions(&[institution(2, None), institution(1, None)]);
        assert!(matches!(result, Err(ClarisaError::Database { .. })));
        assert_eq!(store.list_institutions().unwrap().len(), 1);
    }

    #[test]
    fn test_location_natural_key_is_unique() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_locations(&[location(95, Some(108))]).unwrap();

        let dup = store.insert_locations(&[location(96, Some(112)), location(95, Some(108))]);
        assert!(dup.is_err());
        assert_eq!(store.list_locations().unwrap().len(), 1);
    }

    #[test]
    fn test_find_locations_by_institution() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_locations(&[location(95, Some(108)), location(96, Some(112))])
            .unwrap();

        let found = store.find_locations_by_institution_ids(&[96]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), (96, Some(112)));
        assert!(found[0].is_headquater);
        assert!(found[0].city.is_none());
    }

    #[test]
    fn test_lookup_spans_multiple_chunks() {
        let store = SqliteStore::in_memory().unwrap();
        let rows: Vec<_> = (1..=1200).map(|id| institution(id, None)).collect();
        store.insert_institutions(&rows).unwrap();

        let ids: Vec<i64> = (1..=1300).collect();
        assert_eq!(store.find_institutions_by_ids(&ids).unwrap().len(), 1200);
    }

    #[test]
    fn test_loc_elements_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_loc_elements(&[LocElement::country(108, "Italy", "IT")])
            .unwrap();
        store
            .upsert_loc_elements(&[LocElement::country(108, "Italia", "IT")])
            .unwrap();

        let elements = store.list_loc_elements().unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].name, "Italia");
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("replica.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));
        assert!(path.exists());
    }
}
