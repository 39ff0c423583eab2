//! Storage layer for Tilt data.
//!
//! All collections live in one SQLite database (`tilt.db`) under the data
//! directory. Each collection is a table:
//!
//! - `tasks` - execution records; `metadata` is a JSON document
//! - `tests` + `test_tags` - stored tests and their tag membership
//! - `tags` - the tag registry (color/description enrichment)
//! - `app_state` - the global run-state singleton, stored as a whole document
//! - `system_flags` - permanent markers such as the bootstrap tombstone
//! - `settings` - UI key/value settings
//! - `config` - store-level metadata (schema version)
//!
//! Tag identity is the tag name. Records reference a tag through
//! `metadata.source`, stored tests through `test_tags`, and the registry is
//! joined in at read time.

use crate::models::{
    AppState, Record, RecordMetadata, RecordStatus, StatusCounts, StoredTest, Tag, TagInfo,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "tilt.db";

/// How long a statement waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// ID prefix for execution records.
pub const RECORD_ID_PREFIX: &str = "tk";

/// ID prefix for stored tests.
pub const TEST_ID_PREFIX: &str = "ts";

const SCHEMA_VERSION: &str = "1";

const RECORD_COLUMNS: &str = "id, label, instructions, status, created_at, updated_at, \
                              started_at, completed_at, result, error, metadata";

/// Storage manager for one data directory.
pub struct Storage {
    /// Data directory holding the database
    pub root: PathBuf,
    conn: Connection,
}

impl Storage {
    /// Open storage in the given data directory, creating it on first use.
    pub fn open(data_dir: &Path) -> Result<Self> {
        Self::open_with_timeout(data_dir, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open storage with an explicit busy timeout.
    pub fn open_with_timeout(data_dir: &Path, busy_timeout: Duration) -> Result<Self> {
        fs::create_dir_all(data_dir)?;

        let conn = Connection::open(data_dir.join(DB_FILE))?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: data_dir.to_path_buf(),
            conn,
        })
    }

    /// Check if storage exists in the given data directory.
    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(DB_FILE).exists()
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                label TEXT,
                instructions TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT,
                started_at TEXT,
                completed_at TEXT,
                result TEXT,
                error TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_source
                ON tasks(json_extract(metadata, '$.source'));

            CREATE TABLE IF NOT EXISTS tests (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                steps TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS test_tags (
                test_id TEXT NOT NULL,
                tag TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (test_id, tag),
                FOREIGN KEY (test_id) REFERENCES tests(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_test_tags_tag ON test_tags(tag);

            CREATE TABLE IF NOT EXISTS tags (
                name TEXT PRIMARY KEY,
                color TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS app_state (
                id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS system_flags (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Self::run_migrations(conn)?;

        conn.execute(
            "INSERT INTO config (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO NOTHING",
            [SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Run database migrations for schema changes.
    fn run_migrations(conn: &Connection) -> Result<()> {
        // Databases from before update tracking lack tasks.updated_at
        let has_updated_at: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('tasks') WHERE name = 'updated_at'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_updated_at {
            conn.execute("ALTER TABLE tasks ADD COLUMN updated_at TEXT", [])?;
        }

        Ok(())
    }

    /// Get the data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // === Record Operations ===

    /// Insert a single record.
    pub fn insert_record(&mut self, record: &Record) -> Result<()> {
        write_record(&self.conn, INSERT_RECORD_SQL, record)?;
        Ok(())
    }

    /// Insert many records in one transaction. Returns the number inserted.
    pub fn insert_records(&mut self, records: &[Record]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for record in records {
            inserted += write_record(&tx, INSERT_RECORD_SQL, record)?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Get a record by ID.
    pub fn get_record(&self, id: &str) -> Result<Record> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", RECORD_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [id], read_record_row)
            .optional()?;

        match row {
            Some(row) => row.into_record(),
            None => Err(Error::NotFound(format!("Record not found: {}", id))),
        }
    }

    /// List all records in insertion order.
    pub fn list_records(&self) -> Result<Vec<Record>> {
        let sql = format!("SELECT {} FROM tasks ORDER BY rowid", RECORD_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_record_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }

    /// Replace a stored record with the given version.
    pub fn update_record(&mut self, record: &Record) -> Result<()> {
        let changed = write_record(&self.conn, UPDATE_RECORD_SQL, record)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Record not found: {}", record.id)));
        }
        Ok(())
    }

    /// Count all records.
    pub fn count_records(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count records per status.
    pub fn count_records_by_status(&self) -> Result<StatusCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            counts.add(RecordStatus::parse(&status).unwrap_or_default(), n as usize);
        }
        Ok(counts)
    }

    /// Force every record back to pending with no run state.
    ///
    /// Records already in that state are left untouched, so the returned count
    /// is the number of records that actually changed.
    pub fn reset_records(&mut self) -> Result<usize> {
        let changed = self.conn.execute(
            r#"
            UPDATE tasks
            SET status = 'pending', started_at = NULL, completed_at = NULL,
                result = NULL, error = NULL
            WHERE status != 'pending'
               OR started_at IS NOT NULL
               OR completed_at IS NOT NULL
               OR result IS NOT NULL
               OR error IS NOT NULL
            "#,
            [],
        )?;
        Ok(changed)
    }

    /// Remove `metadata.source` from every record where it equals `tag`.
    pub fn unset_source_everywhere(&mut self, tag: &str) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE tasks SET metadata = json_remove(metadata, '$.source')
             WHERE json_extract(metadata, '$.source') = ?1",
            [tag],
        )?;
        Ok(changed)
    }

    /// Set `metadata.source` to `tag` on the given records.
    pub fn set_source_for(&mut self, ids: &[String], tag: &str) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        for id in ids {
            changed += tx.execute(
                "UPDATE tasks SET metadata = json_set(metadata, '$.source', ?2), updated_at = ?3
                 WHERE id = ?1",
                params![id, tag, now],
            )?;
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Remove `metadata.source` from the given records where it equals `tag`.
    pub fn unset_source_for(&mut self, ids: &[String], tag: &str) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        for id in ids {
            changed += tx.execute(
                "UPDATE tasks SET metadata = json_remove(metadata, '$.source'), updated_at = ?3
                 WHERE id = ?1 AND json_extract(metadata, '$.source') = ?2",
                params![id, tag, now],
            )?;
        }
        tx.commit()?;
        Ok(changed)
    }

    // === Stored Test Operations ===

    /// Create a new stored test.
    pub fn insert_test(&mut self, test: &StoredTest) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO tests (id, name, steps, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                test.id,
                test.name,
                serde_json::to_string(&test.steps)?,
                test.created_at.to_rfc3339(),
                test.updated_at.to_rfc3339(),
            ],
        )?;
        write_test_tags(&tx, &test.id, &test.tags)?;
        tx.commit()?;
        Ok(())
    }

    /// Get a stored test by ID.
    pub fn get_test(&self, id: &str) -> Result<StoredTest> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, steps, created_at, updated_at FROM tests WHERE id = ?1",
                [id],
                read_test_row,
            )
            .optional()?;

        let row = row.ok_or_else(|| Error::NotFound(format!("Test not found: {}", id)))?;
        let tags = self.tags_for_test(id)?;
        row.into_test(tags)
    }

    /// List all stored tests in insertion order.
    pub fn list_tests(&self) -> Result<Vec<StoredTest>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, steps, created_at, updated_at FROM tests ORDER BY rowid")?;
        let rows = stmt
            .query_map([], read_test_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT test_id, tag FROM test_tags ORDER BY test_id, position")?;
        let mut tags_by_test: HashMap<String, Vec<String>> = HashMap::new();
        for pair in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))? {
            let (test_id, tag) = pair?;
            tags_by_test.entry(test_id).or_default().push(tag);
        }

        rows.into_iter()
            .map(|row| {
                let tags = tags_by_test.remove(&row.id).unwrap_or_default();
                row.into_test(tags)
            })
            .collect()
    }

    /// Replace a stored test, including its tag membership.
    pub fn update_test(&mut self, test: &StoredTest) -> Result<()> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE tests SET name = ?2, steps = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                test.id,
                test.name,
                serde_json::to_string(&test.steps)?,
                test.updated_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Test not found: {}", test.id)));
        }
        tx.execute("DELETE FROM test_tags WHERE test_id = ?1", [&test.id])?;
        write_test_tags(&tx, &test.id, &test.tags)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a stored test by ID.
    pub fn delete_test(&mut self, id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM test_tags WHERE test_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM tests WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Test not found: {}", id)));
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove `tag` from every stored test carrying it. Returns tests modified.
    pub fn pull_tag_everywhere(&mut self, tag: &str) -> Result<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM test_tags WHERE tag = ?1", [tag])?;
        Ok(changed)
    }

    /// Add `tag` to the given stored tests. Unknown IDs are skipped.
    pub fn add_tag_to_tests(&mut self, ids: &[String], tag: &str) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        for id in ids {
            let inserted = tx.execute(
                r#"
                INSERT OR IGNORE INTO test_tags (test_id, tag, position)
                SELECT ?1, ?2, COALESCE(
                    (SELECT MAX(position) + 1 FROM test_tags WHERE test_id = ?1), 0)
                WHERE EXISTS (SELECT 1 FROM tests WHERE id = ?1)
                "#,
                params![id, tag],
            )?;
            if inserted > 0 {
                tx.execute(
                    "UPDATE tests SET updated_at = ?2 WHERE id = ?1",
                    params![id, now],
                )?;
                changed += 1;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Remove `tag` from the given stored tests.
    pub fn remove_tag_from_tests(&mut self, ids: &[String], tag: &str) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        for id in ids {
            let removed = tx.execute(
                "DELETE FROM test_tags WHERE test_id = ?1 AND tag = ?2",
                params![id, tag],
            )?;
            if removed > 0 {
                tx.execute(
                    "UPDATE tests SET updated_at = ?2 WHERE id = ?1",
                    params![id, now],
                )?;
                changed += 1;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn tags_for_test(&self, id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM test_tags WHERE test_id = ?1 ORDER BY position")?;
        let tags = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
    }

    // === Tag Registry Operations ===

    /// Insert a registry entry unless one with the same name exists.
    ///
    /// Never overwrites an existing entry. Returns true if a row was inserted.
    pub fn insert_tag_if_absent(&mut self, tag: &Tag) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO tags (name, color, description, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO NOTHING",
            params![
                tag.name,
                tag.color,
                tag.description,
                tag.created_at.to_rfc3339()
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Get a registry entry by name.
    pub fn get_tag(&self, name: &str) -> Result<Option<Tag>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, color, description, created_at FROM tags WHERE name = ?1",
                [name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(name, color, description, created_at)| Tag {
            name,
            color,
            description,
            created_at: parse_timestamp(Some(created_at)).unwrap_or_else(Utc::now),
        }))
    }

    /// Delete a registry entry. Returns true if it existed.
    pub fn delete_tag(&mut self, name: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM tags WHERE name = ?1", [name])?;
        Ok(deleted > 0)
    }

    /// List every known tag: registry entries plus names referenced by records
    /// and stored tests, enriched from the registry where possible.
    pub fn list_tags(&self) -> Result<Vec<TagInfo>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT n.name, t.color, t.description
            FROM (
                SELECT name FROM tags
                UNION
                SELECT json_extract(metadata, '$.source') FROM tasks
                    WHERE json_type(metadata, '$.source') = 'text'
                      AND trim(json_extract(metadata, '$.source'), char(32, 9, 10, 13)) != ''
                UNION
                SELECT tag FROM test_tags
            ) AS n
            LEFT JOIN tags t ON t.name = n.name
            ORDER BY n.name
            "#,
        )?;

        let tags = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                Ok(match row.get::<_, Option<String>>(1)? {
                    Some(color) => TagInfo {
                        name,
                        color,
                        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    },
                    None => TagInfo::synthesized(name),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    // === App State Operations ===

    /// Read the global app state, if it was ever written.
    pub fn app_state(&self) -> Result<Option<AppState>> {
        let doc: Option<String> = self
            .conn
            .query_row(
                "SELECT doc FROM app_state WHERE id = ?1",
                [crate::models::APP_STATE_ID],
                |row| row.get(0),
            )
            .optional()?;

        doc.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    /// Replace the app state document wholesale (upsert).
    ///
    /// Returns true if the document was newly created.
    pub fn replace_app_state(&mut self, state: &AppState) -> Result<bool> {
        let doc = serde_json::to_string(state)?;
        let tx = self.conn.transaction()?;
        let existed: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM app_state WHERE id = ?1",
            [&state.id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO app_state (id, doc) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
            params![state.id, doc],
        )?;
        tx.commit()?;
        Ok(!existed)
    }

    // === System Flag Operations ===

    /// Check whether a system flag is present.
    pub fn has_flag(&self, id: &str) -> Result<bool> {
        let present: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM system_flags WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(present)
    }

    /// Write a system flag if absent. Returns true if it was written now.
    pub fn set_flag_if_absent(&mut self, id: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO system_flags (id, created_at) VALUES (?1, ?2)
             ON CONFLICT(id) DO NOTHING",
            params![id, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    // === Settings Operations ===

    /// Get a setting value.
    pub fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        value
            .map(|v| serde_json::from_str(&v).map_err(Error::from))
            .transpose()
    }

    /// Set a setting value, replacing any previous one.
    pub fn set_setting(&mut self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// List all settings ordered by key.
    pub fn list_settings(&self) -> Result<Vec<(String, serde_json::Value)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(key, value)| Ok((key, serde_json::from_str(&value)?)))
            .collect()
    }

    // === Config Operations ===

    /// Get a store-level configuration value.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }
}

const INSERT_RECORD_SQL: &str = r#"
    INSERT INTO tasks
    (id, label, instructions, status, created_at, updated_at, started_at,
     completed_at, result, error, metadata)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

const UPDATE_RECORD_SQL: &str = r#"
    UPDATE tasks
    SET label = ?2, instructions = ?3, status = ?4, created_at = ?5, updated_at = ?6,
        started_at = ?7, completed_at = ?8, result = ?9, error = ?10, metadata = ?11
    WHERE id = ?1
"#;

/// Execute an insert or update whose parameters follow `RECORD_COLUMNS` order.
fn write_record(conn: &Connection, sql: &str, record: &Record) -> Result<usize> {
    let result = record
        .result
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let error = record
        .error
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let changed = conn.execute(
        sql,
        params![
            record.id,
            record.label,
            record.instructions,
            record.status.as_str(),
            record.created_at.map(|t| t.to_rfc3339()),
            record.updated_at.map(|t| t.to_rfc3339()),
            record.started_at.map(|t| t.to_rfc3339()),
            record.completed_at.map(|t| t.to_rfc3339()),
            result,
            error,
            serde_json::to_string(&record.metadata)?,
        ],
    )?;
    Ok(changed)
}

fn write_test_tags(conn: &Connection, test_id: &str, tags: &[String]) -> Result<()> {
    for (position, tag) in tags.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO test_tags (test_id, tag, position) VALUES (?1, ?2, ?3)",
            params![test_id, tag, position as i64],
        )?;
    }
    Ok(())
}

/// Raw column values of a `tasks` row.
struct RecordRow {
    id: String,
    label: Option<String>,
    instructions: Option<String>,
    status: String,
    created_at: Option<String>,
    updated_at: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    result: Option<String>,
    error: Option<String>,
    metadata: Option<String>,
}

fn read_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        label: row.get(1)?,
        instructions: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        result: row.get(8)?,
        error: row.get(9)?,
        metadata: row.get(10)?,
    })
}

impl RecordRow {
    fn into_record(self) -> Result<Record> {
        let status = RecordStatus::parse(&self.status).unwrap_or_else(|| {
            tracing::warn!(id = %self.id, status = %self.status, "unknown record status, treating as pending");
            RecordStatus::Pending
        });

        let metadata: RecordMetadata = match self.metadata.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)?,
            _ => RecordMetadata::default(),
        };

        Ok(Record {
            id: self.id,
            label: self.label,
            instructions: self.instructions,
            status,
            created_at: parse_timestamp(self.created_at),
            updated_at: parse_timestamp(self.updated_at),
            started_at: parse_timestamp(self.started_at),
            completed_at: parse_timestamp(self.completed_at),
            result: self.result.map(|r| serde_json::from_str(&r)).transpose()?,
            error: self.error.map(|e| serde_json::from_str(&e)).transpose()?,
            metadata,
        })
    }
}

/// Raw column values of a `tests` row.
struct TestRow {
    id: String,
    name: String,
    steps: String,
    created_at: String,
    updated_at: String,
}

fn read_test_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TestRow> {
    Ok(TestRow {
        id: row.get(0)?,
        name: row.get(1)?,
        steps: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl TestRow {
    fn into_test(self, tags: Vec<String>) -> Result<StoredTest> {
        let created_at = parse_timestamp(Some(self.created_at)).unwrap_or_else(Utc::now);
        Ok(StoredTest {
            id: self.id,
            name: self.name,
            tags,
            steps: serde_json::from_str(&self.steps)?,
            created_at,
            updated_at: parse_timestamp(Some(self.updated_at)).unwrap_or(created_at),
        })
    }
}

/// Parse a stored RFC 3339 timestamp, treating bad values as absent.
fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Generate a unique ID for a record or stored test.
///
/// Format: `<prefix>-<8 hex chars>`
/// - Record prefix: "tk"
/// - Stored test prefix: "ts"
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}-{}", prefix, &hash_hex[..8])
}

/// Parse a status string into RecordStatus.
pub fn parse_status(s: &str) -> Result<RecordStatus> {
    RecordStatus::parse(s).ok_or_else(|| Error::InvalidArgument(format!("Invalid status: {}", s)))
}
