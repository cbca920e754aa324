//! SQLite-backed local store, one table per collection.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::info;

use crate::{
    record::{record_key, set_record_key},
    types::{RecordKey, StoreName},
};

use super::{LocalStore, PersistError, PersistResult, SCHEMA_VERSION};

/// SQLite implementation of [`crate::persist::LocalStore`].
pub struct SqliteStore {
    conn: Connection,
    upgraded_from: u32,
}

impl SqliteStore {
    /// Opens or creates a store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`. Missing tables are
    /// created; existing tables and rows are left untouched.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens a volatile in-memory SQLite store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(mut conn: Connection) -> PersistResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(PersistError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        let tx = conn.transaction()?;
        for store in StoreName::ALL {
            tx.execute_batch(&create_table_sql(store))?;
        }
        if found < SCHEMA_VERSION {
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            info!(from = found, to = SCHEMA_VERSION, "upgraded local schema");
        }
        tx.commit()?;

        Ok(Self {
            conn,
            upgraded_from: found,
        })
    }

    /// Schema version found on disk before this open (0 for a new file).
    pub fn upgraded_from(&self) -> u32 {
        self.upgraded_from
    }
}

impl LocalStore for SqliteStore {
    fn get_all(&self, store: StoreName) -> PersistResult<Vec<Value>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT payload FROM \"{}\" ORDER BY seq ASC",
            store.as_str()
        ))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    fn get(&self, store: StoreName, key: &RecordKey) -> PersistResult<Option<Value>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT payload FROM \"{}\" WHERE rec_key = ?1",
                    store.as_str()
                ),
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }

    fn put(&mut self, store: StoreName, record: Value) -> PersistResult<RecordKey> {
        put_record(&self.conn, store, record)
    }

    fn put_many(&mut self, store: StoreName, records: Vec<Value>) -> PersistResult<Vec<RecordKey>> {
        let tx = self.conn.transaction()?;
        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            keys.push(put_record(&tx, store, record)?);
        }
        tx.commit()?;
        Ok(keys)
    }

    fn count(&self, store: StoreName) -> PersistResult<usize> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", store.as_str()),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn delete(&mut self, store: StoreName, key: &RecordKey) -> PersistResult<()> {
        self.conn.execute(
            &format!("DELETE FROM \"{}\" WHERE rec_key = ?1", store.as_str()),
            params![key],
        )?;
        Ok(())
    }

    fn clear(&mut self, store: StoreName) -> PersistResult<()> {
        self.conn
            .execute(&format!("DELETE FROM \"{}\"", store.as_str()), [])?;
        Ok(())
    }

    fn schema_version(&self) -> u32 {
        SCHEMA_VERSION
    }
}

// `rec_key` is declared without a type so integer and text keys keep their
// storage class and never compare equal.
fn create_table_sql(store: StoreName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            rec_key NOT NULL UNIQUE,
            payload TEXT NOT NULL
        );",
        store.as_str()
    )
}

fn put_record(conn: &Connection, store: StoreName, mut record: Value) -> PersistResult<RecordKey> {
    let key = match record_key(&record)? {
        Some(key) => key,
        None if store.auto_increment() => {
            let key = RecordKey::Int(next_auto_key(conn, store)?);
            set_record_key(&mut record, &key)?;
            key
        }
        None => return Err(PersistError::MissingKey(store)),
    };

    let payload = serde_json::to_string(&record)?;
    conn.execute(
        &format!(
            "INSERT INTO \"{}\"(rec_key, payload) VALUES (?1, ?2)
             ON CONFLICT(rec_key) DO UPDATE SET payload = excluded.payload",
            store.as_str()
        ),
        params![key, payload],
    )?;
    Ok(key)
}

fn next_auto_key(conn: &Connection, store: StoreName) -> PersistResult<i64> {
    let max: Option<i64> = conn.query_row(
        &format!(
            "SELECT MAX(rec_key) FROM \"{}\" WHERE typeof(rec_key) = 'integer'",
            store.as_str()
        ),
        [],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0).max(0) + 1)
}
