use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, params};

use crate::error::Result;
use crate::migration;

pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub(crate) fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        migration::apply(&mut conn)?;
        Ok(Self { conn })
    }

    /// All fields stored under `key`. Empty when the key is absent.
    pub(crate) fn entry(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT field, value
             FROM kv_entries
             WHERE entry_key = ?1",
        )?;
        let rows = stmt.query_map(params![key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut fields = HashMap::new();
        for row in rows {
            let (field, value) = row?;
            fields.insert(field, value);
        }
        Ok(fields)
    }

    /// Replace every field under `key` with `fields`, atomically.
    pub(crate) fn replace_entry(&mut self, key: &str, fields: &HashMap<String, String>) -> Result<()> {
        let now = now_ms();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM kv_entries WHERE entry_key = ?1", params![key])?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO kv_entries (entry_key, field, value, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (field, value) in fields {
                insert.execute(params![key, field, value, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn remove_entry(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE entry_key = ?1", params![key])?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
