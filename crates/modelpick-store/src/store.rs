use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::database::Database;
use crate::error::Result;

/// A flat string map, the unit of storage.
pub type Entry = HashMap<String, String>;

/// Async key → string-map store.
///
/// Values are flat maps of strings so that simple backends (browser storage,
/// keychains, env-backed stores) can implement the trait without a schema.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `None` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Entry>>;

    /// Replace the entry stored under `key`.
    async fn set(&self, key: &str, entry: Entry) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Entry>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// SQLite-backed store. Each field of an entry is one row.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open(path.as_ref())?)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open_in_memory()?)),
        })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Entry>> {
        let fields = self.db.lock().entry(key)?;
        Ok((!fields.is_empty()).then_some(fields))
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<()> {
        self.db.lock().replace_entry(key, &entry)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.db.lock().remove_entry(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pairs: &[(&str, &str)]) -> Entry {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("provider:openai").await.expect("get"), None);

        store
            .set("provider:openai", entry(&[("api_key", "sk-1")]))
            .await
            .expect("set");
        assert_eq!(
            store.get("provider:openai").await.expect("get"),
            Some(entry(&[("api_key", "sk-1")]))
        );
        assert_eq!(store.keys(), vec!["provider:openai"]);

        store.remove("provider:openai").await.expect("remove");
        assert_eq!(store.get("provider:openai").await.expect("get"), None);
    }

    #[tokio::test]
    async fn sqlite_set_replaces_all_fields() {
        let store = SqliteStore::open_in_memory().expect("open");
        store
            .set("k", entry(&[("a", "1"), ("b", "2")]))
            .await
            .expect("set");
        store.set("k", entry(&[("c", "3")])).await.expect("set");

        assert_eq!(store.get("k").await.expect("get"), Some(entry(&[("c", "3")])));
    }

    #[tokio::test]
    async fn sqlite_entries_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("catalog.sqlite3");

        {
            let store = SqliteStore::open(&path).expect("open");
            store
                .set("models:acme", entry(&[("data", "{}")]))
                .await
                .expect("set");
        }

        let store = SqliteStore::open(&path).expect("reopen");
        assert_eq!(
            store.get("models:acme").await.expect("get"),
            Some(entry(&[("data", "{}")]))
        );

        store.remove("models:acme").await.expect("remove");
        assert_eq!(store.get("models:acme").await.expect("get"), None);
    }
}
