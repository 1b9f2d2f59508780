//! SQLite-backed store.
//!
//! The JSON tree is held in memory for reads and watches; every mutation
//! writes the affected top-level branch back to the `branches` table, so
//! a reopened store sees the tree it left behind.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::tree;
use super::watch::{WatchHandle, WatchHub};
use super::Store;
use crate::error::StoreError;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    root: RwLock<Value>,
    hub: Arc<WatchHub>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open the store at `~/.config/questline/questline.db`.
    pub fn open_default() -> Result<Self, Box<dyn std::error::Error>> {
        let path = super::data_dir()?.join("questline.db");
        Ok(Self::open(path)?)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrate(&conn)?;
        let root = load_tree(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            root: RwLock::new(root),
            hub: Arc::new(WatchHub::default()),
        })
    }

    /// Upserts or deletes the branch row named by the first path segment.
    fn persist_branch(&self, root: &Value, branch: &str) -> Result<(), StoreError> {
        let conn = self.locked_conn();
        match root.get(branch) {
            Some(value) => {
                let raw = serde_json::to_string(value)?;
                conn.execute(
                    "INSERT INTO branches (name, value) VALUES (?1, ?2)
                     ON CONFLICT(name) DO UPDATE SET value = excluded.value",
                    params![branch, raw],
                )?;
            }
            None => {
                conn.execute("DELETE FROM branches WHERE name = ?1", params![branch])?;
            }
        }
        Ok(())
    }

    fn locked_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS branches (
            name  TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn load_tree(conn: &Connection) -> Result<Value, StoreError> {
    let mut stmt = conn.prepare("SELECT name, value FROM branches")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut map = Map::new();
    for row in rows {
        let (name, raw) = row?;
        map.insert(name, serde_json::from_str(&raw)?);
    }
    Ok(Value::Object(map))
}

#[async_trait]
impl Store for SqliteStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = tree::split_path(path)?;
        let root = self.root.read().await;
        Ok(tree::get(&root, &segments).cloned())
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = tree::split_path(path)?;
        let mut root = self.root.write().await;
        tree::set(&mut root, &segments, value);
        self.persist_branch(&root, segments[0])?;
        self.hub.notify(&root, &segments);
        Ok(())
    }

    async fn patch(&self, path: &str, changes: BTreeMap<String, Value>) -> Result<(), StoreError> {
        let base = tree::split_path(path)?;
        let mut relative = Vec::with_capacity(changes.len());
        for key in changes.keys() {
            relative.push(tree::split_path(key)?);
        }
        let mut root = self.root.write().await;
        for (segments, value) in relative.iter().zip(changes.values()) {
            let mut full = base.clone();
            full.extend(segments.iter().copied());
            tree::set(&mut root, &full, value.clone());
        }
        self.persist_branch(&root, base[0])?;
        self.hub.notify(&root, &base);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let mut segments = tree::split_path(path)?;
        let id = Uuid::new_v4().to_string();
        segments.push(&id);
        let mut root = self.root.write().await;
        tree::set(&mut root, &segments, value);
        self.persist_branch(&root, segments[0])?;
        self.hub.notify(&root, &segments);
        Ok(id)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let segments = tree::split_path(path)?;
        let mut root = self.root.write().await;
        if tree::remove(&mut root, &segments) {
            self.persist_branch(&root, segments[0])?;
            self.hub.notify(&root, &segments);
        }
        Ok(())
    }

    async fn watch(&self, path: &str) -> Result<WatchHandle, StoreError> {
        let segments = tree::split_path(path)?;
        let root = self.root.read().await;
        let current = tree::get(&root, &segments).cloned();
        Ok(WatchHub::register(&self.hub, &segments, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn write_then_read_in_memory() {
        let store = SqliteStore::open_memory().unwrap();
        store.write("users/u1/displayName", json!("Ada")).await.unwrap();
        assert_eq!(
            store.read("users/u1/displayName").await.unwrap(),
            Some(json!("Ada"))
        );
    }

    #[tokio::test]
    async fn push_and_remove_update_the_branch() {
        let store = SqliteStore::open_memory().unwrap();
        let id = store
            .push("weeklyChallenges", json!({"title": "x"}))
            .await
            .unwrap();
        store
            .remove(&format!("weeklyChallenges/{id}"))
            .await
            .unwrap();
        assert_eq!(store.read("weeklyChallenges").await.unwrap(), None);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questline.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.write("users/u1/displayName", json!("Ada")).await.unwrap();
            store
                .write("dailyChallenges/u1/c1", json!({"title": "Read"}))
                .await
                .unwrap();
            store.remove("users/u1/displayName").await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.read("users").await.unwrap(), None);
        assert_eq!(
            store.read("dailyChallenges/u1/c1/title").await.unwrap(),
            Some(json!("Read"))
        );
    }

    #[tokio::test]
    async fn watch_works_over_the_loaded_tree() {
        let store = SqliteStore::open_memory().unwrap();
        store.write("scope/a", json!(1)).await.unwrap();
        let mut handle = store.watch("scope/a").await.unwrap();
        assert_eq!(handle.next().await, Some(Some(json!(1))));
        store.write("scope/a", json!(2)).await.unwrap();
        assert_eq!(handle.next().await, Some(Some(json!(2))));
    }
}
