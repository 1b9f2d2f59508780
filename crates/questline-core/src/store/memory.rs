//! In-memory store for tests and ephemeral sessions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::tree;
use super::watch::{WatchHandle, WatchHub};
use super::Store;
use crate::error::StoreError;

pub struct MemoryStore {
    root: RwLock<Value>,
    hub: Arc<WatchHub>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            hub: Arc::new(WatchHub::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = tree::split_path(path)?;
        let root = self.root.read().await;
        Ok(tree::get(&root, &segments).cloned())
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = tree::split_path(path)?;
        let mut root = self.root.write().await;
        tree::set(&mut root, &segments, value);
        self.hub.notify(&root, &segments);
        Ok(())
    }

    async fn patch(&self, path: &str, changes: BTreeMap<String, Value>) -> Result<(), StoreError> {
        let base = tree::split_path(path)?;
        // Validate every relative path before touching the tree.
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
        self.hub.notify(&root, &base);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let mut segments = tree::split_path(path)?;
        let id = Uuid::new_v4().to_string();
        segments.push(&id);
        let mut root = self.root.write().await;
        tree::set(&mut root, &segments, value);
        self.hub.notify(&root, &segments);
        Ok(id)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let segments = tree::split_path(path)?;
        let mut root = self.root.write().await;
        if tree::remove(&mut root, &segments) {
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
