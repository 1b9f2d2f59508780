//! Hierarchical key-value storage.
//!
//! All engine state lives in one JSON tree addressed by slash-separated
//! key paths. [`Store`] is the persistence seam: the in-memory
//! implementation backs tests and ephemeral sessions, the SQLite one
//! survives restarts. Both share the same tree and watch semantics.

mod config;
mod memory;
mod sqlite;
mod tree;
mod watch;

pub use config::{Config, ResetSettings, StoreBackend, StoreSettings};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use watch::WatchHandle;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Persistence seam for the engine's JSON tree.
#[async_trait]
pub trait Store: Send + Sync {
    /// Value at `path`, or `None` when absent.
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Writes `value` at `path`, creating intermediate scopes. Writing
    /// `Null` removes the path.
    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Applies all `changes` (keys relative to `path`) as one atomic
    /// mutation. A `Null` change removes its path.
    async fn patch(&self, path: &str, changes: BTreeMap<String, Value>) -> Result<(), StoreError>;

    /// Writes `value` under a freshly allocated child id of `path` and
    /// returns the id.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Removes the path. Absent paths are a no-op.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Streams the value at `path`: once immediately, then after every
    /// overlapping mutation.
    async fn watch(&self, path: &str) -> Result<WatchHandle, StoreError>;
}

/// Key-path builders for the documents the engine owns.
pub mod paths {
    pub fn daily_scope(user_id: &str) -> String {
        format!("dailyChallenges/{user_id}")
    }

    pub fn daily_challenge(user_id: &str, id: &str) -> String {
        format!("dailyChallenges/{user_id}/{id}")
    }

    pub fn weekly_scope() -> String {
        "weeklyChallenges".to_string()
    }

    pub fn weekly_challenge(id: &str) -> String {
        format!("weeklyChallenges/{id}")
    }

    pub fn users_scope() -> String {
        "users".to_string()
    }

    pub fn user_streak(user_id: &str) -> String {
        format!("users/{user_id}/streak")
    }

    pub fn user_display_name(user_id: &str) -> String {
        format!("users/{user_id}/displayName")
    }

    pub fn activity_scope(day_key: &str) -> String {
        format!("userActivities/{day_key}")
    }

    pub fn user_activity(day_key: &str, user_id: &str) -> String {
        format!("userActivities/{day_key}/{user_id}")
    }
}

/// Returns `~/.config/questline[-dev]/` based on QUESTLINE_ENV.
///
/// Set QUESTLINE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("QUESTLINE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("questline-dev")
    } else {
        base_dir.join("questline")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
