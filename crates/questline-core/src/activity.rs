//! Daily activity presence.
//!
//! Each app session marks its user active under today's day key. The
//! node is a plain `{userId: true}` map, so counting active users is a
//! key count and re-marking the same user is a no-op overwrite.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::auth::{self, AuthProvider};
use crate::clock;
use crate::error::CoreError;
use crate::store::{paths, Store};

pub struct ActivityTracker {
    store: Arc<dyn Store>,
    auth: Arc<dyn AuthProvider>,
}

impl ActivityTracker {
    pub fn new(store: Arc<dyn Store>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    /// Marks the signed-in user active for today. Idempotent.
    ///
    /// # Errors
    /// Returns an error when no user is signed in or the store fails.
    pub async fn record_activity(&self) -> Result<(), CoreError> {
        let user = auth::require_user(&self.auth)?;
        let today = clock::today_key();
        self.store
            .write(&paths::user_activity(&today, &user.user_id), Value::Bool(true))
            .await?;
        debug!(user_id = %user.user_id, day = %today, "recorded activity");
        Ok(())
    }

    /// Number of distinct users active today.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn active_today_count(&self) -> Result<usize, CoreError> {
        let scope = paths::activity_scope(&clock::today_key());
        let count = match self.store.read(&scope).await? {
            Some(Value::Object(map)) => map.len(),
            _ => 0,
        };
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FixedAuth;
    use crate::store::MemoryStore;

    fn tracker(store: Arc<dyn Store>, auth: FixedAuth) -> ActivityTracker {
        ActivityTracker::new(store, Arc::new(auth))
    }

    #[tokio::test]
    async fn recording_marks_the_user_active() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let tracker = tracker(Arc::clone(&store), FixedAuth::signed_in("u1"));
        tracker.record_activity().await.unwrap();
        assert_eq!(tracker.active_today_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recording_twice_counts_once() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let tracker = tracker(store, FixedAuth::signed_in("u1"));
        tracker.record_activity().await.unwrap();
        tracker.record_activity().await.unwrap();
        assert_eq!(tracker.active_today_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn distinct_users_each_count() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        tracker(Arc::clone(&store), FixedAuth::signed_in("u1"))
            .record_activity()
            .await
            .unwrap();
        tracker(Arc::clone(&store), FixedAuth::signed_in("u2"))
            .record_activity()
            .await
            .unwrap();
        let reader = tracker(store, FixedAuth::signed_out());
        assert_eq!(reader.active_today_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn signed_out_cannot_record() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let tracker = tracker(store, FixedAuth::signed_out());
        assert!(matches!(
            tracker.record_activity().await,
            Err(CoreError::Unauthorized)
        ));
        assert_eq!(tracker.active_today_count().await.unwrap(), 0);
    }
}
