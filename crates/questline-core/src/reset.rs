//! Daily challenge reset.
//!
//! Daily challenges whose `lastResetDate` is not today's local day key
//! are returned to zero progress. One pass runs on demand (typically at
//! startup), and a background scheduler repeats the pass at every local
//! midnight. The wait until midnight is recomputed after each pass, so
//! clock changes and DST shifts only mis-time a single firing.
//!
//! A reset zeroes `current` and `isCompleted` and stamps the new day
//! key. `countCompleted` and `isCompletedData` carry history across
//! days and are left untouched.

use std::sync::Arc;

use chrono::Local;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::auth::{self, AuthProvider};
use crate::clock;
use crate::error::CoreError;
use crate::model::DailyChallenge;
use crate::store::{paths, Store};

/// Runs the stale-challenge sweep for the signed-in user.
pub struct ResetScheduler {
    store: Arc<dyn Store>,
    auth: Arc<dyn AuthProvider>,
}

impl ResetScheduler {
    pub fn new(store: Arc<dyn Store>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    /// One reset pass over the signed-in user's daily challenges.
    /// Returns how many challenges were reset.
    ///
    /// # Errors
    /// Returns an error when no user is signed in or the store fails.
    pub async fn run_once(&self) -> Result<usize, CoreError> {
        let user = auth::require_user(&self.auth)?;
        reset_stale(self.store.as_ref(), &user.user_id, &clock::today_key()).await
    }

    /// Moves the scheduler onto a background task that sweeps at every
    /// local midnight. The returned handle stops the task when dropped.
    pub fn spawn(self) -> ResetSchedulerHandle {
        let task = tokio::spawn(async move {
            loop {
                match self.auth.current_user() {
                    Some(user) => {
                        let today = clock::today_key();
                        match reset_stale(self.store.as_ref(), &user.user_id, &today).await {
                            Ok(0) => debug!(user_id = %user.user_id, "no stale daily challenges"),
                            Ok(count) => debug!(user_id = %user.user_id, count, "reset stale daily challenges"),
                            Err(error) => {
                                warn!(user_id = %user.user_id, %error, "reset pass failed, retrying at next midnight");
                            }
                        }
                    }
                    None => debug!("no signed-in user, skipping reset pass"),
                }
                tokio::time::sleep(clock::until_next_local_midnight(Local::now())).await;
            }
        });
        ResetSchedulerHandle { task }
    }
}

/// Resets every daily challenge under `user_id` whose `lastResetDate`
/// differs from `today`, as one atomic patch.
async fn reset_stale(store: &dyn Store, user_id: &str, today: &str) -> Result<usize, CoreError> {
    let scope = paths::daily_scope(user_id);
    let Some(Value::Object(map)) = store.read(&scope).await? else {
        return Ok(0);
    };

    let mut changes = std::collections::BTreeMap::new();
    let mut count = 0;
    for (id, raw) in &map {
        let challenge = match DailyChallenge::decode(id, user_id, raw.clone()) {
            Ok(challenge) => challenge,
            Err(error) => {
                warn!(challenge_id = %id, %error, "skipping malformed daily challenge");
                continue;
            }
        };
        if challenge.last_reset_date == today {
            continue;
        }
        changes.insert(format!("{id}/current"), json!(0));
        changes.insert(format!("{id}/isCompleted"), Value::Bool(false));
        changes.insert(format!("{id}/lastResetDate"), Value::String(today.to_string()));
        count += 1;
    }

    if !changes.is_empty() {
        store.patch(&scope, changes).await?;
    }
    Ok(count)
}

/// Stops the midnight sweep when cancelled or dropped.
pub struct ResetSchedulerHandle {
    task: tokio::task::JoinHandle<()>,
}

impl ResetSchedulerHandle {
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for ResetSchedulerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
