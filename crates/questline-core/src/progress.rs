//! Progress increments and completion fan-out.
//!
//! One increment runs as:
//!
//! ```text
//!   snapshot -> bump current -> transition? -> persist (or delete)
//!                                   |
//!                                   +--> advance incomplete weeklies
//!                                   +--> advance streak (once per day)
//! ```
//!
//! The snapshot is read once; everything downstream works off it. After
//! the primary write lands, the fan-out steps are best-effort: a failed
//! weekly write or streak write is logged and reported in the outcome,
//! never rolled back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{self, AuthProvider};
use crate::error::{CoreError, Result};
use crate::model::{DailyChallenge, StreakRecord, WeeklyChallenge};
use crate::store::{paths, Store};

/// Which challenge an increment applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeTarget {
    Daily(String),
    Weekly(String),
}

/// What a single increment did.
#[derive(Debug, Default)]
pub struct IncrementOutcome {
    /// The increment crossed the incomplete-to-complete boundary.
    pub newly_completed: bool,
    /// Single-use challenge removed on its completing increment.
    pub deleted: bool,
    /// Weekly challenges advanced by the fan-out.
    pub weekly_advanced: u32,
    /// Streak state written by this increment, when one was.
    pub streak: Option<StreakRecord>,
    /// Fan-out steps that failed after the primary write landed.
    pub fan_out_errors: Vec<CoreError>,
}

pub struct ProgressEngine {
    store: Arc<dyn Store>,
    auth: Arc<dyn AuthProvider>,
    // Serializes concurrent increments of the same challenge within this
    // process. Cross-process writers still race (last write wins).
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProgressEngine {
    pub fn new(store: Arc<dyn Store>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            store,
            auth,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Applies one unit of progress to `target` for the signed-in user.
    ///
    /// An increment on a missing challenge is a no-op. Increments past an
    /// already-completed target keep advancing `current` without
    /// re-firing the completion transition.
    pub async fn increment(&self, target: ChallengeTarget) -> Result<IncrementOutcome> {
        let user = auth::require_user(&self.auth)?;
        let path = match &target {
            ChallengeTarget::Daily(id) => paths::daily_challenge(&user.user_id, id),
            ChallengeTarget::Weekly(id) => paths::weekly_challenge(id),
        };
        let lock = self.challenge_lock(&path);
        let _serialized = lock.lock().await;

        match target {
            ChallengeTarget::Daily(id) => self.increment_daily(&user.user_id, &id).await,
            ChallengeTarget::Weekly(id) => self.increment_weekly(&id).await,
        }
    }

    async fn increment_daily(&self, user_id: &str, id: &str) -> Result<IncrementOutcome> {
        let path = paths::daily_challenge(user_id, id);
        let doc = match self.store.read(&path).await? {
            Some(doc) => doc,
            None => {
                debug!(%path, "increment on a missing challenge is a no-op");
                return Ok(IncrementOutcome::default());
            }
        };
        let mut challenge =
            DailyChallenge::decode(id, user_id, doc).map_err(|source| CoreError::Decode {
                path: path.clone(),
                source,
            })?;

        let now = Utc::now();
        let newly_completed = challenge.apply_increment(now);
        let mut outcome = IncrementOutcome {
            newly_completed,
            ..Default::default()
        };

        if newly_completed && challenge.is_single_use {
            self.store.remove(&path).await?;
            outcome.deleted = true;
            debug!(%id, "single-use challenge completed and removed");
        } else {
            self.store.write(&path, challenge.to_value()?).await?;
        }

        if newly_completed {
            match self.fan_out_weeklies(user_id, now).await {
                Ok((advanced, mut errors)) => {
                    outcome.weekly_advanced = advanced;
                    outcome.fan_out_errors.append(&mut errors);
                }
                Err(err) => {
                    warn!(error = %err, "weekly fan-out aborted");
                    outcome.fan_out_errors.push(err);
                }
            }
            match self.advance_streak(user_id, now).await {
                Ok(streak) => outcome.streak = streak,
                Err(err) => {
                    warn!(error = %err, "streak update failed");
                    outcome.fan_out_errors.push(err);
                }
            }
        }

        Ok(outcome)
    }

    async fn increment_weekly(&self, id: &str) -> Result<IncrementOutcome> {
        let path = paths::weekly_challenge(id);
        let doc = match self.store.read(&path).await? {
            Some(doc) => doc,
            None => {
                debug!(%path, "increment on a missing challenge is a no-op");
                return Ok(IncrementOutcome::default());
            }
        };
        let mut challenge =
            WeeklyChallenge::decode(id, doc).map_err(|source| CoreError::Decode {
                path: path.clone(),
                source,
            })?;
        let newly_completed = challenge.apply_increment(Utc::now());
        self.store.write(&path, challenge.to_value()?).await?;
        Ok(IncrementOutcome {
            newly_completed,
            ..Default::default()
        })
    }

    /// Advances every weekly challenge that is not yet completed and
    /// notes the contributing user. Completed weeklies stay untouched.
    async fn fan_out_weeklies(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(u32, Vec<CoreError>)> {
        let scope = self.store.read(&paths::weekly_scope()).await?;
        let map = match scope {
            Some(Value::Object(map)) => map,
            _ => return Ok((0, Vec::new())),
        };
        let mut advanced = 0;
        let mut errors = Vec::new();
        for (weekly_id, doc) in map {
            let mut weekly = match WeeklyChallenge::decode(&weekly_id, doc) {
                Ok(weekly) => weekly,
                Err(source) => {
                    warn!(id = %weekly_id, error = %source, "skipping malformed weekly challenge");
                    errors.push(CoreError::Decode {
                        path: paths::weekly_challenge(&weekly_id),
                        source,
                    });
                    continue;
                }
            };
            if weekly.is_completed {
                continue;
            }
            weekly.apply_increment(now);
            weekly.note_participant(user_id);
            match self.write_weekly(&weekly).await {
                Ok(()) => advanced += 1,
                Err(err) => {
                    warn!(id = %weekly_id, error = %err, "weekly fan-out write failed");
                    errors.push(err);
                }
            }
        }
        Ok((advanced, errors))
    }

    async fn write_weekly(&self, weekly: &WeeklyChallenge) -> Result<()> {
        let doc = weekly.to_value()?;
        self.store
            .write(&paths::weekly_challenge(&weekly.id), doc)
            .await?;
        Ok(())
    }

    /// Applies the calendar streak rule: consecutive local days extend
    /// the run, a gap restarts it, and a day counts at most once.
    async fn advance_streak(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StreakRecord>> {
        let path = paths::user_streak(user_id);
        let record: StreakRecord = match self.store.read(&path).await? {
            Some(doc) => serde_json::from_value(doc).map_err(|source| CoreError::Decode {
                path: path.clone(),
                source,
            })?,
            None => StreakRecord::default(),
        };
        let next = match record.advanced(now) {
            Some(next) => next,
            None => return Ok(None),
        };
        self.store
            .write(&path, serde_json::to_value(&next)?)
            .await?;
        debug!(user = %user_id, current = next.current, best = next.best, "streak advanced");
        Ok(Some(next))
    }

    fn challenge_lock(&self, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(path.to_string()).or_default().clone()
    }
}
