//! Challenge CRUD and live subscription feeds.
//!
//! Daily challenges are per-user; weekly challenges are shared and
//! administered outside this crate, so only read and subscribe surfaces
//! exist for them here.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::auth::{self, AuthProvider};
use crate::error::{CoreError, Result};
use crate::model::{ChallengeDraft, DailyChallenge, WeeklyChallenge};
use crate::store::{paths, Store, WatchHandle};

pub struct ChallengeRepository {
    store: Arc<dyn Store>,
    auth: Arc<dyn AuthProvider>,
}

impl ChallengeRepository {
    pub fn new(store: Arc<dyn Store>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    /// The signed-in user's daily challenges, sorted by creation time.
    pub async fn list_daily(&self) -> Result<Vec<DailyChallenge>> {
        let user = auth::require_user(&self.auth)?;
        let scope = self.store.read(&paths::daily_scope(&user.user_id)).await?;
        decode_daily_scope(&user.user_id, scope)
    }

    /// All shared weekly challenges, sorted by creation time.
    pub async fn list_weekly(&self) -> Result<Vec<WeeklyChallenge>> {
        let scope = self.store.read(&paths::weekly_scope()).await?;
        decode_weekly_scope(scope)
    }

    /// Creates a daily challenge from `draft` with zeroed progress and
    /// today's reset key. Returns the stored record with its new id.
    pub async fn add_daily(&self, draft: &ChallengeDraft) -> Result<DailyChallenge> {
        let user = auth::require_user(&self.auth)?;
        draft.validate()?;
        let mut challenge = DailyChallenge::from_draft(draft, &user.user_id, Utc::now());
        let doc = challenge.to_value()?;
        let id = self
            .store
            .push(&paths::daily_scope(&user.user_id), doc)
            .await?;
        challenge.id = id;
        debug!(id = %challenge.id, title = %challenge.title, "added daily challenge");
        Ok(challenge)
    }

    /// Overwrites the editable fields of an existing challenge, keeping
    /// its progress untouched.
    pub async fn edit_daily(&self, id: &str, draft: &ChallengeDraft) -> Result<DailyChallenge> {
        let user = auth::require_user(&self.auth)?;
        draft.validate()?;
        let path = paths::daily_challenge(&user.user_id, id);
        let existing = self
            .store
            .read(&path)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                kind: "daily challenge",
                id: id.to_string(),
            })?;
        let mut challenge = DailyChallenge::decode(id, &user.user_id, existing)
            .map_err(|source| CoreError::Decode {
                path: path.clone(),
                source,
            })?;
        challenge.title = draft.title.clone();
        challenge.target = draft.target;
        challenge.group = draft.group.clone();
        challenge.is_single_use = draft.single_use;
        self.store.write(&path, challenge.to_value()?).await?;
        debug!(id = %challenge.id, "edited daily challenge");
        Ok(challenge)
    }

    /// Removes a daily challenge. Removing an absent id is a no-op.
    pub async fn remove_daily(&self, id: &str) -> Result<()> {
        let user = auth::require_user(&self.auth)?;
        self.store
            .remove(&paths::daily_challenge(&user.user_id, id))
            .await?;
        debug!(%id, "removed daily challenge");
        Ok(())
    }

    /// Opens a live feed over the weekly scope and, when a user is
    /// signed in, their daily scope. The feed owns both registrations.
    pub async fn subscribe(&self) -> Result<ChallengeFeed> {
        let weekly = self.store.watch(&paths::weekly_scope()).await?;
        let daily = match self.auth.current_user() {
            Some(user) => {
                let handle = self.store.watch(&paths::daily_scope(&user.user_id)).await?;
                Some((user.user_id, handle))
            }
            None => None,
        };
        Ok(ChallengeFeed { weekly, daily })
    }
}

/// One decoded update from a [`ChallengeFeed`].
#[derive(Debug, Clone)]
pub enum FeedUpdate {
    Daily(Vec<DailyChallenge>),
    Weekly(Vec<WeeklyChallenge>),
}

/// Live subscription over the challenge scopes.
///
/// Each update carries the full decoded list for its scope, starting
/// with one immediate update per scope. Dropping the feed tears down the
/// underlying watches.
pub struct ChallengeFeed {
    weekly: WatchHandle,
    daily: Option<(String, WatchHandle)>,
}

impl ChallengeFeed {
    /// Next update from either scope. Returns `None` once the store side
    /// is gone.
    pub async fn next(&mut self) -> Option<Result<FeedUpdate>> {
        match &mut self.daily {
            Some((user_id, daily)) => {
                tokio::select! {
                    value = daily.next() => {
                        let value = value?;
                        Some(decode_daily_scope(user_id, value).map(FeedUpdate::Daily))
                    }
                    value = self.weekly.next() => {
                        let value = value?;
                        Some(decode_weekly_scope(value).map(FeedUpdate::Weekly))
                    }
                }
            }
            None => {
                let value = self.weekly.next().await?;
                Some(decode_weekly_scope(value).map(FeedUpdate::Weekly))
            }
        }
    }
}

/// Splits challenges into display clusters: grouped ones keyed by group
/// name, ungrouped ones in their incoming order.
pub fn group_daily(
    challenges: &[DailyChallenge],
) -> (BTreeMap<String, Vec<DailyChallenge>>, Vec<DailyChallenge>) {
    let mut grouped: BTreeMap<String, Vec<DailyChallenge>> = BTreeMap::new();
    let mut ungrouped = Vec::new();
    for challenge in challenges {
        match &challenge.group {
            Some(group) => grouped
                .entry(group.clone())
                .or_default()
                .push(challenge.clone()),
            None => ungrouped.push(challenge.clone()),
        }
    }
    (grouped, ungrouped)
}

fn decode_daily_scope(user_id: &str, scope: Option<Value>) -> Result<Vec<DailyChallenge>> {
    let map = match scope {
        Some(Value::Object(map)) => map,
        _ => return Ok(Vec::new()),
    };
    let mut challenges = Vec::with_capacity(map.len());
    for (id, doc) in map {
        let challenge =
            DailyChallenge::decode(&id, user_id, doc).map_err(|source| CoreError::Decode {
                path: paths::daily_challenge(user_id, &id),
                source,
            })?;
        challenges.push(challenge);
    }
    challenges.sort_by_key(|challenge| challenge.created_at);
    Ok(challenges)
}

fn decode_weekly_scope(scope: Option<Value>) -> Result<Vec<WeeklyChallenge>> {
    let map = match scope {
        Some(Value::Object(map)) => map,
        _ => return Ok(Vec::new()),
    };
    let mut challenges = Vec::with_capacity(map.len());
    for (id, doc) in map {
        let challenge = WeeklyChallenge::decode(&id, doc).map_err(|source| CoreError::Decode {
            path: paths::weekly_challenge(&id),
            source,
        })?;
        challenges.push(challenge);
    }
    challenges.sort_by_key(|challenge| challenge.created_at);
    Ok(challenges)
}
