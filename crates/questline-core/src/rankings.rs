//! Completion and streak leaderboards.
//!
//! Rankings are derived on demand from the stored tree rather than kept
//! as materialized counters. A user's score is the number of their daily
//! challenges currently completed plus the number of completed weekly
//! challenges, which are shared by everyone.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{StreakRecord, StreakStanding, UserRanking, WeeklyChallenge};
use crate::store::{paths, Store};

/// Derives leaderboards from the stored tree.
pub struct RankingAggregator {
    store: Arc<dyn Store>,
}

impl RankingAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Completion leaderboard over every known user, ranked 1-based in
    /// descending score order. Ties keep user iteration order.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn completion_rankings(&self) -> Result<Vec<UserRanking>, CoreError> {
        let weekly_completed = self.completed_weekly_count().await?;

        let users = match self.store.read(&paths::users_scope()).await? {
            Some(Value::Object(map)) => map,
            _ => return Ok(Vec::new()),
        };

        let mut rankings = Vec::with_capacity(users.len());
        for (user_id, profile) in &users {
            let daily_completed = self.completed_daily_count(user_id).await?;
            rankings.push(UserRanking {
                user_id: user_id.clone(),
                user_name: display_name(profile, user_id),
                completed_challenges: daily_completed + weekly_completed,
                rank: 0,
            });
        }

        rankings.sort_by(|a, b| b.completed_challenges.cmp(&a.completed_challenges));
        for (index, ranking) in rankings.iter_mut().enumerate() {
            ranking.rank = index as u32 + 1;
        }
        debug!(users = rankings.len(), "computed completion rankings");
        Ok(rankings)
    }

    /// Streak record for `user_id`, defaulting to zeros when absent.
    ///
    /// A record whose `best` fell behind `current` is repaired and the
    /// repaired form written back before it is returned.
    ///
    /// # Errors
    /// Returns an error when the store fails or the record is malformed.
    pub async fn fetch_user_streak(&self, user_id: &str) -> Result<StreakRecord, CoreError> {
        let path = paths::user_streak(user_id);
        let record = match self.store.read(&path).await? {
            Some(raw) => {
                serde_json::from_value(raw).map_err(|source| CoreError::Decode {
                    path: path.clone(),
                    source,
                })?
            }
            None => StreakRecord::default(),
        };
        let (record, repaired) = record.repaired();
        if repaired {
            debug!(user_id = %user_id, best = record.best, "repaired streak record");
            self.store.write(&path, serde_json::to_value(&record)?).await?;
        }
        Ok(record)
    }

    /// Streak leaderboard over every known user, sorted descending by
    /// current streak.
    ///
    /// # Errors
    /// Returns an error when the store fails.
    pub async fn streak_standings(&self) -> Result<Vec<StreakStanding>, CoreError> {
        let users = match self.store.read(&paths::users_scope()).await? {
            Some(Value::Object(map)) => map,
            _ => return Ok(Vec::new()),
        };

        let mut standings = Vec::with_capacity(users.len());
        for (user_id, profile) in &users {
            let record = match self.fetch_user_streak(user_id).await {
                Ok(record) => record,
                Err(error) => {
                    warn!(user_id = %user_id, %error, "skipping malformed streak record");
                    continue;
                }
            };
            standings.push(StreakStanding {
                user_id: user_id.clone(),
                user_name: display_name(profile, user_id),
                current: record.current,
                best: record.best,
                last_completed: record.last_completed,
            });
        }

        standings.sort_by(|a, b| b.current.cmp(&a.current));
        Ok(standings)
    }

    /// Number of weekly challenges currently completed. Shared across
    /// users, so it is computed once per leaderboard.
    async fn completed_weekly_count(&self) -> Result<u32, CoreError> {
        let map = match self.store.read(&paths::weekly_scope()).await? {
            Some(Value::Object(map)) => map,
            _ => return Ok(0),
        };
        let mut count = 0;
        for (id, raw) in &map {
            match WeeklyChallenge::decode(id, raw.clone()) {
                Ok(challenge) if challenge.is_completed => count += 1,
                Ok(_) => {}
                Err(error) => {
                    warn!(challenge_id = %id, %error, "skipping malformed weekly challenge");
                }
            }
        }
        Ok(count)
    }

    async fn completed_daily_count(&self, user_id: &str) -> Result<u32, CoreError> {
        let map = match self.store.read(&paths::daily_scope(user_id)).await? {
            Some(Value::Object(map)) => map,
            _ => return Ok(0),
        };
        let mut count = 0;
        for (id, raw) in &map {
            match crate::model::DailyChallenge::decode(id, user_id, raw.clone()) {
                Ok(challenge) if challenge.is_completed => count += 1,
                Ok(_) => {}
                Err(error) => {
                    warn!(user_id = %user_id, challenge_id = %id, %error, "skipping malformed daily challenge");
                }
            }
        }
        Ok(count)
    }
}

fn display_name(profile: &Value, user_id: &str) -> String {
    profile
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback_user_name(user_id))
}

/// `"User {first 6 chars of id}"`, the label for profiles without a
/// display name.
fn fallback_user_name(user_id: &str) -> String {
    let prefix: String = user_id.chars().take(6).collect();
    format!("User {prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn fallback_name_takes_a_short_prefix() {
        assert_eq!(fallback_user_name("abcdef123456"), "User abcdef");
        assert_eq!(fallback_user_name("ab"), "User ab");
    }

    #[tokio::test]
    async fn no_users_yields_empty_leaderboards() {
        let aggregator = RankingAggregator::new(Arc::new(MemoryStore::new()));
        assert!(aggregator.completion_rankings().await.unwrap().is_empty());
        assert!(aggregator.streak_standings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn absent_streak_defaults_to_zeros() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let aggregator = RankingAggregator::new(store);
        let record = aggregator.fetch_user_streak("u1").await.unwrap();
        assert_eq!(record, StreakRecord::default());
    }

    #[tokio::test]
    async fn streak_repair_is_written_back() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        store
            .write(
                &paths::user_streak("u1"),
                json!({"current": 9, "best": 3, "lastCompleted": null}),
            )
            .await
            .unwrap();

        let aggregator = RankingAggregator::new(Arc::clone(&store));
        let record = aggregator.fetch_user_streak("u1").await.unwrap();
        assert_eq!(record.best, 9);

        let stored = store.read(&paths::user_streak("u1")).await.unwrap().unwrap();
        assert_eq!(stored.get("best"), Some(&json!(9)));
    }

    #[tokio::test]
    async fn completed_weeklies_count_for_everyone() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        store
            .write(&paths::user_display_name("u1"), json!("Ada"))
            .await
            .unwrap();
        store
            .write(
                &paths::weekly_challenge("w1"),
                json!({
                    "title": "Team goal",
                    "target": 2,
                    "current": 2,
                    "isCompleted": true,
                    "countCompleted": 1,
                    "createdAt": Utc::now(),
                }),
            )
            .await
            .unwrap();

        let aggregator = RankingAggregator::new(store);
        let rankings = aggregator.completion_rankings().await.unwrap();
        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0].user_name, "Ada");
        assert_eq!(rankings[0].completed_challenges, 1);
        assert_eq!(rankings[0].rank, 1);
    }
}
