//! Challenge and streak records.
//!
//! Persisted documents are camelCase JSON. Raw values are decoded into
//! these typed records at the storage boundary; a document that does not
//! fit its record type is rejected there instead of flowing through the
//! engine half-formed.
//!
//! Completion transition:
//!
//! ```text
//!   incomplete --(current reaches target)--> completed
//!       ^                                        |
//!       +------------(daily reset)---------------+
//! ```
//!
//! Only the transition itself bumps `count_completed` and appends a
//! completion timestamp. Increments past the target keep advancing
//! `current` without re-firing the transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock;
use crate::error::ValidationError;

/// A per-user challenge that resets every local calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChallenge {
    /// Child key under the user's scope. Derived from the path, never
    /// stored inside the document.
    #[serde(skip)]
    pub id: String,
    /// Owner. Also path-derived.
    #[serde(skip)]
    pub user_id: String,
    pub title: String,
    pub target: u32,
    pub current: u32,
    pub is_completed: bool,
    pub count_completed: u32,
    /// Completion instants, one appended per transition.
    #[serde(default)]
    pub is_completed_data: Vec<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Local day key of the last reset, e.g. `"Wed Aug 06 2026"`.
    pub last_reset_date: String,
    #[serde(default)]
    pub group: Option<String>,
    /// Removed instead of persisted on its completing increment.
    #[serde(default)]
    pub is_single_use: bool,
}

impl DailyChallenge {
    pub fn from_draft(draft: &ChallengeDraft, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.to_string(),
            title: draft.title.clone(),
            target: draft.target,
            current: 0,
            is_completed: false,
            count_completed: 0,
            is_completed_data: Vec::new(),
            created_at: now,
            last_reset_date: clock::day_key(now),
            group: draft.group.clone(),
            is_single_use: draft.single_use,
        }
    }

    /// Applies one unit of progress. Returns true when this call crossed
    /// the incomplete-to-complete boundary.
    pub fn apply_increment(&mut self, now: DateTime<Utc>) -> bool {
        self.current += 1;
        let newly_completed = !self.is_completed && self.current >= self.target;
        if newly_completed {
            self.is_completed = true;
            self.count_completed += 1;
            self.is_completed_data.push(now);
        }
        newly_completed
    }

    pub fn decode(id: &str, user_id: &str, value: Value) -> Result<Self, serde_json::Error> {
        let mut challenge: DailyChallenge = serde_json::from_value(value)?;
        challenge.id = id.to_string();
        challenge.user_id = user_id.to_string();
        Ok(challenge)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// A shared challenge advanced by every participant's daily completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyChallenge {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub target: u32,
    pub current: u32,
    pub is_completed: bool,
    pub count_completed: u32,
    #[serde(default)]
    pub is_completed_data: Vec<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Participation log, deduplicated by user id.
    #[serde(default)]
    pub users: Vec<String>,
}

impl WeeklyChallenge {
    /// Same transition rule as the daily record.
    pub fn apply_increment(&mut self, now: DateTime<Utc>) -> bool {
        self.current += 1;
        let newly_completed = !self.is_completed && self.current >= self.target;
        if newly_completed {
            self.is_completed = true;
            self.count_completed += 1;
            self.is_completed_data.push(now);
        }
        newly_completed
    }

    /// Appends the user to the participation log unless already present.
    /// Returns true when the log changed.
    pub fn note_participant(&mut self, user_id: &str) -> bool {
        if self.users.iter().any(|u| u == user_id) {
            return false;
        }
        self.users.push(user_id.to_string());
        true
    }

    pub fn decode(id: &str, value: Value) -> Result<Self, serde_json::Error> {
        let mut challenge: WeeklyChallenge = serde_json::from_value(value)?;
        challenge.id = id.to_string();
        Ok(challenge)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// User-editable challenge fields.
#[derive(Debug, Clone, Default)]
pub struct ChallengeDraft {
    pub title: String,
    pub target: u32,
    pub group: Option<String>,
    pub single_use: bool,
}

impl ChallengeDraft {
    pub fn new(title: impl Into<String>, target: u32) -> Self {
        Self {
            title: title.into(),
            target,
            group: None,
            single_use: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.target == 0 {
            return Err(ValidationError::TargetTooSmall(self.target));
        }
        if matches!(self.group.as_deref(), Some(group) if group.trim().is_empty()) {
            return Err(ValidationError::EmptyGroup);
        }
        Ok(())
    }
}

/// Per-user streak of consecutive days with at least one completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub current: u32,
    pub best: u32,
    #[serde(default)]
    pub last_completed: Option<DateTime<Utc>>,
}

impl StreakRecord {
    /// Streak state after a completion at `now`, or `None` when today
    /// already counted.
    ///
    /// A completion on the local day after `last_completed` extends the
    /// run; any longer gap restarts it at one.
    pub fn advanced(&self, now: DateTime<Utc>) -> Option<StreakRecord> {
        let today = clock::local_day_floor(now);
        let last_day = self.last_completed.map(clock::local_day_floor);
        if last_day == Some(today) {
            return None;
        }
        let yesterday = today - chrono::Duration::days(1);
        let current = match last_day {
            Some(day) if day >= yesterday => self.current + 1,
            _ => 1,
        };
        Some(StreakRecord {
            current,
            best: self.best.max(current),
            last_completed: Some(now),
        })
    }

    /// Restores `best >= current`. Returns the record and whether it
    /// changed.
    pub fn repaired(mut self) -> (StreakRecord, bool) {
        if self.best < self.current {
            self.best = self.current;
            (self, true)
        } else {
            (self, false)
        }
    }
}

/// Completion leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRanking {
    pub user_id: String,
    pub user_name: String,
    pub completed_challenges: u32,
    /// 1-based position after the descending sort.
    pub rank: u32,
}

/// Streak leaderboard row.
#[derive(Debug, Clone, Serialize)]
pub struct StreakStanding {
    pub user_id: String,
    pub user_name: String,
    pub current: u32,
    pub best: u32,
    pub last_completed: Option<DateTime<Utc>>,
}
