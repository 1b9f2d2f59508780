//! # Questline Core Library
//!
//! This library provides the core business logic for Questline, a habit
//! tracker built around daily and weekly challenges. All state flows
//! through a hierarchical key-value [`Store`], with UI layers acting as
//! thin shells over the same core components.
//!
//! ## Architecture
//!
//! - **Store**: A JSON tree addressed by slash-separated paths, with an
//!   in-memory backend for tests and a SQLite backend that persists
//!   between runs. Watches stream value changes to subscribers.
//! - **Challenges**: CRUD and live feeds for per-user daily challenges
//!   and shared weekly challenges
//! - **Progress**: The increment pipeline; completing a daily challenge
//!   fans out into weekly progress and the user's streak
//! - **Scheduling**: A midnight sweeper that returns stale daily
//!   challenges to zero progress
//! - **Leaderboards**: Completion and streak rankings derived from the
//!   stored tree, plus a daily active-user tally
//!
//! ## Key Components
//!
//! - [`ChallengeRepository`]: Challenge CRUD and subscriptions
//! - [`ProgressEngine`]: Increment handling, weekly fan-out, streaks
//! - [`ResetScheduler`]: Daily reset pass and midnight scheduler
//! - [`RankingAggregator`]: Completion and streak leaderboards
//! - [`ActivityTracker`]: Daily active-user presence
//! - [`Store`]: Persistence seam with [`MemoryStore`] and [`SqliteStore`]

pub mod activity;
pub mod auth;
pub mod challenges;
pub mod clock;
pub mod error;
pub mod model;
pub mod progress;
pub mod rankings;
pub mod reset;
pub mod store;

pub use activity::ActivityTracker;
pub use auth::{AuthProvider, FixedAuth, UserIdentity};
pub use challenges::{group_daily, ChallengeFeed, ChallengeRepository, FeedUpdate};
pub use error::{CoreError, StoreError, ValidationError};
pub use model::{
    ChallengeDraft, DailyChallenge, StreakRecord, StreakStanding, UserRanking, WeeklyChallenge,
};
pub use progress::{ChallengeTarget, IncrementOutcome, ProgressEngine};
pub use rankings::RankingAggregator;
pub use reset::{ResetScheduler, ResetSchedulerHandle};
pub use store::{
    Config, MemoryStore, ResetSettings, SqliteStore, Store, StoreBackend, StoreSettings,
    WatchHandle,
};
