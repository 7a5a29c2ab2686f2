//! Shleepy Library
//!
//! Sleep logging, personal statistics and friend comparisons on top of a
//! hosted backend. The statistics and social modules are pure; `api` and
//! `app` do the I/O.

pub mod api;
pub mod app;
pub mod config;
pub mod duration;
pub mod error;
pub mod export;
pub mod models;
pub mod session;
pub mod social;
pub mod stats;
pub mod traits;

// Re-export commonly used types
pub use api::{BackendClient, SignUpOutcome};
pub use app::{FriendRequestOutcome, Shleepy, SignUpForm, SleepEntry, StatsPage};
pub use config::AppConfig;
pub use error::ShleepyError;
pub use models::{Friendship, FriendshipStatus, Profile};
pub use session::{Session, SessionStore};
pub use social::{LeaderboardEntry, build_leaderboard, sky_depth};
pub use stats::{
    SleepRecord, StatsSummary, compute_stats, hour_distribution, is_healthy, recent_trend,
    streak_days,
};
pub use traits::{Clock, MockClock, SystemClock};
