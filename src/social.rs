//! Friends, leaderboard and sky placement.
//!
//! Everything here works on rows already fetched from the backend, so the
//! friend screens can be tested without a server.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::error::ShleepyError;
use crate::models::{Friendship, FriendshipStatus, Profile, fallback_name};
use crate::stats::SleepRecord;

/// Hours at which a sheep reaches the top of the sky.
pub const SKY_CEILING_HOURS: f64 = 10.0;

// ==================== Friend Lists ====================

/// Ids of everyone `me` has an accepted friendship with, in input order.
pub fn friend_ids(friendships: &[Friendship], me: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    friendships
        .iter()
        .filter(|f| f.req_status == FriendshipStatus::Accepted)
        .filter_map(|f| f.other_party(me))
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

/// Users that `me` has no pending or accepted friendship with.
pub fn suggest_friends(users: &[Profile], friendships: &[Friendship], me: &str) -> Vec<Profile> {
    let linked: HashSet<&str> = friendships
        .iter()
        .filter_map(|f| f.other_party(me))
        .collect();

    users
        .iter()
        .filter(|u| u.id != me && !linked.contains(u.id.as_str()))
        .cloned()
        .collect()
}

// ==================== Friend Requests ====================

/// What sending a friend request should do given the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendRequestPlan {
    /// No friendship yet, insert a pending one.
    Create,
    /// A friendship row exists but is not accepted, reset it to pending.
    Reopen(i64),
}

pub fn plan_friend_request(
    me: &str,
    target: &str,
    existing: Option<&Friendship>,
) -> Result<FriendRequestPlan, ShleepyError> {
    if me == target {
        return Err(ShleepyError::SelfFriendRequest);
    }
    match existing {
        None => Ok(FriendRequestPlan::Create),
        Some(f) if f.req_status == FriendshipStatus::Accepted => Err(ShleepyError::AlreadyFriends),
        Some(f) => Ok(FriendRequestPlan::Reopen(f.id)),
    }
}

// ==================== Leaderboard ====================

/// A friend and how long they slept today.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    /// `None` when the friend has not logged today
    pub hours_today: Option<f64>,
}

impl LeaderboardEntry {
    /// Vertical position in the sky, see [`sky_depth`].
    pub fn sky_depth(&self) -> f64 {
        sky_depth(self.hours_today)
    }
}

/// Join friends with today's logs and rank by hours slept.
///
/// Friends without a log sort after everyone who logged. Ties are broken
/// by display name.
pub fn build_leaderboard(
    friend_ids: &[String],
    profiles: &[Profile],
    today_logs: &[SleepRecord],
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = friend_ids
        .iter()
        .map(|id| {
            let display_name = profiles
                .iter()
                .find(|p| &p.id == id)
                .map(Profile::label)
                .unwrap_or_else(|| fallback_name(id));
            let hours_today = today_logs
                .iter()
                .find(|log| &log.user_id == id)
                .map(|log| log.hours_slept);
            LeaderboardEntry {
                user_id: id.clone(),
                display_name,
                hours_today,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        let by_hours = match (a.hours_today, b.hours_today) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_hours.then_with(|| a.display_name.cmp(&b.display_name))
    });
    entries
}

/// Position of a friend's sheep, 0.0 at the top of the sky and 1.0 on the
/// ground. More sleep floats higher; a missing log sits on the ground.
pub fn sky_depth(hours: Option<f64>) -> f64 {
    match hours {
        None => 1.0,
        Some(h) => (SKY_CEILING_HOURS - h.clamp(0.0, SKY_CEILING_HOURS)) / SKY_CEILING_HOURS,
    }
}
