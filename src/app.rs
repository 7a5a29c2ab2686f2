//! Screen workflows.
//!
//! Each method gathers what one screen of the app shows: it fetches a
//! snapshot from the backend and hands it to the pure modules. The current
//! user always arrives as an explicit [`Session`].

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};

use crate::api::BackendClient;
use crate::config::StatsConfig;
use crate::duration::hours_between;
use crate::error::ShleepyError;
use crate::models::{
    FriendRequest, FriendshipStatus, NewFriendship, NewProfile, NewSleepLog, Profile,
    ProfileUpdate,
};
use crate::session::Session;
use crate::social::{
    FriendRequestPlan, LeaderboardEntry, build_leaderboard, friend_ids, plan_friend_request,
    suggest_friends,
};
use crate::stats::{
    DISTRIBUTION_BUCKETS, SleepRecord, StatsSummary, compute_stats, hour_distribution,
    recent_trend,
};
use crate::traits::Clock;

/// Data behind the statistics page.
#[derive(Debug, Clone)]
pub struct StatsPage {
    /// Newest first, as fetched
    pub records: Vec<SleepRecord>,
    pub summary: StatsSummary,
    pub distribution: [usize; DISTRIBUTION_BUCKETS],
    /// Oldest first
    pub trend: Vec<SleepRecord>,
}

/// How a night is entered on the home screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SleepEntry {
    Hours(f64),
    Times { bed: NaiveTime, wake: NaiveTime },
}

impl SleepEntry {
    pub fn hours(&self) -> f64 {
        match *self {
            SleepEntry::Hours(hours) => hours,
            SleepEntry::Times { bed, wake } => hours_between(bed, wake),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendRequestOutcome {
    Sent,
    Updated,
}

/// Fields collected by the sign-up screen.
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub username: String,
}

pub struct Shleepy<C: Clock> {
    client: BackendClient,
    stats: StatsConfig,
    clock: Arc<C>,
}

impl<C: Clock> Shleepy<C> {
    pub fn new(client: BackendClient, stats: StatsConfig, clock: Arc<C>) -> Self {
        Self {
            client,
            stats,
            clock,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    // ==================== Accounts ====================

    /// Create an account and its profile row. The username must be free.
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<String> {
        if self
            .client
            .find_profile_by_username(None, &form.username)
            .await?
            .is_some()
        {
            return Err(ShleepyError::UsernameTaken(form.username.clone()).into());
        }

        let outcome = self.client.sign_up(&form.email, &form.password).await?;
        let profile = NewProfile {
            id: outcome.user_id.clone(),
            email: form.email.clone(),
            display_name: form.display_name.clone(),
            username: form.username.clone(),
            profile_picture: String::new(),
        };
        self.client
            .insert_profile(outcome.session.as_ref(), &profile)
            .await?;

        tracing::info!("Created account {} for @{}", outcome.user_id, form.username);
        Ok(outcome.user_id)
    }

    pub async fn profile(&self, session: &Session) -> Result<Option<Profile>> {
        self.client.fetch_profile(session, &session.user_id).await
    }

    pub async fn edit_profile(&self, session: &Session, update: &ProfileUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        if let Some(username) = &update.username {
            let existing = self
                .client
                .find_profile_by_username(Some(session), username)
                .await?;
            if existing.is_some_and(|p| p.id != session.user_id) {
                return Err(ShleepyError::UsernameTaken(username.clone()).into());
            }
        }
        self.client
            .update_profile(session, &session.user_id, update)
            .await?;
        tracing::info!("Updated profile for {}", session.user_id);
        Ok(())
    }

    // ==================== Sleep ====================

    /// Today's log for the signed-in user.
    pub async fn today(&self, session: &Session) -> Result<Option<SleepRecord>> {
        self.client
            .fetch_sleep_on(session, &session.user_id, self.clock.today())
            .await
    }

    /// Log a night for `date`, or today when no date is given.
    pub async fn log_sleep(
        &self,
        session: &Session,
        entry: SleepEntry,
        date: Option<NaiveDate>,
    ) -> Result<SleepRecord> {
        let hours = entry.hours();
        if !(0.0..=24.0).contains(&hours) {
            return Err(ShleepyError::InvalidHours(hours).into());
        }
        let log = NewSleepLog {
            user_id: session.user_id.clone(),
            sleep_date: date.unwrap_or_else(|| self.clock.today()),
            hours_slept: hours,
        };
        let stored = self.client.upsert_sleep(session, &log).await?;
        tracing::info!("Logged {:.2}h for {}", stored.hours_slept, stored.sleep_date);
        Ok(stored)
    }

    /// "Week in Review" for any user, the signed-in one or a friend.
    pub async fn week_in_review(&self, session: &Session, user_id: &str) -> Result<StatsSummary> {
        let records = self
            .client
            .fetch_recent_sleep(session, user_id, self.stats.week_window)
            .await?;
        Ok(compute_stats(&records))
    }

    pub async fn stats_page(&self, session: &Session) -> Result<StatsPage> {
        let records = self
            .client
            .fetch_recent_sleep(session, &session.user_id, self.stats.history_window)
            .await?;
        Ok(StatsPage {
            summary: compute_stats(&records),
            distribution: hour_distribution(&records),
            trend: recent_trend(&records, self.stats.trend_points),
            records,
        })
    }

    /// Full history window, for export.
    pub async fn history(&self, session: &Session) -> Result<Vec<SleepRecord>> {
        self.client
            .fetch_recent_sleep(session, &session.user_id, self.stats.history_window)
            .await
    }

    // ==================== Friends ====================

    pub async fn friends(&self, session: &Session) -> Result<Vec<String>> {
        let rows = self
            .client
            .fetch_friendships(session, &session.user_id, &[FriendshipStatus::Accepted])
            .await?;
        Ok(friend_ids(&rows, &session.user_id))
    }

    /// Friends ranked by how long they slept today. Used by both the sky
    /// and the leaderboard.
    pub async fn leaderboard(&self, session: &Session) -> Result<Vec<LeaderboardEntry>> {
        let ids = self.friends(session).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let today = self.clock.today();
        let logs = self
            .client
            .fetch_sleep_for_users_on(session, &ids, today)
            .await?;
        let profiles = self.client.fetch_profiles(session, &ids).await?;
        Ok(build_leaderboard(&ids, &profiles, &logs))
    }

    pub async fn friend_requests(&self, session: &Session) -> Result<Vec<FriendRequest>> {
        self.client
            .fetch_pending_requests(session, &session.user_id)
            .await
    }

    pub async fn suggestions(&self, session: &Session) -> Result<Vec<Profile>> {
        let users = self.client.fetch_all_profiles(session).await?;
        let rows = self
            .client
            .fetch_friendships(
                session,
                &session.user_id,
                &[FriendshipStatus::Accepted, FriendshipStatus::Pending],
            )
            .await?;
        Ok(suggest_friends(&users, &rows, &session.user_id))
    }

    pub async fn send_friend_request(
        &self,
        session: &Session,
        username: &str,
    ) -> Result<FriendRequestOutcome> {
        let target = self
            .client
            .find_profile_by_username(Some(session), username)
            .await?
            .ok_or_else(|| ShleepyError::UserNotFound(username.to_string()))?;

        let existing = self
            .client
            .find_friendship_between(session, &session.user_id, &target.id)
            .await?;

        match plan_friend_request(&session.user_id, &target.id, existing.as_ref())? {
            FriendRequestPlan::Create => {
                let friendship = NewFriendship {
                    user_id: session.user_id.clone(),
                    friend_id: target.id.clone(),
                    req_status: FriendshipStatus::Pending,
                };
                self.client.insert_friendship(session, &friendship).await?;
                tracing::info!("Friend request sent to @{}", username);
                Ok(FriendRequestOutcome::Sent)
            }
            FriendRequestPlan::Reopen(id) => {
                self.client
                    .set_friendship_status(session, id, FriendshipStatus::Pending)
                    .await?;
                tracing::info!("Friend request to @{} updated", username);
                Ok(FriendRequestOutcome::Updated)
            }
        }
    }

    /// Accept a pending request addressed to the signed-in user.
    pub async fn accept_request(&self, session: &Session, id: i64) -> Result<()> {
        self.client.accept_friend_request(session, id).await?;
        tracing::info!("Accepted friend request {}", id);
        Ok(())
    }

    pub async fn deny_request(&self, session: &Session, id: i64) -> Result<()> {
        self.client.delete_friend_request(session, id).await?;
        tracing::info!("Denied friend request {}", id);
        Ok(())
    }
}
