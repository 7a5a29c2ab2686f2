use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::config::NetworkConfig;
use crate::error::ShleepyError;
use crate::models::{
    FriendRequest, Friendship, FriendshipStatus, NewFriendship, NewProfile, NewSleepLog, Profile,
    ProfileUpdate,
};
use crate::session::Session;
use crate::stats::SleepRecord;

const SLEEP_COLUMNS: &str = "user_id,sleep_date,hours_slept";
const FRIENDSHIP_COLUMNS: &str = "id,user_id,friend_id,req_status";
const PROFILE_COLUMNS: &str = "id,display_name,username,email,profile_picture";
const REQUEST_COLUMNS: &str =
    "id,user_id,friend_id,req_status,requester:users!fk_user_id(display_name,username)";

/// User object returned by the auth endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            email: self.user.email,
            expires_at,
        }
    }
}

/// Sign-up replies either with a full token response (auto-confirm) or with
/// the bare user object (email confirmation pending).
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Result of creating an account.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user_id: String,
    /// Present when the project confirms accounts immediately
    pub session: Option<Session>,
}

/// Error bodies differ between the auth and table endpoints.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct StatusUpdate {
    req_status: FriendshipStatus,
}

/// `in.(a,b,c)` filter value.
fn in_list<S: AsRef<str>>(values: &[S]) -> String {
    let joined = values
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({})", joined)
}

/// PostgREST filter matching the row sent by `from` to `to`.
fn pair(from: &str, to: &str) -> String {
    format!("and(user_id.eq.{},friend_id.eq.{})", from, to)
}

/// Client for the hosted backend: auth under `/auth/v1`, tables under `/rest/v1`.
#[derive(Clone, Debug)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl BackendClient {
    /// Create a new backend client with configurable timeouts.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        network_config: &NetworkConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Attach the project key and a bearer token. Without a session the
    /// anon key doubles as the token.
    fn authorize(&self, request: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
        let token = session
            .map(|s| s.access_token.as_str())
            .unwrap_or(&self.anon_key);
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }

    /// Turn a non-success status into [`ShleepyError::Api`].
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        Err(ShleepyError::Api {
            status: status.as_u16(),
            message,
        }
        .into())
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", what))?;
        let response = Self::check(response).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    async fn send_empty(request: RequestBuilder, what: &str) -> Result<()> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", what))?;
        Self::check(response).await?;
        Ok(())
    }

    // ==================== Auth ====================

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&Credentials { email, password });

        let token: TokenResponse = Self::send_json(request, "auth token").await?;
        Ok(token.into_session())
    }

    /// Create an auth account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let request = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&Credentials { email, password });

        let reply: SignUpResponse = Self::send_json(request, "auth signup").await?;
        let (user_id, user_email) = match (reply.user, reply.id) {
            (Some(user), _) => (user.id, user.email),
            (None, Some(id)) => (id, reply.email),
            (None, None) => anyhow::bail!("Signup response did not include a user id"),
        };

        let session = reply.access_token.map(|access_token| {
            TokenResponse {
                access_token,
                refresh_token: reply.refresh_token,
                expires_in: reply.expires_in,
                expires_at: reply.expires_at,
                user: AuthUser {
                    id: user_id.clone(),
                    email: user_email,
                },
            }
            .into_session()
        });

        Ok(SignUpOutcome { user_id, session })
    }

    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        let request = self.authorize(self.client.post(self.auth_url("logout")), Some(session));
        Self::send_empty(request, "auth logout").await
    }

    // ==================== Sleep Logs ====================

    /// Most recent logs for a user, newest first.
    pub async fn fetch_recent_sleep(
        &self,
        session: &Session,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SleepRecord>> {
        let request = self
            .authorize(self.client.get(self.table_url("sleep_logs")), Some(session))
            .query(&[
                ("select", SLEEP_COLUMNS.to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("order", "sleep_date.desc".to_string()),
                ("limit", limit.to_string()),
            ]);

        let records: Vec<SleepRecord> = Self::send_json(request, "sleep_logs").await?;
        tracing::debug!("Fetched {} sleep logs for {}", records.len(), user_id);
        Ok(records)
    }

    /// The log for one user on one date, if any.
    pub async fn fetch_sleep_on(
        &self,
        session: &Session,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<SleepRecord>> {
        let request = self
            .authorize(self.client.get(self.table_url("sleep_logs")), Some(session))
            .query(&[
                ("select", SLEEP_COLUMNS.to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("sleep_date", format!("eq.{}", date)),
                ("limit", "1".to_string()),
            ]);

        let records: Vec<SleepRecord> = Self::send_json(request, "sleep_logs").await?;
        Ok(records.into_iter().next())
    }

    /// Logs for several users on one date.
    pub async fn fetch_sleep_for_users_on(
        &self,
        session: &Session,
        user_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<SleepRecord>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .authorize(self.client.get(self.table_url("sleep_logs")), Some(session))
            .query(&[
                ("select", SLEEP_COLUMNS.to_string()),
                ("user_id", in_list(user_ids)),
                ("sleep_date", format!("eq.{}", date)),
            ]);

        Self::send_json(request, "sleep_logs").await
    }

    /// Insert a log, replacing any existing log for the same user and date.
    pub async fn upsert_sleep(&self, session: &Session, log: &NewSleepLog) -> Result<SleepRecord> {
        let request = self
            .authorize(self.client.post(self.table_url("sleep_logs")), Some(session))
            .query(&[("on_conflict", "user_id,sleep_date")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(log);

        let rows: Vec<SleepRecord> = Self::send_json(request, "sleep_logs").await?;
        rows.into_iter()
            .next()
            .context("Backend did not return the stored sleep log")
    }

    // ==================== Profiles ====================

    pub async fn fetch_profile(&self, session: &Session, user_id: &str) -> Result<Option<Profile>> {
        let request = self
            .authorize(self.client.get(self.table_url("users")), Some(session))
            .query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("id", format!("eq.{}", user_id)),
            ]);

        let rows: Vec<Profile> = Self::send_json(request, "users").await?;
        Ok(rows.into_iter().next())
    }

    /// Look up a user by username. Works before sign-in.
    pub async fn find_profile_by_username(
        &self,
        session: Option<&Session>,
        username: &str,
    ) -> Result<Option<Profile>> {
        let request = self
            .authorize(self.client.get(self.table_url("users")), session)
            .query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("username", format!("eq.{}", username)),
            ]);

        let rows: Vec<Profile> = Self::send_json(request, "users").await?;
        Ok(rows.into_iter().next())
    }

    pub async fn fetch_profiles(&self, session: &Session, ids: &[String]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .authorize(self.client.get(self.table_url("users")), Some(session))
            .query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("id", in_list(ids)),
            ]);

        Self::send_json(request, "users").await
    }

    pub async fn fetch_all_profiles(&self, session: &Session) -> Result<Vec<Profile>> {
        let request = self
            .authorize(self.client.get(self.table_url("users")), Some(session))
            .query(&[("select", PROFILE_COLUMNS)]);

        Self::send_json(request, "users").await
    }

    pub async fn insert_profile(
        &self,
        session: Option<&Session>,
        profile: &NewProfile,
    ) -> Result<()> {
        let request = self
            .authorize(self.client.post(self.table_url("users")), session)
            .header("Prefer", "return=minimal")
            .json(profile);

        Self::send_empty(request, "users").await
    }

    pub async fn update_profile(
        &self,
        session: &Session,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<()> {
        let request = self
            .authorize(self.client.patch(self.table_url("users")), Some(session))
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .json(update);

        Self::send_empty(request, "users").await
    }

    // ==================== Friendships ====================

    /// Friendships involving `me` in any of the given states.
    pub async fn fetch_friendships(
        &self,
        session: &Session,
        me: &str,
        statuses: &[FriendshipStatus],
    ) -> Result<Vec<Friendship>> {
        let statuses: Vec<&str> = statuses.iter().map(FriendshipStatus::as_str).collect();
        let request = self
            .authorize(self.client.get(self.table_url("friendships")), Some(session))
            .query(&[
                ("select", FRIENDSHIP_COLUMNS.to_string()),
                ("or", format!("(user_id.eq.{me},friend_id.eq.{me})")),
                ("req_status", in_list(&statuses)),
            ]);

        let rows: Vec<Friendship> = Self::send_json(request, "friendships").await?;
        tracing::debug!("Fetched {} friendships for {}", rows.len(), me);
        Ok(rows)
    }

    /// Pending requests addressed to `me`, with the sender's profile.
    pub async fn fetch_pending_requests(
        &self,
        session: &Session,
        me: &str,
    ) -> Result<Vec<FriendRequest>> {
        let request = self
            .authorize(self.client.get(self.table_url("friendships")), Some(session))
            .query(&[
                ("select", REQUEST_COLUMNS.to_string()),
                ("friend_id", format!("eq.{}", me)),
                ("req_status", "eq.pending".to_string()),
            ]);

        Self::send_json(request, "friendships").await
    }

    /// The friendship between two users in either direction.
    pub async fn find_friendship_between(
        &self,
        session: &Session,
        a: &str,
        b: &str,
    ) -> Result<Option<Friendship>> {
        let request = self
            .authorize(self.client.get(self.table_url("friendships")), Some(session))
            .query(&[
                ("select", FRIENDSHIP_COLUMNS.to_string()),
                ("or", format!("({},{})", pair(a, b), pair(b, a))),
                ("limit", "1".to_string()),
            ]);

        let rows: Vec<Friendship> = Self::send_json(request, "friendships").await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert_friendship(
        &self,
        session: &Session,
        friendship: &NewFriendship,
    ) -> Result<()> {
        let request = self
            .authorize(self.client.post(self.table_url("friendships")), Some(session))
            .header("Prefer", "return=minimal")
            .json(friendship);

        Self::send_empty(request, "friendships").await
    }

    /// Set the status of friendship `id`, whichever side sent it.
    pub async fn set_friendship_status(
        &self,
        session: &Session,
        id: i64,
        status: FriendshipStatus,
    ) -> Result<Friendship> {
        self.patch_friendship(session, id, &[("id", format!("eq.{}", id))], status)
            .await
    }

    /// Accept request `id`. Only rows addressed to the signed-in user match.
    pub async fn accept_friend_request(&self, session: &Session, id: i64) -> Result<Friendship> {
        let filters = [
            ("id", format!("eq.{}", id)),
            ("friend_id", format!("eq.{}", session.user_id)),
        ];
        self.patch_friendship(session, id, &filters, FriendshipStatus::Accepted)
            .await
    }

    /// Delete request `id`. Only rows addressed to the signed-in user match.
    pub async fn delete_friend_request(&self, session: &Session, id: i64) -> Result<()> {
        let request = self
            .authorize(self.client.delete(self.table_url("friendships")), Some(session))
            .query(&[
                ("id", format!("eq.{}", id)),
                ("friend_id", format!("eq.{}", session.user_id)),
            ])
            .header("Prefer", "return=representation");

        let rows: Vec<Friendship> = Self::send_json(request, "friendships").await?;
        if rows.is_empty() {
            return Err(ShleepyError::RequestNotFound(id).into());
        }
        Ok(())
    }

    async fn patch_friendship(
        &self,
        session: &Session,
        id: i64,
        filters: &[(&str, String)],
        status: FriendshipStatus,
    ) -> Result<Friendship> {
        let request = self
            .authorize(self.client.patch(self.table_url("friendships")), Some(session))
            .query(filters)
            .header("Prefer", "return=representation")
            .json(&StatusUpdate { req_status: status });

        let rows: Vec<Friendship> = Self::send_json(request, "friendships").await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ShleepyError::RequestNotFound(id).into())
    }
}
