use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl Profile {
    /// Name to show for this user, falling back to a shortened id.
    pub fn label(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => fallback_name(&self.id),
        }
    }
}

/// "Friend abcd" style placeholder built from the first four id characters.
pub fn fallback_name(user_id: &str) -> String {
    let short: String = user_id.chars().take(4).collect();
    format!("Friend {}", short)
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub username: String,
    pub profile_picture: String,
}

/// Partial update for the edit-profile screen. `None` fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.username.is_none()
    }
}

/// Value of the `req_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "pending",
            FriendshipStatus::Accepted => "accepted",
        }
    }
}

/// Row of the `friendships` table. `user_id` sent the request to `friend_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: i64,
    pub user_id: String,
    pub friend_id: String,
    pub req_status: FriendshipStatus,
}

impl Friendship {
    /// The user on the other side of this friendship from `me`.
    pub fn other_party(&self, me: &str) -> Option<&str> {
        if self.user_id == me {
            Some(self.friend_id.as_str())
        } else if self.friend_id == me {
            Some(self.user_id.as_str())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFriendship {
    pub user_id: String,
    pub friend_id: String,
    pub req_status: FriendshipStatus,
}

/// Requester details embedded in a pending request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequesterInfo {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Incoming friend request with the sender's profile joined in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FriendRequest {
    pub id: i64,
    pub user_id: String,
    pub friend_id: String,
    pub req_status: FriendshipStatus,
    #[serde(default)]
    pub requester: Option<RequesterInfo>,
}

/// Insert body for `sleep_logs`.
#[derive(Debug, Clone, Serialize)]
pub struct NewSleepLog {
    pub user_id: String,
    pub sleep_date: NaiveDate,
    pub hours_slept: f64,
}
