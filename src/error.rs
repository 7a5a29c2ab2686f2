use thiserror::Error;

/// Domain failures that callers branch on.
///
/// Transport and I/O problems travel as `anyhow::Error` with context; these
/// variants cover the cases a screen reacts to with a specific message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShleepyError {
    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Not signed in. Run `shleepy login` first")]
    NotSignedIn,
    #[error("Session expired. Run `shleepy login` again")]
    SessionExpired,
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("This username is already taken: {0}")]
    UsernameTaken(String),
    #[error("You are already friends!")]
    AlreadyFriends,
    #[error("You cannot send a friend request to yourself")]
    SelfFriendRequest,
    #[error("Friend request not found: {0}")]
    RequestNotFound(i64),
    #[error("Hours slept must be between 0 and 24, got {0}")]
    InvalidHours(f64),
}
