//! Integration tests for the backend client.
//!
//! These tests use wiremock to simulate the auth and table endpoints
//! and verify request shape, parsing and error handling.

use chrono::NaiveDate;
use shleepy::{
    ShleepyError,
    api::BackendClient,
    config::NetworkConfig,
    models::{FriendshipStatus, NewSleepLog},
    session::Session,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

const ANON_KEY: &str = "anon-key";

fn network() -> NetworkConfig {
    NetworkConfig {
        request_timeout_secs: 10,
        connect_timeout_secs: 5,
    }
}

fn session() -> Session {
    Session {
        access_token: "user-token".to_string(),
        refresh_token: None,
        user_id: "me".to_string(),
        email: None,
        expires_at: None,
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(server.uri(), ANON_KEY, &network()).expect("Client creation should succeed")
}

// ==================== Auth ====================

/// Test password sign-in produces a session.
#[tokio::test]
async fn test_sign_in_success() {
    let mock_server = MockServer::start().await;

    let body = r#"{
        "access_token": "jwt",
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": 1718452800,
        "refresh_token": "refresh",
        "user": {"id": "5eb30c35", "email": "sheep@example.com"}
    }"#;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", ANON_KEY))
        .and(body_json(serde_json::json!({
            "email": "sheep@example.com",
            "password": "baa"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let session = client(&mock_server)
        .await
        .sign_in("sheep@example.com", "baa")
        .await
        .expect("Sign in should succeed");

    assert_eq!(session.access_token, "jwt");
    assert_eq!(session.user_id, "5eb30c35");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
    assert!(session.expires_at.is_some());
}

/// Test rejected credentials surface the auth error message.
#[tokio::test]
async fn test_sign_in_invalid_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        ))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .await
        .sign_in("sheep@example.com", "wrong")
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ShleepyError>(),
        Some(&ShleepyError::Api {
            status: 400,
            message: "Invalid login credentials".to_string()
        })
    );
}

/// Test sign-up when the project requires email confirmation.
#[tokio::test]
async fn test_sign_up_without_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"id":"new-user","email":"lamb@example.com"}"#),
        )
        .mount(&mock_server)
        .await;

    let outcome = client(&mock_server)
        .await
        .sign_up("lamb@example.com", "baa")
        .await
        .unwrap();

    assert_eq!(outcome.user_id, "new-user");
    assert!(outcome.session.is_none());
}

/// Test sign-up when accounts are confirmed immediately.
#[tokio::test]
async fn test_sign_up_with_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"access_token":"jwt","expires_in":3600,"user":{"id":"new-user"}}"#,
        ))
        .mount(&mock_server)
        .await;

    let outcome = client(&mock_server)
        .await
        .sign_up("lamb@example.com", "baa")
        .await
        .unwrap();

    assert_eq!(outcome.user_id, "new-user");
    assert_eq!(outcome.session.map(|s| s.access_token), Some("jwt".to_string()));
}

// ==================== Sleep Logs ====================

/// Test the recent-logs query shape and parsing.
#[tokio::test]
async fn test_fetch_recent_sleep() {
    let mock_server = MockServer::start().await;

    let body = r#"[
        {"user_id": "me", "sleep_date": "2024-01-05", "hours_slept": 7.5},
        {"user_id": "me", "sleep_date": "2024-01-04", "hours_slept": 6}
    ]"#;

    Mock::given(method("GET"))
        .and(path("/rest/v1/sleep_logs"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", "Bearer user-token"))
        .and(query_param("user_id", "eq.me"))
        .and(query_param("order", "sleep_date.desc"))
        .and(query_param("limit", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let records = client(&mock_server)
        .await
        .fetch_recent_sleep(&session(), "me", 7)
        .await
        .expect("Fetch should succeed");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].sleep_date, date("2024-01-05"));
    assert_eq!(records[1].hours_slept, 6.0);
}

/// Test a missing log for a date is `None`, not an error.
#[tokio::test]
async fn test_fetch_sleep_on_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/sleep_logs"))
        .and(query_param("sleep_date", "eq.2024-01-05"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let record = client(&mock_server)
        .await
        .fetch_sleep_on(&session(), "me", date("2024-01-05"))
        .await
        .unwrap();

    assert!(record.is_none());
}

/// Test the multi-user filter uses `in.(...)`.
#[tokio::test]
async fn test_fetch_sleep_for_users_on() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/sleep_logs"))
        .and(query_param("user_id", "in.(a,b)"))
        .and(query_param("sleep_date", "eq.2024-11-28"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"user_id": "a", "sleep_date": "2024-11-28", "hours_slept": 8}]"#,
        ))
        .mount(&mock_server)
        .await;

    let ids = vec!["a".to_string(), "b".to_string()];
    let records = client(&mock_server)
        .await
        .fetch_sleep_for_users_on(&session(), &ids, date("2024-11-28"))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, "a");
}

/// Test an empty id list never hits the network.
#[tokio::test]
async fn test_fetch_sleep_for_no_users_skips_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let records = client(&mock_server)
        .await
        .fetch_sleep_for_users_on(&session(), &[], date("2024-11-28"))
        .await
        .unwrap();

    assert!(records.is_empty());
}

/// Test upsert requests merge on the user/date pair.
#[tokio::test]
async fn test_upsert_sleep() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/sleep_logs"))
        .and(query_param("on_conflict", "user_id,sleep_date"))
        .and(header(
            "prefer",
            "resolution=merge-duplicates,return=representation",
        ))
        .and(body_json(serde_json::json!({
            "user_id": "me",
            "sleep_date": "2024-01-05",
            "hours_slept": 7.5
        })))
        .respond_with(ResponseTemplate::new(201).set_body_string(
            r#"[{"user_id": "me", "sleep_date": "2024-01-05", "hours_slept": 7.5}]"#,
        ))
        .mount(&mock_server)
        .await;

    let log = NewSleepLog {
        user_id: "me".to_string(),
        sleep_date: date("2024-01-05"),
        hours_slept: 7.5,
    };
    let stored = client(&mock_server)
        .await
        .upsert_sleep(&session(), &log)
        .await
        .unwrap();

    assert_eq!(stored.hours_slept, 7.5);
}

// ==================== Friendships ====================

/// Test accepted/pending friendships are fetched for both directions.
#[tokio::test]
async fn test_fetch_friendships_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/friendships"))
        .and(query_param("or", "(user_id.eq.me,friend_id.eq.me)"))
        .and(query_param("req_status", "in.(accepted,pending)"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"id": 1, "user_id": "me", "friend_id": "bob", "req_status": "accepted"},
                {"id": 2, "user_id": "carol", "friend_id": "me", "req_status": "pending"}
            ]"#,
        ))
        .mount(&mock_server)
        .await;

    let rows = client(&mock_server)
        .await
        .fetch_friendships(
            &session(),
            "me",
            &[FriendshipStatus::Accepted, FriendshipStatus::Pending],
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].req_status, FriendshipStatus::Pending);
}

/// Test updating a friendship that no longer exists.
#[tokio::test]
async fn test_set_status_missing_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/friendships"))
        .and(query_param("id", "eq.42"))
        .and(body_json(serde_json::json!({"req_status": "accepted"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .await
        .set_friendship_status(&session(), 42, FriendshipStatus::Accepted)
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ShleepyError>(),
        Some(&ShleepyError::RequestNotFound(42))
    );
}

/// Test deleting a request addressed to the signed-in user.
#[tokio::test]
async fn test_delete_friend_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/friendships"))
        .and(query_param("id", "eq.7"))
        .and(query_param("friend_id", "eq.me"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"id": 7, "user_id": "carol", "friend_id": "me", "req_status": "pending"}]"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .await
        .delete_friend_request(&session(), 7)
        .await
        .expect("Delete should succeed");
}

// ==================== Error Handling ====================

/// Test handling of HTTP 500 errors.
#[tokio::test]
async fn test_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/sleep_logs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server)
        .await
        .fetch_recent_sleep(&session(), "me", 7)
        .await;

    assert!(result.is_err(), "Should fail on 500 error");
    let err = result.unwrap_err();
    assert!(
        err.to_string().contains("500"),
        "Error should mention status code"
    );
}

/// Test table errors carry the backend message.
#[tokio::test]
async fn test_table_error_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"code":"PGRST301","message":"JWT expired","details":null,"hint":null}"#,
        ))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .await
        .fetch_profile(&session(), "me")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Backend returned 401: JWT expired");
}

/// Test handling of malformed JSON response.
#[tokio::test]
async fn test_invalid_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/sleep_logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not valid json"))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server)
        .await
        .fetch_recent_sleep(&session(), "me", 7)
        .await;

    assert!(result.is_err(), "Should fail on invalid JSON");
}

/// Test rows missing required fields are rejected.
#[tokio::test]
async fn test_missing_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/sleep_logs"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"[{"sleep_date": "2024-01-05"}]"#),
        )
        .mount(&mock_server)
        .await;

    let result = client(&mock_server)
        .await
        .fetch_recent_sleep(&session(), "me", 7)
        .await;

    assert!(result.is_err(), "Should fail on missing fields");
}

/// Test client timeout behavior.
#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/sleep_logs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let config = NetworkConfig {
        request_timeout_secs: 1,
        connect_timeout_secs: 1,
    };
    let client = BackendClient::new(mock_server.uri(), ANON_KEY, &config).unwrap();
    let result = client.fetch_recent_sleep(&session(), "me", 7).await;

    assert!(result.is_err(), "Should timeout");
}
