//! E2E tests for session authentication

mod common;

use common::TestServer;
use postboard::data::{IdentityStore, NewUser};

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("cookie", "session_id=invalid-session-456")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid or expired session");
}

#[tokio::test]
async fn test_empty_session_cookie_is_no_session() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("cookie", "session_id=")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No session provided");
}

#[tokio::test]
async fn test_session_expires_after_ttl() {
    let server = TestServer::with_config(|config| config.session.ttl_seconds = 1).await;
    let alice = server.login("alice").await;

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("cookie", alice.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("cookie", alice.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid or expired session");
}

#[tokio::test]
async fn test_custom_cookie_name() {
    let server =
        TestServer::with_config(|config| config.session.cookie_name = "board_sid".to_string())
            .await;

    let response = server
        .client
        .get(server.url(
            "/authentication/google/redirect?code=alice&state=test-state",
        ))
        .header("cookie", "oauth_state=test-state")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 307);

    let token = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| cookie.strip_prefix("board_sid="))
        .and_then(|rest| rest.split(';').next())
        .map(ToOwned::to_owned)
        .expect("session cookie under configured name");

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("cookie", format!("board_sid={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_user_id_header_ignored_by_default() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("x-user-id", alice.user_id.0.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No session provided");
}

#[tokio::test]
async fn test_user_id_header_when_enabled() {
    let server =
        TestServer::with_config(|config| config.auth.allow_user_id_header = true).await;
    let user = server
        .db
        .insert_user(&NewUser {
            external_id: "google_dev".to_string(),
            email: "dev@example.com".to_string(),
            name: "Dev".to_string(),
            profile_picture: String::new(),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("x-user-id", user.id.0.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let me: serde_json::Value = response.json().await.unwrap();
    assert_eq!(me["name"], "Dev");

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("x-user-id", "424242")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}
