//! E2E tests for board posts and ownership checks

mod common;

use common::TestServer;
use serde_json::json;

#[tokio::test]
async fn test_board_requires_session() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/board"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No session provided");
}

#[tokio::test]
async fn test_create_and_read_post() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    let response = server
        .client
        .post(server.url("/board"))
        .header("cookie", alice.cookie())
        .json(&json!({ "title": "Hello", "content": "First post" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: serde_json::Value = response.json().await.unwrap();
    assert_eq!(created["user_id"], alice.user_id.0);
    assert_eq!(created["title"], "Hello");

    let id = created["id"].as_i64().unwrap();
    let response = server
        .client
        .get(server.url(&format!("/board/{id}")))
        .header("cookie", alice.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let post: serde_json::Value = response.json().await.unwrap();
    assert_eq!(post["content"], "First post");
    assert_eq!(post["author"]["id"], alice.user_id.0);
    assert_eq!(post["author"]["name"], "User alice");
    assert_eq!(post["author"]["email"], "alice@gmail.com");
}

#[tokio::test]
async fn test_create_post_validates_fields() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    for body in [
        json!({ "title": "", "content": "x" }),
        json!({ "title": "t".repeat(256), "content": "x" }),
        json!({ "title": "ok", "content": "c".repeat(2001) }),
    ] {
        let response = server
            .client
            .post(server.url("/board"))
            .header("cookie", alice.cookie())
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 422);
    }
}

#[tokio::test]
async fn test_list_is_newest_first_with_authors() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let bob = server.login("bob").await;

    server.create_post(&alice, "from alice", "a").await;
    server.create_post(&bob, "from bob", "b").await;

    let response = server
        .client
        .get(server.url("/board"))
        .header("cookie", alice.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let posts: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["title"], "from bob");
    assert_eq!(posts[0]["author"]["name"], "User bob");
    assert_eq!(posts[1]["title"], "from alice");
}

#[tokio::test]
async fn test_owner_can_update_post() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let id = server.create_post(&alice, "Original", "Body").await;

    let response = server
        .client
        .patch(server.url(&format!("/board/{id}")))
        .header("cookie", alice.cookie())
        .json(&json!({ "title": "Updated" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let post: serde_json::Value = response.json().await.unwrap();
    assert_eq!(post["title"], "Updated");
    assert_eq!(post["content"], "Body");
    assert_eq!(post["user_id"], alice.user_id.0);
}

#[tokio::test]
async fn test_other_user_cannot_update_or_delete() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let bob = server.login("bob").await;
    let id = server.create_post(&alice, "Original", "Body").await;

    let response = server
        .client
        .patch(server.url(&format!("/board/{id}")))
        .header("cookie", bob.cookie())
        .json(&json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = server
        .client
        .delete(server.url(&format!("/board/{id}")))
        .header("cookie", bob.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Post unchanged
    let response = server
        .client
        .get(server.url(&format!("/board/{id}")))
        .header("cookie", alice.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let post: serde_json::Value = response.json().await.unwrap();
    assert_eq!(post["title"], "Original");
}

#[tokio::test]
async fn test_missing_post_is_not_found_for_everyone() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    for request in [
        server
            .client
            .get(server.url("/board/9999"))
            .header("cookie", alice.cookie()),
        server
            .client
            .patch(server.url("/board/9999"))
            .header("cookie", alice.cookie())
            .json(&json!({ "title": "x" })),
        server
            .client
            .delete(server.url("/board/9999"))
            .header("cookie", alice.cookie()),
    ] {
        let response = request.send().await.unwrap();
        assert_eq!(response.status(), 404);
    }
}

#[tokio::test]
async fn test_owner_can_delete_post() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;
    let id = server.create_post(&alice, "Short lived", "").await;

    let response = server
        .client
        .delete(server.url(&format!("/board/{id}")))
        .header("cookie", alice.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = server
        .client
        .get(server.url(&format!("/board/{id}")))
        .header("cookie", alice.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_user_profile_read_and_update() {
    let server = TestServer::new().await;
    let alice = server.login("alice").await;

    let response = server
        .client
        .get(server.url("/user/me"))
        .header("cookie", alice.cookie())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let me: serde_json::Value = response.json().await.unwrap();
    assert_eq!(me["id"], alice.user_id.0);
    assert_eq!(me["email"], "alice@gmail.com");
    assert!(me.get("external_id").is_none());

    let response = server
        .client
        .patch(server.url("/user/me"))
        .header("cookie", alice.cookie())
        .json(&json!({ "name": "Alice A." }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let me: serde_json::Value = response.json().await.unwrap();
    assert_eq!(me["name"], "Alice A.");

    let response = server
        .client
        .patch(server.url("/user/me"))
        .header("cookie", alice.cookie())
        .json(&json!({ "name": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
}
