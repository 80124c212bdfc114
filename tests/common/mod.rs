//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use postboard::auth::{ExternalIdentity, IdentityProvider};
use postboard::data::{Database, IdentityStore, MemorySessionStore, UserId};
use postboard::error::AppError;
use postboard::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Identity provider that trusts the authorization code as the user's handle
///
/// `code=alice` signs in as external id `google_alice`.
pub struct FakeIdentityProvider;

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        Ok(format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id=test-client-id&state={state}"
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, AppError> {
        if code == "rejected" {
            return Err(AppError::IdentityProvider(
                "token endpoint returned 400 Bad Request".to_string(),
            ));
        }

        Ok(ExternalIdentity {
            external_id: format!("google_{code}"),
            email: format!("{code}@gmail.com"),
            name: format!("User {code}"),
            picture_url: format!("https://lh3.googleusercontent.com/{code}.jpg"),
        })
    }
}

/// A signed-in test user
#[derive(Debug, Clone)]
pub struct TestSession {
    pub user_id: UserId,
    pub token: String,
}

impl TestSession {
    /// `Cookie` header value carrying the session
    pub fn cookie(&self) -> String {
        format!("session_id={}", self.token)
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub db: Arc<Database>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

/// Local development configuration pointing at `db_path`
pub fn test_config(db_path: std::path::PathBuf) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        database: config::DatabaseConfig {
            path: db_path,
            max_connections: 4,
        },
        session: config::SessionConfig {
            cookie_name: "session_id".to_string(),
            ttl_seconds: 86_400,
            store_timeout_ms: 2_000,
            max_entries: 10_000,
        },
        auth: config::AuthConfig {
            google: config::GoogleOAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_uri: "http://localhost/authentication/google/redirect".to_string(),
            },
            post_login_redirect: "http://localhost:3000".to_string(),
            allow_user_id_header: false,
        },
        cors: config::CorsConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default test configuration
    pub async fn with_config(adjust: impl FnOnce(&mut config::AppConfig)) -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path().join("test.db"));
        adjust(&mut config);

        let db = Arc::new(Database::connect(&config.database.path).await.unwrap());
        let sessions = Arc::new(MemorySessionStore::new(config.session.max_entries));
        let state = AppState::from_parts(
            config,
            db.clone(),
            db.clone(),
            sessions,
            Arc::new(FakeIdentityProvider),
        );

        // Create HTTP client
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = postboard::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            db,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Complete the OAuth callback as `handle` and return the session
    pub async fn login(&self, handle: &str) -> TestSession {
        let response = self
            .client
            .get(self.url(&format!(
                "/authentication/google/redirect?code={handle}&state=test-state"
            )))
            .header("cookie", "oauth_state=test-state")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 307, "login as {handle} failed");

        let token = session_cookie_value(&response).expect("session cookie");
        let user = self
            .db
            .find_user_by_external_id(&format!("google_{handle}"))
            .await
            .unwrap()
            .expect("reconciled user");

        TestSession {
            user_id: user.id,
            token,
        }
    }

    /// Create a post as `session` and return its id
    pub async fn create_post(&self, session: &TestSession, title: &str, content: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/board"))
            .header("cookie", session.cookie())
            .json(&serde_json::json!({ "title": title, "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let body: serde_json::Value = response.json().await.unwrap();
        body["id"].as_i64().expect("post id")
    }
}

/// Value of the `session_id` cookie set by a response, if any
pub fn session_cookie_value(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| cookie.strip_prefix("session_id="))
        .and_then(|rest| rest.split(';').next())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
