//! Postboard - a small message board with Google sign-in
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Google OAuth login / logout                              │
//! │  - Board and user endpoints behind require_session          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Auth Core + Service Layer                      │
//! │  - Identity reconciler, session issuer/authenticator        │
//! │  - Ownership guard, post and user services                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx): users, posts                              │
//! │  - Session store (moka, per-entry TTL)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for the board and user profile
//! - `auth`: Google OAuth, sessions, ownership checks
//! - `service`: Business logic layer
//! - `data`: Database and session store
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

use auth::{IdentityProvider, IdentityReconciler, SessionAuthenticator, SessionIssuer};
use data::{IdentityStore, PostRepository, SessionStore};

/// Largest accepted request body; posts are capped well below this
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across all handlers
///
/// Cloned for each request; every collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// User persistence
    pub users: Arc<dyn IdentityStore>,

    /// Post persistence
    pub posts: Arc<dyn PostRepository>,

    /// Session token -> user id, with TTL
    pub sessions: Arc<dyn SessionStore>,

    /// External sign-in
    pub identity_provider: Arc<dyn IdentityProvider>,

    pub reconciler: Arc<IdentityReconciler>,
    pub session_issuer: Arc<SessionIssuer>,
    pub authenticator: Arc<SessionAuthenticator>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Initialize the session store
    /// 3. Build the Google identity provider
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = data::Database::connect_with(
            &config.database.path,
            config.database.max_connections,
            config.session.store_timeout(),
        )
        .await?;
        metrics::USERS_TOTAL.set(db.count_users().await?);
        let db = Arc::new(db);
        tracing::info!("Database connected");

        // 2. Initialize the session store
        let sessions = Arc::new(data::MemorySessionStore::new(config.session.max_entries));
        tracing::info!(
            max_entries = config.session.max_entries,
            ttl_secs = config.session.ttl_seconds,
            "Session store initialized"
        );

        // 3. Build the identity provider
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Postboard/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;
        let identity_provider = Arc::new(auth::GoogleIdentityProvider::new(
            http_client,
            config.auth.google.clone(),
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self::from_parts(
            config,
            db.clone(),
            db,
            sessions,
            identity_provider,
        ))
    }

    /// Assemble state from explicit collaborators
    pub fn from_parts(
        config: config::AppConfig,
        users: Arc<dyn IdentityStore>,
        posts: Arc<dyn PostRepository>,
        sessions: Arc<dyn SessionStore>,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let store_timeout = config.session.store_timeout();

        Self {
            reconciler: Arc::new(IdentityReconciler::new(users.clone(), store_timeout)),
            session_issuer: Arc::new(SessionIssuer::new(
                sessions.clone(),
                config.session.ttl(),
                store_timeout,
            )),
            authenticator: Arc::new(SessionAuthenticator::new(sessions.clone(), store_timeout)),
            config: Arc::new(config),
            users,
            posts,
            sessions,
            identity_provider,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    let cors_layer = build_cors_layer(&state.config.cors);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::protected_router(state.clone()))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(cors: &config::CorsConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method};
    use tower_http::cors::{AllowHeaders, CorsLayer};

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::new();
    }

    // Credentialed CORS cannot use wildcards
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn health_check() -> &'static str {
    "OK"
}
