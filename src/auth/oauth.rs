//! Google OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with Google and the
//! session cookie lifecycle around it.

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;

use crate::AppState;
use crate::config::AppConfig;
use crate::error::AppError;

/// Cookie carrying the CSRF state across the provider round trip
const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_PATH: &str = "/authentication";

/// Create authentication router
///
/// Routes:
/// - GET /authentication/google - Redirect to Google
/// - GET /authentication/google/redirect - OAuth callback
/// - POST /authentication/logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/authentication/google", get(google_redirect))
        .route("/authentication/google/redirect", get(google_callback))
        .route("/authentication/logout", post(logout))
}

// =============================================================================
// Google OAuth
// =============================================================================

/// GET /authentication/google
///
/// Stores a fresh CSRF state in a cookie and redirects to Google.
async fn google_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();
    let authorization_url = state.identity_provider.authorization_url(&csrf_state)?;

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, csrf_state))
        .path(OAUTH_STATE_PATH)
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to(&authorization_url)))
}

/// Query parameters from the Google callback
#[derive(Debug, Deserialize)]
struct GoogleCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Set when the user declined consent
    error: Option<String>,
}

/// GET /authentication/google/redirect
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for the user's identity
/// 3. Register or log in the local user
/// 4. Issue a session and set the cookie
/// 5. Redirect to the frontend
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(error) = query.error.as_deref() {
        tracing::info!(error = %error, "Google sign-in was not completed");
        return Err(AppError::Unauthorized);
    }

    verify_csrf_state(query.state.as_deref(), &jar)?;

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Validation("missing authorization code".to_string()))?;

    let identity = state.identity_provider.exchange_code(code).await?;
    let user = state.reconciler.reconcile(&identity).await?;
    let token = state.session_issuer.issue(user.id).await?;

    let jar = jar
        .remove(Cookie::build((OAUTH_STATE_COOKIE, "")).path(OAUTH_STATE_PATH))
        .add(session_cookie(&state.config, token.into_string()));

    tracing::info!(user_id = %user.id, "Google sign-in completed");

    Ok((
        jar,
        Redirect::temporary(&state.config.auth.post_login_redirect),
    ))
}

// =============================================================================
// Logout
// =============================================================================

/// POST /authentication/logout
///
/// Drops the session from the store and clears the cookie.
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let cookie_name = state.config.session.cookie_name.clone();

    if let Some(token) = jar.get(&cookie_name).map(|cookie| cookie.value().to_owned()) {
        if !token.is_empty() {
            state.session_issuer.revoke(&token).await?;
        }
    }

    let jar = jar.remove(Cookie::build((cookie_name, "")).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

// =============================================================================
// Helpers
// =============================================================================

fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.session.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .build()
}

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(state: Option<&str>, jar: &CookieJar) -> Result<(), AppError> {
    let expected = jar.get(OAUTH_STATE_COOKIE).map(|cookie| cookie.value());

    match (state, expected) {
        (Some(state), Some(expected)) if !state.is_empty() && state == expected => Ok(()),
        _ => {
            tracing::warn!("OAuth state mismatch");
            Err(AppError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ExternalIdentity, MockIdentityProvider};
    use crate::config::test_config;
    use crate::data::{
        Database, MemorySessionStore, MockIdentityStore, MockPostRepository, SessionStore, UserId,
    };
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn provider() -> MockIdentityProvider {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_authorization_url()
            .returning(|state| Ok(format!("https://accounts.example.com/auth?state={state}")));
        provider.expect_exchange_code().returning(|code| {
            Ok(ExternalIdentity {
                external_id: format!("google_{code}"),
                email: "newuser@gmail.com".to_string(),
                name: "New User".to_string(),
                picture_url: "https://example.com/photo.jpg".to_string(),
            })
        });
        provider
    }

    async fn sqlite_state() -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        let state = AppState::from_parts(
            test_config(),
            db.clone(),
            db,
            Arc::new(MemorySessionStore::new(16)),
            Arc::new(provider()),
        );
        (state, temp_dir)
    }

    fn set_cookies(response: &axum::response::Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok().map(ToOwned::to_owned))
            .collect()
    }

    #[test]
    fn csrf_states_are_random() {
        assert_ne!(generate_csrf_state(), generate_csrf_state());
    }

    #[test]
    fn csrf_state_must_match_cookie() {
        let jar = CookieJar::new().add(Cookie::new(OAUTH_STATE_COOKIE, "abc"));

        assert!(verify_csrf_state(Some("abc"), &jar).is_ok());
        assert!(verify_csrf_state(Some("xyz"), &jar).is_err());
        assert!(verify_csrf_state(None, &jar).is_err());
        assert!(verify_csrf_state(Some("abc"), &CookieJar::new()).is_err());
    }

    #[tokio::test]
    async fn login_redirect_sets_state_cookie() {
        let (state, _temp_dir) = sqlite_state().await;

        let response = auth_router()
            .with_state(state)
            .oneshot(
                Request::get("/authentication/google")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_owned();
        let cookies = set_cookies(&response);
        let state_cookie = cookies
            .iter()
            .find(|cookie| cookie.starts_with("oauth_state="))
            .expect("state cookie");
        let value = state_cookie
            .trim_start_matches("oauth_state=")
            .split(';')
            .next()
            .unwrap();
        assert!(location.ends_with(&format!("state={value}")));
    }

    #[tokio::test]
    async fn callback_issues_session_and_redirects() {
        let (state, _temp_dir) = sqlite_state().await;
        let redirect = state.config.auth.post_login_redirect.clone();
        let authenticator = state.authenticator.clone();

        let response = auth_router()
            .with_state(state)
            .oneshot(
                Request::get("/authentication/google/redirect?code=abc&state=s1")
                    .header(header::COOKIE, "oauth_state=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], redirect.as_str());

        let cookies = set_cookies(&response);
        let session = cookies
            .iter()
            .find(|cookie| cookie.starts_with("session_id="))
            .expect("session cookie");
        assert!(session.contains("HttpOnly"));
        assert!(session.contains("SameSite=Lax"));

        let token = session
            .trim_start_matches("session_id=")
            .split(';')
            .next()
            .unwrap();
        assert!(authenticator.authenticate(Some(token)).await.is_ok());
    }

    #[tokio::test]
    async fn callback_with_mismatched_state_is_unauthorized() {
        let (state, _temp_dir) = sqlite_state().await;

        let response = auth_router()
            .with_state(state)
            .oneshot(
                Request::get("/authentication/google/redirect?code=abc&state=forged")
                    .header(header::COOKIE, "oauth_state=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn callback_without_code_is_bad_request() {
        let (state, _temp_dir) = sqlite_state().await;

        let response = auth_router()
            .with_state(state)
            .oneshot(
                Request::get("/authentication/google/redirect?state=s1")
                    .header(header::COOKIE, "oauth_state=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_revokes_session() {
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(8));
        let state = AppState::from_parts(
            test_config(),
            Arc::new(MockIdentityStore::new()),
            Arc::new(MockPostRepository::new()),
            sessions,
            Arc::new(MockIdentityProvider::new()),
        );
        let token = state.session_issuer.issue(UserId(4)).await.unwrap();
        let authenticator = state.authenticator.clone();

        let response = auth_router()
            .with_state(state)
            .oneshot(
                Request::post("/authentication/logout")
                    .header(header::COOKIE, format!("session_id={}", token.as_str()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(
            set_cookies(&response)
                .iter()
                .any(|cookie| cookie.starts_with("session_id=;"))
        );
        assert!(matches!(
            authenticator.authenticate(Some(token.as_str())).await,
            Err(AppError::InvalidOrExpiredSession)
        ));
    }
}
