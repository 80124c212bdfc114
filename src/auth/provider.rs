//! External identity providers
//!
//! The provider handshake is trusted input: whatever `exchange_code`
//! returns is taken as a verified identity.

use async_trait::async_trait;
use serde::Deserialize;

use super::reconcile::ExternalIdentity;
use crate::config::GoogleOAuthConfig;
use crate::error::AppError;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const GOOGLE_SCOPES: &str = "openid email profile";

/// OAuth 2.0 authorization-code identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to, carrying the CSRF `state`.
    fn authorization_url(&self, state: &str) -> Result<String, AppError>;

    /// Exchange an authorization code for the caller's identity.
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, AppError>;
}

/// Google token response
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

/// Google OpenID Connect userinfo
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

impl From<GoogleUserInfo> for ExternalIdentity {
    fn from(info: GoogleUserInfo) -> Self {
        Self {
            external_id: info.sub,
            email: info.email,
            name: info.name,
            picture_url: info.picture,
        }
    }
}

/// Google sign-in
pub struct GoogleIdentityProvider {
    client: reqwest::Client,
    config: GoogleOAuthConfig,
}

impl GoogleIdentityProvider {
    pub fn new(client: reqwest::Client, config: GoogleOAuthConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        let url = url::Url::parse_with_params(
            GOOGLE_AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", GOOGLE_SCOPES),
                ("state", state),
                ("access_type", "online"),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| AppError::Config(format!("invalid Google authorization URL: {e}")))?;

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, AppError> {
        // 1. Exchange the code for an access token
        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(%status, "Google token exchange rejected");
            return Err(AppError::IdentityProvider(format!(
                "token endpoint returned {status}"
            )));
        }
        let token: GoogleTokenResponse = response.json().await?;

        // 2. Fetch the profile
        let response = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(%status, "Google userinfo request rejected");
            return Err(AppError::IdentityProvider(format!(
                "userinfo endpoint returned {status}"
            )));
        }
        let info: GoogleUserInfo = response.json().await?;

        if info.sub.is_empty() {
            return Err(AppError::IdentityProvider(
                "userinfo response has no subject".to_string(),
            ));
        }

        Ok(info.into())
    }
}
