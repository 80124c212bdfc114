//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "board.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://board.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    8
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session token
    pub cookie_name: String,
    /// Session lifetime in the session store, in seconds (default: 86400)
    pub ttl_seconds: u64,
    /// Budget for a single identity/session store call, in milliseconds
    pub store_timeout_ms: u64,
    /// Upper bound on live sessions held by the in-process store
    pub max_entries: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Authentication configuration (Google OAuth)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub google: GoogleOAuthConfig,
    /// Where the browser is sent after a successful login
    pub post_login_redirect: String,
    /// Accept an `X-User-Id` header in place of a session cookie.
    ///
    /// Only for degraded or test deployments; refused on public domains.
    #[serde(default)]
    pub allow_user_id_header: bool,
}

/// Google OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with Google
    pub redirect_uri: String,
}

/// Cross-origin configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CorsConfig {
    /// Origins allowed to send credentialed requests
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (POSTBOARD__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/postboard.db")?
            .set_default("database.max_connections", 8)?
            .set_default("session.cookie_name", "session_id")?
            .set_default("session.ttl_seconds", 86400)?
            .set_default("session.store_timeout_ms", 2000)?
            .set_default("session.max_entries", 100_000)?
            .set_default("auth.post_login_redirect", "http://localhost:3000")?
            .set_default("auth.allow_user_id_header", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (POSTBOARD__*)
            .add_source(
                Environment::with_prefix("POSTBOARD")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.session.ttl_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "session.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.session.store_timeout_ms == 0 {
            return Err(crate::error::AppError::Config(
                "session.store_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.session.max_entries == 0 {
            return Err(crate::error::AppError::Config(
                "session.max_entries must be greater than 0".to_string(),
            ));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "session.cookie_name must not be empty".to_string(),
            ));
        }

        let local = is_local_server_domain(&self.server.domain);

        if self.auth.allow_user_id_header {
            if !local {
                return Err(crate::error::AppError::Config(
                    "auth.allow_user_id_header is only permitted for local server domains"
                        .to_string(),
                ));
            }
            tracing::warn!("X-User-Id header authentication is enabled; do not use in production");
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

/// Local development configuration used by unit tests
#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        database: DatabaseConfig {
            path: PathBuf::from("/tmp/postboard-test.db"),
            max_connections: 4,
        },
        session: SessionConfig {
            cookie_name: "session_id".to_string(),
            ttl_seconds: 86_400,
            store_timeout_ms: 2_000,
            max_entries: 1_000,
        },
        auth: AuthConfig {
            google: GoogleOAuthConfig {
                client_id: "google-client-id".to_string(),
                client_secret: "google-client-secret".to_string(),
                redirect_uri: "http://localhost:8080/authentication/google/redirect"
                    .to_string(),
            },
            post_login_redirect: "http://localhost:3000".to_string(),
            allow_user_id_header: false,
        },
        cors: CorsConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
