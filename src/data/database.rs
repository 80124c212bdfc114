//! SQLite database operations
//!
//! All database access goes through this module.
//! `Database` is the SQLite adapter for [`IdentityStore`] and [`PostRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prometheus::HistogramTimer;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

use super::models::*;
use super::repository::{IdentityStore, PostRepository};
use crate::error::AppError;
use crate::metrics::{DB_QUERIES_TOTAL, DB_QUERY_DURATION_SECONDS};

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Count the query and time it until the returned timer is dropped.
fn query_timer(operation: &str, table: &str) -> HistogramTimer {
    DB_QUERIES_TOTAL
        .with_label_values(&[operation, table])
        .inc();
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .start_timer()
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with(path, DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    /// Connect with an explicit pool size and store budget.
    ///
    /// The budget bounds both pool acquisition and waiting on a locked
    /// database; exhausting either surfaces as `StoreUnavailable`.
    pub async fn connect_with(
        path: &Path,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(acquire_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Number of registered users
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let _timer = query_timer("SELECT", "users");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Number of users registered under one external identity.
    ///
    /// Always 0 or 1 while the uniqueness constraint holds.
    pub async fn count_users_with_external_id(&self, external_id: &str) -> Result<i64, AppError> {
        let _timer = query_timer("SELECT", "users");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE external_id = ?")
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =========================================================================
// Users
// =========================================================================

#[async_trait]
impl IdentityStore for Database {
    async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, AppError> {
        let _timer = query_timer("SELECT", "users");
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, AppError> {
        let _timer = query_timer("SELECT", "users");
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Insert a new user
    ///
    /// A duplicate `external_id` fails the `UNIQUE` constraint and comes back
    /// as `AppError::Conflict`.
    async fn insert_user(&self, user: &NewUser) -> Result<User, AppError> {
        let _timer = query_timer("INSERT", "users");
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                external_id, email, name, profile_picture,
                created_at, updated_at, last_login_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&user.external_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.profile_picture)
        .bind(user.created_at)
        .bind(user.created_at)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn update_user_fields(
        &self,
        id: UserId,
        changes: &UserChanges,
    ) -> Result<User, AppError> {
        let _timer = query_timer("UPDATE", "users");
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE(?, email),
                name = COALESCE(?, name),
                profile_picture = COALESCE(?, profile_picture),
                last_login_at = COALESCE(?, last_login_at),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&changes.email)
        .bind(&changes.name)
        .bind(&changes.profile_picture)
        .bind(changes.last_login_at)
        .bind(changes.updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or(AppError::NotFound)
    }
}

// =========================================================================
// Posts
// =========================================================================

#[async_trait]
impl PostRepository for Database {
    async fn find_post_by_id(&self, id: PostId) -> Result<Option<Post>, AppError> {
        let _timer = query_timer("SELECT", "posts");
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, AppError> {
        let _timer = query_timer("SELECT", "posts");
        let posts = sqlx::query_as::<_, Post>("SELECT * FROM posts ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post, AppError> {
        let _timer = query_timer("INSERT", "posts");
        let inserted = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (owner_id, title, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(post.owner_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.created_at)
        .bind(post.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    /// Update title and/or content; `owner_id` is not part of the statement.
    async fn update_post(
        &self,
        id: PostId,
        changes: &PostChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Post, AppError> {
        let _timer = query_timer("UPDATE", "posts");
        let updated = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = COALESCE(?, title),
                content = COALESCE(?, content),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or(AppError::NotFound)
    }

    async fn delete_post(&self, id: PostId) -> Result<(), AppError> {
        let _timer = query_timer("DELETE", "posts");
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}
