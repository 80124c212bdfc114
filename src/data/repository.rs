//! Storage collaborator traits
//!
//! Services depend on these traits rather than on `Database` so each
//! storage engine gets its own adapter and tests can swap in mocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

use super::models::{NewPost, NewUser, Post, PostChanges, PostId, User, UserChanges, UserId};
use crate::error::AppError;

/// Durable user storage
///
/// Implementations must reject a second row with the same `external_id`
/// by returning [`AppError::Conflict`] from [`IdentityStore::insert_user`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, AppError>;

    async fn insert_user(&self, user: &NewUser) -> Result<User, AppError>;

    /// Apply `changes` and return the updated row, `NotFound` if the id is unknown.
    async fn update_user_fields(&self, id: UserId, changes: &UserChanges)
    -> Result<User, AppError>;
}

/// Post storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_post_by_id(&self, id: PostId) -> Result<Option<Post>, AppError>;

    /// All posts, newest first.
    async fn list_posts(&self) -> Result<Vec<Post>, AppError>;

    async fn insert_post(&self, post: &NewPost) -> Result<Post, AppError>;

    /// Apply `changes` and return the updated row, `NotFound` if the id is unknown.
    async fn update_post(
        &self,
        id: PostId,
        changes: &PostChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Post, AppError>;

    /// `NotFound` if the id is unknown.
    async fn delete_post(&self, id: PostId) -> Result<(), AppError>;
}

/// Run a store call within `budget`.
///
/// An elapsed budget is reported as [`AppError::StoreUnavailable`]; the call
/// is dropped, not retried.
pub async fn bounded<T, F>(budget: Duration, store: &'static str, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(store, budget_ms = budget.as_millis() as u64, "Store call timed out");
            Err(AppError::StoreUnavailable(format!(
                "{store} did not answer within {}ms",
                budget.as_millis()
            )))
        }
    }
}
