//! User service
//!
//! Profile reads and edits for the signed-in user.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::data::{IdentityStore, User, UserChanges, UserId, bounded};
use crate::error::AppError;

pub const MAX_NAME_CHARS: usize = 100;

/// User service
pub struct UserService {
    users: Arc<dyn IdentityStore>,
    store_timeout: Duration,
}

impl UserService {
    pub fn new(users: Arc<dyn IdentityStore>, store_timeout: Duration) -> Self {
        Self {
            users,
            store_timeout,
        }
    }

    /// Get a user by id
    pub async fn get(&self, id: UserId) -> Result<User, AppError> {
        bounded(
            self.store_timeout,
            "identity_store",
            self.users.find_user_by_id(id),
        )
        .await?
        .ok_or(AppError::NotFound)
    }

    /// Change the display name
    ///
    /// The provider refreshes the name on the next login.
    pub async fn update_name(&self, id: UserId, name: &str) -> Result<User, AppError> {
        let name = name.trim();
        let chars = name.chars().count();
        if chars == 0 || chars > MAX_NAME_CHARS {
            return Err(AppError::Unprocessable(format!(
                "name must be between 1 and {MAX_NAME_CHARS} characters"
            )));
        }

        let mut changes = UserChanges::touch(Utc::now());
        changes.name = Some(name.to_string());

        let user = bounded(
            self.store_timeout,
            "identity_store",
            self.users.update_user_fields(id, &changes),
        )
        .await?;

        tracing::info!(user_id = %id, "Profile updated");
        Ok(user)
    }
}
