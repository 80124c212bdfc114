//! Register-or-login reconciliation
//!
//! Turns a verified external identity into the local `User` row, creating
//! it on first sight and refreshing profile and login metadata afterwards.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::data::{IdentityStore, NewUser, User, UserChanges, bounded};
use crate::error::AppError;
use crate::metrics::{LOGINS_TOTAL, USERS_TOTAL};

/// Identity asserted by the external provider
///
/// The provider is authoritative for the profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Stable subject id at the provider
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub picture_url: String,
}

/// Reconciles external identities with local users
pub struct IdentityReconciler {
    store: Arc<dyn IdentityStore>,
    store_timeout: Duration,
}

impl IdentityReconciler {
    pub fn new(store: Arc<dyn IdentityStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Return the local user for `identity`, creating it if needed.
    ///
    /// A concurrent first login for the same identity can win the insert;
    /// the unique constraint rejects ours and we refresh the winner's row
    /// instead of surfacing the conflict.
    ///
    /// # Errors
    /// `StoreUnavailable` when the identity store fails or times out.
    pub async fn reconcile(&self, identity: &ExternalIdentity) -> Result<User, AppError> {
        if identity.external_id.trim().is_empty() {
            return Err(AppError::Validation(
                "external identity id must not be empty".to_string(),
            ));
        }

        let existing = bounded(
            self.store_timeout,
            "identity_store",
            self.store.find_user_by_external_id(&identity.external_id),
        )
        .await?;

        if let Some(user) = existing {
            LOGINS_TOTAL.with_label_values(&["returning"]).inc();
            return self.refresh(user, identity).await;
        }

        let new_user = NewUser {
            external_id: identity.external_id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            profile_picture: identity.picture_url.clone(),
            created_at: Utc::now(),
        };

        match bounded(
            self.store_timeout,
            "identity_store",
            self.store.insert_user(&new_user),
        )
        .await
        {
            Ok(user) => {
                LOGINS_TOTAL.with_label_values(&["created"]).inc();
                USERS_TOTAL.inc();
                tracing::info!(user_id = %user.id, "Registered new user");
                Ok(user)
            }
            Err(AppError::Conflict(_)) => {
                tracing::debug!(
                    external_id = %identity.external_id,
                    "Concurrent first login won the insert; re-reading"
                );
                LOGINS_TOTAL.with_label_values(&["race"]).inc();
                let winner = bounded(
                    self.store_timeout,
                    "identity_store",
                    self.store.find_user_by_external_id(&identity.external_id),
                )
                .await?
                .ok_or_else(|| {
                    AppError::StoreUnavailable(
                        "user vanished after uniqueness conflict".to_string(),
                    )
                })?;
                self.refresh(winner, identity).await
            }
            Err(error) => Err(error),
        }
    }

    async fn refresh(&self, user: User, identity: &ExternalIdentity) -> Result<User, AppError> {
        let now = next_login_time(user.last_login_at, Utc::now());
        let changes = UserChanges {
            email: Some(identity.email.clone()),
            name: Some(identity.name.clone()),
            profile_picture: Some(identity.picture_url.clone()),
            last_login_at: Some(now),
            updated_at: now,
        };

        let refreshed = bounded(
            self.store_timeout,
            "identity_store",
            self.store.update_user_fields(user.id, &changes),
        )
        .await?;

        tracing::info!(user_id = %refreshed.id, "User logged in");
        Ok(refreshed)
    }
}

/// Login timestamps only move forward, even if the wall clock does not.
fn next_login_time(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(previous + ChronoDuration::microseconds(1))
}
