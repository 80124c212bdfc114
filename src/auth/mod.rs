//! Authentication and authorization
//!
//! Handles:
//! - Google OAuth flow
//! - Identity reconciliation (register or log in)
//! - Session issuing and authentication
//! - Ownership checks for mutations

mod guard;
mod middleware;
mod oauth;
mod provider;
mod reconcile;
pub mod session;

pub use guard::{Authorization, Owned, authorize_mutation};
pub use middleware::{AuthenticatedUser, USER_ID_HEADER, require_session};
pub use oauth::auth_router;
pub use provider::{GoogleIdentityProvider, IdentityProvider};
pub use reconcile::{ExternalIdentity, IdentityReconciler};
pub use session::{SessionAuthenticator, SessionIssuer, SessionToken};

#[cfg(test)]
pub use provider::MockIdentityProvider;
