//! API layer
//!
//! HTTP handlers for:
//! - Board posts
//! - User profile
//! - Metrics (Prometheus)

mod board;
mod dto;
pub mod metrics;
mod user;

use axum::{Router, middleware, routing::get};

use crate::AppState;
use crate::auth::require_session;

pub use dto::*;
pub use metrics::metrics_router;

/// Routes that require a session
///
/// Every route here runs behind `require_session`, so handlers always see
/// an authenticated user.
pub fn protected_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/board", get(board::list_posts).post(board::create_post))
        .route(
            "/board/:id",
            get(board::get_post)
                .patch(board::update_post)
                .delete(board::delete_post),
        )
        .route("/user/me", get(user::me).patch(user::update_me))
        .layer(middleware::from_fn_with_state(state, require_session))
}
