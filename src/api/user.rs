//! User endpoints

use axum::{extract::State, response::Json};

use super::dto::{UpdateProfileRequest, UserResponse};
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::UserService;

fn build_user_service(state: &AppState) -> UserService {
    UserService::new(state.users.clone(), state.config.session.store_timeout())
}

/// GET /user/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/user/me"])
        .start_timer();

    let profile = build_user_service(&state).get(user.id()).await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/user/me", "200"])
        .inc();
    Ok(Json(profile.into()))
}

/// PATCH /user/me
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["PATCH", "/user/me"])
        .start_timer();

    let profile = build_user_service(&state)
        .update_name(user.id(), &req.name)
        .await?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["PATCH", "/user/me", "200"])
        .inc();
    Ok(Json(profile.into()))
}
