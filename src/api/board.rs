//! Board endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::dto::{CreatePostRequest, PostResponse, UpdatePostRequest};
use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::data::{PostChanges, PostId};
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::PostService;

fn build_post_service(state: &AppState) -> PostService {
    PostService::new(
        state.users.clone(),
        state.posts.clone(),
        state.config.session.store_timeout(),
    )
}

fn record(method: &str, endpoint: &str, status: StatusCode) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, status.as_str()])
        .inc();
}

/// GET /board
pub async fn list_posts(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/board"])
        .start_timer();

    let posts = build_post_service(&state).list().await?;

    record("GET", "/board", StatusCode::OK);
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

/// GET /board/:id
pub async fn get_post(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/board/:id"])
        .start_timer();

    let post = build_post_service(&state).get(PostId(id)).await?;

    record("GET", "/board/:id", StatusCode::OK);
    Ok(Json(post.into()))
}

/// POST /board
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/board"])
        .start_timer();

    let post = build_post_service(&state)
        .create(user.id(), req.title, req.content)
        .await?;

    record("POST", "/board", StatusCode::CREATED);
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// PATCH /board/:id
///
/// Owner only.
pub async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["PATCH", "/board/:id"])
        .start_timer();

    let changes = PostChanges {
        title: req.title,
        content: req.content,
    };
    let post = build_post_service(&state)
        .update(user.id(), PostId(id), changes)
        .await?;

    record("PATCH", "/board/:id", StatusCode::OK);
    Ok(Json(post.into()))
}

/// DELETE /board/:id
///
/// Owner only.
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["DELETE", "/board/:id"])
        .start_timer();

    build_post_service(&state)
        .delete(user.id(), PostId(id))
        .await?;

    record("DELETE", "/board/:id", StatusCode::NO_CONTENT);
    Ok(StatusCode::NO_CONTENT)
}
