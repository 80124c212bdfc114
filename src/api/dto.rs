//! API request and response DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{Post, PostId, User, UserId};
use crate::service::PostWithAuthor;

/// Signed-in user's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub profile_picture: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            profile_picture: user.profile_picture,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Public author info embedded in posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub profile_picture: String,
}

impl From<User> for AuthorResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            profile_picture: user.profile_picture,
        }
    }
}

/// Board post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: PostId,
    #[serde(rename = "user_id")]
    pub owner_id: UserId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorResponse>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            owner_id: post.owner_id,
            title: post.title,
            content: post.content,
            created_at: post.created_at,
            updated_at: post.updated_at,
            author: None,
        }
    }
}

impl From<PostWithAuthor> for PostResponse {
    fn from(value: PostWithAuthor) -> Self {
        Self {
            author: value.author.map(AuthorResponse::from),
            ..Self::from(value.post)
        }
    }
}

/// POST /board
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// PATCH /board/:id
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// PATCH /user/me
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}
