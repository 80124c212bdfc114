//! Post service
//!
//! Board posts: create, list, read, and owner-only update and delete.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::authorize_mutation;
use crate::data::{
    IdentityStore, NewPost, Post, PostChanges, PostId, PostRepository, User, UserId, bounded,
};
use crate::error::AppError;

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_CONTENT_CHARS: usize = 2000;

/// A post together with its author's profile
#[derive(Debug, Clone)]
pub struct PostWithAuthor {
    pub post: Post,
    /// `None` only if the author row is gone
    pub author: Option<User>,
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let chars = title.trim().chars().count();
    if chars == 0 {
        return Err(AppError::Unprocessable("title must not be empty".to_string()));
    }
    if chars > MAX_TITLE_CHARS {
        return Err(AppError::Unprocessable(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), AppError> {
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Unprocessable(format!(
            "content must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

/// Post service
pub struct PostService {
    users: Arc<dyn IdentityStore>,
    posts: Arc<dyn PostRepository>,
    store_timeout: Duration,
}

impl PostService {
    /// Create new post service
    pub fn new(
        users: Arc<dyn IdentityStore>,
        posts: Arc<dyn PostRepository>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            posts,
            store_timeout,
        }
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Create a post owned by `owner`
    pub async fn create(
        &self,
        owner: UserId,
        title: String,
        content: String,
    ) -> Result<Post, AppError> {
        validate_title(&title)?;
        validate_content(&content)?;

        let new_post = NewPost {
            owner_id: owner,
            title: title.trim().to_string(),
            content,
            created_at: Utc::now(),
        };

        let post = bounded(
            self.store_timeout,
            "post_store",
            self.posts.insert_post(&new_post),
        )
        .await?;

        tracing::info!(post_id = %post.id, owner_id = %owner, "Post created");
        Ok(post)
    }

    /// All posts, newest first, with author profiles
    pub async fn list(&self) -> Result<Vec<PostWithAuthor>, AppError> {
        let posts = bounded(self.store_timeout, "post_store", self.posts.list_posts()).await?;

        let mut authors: HashMap<UserId, Option<User>> = HashMap::new();
        for post in &posts {
            if !authors.contains_key(&post.owner_id) {
                let author = self.load_user(post.owner_id).await?;
                authors.insert(post.owner_id, author);
            }
        }

        Ok(posts
            .into_iter()
            .map(|post| {
                let author = authors.get(&post.owner_id).cloned().flatten();
                PostWithAuthor { post, author }
            })
            .collect())
    }

    /// A single post with its author
    pub async fn get(&self, id: PostId) -> Result<PostWithAuthor, AppError> {
        let post = self.load_post(id).await?.ok_or(AppError::NotFound)?;
        let author = self.load_user(post.owner_id).await?;
        Ok(PostWithAuthor { post, author })
    }

    /// Update a post on behalf of `actor`
    ///
    /// The ownership check runs before any write; a rejected request leaves
    /// the post untouched.
    pub async fn update(
        &self,
        actor: UserId,
        id: PostId,
        changes: PostChanges,
    ) -> Result<Post, AppError> {
        if let Some(title) = changes.title.as_deref() {
            validate_title(title)?;
        }
        if let Some(content) = changes.content.as_deref() {
            validate_content(content)?;
        }

        let existing = self.load_post(id).await?;
        if let Err(error) = authorize_mutation(actor, existing.as_ref()).into_result() {
            tracing::info!(post_id = %id, actor = %actor, error = %error, "Post update rejected");
            return Err(error);
        }

        if changes.is_empty() {
            return existing.ok_or(AppError::NotFound);
        }

        let changes = PostChanges {
            title: changes.title.map(|title| title.trim().to_string()),
            content: changes.content,
        };
        let post = bounded(
            self.store_timeout,
            "post_store",
            self.posts.update_post(id, &changes, Utc::now()),
        )
        .await?;

        tracing::info!(post_id = %id, "Post updated");
        Ok(post)
    }

    /// Delete a post on behalf of `actor`
    pub async fn delete(&self, actor: UserId, id: PostId) -> Result<(), AppError> {
        let existing = self.load_post(id).await?;
        if let Err(error) = authorize_mutation(actor, existing.as_ref()).into_result() {
            tracing::info!(post_id = %id, actor = %actor, error = %error, "Post delete rejected");
            return Err(error);
        }

        bounded(self.store_timeout, "post_store", self.posts.delete_post(id)).await?;

        tracing::info!(post_id = %id, "Post deleted");
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_post(&self, id: PostId) -> Result<Option<Post>, AppError> {
        bounded(
            self.store_timeout,
            "post_store",
            self.posts.find_post_by_id(id),
        )
        .await
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        bounded(
            self.store_timeout,
            "identity_store",
            self.users.find_user_by_id(id),
        )
        .await
    }
}
