//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Handlers pass the authenticated user id in explicitly.

mod post;
mod user;

pub use post::{MAX_CONTENT_CHARS, MAX_TITLE_CHARS, PostService, PostWithAuthor};
pub use user::{MAX_NAME_CHARS, UserService};
