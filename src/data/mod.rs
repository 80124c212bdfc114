//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations (users, posts)
//! - Session store (volatile, expiring)
//! - Storage collaborator traits

mod database;
mod models;
mod repository;
mod session_store;

pub use database::Database;
pub use models::*;
pub use repository::{IdentityStore, PostRepository, bounded};
pub use session_store::{MemorySessionStore, SessionStore};

#[cfg(test)]
pub use repository::{MockIdentityStore, MockPostRepository};
#[cfg(test)]
pub use session_store::MockSessionStore;
