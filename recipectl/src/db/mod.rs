//! Database layer for data persistence and access.
//!
//! Data access uses SQLx over SQLite and follows the repository pattern:
//!
//! ```text
//! API handlers → db::handlers (repositories) → db::models (records) → SQLite
//! ```
//!
//! - [`handlers`]: Repository implementations for CRUD operations
//! - [`models`]: Request/response structures exchanged with repositories
//! - [`errors`]: Database-specific error types
//!
//! ## Example Usage
//!
//! ```ignore
//! use recipectl::db::handlers::{Repository, Users};
//!
//! async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut users_repo = Users::new(&mut tx);
//!
//!     if let Some(user) = users_repo.get_user_by_email("user@example.com").await? {
//!         println!("Found user: {}", user.id);
//!     }
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
