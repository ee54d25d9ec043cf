//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed SQLite connection (or transaction) and exposes typed
//! operations returning models from [`crate::db::models`]:
//!
//! - [`Users`]: User accounts
//! - [`AuthTokens`]: Opaque per-user API tokens
//! - [`Labels`]: Tags and ingredients, which share one table shape
//! - [`Recipes`]: Recipes and their tag/ingredient relations
//!
//! ```ignore
//! use recipectl::db::handlers::{Labels, Repository};
//!
//! let mut conn = pool.acquire().await?;
//! let tags = Labels::tags(&mut conn).list(&LabelFilter::for_user(user_id)).await?;
//! ```

pub mod auth_tokens;
pub mod labels;
pub mod recipes;
pub mod repository;
pub mod users;

pub use auth_tokens::AuthTokens;
pub use labels::{LabelFilter, Labels};
pub use recipes::{RecipeFilter, Recipes};
pub use repository::Repository;
pub use users::{UserFilter, Users};
