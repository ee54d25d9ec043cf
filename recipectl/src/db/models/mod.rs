//! Request and response records exchanged with the repositories.
//!
//! API models are converted into `*DBRequest` values before reaching a repository, and
//! repositories hand back `*DBResponse` values that the API layer turns into response bodies.

pub mod auth_tokens;
pub mod labels;
pub mod recipes;
pub mod users;
