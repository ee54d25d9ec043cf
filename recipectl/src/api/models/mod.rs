//! API request and response data models.
//!
//! API models are distinct from the database models in [`crate::db::models`], so the wire
//! shape can evolve independently of storage. Request models carry their own field
//! validation, reported as [`FieldErrors`](crate::errors::FieldErrors) keyed by field name.
//!
//! - [`users`]: Signup, profile and admin user payloads, plus the authenticated [`users::CurrentUser`]
//! - [`auth`]: Token request/response
//! - [`labels`]: Tags and ingredients
//! - [`recipes`]: Recipes and their related-record references
//! - [`pagination`]: Offset pagination for admin listings

pub mod auth;
pub mod labels;
pub mod pagination;
pub mod recipes;
pub mod users;

/// Longest accepted value for short free-text fields (names, titles, links)
pub const MAX_TEXT_LENGTH: usize = 255;
