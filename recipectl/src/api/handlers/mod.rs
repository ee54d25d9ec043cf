//! HTTP request handlers for all API endpoints.
//!
//! Handlers are organized by resource type. Each one validates its input, checks the
//! caller's identity (and staff flag where needed), calls into the repositories and
//! serializes the response.
//!
//! # Handler Modules
//!
//! - [`admin`]: Staff-only user management
//! - [`auth`]: Token issue
//! - [`labels`]: Tags and ingredients
//! - [`recipes`]: Recipes, their relations and images
//! - [`users`]: Signup and the caller's own profile
//!
//! # Authentication
//!
//! Everything except signup and token issue requires an `Authorization` header carrying
//! the issued token. See [`crate::auth::current_user`].

pub mod admin;
pub mod auth;
pub mod labels;
pub mod recipes;
pub mod users;
