//! Authentication and authorization.
//!
//! Clients authenticate with an opaque token obtained from `POST /user/token`,
//! presented as `Authorization: Token <key>` (the `Bearer` scheme is accepted too).
//! Each user holds at most one token; it stays valid until the account is
//! deactivated.
//!
//! Authorization is deliberately thin: regular users may only touch records they
//! own, and the admin surface requires the staff flag.
//!
//! # Modules
//!
//! - [`current_user`]: Extractor resolving the request's token to a [`CurrentUser`](crate::api::models::users::CurrentUser)
//! - [`password`]: Password hashing and verification using Argon2
//! - [`permissions`]: Staff checks for the admin surface

pub mod current_user;
pub mod password;
pub mod permissions;
