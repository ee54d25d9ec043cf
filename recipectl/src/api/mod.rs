//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Users** (`/user/*`): Signup, token issue, and the caller's own profile
//! - **Tags** (`/recipe/tags/*`): The caller's tags
//! - **Ingredients** (`/recipe/ingredients/*`): The caller's ingredients
//! - **Recipes** (`/recipe/recipes/*`): The caller's recipes and their images
//! - **Admin** (`/admin/users/*`): Staff-only user management
//!
//! All endpoints are documented with `utoipa`; the document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;

use axum::extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, PathRejection},
};

use crate::errors::Error;

/// JSON body extractor whose rejections render as our 400 error body instead of
/// axum's plain-text default.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Payload<T>(pub T);

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

/// Path extractor with the same error rendering as [`Payload`]. Handlers list it after
/// `CurrentUser` so that authentication is checked before the id is parsed.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct PathParam<T>(pub T);

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}
