//! API request/response models for token issue.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Credentials exchanged for a token
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub email: String,
    /// Compared as given; surrounding whitespace is significant
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Send as `Authorization: Token <token>`
    pub token: String,
}
