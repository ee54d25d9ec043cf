//! Database models for authentication tokens.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// A persisted token. Each user has at most one.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthTokenDBResponse {
    pub key: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}
