//! Database repository for users.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{UserId, mask_email};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

// Database entity model, shared with the token lookup join
#[derive(Debug, Clone, FromRow)]
pub(super) struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            is_active: user.is_active,
            is_staff: user.is_staff,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, password_hash, is_active, is_staff, created_at, updated_at";

pub struct Users<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Exact-match lookup. Callers normalize the address first.
    #[instrument(skip(self, email), fields(email = %mask_email(email)), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    /// Total number of users, for paginated listings
    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&mut *self.db).await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %mask_email(&request.email)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, password_hash, is_active, is_staff, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.email)
        .bind(&request.name)
        .bind(&request.password_hash)
        .bind(request.is_active)
        .bind(request.is_staff)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(UserDBResponse::from(user))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT ? OFFSET ?"))
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(UserDBResponse::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                email = COALESCE(?, email),
                name = COALESCE(?, name),
                password_hash = COALESCE(?, password_hash),
                is_active = COALESCE(?, is_active),
                is_staff = COALESCE(?, is_staff),
                updated_at = ?
             WHERE id = ?
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.email)
        .bind(&request.name)
        .bind(&request.password_hash)
        .bind(request.is_active)
        .bind(request.is_staff)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(UserDBResponse::from(user))
    }
}
