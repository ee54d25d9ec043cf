//! Database repository for opaque authentication tokens.

use crate::crypto::generate_token;
use crate::db::{
    errors::{DbError, Result},
    models::{auth_tokens::AuthTokenDBResponse, users::UserDBResponse},
};
use crate::db::handlers::users::User;
use crate::types::UserId;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

pub struct AuthTokens<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> AuthTokens<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Return the user's token, issuing one on first use.
    #[instrument(skip(self), err)]
    pub async fn get_or_create(&mut self, user_id: UserId) -> Result<AuthTokenDBResponse> {
        // Concurrent first requests race on the unique user_id; the loser keeps the winner's token
        sqlx::query("INSERT INTO auth_tokens (key, user_id, created_at) VALUES (?, ?, ?) ON CONFLICT (user_id) DO NOTHING")
            .bind(generate_token())
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *self.db)
            .await?;

        let token = sqlx::query_as::<_, AuthTokenDBResponse>("SELECT key, user_id, created_at FROM auth_tokens WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)?;

        Ok(token)
    }

    /// Resolve a presented token to its owner
    #[instrument(skip_all, err)]
    pub async fn get_user_by_key(&mut self, key: &str) -> Result<Option<UserDBResponse>> {
        let owner = sqlx::query_as::<_, User>(
            "SELECT u.id, u.email, u.name, u.password_hash, u.is_active, u.is_staff, u.created_at, u.updated_at
             FROM auth_tokens t
             INNER JOIN users u ON t.user_id = u.id
             WHERE t.key = ?",
        )
        .bind(key)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(owner.map(UserDBResponse::from))
    }

    /// Revoke the user's token, if any
    #[instrument(skip(self), err)]
    pub async fn delete_for_user(&mut self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;
    use sqlx::SqlitePool;

    #[sqlx::test]
    async fn test_token_is_stable_per_user(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let other = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = AuthTokens::new(&mut conn);

        let first = repo.get_or_create(user.id).await.unwrap();
        let second = repo.get_or_create(user.id).await.unwrap();
        assert_eq!(first.key, second.key);
        assert_eq!(first.user_id, user.id);

        let others = repo.get_or_create(other.id).await.unwrap();
        assert_ne!(first.key, others.key);
    }

    #[sqlx::test]
    async fn test_lookup_and_revoke(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = AuthTokens::new(&mut conn);

        let token = repo.get_or_create(user.id).await.unwrap();
        let owner = repo.get_user_by_key(&token.key).await.unwrap().unwrap();
        assert_eq!(owner.id, user.id);
        assert_eq!(owner.email, user.email);

        assert!(repo.get_user_by_key("not-a-token").await.unwrap().is_none());

        assert!(repo.delete_for_user(user.id).await.unwrap());
        assert!(repo.get_user_by_key(&token.key).await.unwrap().is_none());

        // A fresh token is issued after revocation
        let reissued = repo.get_or_create(user.id).await.unwrap();
        assert_ne!(reissued.key, token.key);
    }
}
