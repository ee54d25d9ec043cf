//! Database repository for tags and ingredients.

use std::collections::HashSet;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::labels::{LabelCreateDBRequest, LabelDBResponse, LabelKind, LabelUpdateDBRequest},
};
use crate::types::UserId;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

/// Filter for listing labels. Listings are always scoped to one owner.
#[derive(Debug, Clone)]
pub struct LabelFilter {
    pub user_id: UserId,
    /// Only return labels attached to at least one recipe
    pub assigned_only: bool,
}

impl LabelFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            assigned_only: false,
        }
    }

    pub fn assigned_only(mut self, assigned_only: bool) -> Self {
        self.assigned_only = assigned_only;
        self
    }
}

/// Repository over either the `tags` or the `ingredients` table.
pub struct Labels<'c> {
    db: &'c mut SqliteConnection,
    kind: LabelKind,
}

impl<'c> Labels<'c> {
    pub fn new(db: &'c mut SqliteConnection, kind: LabelKind) -> Self {
        Self { db, kind }
    }

    pub fn tags(db: &'c mut SqliteConnection) -> Self {
        Self::new(db, LabelKind::Tag)
    }

    pub fn ingredients(db: &'c mut SqliteConnection) -> Self {
        Self::new(db, LabelKind::Ingredient)
    }

    /// Return the user's label with this exact name, creating it if none exists.
    ///
    /// When several rows share the name the oldest one is used.
    #[instrument(skip(self), fields(kind = ?self.kind), err)]
    pub async fn get_or_create_by_name(&mut self, user_id: UserId, name: &str) -> Result<LabelDBResponse> {
        let existing = sqlx::query_as::<_, LabelDBResponse>(&format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = ? AND name = ? ORDER BY id ASC LIMIT 1",
            self.kind.table()
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut *self.db)
        .await?;

        match existing {
            Some(label) => Ok(label),
            None => {
                self.create(&LabelCreateDBRequest {
                    user_id,
                    name: name.to_string(),
                })
                .await
            }
        }
    }

    /// Of the given ids, return those that exist and belong to `user_id`.
    #[instrument(skip(self, ids), fields(kind = ?self.kind, count = ids.len()), err)]
    pub async fn owned_ids(&mut self, user_id: UserId, ids: &[i64]) -> Result<HashSet<i64>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT id FROM {} WHERE user_id = ", self.kind.table()));
        query.push_bind(user_id);
        query.push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let found: Vec<i64> = query.build_query_scalar().fetch_all(&mut *self.db).await?;
        Ok(found.into_iter().collect())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Labels<'c> {
    type CreateRequest = LabelCreateDBRequest;
    type UpdateRequest = LabelUpdateDBRequest;
    type Response = LabelDBResponse;
    type Id = i64;
    type Filter = LabelFilter;

    #[instrument(skip(self, request), fields(kind = ?self.kind, user_id = request.user_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let label = sqlx::query_as::<_, LabelDBResponse>(&format!(
            "INSERT INTO {} (user_id, name) VALUES (?, ?) RETURNING id, user_id, name",
            self.kind.table()
        ))
        .bind(request.user_id)
        .bind(&request.name)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(label)
    }

    #[instrument(skip(self), fields(kind = ?self.kind), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let label = sqlx::query_as::<_, LabelDBResponse>(&format!("SELECT id, user_id, name FROM {} WHERE id = ?", self.kind.table()))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(label)
    }

    #[instrument(skip(self, filter), fields(kind = ?self.kind, user_id = filter.user_id, assigned_only = filter.assigned_only), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let table = self.kind.table();
        let sql = if filter.assigned_only {
            format!(
                "SELECT DISTINCT l.id, l.user_id, l.name FROM {table} l
                 JOIN {join} j ON j.{column} = l.id
                 WHERE l.user_id = ?
                 ORDER BY l.name DESC, l.id DESC",
                join = self.kind.join_table(),
                column = self.kind.join_column(),
            )
        } else {
            format!("SELECT id, user_id, name FROM {table} WHERE user_id = ? ORDER BY name DESC, id DESC")
        };

        let labels = sqlx::query_as::<_, LabelDBResponse>(&sql)
            .bind(filter.user_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(labels)
    }

    #[instrument(skip(self), fields(kind = ?self.kind), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.kind.table()))
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(kind = ?self.kind), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let label = sqlx::query_as::<_, LabelDBResponse>(&format!(
            "UPDATE {} SET name = COALESCE(?, name) WHERE id = ? RETURNING id, user_id, name",
            self.kind.table()
        ))
        .bind(&request.name)
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;
    use sqlx::SqlitePool;

    #[sqlx::test]
    async fn test_list_is_owner_scoped_and_sorted_desc(pool: SqlitePool) {
        let alice = create_test_user(&pool, false).await;
        let bob = create_test_user(&pool, false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Labels::tags(&mut conn);
        for name in ["Dessert", "Vegan", "Breakfast"] {
            repo.create(&LabelCreateDBRequest {
                user_id: alice.id,
                name: name.to_string(),
            })
            .await
            .unwrap();
        }
        repo.create(&LabelCreateDBRequest {
            user_id: bob.id,
            name: "Zesty".to_string(),
        })
        .await
        .unwrap();

        let tags = repo.list(&LabelFilter::for_user(alice.id)).await.unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Vegan", "Dessert", "Breakfast"]);
        assert!(tags.iter().all(|t| t.user_id == alice.id));
    }

    #[sqlx::test]
    async fn test_tags_and_ingredients_are_separate_tables(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();

        Labels::ingredients(&mut conn)
            .create(&LabelCreateDBRequest {
                user_id: user.id,
                name: "Salt".to_string(),
            })
            .await
            .unwrap();

        let tags = Labels::tags(&mut conn).list(&LabelFilter::for_user(user.id)).await.unwrap();
        assert!(tags.is_empty());
        let ingredients = Labels::ingredients(&mut conn).list(&LabelFilter::for_user(user.id)).await.unwrap();
        assert_eq!(ingredients.len(), 1);
    }

    #[sqlx::test]
    async fn test_get_or_create_by_name_reuses_existing(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let other = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Labels::ingredients(&mut conn);

        let first = repo.get_or_create_by_name(user.id, "Flour").await.unwrap();
        let again = repo.get_or_create_by_name(user.id, "Flour").await.unwrap();
        assert_eq!(first.id, again.id);

        // Same name for a different owner is a different record
        let others = repo.get_or_create_by_name(other.id, "Flour").await.unwrap();
        assert_ne!(first.id, others.id);
        assert_eq!(others.user_id, other.id);
    }

    #[sqlx::test]
    async fn test_owned_ids_filters_foreign_and_missing(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let other = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Labels::tags(&mut conn);

        let mine = repo.get_or_create_by_name(user.id, "Mine").await.unwrap();
        let theirs = repo.get_or_create_by_name(other.id, "Theirs").await.unwrap();

        let owned = repo.owned_ids(user.id, &[mine.id, theirs.id, 9999]).await.unwrap();
        assert_eq!(owned, HashSet::from([mine.id]));
        assert!(repo.owned_ids(user.id, &[]).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn test_update_and_delete(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Labels::tags(&mut conn);

        let tag = repo.get_or_create_by_name(user.id, "Spicy").await.unwrap();
        let renamed = repo
            .update(
                tag.id,
                &LabelUpdateDBRequest {
                    name: Some("Mild".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Mild");

        let unchanged = repo.update(tag.id, &LabelUpdateDBRequest::default()).await.unwrap();
        assert_eq!(unchanged.name, "Mild");

        assert!(repo.delete(tag.id).await.unwrap());
        assert!(repo.get_by_id(tag.id).await.unwrap().is_none());
        assert!(matches!(repo.update(tag.id, &LabelUpdateDBRequest::default()).await, Err(DbError::NotFound)));
    }
}
