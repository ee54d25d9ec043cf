//! Database repository for recipes and their tag/ingredient relations.

use std::str::FromStr;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        labels::{LabelDBResponse, LabelKind},
        recipes::{RecipeCreateDBRequest, RecipeDBResponse, RecipeUpdateDBRequest, normalize_price},
    },
};
use crate::types::{IngredientId, RecipeId, TagId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

/// Filter for listing recipes. Listings are always scoped to one owner.
#[derive(Debug, Clone)]
pub struct RecipeFilter {
    pub user_id: UserId,
    /// Keep recipes tagged with any of these tags
    pub tag_ids: Option<Vec<TagId>>,
    /// Keep recipes using any of these ingredients
    pub ingredient_ids: Option<Vec<IngredientId>>,
}

impl RecipeFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            tag_ids: None,
            ingredient_ids: None,
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Recipe {
    pub id: RecipeId,
    pub user_id: UserId,
    pub title: String,
    pub time_minutes: i64,
    pub price: String,
    pub link: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const RECIPE_COLUMNS: &str = "id, user_id, title, time_minutes, price, link, image, created_at, updated_at";

fn price_from_db(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| DbError::Other(anyhow::anyhow!("invalid stored price {raw:?}: {e}")))
}

fn price_to_db(price: Decimal) -> String {
    normalize_price(price).to_string()
}

/// Tags or ingredients attached to one recipe, in id order
async fn load_labels(db: &mut SqliteConnection, recipe_id: RecipeId, kind: LabelKind) -> Result<Vec<LabelDBResponse>> {
    let labels = sqlx::query_as::<_, LabelDBResponse>(&format!(
        "SELECT l.id, l.user_id, l.name FROM {table} l
         JOIN {join} j ON j.{column} = l.id
         WHERE j.recipe_id = ?
         ORDER BY l.id ASC",
        table = kind.table(),
        join = kind.join_table(),
        column = kind.join_column(),
    ))
    .bind(recipe_id)
    .fetch_all(db)
    .await?;

    Ok(labels)
}

/// Replace the recipe's relations of one kind with `ids`. Duplicates collapse to one row.
async fn replace_labels(db: &mut SqliteConnection, recipe_id: RecipeId, kind: LabelKind, ids: &[i64]) -> Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE recipe_id = ?", kind.join_table()))
        .bind(recipe_id)
        .execute(&mut *db)
        .await?;

    if ids.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "INSERT OR IGNORE INTO {} (recipe_id, {}) ",
        kind.join_table(),
        kind.join_column()
    ));
    query.push_values(ids, |mut row, id| {
        row.push_bind(recipe_id).push_bind(*id);
    });
    query.build().execute(&mut *db).await?;

    Ok(())
}

async fn hydrate(db: &mut SqliteConnection, recipe: Recipe) -> Result<RecipeDBResponse> {
    let tags = load_labels(&mut *db, recipe.id, LabelKind::Tag).await?;
    let ingredients = load_labels(&mut *db, recipe.id, LabelKind::Ingredient).await?;

    Ok(RecipeDBResponse {
        id: recipe.id,
        user_id: recipe.user_id,
        title: recipe.title,
        time_minutes: recipe.time_minutes,
        price: price_from_db(&recipe.price)?,
        link: recipe.link,
        image: recipe.image,
        tags,
        ingredients,
        created_at: recipe.created_at,
        updated_at: recipe.updated_at,
    })
}

pub struct Recipes<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Recipes<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Set or clear the stored image path, returning the previous one
    #[instrument(skip(self), err)]
    pub async fn set_image(&mut self, id: RecipeId, image: Option<&str>) -> Result<Option<String>> {
        let mut tx = self.db.begin().await?;

        let previous: Option<Option<String>> = sqlx::query_scalar("SELECT image FROM recipes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let previous = previous.ok_or(DbError::NotFound)?;

        sqlx::query("UPDATE recipes SET image = ?, updated_at = ? WHERE id = ?")
            .bind(image)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Recipes<'c> {
    type CreateRequest = RecipeCreateDBRequest;
    type UpdateRequest = RecipeUpdateDBRequest;
    type Response = RecipeDBResponse;
    type Id = RecipeId;
    type Filter = RecipeFilter;

    #[instrument(
        skip(self, request),
        fields(user_id = request.user_id, tags = request.tag_ids.len(), ingredients = request.ingredient_ids.len()),
        err
    )]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // The recipe and its relations land together or not at all
        let mut tx = self.db.begin().await?;
        let now = Utc::now();

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "INSERT INTO recipes (user_id, title, time_minutes, price, link, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(request.user_id)
        .bind(&request.title)
        .bind(request.time_minutes)
        .bind(price_to_db(request.price))
        .bind(&request.link)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        replace_labels(&mut tx, recipe.id, LabelKind::Tag, &request.tag_ids).await?;
        replace_labels(&mut tx, recipe.id, LabelKind::Ingredient, &request.ingredient_ids).await?;

        let response = hydrate(&mut tx, recipe).await?;
        tx.commit().await?;

        Ok(response)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match recipe {
            Some(recipe) => Ok(Some(hydrate(&mut *self.db, recipe).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(user_id = filter.user_id), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = "));
        query.push_bind(filter.user_id);

        for (kind, ids) in [(LabelKind::Tag, &filter.tag_ids), (LabelKind::Ingredient, &filter.ingredient_ids)] {
            let Some(ids) = ids else { continue };
            if ids.is_empty() {
                continue;
            }
            query.push(format!(
                " AND id IN (SELECT recipe_id FROM {} WHERE {} IN (",
                kind.join_table(),
                kind.join_column()
            ));
            let mut separated = query.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated("))");
        }

        query.push(" ORDER BY id DESC");

        let recipes: Vec<Recipe> = query.build_query_as().fetch_all(&mut *self.db).await?;

        let mut result = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            result.push(hydrate(&mut *self.db, recipe).await?);
        }
        Ok(result)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        // Join rows go with the recipe via ON DELETE CASCADE; tags and ingredients stay
        let result = sqlx::query("DELETE FROM recipes WHERE id = ?").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "UPDATE recipes SET
                title = COALESCE(?, title),
                time_minutes = COALESCE(?, time_minutes),
                price = COALESCE(?, price),
                link = COALESCE(?, link),
                updated_at = ?
             WHERE id = ?
             RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(&request.title)
        .bind(request.time_minutes)
        .bind(request.price.map(price_to_db))
        .bind(&request.link)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(tag_ids) = &request.tag_ids {
            replace_labels(&mut tx, id, LabelKind::Tag, tag_ids).await?;
        }
        if let Some(ingredient_ids) = &request.ingredient_ids {
            replace_labels(&mut tx, id, LabelKind::Ingredient, ingredient_ids).await?;
        }

        let response = hydrate(&mut tx, recipe).await?;
        tx.commit().await?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Labels;
    use crate::test_utils::create_test_user;
    use sqlx::SqlitePool;

    fn sample_request(user_id: UserId, title: &str) -> RecipeCreateDBRequest {
        RecipeCreateDBRequest {
            user_id,
            title: title.to_string(),
            time_minutes: 10,
            price: Decimal::from_str("5.00").unwrap(),
            link: String::new(),
            tag_ids: vec![],
            ingredient_ids: vec![],
        }
    }

    #[sqlx::test]
    async fn test_create_with_relations(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();

        let vegan = Labels::tags(&mut conn).get_or_create_by_name(user.id, "Vegan").await.unwrap();
        let dessert = Labels::tags(&mut conn).get_or_create_by_name(user.id, "Dessert").await.unwrap();
        let flour = Labels::ingredients(&mut conn).get_or_create_by_name(user.id, "Flour").await.unwrap();

        let mut request = sample_request(user.id, "Cake");
        request.tag_ids = vec![dessert.id, vegan.id, dessert.id];
        request.ingredient_ids = vec![flour.id];

        let recipe = Recipes::new(&mut conn).create(&request).await.unwrap();
        assert_eq!(recipe.title, "Cake");
        assert_eq!(recipe.price.to_string(), "5.00");
        assert_eq!(recipe.tags, vec![vegan.clone(), dessert.clone()]);
        assert_eq!(recipe.ingredients, vec![flour]);
        assert!(recipe.image.is_none());
    }

    #[sqlx::test]
    async fn test_create_rolls_back_on_bad_relation(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();

        let mut request = sample_request(user.id, "Broken");
        request.tag_ids = vec![424242];

        let err = Recipes::new(&mut conn).create(&request).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        let recipes = Recipes::new(&mut conn).list(&RecipeFilter::for_user(user.id)).await.unwrap();
        assert!(recipes.is_empty());
    }

    #[sqlx::test]
    async fn test_list_orders_by_id_desc_and_filters(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let other = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();

        let tag = Labels::tags(&mut conn).get_or_create_by_name(user.id, "Quick").await.unwrap();
        let salt = Labels::ingredients(&mut conn).get_or_create_by_name(user.id, "Salt").await.unwrap();

        let mut repo = Recipes::new(&mut conn);
        let first = repo.create(&sample_request(user.id, "First")).await.unwrap();
        let mut tagged = sample_request(user.id, "Tagged");
        tagged.tag_ids = vec![tag.id];
        let second = repo.create(&tagged).await.unwrap();
        let mut salted = sample_request(user.id, "Salted");
        salted.ingredient_ids = vec![salt.id];
        let third = repo.create(&salted).await.unwrap();
        repo.create(&sample_request(other.id, "Not mine")).await.unwrap();

        let all = repo.list(&RecipeFilter::for_user(user.id)).await.unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![third.id, second.id, first.id]);

        let by_tag = repo
            .list(&RecipeFilter {
                tag_ids: Some(vec![tag.id]),
                ..RecipeFilter::for_user(user.id)
            })
            .await
            .unwrap();
        assert_eq!(by_tag.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id]);

        let by_ingredient = repo
            .list(&RecipeFilter {
                ingredient_ids: Some(vec![salt.id]),
                ..RecipeFilter::for_user(user.id)
            })
            .await
            .unwrap();
        assert_eq!(by_ingredient.iter().map(|r| r.id).collect::<Vec<_>>(), vec![third.id]);
    }

    #[sqlx::test]
    async fn test_partial_update_keeps_relations(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let tag = Labels::tags(&mut conn).get_or_create_by_name(user.id, "Curry").await.unwrap();

        let mut request = sample_request(user.id, "Chicken tikka");
        request.tag_ids = vec![tag.id];
        let mut repo = Recipes::new(&mut conn);
        let recipe = repo.create(&request).await.unwrap();

        let updated = repo
            .update(
                recipe.id,
                &RecipeUpdateDBRequest {
                    title: Some("Chicken tikka masala".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Chicken tikka masala");
        assert_eq!(updated.time_minutes, 10);
        assert_eq!(updated.tags.len(), 1);

        let cleared = repo
            .update(
                recipe.id,
                &RecipeUpdateDBRequest {
                    tag_ids: Some(vec![]),
                    price: Some(Decimal::from_str("7.5").unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(cleared.tags.is_empty());
        assert_eq!(cleared.price.to_string(), "7.50");
    }

    #[sqlx::test]
    async fn test_delete_keeps_labels(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let tag = Labels::tags(&mut conn).get_or_create_by_name(user.id, "Soup").await.unwrap();

        let mut request = sample_request(user.id, "Minestrone");
        request.tag_ids = vec![tag.id];
        let recipe = Recipes::new(&mut conn).create(&request).await.unwrap();

        assert!(Recipes::new(&mut conn).delete(recipe.id).await.unwrap());
        assert!(Recipes::new(&mut conn).get_by_id(recipe.id).await.unwrap().is_none());
        assert!(Labels::tags(&mut conn).get_by_id(tag.id).await.unwrap().is_some());
    }

    #[sqlx::test]
    async fn test_set_image(pool: SqlitePool) {
        let user = create_test_user(&pool, false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Recipes::new(&mut conn);
        let recipe = repo.create(&sample_request(user.id, "Pancakes")).await.unwrap();

        assert_eq!(repo.set_image(recipe.id, Some("recipe/a.png")).await.unwrap(), None);
        assert_eq!(
            repo.set_image(recipe.id, Some("recipe/b.png")).await.unwrap().as_deref(),
            Some("recipe/a.png")
        );
        let fetched = repo.get_by_id(recipe.id).await.unwrap().unwrap();
        assert_eq!(fetched.image.as_deref(), Some("recipe/b.png"));

        assert!(matches!(repo.set_image(9999, None).await, Err(DbError::NotFound)));
    }
}
