//! Tags and ingredients.
//!
//! Both resources behave identically apart from their table, so each route is a thin
//! wrapper over a shared implementation parameterized by [`LabelKind`].

use crate::{
    AppState,
    api::{
        PathParam, Payload,
        models::{
            labels::{LabelCreate, LabelResponse, LabelUpdate, ListLabelsQuery},
            users::CurrentUser,
        },
    },
    db::{
        handlers::{LabelFilter, Labels, Repository},
        models::labels::{LabelCreateDBRequest, LabelDBResponse, LabelKind, LabelUpdateDBRequest},
    },
    errors::{Error, Result},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use sqlx::SqliteConnection;

/// Load a label of the caller's; anything else reads as missing.
async fn get_owned(conn: &mut SqliteConnection, kind: LabelKind, id: i64, current_user: &CurrentUser) -> Result<LabelDBResponse> {
    Labels::new(conn, kind)
        .get_by_id(id)
        .await?
        .filter(|label| label.user_id == current_user.id)
        .ok_or_else(|| Error::NotFound {
            resource: kind.resource_name().to_string(),
            id: id.to_string(),
        })
}

async fn list(state: &AppState, kind: LabelKind, current_user: &CurrentUser, query: &ListLabelsQuery) -> Result<Vec<LabelResponse>> {
    let filter = LabelFilter::for_user(current_user.id).assigned_only(query.assigned_only()?);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let labels = Labels::new(&mut conn, kind).list(&filter).await?;

    Ok(labels.into_iter().map(LabelResponse::from).collect())
}

async fn create(state: &AppState, kind: LabelKind, current_user: &CurrentUser, request: &LabelCreate) -> Result<LabelResponse> {
    let name = request.validated_name()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let label = Labels::new(&mut conn, kind)
        .create(&LabelCreateDBRequest {
            user_id: current_user.id,
            name,
        })
        .await?;

    Ok(LabelResponse::from(label))
}

async fn update(state: &AppState, kind: LabelKind, id: i64, current_user: &CurrentUser, name: Option<String>) -> Result<LabelResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    get_owned(&mut conn, kind, id, current_user).await?;

    let label = Labels::new(&mut conn, kind).update(id, &LabelUpdateDBRequest { name }).await?;
    Ok(LabelResponse::from(label))
}

async fn delete(state: &AppState, kind: LabelKind, id: i64, current_user: &CurrentUser) -> Result<()> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    get_owned(&mut conn, kind, id, current_user).await?;

    Labels::new(&mut conn, kind).delete(id).await?;
    Ok(())
}

// Tags

/// List the caller's tags, by name descending
#[utoipa::path(
    get,
    path = "/recipe/tags",
    tag = "tags",
    summary = "List tags",
    params(ListLabelsQuery),
    responses(
        (status = 200, description = "The caller's tags", body = [LabelResponse]),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn list_tags(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListLabelsQuery>,
) -> Result<Json<Vec<LabelResponse>>> {
    Ok(Json(list(&state, LabelKind::Tag, &current_user, &query).await?))
}

#[utoipa::path(
    post,
    path = "/recipe/tags",
    tag = "tags",
    summary = "Create tag",
    request_body = LabelCreate,
    responses(
        (status = 201, description = "Tag created", body = LabelResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn create_tag(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Payload(request): Payload<LabelCreate>,
) -> Result<(StatusCode, Json<LabelResponse>)> {
    let tag = create(&state, LabelKind::Tag, &current_user, &request).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[utoipa::path(
    put,
    path = "/recipe/tags/{id}",
    tag = "tags",
    summary = "Replace tag",
    params(("id" = i64, Path, description = "Tag ID")),
    request_body = LabelCreate,
    responses(
        (status = 200, description = "Tag updated", body = LabelResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Tag not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, tag_id = id))]
pub async fn put_tag(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<i64>,
    Payload(request): Payload<LabelCreate>,
) -> Result<Json<LabelResponse>> {
    let name = request.validated_name()?;
    Ok(Json(update(&state, LabelKind::Tag, id, &current_user, Some(name)).await?))
}

#[utoipa::path(
    patch,
    path = "/recipe/tags/{id}",
    tag = "tags",
    summary = "Update tag",
    params(("id" = i64, Path, description = "Tag ID")),
    request_body = LabelUpdate,
    responses(
        (status = 200, description = "Tag updated", body = LabelResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Tag not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, tag_id = id))]
pub async fn patch_tag(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<i64>,
    Payload(request): Payload<LabelUpdate>,
) -> Result<Json<LabelResponse>> {
    let name = request.validated_name()?;
    Ok(Json(update(&state, LabelKind::Tag, id, &current_user, name).await?))
}

#[utoipa::path(
    delete,
    path = "/recipe/tags/{id}",
    tag = "tags",
    summary = "Delete tag",
    description = "Deleting a tag detaches it from every recipe; the recipes themselves are kept.",
    params(("id" = i64, Path, description = "Tag ID")),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Tag not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, tag_id = id))]
pub async fn delete_tag(State(state): State<AppState>, current_user: CurrentUser, PathParam(id): PathParam<i64>) -> Result<StatusCode> {
    delete(&state, LabelKind::Tag, id, &current_user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Ingredients

/// List the caller's ingredients, by name descending
#[utoipa::path(
    get,
    path = "/recipe/ingredients",
    tag = "ingredients",
    summary = "List ingredients",
    params(ListLabelsQuery),
    responses(
        (status = 200, description = "The caller's ingredients", body = [LabelResponse]),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListLabelsQuery>,
) -> Result<Json<Vec<LabelResponse>>> {
    Ok(Json(list(&state, LabelKind::Ingredient, &current_user, &query).await?))
}

#[utoipa::path(
    post,
    path = "/recipe/ingredients",
    tag = "ingredients",
    summary = "Create ingredient",
    request_body = LabelCreate,
    responses(
        (status = 201, description = "Ingredient created", body = LabelResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Payload(request): Payload<LabelCreate>,
) -> Result<(StatusCode, Json<LabelResponse>)> {
    let ingredient = create(&state, LabelKind::Ingredient, &current_user, &request).await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

#[utoipa::path(
    put,
    path = "/recipe/ingredients/{id}",
    tag = "ingredients",
    summary = "Replace ingredient",
    params(("id" = i64, Path, description = "Ingredient ID")),
    request_body = LabelCreate,
    responses(
        (status = 200, description = "Ingredient updated", body = LabelResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, ingredient_id = id))]
pub async fn put_ingredient(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<i64>,
    Payload(request): Payload<LabelCreate>,
) -> Result<Json<LabelResponse>> {
    let name = request.validated_name()?;
    Ok(Json(update(&state, LabelKind::Ingredient, id, &current_user, Some(name)).await?))
}

#[utoipa::path(
    patch,
    path = "/recipe/ingredients/{id}",
    tag = "ingredients",
    summary = "Update ingredient",
    params(("id" = i64, Path, description = "Ingredient ID")),
    request_body = LabelUpdate,
    responses(
        (status = 200, description = "Ingredient updated", body = LabelResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, ingredient_id = id))]
pub async fn patch_ingredient(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<i64>,
    Payload(request): Payload<LabelUpdate>,
) -> Result<Json<LabelResponse>> {
    let name = request.validated_name()?;
    Ok(Json(update(&state, LabelKind::Ingredient, id, &current_user, name).await?))
}

#[utoipa::path(
    delete,
    path = "/recipe/ingredients/{id}",
    tag = "ingredients",
    summary = "Delete ingredient",
    description = "Deleting an ingredient detaches it from every recipe; the recipes themselves are kept.",
    params(("id" = i64, Path, description = "Ingredient ID")),
    responses(
        (status = 204, description = "Ingredient deleted"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, ingredient_id = id))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode> {
    delete(&state, LabelKind::Ingredient, id, &current_user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::labels::LabelResponse;
    use crate::api::models::recipes::RecipeDetailResponse;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_tags_require_auth(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        app.get("/recipe/tags").await.assert_status_unauthorized();
        app.get("/recipe/ingredients").await.assert_status_unauthorized();
        app.post("/recipe/tags").json(&json!({"name": "Vegan"})).await.assert_status_unauthorized();
        app.delete("/recipe/tags/abc").await.assert_status_unauthorized();
        app.patch("/recipe/ingredients/abc")
            .json(&json!({"name": "Salt"}))
            .await
            .assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_tags_sorted_desc_and_owner_scoped(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let other = create_test_user(&pool, false).await;
        let (name, value) = auth_header(&create_test_token(&pool, user.id).await);
        let (other_name, other_value) = auth_header(&create_test_token(&pool, other.id).await);

        for tag in ["Dessert", "Vegan", "Breakfast"] {
            app.post("/recipe/tags")
                .add_header(name.clone(), value.clone())
                .json(&json!({"name": tag}))
                .await
                .assert_status(StatusCode::CREATED);
        }
        app.post("/recipe/tags")
            .add_header(other_name.clone(), other_value.clone())
            .json(&json!({"name": "Zesty"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = app.get("/recipe/tags").add_header(name, value).await;
        response.assert_status_ok();
        let tags: Vec<LabelResponse> = response.json();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Vegan", "Dessert", "Breakfast"]);

        let theirs: Vec<LabelResponse> = app.get("/recipe/tags").add_header(other_name, other_value).await.json();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].name, "Zesty");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_ingredient_trims_and_validates(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = auth_header(&create_test_token(&pool, user.id).await);

        let response = app
            .post("/recipe/ingredients")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "  Kale "}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let kale: LabelResponse = response.json();
        assert_eq!(kale.name, "Kale");

        app.post("/recipe/ingredients")
            .add_header(name, value)
            .json(&json!({"name": "   "}))
            .await
            .assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_delete_tag(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = auth_header(&create_test_token(&pool, user.id).await);

        let tag: LabelResponse = app
            .post("/recipe/tags")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Spicy"}))
            .await
            .json();

        let renamed: LabelResponse = app
            .put(&format!("/recipe/tags/{}", tag.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Mild"}))
            .await
            .json();
        assert_eq!(renamed, LabelResponse { id: tag.id, name: "Mild".to_string() });

        let unchanged: LabelResponse = app
            .patch(&format!("/recipe/tags/{}", tag.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({}))
            .await
            .json();
        assert_eq!(unchanged.name, "Mild");

        app.delete(&format!("/recipe/tags/{}", tag.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let tags: Vec<LabelResponse> = app.get("/recipe/tags").add_header(name.clone(), value.clone()).await.json();
        assert!(tags.is_empty());

        app.delete(&format!("/recipe/tags/{}", tag.id))
            .add_header(name, value)
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_other_users_tag_is_not_found(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let owner = create_test_user(&pool, false).await;
        let intruder = create_test_user(&pool, false).await;
        let (owner_name, owner_value) = auth_header(&create_test_token(&pool, owner.id).await);
        let (name, value) = auth_header(&create_test_token(&pool, intruder.id).await);

        let tag: LabelResponse = app
            .post("/recipe/tags")
            .add_header(owner_name.clone(), owner_value.clone())
            .json(&json!({"name": "Private"}))
            .await
            .json();

        app.patch(&format!("/recipe/tags/{}", tag.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Hijacked"}))
            .await
            .assert_status_not_found();
        app.delete(&format!("/recipe/tags/{}", tag.id))
            .add_header(name, value)
            .await
            .assert_status_not_found();

        let tags: Vec<LabelResponse> = app.get("/recipe/tags").add_header(owner_name, owner_value).await.json();
        assert_eq!(tags[0].name, "Private");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_assigned_only_filter(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = auth_header(&create_test_token(&pool, user.id).await);

        let breakfast: LabelResponse = app
            .post("/recipe/tags")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Breakfast"}))
            .await
            .json();
        app.post("/recipe/tags")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Lunch"}))
            .await
            .assert_status(StatusCode::CREATED);

        // Two recipes share the tag; it must still be listed once
        for title in ["Porridge", "Pancakes"] {
            let recipe: RecipeDetailResponse = app
                .post("/recipe/recipes")
                .add_header(name.clone(), value.clone())
                .json(&json!({"title": title, "time_minutes": 5, "price": "1.00", "tags": [breakfast.id]}))
                .await
                .json();
            assert_eq!(recipe.tags.len(), 1);
        }

        let assigned: Vec<LabelResponse> = app
            .get("/recipe/tags")
            .add_query_param("assigned_only", "1")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(assigned, vec![breakfast]);

        let all: Vec<LabelResponse> = app.get("/recipe/tags").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(all.len(), 2);

        app.get("/recipe/tags")
            .add_query_param("assigned_only", "maybe")
            .add_header(name, value)
            .await
            .assert_status_bad_request();
    }
}
