use std::collections::HashSet;

use crate::{
    AppState,
    api::{
        PathParam, Payload,
        models::{
            labels::clean_name,
            recipes::{
                ListRecipesQuery, RecipeCreate, RecipeDetailResponse, RecipeImageResponse, RecipeResponse, RecipeUpdate, RelatedRef,
                media_url,
            },
            users::CurrentUser,
        },
    },
    db::{
        handlers::{Labels, RecipeFilter, Recipes, Repository},
        models::{
            labels::LabelKind,
            recipes::{RecipeCreateDBRequest, RecipeDBResponse, RecipeUpdateDBRequest},
        },
    },
    errors::{Error, FieldErrors, Result},
    media::{ImageFormat, MediaStore},
    types::{RecipeId, UserId},
};
use axum::{
    extract::{Multipart, Query, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Json,
};
use sqlx::SqliteConnection;

/// Load a recipe of the caller's; anything else reads as missing.
async fn get_owned(conn: &mut SqliteConnection, id: RecipeId, current_user: &CurrentUser) -> Result<RecipeDBResponse> {
    Recipes::new(conn)
        .get_by_id(id)
        .await?
        .filter(|recipe| recipe.user_id == current_user.id)
        .ok_or_else(|| Error::NotFound {
            resource: "Recipe".to_string(),
            id: id.to_string(),
        })
}

/// Record an error on `field` for every referenced id that is missing or someone else's
async fn check_owned_ids(
    conn: &mut SqliteConnection,
    kind: LabelKind,
    field: &str,
    user_id: UserId,
    refs: &[RelatedRef],
    errors: &mut FieldErrors,
) -> Result<()> {
    let ids: Vec<i64> = refs
        .iter()
        .filter_map(|r| match r {
            RelatedRef::Id(id) => Some(*id),
            RelatedRef::Named { .. } => None,
        })
        .collect();

    let owned = Labels::new(conn, kind).owned_ids(user_id, &ids).await?;
    for id in ids.iter().filter(|id| !owned.contains(id)) {
        errors.add(field, format!("Invalid pk \"{id}\" - object does not exist."));
    }
    Ok(())
}

/// Turn references into ids, creating named records the caller doesn't have yet.
/// Order of first mention is kept and repeats are dropped.
async fn resolve_refs(conn: &mut SqliteConnection, kind: LabelKind, field: &str, user_id: UserId, refs: &[RelatedRef]) -> Result<Vec<i64>> {
    let mut labels = Labels::new(conn, kind);
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(refs.len());

    for reference in refs {
        let id = match reference {
            RelatedRef::Id(id) => *id,
            RelatedRef::Named { name } => {
                let name = clean_name(name).map_err(|message| Error::from(FieldErrors::single(field, message)))?;
                labels.get_or_create_by_name(user_id, &name).await?.id
            }
        };
        if seen.insert(id) {
            ids.push(id);
        }
    }

    Ok(ids)
}

/// Ownership-check then resolve whichever relation lists were supplied.
async fn resolve_relations(
    conn: &mut SqliteConnection,
    user_id: UserId,
    tags: Option<&[RelatedRef]>,
    ingredients: Option<&[RelatedRef]>,
) -> Result<(Option<Vec<i64>>, Option<Vec<i64>>)> {
    let mut errors = FieldErrors::new();
    if let Some(tags) = tags {
        check_owned_ids(conn, LabelKind::Tag, "tags", user_id, tags, &mut errors).await?;
    }
    if let Some(ingredients) = ingredients {
        check_owned_ids(conn, LabelKind::Ingredient, "ingredients", user_id, ingredients, &mut errors).await?;
    }
    errors.into_result()?;

    let tag_ids = match tags {
        Some(tags) => Some(resolve_refs(conn, LabelKind::Tag, "tags", user_id, tags).await?),
        None => None,
    };
    let ingredient_ids = match ingredients {
        Some(ingredients) => Some(resolve_refs(conn, LabelKind::Ingredient, "ingredients", user_id, ingredients).await?),
        None => None,
    };

    Ok((tag_ids, ingredient_ids))
}

/// List the caller's recipes, newest first
#[utoipa::path(
    get,
    path = "/recipe/recipes",
    tag = "recipes",
    summary = "List recipes",
    params(ListRecipesQuery),
    responses(
        (status = 200, description = "The caller's recipes", body = [RecipeResponse]),
        (status = 400, description = "Malformed filter", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn list_recipes(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListRecipesQuery>,
) -> Result<Json<Vec<RecipeResponse>>> {
    let filter = RecipeFilter {
        tag_ids: query.tag_ids()?,
        ingredient_ids: query.ingredient_ids()?,
        ..RecipeFilter::for_user(current_user.id)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipes = Recipes::new(&mut conn).list(&filter).await?;

    Ok(Json(recipes.into_iter().map(RecipeResponse::from).collect()))
}

/// Create a recipe, attaching tags and ingredients by id or by name
#[utoipa::path(
    post,
    path = "/recipe/recipes",
    tag = "recipes",
    summary = "Create recipe",
    request_body = RecipeCreate,
    responses(
        (status = 201, description = "Recipe created", body = RecipeDetailResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn create_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Payload(request): Payload<RecipeCreate>,
) -> Result<(StatusCode, Json<RecipeDetailResponse>)> {
    request.validate()?;

    // Named references created here must not outlive a failed recipe insert
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (tag_ids, ingredient_ids) = resolve_relations(&mut tx, current_user.id, Some(&request.tags), Some(&request.ingredients)).await?;

    let recipe = Recipes::new(&mut tx)
        .create(&RecipeCreateDBRequest {
            user_id: current_user.id,
            title: request.title,
            time_minutes: request.time_minutes,
            price: request.price,
            link: request.link,
            tag_ids: tag_ids.unwrap_or_default(),
            ingredient_ids: ingredient_ids.unwrap_or_default(),
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::debug!(recipe_id = recipe.id, "Recipe created");
    Ok((StatusCode::CREATED, Json(RecipeDetailResponse::new(recipe, &state.config.media.url_prefix))))
}

/// Get one of the caller's recipes with its tags and ingredients expanded
#[utoipa::path(
    get,
    path = "/recipe/recipes/{id}",
    tag = "recipes",
    summary = "Get recipe",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe detail", body = RecipeDetailResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, recipe_id = id))]
pub async fn get_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<RecipeId>,
) -> Result<Json<RecipeDetailResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = get_owned(&mut conn, id, &current_user).await?;

    Ok(Json(RecipeDetailResponse::new(recipe, &state.config.media.url_prefix)))
}

async fn update_recipe(state: &AppState, id: RecipeId, current_user: &CurrentUser, request: RecipeUpdate) -> Result<RecipeDetailResponse> {
    request.validate()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    get_owned(&mut tx, id, current_user).await?;

    let (tag_ids, ingredient_ids) =
        resolve_relations(&mut tx, current_user.id, request.tags.as_deref(), request.ingredients.as_deref()).await?;

    let recipe = Recipes::new(&mut tx)
        .update(
            id,
            &RecipeUpdateDBRequest {
                title: request.title,
                time_minutes: request.time_minutes,
                price: request.price,
                link: request.link,
                tag_ids,
                ingredient_ids,
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(RecipeDetailResponse::new(recipe, &state.config.media.url_prefix))
}

/// Replace a recipe. Omitted `link` resets to empty; omitted relation lists clear the relations.
#[utoipa::path(
    put,
    path = "/recipe/recipes/{id}",
    tag = "recipes",
    summary = "Replace recipe",
    params(("id" = i64, Path, description = "Recipe ID")),
    request_body = RecipeCreate,
    responses(
        (status = 200, description = "Recipe updated", body = RecipeDetailResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, recipe_id = id))]
pub async fn put_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<RecipeId>,
    Payload(request): Payload<RecipeCreate>,
) -> Result<Json<RecipeDetailResponse>> {
    Ok(Json(update_recipe(&state, id, &current_user, request.into()).await?))
}

/// Update some fields of a recipe
#[utoipa::path(
    patch,
    path = "/recipe/recipes/{id}",
    tag = "recipes",
    summary = "Update recipe",
    params(("id" = i64, Path, description = "Recipe ID")),
    request_body = RecipeUpdate,
    responses(
        (status = 200, description = "Recipe updated", body = RecipeDetailResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, recipe_id = id))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<RecipeId>,
    Payload(request): Payload<RecipeUpdate>,
) -> Result<Json<RecipeDetailResponse>> {
    Ok(Json(update_recipe(&state, id, &current_user, request).await?))
}

#[utoipa::path(
    delete,
    path = "/recipe/recipes/{id}",
    tag = "recipes",
    summary = "Delete recipe",
    description = "Tags and ingredients attached to the recipe are kept.",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, recipe_id = id))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<RecipeId>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = get_owned(&mut conn, id, &current_user).await?;

    Recipes::new(&mut conn).delete(id).await?;

    if let Some(image) = recipe.image
        && let Err(e) = MediaStore::new(&state.config.media.root).delete(&image).await
    {
        tracing::warn!(recipe_id = id, error = %e, "Failed to remove image of deleted recipe");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Attach an image to a recipe, replacing any previous one
#[utoipa::path(
    post,
    path = "/recipe/recipes/{id}/upload-image",
    tag = "recipes",
    summary = "Upload recipe image",
    description = "Multipart upload with the file in the `image` field. PNG, JPEG, GIF and WebP are accepted.",
    params(("id" = i64, Path, description = "Recipe ID")),
    request_body(content_type = "multipart/form-data", description = "Form with an `image` file field"),
    responses(
        (status = 200, description = "Image stored", body = RecipeImageResponse),
        (status = 400, description = "Missing or invalid image", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorBody),
        (status = 413, description = "Payload too large", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, recipe_id = id))]
pub async fn upload_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<RecipeId>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<RecipeImageResponse>> {
    let mut multipart = multipart.map_err(|e| Error::BadRequest { message: e.body_text() })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    get_owned(&mut conn, id, &current_user).await?;

    let max_size = state.config.media.max_upload_size;
    let too_large = || Error::PayloadTooLarge {
        message: format!("Image exceeds the maximum upload size of {max_size} bytes"),
    };
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large()
        } else {
            Error::BadRequest {
                message: format!("Failed to parse multipart data: {}", e.body_text()),
            }
        }
    };

    let mut content = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("image") {
            content = Some(field.bytes().await.map_err(multipart_error)?);
        }
    }

    let content = content.ok_or_else(|| Error::from(FieldErrors::single("image", "No file was submitted.")))?;
    if content.is_empty() {
        return Err(FieldErrors::single("image", "The submitted file is empty.").into());
    }
    if content.len() > max_size {
        return Err(too_large());
    }
    let format = ImageFormat::sniff(&content).ok_or_else(|| {
        Error::from(FieldErrors::single(
            "image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        ))
    })?;

    let store = MediaStore::new(&state.config.media.root);
    let path = store.store_recipe_image(&content, format).await?;

    let previous = match Recipes::new(&mut conn).set_image(id, Some(&path)).await {
        Ok(previous) => previous,
        Err(e) => {
            // Don't leave an orphaned file behind
            if let Err(cleanup) = store.delete(&path).await {
                tracing::warn!(error = %cleanup, "Failed to remove unreferenced image");
            }
            return Err(e.into());
        }
    };

    if let Some(previous) = previous
        && let Err(e) = store.delete(&previous).await
    {
        tracing::warn!(recipe_id = id, error = %e, "Failed to remove replaced image");
    }

    tracing::info!(recipe_id = id, path = %path, size = content.len(), "Recipe image uploaded");
    Ok(Json(RecipeImageResponse {
        id,
        image: Some(media_url(&state.config.media.url_prefix, &path)),
    }))
}
