//! Staff-only user management.

use crate::{
    AppState,
    api::{
        PathParam, Payload,
        handlers::users::ensure_email_available,
        models::{
            pagination::PaginatedResponse,
            users::{AdminUserCreate, AdminUserResponse, AdminUserUpdate, CurrentUser, ListUsersQuery, normalize_email},
        },
    },
    auth::{
        password::{self, Argon2Params},
        permissions::require_staff,
    },
    db::{
        handlers::{AuthTokens, Repository, UserFilter, Users},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, UserId},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<AdminUserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 403, description = "Staff only", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<AdminUserResponse>>> {
    require_staff(&current_user, Operation::Read)?;

    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    let users = repo.list(&UserFilter::new(skip, limit)).await?;
    let total_count = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(AdminUserResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    tag = "admin",
    summary = "Get user",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = AdminUserResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 403, description = "Staff only", body = crate::errors::ErrorBody),
        (status = 404, description = "User not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, target_user_id = id))]
pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<UserId>,
) -> Result<Json<AdminUserResponse>> {
    require_staff(&current_user, Operation::Read)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;

    Ok(Json(AdminUserResponse::from(user)))
}

/// Create a user with explicit staff and active flags
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "admin",
    summary = "Create user",
    request_body = AdminUserCreate,
    responses(
        (status = 201, description = "User created", body = AdminUserResponse),
        (status = 400, description = "Invalid input or email already taken", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 403, description = "Staff only", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Payload(request): Payload<AdminUserCreate>,
) -> Result<(StatusCode, Json<AdminUserResponse>)> {
    require_staff(&current_user, Operation::Create)?;

    let password_config = &state.config.auth.password;
    request.validate(password_config)?;

    let email = normalize_email(&request.email);
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_email_available(&mut conn, &email, None).await?;

    let password_hash = password::hash_password(request.password, Argon2Params::from(password_config)).await?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email,
            name: request.name,
            password_hash,
            is_active: request.is_active,
            is_staff: request.is_staff,
        })
        .await?;

    tracing::info!(created_user_id = user.id, is_staff = user.is_staff, "User created by staff");
    Ok((StatusCode::CREATED, Json(AdminUserResponse::from(user))))
}

/// Update a user's name and flags. Deactivating a user revokes their token.
#[utoipa::path(
    patch,
    path = "/admin/users/{id}",
    tag = "admin",
    summary = "Update user",
    params(("id" = i64, Path, description = "User ID")),
    request_body = AdminUserUpdate,
    responses(
        (status = 200, description = "User updated", body = AdminUserResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 403, description = "Staff only", body = crate::errors::ErrorBody),
        (status = 404, description = "User not found", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id, target_user_id = id))]
pub async fn patch_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    PathParam(id): PathParam<UserId>,
    Payload(request): Payload<AdminUserUpdate>,
) -> Result<Json<AdminUserResponse>> {
    require_staff(&current_user, Operation::Update)?;
    request.validate()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if Users::new(&mut tx).get_by_id(id).await?.is_none() {
        return Err(user_not_found(id));
    }

    let user = Users::new(&mut tx)
        .update(
            id,
            &UserUpdateDBRequest {
                name: request.name,
                is_active: request.is_active,
                is_staff: request.is_staff,
                ..Default::default()
            },
        )
        .await?;

    if !user.is_active && AuthTokens::new(&mut tx).delete_for_user(id).await? {
        tracing::info!(target_user_id = id, "Revoked token of deactivated user");
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(AdminUserResponse::from(user)))
}
