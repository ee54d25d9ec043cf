use crate::{
    AppState,
    api::{
        Payload,
        models::users::{CurrentUser, UserCreate, UserResponse, UserUpdate, normalize_email},
    },
    auth::password::{self, Argon2Params},
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, FieldErrors, Result},
    types::UserId,
};
use axum::{extract::State, http::StatusCode, response::Json};
use sqlx::SqliteConnection;

const DUPLICATE_EMAIL: &str = "A user with this email already exists.";

/// Fail with a field error when another account already holds `email`.
pub(crate) async fn ensure_email_available(conn: &mut SqliteConnection, email: &str, except: Option<UserId>) -> Result<()> {
    match Users::new(conn).get_user_by_email(email).await? {
        Some(existing) if Some(existing.id) != except => Err(FieldErrors::single("email", DUPLICATE_EMAIL).into()),
        _ => Ok(()),
    }
}

/// Create a new user account
#[utoipa::path(
    post,
    path = "/user/create",
    tag = "user",
    summary = "Sign up",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input or email already taken", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(State(state): State<AppState>, Payload(request): Payload<UserCreate>) -> Result<(StatusCode, Json<UserResponse>)> {
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
            is_active: true,
            is_staff: false,
        })
        .await?;

    tracing::info!(user_id = user.id, "User signed up");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Get the authenticated user
#[utoipa::path(
    get,
    path = "/user/me",
    tag = "user",
    summary = "Get current user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_me(current_user: CurrentUser) -> Result<Json<UserResponse>> {
    Ok(Json(UserResponse::from(current_user)))
}

async fn update_me(state: &AppState, current_user: &CurrentUser, request: UserUpdate) -> Result<UserResponse> {
    let password_config = &state.config.auth.password;
    request.validate(password_config)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let email = match request.email {
        Some(email) => {
            let email = normalize_email(&email);
            ensure_email_available(&mut conn, &email, Some(current_user.id)).await?;
            Some(email)
        }
        None => None,
    };

    let password_hash = match request.password {
        Some(candidate) => Some(password::hash_password(candidate, Argon2Params::from(password_config)).await?),
        None => None,
    };

    let user = Users::new(&mut conn)
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                email,
                name: request.name,
                password_hash,
                ..Default::default()
            },
        )
        .await?;

    Ok(UserResponse::from(user))
}

/// Replace the authenticated user's email, password and name
#[utoipa::path(
    put,
    path = "/user/me",
    tag = "user",
    summary = "Replace current user",
    request_body = UserCreate,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn put_me(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Payload(request): Payload<UserCreate>,
) -> Result<Json<UserResponse>> {
    Ok(Json(update_me(&state, &current_user, request.into()).await?))
}

/// Update some of the authenticated user's fields
#[utoipa::path(
    patch,
    path = "/user/me",
    tag = "user",
    summary = "Update current user",
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn patch_me(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Payload(request): Payload<UserUpdate>,
) -> Result<Json<UserResponse>> {
    Ok(Json(update_me(&state, &current_user, request).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::UserResponse;
    use crate::db::handlers::Users;
    use crate::test_utils::*;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_success(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/user/create")
            .json(&json!({"email": "test@X.com", "password": "pass1234", "name": "Test"}))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let user: UserResponse = response.json();
        assert_eq!(user.email, "test@x.com");
        assert_eq!(user.name, "Test");

        let body: Value = response.json();
        assert!(body.get("password").is_none());

        let mut conn = pool.acquire().await.unwrap();
        let stored = Users::new(&mut conn).get_user_by_email("test@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "pass1234");
        assert!(stored.is_active);
        assert!(!stored.is_staff);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_duplicate_email(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let body = json!({"email": "dup@example.com", "password": "pass1234"});

        app.post("/user/create").json(&body).await.assert_status(axum::http::StatusCode::CREATED);

        let response = app.post("/user/create").json(&body).await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert!(body["errors"]["email"].is_array());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_password_too_short(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/user/create")
            .json(&json!({"email": "short@example.com", "password": "pw", "name": "Short"}))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert!(body["errors"]["password"].is_array());

        let mut conn = pool.acquire().await.unwrap();
        assert!(Users::new(&mut conn).get_user_by_email("short@example.com").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_rejects_malformed_json(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;

        let response = app.post("/user/create").json(&json!({"email": "missing-password@example.com"})).await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert!(body["message"].is_string());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_me_requires_auth(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        app.get("/user/me").await.assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_me(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = auth_header(&create_test_token(&pool, user.id).await);

        let response = app.get("/user/me").add_header(name, value).await;
        response.assert_status_ok();
        let me: UserResponse = response.json();
        assert_eq!(me.id, user.id);
        assert_eq!(me.email, user.email);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_patch_me_updates_name_and_password(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = auth_header(&create_test_token(&pool, user.id).await);

        let response = app
            .patch("/user/me")
            .add_header(name, value)
            .json(&json!({"name": "New Name", "password": "newpassword123"}))
            .await;
        response.assert_status_ok();
        let me: UserResponse = response.json();
        assert_eq!(me.name, "New Name");
        assert_eq!(me.email, user.email);

        // The new password is accepted by the token endpoint
        app.post("/user/token")
            .json(&json!({"email": user.email, "password": "newpassword123"}))
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_put_me_requires_all_fields(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let (name, value) = auth_header(&create_test_token(&pool, user.id).await);

        app.put("/user/me")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Only Name"}))
            .await
            .assert_status_bad_request();

        let response = app
            .put("/user/me")
            .add_header(name, value)
            .json(&json!({"email": "replaced@example.com", "password": "replaced1", "name": "Replaced"}))
            .await;
        response.assert_status_ok();
        let me: UserResponse = response.json();
        assert_eq!(me.email, "replaced@example.com");
        assert_eq!(me.name, "Replaced");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_patch_me_email_taken(pool: SqlitePool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let other = create_test_user(&pool, false).await;
        let (name, value) = auth_header(&create_test_token(&pool, user.id).await);

        let response = app
            .patch("/user/me")
            .add_header(name.clone(), value.clone())
            .json(&json!({"email": other.email}))
            .await;
        response.assert_status_bad_request();

        // Re-submitting your own address is fine
        app.patch("/user/me")
            .add_header(name, value)
            .json(&json!({"email": user.email}))
            .await
            .assert_status_ok();
    }
}
