use crate::{
    AppState,
    api::{
        Payload,
        models::{
            auth::{TokenRequest, TokenResponse},
            users::normalize_email,
        },
    },
    auth::password,
    db::handlers::{AuthTokens, Users},
    errors::{Error, FieldErrors, Result},
    types::mask_email,
};
use axum::{extract::State, response::Json};

/// Shared by every failure mode so callers cannot tell them apart
const INVALID_CREDENTIALS: &str = "Unable to authenticate with provided credentials";

fn invalid_credentials() -> Error {
    FieldErrors::single(FieldErrors::NON_FIELD, INVALID_CREDENTIALS).into()
}

/// Exchange email and password for the user's token
#[utoipa::path(
    post,
    path = "/user/token",
    tag = "user",
    summary = "Obtain token",
    description = "Returns the user's token, issuing one on first use. Unknown users, wrong passwords and inactive accounts all fail the same way.",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Unable to authenticate with provided credentials", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all, fields(email = %mask_email(&request.email)))]
pub async fn create_token(State(state): State<AppState>, Payload(request): Payload<TokenRequest>) -> Result<Json<TokenResponse>> {
    let mut errors = FieldErrors::new();
    if request.email.trim().is_empty() {
        errors.add("email", "This field may not be blank.");
    }
    if request.password.is_empty() {
        errors.add("password", "This field may not be blank.");
    }
    errors.into_result()?;

    let email = normalize_email(&request.email);
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut conn).get_user_by_email(&email).await?;

    // Unknown emails still run a full verification so timing matches a wrong password
    let hash = match &user {
        Some(user) => user.password_hash.clone(),
        None => state.dummy_password_hash.clone(),
    };
    let password_matches = password::verify_password(request.password, hash).await?;

    let Some(user) = user else {
        tracing::debug!("Token requested for unknown email");
        return Err(invalid_credentials());
    };

    if !password_matches {
        tracing::debug!(user_id = user.id, "Token requested with wrong password");
        return Err(invalid_credentials());
    }

    if !user.is_active {
        tracing::debug!(user_id = user.id, "Token requested for inactive user");
        return Err(invalid_credentials());
    }

    let token = AuthTokens::new(&mut conn).get_or_create(user.id).await?;
    Ok(Json(TokenResponse { token: token.key }))
}
