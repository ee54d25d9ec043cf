//! OpenAPI documentation for the whole HTTP surface.
//!
//! The document is served at `/api-docs/openapi.json` and rendered with Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{api, errors};

/// Token scheme used by every authenticated endpoint.
struct TokenSecurityAddon;

impl Modify for TokenSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "TokenAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Token issued by `POST /user/token`. Send it in the `Authorization` header:\n\n\
                    ```\nAuthorization: Token YOUR_TOKEN\n```\n\n\
                    The `Bearer` scheme is accepted as well.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "recipectl", description = "Recipe management API"),
    modifiers(&TokenSecurityAddon),
    paths(
        api::handlers::users::create_user,
        api::handlers::auth::create_token,
        api::handlers::users::get_me,
        api::handlers::users::put_me,
        api::handlers::users::patch_me,
        api::handlers::labels::list_tags,
        api::handlers::labels::create_tag,
        api::handlers::labels::put_tag,
        api::handlers::labels::patch_tag,
        api::handlers::labels::delete_tag,
        api::handlers::labels::list_ingredients,
        api::handlers::labels::create_ingredient,
        api::handlers::labels::put_ingredient,
        api::handlers::labels::patch_ingredient,
        api::handlers::labels::delete_ingredient,
        api::handlers::recipes::list_recipes,
        api::handlers::recipes::create_recipe,
        api::handlers::recipes::get_recipe,
        api::handlers::recipes::put_recipe,
        api::handlers::recipes::patch_recipe,
        api::handlers::recipes::delete_recipe,
        api::handlers::recipes::upload_image,
        api::handlers::admin::list_users,
        api::handlers::admin::get_user,
        api::handlers::admin::create_user,
        api::handlers::admin::patch_user,
    ),
    components(
        schemas(
            errors::ErrorBody,
            errors::FieldErrors,
            api::models::auth::TokenRequest,
            api::models::auth::TokenResponse,
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::users::AdminUserResponse,
            api::models::users::AdminUserCreate,
            api::models::users::AdminUserUpdate,
            api::models::labels::LabelCreate,
            api::models::labels::LabelUpdate,
            api::models::labels::LabelResponse,
            api::models::recipes::RelatedRef,
            api::models::recipes::RecipeCreate,
            api::models::recipes::RecipeUpdate,
            api::models::recipes::RecipeResponse,
            api::models::recipes::RecipeDetailResponse,
            api::models::recipes::RecipeImageResponse,
        )
    ),
    tags(
        (name = "user", description = "Sign up, obtain a token and manage your own account."),
        (name = "tags", description = "Your tags. Each user only ever sees their own."),
        (name = "ingredients", description = "Your ingredients. Each user only ever sees their own."),
        (name = "recipes", description = "Your recipes.

Tags and ingredients are attached either by id (`[1, 2]`) or by name (`[{\"name\": \"Vegan\"}]`); names you don't have yet are created on the fly."),
        (name = "admin", description = "Staff-only user management."),
    )
)]
pub struct ApiDoc;
