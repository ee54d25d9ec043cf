//! # recipectl: Recipe Management API
//!
//! `recipectl` is an HTTP backend for keeping track of recipes. Users sign up, exchange their
//! credentials for a token and then manage their own recipes, tags and ingredients. Everything a
//! user creates is private to them: other users' records are invisible and read as missing.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses SQLite (through SQLx) for persistence. Uploaded recipe images are written to a local media
//! directory and served back read-only.
//!
//! ### Request Flow
//!
//! A request first passes the tracing and CORS layers. Authenticated handlers take a
//! [`CurrentUser`](api::models::users::CurrentUser) extractor which resolves the
//! `Authorization: Token <key>` header against the token table; a missing or unknown token is
//! rejected with 401 before the handler runs. Handlers then validate their input, talk to the
//! database through repositories in [`db::handlers`], and convert the results into response
//! models. Every failure is an [`errors::Error`] which renders as a JSON body with a matching
//! status code.
//!
//! ### Ownership
//!
//! Tags, ingredients and recipes carry the id of the user who created them. Lists are filtered by
//! owner, and fetching, updating or deleting another user's record returns 404 rather than 403 so
//! that ids of other users' data are never confirmed.
//!
//! ## Main Modules
//!
//! - [`api`]: HTTP handlers and request/response models
//! - [`auth`]: Token extraction, password hashing and staff checks
//! - [`db`]: Repositories and database records
//! - [`config`]: Configuration loading and validation
//! - [`errors`]: The error taxonomy and its HTTP rendering
//! - [`telemetry`]: Tracing subscriber setup
//!
//! ## Getting Started
//!
//! ```no_run
//! use clap::Parser;
//! use recipectl::{Application, config::{Args, Config}, telemetry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = Args::parse();
//!     let config = Config::load(&args)?;
//!     telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async { tokio::signal::ctrl_c().await.ok(); }).await
//! }
//! ```
//!
//! ## Configuration
//!
//! See [`config`] for the available settings. At minimum set `admin_password` so that a staff
//! account exists for the `/admin` endpoints.

pub mod api;
pub mod auth;
pub mod config;
mod crypto;
pub mod db;
pub mod errors;
mod media;
mod openapi;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::handlers::{admin, auth as auth_handlers, labels, recipes, users},
    auth::password::{self, Argon2Params},
    config::{Config, CorsOrigin},
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    openapi::ApiDoc,
    types::UserId,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post, put},
};
use bon::Builder;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Room for multipart boundaries and part headers on top of the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state handed to every handler.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .dummy_password_hash(password::dummy_hash(params).await?)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    /// Checked against when a token is requested for an unknown email, so that
    /// lookup misses cost as much as wrong passwords
    pub dummy_password_hash: String,
}

/// Get the recipectl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Ensure the bootstrap staff account exists.
///
/// Idempotent: a missing account is created as an active staff user, an existing one is
/// promoted to staff and reactivated, and its password is reset when `password` is given.
/// Without a password no new account is created, since it could never log in.
///
/// Returns the account's id, or `None` if nothing was created.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(
    email: &str,
    password: Option<&str>,
    params: Argon2Params,
    db: &SqlitePool,
) -> anyhow::Result<Option<UserId>> {
    let password_hash = match password {
        Some(password) => Some(password::hash_password(password.to_string(), params).await?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    let user_id = match user_repo.get_user_by_email(email).await? {
        Some(existing) => {
            user_repo
                .update(
                    existing.id,
                    &UserUpdateDBRequest {
                        password_hash,
                        is_active: Some(true),
                        is_staff: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
            Some(existing.id)
        }
        None => match password_hash {
            Some(password_hash) => {
                let created = user_repo
                    .create(&UserCreateDBRequest {
                        email: email.to_string(),
                        name: String::new(),
                        password_hash,
                        is_active: true,
                        is_staff: true,
                    })
                    .await?;
                info!(user_id = created.id, "Created initial admin user");
                Some(created.id)
            }
            None => {
                warn!("No admin_password configured, skipping initial admin user creation");
                None
            }
        },
    };

    tx.commit().await?;
    Ok(user_id)
}

/// Connect to the configured database and run migrations
async fn setup_database(config: &Config) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout)
        .connect_with(options)
        .await?;

    migrator().run(&pool).await?;
    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.auth.security.cors.allowed_origins;
    let allow_origin = if allowed.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                // Url renders with a trailing slash that browsers never send
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `/user/*`: signup, token issue and the caller's profile
/// - `/recipe/*`: tags, ingredients, recipes and image upload
/// - `/admin/users/*`: staff-only user management
/// - `/healthz`, the OpenAPI document and its rendered docs
/// - uploaded media, served read-only under the configured prefix
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let upload_limit = state.config.media.max_upload_size.saturating_add(MULTIPART_OVERHEAD);

    let user_routes = Router::new()
        .route("/user/create", post(users::create_user))
        .route("/user/token", post(auth_handlers::create_token))
        .route("/user/me", get(users::get_me).put(users::put_me).patch(users::patch_me));

    let recipe_routes = Router::new()
        .route("/recipe/tags", get(labels::list_tags).post(labels::create_tag))
        .route(
            "/recipe/tags/{id}",
            put(labels::put_tag).patch(labels::patch_tag).delete(labels::delete_tag),
        )
        .route("/recipe/ingredients", get(labels::list_ingredients).post(labels::create_ingredient))
        .route(
            "/recipe/ingredients/{id}",
            put(labels::put_ingredient)
                .patch(labels::patch_ingredient)
                .delete(labels::delete_ingredient),
        )
        .route("/recipe/recipes", get(recipes::list_recipes).post(recipes::create_recipe))
        .route(
            "/recipe/recipes/{id}",
            get(recipes::get_recipe)
                .put(recipes::put_recipe)
                .patch(recipes::patch_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/recipe/recipes/{id}/upload-image",
            post(recipes::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        );

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/{id}", get(admin::get_user).patch(admin::patch_user));

    let media_service = ServeDir::new(&state.config.media.root);
    let media_prefix = state.config.media.url_prefix.clone();
    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(user_routes)
        .merge(recipe_routes)
        .merge(admin_routes)
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .nest_service(&media_prefix, media_service)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(cors_layer),
        );

    Ok(router)
}

/// Main application struct that owns the router, the pool and the configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and
///    ensures the bootstrap admin exists
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown future resolves, in-flight requests finish and the
///    pool is closed
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on an existing pool, or connect using the configuration when
    /// `pool` is `None`.
    pub async fn new_with_pool(config: Config, pool: Option<SqlitePool>) -> anyhow::Result<Self> {
        debug!("Starting recipectl with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        let params = Argon2Params::from(&config.auth.password);
        create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), params, &pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;

        let dummy_password_hash = password::dummy_hash(params).await?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .dummy_password_hash(dummy_password_hash)
            .build();
        let router = build_router(app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> anyhow::Result<axum_test::TestServer> {
        axum_test::TestServer::new(self.router.into_make_service()).map_err(|e| anyhow::anyhow!("Failed to create test server: {e}"))
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("recipectl listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
