//! Test utilities for integration testing (available with `test-utils` feature).

use crate::auth::password::{self, Argon2Params};
use crate::config::{Config, MediaConfig, PasswordConfig};
use crate::db::{
    handlers::{AuthTokens, Repository, Users},
    models::users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::UserId;
use axum_test::TestServer;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// Password given to every user made by [`create_test_user`]
pub const TEST_PASSWORD: &str = "password123";

pub async fn create_test_app(pool: SqlitePool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: SqlitePool, config: Config) -> TestServer {
    crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application")
        .into_test_server()
        .expect("Failed to create test server")
}

/// Defaults with cheap password hashing.
///
/// The media root is a unique path that nothing creates until a file is stored, so tests
/// that upload should use [`create_test_config_with_media`] instead.
pub fn create_test_config() -> Config {
    let media_root = std::env::temp_dir().join(format!("recipectl-test-media-{}", Uuid::new_v4().simple()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        media: MediaConfig {
            root: media_root,
            ..Default::default()
        },
        ..Default::default()
    };
    config.auth.password = PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    };
    config
}

/// Like [`create_test_config`], with the media root in a temporary directory that is
/// removed when the returned guard drops. Keep the guard alive for the whole test.
pub fn create_test_config_with_media() -> (Config, TempDir) {
    let media = tempfile::tempdir().expect("Failed to create media directory");
    let mut config = create_test_config();
    config.media.root = media.path().to_path_buf();
    (config, media)
}

/// Create an active user with a unique email and [`TEST_PASSWORD`] as password
pub async fn create_test_user(pool: &SqlitePool, is_staff: bool) -> UserDBResponse {
    let params = Argon2Params::from(&create_test_config().auth.password);
    let password_hash = password::hash_string_with_params(TEST_PASSWORD, params).expect("Failed to hash test password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let email = format!("cook_{}@example.com", Uuid::new_v4().simple());

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email,
            name: "Test Cook".to_string(),
            password_hash,
            is_active: true,
            is_staff,
        })
        .await
        .expect("Failed to create test user")
}

pub async fn create_test_token(pool: &SqlitePool, user_id: UserId) -> String {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    AuthTokens::new(&mut conn)
        .get_or_create(user_id)
        .await
        .expect("Failed to create test token")
        .key
}

/// Header name and value carrying `token`
pub fn auth_header(token: &str) -> (String, String) {
    ("authorization".to_string(), format!("Token {token}"))
}
