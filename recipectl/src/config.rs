//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `RECIPECTL_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `RECIPECTL_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `RECIPECTL_AUTH__PASSWORD__MIN_LENGTH=8` sets the `auth.password.min_length` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use recipectl::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}", config.bind_address());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Database**: `database.url`, `database.max_connections` - SQLite connection settings
//! - **Admin User**: `admin_email`, `admin_password` - Staff account ensured at startup
//! - **Authentication**: `auth.password` - Password length rules and Argon2 cost
//! - **Security**: `auth.security.cors` - CORS settings
//! - **Media**: `media.root`, `media.max_upload_size` - Where uploaded recipe images live

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "RECIPECTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// Loaded from YAML and environment variables. All fields have defaults defined in the
/// `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Set from the `DATABASE_URL` environment variable; folded into `database.url` on load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// SQLite connection settings
    pub database: DatabaseConfig,
    /// Email address of the staff account ensured at startup
    pub admin_email: String,
    /// Password for that account. Without one, no account is created.
    pub admin_password: Option<String>,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// Uploaded media storage
    pub media: MediaConfig,
}

/// SQLite connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string, e.g. `sqlite://recipectl.db?mode=rwc`
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://recipectl.db?mode=rwc".to_string(),
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Password validation rules and hashing cost
    pub password: PasswordConfig,
    /// Security settings (CORS)
    pub security: SecurityConfig,
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations
    pub argon2_iterations: u32,
    /// Argon2 parallelism
    pub argon2_parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 5,
            max_length: 64,
            // Argon2id RFC recommendations
            argon2_memory_kib: 19456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests. Empty disables CORS headers entirely.
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allow_credentials: false,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://cookbook.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

/// Uploaded media (recipe images).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Directory that uploaded files are written under and served from
    pub root: PathBuf,
    /// URL prefix the directory is served at
    pub url_prefix: String,
    /// Largest accepted upload body in bytes
    pub max_upload_size: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("media"),
            url_prefix: "/media".to_string(),
            max_upload_size: 10 * 1024 * 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: None,
            database: DatabaseConfig::default(),
            admin_email: "admin@example.com".to_string(),
            admin_password: None,
            auth: AuthConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        let password = &self.auth.password;
        if password.min_length > password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    password.min_length, password.max_length
                ),
            });
        }

        let cors = &self.auth.security.cors;
        if cors.allow_credentials && cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot allow credentials with a wildcard origin. \
                     List explicit origins or set auth.security.cors.allow_credentials to false."
                    .to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(Error::Internal {
                operation: "Config validation: database.max_connections must be at least 1".to_string(),
            });
        }

        if self.media.root.as_os_str().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: media.root cannot be empty".to_string(),
            });
        }

        if !self.media.url_prefix.starts_with('/') || self.media.url_prefix.len() < 2 {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: media.url_prefix ({}) must be an absolute path such as /media",
                    self.media.url_prefix
                ),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // RECIPECTL_CONFIG names the file itself and is not a config key
            .merge(Env::prefixed("RECIPECTL_").ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
