//! API request/response models for users.

use super::{MAX_TEXT_LENGTH, pagination::Pagination};
use crate::auth::password;
use crate::config::PasswordConfig;
use crate::db::models::users::UserDBResponse;
use crate::errors::{FieldErrors, Result};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Lower-case the domain part of an address. The local part is kept as typed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "This field may not be blank.");
        return;
    }
    let valid = match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        errors.add("email", "Enter a valid email address.");
    } else if email.chars().count() > MAX_TEXT_LENGTH {
        errors.add("email", format!("Ensure this field has no more than {MAX_TEXT_LENGTH} characters."));
    }
}

fn check_password(candidate: &str, config: &PasswordConfig, errors: &mut FieldErrors) {
    if let Some(message) = password::check_length(candidate, config) {
        errors.add("password", message);
    }
}

fn check_name(name: &str, errors: &mut FieldErrors) {
    if name.chars().count() > MAX_TEXT_LENGTH {
        errors.add("name", format!("Ensure this field has no more than {MAX_TEXT_LENGTH} characters."));
    }
}

/// Signup body, also the full-replacement body for `PUT /user/me`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

impl UserCreate {
    pub fn validate(&self, config: &PasswordConfig) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, config, &mut errors);
        check_name(&self.name, &mut errors);
        errors.into_result()
    }
}

/// Partial update for `PATCH /user/me`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl UserUpdate {
    pub fn validate(&self, config: &PasswordConfig) -> Result<()> {
        let mut errors = FieldErrors::new();
        if let Some(email) = &self.email {
            check_email(email, &mut errors);
        }
        if let Some(candidate) = &self.password {
            check_password(candidate, config, &mut errors);
        }
        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        errors.into_result()
    }
}

impl From<UserCreate> for UserUpdate {
    fn from(create: UserCreate) -> Self {
        Self {
            email: Some(create.email),
            password: Some(create.password),
            name: Some(create.name),
        }
    }
}

/// A user as seen by themselves. The password never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub name: String,
}

/// The authenticated caller, resolved from the request's token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub is_staff: bool,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            name: db.name,
        }
    }
}

impl From<CurrentUser> for UserResponse {
    fn from(user: CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            name: db.name,
            is_staff: db.is_staff,
        }
    }
}

// Admin models

/// A user as seen by staff
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminUserResponse {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for AdminUserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            name: db.name,
            is_active: db.is_active,
            is_staff: db.is_staff,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdminUserCreate {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl AdminUserCreate {
    pub fn validate(&self, config: &PasswordConfig) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, config, &mut errors);
        check_name(&self.name, &mut errors);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AdminUserUpdate {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

impl AdminUserUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        errors.into_result()
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    fn config() -> PasswordConfig {
        PasswordConfig::default()
    }

    fn field_errors(result: Result<()>) -> FieldErrors {
        match result {
            Err(Error::Validation { errors }) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("Test@EXAMPLE.Com"), "Test@example.com");
        assert_eq!(normalize_email("  user@host.io "), "user@host.io");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn test_user_create_validation() {
        let ok = UserCreate {
            email: "test@x.com".to_string(),
            password: "pass1234".to_string(),
            name: String::new(),
        };
        assert!(ok.validate(&config()).is_ok());

        let bad = UserCreate {
            email: "not-an-email".to_string(),
            password: "pw".to_string(),
            name: "x".repeat(300),
        };
        let errors = field_errors(bad.validate(&config()));
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());
        assert!(errors.get("name").is_some());
    }

    #[test]
    fn test_email_shapes() {
        for email in ["", "@x.com", "user@", "user@.com", "us er@x.com", "user@x."] {
            let mut errors = FieldErrors::new();
            check_email(email, &mut errors);
            assert!(errors.get("email").is_some(), "accepted {email:?}");
        }

        let mut errors = FieldErrors::new();
        check_email("first.last+tag@sub.example.org", &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_user_update_only_checks_present_fields() {
        assert!(UserUpdate::default().validate(&config()).is_ok());

        let update = UserUpdate {
            password: Some("abc".to_string()),
            ..Default::default()
        };
        let errors = field_errors(update.validate(&config()));
        assert!(errors.get("password").is_some());
        assert!(errors.get("email").is_none());
    }

    #[test]
    fn test_admin_create_defaults() {
        let create: AdminUserCreate = serde_json::from_value(serde_json::json!({
            "email": "staff@example.com",
            "password": "secret1",
        }))
        .unwrap();

        assert!(create.is_active);
        assert!(!create.is_staff);
        assert_eq!(create.name, "");
    }
}
