//! Common type definitions.
//!
//! All entity IDs are SQLite integer row ids wrapped in type aliases so signatures say which
//! table they point into:
//!
//! - [`UserId`]: User account identifier
//! - [`TagId`]: Tag identifier
//! - [`IngredientId`]: Ingredient identifier
//! - [`RecipeId`]: Recipe identifier

use serde::Serialize;
use std::fmt;

// Type aliases for IDs
pub type UserId = i64;
pub type TagId = i64;
pub type IngredientId = i64;
pub type RecipeId = i64;

/// Operations that can be attempted against a resource, used when reporting permission
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Mask an email address for logs: keeps the first character of the local part and the
/// domain. `"alice@example.com"` becomes `"a***@example.com"`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}
