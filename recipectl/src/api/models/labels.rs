//! API request/response models for tags and ingredients.
//!
//! Both resources share one wire shape, `{id, name}`.

use super::MAX_TEXT_LENGTH;
use crate::db::models::labels::LabelDBResponse;
use crate::errors::{Error, FieldErrors, Result};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Trim and check a tag or ingredient name, returning the value to store.
pub fn clean_name(name: &str) -> std::result::Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        Err("This field may not be blank.".to_string())
    } else if name.chars().count() > MAX_TEXT_LENGTH {
        Err(format!("Ensure this field has no more than {MAX_TEXT_LENGTH} characters."))
    } else {
        Ok(name.to_string())
    }
}

/// Create body, also the full-replacement body for `PUT`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LabelCreate {
    pub name: String,
}

impl LabelCreate {
    /// The trimmed name, or a validation error on `name`
    pub fn validated_name(&self) -> Result<String> {
        clean_name(&self.name).map_err(|message| Error::from(FieldErrors::single("name", message)))
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LabelUpdate {
    pub name: Option<String>,
}

impl LabelUpdate {
    pub fn validated_name(&self) -> Result<Option<String>> {
        self.name
            .as_deref()
            .map(|name| clean_name(name).map_err(|message| Error::from(FieldErrors::single("name", message))))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LabelResponse {
    pub id: i64,
    pub name: String,
}

impl From<LabelDBResponse> for LabelResponse {
    fn from(db: LabelDBResponse) -> Self {
        Self { id: db.id, name: db.name }
    }
}

/// Query parameters for listing tags or ingredients
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListLabelsQuery {
    /// `1` to only return records attached to at least one recipe
    pub assigned_only: Option<String>,
}

impl ListLabelsQuery {
    pub fn assigned_only(&self) -> Result<bool> {
        match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => Ok(false),
            Some("1") | Some("true") => Ok(true),
            Some(other) => Err(Error::BadRequest {
                message: format!("Invalid value for assigned_only: {other:?}. Use 0 or 1."),
            }),
        }
    }
}
