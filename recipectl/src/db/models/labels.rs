//! Database models for tags and ingredients.
//!
//! Both are simple named records owned by a user and attached to recipes through a join
//! table, so they share one set of models parameterized by [`LabelKind`].

use crate::types::UserId;

/// Which label table a repository operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Tag,
    Ingredient,
}

impl LabelKind {
    pub fn table(self) -> &'static str {
        match self {
            LabelKind::Tag => "tags",
            LabelKind::Ingredient => "ingredients",
        }
    }

    /// Join table linking this label kind to recipes
    pub fn join_table(self) -> &'static str {
        match self {
            LabelKind::Tag => "recipe_tags",
            LabelKind::Ingredient => "recipe_ingredients",
        }
    }

    /// Column in [`LabelKind::join_table`] referencing this label
    pub fn join_column(self) -> &'static str {
        match self {
            LabelKind::Tag => "tag_id",
            LabelKind::Ingredient => "ingredient_id",
        }
    }

    /// Human-readable resource name for errors and logs
    pub fn resource_name(self) -> &'static str {
        match self {
            LabelKind::Tag => "Tag",
            LabelKind::Ingredient => "Ingredient",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabelCreateDBRequest {
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct LabelUpdateDBRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LabelDBResponse {
    pub id: i64,
    pub user_id: UserId,
    pub name: String,
}
