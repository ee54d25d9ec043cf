//! API request/response models for recipes.

use super::{MAX_TEXT_LENGTH, labels::LabelResponse};
use crate::db::models::recipes::RecipeDBResponse;
use crate::errors::{Error, FieldErrors, Result};
use crate::types::RecipeId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Prices must stay below this (five digits, two of them decimals)
const MAX_PRICE: i64 = 1000;

/// A tag or ingredient referenced from a recipe body.
///
/// Either the id of one of the caller's records, or `{"name": ...}`, which reuses the
/// caller's record with that name or creates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RelatedRef {
    Id(i64),
    Named { name: String },
}

fn check_title(title: &str, errors: &mut FieldErrors) {
    if title.trim().is_empty() {
        errors.add("title", "This field may not be blank.");
    } else if title.chars().count() > MAX_TEXT_LENGTH {
        errors.add("title", format!("Ensure this field has no more than {MAX_TEXT_LENGTH} characters."));
    }
}

fn check_time_minutes(time_minutes: i64, errors: &mut FieldErrors) {
    if time_minutes < 0 {
        errors.add("time_minutes", "Ensure this value is greater than or equal to 0.");
    }
}

fn check_price(price: Decimal, errors: &mut FieldErrors) {
    if price.is_sign_negative() && !price.is_zero() {
        errors.add("price", "Ensure this value is greater than or equal to 0.");
    } else if price.normalize().scale() > 2 {
        errors.add("price", "Ensure that there are no more than 2 decimal places.");
    } else if price >= Decimal::from(MAX_PRICE) {
        errors.add("price", "Ensure that there are no more than 3 digits before the decimal point.");
    }
}

fn check_link(link: &str, errors: &mut FieldErrors) {
    if link.chars().count() > MAX_TEXT_LENGTH {
        errors.add("link", format!("Ensure this field has no more than {MAX_TEXT_LENGTH} characters."));
    }
}

fn check_refs(field: &str, refs: &[RelatedRef], errors: &mut FieldErrors) {
    for reference in refs {
        if let RelatedRef::Named { name } = reference
            && let Err(message) = super::labels::clean_name(name)
        {
            errors.add(field, format!("Invalid name {name:?}: {message}"));
        }
    }
}

/// Create body, also the full-replacement body for `PUT`.
///
/// On `PUT`, an omitted `link` resets to empty and omitted relation lists clear the relations.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecipeCreate {
    pub title: String,
    pub time_minutes: i64,
    /// Decimal with at most two places, e.g. `"5.00"`
    #[schema(value_type = String, example = "5.00")]
    pub price: Decimal,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub tags: Vec<RelatedRef>,
    #[serde(default)]
    pub ingredients: Vec<RelatedRef>,
}

impl RecipeCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        check_title(&self.title, &mut errors);
        check_time_minutes(self.time_minutes, &mut errors);
        check_price(self.price, &mut errors);
        check_link(&self.link, &mut errors);
        check_refs("tags", &self.tags, &mut errors);
        check_refs("ingredients", &self.ingredients, &mut errors);
        errors.into_result()
    }
}

/// Partial update for `PATCH`. Omitted fields are unchanged; a given relation list replaces the set.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RecipeUpdate {
    pub title: Option<String>,
    pub time_minutes: Option<i64>,
    #[schema(value_type = Option<String>, example = "5.00")]
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<RelatedRef>>,
    pub ingredients: Option<Vec<RelatedRef>>,
}

impl RecipeUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            check_title(title, &mut errors);
        }
        if let Some(time_minutes) = self.time_minutes {
            check_time_minutes(time_minutes, &mut errors);
        }
        if let Some(price) = self.price {
            check_price(price, &mut errors);
        }
        if let Some(link) = &self.link {
            check_link(link, &mut errors);
        }
        if let Some(tags) = &self.tags {
            check_refs("tags", tags, &mut errors);
        }
        if let Some(ingredients) = &self.ingredients {
            check_refs("ingredients", ingredients, &mut errors);
        }
        errors.into_result()
    }
}

impl From<RecipeCreate> for RecipeUpdate {
    fn from(create: RecipeCreate) -> Self {
        Self {
            title: Some(create.title),
            time_minutes: Some(create.time_minutes),
            price: Some(create.price),
            link: Some(create.link),
            tags: Some(create.tags),
            ingredients: Some(create.ingredients),
        }
    }
}

/// List representation: relations as id lists
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeResponse {
    pub id: RecipeId,
    pub title: String,
    pub time_minutes: i64,
    #[schema(value_type = String, example = "5.00")]
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

impl From<RecipeDBResponse> for RecipeResponse {
    fn from(db: RecipeDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            time_minutes: db.time_minutes,
            price: db.price,
            link: db.link,
            tags: db.tags.into_iter().map(|t| t.id).collect(),
            ingredients: db.ingredients.into_iter().map(|i| i.id).collect(),
        }
    }
}

/// Detail representation: relations as nested objects
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeDetailResponse {
    pub id: RecipeId,
    pub title: String,
    pub time_minutes: i64,
    #[schema(value_type = String, example = "5.00")]
    pub price: Decimal,
    pub link: String,
    /// URL path of the uploaded image, if any
    pub image: Option<String>,
    pub tags: Vec<LabelResponse>,
    pub ingredients: Vec<LabelResponse>,
}

impl RecipeDetailResponse {
    /// `media_prefix` is the URL path uploaded files are served under
    pub fn new(db: RecipeDBResponse, media_prefix: &str) -> Self {
        Self {
            id: db.id,
            title: db.title,
            time_minutes: db.time_minutes,
            price: db.price,
            link: db.link,
            image: db.image.map(|path| media_url(media_prefix, &path)),
            tags: db.tags.into_iter().map(LabelResponse::from).collect(),
            ingredients: db.ingredients.into_iter().map(LabelResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeImageResponse {
    pub id: RecipeId,
    pub image: Option<String>,
}

/// Join a stored relative media path onto the public prefix
pub fn media_url(prefix: &str, path: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Query parameters for listing recipes
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListRecipesQuery {
    /// Comma-separated tag ids; keeps recipes with any of them
    pub tags: Option<String>,
    /// Comma-separated ingredient ids; keeps recipes with any of them
    pub ingredients: Option<String>,
}

fn parse_ids(field: &str, raw: Option<&str>) -> Result<Option<Vec<i64>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    raw.split(',')
        .map(|part| {
            part.trim().parse::<i64>().map_err(|_| Error::BadRequest {
                message: format!("Invalid {field} filter: {part:?} is not an integer id"),
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

impl ListRecipesQuery {
    pub fn tag_ids(&self) -> Result<Option<Vec<i64>>> {
        parse_ids("tags", self.tags.as_deref())
    }

    pub fn ingredient_ids(&self) -> Result<Option<Vec<i64>>> {
        parse_ids("ingredients", self.ingredients.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn create(price: &str) -> RecipeCreate {
        RecipeCreate {
            title: "Cheesecake".to_string(),
            time_minutes: 30,
            price: Decimal::from_str(price).unwrap(),
            link: String::new(),
            tags: vec![],
            ingredients: vec![],
        }
    }

    fn failed_fields(result: Result<()>) -> Vec<String> {
        match result {
            Err(Error::Validation { errors }) => ["title", "time_minutes", "price", "link", "tags", "ingredients"]
                .into_iter()
                .filter(|f| errors.get(f).is_some())
                .map(str::to_string)
                .collect(),
            Ok(()) => vec![],
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_price_rules() {
        assert!(create("5.00").validate().is_ok());
        assert!(create("0").validate().is_ok());
        assert!(create("999.99").validate().is_ok());
        assert!(create("5.000").validate().is_ok());

        assert_eq!(failed_fields(create("-1").validate()), vec!["price"]);
        assert_eq!(failed_fields(create("1.234").validate()), vec!["price"]);
        assert_eq!(failed_fields(create("1000").validate()), vec!["price"]);
    }

    #[test]
    fn test_create_collects_every_failure() {
        let mut body = create("5.00");
        body.title = " ".to_string();
        body.time_minutes = -1;
        body.link = "x".repeat(256);
        body.tags = vec![RelatedRef::Named { name: "".to_string() }];

        assert_eq!(failed_fields(body.validate()), vec!["title", "time_minutes", "link", "tags"]);
    }

    #[test]
    fn test_related_ref_shapes() {
        let body: RecipeCreate = serde_json::from_value(json!({
            "title": "Soup",
            "time_minutes": 5,
            "price": "2.50",
            "tags": [1, {"name": "Vegan"}],
        }))
        .unwrap();

        assert_eq!(body.tags, vec![RelatedRef::Id(1), RelatedRef::Named { name: "Vegan".to_string() }]);
        assert!(body.ingredients.is_empty());
        assert_eq!(body.link, "");

        let bad = serde_json::from_value::<RecipeCreate>(json!({
            "title": "Soup",
            "time_minutes": 5,
            "price": "2.50",
            "tags": [true],
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_price_serializes_as_string() {
        let response = RecipeResponse {
            id: 1,
            title: "Cheesecake".to_string(),
            time_minutes: 30,
            price: Decimal::from_str("5.00").unwrap(),
            link: String::new(),
            tags: vec![],
            ingredients: vec![],
        };
        assert_eq!(serde_json::to_value(&response).unwrap()["price"], json!("5.00"));
    }

    #[test]
    fn test_patch_distinguishes_missing_from_empty() {
        let patch: RecipeUpdate = serde_json::from_value(json!({"tags": []})).unwrap();
        assert_eq!(patch.tags, Some(vec![]));
        assert!(patch.ingredients.is_none());
        assert!(patch.title.is_none());
    }

    #[test]
    fn test_list_filter_parsing() {
        let query = ListRecipesQuery {
            tags: Some("1, 2,3".to_string()),
            ingredients: None,
        };
        assert_eq!(query.tag_ids().unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(query.ingredient_ids().unwrap(), None);

        let query = ListRecipesQuery {
            tags: Some("1,abc".to_string()),
            ingredients: Some("".to_string()),
        };
        assert!(matches!(query.tag_ids(), Err(Error::BadRequest { .. })));
        assert_eq!(query.ingredient_ids().unwrap(), None);
    }

    #[test]
    fn test_media_url() {
        assert_eq!(media_url("/media", "recipe/a.png"), "/media/recipe/a.png");
        assert_eq!(media_url("/media/", "/recipe/a.png"), "/media/recipe/a.png");
    }
}
