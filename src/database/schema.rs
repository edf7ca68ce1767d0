use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reply::{self, Reply, Response},
};

use crate::permissions::Owned;

pub type Id = i32;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            name: user.name.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthToken {
    pub token: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    #[serde(skip)]
    pub user_id: Id,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    #[serde(skip)]
    pub user_id: Id,
}

impl Owned for Tag {
    fn owner_id(&self) -> Id {
        self.user_id
    }
}

impl Owned for Ingredient {
    fn owner_id(&self) -> Id {
        self.user_id
    }
}

/// Create/rename payload shared by tags and ingredients.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributePayload {
    #[serde(default)]
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub image: Option<String>,
}

impl Owned for RecipeRow {
    fn owner_id(&self) -> Id {
        self.user_id
    }
}

/// List/create/update representation: associations as ids.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeSummary {
    pub id: Id,
    pub title: String,
    #[serde(rename = "ingredient")]
    pub ingredients: Vec<Id>,
    #[serde(rename = "tag")]
    pub tags: Vec<Id>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub image: Option<String>,
}

impl RecipeSummary {
    pub fn from_row(row: RecipeRow, tags: Vec<Id>, ingredients: Vec<Id>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            ingredients,
            tags,
            time_minutes: row.time_minutes,
            price: row.price,
            link: row.link,
            image: row.image,
        }
    }
}

/// Detail representation: associations as nested objects.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeDetail {
    pub id: Id,
    pub title: String,
    #[serde(rename = "ingredient")]
    pub ingredients: Vec<Ingredient>,
    #[serde(rename = "tag")]
    pub tags: Vec<Tag>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub image: Option<String>,
}

impl RecipeDetail {
    pub fn from_row(row: RecipeRow, tags: Vec<Tag>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            ingredients,
            tags,
            time_minutes: row.time_minutes,
            price: row.price,
            link: row.link,
            image: row.image,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecipeImage {
    pub id: Id,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeInput {
    #[serde(default)]
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, rename = "tag")]
    pub tags: Vec<Id>,
    #[serde(default, rename = "ingredient")]
    pub ingredients: Vec<Id>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    #[serde(rename = "tag")]
    pub tags: Option<Vec<Id>>,
    #[serde(rename = "ingredient")]
    pub ingredients: Option<Vec<Id>>,
}

impl From<RecipeInput> for RecipePatch {
    fn from(input: RecipeInput) -> Self {
        Self {
            title: Some(input.title),
            time_minutes: Some(input.time_minutes),
            price: Some(input.price),
            link: Some(input.link.unwrap_or_default()),
            tags: Some(input.tags),
            ingredients: Some(input.ingredients),
        }
    }
}

/// Recipe endpoint kinds, each with a fixed output type and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeAction {
    List,
    Detail,
    Create,
    Update,
    ImageUpload,
}

impl RecipeAction {
    pub fn status(&self) -> StatusCode {
        match self {
            RecipeAction::Create => StatusCode::CREATED,
            RecipeAction::List
            | RecipeAction::Detail
            | RecipeAction::Update
            | RecipeAction::ImageUpload => StatusCode::OK,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RecipeOutput {
    List(Vec<RecipeSummary>),
    Detail(RecipeDetail),
    Created(RecipeSummary),
    Updated(RecipeSummary),
    ImageUploaded(RecipeImage),
}

impl RecipeOutput {
    pub fn action(&self) -> RecipeAction {
        match self {
            RecipeOutput::List(_) => RecipeAction::List,
            RecipeOutput::Detail(_) => RecipeAction::Detail,
            RecipeOutput::Created(_) => RecipeAction::Create,
            RecipeOutput::Updated(_) => RecipeAction::Update,
            RecipeOutput::ImageUploaded(_) => RecipeAction::ImageUpload,
        }
    }
}

impl Reply for RecipeOutput {
    fn into_response(self) -> Response {
        let status = self.action().status();
        reply::with_status(reply::json(&self), status).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn row() -> RecipeRow {
        RecipeRow {
            id: 7,
            user_id: 1,
            title: String::from("Eggs benedict"),
            time_minutes: 10,
            price: Decimal::from_str("5.00").unwrap(),
            link: None,
            image: None,
        }
    }

    #[test]
    fn summary_lists_association_ids() {
        let summary = RecipeSummary::from_row(row(), vec![1, 2], vec![3]);
        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["tag"], json!([1, 2]));
        assert_eq!(value["ingredient"], json!([3]));
        assert_eq!(value["price"], json!("5.00"));
        assert!(value.get("user_id").is_none());
    }

    #[test]
    fn detail_nests_association_objects() {
        let tag = Tag {
            id: 1,
            name: String::from("Vegan"),
            user_id: 1,
        };
        let ingredient = Ingredient {
            id: 3,
            name: String::from("Eggs"),
            user_id: 1,
        };
        let detail = RecipeDetail::from_row(row(), vec![tag], vec![ingredient]);
        let value = serde_json::to_value(&detail).unwrap();

        assert_eq!(value["tag"], json!([{ "id": 1, "name": "Vegan" }]));
        assert_eq!(value["ingredient"], json!([{ "id": 3, "name": "Eggs" }]));
    }

    #[test]
    fn owner_field_is_ignored_in_payloads() {
        let input: RecipeInput = serde_json::from_value(json!({
            "title": "Toast",
            "time_minutes": 3,
            "price": 1.5,
            "user_id": 99,
            "tag": [4]
        }))
        .unwrap();

        assert_eq!(input.tags, vec![4]);
        assert!(input.ingredients.is_empty());
        assert_eq!(input.price, Decimal::from_str("1.5").unwrap());
    }

    #[test]
    fn full_update_clears_missing_link() {
        let input: RecipeInput = serde_json::from_value(json!({
            "title": "Toast",
            "time_minutes": 3,
            "price": "1.50"
        }))
        .unwrap();
        let patch = RecipePatch::from(input);

        assert_eq!(patch.link.as_deref(), Some(""));
        assert_eq!(patch.tags, Some(vec![]));
    }

    #[test]
    fn create_is_the_only_created_status() {
        assert_eq!(RecipeAction::Create.status(), StatusCode::CREATED);
        assert_eq!(RecipeAction::Detail.status(), StatusCode::OK);
        assert_eq!(RecipeAction::ImageUpload.status(), StatusCode::OK);
    }

    #[test]
    fn created_output_replies_with_created() {
        let output = RecipeOutput::Created(RecipeSummary::from_row(row(), vec![], vec![]));

        assert_eq!(output.action(), RecipeAction::Create);
        assert_eq!(output.into_response().status(), StatusCode::CREATED);
    }
}
