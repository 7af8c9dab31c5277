use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
}

/// Catalog row. The same name may appear under several measurement units;
/// the shopping list groups by the (name, unit) pair.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    /// Path of the stored image, relative to the media root.
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// One (ingredient, amount) line of a recipe. The pair (recipe_id,
/// ingredient_id) is unique per recipe.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeIngredient {
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub amount: i32,
}

/// Ingredient line joined against the catalog, as returned to readers.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct IngredientInRecipe {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Short recipe shape used in list responses, favorites/cart confirmations
/// and subscription listings.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipePreview {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

/// List row carrying the window total for pagination.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeListRow {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
    pub count: i64,
}

impl From<RecipeListRow> for RecipePreview {
    fn from(row: RecipeListRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

/// User as other users see it.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

/// Full read projection of a recipe aggregate: flat ids expanded into
/// catalog rows, viewer-relative flags attached.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetails {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<IngredientInRecipe>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// Author entry in a subscription listing.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribedAuthor {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipePreview>,
    pub recipes_count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserListRow {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub count: i64,
}

/// Raw cart line before aggregation.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct CartLine {
    pub ingredient_name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// One aggregated shopping-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListRow {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}
