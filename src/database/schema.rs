use serde::{Deserialize, Serialize};

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Deserialize, Eq, Ord, Hash,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
}

/// User as embedded in API responses, with the per-caller subscription flag.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub author_id: Uuid,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Listing row: recipe columns plus the two per-caller flags and the
/// window total used for pagination.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeRow {
    pub id: Uuid,
    pub name: String,
    pub author_id: Uuid,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    // Window total for pagination, not part of the response shape.
    #[serde(skip_serializing)]
    pub count: i64,
}

/// One ingredient of a recipe with its amount, joined with the
/// ingredient's name and unit.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Minimal projection returned by the favorite / shopping-cart actions
/// and embedded in subscription profiles.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeMinimal {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<IngredientAmount>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeMinimal>,
    pub recipes_count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct CartIngredientRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShoppingListLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipeIngredient {
    pub id: Uuid,
    pub amount: i32,
}

/// Candidate recipe payload for create and update. Tag and ingredient
/// associations are replaced wholesale on every write.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<NewRecipeIngredient>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_row_serializes_without_the_window_total() {
        let row = RecipeRow {
            id: 1,
            name: String::from("Pancakes"),
            author_id: 2,
            image: String::new(),
            text: String::new(),
            cooking_time: 10,
            is_favorited: true,
            is_in_shopping_cart: false,
            count: 42,
        };

        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("count").is_none());
        assert_eq!(value["is_favorited"], true);
    }
}
