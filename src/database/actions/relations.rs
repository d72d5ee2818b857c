use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, ConflictError, QueryError},
    schema::{RecipeMinimal, Uuid},
};

/// The two per-user recipe join entities share one contract,
/// parameterized by the join table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipeRelation {
    Favorites,
    ShoppingCart,
}

impl RecipeRelation {
    fn table(self) -> &'static str {
        match self {
            RecipeRelation::Favorites => "user_favorites",
            RecipeRelation::ShoppingCart => "user_shopping_cart",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RecipeRelation::Favorites => "favorites",
            RecipeRelation::ShoppingCart => "the shopping cart",
        }
    }
}

async fn get_recipe_minimal(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<RecipeMinimal, ApiError> {
    let row: Option<RecipeMinimal> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    row.ok_or(ApiError::not_found("recipe", recipe_id))
}

/// Creates the `(user, recipe)` relation and returns the recipe's
/// minimal projection. A concurrent duplicate loses against the unique
/// constraint and surfaces as "already added".
pub async fn add_recipe_relation(
    relation: RecipeRelation,
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<RecipeMinimal, ApiError> {
    let recipe = get_recipe_minimal(recipe_id, pool).await?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::AlreadyAdded(relation.label()).into());
    }

    Ok(recipe)
}

pub async fn remove_recipe_relation(
    relation: RecipeRelation,
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    get_recipe_minimal(recipe_id, pool).await?;

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::NotAdded(relation.label()).into());
    }

    Ok(())
}

pub async fn is_favorite(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    relation_exists(RecipeRelation::Favorites, recipe_id, user_id, pool).await
}

pub async fn is_in_shopping_cart(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    relation_exists(RecipeRelation::ShoppingCart, recipe_id, user_id, pool).await
}

async fn relation_exists(
    relation: RecipeRelation,
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let row: Option<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE recipe_id = $1 AND user_id = $2",
        relation.table()
    ))
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.is_some())
}
