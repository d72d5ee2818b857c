use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, ConflictError, QueryError},
    filter::IngredientFilter,
    schema::{Ingredient, Uuid},
};

/// Administrative seeding; ingredients are read-only through the HTTP
/// surface.
pub async fn create_ingredient(
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| ConflictError::IngredientExists.into())
}

pub async fn get_ingredient(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Name-prefix search via the `name` query parameter; unfiltered
/// listing otherwise. The ingredient catalog is small and served
/// unpaginated, as the original resource is.
pub async fn fetch_ingredients(
    filter: &IngredientFilter,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> = match &filter.name {
        Some(name) => {
            sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
                .bind(format!("{}%", escape_like(name)))
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
                .fetch_all(pool)
                .await
        }
    }
    .map_err(QueryError::from)?;

    Ok(rows)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_metacharacters() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
