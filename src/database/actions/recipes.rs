use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    error::{ApiError, ConflictError, QueryError},
    filter::RecipeFilter,
    jwt::SessionData,
    pagination::PageContext,
    permissions::ActionType,
    schema::{IngredientAmount, NewRecipe, Recipe, RecipeDetail, RecipeRow, Uuid},
    validation::validate_recipe,
};

use super::{relations, tags, users};

/// Builds the listing query. The per-caller flags are correlated
/// EXISTS checks against the join tables; for an anonymous caller both
/// are constant false and no existence check is emitted. The
/// `is_favorited` / `is_in_shopping_cart` filters only apply to
/// authenticated callers.
fn build_recipe_query(
    filter: &RecipeFilter,
    caller: Option<Uuid>,
) -> QueryBuilder<'static, Postgres> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.id, r.name, r.author_id, r.image, r.text, r.cooking_time, ");

    match caller {
        Some(user_id) => {
            query
                .push("EXISTS(SELECT 1 FROM user_favorites f WHERE f.user_id = ")
                .push_bind(user_id)
                .push(" AND f.recipe_id = r.id) AS is_favorited, ");
            query
                .push("EXISTS(SELECT 1 FROM user_shopping_cart c WHERE c.user_id = ")
                .push_bind(user_id)
                .push(" AND c.recipe_id = r.id) AS is_in_shopping_cart, ");
        }
        None => {
            query.push("FALSE AS is_favorited, FALSE AS is_in_shopping_cart, ");
        }
    }

    query.push("COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query.push(
            " AND r.id IN (SELECT m.recipe_id FROM recipe_tags_map m \
             INNER JOIN recipe_tags t ON t.id = m.tag_id WHERE t.slug IN (",
        );
        let mut slugs = query.separated(", ");
        for slug in &filter.tags {
            slugs.push_bind(slug.to_owned());
        }
        query.push("))");
    }

    if let Some(user_id) = caller {
        if filter.is_favorited {
            query
                .push(" AND EXISTS(SELECT 1 FROM user_favorites f WHERE f.user_id = ")
                .push_bind(user_id)
                .push(" AND f.recipe_id = r.id)");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS(SELECT 1 FROM user_shopping_cart c WHERE c.user_id = ")
                .push_bind(user_id)
                .push(" AND c.recipe_id = r.id)");
        }
    }

    query
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(filter.page.limit)
        .push(" OFFSET ")
        .push_bind(filter.page.offset());

    query
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    session: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, ApiError> {
    let caller = session.map(|session| session.user_id);

    let mut query = build_recipe_query(filter, caller);
    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, filter.page.limit, filter.page.page);
    Ok(page)
}

/// Listing page with each row expanded to its full projection. The
/// per-caller flags come from the listing query itself; tags,
/// ingredients and the author profile are fetched per row.
pub async fn fetch_recipe_details(
    filter: &RecipeFilter,
    session: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeDetail>, ApiError> {
    let page = fetch_recipes(filter, session, pool).await?;

    let mut details = Vec::with_capacity(page.rows.len());
    for row in &page.rows {
        let tags = tags::list_recipe_tags(row.id, pool).await?;
        let ingredients = list_recipe_ingredients(row.id, pool).await?;
        let author = users::get_profile(row.author_id, session, pool).await?;
        details.push(RecipeDetail {
            id: row.id,
            tags,
            author,
            ingredients,
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name.to_owned(),
            image: row.image.to_owned(),
            text: row.text.to_owned(),
            cooking_time: row.cooking_time,
        });
    }

    Ok(PageContext {
        rows: details,
        total_rows: page.total_rows,
        page: page.page,
        page_size: page.page_size,
        page_count: page.page_count,
    })
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Fetches a recipe for mutation: the caller must own it or hold the
/// manage-all permission.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(ApiError::Forbidden)
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(ApiError::not_found("recipe", id)),
    }
}

pub async fn list_recipe_ingredients(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<IngredientAmount>, ApiError> {
    let rows: Vec<IngredientAmount> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_recipe_detail(
    id: Uuid,
    session: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or(ApiError::NotFound { entity: "recipe", id })?;

    assemble_detail(recipe, session, pool).await
}

async fn assemble_detail(
    recipe: Recipe,
    session: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    let tags = tags::list_recipe_tags(recipe.id, pool).await?;
    let ingredients = list_recipe_ingredients(recipe.id, pool).await?;
    let author = users::get_profile(recipe.author_id, session, pool).await?;

    let (is_favorited, is_in_shopping_cart) = match session {
        Some(session) => (
            relations::is_favorite(recipe.id, session.user_id, pool).await?,
            relations::is_in_shopping_cart(recipe.id, session.user_id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetail {
        id: recipe.id,
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

/// Persists the recipe row and both association sets in a single
/// transaction: either all of them commit or none.
pub async fn create_recipe(
    new: &NewRecipe,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_recipe(new)?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    ensure_tags_exist(&new.tags, &mut tx).await?;
    ensure_ingredients_exist(new, &mut tx).await?;

    let row: Option<Recipe> = sqlx::query_as(
        "
        INSERT INTO recipes (name, author_id, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&new.name)
    .bind(session.user_id)
    .bind(&new.image)
    .bind(&new.text)
    .bind(new.cooking_time)
    .fetch_optional(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    let recipe = match row {
        Some(recipe) => recipe,
        None => return Err(ConflictError::RecipeExists.into()),
    };

    insert_links(recipe.id, new, &mut tx).await?;

    tx.commit().await.map_err(QueryError::from)?;
    log::debug!("user {} created recipe {}", session.user_id, recipe.id);

    assemble_detail(recipe, Some(session), pool).await
}

/// Updates the recipe row and replaces both association sets wholesale
/// (delete + bulk insert), all inside one transaction.
pub async fn update_recipe(
    id: Uuid,
    new: &NewRecipe,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    let recipe = get_recipe_mut(id, session, pool).await?;
    validate_recipe(new)?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    ensure_tags_exist(&new.tags, &mut tx).await?;
    ensure_ingredients_exist(new, &mut tx).await?;

    sqlx::query("UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4 WHERE id = $5")
        .bind(&new.name)
        .bind(&new.image)
        .bind(&new.text)
        .bind(new.cooking_time)
        .bind(recipe.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let query_error = QueryError::from(e);
            if query_error.is_unique_violation() {
                ConflictError::RecipeExists.into()
            } else {
                ApiError::from(query_error)
            }
        })?;

    sqlx::query("DELETE FROM recipe_tags_map WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    insert_links(recipe.id, new, &mut tx).await?;

    tx.commit().await.map_err(QueryError::from)?;

    let updated = Recipe {
        id: recipe.id,
        name: new.name.to_owned(),
        author_id: recipe.author_id,
        image: new.image.to_owned(),
        text: new.text.to_owned(),
        cooking_time: new.cooking_time,
    };
    assemble_detail(updated, Some(session), pool).await
}

/// Deletes the recipe; association rows cascade.
pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn ensure_tags_exist(
    ids: &[Uuid],
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT id FROM recipe_tags WHERE id IN (");
    let mut values = query.separated(", ");
    for id in ids {
        values.push_bind(*id);
    }
    query.push(")");

    let found: Vec<Uuid> = query
        .build_query_scalar()
        .fetch_all(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    match ids.iter().find(|id| !found.contains(*id)) {
        Some(missing) => Err(ApiError::not_found("tag", *missing)),
        None => Ok(()),
    }
}

async fn ensure_ingredients_exist(
    new: &NewRecipe,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT id FROM ingredients WHERE id IN (");
    let mut values = query.separated(", ");
    for ingredient in &new.ingredients {
        values.push_bind(ingredient.id);
    }
    query.push(")");

    let found: Vec<Uuid> = query
        .build_query_scalar()
        .fetch_all(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    match new
        .ingredients
        .iter()
        .find(|ingredient| !found.contains(&ingredient.id))
    {
        Some(missing) => Err(ApiError::not_found("ingredient", missing.id)),
        None => Ok(()),
    }
}

async fn insert_links(
    recipe_id: Uuid,
    new: &NewRecipe,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags_map (recipe_id, tag_id) ");
    query.push_values(new.tags.iter(), |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    query
        .build()
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query.push_values(new.ingredients.iter(), |mut row, ingredient| {
        row.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });
    query
        .build()
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PageQuery;

    fn filter() -> RecipeFilter {
        RecipeFilter {
            tags: vec![String::from("breakfast")],
            author: Some(3),
            is_favorited: true,
            is_in_shopping_cart: true,
            page: PageQuery::default(),
        }
    }

    #[test]
    fn anonymous_listing_runs_no_existence_checks() {
        let sql = build_recipe_query(&filter(), None).into_sql();
        assert!(sql.contains("FALSE AS is_favorited"));
        assert!(sql.contains("FALSE AS is_in_shopping_cart"));
        // The flag filters are ignored without a caller.
        assert!(!sql.contains("EXISTS"));
    }

    #[test]
    fn authenticated_listing_annotates_and_filters() {
        let sql = build_recipe_query(&filter(), Some(7)).into_sql();
        assert!(sql.contains("AS is_favorited"));
        assert!(sql.contains("AS is_in_shopping_cart"));
        assert!(sql.contains("AND EXISTS(SELECT 1 FROM user_favorites"));
        assert!(sql.contains("AND EXISTS(SELECT 1 FROM user_shopping_cart"));
    }

    #[test]
    fn tag_filter_matches_any_listed_slug() {
        let mut filter = filter();
        filter.tags = vec![String::from("breakfast"), String::from("dinner")];
        let sql = build_recipe_query(&filter, None).into_sql();
        assert!(sql.contains("t.slug IN ("));
    }

    #[test]
    fn unfiltered_listing_has_no_where_clauses() {
        let filter = RecipeFilter::default();
        let sql = build_recipe_query(&filter, None).into_sql();
        assert!(!sql.contains("AND r.author_id"));
        assert!(!sql.contains("t.slug"));
        assert!(sql.contains("ORDER BY r.id DESC"));
    }
}
