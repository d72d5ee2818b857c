use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, ConflictError, QueryError},
    filter::SubscriptionQuery,
    jwt::SessionData,
    pagination::PageContext,
    schema::{RecipeMinimal, SubscriptionProfile, User, Uuid},
};

use super::users;

fn cap_recipes(mut recipes: Vec<RecipeMinimal>, limit: Option<i64>) -> Vec<RecipeMinimal> {
    if let Some(limit) = limit {
        recipes.truncate(limit.max(0) as usize);
    }
    recipes
}

/// Author profile annotated with their recipes (capped by
/// `recipes_limit`) and the uncapped total.
async fn subscription_profile(
    author: &User,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionProfile, ApiError> {
    let recipes: Vec<RecipeMinimal> = sqlx::query_as(
        "SELECT id, name, image, cooking_time FROM recipes WHERE author_id = $1 ORDER BY id DESC",
    )
    .bind(author.id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let recipes_count = recipes.len() as i64;
    let recipes = cap_recipes(recipes, recipes_limit);

    Ok(SubscriptionProfile {
        email: author.email.to_owned(),
        id: author.id,
        username: author.username.to_owned(),
        first_name: author.first_name.to_owned(),
        last_name: author.last_name.to_owned(),
        is_subscribed: true,
        recipes,
        recipes_count,
    })
}

pub async fn subscribe(
    session: &SessionData,
    author_id: Uuid,
    query: &SubscriptionQuery,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionProfile, ApiError> {
    if author_id == session.user_id {
        return Err(ConflictError::SelfSubscription.into());
    }

    let author = users::get_user_by_id(pool, author_id)
        .await?
        .ok_or(ApiError::not_found("user", author_id))?;

    let result = sqlx::query(
        "INSERT INTO user_subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::AlreadySubscribed.into());
    }

    log::debug!("user {} subscribed to {}", session.user_id, author_id);
    subscription_profile(&author, query.recipes_limit, pool).await
}

pub async fn unsubscribe(
    session: &SessionData,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    users::get_user_by_id(pool, author_id)
        .await?
        .ok_or(ApiError::not_found("user", author_id))?;

    let result =
        sqlx::query("DELETE FROM user_subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(session.user_id)
            .bind(author_id)
            .execute(pool)
            .await
            .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ConflictError::NotSubscribed.into());
    }

    Ok(())
}

/// Paginated list of the caller's subscriptions, each annotated with
/// the author's capped recipe list.
pub async fn fetch_subscriptions(
    session: &SessionData,
    query: &SubscriptionQuery,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionProfile>, ApiError> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "
        SELECT s.author_id, COUNT(*) OVER() AS count
        FROM user_subscriptions s
        WHERE s.user_id = $1
        ORDER BY s.author_id DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(query.page.limit)
    .bind(query.page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|(_, count)| *count).unwrap_or(0);

    let mut profiles = Vec::with_capacity(rows.len());
    for (author_id, _) in rows {
        let author = users::get_user_by_id(pool, author_id)
            .await?
            .ok_or(ApiError::not_found("user", author_id))?;
        profiles.push(subscription_profile(&author, query.recipes_limit, pool).await?);
    }

    Ok(PageContext::from_rows(
        profiles,
        total_count,
        query.page.limit,
        query.page.page,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipes(n: i64) -> Vec<RecipeMinimal> {
        (1..=n)
            .map(|id| RecipeMinimal {
                id: id as i32,
                name: format!("recipe-{id}"),
                image: String::new(),
                cooking_time: 10,
            })
            .collect()
    }

    #[test]
    fn caps_embedded_recipes_but_not_the_count() {
        let all = recipes(3);
        let total = all.len() as i64;
        let capped = cap_recipes(all, Some(2));
        assert_eq!(capped.len(), 2);
        assert_eq!(total, 3);
    }

    #[test]
    fn no_limit_keeps_everything() {
        assert_eq!(cap_recipes(recipes(4), None).len(), 4);
    }
}
