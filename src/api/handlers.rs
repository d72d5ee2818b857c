use sqlx::{Pool, Postgres};
use warp::{
    http::{header, Response, StatusCode},
    reject, reply, Rejection, Reply,
};

use crate::{
    actions::{
        ingredients, recipes,
        relations::{self, RecipeRelation},
        subscriptions, tags, users,
    },
    constants::SHOPPING_LIST_FILENAME,
    error::ApiError,
    export,
    filter::{IngredientFilter, RecipeFilter, SubscriptionQuery},
    jwt::SessionData,
    schema::{NewRecipe, NewUser, Uuid},
};

fn custom(error: ApiError) -> Rejection {
    reject::custom(error)
}

pub async fn list_tags(pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let list = tags::list_tags(&pool).await.map_err(custom)?;
    Ok(reply::json(&list))
}

pub async fn get_tag(id: Uuid, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let tag = tags::get_tag(id, &pool)
        .await
        .map_err(custom)?
        .ok_or_else(|| custom(ApiError::not_found("tag", id)))?;
    Ok(reply::json(&tag))
}

pub async fn list_ingredients(raw: String, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let filter = IngredientFilter::parse(&raw);
    let list = ingredients::fetch_ingredients(&filter, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::json(&list))
}

pub async fn get_ingredient(id: Uuid, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let ingredient = ingredients::get_ingredient(id, &pool)
        .await
        .map_err(custom)?
        .ok_or_else(|| custom(ApiError::not_found("ingredient", id)))?;
    Ok(reply::json(&ingredient))
}

pub async fn list_recipes(
    raw: String,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let filter = RecipeFilter::parse(&raw);
    let page = recipes::fetch_recipe_details(&filter, session.as_ref(), &pool)
        .await
        .map_err(custom)?;
    Ok(reply::json(&page))
}

pub async fn get_recipe(
    id: Uuid,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let detail = recipes::get_recipe_detail(id, session.as_ref(), &pool)
        .await
        .map_err(custom)?;
    Ok(reply::json(&detail))
}

pub async fn create_recipe(
    new: NewRecipe,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let detail = recipes::create_recipe(&new, &session, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::with_status(
        reply::json(&detail),
        StatusCode::CREATED,
    ))
}

pub async fn update_recipe(
    id: Uuid,
    new: NewRecipe,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let detail = recipes::update_recipe(id, &new, &session, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::json(&detail))
}

pub async fn delete_recipe(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    recipes::delete_recipe(id, &session, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

async fn add_relation(
    relation: RecipeRelation,
    recipe_id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = relations::add_recipe_relation(relation, recipe_id, session.user_id, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::with_status(
        reply::json(&recipe),
        StatusCode::CREATED,
    ))
}

async fn remove_relation(
    relation: RecipeRelation,
    recipe_id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    relations::remove_recipe_relation(relation, recipe_id, session.user_id, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

pub async fn favorite_recipe(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    add_relation(RecipeRelation::Favorites, id, session, pool).await
}

pub async fn unfavorite_recipe(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    remove_relation(RecipeRelation::Favorites, id, session, pool).await
}

pub async fn add_to_shopping_cart(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    add_relation(RecipeRelation::ShoppingCart, id, session, pool).await
}

pub async fn remove_from_shopping_cart(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    remove_relation(RecipeRelation::ShoppingCart, id, session, pool).await
}

/// Streams the aggregated cart as a PDF attachment.
pub async fn download_shopping_cart(
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let bytes = export::build_shopping_list(session.user_id, &pool)
        .await
        .map_err(custom)?;

    Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
        )
        .body(bytes)
        .map_err(|e| custom(ApiError::Internal(e.to_string())))
}

pub async fn register_user(new_user: NewUser, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let user = users::create_user(&new_user, &pool).await.map_err(custom)?;
    Ok(reply::with_status(reply::json(&user), StatusCode::CREATED))
}

pub async fn get_user(
    id: Uuid,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let profile = users::get_profile(id, session.as_ref(), &pool)
        .await
        .map_err(custom)?;
    Ok(reply::json(&profile))
}

pub async fn get_me(session: SessionData, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let profile = users::get_profile(session.user_id, Some(&session), &pool)
        .await
        .map_err(custom)?;
    Ok(reply::json(&profile))
}

pub async fn list_subscriptions(
    raw: String,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let query = SubscriptionQuery::parse(&raw);
    let page = subscriptions::fetch_subscriptions(&session, &query, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::json(&page))
}

pub async fn subscribe(
    author_id: Uuid,
    raw: String,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let query = SubscriptionQuery::parse(&raw);
    let profile = subscriptions::subscribe(&session, author_id, &query, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::with_status(
        reply::json(&profile),
        StatusCode::CREATED,
    ))
}

pub async fn unsubscribe(
    author_id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    subscriptions::unsubscribe(&session, author_id, &pool)
        .await
        .map_err(custom)?;
    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}
