use std::convert::Infallible;

use serde::de::DeserializeOwned;
use sqlx::{Pool, Postgres};
use warp::{Filter, Rejection, Reply};

use crate::{
    api::handlers,
    error::handle_rejection,
    middleware::{with_possible_session, with_session},
    schema::Uuid,
};

// Recipe images travel inline as base64, so the cap has to fit a photo.
const MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;

fn with_pool(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (Pool<Postgres>,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

/// The filters carry repeated keys (`tags`), so the query string is
/// parsed by hand instead of through `serde_urlencoded`.
fn raw_query() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::query::raw().or_else(|_| async { Ok::<(String,), Infallible>((String::new(),)) })
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// The full HTTP surface under `/api`, with every rejection translated
/// into a structured JSON error response.
///
/// Paths are matched before methods, so a miss on an unknown path stays
/// a 404 and only a known path with the wrong verb yields a 405.
pub fn api_routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let tag_list = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_tags);

    let tag_detail = warp::path!("api" / "tags" / Uuid)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_tag);

    let ingredient_list = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(raw_query())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_ingredients);

    let ingredient_detail = warp::path!("api" / "ingredients" / Uuid)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_ingredient);

    let recipe_list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(raw_query())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_recipes);

    let recipe_create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(json_body())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::create_recipe);

    let shopping_cart_download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::download_shopping_cart);

    let recipe_detail = warp::path!("api" / "recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_recipe);

    let recipe_update = warp::path!("api" / "recipes" / Uuid)
        .and(warp::patch())
        .and(json_body())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::update_recipe);

    let recipe_delete = warp::path!("api" / "recipes" / Uuid)
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::delete_recipe);

    let favorite_add = warp::path!("api" / "recipes" / Uuid / "favorite")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::favorite_recipe);

    let favorite_remove = warp::path!("api" / "recipes" / Uuid / "favorite")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::unfavorite_recipe);

    let shopping_cart_add = warp::path!("api" / "recipes" / Uuid / "shopping_cart")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::add_to_shopping_cart);

    let shopping_cart_remove = warp::path!("api" / "recipes" / Uuid / "shopping_cart")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::remove_from_shopping_cart);

    let user_register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body())
        .and(with_pool(pool.clone()))
        .and_then(handlers::register_user);

    let user_me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_me);

    let subscription_list = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(raw_query())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_subscriptions);

    let user_detail = warp::path!("api" / "users" / Uuid)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_user);

    let subscription_add = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::post())
        .and(raw_query())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::subscribe);

    let subscription_remove = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool))
        .and_then(handlers::unsubscribe);

    tag_list
        .or(tag_detail)
        .or(ingredient_list)
        .or(ingredient_detail)
        .or(recipe_list)
        .or(recipe_create)
        .or(shopping_cart_download)
        .or(recipe_detail)
        .or(recipe_update)
        .or(recipe_delete)
        .or(favorite_add)
        .or(favorite_remove)
        .or(shopping_cart_add)
        .or(shopping_cart_remove)
        .or(user_register)
        .or(user_me)
        .or(subscription_list)
        .or(user_detail)
        .or(subscription_add)
        .or(subscription_remove)
        .recover(handle_rejection)
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;
    use warp::http::StatusCode;

    use super::*;

    fn pool() -> Pool<Postgres> {
        // Lazy pool; no connection is made until a query runs.
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/unused")
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_path_is_structured_not_found() {
        let routes = api_routes(pool());
        let response = warp::test::request()
            .method("GET")
            .path("/api/nonsense")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], 404);
        assert_eq!(body["message"], "resource not found");
    }

    #[tokio::test]
    async fn wrong_verb_on_known_path_is_method_not_allowed() {
        let routes = api_routes(pool());
        let response = warp::test::request()
            .method("PUT")
            .path("/api/tags")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn mutations_require_a_session() {
        let routes = api_routes(pool());
        let response = warp::test::request()
            .method("DELETE")
            .path("/api/recipes/1")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let routes = api_routes(pool());
        let response = warp::test::request()
            .method("POST")
            .path("/api/users")
            .body("not json")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        let routes = api_routes(pool());
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes")
            .body("x".repeat(MAX_BODY_BYTES as usize + 1))
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], 413);
    }

    #[tokio::test]
    async fn shopping_cart_download_rejects_anonymous_callers() {
        let routes = api_routes(pool());
        let response = warp::test::request()
            .method("GET")
            .path("/api/recipes/download_shopping_cart")
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
