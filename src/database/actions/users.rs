use sqlx::{Pool, Postgres};

use crate::{
    authentication::cryptography::hash_password,
    error::{ApiError, ConflictError, QueryError},
    jwt::SessionData,
    schema::{NewUser, User, UserProfile, Uuid},
    validation::{validate_password, validate_username},
};

pub async fn get_user(pool: &Pool<Postgres>, username: &str) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Validates the username and password, hashes the password and stores
/// the user. Duplicate username or email surfaces as a conflict.
pub async fn create_user(new_user: &NewUser, pool: &Pool<Postgres>) -> Result<User, ApiError> {
    validate_username(&new_user.username)?;
    validate_password(&new_user.password, &new_user.username)?;

    let password =
        hash_password(&new_user.password).map_err(|e| ApiError::Internal(e.to_string()))?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    match row {
        Some(user) => {
            log::debug!("registered user {}", user.username);
            Ok(user)
        }
        None => Err(ConflictError::UserExists.into()),
    }
}

/// Profile projection with the per-caller `is_subscribed` flag. For an
/// anonymous caller the flag is constant false and no existence check
/// is run.
pub async fn get_profile(
    user_id: Uuid,
    session: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, ApiError> {
    let row: Option<UserProfile> = match session {
        Some(session) => {
            sqlx::query_as(
                "
                SELECT u.email, u.id, u.username, u.first_name, u.last_name,
                    EXISTS(
                        SELECT 1 FROM user_subscriptions s
                        WHERE s.user_id = $2 AND s.author_id = u.id
                    ) AS is_subscribed
                FROM users u WHERE u.id = $1
            ",
            )
            .bind(user_id)
            .bind(session.user_id)
            .fetch_optional(pool)
            .await
        }
        None => {
            sqlx::query_as(
                "
                SELECT u.email, u.id, u.username, u.first_name, u.last_name,
                    FALSE AS is_subscribed
                FROM users u WHERE u.id = $1
            ",
            )
            .bind(user_id)
            .fetch_optional(pool)
            .await
        }
    }
    .map_err(QueryError::from)?;

    row.ok_or(ApiError::not_found("user", user_id))
}
