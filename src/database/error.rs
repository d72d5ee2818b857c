use std::convert::Infallible;

use serde::Serialize;
use thiserror::Error;
use warp::{http::StatusCode, reject::Reject, reply, Rejection, Reply};

use crate::schema::Uuid;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("authentication required")]
    Unauthenticated,
    #[error("you don't have permission to perform this action")]
    Forbidden,
    #[error("{entity} with id {id} does not exist")]
    NotFound { entity: &'static str, id: Uuid },
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("shopping cart is empty")]
    EmptyCart,
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("failed to render shopping list: {0}")]
    Export(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) | ApiError::EmptyCart => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Query(_) | ApiError::Export(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl Reject for ApiError {}

/// Duplicate-relation and self-reference conflicts. Races on unique
/// relations are resolved by the store's constraint: the loser surfaces
/// one of these instead of silently succeeding twice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("cannot subscribe to yourself")]
    SelfSubscription,
    #[error("already subscribed to this author")]
    AlreadySubscribed,
    #[error("not subscribed to this author")]
    NotSubscribed,
    #[error("recipe is already in {0}")]
    AlreadyAdded(&'static str),
    #[error("recipe is not in {0}")]
    NotAdded(&'static str),
    #[error("a user with that username or email already exists")]
    UserExists,
    #[error("a tag with that name, color or slug already exists")]
    TagExists,
    #[error("an ingredient with that name already exists")]
    IngredientExists,
    #[error("a recipe with that name already exists")]
    RecipeExists,
}

#[derive(Debug, Error)]
#[error("{info}")]
pub struct QueryError {
    info: String,
    unique_violation: bool,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            unique_violation: false,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.unique_violation
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self {
                info: format!("{e}"),
                unique_violation: e.is_unique_violation(),
            },
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::AnyDriverError(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorMessage {
    status: u16,
    message: String,
}

/// Request-boundary translation of every rejection into a structured
/// JSON response. Nothing is retried; each request fails independently.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = err.find::<ApiError>() {
        if let ApiError::Query(query) = e {
            log::error!("query failed: {query}");
        }
        (e.status(), e.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("resource not found"))
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (
            StatusCode::BAD_REQUEST,
            String::from("invalid request body"),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            String::from("request body too large"),
        )
    } else if err.find::<warp::reject::MissingCookie>().is_some() {
        (
            StatusCode::UNAUTHORIZED,
            String::from("authentication required"),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            String::from("method not allowed"),
        )
    } else {
        log::error!("unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("internal server error"),
        )
    };

    Ok(reply::with_status(
        reply::json(&ErrorMessage {
            status: status.as_u16(),
            message,
        }),
        status,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(
            ApiError::from(ValidationError::EmptyTagList).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ConflictError::AlreadySubscribed).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::not_found("recipe", 7).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::EmptyCart.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflict_messages_are_descriptive() {
        assert_eq!(
            ConflictError::AlreadyAdded("favorites").to_string(),
            "recipe is already in favorites"
        );
        assert_eq!(
            ConflictError::SelfSubscription.to_string(),
            "cannot subscribe to yourself"
        );
    }
}
