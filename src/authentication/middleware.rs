use warp::{reject, Filter, Rejection};

use crate::database::error::ApiError;

use super::jwt::{verify_session, SessionData};

/// Extracts the caller identity, treating a missing or invalid cookie
/// as an anonymous caller.
pub fn with_possible_session(
) -> impl Filter<Extract = (Option<SessionData>,), Error = std::convert::Infallible> + Copy {
    warp::cookie::optional::<String>("session").map(|cookie: Option<String>| {
        cookie
            .and_then(|token| verify_session(&token).ok())
            .map(SessionData::from)
    })
}

/// Requires an authenticated caller; anonymous requests are rejected
/// with a 401 at the request boundary.
pub fn with_session() -> impl Filter<Extract = (SessionData,), Error = Rejection> + Copy {
    with_possible_session().and_then(|session: Option<SessionData>| async move {
        session.ok_or_else(|| reject::custom(ApiError::Unauthenticated))
    })
}
