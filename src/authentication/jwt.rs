use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::ApiError;
use crate::database::schema::{User, UserRole, Uuid};

use super::permissions::ActionType;

const SESSION_TTL_HOURS: i64 = 12;

/// Signed claims carried by the `session` cookie. Token issuance is the
/// job of the external auth collaborator sharing the secret; this core
/// only verifies and consumes the claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl SessionClaims {
    pub fn new(id: Uuid, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_TTL_HOURS)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// The per-request caller identity fact consumed by the actions.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.authenticate(self) {
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

impl From<SessionClaims> for SessionData {
    fn from(claims: SessionClaims) -> Self {
        SessionData {
            user_id: claims.user_id,
            username: claims.username,
            is_admin: claims.role == UserRole::Admin,
            role: claims.role,
        }
    }
}

fn signing_key() -> Hmac<Sha256> {
    let secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| String::from("secret"));
    // Hmac accepts keys of any length, so this cannot fail.
    Hmac::new_from_slice(secret.as_bytes()).unwrap()
}

pub fn generate_session(user: &User) -> String {
    let claims = SessionClaims::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims.sign_with_key(&signing_key()).unwrap()
}

pub fn verify_session(token: &str) -> Result<SessionClaims, ApiError> {
    token
        .verify_with_key(&signing_key())
        .map_err(|_| ApiError::Unauthenticated)
        .map(|claims: SessionClaims| {
            let now = Local::now().timestamp();

            if (claims.exp - now).is_negative() {
                return Err(ApiError::Unauthenticated);
            }
            Ok(claims)
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 3,
            username: String::from("alice"),
            email: String::from("alice@example.com"),
            first_name: String::from("Alice"),
            last_name: String::from("Cook"),
            password: String::from("$argon2id$stub"),
            role: UserRole::User,
        }
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let token = generate_session(&user());
        let claims = verify_session(&token).unwrap();
        assert_eq!(claims.user_id, 3);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, UserRole::User);
    }

    #[test]
    fn rejects_tampered_token() {
        let mut token = generate_session(&user());
        token.push('x');
        assert!(verify_session(&token).is_err());
    }

    #[test]
    fn session_data_carries_admin_flag() {
        let claims = SessionClaims::new(1, String::from("root"), UserRole::Admin);
        let session = SessionData::from(claims);
        assert!(session.is_admin);
    }
}
