use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::ApiError;
use crate::database::schema::{User, UserRole};

use super::permissions::ActionType;

const SESSION_LIFETIME_HOURS: i64 = 1;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, username: String, role: UserRole) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }

    #[cfg(test)]
    fn expired(id: i32, username: String, role: UserRole) -> Self {
        let now = Utc::now().timestamp();
        Self {
            user_id: id,
            username,
            role,
            iat: now - 7200,
            exp: now - 3600,
        }
    }
}

/// The acting principal of a request, decoded from a session token.
/// Anonymous requests are represented as `Option<SessionData>::None` at
/// the filter layer.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authorize(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.permitted(self) {
            return Err(ApiError::unauthorized());
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|_| ApiError::InvalidSession(String::from("Invalid signing key")))
}

pub fn generate_session_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.clone(), user.role.clone());

    claims
        .sign_with_key(&key)
        .map_err(|_| ApiError::InvalidSession(String::from("Failed to sign token")))
}

pub fn verify_session_token(token: &str, secret: &str) -> Result<JwtSessionData, ApiError> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ApiError::InvalidSession(String::from("Invalid token")))?;

    if session.exp <= Utc::now().timestamp() {
        return Err(ApiError::InvalidSession(String::from("Token expired")));
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: String::from("cook@example.org"),
            username: String::from("cook"),
            first_name: String::new(),
            last_name: String::new(),
            password: String::from("hashed"),
            role: UserRole::User,
        }
    }

    #[test]
    fn sign_then_verify() {
        let token = generate_session_token(&user(), "test-secret").unwrap();
        let session = verify_session_token(&token, "test-secret").unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "cook");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = generate_session_token(&user(), "test-secret").unwrap();
        assert!(verify_session_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let claims = JwtSessionData::expired(7, String::from("cook"), UserRole::User);
        let key: Hmac<Sha256> = Hmac::new_from_slice(b"test-secret").unwrap();
        let token = claims.sign_with_key(&key).unwrap();
        assert!(verify_session_token(&token, "test-secret").is_err());
    }

    #[test]
    fn admin_flag_propagates() {
        let claims = JwtSessionData::new(1, String::from("root"), UserRole::Admin);
        let session = SessionData::from(claims);
        assert!(session.is_admin);
    }
}
