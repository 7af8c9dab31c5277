use warp::{reject::Rejection, Filter};

use crate::database::error::ApiError;

use super::jwt::{verify_session_token, SessionData};

const SESSION_COOKIE: &str = "session";

/// Requires a valid session cookie; extracts the acting principal.
pub fn with_session(
    secret: String,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::cookie::<String>(SESSION_COOKIE).and_then(move |token: String| {
        let secret = secret.clone();
        async move {
            match verify_session_token(&token, &secret) {
                Ok(data) => Ok(SessionData::from(data)),
                Err(error) => Err(Rejection::from(error)),
            }
        }
    })
}

/// Extracts the principal when a valid session cookie is present;
/// anonymous requests pass through as `None`.
pub fn with_possible_session(
    secret: String,
) -> impl Filter<Extract = (Option<SessionData>,), Error = std::convert::Infallible> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE).map(move |token: Option<String>| {
        token
            .and_then(|token| verify_session_token(&token, &secret).ok())
            .map(SessionData::from)
    })
}

/// Requires a valid session without extracting it.
pub fn with_auth(secret: String) -> impl Filter<Extract = ((),), Error = Rejection> + Clone {
    warp::cookie::<String>(SESSION_COOKIE).and_then(move |token: String| {
        let secret = secret.clone();
        async move {
            match verify_session_token(&token, &secret) {
                Ok(_) => Ok(()),
                Err(_) => Err(Rejection::from(ApiError::InvalidSession(String::from(
                    "Missing or invalid session cookie",
                )))),
            }
        }
    })
}
