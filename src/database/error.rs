use thiserror::Error;
use warp::{http::StatusCode, reject::Rejection};

/// Field-scoped validation failure. The request is rejected before any
/// write happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Request-local failure taxonomy. None of these are retried and none are
/// fatal to the process.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid session; {0}")]
    InvalidSession(String),

    #[error("Query failed: {0}")]
    Query(#[from] QueryError),

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document rendering failed: {0}")]
    Render(String),
}

impl ApiError {
    pub fn conflict(info: &str) -> Self {
        Self::Conflict(info.to_string())
    }

    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_string())
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized(String::from(
            "You don't have permission to perform this action",
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidSession(_) => StatusCode::UNAUTHORIZED,
            ApiError::Query(_) | ApiError::Io(_) | ApiError::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl warp::reject::Reject for ApiError {}

/// Reply with the error's status and message, for use in a `recover`
/// filter at the routing layer.
pub fn handle_rejection(rejection: &Rejection) -> Option<impl warp::Reply> {
    let error = rejection.find::<ApiError>()?;
    Some(warp::reply::with_status(error.to_string(), error.status()))
}

/// Wrapper classifying driver errors. Unique-constraint rejections are
/// surfaced as conflicts so concurrent duplicate writes lose cleanly.
#[derive(Debug, Error)]
#[error("{info}")]
pub struct QueryError {
    info: String,
    conflict: bool,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            conflict: false,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.conflict
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => Self {
                conflict: e.is_unique_violation(),
                info: format!("{e}"),
            },
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            other => Self::new(format!("{other}")),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        let error = QueryError::from(value);
        if error.is_unique_violation() {
            ApiError::Conflict(error.info)
        } else {
            ApiError::Query(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let error: ApiError = ValidationError::new("cooking_time", "too small").into();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "cooking_time: too small");
    }

    #[test]
    fn taxonomy_status_codes() {
        assert_eq!(ApiError::conflict("dup").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::not_found("gone").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::unauthorized().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::InvalidSession(String::from("expired")).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Render(String::from("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_is_not_a_conflict() {
        let error = QueryError::from(sqlx::Error::RowNotFound);
        assert!(!error.is_unique_violation());
    }
}
