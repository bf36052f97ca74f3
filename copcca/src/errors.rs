use crate::db::errors::DbError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Caller is authenticated but not allowed to do this
    #[error("Insufficient permissions: {reason}")]
    InsufficientPermissions { reason: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Resource already exists. `details` is merged into the response body.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Rate limiter rejected the caller
    #[error("{message}")]
    TooManyRequests { message: String, retry_after_secs: u64 },

    /// Plan or credit balance does not allow the operation
    #[error("{message}")]
    PaymentRequired { message: String },

    /// A third-party integration is not configured or unreachable
    #[error("{message}")]
    ServiceUnavailable { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Storage operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::Serialization(_) | DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Unauthorized".to_string()),
            Error::InsufficientPermissions { reason } => reason.clone(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, .. } => format!("{resource} not found"),
            Error::Conflict { message, .. } => message.clone(),
            Error::TooManyRequests { message, .. } => message.clone(),
            Error::PaymentRequired { message } => message.clone(),
            Error::ServiceUnavailable { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(DbError::NotFound) => "Resource not found".to_string(),
            Error::Database(DbError::UniqueViolation { conflicting_value, .. }) => match conflicting_value {
                Some(value) => format!("{value} already exists"),
                None => "Resource already exists".to_string(),
            },
            Error::Database(_) => "Database error occurred".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// Shorthand for the common "admin only" rejection
    pub fn admin_required() -> Self {
        Error::InsufficientPermissions {
            reason: "Admin access required".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::UniqueViolation { .. }) => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Database(_) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::ServiceUnavailable { .. } => {
                tracing::warn!("Integration unavailable: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } | Error::TooManyRequests { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::Conflict { .. } | Error::PaymentRequired { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let mut body = json!({ "error": self.user_message() });

        match &self {
            Error::Conflict {
                details: Some(serde_json::Value::Object(extra)),
                ..
            } => {
                if let Some(obj) = body.as_object_mut() {
                    obj.extend(extra.clone());
                }
            }
            Error::TooManyRequests { retry_after_secs, .. } => {
                body["retryAfter"] = json!(retry_after_secs);
                let mut response = (status, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::admin_required().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::TooManyRequests {
                message: "slow down".into(),
                retry_after_secs: 60
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(Error::Database(DbError::NotFound).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = Error::Internal {
            operation: "open secret vault".into(),
        };
        assert_eq!(err.user_message(), "Internal server error");

        let err = Error::NotFound {
            resource: "Task".into(),
            id: "42".into(),
        };
        assert_eq!(err.user_message(), "Task not found");
    }

    #[tokio::test]
    async fn test_conflict_details_are_merged() {
        let err = Error::Conflict {
            message: "already registered".into(),
            details: Some(json!({ "userExists": true })),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "already registered");
        assert_eq!(body["userExists"], true);
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = Error::TooManyRequests {
            message: "Too many attempts".into(),
            retry_after_secs: 120,
        }
        .into_response();
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "120");
    }
}
