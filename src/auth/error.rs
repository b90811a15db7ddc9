use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug)]
pub enum AuthError {
    /// Path requires a principal and none is present (API surface: no redirect)
    AuthenticationRequired,

    /// Path requires a principal and the request is an interactive browser
    /// navigation: redirect into the login flow instead of failing
    LoginRequired { redirect_url: String },

    /// Provider token exchange or ID token decoding failed. Terminal for
    /// this login attempt; the user must re-initiate.
    LoginFailed(String),

    /// ID token could not be decoded or failed claim validation
    InvalidToken,

    /// Authorization state or ID token has expired
    ExpiredToken,

    /// Session not found
    SessionNotFound,

    /// Session has expired
    SessionExpired,

    /// State-mutating request without a valid CSRF token
    CsrfRejected,

    /// Internal error during authentication
    Internal(String),
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn with_type(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                error_type: error_type.into(),
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                "authentication_required",
                "Authentication required".to_string(),
            ),
            AuthError::LoginRequired { redirect_url } => {
                // A redirect into the login flow, not an error
                return Response::builder()
                    .status(StatusCode::FOUND)
                    .header("Location", redirect_url.as_str())
                    .body(axum::body::Body::empty())
                    .unwrap_or_else(|_| StatusCode::FOUND.into_response());
            }
            AuthError::LoginFailed(msg) => (
                StatusCode::FORBIDDEN,
                "login_failed",
                format!("Login failed: {}", msg),
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid authentication token".to_string(),
            ),
            AuthError::ExpiredToken => (
                StatusCode::UNAUTHORIZED,
                "expired_token",
                "Authentication token has expired".to_string(),
            ),
            AuthError::SessionNotFound => (
                StatusCode::UNAUTHORIZED,
                "session_not_found",
                "Session not found".to_string(),
            ),
            AuthError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "session_expired",
                "Session has expired".to_string(),
            ),
            AuthError::CsrfRejected => (
                StatusCode::FORBIDDEN,
                "csrf_rejected",
                "Missing or invalid CSRF token".to_string(),
            ),
            AuthError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
        };

        let body = ErrorResponse::with_type("authentication_error", code, message);
        (status, Json(body)).into_response()
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::AuthenticationRequired => write!(f, "Authentication required"),
            AuthError::LoginRequired { redirect_url } => {
                write!(f, "Login required: {}", redirect_url)
            }
            AuthError::LoginFailed(msg) => write!(f, "Login failed: {}", msg),
            AuthError::InvalidToken => write!(f, "Invalid authentication token"),
            AuthError::ExpiredToken => write!(f, "Authentication token has expired"),
            AuthError::SessionNotFound => write!(f, "Session not found"),
            AuthError::SessionExpired => write!(f, "Session has expired"),
            AuthError::CsrfRejected => write!(f, "Missing or invalid CSRF token"),
            AuthError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_required_is_401() {
        let response = AuthError::AuthenticationRequired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn login_failed_is_403() {
        let response = AuthError::LoginFailed("exchange refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn csrf_rejected_is_403() {
        let response = AuthError::CsrfRejected.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn login_required_is_a_redirect() {
        let response = AuthError::LoginRequired {
            redirect_url: "/login".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get("Location").and_then(|v| v.to_str().ok()),
            Some("/login")
        );
    }
}
