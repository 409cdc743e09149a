use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use referrer_core::error::ReferrerError;
use serde_json::json;

/// Error responses produced by the HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    /// 400 with one message per failed field.
    Validation(Vec<String>),
    /// Missing or malformed bearer token.
    MissingToken,
    Forbidden(String),
    NotFound,
    RateLimited { retry_after_secs: u64 },
    /// Google rejected the request with this status.
    GoogleApi { status: u16, message: String },
    /// Refresh or authorization grant no longer valid.
    AuthExpired,
    /// Anything else; `message` is only set when errors are exposed.
    Internal { message: Option<String> },
}

impl ApiError {
    /// Map a library error, hiding internals unless `expose` is set.
    pub fn upstream(err: ReferrerError, expose: bool) -> Self {
        tracing::error!("Unhandled error: {}", err);

        if err.is_invalid_grant() {
            return ApiError::AuthExpired;
        }
        match err {
            ReferrerError::GoogleApi { status, message } => ApiError::GoogleApi { status, message },
            other => ApiError::Internal {
                message: expose.then(|| other.to_string()),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingToken | ApiError::AuthExpired => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::GoogleApi { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(details) => json!({
                "error": "Validation failed",
                "details": details,
            }),
            ApiError::MissingToken => json!({ "error": "Access token required" }),
            ApiError::Forbidden(msg) => json!({ "error": msg }),
            ApiError::NotFound => json!({ "error": "Route not found" }),
            ApiError::RateLimited { .. } => json!({
                "error": "Too many requests from this IP, please try again later.",
            }),
            ApiError::GoogleApi { message, .. } => json!({
                "error": "Google API Error",
                "message": message,
            }),
            ApiError::AuthExpired => json!({
                "error": "Authentication expired",
                "message": "Please re-authenticate with Google",
            }),
            ApiError::Internal { message } => json!({
                "error": "Internal Server Error",
                "message": message.as_deref().unwrap_or("Something went wrong"),
            }),
        };

        let mut resp = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_error_keeps_status() {
        let err = ApiError::upstream(
            ReferrerError::GoogleApi {
                status: 403,
                message: "PERMISSION_DENIED".into(),
            },
            false,
        );
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_invalid_grant_maps_to_auth_expired() {
        let err = ApiError::upstream(ReferrerError::OAuth("invalid_grant (400): expired".into()), false);
        assert!(matches!(err, ApiError::AuthExpired));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_message_hidden_by_default() {
        let hidden = ApiError::upstream(ReferrerError::Config("missing secret".into()), false);
        assert!(matches!(hidden, ApiError::Internal { message: None }));

        let shown = ApiError::upstream(ReferrerError::Config("missing secret".into()), true);
        match shown {
            ApiError::Internal { message: Some(m) } => assert!(m.contains("missing secret")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let resp = ApiError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "42");
    }
}
