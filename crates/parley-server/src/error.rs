use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use parley_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn kind(&self) -> &'static str {
        match self {
            ServerError::NotFound(_) => "not_found",
            ServerError::InvalidArgument(_) => "invalid_argument",
            ServerError::PermissionDenied(_) => "permission_denied",
            ServerError::RateLimited { .. } => "rate_limited",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidArgument(msg) => ServerError::InvalidArgument(msg),
            StoreError::PermissionDenied(msg) => ServerError::PermissionDenied(msg),
            other => {
                tracing::error!(error = %other, "store failure");
                ServerError::Internal(other.to_string())
            }
        }
    }
}

impl From<PathRejection> for ServerError {
    fn from(e: PathRejection) -> Self {
        ServerError::InvalidArgument(e.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(e: QueryRejection) -> Self {
        ServerError::InvalidArgument(e.body_text())
    }
}

impl From<JsonRejection> for ServerError {
    fn from(e: JsonRejection) -> Self {
        ServerError::InvalidArgument(e.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::PermissionDenied(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = serde_json::json!({
            "error": message,
            "kind": self.kind(),
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let ServerError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, retry_after_secs.into());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_their_kind() {
        let e: ServerError = StoreError::InvalidArgument("same user".into()).into();
        assert_eq!(e.into_response().status(), StatusCode::BAD_REQUEST);

        let e: ServerError = StoreError::PermissionDenied("not yours".into()).into();
        assert_eq!(e.into_response().status(), StatusCode::FORBIDDEN);

        let e: ServerError = StoreError::Migration("boom".into()).into();
        assert_eq!(e.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ServerError::RateLimited { retry_after_secs: 2 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
