use std::time::Duration;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

use parley_db::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(e) => match e {
                StoreError::Validation(_) => StatusCode::BAD_REQUEST,
                StoreError::Conflict(_) => StatusCode::CONFLICT,
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                StoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(e) => e.kind(),
            Self::BadRequest(_) => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Timeout(_) => "transient",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self);
            "server error".to_string()
        } else {
            if status.is_server_error() {
                warn!("{}", self);
            } else {
                debug!("request rejected: {}", self);
            }
            self.to_string()
        };

        let body = Json(json!({
            "code": status.as_u16(),
            "kind": self.kind(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (StoreError::Conflict("x".into()), StatusCode::CONFLICT),
            (StoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (StoreError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (StoreError::Transient("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn timeout_is_transient() {
        let err = ApiError::Timeout(Duration::from_millis(5));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.kind(), "transient");
    }
}
