use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::catalog::DatasetNotFound;
use crate::matching::{MatchError, UnknownAlgorithm};
use crate::search::backend::BackendError;
use crate::search::text::SearchError;

/// Errors answered for a whole request
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub error_type: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Match(_)
            | ApiError::Search(SearchError::InvalidSchema(_) | SearchError::InvalidParameter(_))
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Search(SearchError::Backend(err)) | ApiError::Backend(err) => {
                StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::Match(MatchError::BatchTooLarge { .. }) => "BatchTooLarge",
            ApiError::Match(MatchError::EmptyBatch) => "EmptyBatch",
            ApiError::Match(MatchError::UnknownAlgorithm(_)) => "UnknownAlgorithm",
            ApiError::Match(MatchError::LimitTooLarge { .. })
            | ApiError::Search(SearchError::InvalidSchema(_) | SearchError::InvalidParameter(_)) => {
                "InvalidParameter"
            }
            ApiError::Search(SearchError::Backend(_)) | ApiError::Backend(_) => "BackendError",
            ApiError::BadRequest(_) => "InvalidRequest",
            ApiError::NotFound(_) => "NotFound",
            ApiError::PayloadTooLarge(_) => "PayloadTooLarge",
            ApiError::Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{self}");
        }
        let body = ErrorResponse {
            detail: self.to_string(),
            error_type: self.error_type().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DatasetNotFound> for ApiError {
    fn from(err: DatasetNotFound) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<UnknownAlgorithm> for ApiError {
    fn from(err: UnknownAlgorithm) -> Self {
        ApiError::Match(MatchError::UnknownAlgorithm(err))
    }
}
