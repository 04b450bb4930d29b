//! HTTP-facing error type.

use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::collector::CollectionError;
use crate::github::IdentityError;
use crate::querier::QueryError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::Collection(error) => Self::Collection(error),
            QueryError::Store(error) => Self::Store(error),
        }
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

impl From<IdentityError> for ApiError {
    fn from(error: IdentityError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Collection(error) => match error {
                CollectionError::RepositoryNotFound { .. } | CollectionError::OwnerNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                CollectionError::RateLimited { .. } => StatusCode::FORBIDDEN,
                CollectionError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                CollectionError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                CollectionError::MalformedUpstreamResponse { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Collection(CollectionError::RateLimited {
                retry_after_secs: Some(secs),
            }) => format!("GitHub API rate limit exceeded. Retry after {secs} seconds."),
            Self::Store(_) => "Failed to access the metrics store".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        let mut response = (status, Json(json!({ "detail": self.detail() }))).into_response();
        if let Self::Collection(CollectionError::RateLimited {
            retry_after_secs: Some(secs),
        }) = &self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*secs));
        }
        response
    }
}
