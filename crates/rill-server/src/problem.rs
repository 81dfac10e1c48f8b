//! RFC 7807 problem responses.
//!
//! Every non-2xx management response is a problem document; the
//! adapter here is the single place service error kinds are mapped to
//! HTTP statuses. Streaming failures never reach it: once the stream
//! loop starts, headers are on the wire.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use rill_core::error::{ConsumerError, SubscriptionError};

/// A problem document and the status it travels with.
#[derive(Debug, Clone)]
pub struct Problem {
    status: StatusCode,
    detail: String,
}

impl Problem {
    /// Creates a problem with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// 400 with the given detail.
    #[must_use]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    /// 404 with the given detail.
    #[must_use]
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// 422 with the given detail.
    #[must_use]
    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }
}

#[derive(Debug, Serialize)]
struct ProblemBody {
    title: String,
    status: u16,
    detail: String,
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let body = ProblemBody {
            title: self
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (
            self.status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(body),
        )
            .into_response()
    }
}

impl From<SubscriptionError> for Problem {
    fn from(e: SubscriptionError) -> Self {
        let status = match &e {
            SubscriptionError::FeatureDisabled => StatusCode::NOT_IMPLEMENTED,
            SubscriptionError::Validation(_) => StatusCode::BAD_REQUEST,
            SubscriptionError::OwnerUnknown | SubscriptionError::MissingEventTypes(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SubscriptionError::ScopeDenied(_) => StatusCode::FORBIDDEN,
            SubscriptionError::NotFound => StatusCode::NOT_FOUND,
            SubscriptionError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Unavailable and internal details stay in the logs.
        let detail = match &e {
            SubscriptionError::Unavailable(_) => "service temporarily unavailable".to_string(),
            SubscriptionError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        Problem::new(status, detail)
    }
}

impl From<ConsumerError> for Problem {
    fn from(e: ConsumerError) -> Self {
        match &e {
            ConsumerError::InvalidCursor(_) => {
                Problem::new(StatusCode::PRECONDITION_FAILED, e.to_string())
            }
            _ => Problem::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "backing log temporarily unavailable",
            ),
        }
    }
}
