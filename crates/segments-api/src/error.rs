//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("segments not found: {}", .0.join(", "))]
  SegmentsNotFound(Vec<String>),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("report i/o error: {0}")]
  Io(#[from] std::io::Error),
}

impl From<segments_core::Error> for ApiError {
  fn from(e: segments_core::Error) -> Self {
    use segments_core::Error as E;
    match e {
      E::UserNotFound(_) | E::SegmentNotFound(_) => ApiError::NotFound(e.to_string()),
      E::SegmentsNotFound(slugs) => ApiError::SegmentsNotFound(slugs),
      E::InvalidInput(m) => ApiError::BadRequest(m),
      E::Conflict(m) => ApiError::Conflict(m),
      E::Store(inner) => ApiError::Store(inner),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) | ApiError::SegmentsNotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Store(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
      warn!(error = %self, "request failed");
    }

    let body = match &self {
      ApiError::NotFound(m) | ApiError::BadRequest(m) | ApiError::Conflict(m) => {
        json!({ "error": m })
      }
      ApiError::SegmentsNotFound(slugs) => {
        json!({ "error": self.to_string(), "slugs": slugs })
      }
      ApiError::Store(_) | ApiError::Io(_) => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}
