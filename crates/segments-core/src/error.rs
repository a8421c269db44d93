//! Error types for `segments-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("segment not found: {0}")]
  SegmentNotFound(String),

  /// One or more slugs in a membership request did not resolve. Carries every
  /// unresolved slug, in request order.
  #[error("segments not found: {}", .0.join(", "))]
  SegmentsNotFound(Vec<String>),

  /// A uniqueness constraint rejected the write (duplicate slug, or a
  /// concurrent insert of the same user/segment pair).
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
