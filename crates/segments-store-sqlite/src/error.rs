//! Error type for `segments-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown history operation: {0:?}")]
  UnknownOperation(String),

  #[error("segment slug {0:?} already exists")]
  SlugTaken(String),

  #[error("user {user_id} is already assigned to segment {segment_id}")]
  AlreadyAssigned { user_id: Uuid, segment_id: Uuid },

  #[error("user {0} no longer exists")]
  UserGone(Uuid),

  #[error("segment {0} no longer exists")]
  SegmentGone(Uuid),
}

impl From<Error> for segments_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::SlugTaken(_) | Error::AlreadyAssigned { .. } => {
        segments_core::Error::Conflict(e.to_string())
      }
      Error::UserGone(user_id) => segments_core::Error::UserNotFound(user_id),
      Error::SegmentGone(segment_id) => {
        segments_core::Error::SegmentNotFound(segment_id.to_string())
      }
      other => segments_core::Error::Store(Box::new(other)),
    }
  }
}

/// True if the failure was a UNIQUE or PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(e: &tokio_rusqlite::Error) -> bool {
  matches!(
    e,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

/// True if the failure was a FOREIGN KEY constraint violation.
pub(crate) fn is_foreign_key_violation(e: &tokio_rusqlite::Error) -> bool {
  matches!(
    e,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
  )
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
