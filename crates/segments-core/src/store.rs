//! The `SegmentStore` trait: the persistence capability set.
//!
//! The trait is implemented by storage backends (`segments-store-sqlite`, and
//! [`crate::memory::MemoryStore`] for tests). It contains no business rules:
//! override semantics, history emission and batch ordering live in
//! [`crate::service::AssignmentService`].

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  assignment::{Assignment, AssignmentWrite, HistoryRecord, NewHistoryEntry},
  segment::{NewSegment, Segment, SegmentUpdate},
  user::{User, UserWithSegments},
};

/// Abstraction over a segment store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`). Backend errors must convert into
/// [`crate::Error`]; uniqueness violations are expected to become
/// [`crate::Error::Conflict`].
pub trait SegmentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Users ─────────────────────────────────────────────────────────────

  fn create_user(
    &self,
    name: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Delete a user and, by cascade, its assignments. Returns `false` if the
  /// user did not exist.
  fn delete_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn user_exists(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Every user with the slugs of its assignments that are still live at
  /// `now`.
  fn list_users_with_segments(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<UserWithSegments>, Self::Error>> + Send + '_;

  /// Returns `None` if the user does not exist.
  fn fetch_user_with_segments(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<UserWithSegments>, Self::Error>> + Send + '_;

  // ── Segments ──────────────────────────────────────────────────────────

  /// Fails with a conflict if the slug is taken.
  fn create_segment(
    &self,
    input: NewSegment,
  ) -> impl Future<Output = Result<Segment, Self::Error>> + Send + '_;

  fn list_segments(
    &self,
  ) -> impl Future<Output = Result<Vec<Segment>, Self::Error>> + Send + '_;

  fn find_segment(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<Option<Segment>, Self::Error>> + Send + '_;

  /// Returns `None` if no segment has `slug`.
  fn update_segment(
    &self,
    slug: String,
    update: SegmentUpdate,
  ) -> impl Future<Output = Result<Option<Segment>, Self::Error>> + Send + '_;

  /// Delete a segment and, by cascade, its assignments. Returns `false` if
  /// the slug did not exist.
  fn delete_segment(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Assignments ───────────────────────────────────────────────────────

  /// The physical row for the pair, expired or not.
  fn find_assignment(
    &self,
    user_id: Uuid,
    segment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Assignment>, Self::Error>> + Send + '_;

  /// Apply `write` and append `entry` as one unit of work: either both are
  /// persisted or neither is.
  ///
  /// Returns whether the write changed a row. The history entry is appended
  /// even when it did not (e.g. deleting an absent assignment).
  fn apply(
    &self,
    write: AssignmentWrite,
    entry: NewHistoryEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove every assignment with `delete_at < now`; returns the number of
  /// rows removed. Writes no history.
  fn delete_expired(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── History ───────────────────────────────────────────────────────────

  /// History entries with `from <= operation_at < until`, joined with their
  /// segment slug, oldest first. Entries whose segment no longer exists are
  /// omitted.
  fn history_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<HistoryRecord>, Self::Error>> + Send + '_;
}
