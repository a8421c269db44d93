//! Assignments and history entries.
//!
//! An assignment is a time-bounded membership of a user in a segment. History
//! entries are the append-only audit trail of explicit membership changes;
//! they are never updated or deleted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Assignment ──────────────────────────────────────────────────────────────

/// At most one assignment exists per `(user_id, segment_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub user_id:    Uuid,
  pub segment_id: Uuid,
  pub delete_at:  DateTime<Utc>,
}

impl Assignment {
  /// An assignment whose deadline has passed is logically gone, whether or not
  /// the sweeper has removed the row yet.
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.delete_at < now }
}

/// A single mutation of the assignment table, applied by
/// [`crate::store::SegmentStore::apply`] together with its history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentWrite {
  /// Create a new row. Fails with a conflict if the pair is already assigned.
  Insert(Assignment),
  /// Create the row, or replace the deadline of the existing one.
  Upsert(Assignment),
  /// Remove the row if present.
  Delete { user_id: Uuid, segment_id: Uuid },
}

// ─── History ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
  Add,
  Remove,
}

impl Operation {
  /// The value stored in the `operation` column and written to reports.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Add => "ADD",
      Self::Remove => "REMOVE",
    }
  }
}

/// A persisted audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub history_id:   Uuid,
  pub user_id:      Uuid,
  pub segment_id:   Uuid,
  pub operation:    Operation,
  pub operation_at: DateTime<Utc>,
}

/// Input to [`crate::store::SegmentStore::apply`]; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
  pub user_id:      Uuid,
  pub segment_id:   Uuid,
  pub operation:    Operation,
  pub operation_at: DateTime<Utc>,
}

/// A history entry joined with its segment's slug, as returned for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
  pub user_id:      Uuid,
  pub slug:         String,
  pub operation:    Operation,
  pub operation_at: DateTime<Utc>,
}

/// The half-open UTC range `[first instant of month, first instant of next
/// month)`.
pub fn month_bounds(
  year: i32,
  month: u32,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
  let invalid = || Error::InvalidInput(format!("invalid report month {year}-{month:02}"));

  let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
  let (next_year, next_month) =
    if month == 12 { (year + 1, 1) } else { (year, month + 1) };
  let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(invalid)?;

  Ok((
    start.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc(),
    end.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc(),
  ))
}

#[cfg(test)]
mod tests {
  use chrono::{Datelike, Duration};

  use super::*;

  #[test]
  fn expired_only_strictly_after_deadline() {
    let now = Utc::now();
    let a = Assignment {
      user_id:    Uuid::new_v4(),
      segment_id: Uuid::new_v4(),
      delete_at:  now,
    };
    assert!(!a.is_expired(now));
    assert!(a.is_expired(now + Duration::seconds(1)));
  }

  #[test]
  fn month_bounds_wraps_december() {
    let (from, until) = month_bounds(2023, 12).unwrap();
    assert_eq!((from.year(), from.month(), from.day()), (2023, 12, 1));
    assert_eq!((until.year(), until.month(), until.day()), (2024, 1, 1));
  }

  #[test]
  fn month_bounds_rejects_month_zero_and_thirteen() {
    assert!(matches!(month_bounds(2024, 0), Err(Error::InvalidInput(_))));
    assert!(matches!(month_bounds(2024, 13), Err(Error::InvalidInput(_))));
  }
}
