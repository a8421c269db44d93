//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so string comparison in SQL agrees with chronological order.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use segments_core::{
  assignment::{HistoryRecord, Operation},
  segment::Segment,
  user::UserWithSegments,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Operation ───────────────────────────────────────────────────────────────

pub fn encode_operation(op: Operation) -> &'static str { op.as_str() }

pub fn decode_operation(s: &str) -> Result<Operation> {
  match s {
    "ADD" => Ok(Operation::Add),
    "REMOVE" => Ok(Operation::Remove),
    other => Err(Error::UnknownOperation(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `segments` row.
pub struct RawSegment {
  pub segment_id:  String,
  pub slug:        String,
  pub description: Option<String>,
}

impl RawSegment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      segment_id:  row.get(0)?,
      slug:        row.get(1)?,
      description: row.get(2)?,
    })
  }

  pub fn into_segment(self) -> Result<Segment> {
    Ok(Segment {
      segment_id:  decode_uuid(&self.segment_id)?,
      slug:        self.slug,
      description: self.description,
    })
  }
}

/// One row of `users LEFT JOIN segment_assignments LEFT JOIN segments`.
///
/// `slug` is `NULL` for a user without live assignments.
pub struct RawUserSegment {
  pub user_id: String,
  pub name:    String,
  pub slug:    Option<String>,
}

impl RawUserSegment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id: row.get(0)?,
      name:    row.get(1)?,
      slug:    row.get(2)?,
    })
  }
}

/// Fold joined rows (ordered by user) into one [`UserWithSegments`] per user.
/// A user whose only row carries a `NULL` slug gets an empty list.
pub fn group_user_segments(rows: Vec<RawUserSegment>) -> Result<Vec<UserWithSegments>> {
  let mut users: Vec<UserWithSegments> = Vec::new();

  for row in rows {
    let user_id = decode_uuid(&row.user_id)?;
    let same_user = users.last().is_some_and(|last| last.user_id == user_id);
    if !same_user {
      users.push(UserWithSegments {
        user_id,
        name: row.name,
        segment_slugs: Vec::new(),
      });
    }
    if let (Some(slug), Some(current)) = (row.slug, users.last_mut()) {
      current.segment_slugs.push(slug);
    }
  }

  Ok(users)
}

/// Raw strings from `user_segment_history JOIN segments`.
pub struct RawHistoryRecord {
  pub user_id:      String,
  pub slug:         String,
  pub operation:    String,
  pub operation_at: String,
}

impl RawHistoryRecord {
  pub fn into_record(self) -> Result<HistoryRecord> {
    Ok(HistoryRecord {
      user_id:      decode_uuid(&self.user_id)?,
      slug:         self.slug,
      operation:    decode_operation(&self.operation)?,
      operation_at: decode_dt(&self.operation_at)?,
    })
  }
}
