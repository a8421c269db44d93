//! [`SqliteStore`], the SQLite implementation of [`SegmentStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use segments_core::{
  assignment::{Assignment, AssignmentWrite, HistoryRecord, NewHistoryEntry},
  segment::{NewSegment, Segment, SegmentUpdate},
  store::SegmentStore,
  user::{User, UserWithSegments},
};

use crate::{
  Error, Result,
  encode::{
    RawHistoryRecord, RawSegment, RawUserSegment, decode_dt, encode_dt,
    encode_operation, encode_uuid, group_user_segments,
  },
  error::{is_foreign_key_violation, is_unique_violation},
  schema::SCHEMA,
};

const USERS_WITH_SEGMENTS: &str = "
  SELECT u.user_id, u.name, s.slug
  FROM users u
  LEFT JOIN segment_assignments sa
         ON sa.user_id = u.user_id AND sa.delete_at >= ?1
  LEFT JOIN segments s ON s.segment_id = sa.segment_id";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A segment store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for SqliteStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteStore").finish_non_exhaustive()
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── SegmentStore impl ───────────────────────────────────────────────────────

impl SegmentStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, name: String) -> Result<User> {
    let user = User { user_id: Uuid::new_v4(), name };

    let id_str = encode_uuid(user.user_id);
    let name = user.name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, name) VALUES (?1, ?2)",
          rusqlite::params![id_str, name],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(user_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM users WHERE user_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(user_id);

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM users WHERE user_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(exists)
  }

  async fn list_users_with_segments(
    &self,
    now: DateTime<Utc>,
  ) -> Result<Vec<UserWithSegments>> {
    let now_str = encode_dt(now);

    let rows: Vec<RawUserSegment> = self
      .conn
      .call(move |conn| {
        let sql = format!("{USERS_WITH_SEGMENTS} ORDER BY u.name, u.user_id, s.slug");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![now_str], RawUserSegment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    group_user_segments(rows)
  }

  async fn fetch_user_with_segments(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Option<UserWithSegments>> {
    let now_str = encode_dt(now);
    let id_str = encode_uuid(user_id);

    let rows: Vec<RawUserSegment> = self
      .conn
      .call(move |conn| {
        let sql = format!("{USERS_WITH_SEGMENTS} WHERE u.user_id = ?2 ORDER BY s.slug");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![now_str, id_str], RawUserSegment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(group_user_segments(rows)?.into_iter().next())
  }

  // ── Segments ──────────────────────────────────────────────────────────────

  async fn create_segment(&self, input: NewSegment) -> Result<Segment> {
    let segment = Segment {
      segment_id:  Uuid::new_v4(),
      slug:        input.slug,
      description: input.description,
    };

    let id_str = encode_uuid(segment.segment_id);
    let slug = segment.slug.clone();
    let description = segment.description.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO segments (segment_id, slug, description) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, slug, description],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| {
        if is_unique_violation(&e) {
          Error::SlugTaken(segment.slug.clone())
        } else {
          Error::Database(e)
        }
      })?;

    Ok(segment)
  }

  async fn list_segments(&self) -> Result<Vec<Segment>> {
    let raws: Vec<RawSegment> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT segment_id, slug, description FROM segments ORDER BY slug")?;
        let rows = stmt
          .query_map([], RawSegment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSegment::into_segment).collect()
  }

  async fn find_segment(&self, slug: String) -> Result<Option<Segment>> {
    let raw: Option<RawSegment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT segment_id, slug, description FROM segments WHERE slug = ?1",
              rusqlite::params![slug],
              RawSegment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSegment::into_segment).transpose()
  }

  async fn update_segment(
    &self,
    slug: String,
    update: SegmentUpdate,
  ) -> Result<Option<Segment>> {
    let new_slug = update.slug.clone();

    let raw: Option<RawSegment> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current = tx
          .query_row(
            "SELECT segment_id, slug, description FROM segments WHERE slug = ?1",
            rusqlite::params![slug],
            RawSegment::from_row,
          )
          .optional()?;

        let Some(mut current) = current else {
          return Ok(None);
        };
        if let Some(slug) = update.slug {
          current.slug = slug;
        }
        if let Some(description) = update.description {
          current.description = Some(description);
        }

        tx.execute(
          "UPDATE segments SET slug = ?1, description = ?2 WHERE segment_id = ?3",
          rusqlite::params![current.slug, current.description, current.segment_id],
        )?;
        tx.commit()?;
        Ok(Some(current))
      })
      .await
      .map_err(|e| match new_slug {
        Some(taken) if is_unique_violation(&e) => Error::SlugTaken(taken),
        _ => Error::Database(e),
      })?;

    raw.map(RawSegment::into_segment).transpose()
  }

  async fn delete_segment(&self, slug: String) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM segments WHERE slug = ?1",
          rusqlite::params![slug],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  async fn find_assignment(
    &self,
    user_id: Uuid,
    segment_id: Uuid,
  ) -> Result<Option<Assignment>> {
    let user_str = encode_uuid(user_id);
    let segment_str = encode_uuid(segment_id);

    let delete_at: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT delete_at FROM segment_assignments
               WHERE user_id = ?1 AND segment_id = ?2",
              rusqlite::params![user_str, segment_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    delete_at
      .map(|s| {
        Ok(Assignment { user_id, segment_id, delete_at: decode_dt(&s)? })
      })
      .transpose()
  }

  async fn apply(&self, write: AssignmentWrite, entry: NewHistoryEntry) -> Result<bool> {
    let conflict = match &write {
      AssignmentWrite::Insert(a) => Some(Error::AlreadyAssigned {
        user_id:    a.user_id,
        segment_id: a.segment_id,
      }),
      _ => None,
    };

    let (user_id, segment_id) = (entry.user_id, entry.segment_id);
    let history_id_str = encode_uuid(Uuid::new_v4());
    let entry_user_str = encode_uuid(entry.user_id);
    let entry_segment_str = encode_uuid(entry.segment_id);
    let operation_str = encode_operation(entry.operation);
    let operation_at_str = encode_dt(entry.operation_at);

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let changed = match write {
          AssignmentWrite::Insert(a) => tx.execute(
            "INSERT INTO segment_assignments (user_id, segment_id, delete_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![
              encode_uuid(a.user_id),
              encode_uuid(a.segment_id),
              encode_dt(a.delete_at),
            ],
          )?,
          AssignmentWrite::Upsert(a) => tx.execute(
            "INSERT INTO segment_assignments (user_id, segment_id, delete_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, segment_id) DO UPDATE SET delete_at = excluded.delete_at",
            rusqlite::params![
              encode_uuid(a.user_id),
              encode_uuid(a.segment_id),
              encode_dt(a.delete_at),
            ],
          )?,
          AssignmentWrite::Delete { user_id, segment_id } => tx.execute(
            "DELETE FROM segment_assignments WHERE user_id = ?1 AND segment_id = ?2",
            rusqlite::params![encode_uuid(user_id), encode_uuid(segment_id)],
          )?,
        };

        tx.execute(
          "INSERT INTO user_segment_history
             (history_id, user_id, segment_id, operation, operation_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            history_id_str,
            entry_user_str,
            entry_segment_str,
            operation_str,
            operation_at_str,
          ],
        )?;

        tx.commit()?;
        Ok(changed > 0)
      })
      .await;

    match (result, conflict) {
      (Ok(changed), _) => Ok(changed),
      (Err(e), Some(conflict)) if is_unique_violation(&e) => Err(conflict),
      // The user or segment was deleted after the service looked it up.
      (Err(e), _) if is_foreign_key_violation(&e) => {
        if self.user_exists(user_id).await? {
          Err(Error::SegmentGone(segment_id))
        } else {
          Err(Error::UserGone(user_id))
        }
      }
      (Err(e), _) => Err(Error::Database(e)),
    }
  }

  async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    let now_str = encode_dt(now);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM segment_assignments WHERE delete_at < ?1",
          rusqlite::params![now_str],
        )?)
      })
      .await?;

    Ok(deleted as u64)
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn history_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<HistoryRecord>> {
    let from_str = encode_dt(from);
    let until_str = encode_dt(until);

    let raws: Vec<RawHistoryRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT h.user_id, s.slug, h.operation, h.operation_at
           FROM user_segment_history h
           JOIN segments s ON s.segment_id = h.segment_id
           WHERE h.operation_at >= ?1
             AND h.operation_at <  ?2
           ORDER BY h.operation_at, h.rowid",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![from_str, until_str], |row| {
            Ok(RawHistoryRecord {
              user_id:      row.get(0)?,
              slug:         row.get(1)?,
              operation:    row.get(2)?,
              operation_at: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryRecord::into_record).collect()
  }
}

