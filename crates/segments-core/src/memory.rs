//! In-memory [`SegmentStore`] used to test the service without a database.
//!
//! Enforces the same constraints as the SQL backend: unique slugs, one
//! assignment per user/segment pair, and cascading deletes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  Error, Result,
  assignment::{Assignment, AssignmentWrite, HistoryEntry, HistoryRecord, NewHistoryEntry},
  segment::{NewSegment, Segment, SegmentUpdate},
  store::SegmentStore,
  user::{User, UserWithSegments},
};

#[derive(Debug, Default)]
struct Tables {
  users:       BTreeMap<Uuid, User>,
  segments:    BTreeMap<Uuid, Segment>,
  assignments: BTreeMap<(Uuid, Uuid), DateTime<Utc>>,
  history:     Vec<HistoryEntry>,
}

impl Tables {
  fn segment_by_slug(&self, slug: &str) -> Option<&Segment> {
    self.segments.values().find(|s| s.slug == slug)
  }

  fn with_segments(&self, user: &User, now: DateTime<Utc>) -> UserWithSegments {
    let mut segment_slugs: Vec<String> = self
      .assignments
      .iter()
      .filter(|((user_id, _), delete_at)| *user_id == user.user_id && **delete_at >= now)
      .filter_map(|((_, segment_id), _)| self.segments.get(segment_id))
      .map(|s| s.slug.clone())
      .collect();
    segment_slugs.sort();
    UserWithSegments {
      user_id: user.user_id,
      name: user.name.clone(),
      segment_slugs,
    }
  }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Every history entry ever appended, in insertion order.
  pub async fn history(&self) -> Vec<HistoryEntry> {
    self.tables.lock().await.history.clone()
  }
}

impl SegmentStore for MemoryStore {
  type Error = Error;

  async fn create_user(&self, name: String) -> Result<User> {
    let user = User { user_id: Uuid::new_v4(), name };
    self.tables.lock().await.users.insert(user.user_id, user.clone());
    Ok(user)
  }

  async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
    let mut tables = self.tables.lock().await;
    let existed = tables.users.remove(&user_id).is_some();
    tables.assignments.retain(|(u, _), _| *u != user_id);
    Ok(existed)
  }

  async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
    Ok(self.tables.lock().await.users.contains_key(&user_id))
  }

  async fn list_users_with_segments(
    &self,
    now: DateTime<Utc>,
  ) -> Result<Vec<UserWithSegments>> {
    let tables = self.tables.lock().await;
    let mut users: Vec<UserWithSegments> = tables
      .users
      .values()
      .map(|u| tables.with_segments(u, now))
      .collect();
    users.sort_by(|a, b| a.name.cmp(&b.name).then(a.user_id.cmp(&b.user_id)));
    Ok(users)
  }

  async fn fetch_user_with_segments(
    &self,
    user_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Option<UserWithSegments>> {
    let tables = self.tables.lock().await;
    Ok(tables.users.get(&user_id).map(|u| tables.with_segments(u, now)))
  }

  async fn create_segment(&self, input: NewSegment) -> Result<Segment> {
    let mut tables = self.tables.lock().await;
    if tables.segment_by_slug(&input.slug).is_some() {
      return Err(Error::Conflict(format!("segment slug {:?} already exists", input.slug)));
    }
    let segment = Segment {
      segment_id:  Uuid::new_v4(),
      slug:        input.slug,
      description: input.description,
    };
    tables.segments.insert(segment.segment_id, segment.clone());
    Ok(segment)
  }

  async fn list_segments(&self) -> Result<Vec<Segment>> {
    let mut segments: Vec<Segment> =
      self.tables.lock().await.segments.values().cloned().collect();
    segments.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(segments)
  }

  async fn find_segment(&self, slug: String) -> Result<Option<Segment>> {
    Ok(self.tables.lock().await.segment_by_slug(&slug).cloned())
  }

  async fn update_segment(
    &self,
    slug: String,
    update: SegmentUpdate,
  ) -> Result<Option<Segment>> {
    let mut tables = self.tables.lock().await;
    let Some(id) = tables.segment_by_slug(&slug).map(|s| s.segment_id) else {
      return Ok(None);
    };
    if let Some(new_slug) = &update.slug
      && *new_slug != slug
      && tables.segment_by_slug(new_slug).is_some()
    {
      return Err(Error::Conflict(format!("segment slug {new_slug:?} already exists")));
    }
    let Some(segment) = tables.segments.get_mut(&id) else {
      return Ok(None);
    };
    if let Some(new_slug) = update.slug {
      segment.slug = new_slug;
    }
    if let Some(description) = update.description {
      segment.description = Some(description);
    }
    Ok(Some(segment.clone()))
  }

  async fn delete_segment(&self, slug: String) -> Result<bool> {
    let mut tables = self.tables.lock().await;
    let Some(id) = tables.segment_by_slug(&slug).map(|s| s.segment_id) else {
      return Ok(false);
    };
    tables.segments.remove(&id);
    tables.assignments.retain(|(_, s), _| *s != id);
    Ok(true)
  }

  async fn find_assignment(
    &self,
    user_id: Uuid,
    segment_id: Uuid,
  ) -> Result<Option<Assignment>> {
    let tables = self.tables.lock().await;
    Ok(tables
      .assignments
      .get(&(user_id, segment_id))
      .map(|&delete_at| Assignment { user_id, segment_id, delete_at }))
  }

  async fn apply(&self, write: AssignmentWrite, entry: NewHistoryEntry) -> Result<bool> {
    let mut tables = self.tables.lock().await;

    if let AssignmentWrite::Insert(a) | AssignmentWrite::Upsert(a) = &write {
      if !tables.users.contains_key(&a.user_id) {
        return Err(Error::UserNotFound(a.user_id));
      }
      if !tables.segments.contains_key(&a.segment_id) {
        return Err(Error::SegmentNotFound(a.segment_id.to_string()));
      }
    }

    let changed = match write {
      AssignmentWrite::Insert(a) => {
        let key = (a.user_id, a.segment_id);
        if tables.assignments.contains_key(&key) {
          return Err(Error::Conflict(format!(
            "user {} is already assigned to segment {}",
            a.user_id, a.segment_id
          )));
        }
        tables.assignments.insert(key, a.delete_at);
        true
      }
      AssignmentWrite::Upsert(a) => {
        tables.assignments.insert((a.user_id, a.segment_id), a.delete_at);
        true
      }
      AssignmentWrite::Delete { user_id, segment_id } => {
        tables.assignments.remove(&(user_id, segment_id)).is_some()
      }
    };

    tables.history.push(HistoryEntry {
      history_id:   Uuid::new_v4(),
      user_id:      entry.user_id,
      segment_id:   entry.segment_id,
      operation:    entry.operation,
      operation_at: entry.operation_at,
    });

    Ok(changed)
  }

  async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    let mut tables = self.tables.lock().await;
    let before = tables.assignments.len();
    tables.assignments.retain(|_, delete_at| *delete_at >= now);
    Ok((before - tables.assignments.len()) as u64)
  }

  async fn history_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<HistoryRecord>> {
    let tables = self.tables.lock().await;
    let mut records: Vec<HistoryRecord> = tables
      .history
      .iter()
      .filter(|h| h.operation_at >= from && h.operation_at < until)
      .filter_map(|h| {
        tables.segments.get(&h.segment_id).map(|s| HistoryRecord {
          user_id:      h.user_id,
          slug:         s.slug.clone(),
          operation:    h.operation,
          operation_at: h.operation_at,
        })
      })
      .collect();
    records.sort_by_key(|r| r.operation_at);
    Ok(records)
  }
}
