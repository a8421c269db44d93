//! [`AssignmentService`]: membership business rules over a [`SegmentStore`].
//!
//! The service is constructed once with an explicit store and handed to every
//! caller (HTTP handlers, the expiration sweeper). It holds no mutable state of
//! its own; all coordination is pushed down to the store's constraints.

use std::{
  collections::{BTreeMap, HashMap},
  sync::Arc,
};

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  assignment::{
    Assignment, AssignmentWrite, HistoryRecord, NewHistoryEntry, Operation,
    month_bounds,
  },
  segment::{NewSegment, Segment, SegmentUpdate, validate_slug},
  store::SegmentStore,
  user::{User, UserWithSegments},
};

/// Latest calendar year a membership deadline may fall in.
pub const MAX_DEADLINE_YEAR: i32 = 9999;

/// Source of "now" for deadlines and history timestamps.
pub type Clock = fn() -> DateTime<Utc>;

/// What a single add did to the assignment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
  /// A new membership was created (or an expired, unswept one revived).
  Created,
  /// An existing membership got a new deadline (`override = true`).
  Rescheduled,
  /// The membership already existed and `override = false`; nothing written.
  Unchanged,
}

/// Requested changes for one user, applied by
/// [`AssignmentService::update_user_segments`].
#[derive(Debug, Clone, Default)]
pub struct SegmentChanges {
  /// Slug → TTL in hours.
  pub slugs_to_add:      BTreeMap<String, u32>,
  pub slugs_to_delete:   Vec<String>,
  /// Refresh the deadline of segments the user already belongs to.
  pub override_existing: bool,
}

/// Per-slug result of a batch update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
  /// Every processed removal, whether or not a row existed.
  pub removed:     Vec<String>,
  pub created:     Vec<String>,
  pub rescheduled: Vec<String>,
  pub unchanged:   Vec<String>,
}

fn store_err<E: Into<Error>>(e: E) -> Error { e.into() }

pub struct AssignmentService<S> {
  store: Arc<S>,
  clock: Clock,
}

impl<S> std::fmt::Debug for AssignmentService<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AssignmentService").finish_non_exhaustive()
  }
}

impl<S: SegmentStore> AssignmentService<S> {
  pub fn new(store: Arc<S>) -> Self { Self::with_clock(store, Utc::now) }

  pub fn with_clock(store: Arc<S>, clock: Clock) -> Self { Self { store, clock } }

  fn now(&self) -> DateTime<Utc> { (self.clock)() }

  async fn require_user(&self, user_id: Uuid) -> Result<()> {
    if self.store.user_exists(user_id).await.map_err(store_err)? {
      Ok(())
    } else {
      Err(Error::UserNotFound(user_id))
    }
  }

  async fn resolve(&self, slug: &str) -> Result<Segment> {
    self
      .store
      .find_segment(slug.to_owned())
      .await
      .map_err(store_err)?
      .ok_or_else(|| Error::SegmentsNotFound(vec![slug.to_owned()]))
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  pub async fn create_user(&self, name: String) -> Result<User> {
    if name.trim().is_empty() {
      return Err(Error::InvalidInput("user name must not be empty".to_owned()));
    }
    self.store.create_user(name).await.map_err(store_err)
  }

  pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
    if self.store.delete_user(user_id).await.map_err(store_err)? {
      Ok(())
    } else {
      Err(Error::UserNotFound(user_id))
    }
  }

  pub async fn list_users_with_segments(&self) -> Result<Vec<UserWithSegments>> {
    self
      .store
      .list_users_with_segments(self.now())
      .await
      .map_err(store_err)
  }

  pub async fn fetch_user_with_segments(
    &self,
    user_id: Uuid,
  ) -> Result<UserWithSegments> {
    self
      .store
      .fetch_user_with_segments(user_id, self.now())
      .await
      .map_err(store_err)?
      .ok_or(Error::UserNotFound(user_id))
  }

  // ── Segments ──────────────────────────────────────────────────────────────

  pub async fn create_segment(&self, input: NewSegment) -> Result<Segment> {
    validate_slug(&input.slug)?;
    self.store.create_segment(input).await.map_err(store_err)
  }

  pub async fn list_segments(&self) -> Result<Vec<Segment>> {
    self.store.list_segments().await.map_err(store_err)
  }

  pub async fn update_segment(
    &self,
    slug: String,
    update: SegmentUpdate,
  ) -> Result<Segment> {
    if let Some(new_slug) = &update.slug {
      validate_slug(new_slug)?;
    }
    self
      .store
      .update_segment(slug.clone(), update)
      .await
      .map_err(store_err)?
      .ok_or(Error::SegmentNotFound(slug))
  }

  pub async fn delete_segment(&self, slug: String) -> Result<()> {
    if self.store.delete_segment(slug.clone()).await.map_err(store_err)? {
      Ok(())
    } else {
      Err(Error::SegmentNotFound(slug))
    }
  }

  // ── Memberships ───────────────────────────────────────────────────────────

  /// Add `user_id` to the segment `slug` for `ttl_hours`.
  ///
  /// An existing live membership is left alone unless `override_existing` is
  /// set, in which case its deadline is replaced. Every create or reschedule
  /// appends one ADD history entry.
  pub async fn add_or_update_membership(
    &self,
    user_id: Uuid,
    slug: &str,
    ttl_hours: u32,
    override_existing: bool,
  ) -> Result<AddOutcome> {
    self.require_user(user_id).await?;
    let segment = self.resolve(slug).await?;
    self
      .add_resolved(user_id, &segment, ttl_hours, override_existing)
      .await
  }

  /// Remove `user_id` from the segment `slug`.
  ///
  /// Idempotent: removing an absent membership succeeds. A REMOVE history
  /// entry is appended either way. Returns whether a row was deleted.
  pub async fn remove_membership(&self, user_id: Uuid, slug: &str) -> Result<bool> {
    self.require_user(user_id).await?;
    let segment = self.resolve(slug).await?;
    self.remove_resolved(user_id, &segment).await
  }

  /// Apply a batch of removals and additions for one user.
  ///
  /// Every slug is resolved up front; if any is unknown the request is
  /// rejected with all unknown slugs and nothing is written. Removals run
  /// first, then additions, so a slug named in both lists ends up assigned.
  ///
  /// Each slug is committed on its own. A storage failure part-way through
  /// aborts the rest of the batch and leaves earlier slugs applied.
  pub async fn update_user_segments(
    &self,
    user_id: Uuid,
    changes: SegmentChanges,
  ) -> Result<BatchOutcome> {
    self.require_user(user_id).await?;

    let mut resolved: HashMap<&str, Segment> = HashMap::new();
    let mut missing: Vec<String> = Vec::new();
    for slug in changes
      .slugs_to_delete
      .iter()
      .chain(changes.slugs_to_add.keys())
    {
      if resolved.contains_key(slug.as_str()) || missing.contains(slug) {
        continue;
      }
      match self
        .store
        .find_segment(slug.clone())
        .await
        .map_err(store_err)?
      {
        Some(segment) => {
          resolved.insert(slug.as_str(), segment);
        }
        None => missing.push(slug.clone()),
      }
    }
    if !missing.is_empty() {
      return Err(Error::SegmentsNotFound(missing));
    }

    let lookup = |slug: &str| {
      resolved
        .get(slug)
        .ok_or_else(|| Error::SegmentsNotFound(vec![slug.to_owned()]))
    };

    let mut outcome = BatchOutcome::default();

    for slug in &changes.slugs_to_delete {
      self.remove_resolved(user_id, lookup(slug)?).await?;
      outcome.removed.push(slug.clone());
    }

    for (slug, &ttl_hours) in &changes.slugs_to_add {
      let result = self
        .add_resolved(user_id, lookup(slug)?, ttl_hours, changes.override_existing)
        .await?;
      match result {
        AddOutcome::Created => outcome.created.push(slug.clone()),
        AddOutcome::Rescheduled => outcome.rescheduled.push(slug.clone()),
        AddOutcome::Unchanged => outcome.unchanged.push(slug.clone()),
      }
    }

    Ok(outcome)
  }

  async fn add_resolved(
    &self,
    user_id: Uuid,
    segment: &Segment,
    ttl_hours: u32,
    override_existing: bool,
  ) -> Result<AddOutcome> {
    let now = self.now();
    let out_of_range = || Error::InvalidInput(format!("ttl of {ttl_hours} hours is out of range"));
    let delete_at = now
      .checked_add_signed(Duration::hours(i64::from(ttl_hours)))
      .ok_or_else(out_of_range)?;
    // Stored timestamps only sort chronologically within four-digit years.
    if delete_at.year() > MAX_DEADLINE_YEAR {
      return Err(out_of_range());
    }

    let assignment = Assignment { user_id, segment_id: segment.segment_id, delete_at };

    let existing = self
      .store
      .find_assignment(user_id, segment.segment_id)
      .await
      .map_err(store_err)?;

    let (write, outcome) = match existing {
      None => (AssignmentWrite::Insert(assignment), AddOutcome::Created),
      // Expired but not yet swept: the row is still there, so overwrite it.
      Some(current) if current.is_expired(now) => {
        (AssignmentWrite::Upsert(assignment), AddOutcome::Created)
      }
      Some(_) if override_existing => {
        (AssignmentWrite::Upsert(assignment), AddOutcome::Rescheduled)
      }
      Some(_) => {
        debug!(%user_id, slug = %segment.slug, "already assigned; left unchanged");
        return Ok(AddOutcome::Unchanged);
      }
    };

    let entry = NewHistoryEntry {
      user_id,
      segment_id: segment.segment_id,
      operation: Operation::Add,
      operation_at: now,
    };
    self.store.apply(write, entry).await.map_err(store_err)?;

    debug!(%user_id, slug = %segment.slug, %delete_at, ?outcome, "membership added");
    Ok(outcome)
  }

  async fn remove_resolved(&self, user_id: Uuid, segment: &Segment) -> Result<bool> {
    let write = AssignmentWrite::Delete { user_id, segment_id: segment.segment_id };
    let entry = NewHistoryEntry {
      user_id,
      segment_id: segment.segment_id,
      operation: Operation::Remove,
      operation_at: self.now(),
    };
    let removed = self.store.apply(write, entry).await.map_err(store_err)?;

    debug!(%user_id, slug = %segment.slug, removed, "membership removed");
    Ok(removed)
  }

  // ── History & expiration ──────────────────────────────────────────────────

  /// Every history entry recorded during the given calendar month (UTC).
  pub async fn get_history(&self, year: i32, month: u32) -> Result<Vec<HistoryRecord>> {
    let (from, until) = month_bounds(year, month)?;
    self
      .store
      .history_between(from, until)
      .await
      .map_err(store_err)
  }

  /// Physically remove every assignment whose deadline has passed. Expirations
  /// are not recorded in history.
  pub async fn sweep_expired(&self) -> Result<u64> {
    self.store.delete_expired(self.now()).await.map_err(store_err)
  }
}
