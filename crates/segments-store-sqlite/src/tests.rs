//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use segments_core::{
  assignment::{Assignment, AssignmentWrite, NewHistoryEntry, Operation},
  segment::{NewSegment, SegmentUpdate},
  service::{AssignmentService, SegmentChanges},
  store::SegmentStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap() }

fn new_segment(slug: &str) -> NewSegment {
  NewSegment { slug: slug.to_owned(), description: None }
}

fn entry(user_id: Uuid, segment_id: Uuid, operation: Operation, at: DateTime<Utc>) -> NewHistoryEntry {
  NewHistoryEntry { user_id, segment_id, operation, operation_at: at }
}

async fn assign(s: &SqliteStore, user_id: Uuid, segment_id: Uuid, delete_at: DateTime<Utc>) {
  s.apply(
    AssignmentWrite::Insert(Assignment { user_id, segment_id, delete_at }),
    entry(user_id, segment_id, Operation::Add, t0()),
  )
  .await
  .unwrap();
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_delete_user() {
  let s = store().await;
  let user = s.create_user("alice".into()).await.unwrap();

  assert!(s.user_exists(user.user_id).await.unwrap());
  assert!(s.delete_user(user.user_id).await.unwrap());
  assert!(!s.user_exists(user.user_id).await.unwrap());
  assert!(!s.delete_user(user.user_id).await.unwrap());
}

#[tokio::test]
async fn user_without_assignments_has_empty_slug_list() {
  let s = store().await;
  let user = s.create_user("bob".into()).await.unwrap();

  let fetched = s
    .fetch_user_with_segments(user.user_id, t0())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.name, "bob");
  assert!(fetched.segment_slugs.is_empty());

  let missing = s.fetch_user_with_segments(Uuid::new_v4(), t0()).await.unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn listing_sorts_users_by_name_and_filters_expired() {
  let s = store().await;
  let zed = s.create_user("zed".into()).await.unwrap();
  let amy = s.create_user("amy".into()).await.unwrap();
  let vip = s.create_segment(new_segment("vip")).await.unwrap();
  let beta = s.create_segment(new_segment("beta")).await.unwrap();
  let old = s.create_segment(new_segment("old")).await.unwrap();

  assign(&s, amy.user_id, vip.segment_id, t0() + Duration::hours(1)).await;
  assign(&s, amy.user_id, beta.segment_id, t0() + Duration::hours(1)).await;
  assign(&s, amy.user_id, old.segment_id, t0() - Duration::seconds(1)).await;
  assign(&s, zed.user_id, vip.segment_id, t0()).await;

  let users = s.list_users_with_segments(t0()).await.unwrap();
  assert_eq!(users.len(), 2);
  assert_eq!(users[0].name, "amy");
  assert_eq!(users[0].segment_slugs, vec!["beta".to_owned(), "vip".to_owned()]);
  assert_eq!(users[1].name, "zed");
  // A deadline equal to now is still live.
  assert_eq!(users[1].segment_slugs, vec!["vip".to_owned()]);
}

#[tokio::test]
async fn deleting_user_cascades_to_assignments() {
  let s = store().await;
  let user = s.create_user("carol".into()).await.unwrap();
  let seg = s.create_segment(new_segment("vip")).await.unwrap();
  assign(&s, user.user_id, seg.segment_id, t0() + Duration::hours(1)).await;

  s.delete_user(user.user_id).await.unwrap();

  let found = s.find_assignment(user.user_id, seg.segment_id).await.unwrap();
  assert!(found.is_none());
  // History outlives the user.
  let from = t0() - Duration::days(1);
  let history = s.history_between(from, t0() + Duration::days(1)).await.unwrap();
  assert_eq!(history.len(), 1);
}

// ─── Segments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_slug_maps_to_conflict() {
  let s = store().await;
  s.create_segment(new_segment("vip")).await.unwrap();

  let err = s.create_segment(new_segment("vip")).await.unwrap_err();
  assert!(matches!(err, Error::SlugTaken(ref slug) if slug == "vip"));
  assert!(matches!(
    segments_core::Error::from(err),
    segments_core::Error::Conflict(_)
  ));
}

#[tokio::test]
async fn update_segment_renames_and_detects_conflicts() {
  let s = store().await;
  let vip = s.create_segment(new_segment("vip")).await.unwrap();
  s.create_segment(new_segment("beta")).await.unwrap();

  let updated = s
    .update_segment(
      "vip".into(),
      SegmentUpdate { slug: Some("gold".into()), description: Some("top tier".into()) },
    )
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.segment_id, vip.segment_id);
  assert_eq!(updated.slug, "gold");
  assert_eq!(updated.description.as_deref(), Some("top tier"));
  assert!(s.find_segment("vip".into()).await.unwrap().is_none());

  let err = s
    .update_segment(
      "gold".into(),
      SegmentUpdate { slug: Some("beta".into()), description: None },
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SlugTaken(ref slug) if slug == "beta"));

  let missing = s
    .update_segment("ghost".into(), SegmentUpdate::default())
    .await
    .unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn deleting_segment_cascades_and_hides_its_history() {
  let s = store().await;
  let user = s.create_user("dave".into()).await.unwrap();
  let seg = s.create_segment(new_segment("vip")).await.unwrap();
  assign(&s, user.user_id, seg.segment_id, t0() + Duration::hours(1)).await;

  assert!(s.delete_segment("vip".into()).await.unwrap());
  assert!(!s.delete_segment("vip".into()).await.unwrap());

  let fetched = s
    .fetch_user_with_segments(user.user_id, t0())
    .await
    .unwrap()
    .unwrap();
  assert!(fetched.segment_slugs.is_empty());

  let from = t0() - Duration::days(1);
  let history = s.history_between(from, t0() + Duration::days(1)).await.unwrap();
  assert!(history.is_empty());
}

// ─── Assignments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_insert_for_same_pair_is_a_conflict() {
  let s = store().await;
  let user = s.create_user("erin".into()).await.unwrap();
  let seg = s.create_segment(new_segment("vip")).await.unwrap();
  assign(&s, user.user_id, seg.segment_id, t0() + Duration::hours(1)).await;

  let err = s
    .apply(
      AssignmentWrite::Insert(Assignment {
        user_id:    user.user_id,
        segment_id: seg.segment_id,
        delete_at:  t0() + Duration::hours(5),
      }),
      entry(user.user_id, seg.segment_id, Operation::Add, t0()),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyAssigned { .. }));

  // The failed write rolled back together with its history entry.
  let found = s
    .find_assignment(user.user_id, seg.segment_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.delete_at, t0() + Duration::hours(1));
  let from = t0() - Duration::days(1);
  let history = s.history_between(from, t0() + Duration::days(1)).await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn upsert_replaces_deadline() {
  let s = store().await;
  let user = s.create_user("finn".into()).await.unwrap();
  let seg = s.create_segment(new_segment("vip")).await.unwrap();
  assign(&s, user.user_id, seg.segment_id, t0() + Duration::hours(1)).await;

  let changed = s
    .apply(
      AssignmentWrite::Upsert(Assignment {
        user_id:    user.user_id,
        segment_id: seg.segment_id,
        delete_at:  t0() + Duration::hours(48),
      }),
      entry(user.user_id, seg.segment_id, Operation::Add, t0()),
    )
    .await
    .unwrap();
  assert!(changed);

  let found = s
    .find_assignment(user.user_id, seg.segment_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.delete_at, t0() + Duration::hours(48));
}

#[tokio::test]
async fn deleting_absent_assignment_still_records_history() {
  let s = store().await;
  let user = s.create_user("gia".into()).await.unwrap();
  let seg = s.create_segment(new_segment("vip")).await.unwrap();

  let changed = s
    .apply(
      AssignmentWrite::Delete { user_id: user.user_id, segment_id: seg.segment_id },
      entry(user.user_id, seg.segment_id, Operation::Remove, t0()),
    )
    .await
    .unwrap();
  assert!(!changed);

  let from = t0() - Duration::days(1);
  let history = s.history_between(from, t0() + Duration::days(1)).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].operation, Operation::Remove);
  assert_eq!(history[0].slug, "vip");
}

#[tokio::test]
async fn delete_expired_removes_only_past_deadlines() {
  let s = store().await;
  let user = s.create_user("hal".into()).await.unwrap();
  let past = s.create_segment(new_segment("past")).await.unwrap();
  let edge = s.create_segment(new_segment("edge")).await.unwrap();
  let future = s.create_segment(new_segment("future")).await.unwrap();

  assign(&s, user.user_id, past.segment_id, t0() - Duration::seconds(1)).await;
  assign(&s, user.user_id, edge.segment_id, t0()).await;
  assign(&s, user.user_id, future.segment_id, t0() + Duration::hours(1)).await;

  assert_eq!(s.delete_expired(t0()).await.unwrap(), 1);
  assert!(s.find_assignment(user.user_id, past.segment_id).await.unwrap().is_none());
  assert!(s.find_assignment(user.user_id, edge.segment_id).await.unwrap().is_some());
  assert!(s.find_assignment(user.user_id, future.segment_id).await.unwrap().is_some());
  assert_eq!(s.delete_expired(t0()).await.unwrap(), 0);
}

#[tokio::test]
async fn insert_for_deleted_user_or_segment_is_not_found() {
  let s = store().await;
  let user = s.create_user("jo".into()).await.unwrap();
  let seg = s.create_segment(new_segment("vip")).await.unwrap();
  let ghost = Uuid::new_v4();

  let err = s
    .apply(
      AssignmentWrite::Insert(Assignment {
        user_id:    ghost,
        segment_id: seg.segment_id,
        delete_at:  t0() + Duration::hours(1),
      }),
      entry(ghost, seg.segment_id, Operation::Add, t0()),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UserGone(id) if id == ghost));
  assert!(matches!(
    segments_core::Error::from(err),
    segments_core::Error::UserNotFound(id) if id == ghost
  ));

  let err = s
    .apply(
      AssignmentWrite::Upsert(Assignment {
        user_id:    user.user_id,
        segment_id: ghost,
        delete_at:  t0() + Duration::hours(1),
      }),
      entry(user.user_id, ghost, Operation::Add, t0()),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SegmentGone(id) if id == ghost));

  // Neither failed write left a history row behind.
  let from = t0() - Duration::days(1);
  let history = s.history_between(from, t0() + Duration::days(1)).await.unwrap();
  assert!(history.is_empty());
}

// ─── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_range_is_half_open_and_ordered() {
  let s = store().await;
  let user = s.create_user("ivy".into()).await.unwrap();
  let seg = s.create_segment(new_segment("vip")).await.unwrap();

  let may = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
  let june = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

  let times = [
    may - Duration::seconds(1),
    june - Duration::seconds(1),
    may,
    june,
  ];
  for at in times {
    s.apply(
      AssignmentWrite::Delete { user_id: user.user_id, segment_id: seg.segment_id },
      entry(user.user_id, seg.segment_id, Operation::Remove, at),
    )
    .await
    .unwrap();
  }

  let records = s.history_between(may, june).await.unwrap();
  let stamps: Vec<_> = records.iter().map(|r| r.operation_at).collect();
  assert_eq!(stamps, vec![may, june - Duration::seconds(1)]);
  assert!(records.iter().all(|r| r.user_id == user.user_id));
}

// ─── Through the service ─────────────────────────────────────────────────────

fn t0_plus_two_days() -> DateTime<Utc> { t0() + Duration::days(2) }

#[tokio::test]
async fn batch_update_and_sweep_through_service() {
  let store = Arc::new(store().await);
  let svc = AssignmentService::with_clock(store.clone(), t0);

  let alice = svc.create_user("alice".into()).await.unwrap();
  svc.create_segment(new_segment("vip")).await.unwrap();
  svc.create_segment(new_segment("beta")).await.unwrap();

  let outcome = svc
    .update_user_segments(
      alice.user_id,
      SegmentChanges {
        slugs_to_add: [("vip".to_owned(), 24), ("beta".to_owned(), 72)]
          .into_iter()
          .collect(),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(outcome.created, vec!["beta".to_owned(), "vip".to_owned()]);

  let fetched = svc.fetch_user_with_segments(alice.user_id).await.unwrap();
  assert_eq!(fetched.segment_slugs, vec!["beta".to_owned(), "vip".to_owned()]);

  let later = AssignmentService::with_clock(store.clone(), t0_plus_two_days);
  assert_eq!(later.sweep_expired().await.unwrap(), 1);
  let fetched = later.fetch_user_with_segments(alice.user_id).await.unwrap();
  assert_eq!(fetched.segment_slugs, vec!["beta".to_owned()]);

  let history = svc.get_history(2024, 5).await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(history.iter().all(|r| r.operation == Operation::Add));
}

#[tokio::test]
async fn deadline_in_year_9999_stays_live_and_later_is_rejected() {
  let store = Arc::new(store().await);
  let svc = AssignmentService::with_clock(store.clone(), t0);
  let alice = svc.create_user("alice".into()).await.unwrap();
  let vip = svc.create_segment(new_segment("vip")).await.unwrap();

  // t0 + 69_913_046h is 9999-12-31 23:30:00; one more hour is year 10000.
  let err = svc
    .add_or_update_membership(alice.user_id, "vip", 69_913_047, false)
    .await
    .unwrap_err();
  assert!(matches!(err, segments_core::Error::InvalidInput(_)));
  assert!(store.find_assignment(alice.user_id, vip.segment_id).await.unwrap().is_none());

  svc
    .add_or_update_membership(alice.user_id, "vip", 69_913_046, false)
    .await
    .unwrap();

  let fetched = svc.fetch_user_with_segments(alice.user_id).await.unwrap();
  assert_eq!(fetched.segment_slugs, vec!["vip".to_owned()]);
  assert_eq!(svc.sweep_expired().await.unwrap(), 0);

  let again = svc
    .add_or_update_membership(alice.user_id, "vip", 1, false)
    .await
    .unwrap();
  assert_eq!(again, segments_core::service::AddOutcome::Unchanged);
}
