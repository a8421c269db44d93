//! Handler for `POST /user_segments`, the batch membership update.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use segments_core::{
  service::{BatchOutcome, SegmentChanges},
  store::SegmentStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub user_id:            Uuid,
  /// Slug → TTL in hours.
  #[serde(default)]
  pub segments_to_add:    BTreeMap<String, u32>,
  #[serde(default, alias = "segment_to_delete")]
  pub segments_to_delete: Vec<String>,
  #[serde(default, rename = "override")]
  pub override_existing:  bool,
}

/// `POST /user_segments`
///
/// Unknown slugs are reported together as
/// `{"error": "...", "slugs": [...]}` with status 404 and nothing is written.
pub async fn update<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<BatchOutcome>, ApiError> {
  let changes = SegmentChanges {
    slugs_to_add:      body.segments_to_add,
    slugs_to_delete:   body.segments_to_delete,
    override_existing: body.override_existing,
  };
  let outcome = state
    .service
    .update_user_segments(body.user_id, changes)
    .await?;
  Ok(Json(outcome))
}
