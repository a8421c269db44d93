//! Handlers for `/segments` endpoints.
//!
//! | Method   | Path               | Notes |
//! |----------|--------------------|-------|
//! | `GET`    | `/segments`        | Ordered by slug |
//! | `POST`   | `/segments`        | Body: `{"slug":"vip","description":"..."}`; 409 if taken |
//! | `PUT`    | `/segments/{slug}` | Body: `{"slug"?, "description"?}`; memberships follow a rename |
//! | `DELETE` | `/segments/{slug}` | 204; assignments go with the segment |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use segments_core::{
  segment::{NewSegment, Segment, SegmentUpdate},
  store::SegmentStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// `GET /segments`
pub async fn list<S: SegmentStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Segment>>, ApiError> {
  Ok(Json(state.service.list_segments().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub slug:        String,
  #[serde(default)]
  pub description: Option<String>,
}

/// `POST /segments`
pub async fn create<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let segment = state
    .service
    .create_segment(NewSegment { slug: body.slug, description: body.description })
    .await?;
  Ok((StatusCode::CREATED, Json(segment)))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
  #[serde(default)]
  pub slug:        Option<String>,
  #[serde(default)]
  pub description: Option<String>,
}

/// `PUT /segments/{slug}`
pub async fn update_one<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Path(slug): Path<String>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Segment>, ApiError> {
  let update = SegmentUpdate { slug: body.slug, description: body.description };
  Ok(Json(state.service.update_segment(slug, update).await?))
}

/// `DELETE /segments/{slug}`
pub async fn delete_one<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.service.delete_segment(slug).await?;
  Ok(StatusCode::NO_CONTENT)
}
