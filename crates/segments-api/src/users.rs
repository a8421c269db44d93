//! Handlers for `/users` endpoints.
//!
//! | Method   | Path          | Notes |
//! |----------|---------------|-------|
//! | `GET`    | `/users`      | Every user with live segment slugs |
//! | `POST`   | `/users`      | Body: `{"name":"alice"}`; returns 201 |
//! | `GET`    | `/users/{id}` | 404 if not found |
//! | `DELETE` | `/users/{id}` | 204; assignments go with the user |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use segments_core::{store::SegmentStore, user::UserWithSegments};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /users`
pub async fn list<S: SegmentStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<UserWithSegments>>, ApiError> {
  Ok(Json(state.service.list_users_with_segments().await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /users` with body `{"name":"alice"}`
pub async fn create<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let user = state.service.create_user(body.name).await?;
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<UserWithSegments>, ApiError> {
  Ok(Json(state.service.fetch_user_with_segments(id).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /users/{id}`
pub async fn delete_one<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  state.service.delete_user(id).await?;
  Ok(StatusCode::NO_CONTENT)
}
