//! JSON HTTP API for the segment service.
//!
//! Exposes an axum [`Router`] backed by an [`AssignmentService`] over any
//! [`SegmentStore`]. TLS and process lifecycle are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = segments_api::api_router(AppState::new(service, reports));
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod memberships;
pub mod reports;
pub mod segments;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use segments_core::{service::AssignmentService, store::SegmentStore};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use reports::ReportConfig;

/// Shared state handed to every handler.
pub struct AppState<S> {
  pub service: Arc<AssignmentService<S>>,
  pub reports: Arc<ReportConfig>,
}

impl<S> AppState<S> {
  pub fn new(service: Arc<AssignmentService<S>>, reports: ReportConfig) -> Self {
    Self { service, reports: Arc::new(reports) }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      service: self.service.clone(),
      reports: self.reports.clone(),
    }
  }
}

/// Build a fully-materialised API router for `state`.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: SegmentStore + 'static,
{
  Router::new()
    // Users
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route("/users/{id}", get(users::get_one::<S>).delete(users::delete_one::<S>))
    // Segments
    .route("/segments", get(segments::list::<S>).post(segments::create::<S>))
    .route(
      "/segments/{slug}",
      put(segments::update_one::<S>).delete(segments::delete_one::<S>),
    )
    // Memberships
    .route("/user_segments", post(memberships::update::<S>))
    // Reports
    .route("/get_report", get(reports::create::<S>))
    .route("/download_report/{filename}", get(reports::download::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
