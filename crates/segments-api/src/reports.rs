//! Monthly history reports.
//!
//! `GET /get_report?year=2024&month=5` writes `report_2024-05.csv` into the
//! configured reports directory and answers with a link to
//! `GET /download_report/{filename}`, which streams the file back as a CSV
//! attachment.
//!
//! Rows carry no header: `user_id,slug,ADD|REMOVE,YYYY-MM-DD HH:MM:SS`.

use std::{borrow::Cow, path::PathBuf};

use axum::{
  Json,
  extract::{Path, Query, State},
  http::header,
  response::IntoResponse,
};
use segments_core::{assignment::HistoryRecord, store::SegmentStore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, error::ApiError};

/// Where reports are written and how download links are built.
#[derive(Debug, Clone)]
pub struct ReportConfig {
  pub dir:      PathBuf,
  /// Public origin prepended to download links, e.g. `http://localhost:8000`.
  pub base_url: String,
}

impl ReportConfig {
  fn download_link(&self, filename: &str) -> String {
    format!("{}/download_report/{filename}", self.base_url.trim_end_matches('/'))
  }
}

pub fn report_filename(year: i32, month: u32) -> String {
  format!("report_{year:04}-{month:02}.csv")
}

// ─── CSV ─────────────────────────────────────────────────────────────────────

fn quote_field(field: &str) -> Cow<'_, str> {
  if field.contains([',', '"', '\n', '\r']) {
    Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
  } else {
    Cow::Borrowed(field)
  }
}

/// Render history records as CSV, one line per record.
pub fn render_csv(records: &[HistoryRecord]) -> String {
  let mut out = String::new();
  for r in records {
    let line = format!(
      "{},{},{},{}\n",
      r.user_id,
      quote_field(&r.slug),
      r.operation.as_str(),
      r.operation_at.format("%Y-%m-%d %H:%M:%S"),
    );
    out.push_str(&line);
  }
  out
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportParams {
  pub year:  i32,
  pub month: u32,
}

#[derive(Debug, Serialize)]
pub struct ReportLink {
  pub download_link: String,
}

/// `GET /get_report?year=<year>&month=<month>`
pub async fn create<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ReportParams>,
) -> Result<Json<ReportLink>, ApiError> {
  let records = state.service.get_history(params.year, params.month).await?;

  let filename = report_filename(params.year, params.month);
  tokio::fs::create_dir_all(&state.reports.dir).await?;
  tokio::fs::write(state.reports.dir.join(&filename), render_csv(&records)).await?;

  info!(%filename, rows = records.len(), "report written");
  Ok(Json(ReportLink { download_link: state.reports.download_link(&filename) }))
}

// ─── Download ────────────────────────────────────────────────────────────────

/// A bare file name: no path separators, no parent references.
fn is_plain_file_name(name: &str) -> bool {
  !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

/// `GET /download_report/{filename}`
pub async fn download<S: SegmentStore>(
  State(state): State<AppState<S>>,
  Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let not_found = || ApiError::NotFound(format!("report {filename:?} not found"));

  if !is_plain_file_name(&filename) {
    return Err(not_found());
  }

  let body = match tokio::fs::read(state.reports.dir.join(&filename)).await {
    Ok(body) => body,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
    Err(e) => return Err(e.into()),
  };

  let disposition = format!("attachment; filename=\"{filename}\"");
  Ok((
    [
      (header::CONTENT_TYPE, "text/csv".to_owned()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    body,
  ))
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use segments_core::assignment::Operation;
  use uuid::Uuid;

  use super::*;

  #[test]
  fn rows_are_formatted_and_quoted() {
    let user_id = Uuid::nil();
    let at = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 5).unwrap();
    let records = vec![
      HistoryRecord { user_id, slug: "vip".into(), operation: Operation::Add, operation_at: at },
      HistoryRecord {
        user_id,
        slug: "say \"hi\", please".into(),
        operation: Operation::Remove,
        operation_at: at,
      },
    ];

    let csv = render_csv(&records);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
      lines[0],
      "00000000-0000-0000-0000-000000000000,vip,ADD,2024-05-10 09:30:05"
    );
    assert_eq!(
      lines[1],
      "00000000-0000-0000-0000-000000000000,\"say \"\"hi\"\", please\",REMOVE,2024-05-10 09:30:05"
    );
  }

  #[test]
  fn file_names_are_zero_padded() {
    assert_eq!(report_filename(2024, 5), "report_2024-05.csv");
  }

  #[test]
  fn traversal_names_are_rejected() {
    assert!(is_plain_file_name("report_2024-05.csv"));
    assert!(!is_plain_file_name(""));
    assert!(!is_plain_file_name("../secret"));
    assert!(!is_plain_file_name("a/b.csv"));
    assert!(!is_plain_file_name("a\\b.csv"));
    assert!(!is_plain_file_name(".."));
  }
}
