//! Segments: named categories identified by a unique slug.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
  pub segment_id:  Uuid,
  /// Unique across all segments (enforced by the store).
  pub slug:        String,
  pub description: Option<String>,
}

/// Input to [`crate::store::SegmentStore::create_segment`].
#[derive(Debug, Clone)]
pub struct NewSegment {
  pub slug:        String,
  pub description: Option<String>,
}

/// Partial update of a segment; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SegmentUpdate {
  pub slug:        Option<String>,
  pub description: Option<String>,
}

/// Reject slugs that are empty or padded with whitespace.
pub fn validate_slug(slug: &str) -> Result<()> {
  if slug.is_empty() {
    return Err(Error::InvalidInput("slug must not be empty".to_owned()));
  }
  if slug.trim() != slug {
    return Err(Error::InvalidInput(format!(
      "slug {slug:?} has leading or trailing whitespace"
    )));
  }
  Ok(())
}
