//! Users and the user-with-segments read model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id: Uuid,
  pub name:    String,
}

/// A user together with the slugs of every segment it currently belongs to.
///
/// Computed on read; logically expired assignments are never included, and a
/// user without assignments carries an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWithSegments {
  pub user_id:       Uuid,
  pub name:          String,
  /// Sorted ascending.
  pub segment_slugs: Vec<String>,
}
