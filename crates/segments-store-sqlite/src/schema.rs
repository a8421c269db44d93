//! SQL schema for the segment store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id  TEXT PRIMARY KEY,
    name     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS segments (
    segment_id   TEXT PRIMARY KEY,
    slug         TEXT NOT NULL UNIQUE,
    description  TEXT
);

-- At most one row per (user, segment). Rows with delete_at in the past are
-- logically expired and removed by the sweeper.
CREATE TABLE IF NOT EXISTS segment_assignments (
    user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    segment_id  TEXT NOT NULL REFERENCES segments(segment_id) ON DELETE CASCADE,
    delete_at   TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    UNIQUE (user_id, segment_id)
);

-- Strictly append-only. No foreign keys: the audit trail outlives the users
-- and segments it mentions.
CREATE TABLE IF NOT EXISTS user_segment_history (
    history_id    TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    segment_id    TEXT NOT NULL,
    operation     TEXT NOT NULL CHECK (operation IN ('ADD', 'REMOVE')),
    operation_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS assignments_segment_idx   ON segment_assignments(segment_id);
CREATE INDEX IF NOT EXISTS assignments_delete_at_idx ON segment_assignments(delete_at);
CREATE INDEX IF NOT EXISTS history_user_idx          ON user_segment_history(user_id);
CREATE INDEX IF NOT EXISTS history_operation_at_idx  ON user_segment_history(operation_at);

PRAGMA user_version = 1;
";
