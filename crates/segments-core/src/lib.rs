//! Core types, the storage trait, and membership rules for the segment
//! service.
//!
//! This crate has no HTTP or SQL dependencies. The storage
//! backend is reached only through [`store::SegmentStore`], so the
//! [`service::AssignmentService`] can run against [`memory::MemoryStore`] in
//! tests and against SQLite in production.

// Impls use native `async fn`; the trait spells out the `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod assignment;
pub mod error;
pub mod memory;
pub mod segment;
pub mod service;
pub mod store;
pub mod user;

pub use error::{Error, Result};
