//! Process wiring for the segment service: configuration, the expiration
//! sweeper and shutdown signalling. The binary in `main.rs` ties them to the
//! HTTP router from `segments-api`.

pub mod config;
pub mod shutdown;
pub mod sweeper;

pub use config::ServerConfig;
pub use sweeper::Sweeper;
