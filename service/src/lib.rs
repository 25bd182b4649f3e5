//! Process wiring for the order ingest service.
//!
//! - [`config`]: environment-driven [`Config`]
//! - [`bootstrap`]: bounded storage acquisition and unbounded broker wait
//! - [`lifecycle`]: consumer task and graceful shutdown
//!
//! # Startup Sequence
//!
//! ```text
//! config ─► metrics ─► acquire_storage ─► warm cache ─► replay dead letters
//!                                                              │
//!                    ┌─────────────────────────────────────────┤
//!                    ▼                                         ▼
//!   consumer task: wait_for_broker ─► consume          HTTP read API
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod lifecycle;

pub use bootstrap::{acquire_storage, wait_for_broker};
pub use config::{Config, ConfigError};
