//! Axum HTTP surface for the order ingest service.
//!
//! The web layer is a thin shell over the read path in `order-ingest-runtime`:
//!
//! ```text
//! GET /order/:id ──► get_order ──► OrderReader ──► cache ─(miss)─► OrderStore
//!                                       │
//!                    200 / 404 / 500 ◄──┘  (AppError maps StoreError)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use order_ingest_web::{AppState, order_router};
//!
//! let app = order_router(AppState::new(reader));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8081").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::AppError;
pub use router::{metrics_router, order_router};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
