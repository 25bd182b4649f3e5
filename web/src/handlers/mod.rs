//! HTTP request handlers.

pub mod health;
pub mod order;

pub use health::{health_check, readiness};
pub use order::{get_order, missing_order_id};
