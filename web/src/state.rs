//! Application state for Axum handlers.

use order_ingest_runtime::OrderReader;

/// Application state shared across all HTTP handlers.
///
/// Cloning is cheap: the reader holds its store and cache behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    reader: OrderReader,
}

impl AppState {
    /// Create the state around an order reader.
    #[must_use]
    pub const fn new(reader: OrderReader) -> Self {
        Self { reader }
    }

    /// Read path used by the order handler.
    #[must_use]
    pub const fn reader(&self) -> &OrderReader {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
