//! Order lookup endpoint.

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use order_ingest_core::Order;

/// Get one order by id, from the cache when possible.
///
/// # Endpoint
///
/// ```text
/// GET /order/:order_uid
/// ```
///
/// # Errors
///
/// - 400 if the id is blank
/// - 404 if no complete order exists
/// - 500 if the store could not answer
#[tracing::instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> WebResult<Json<Order>> {
    let order_uid = order_uid.trim();
    if order_uid.is_empty() {
        return Err(missing_order_uid());
    }

    let order = state.reader().get_order_for_read(order_uid).await?;
    Ok(Json(order))
}

/// `GET /order/` and `GET /order` with no id.
#[allow(clippy::unused_async)]
pub async fn missing_order_id() -> AppError {
    missing_order_uid()
}

fn missing_order_uid() -> AppError {
    AppError::bad_request("order_uid must not be empty")
}
