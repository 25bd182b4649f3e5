//! The order aggregate.
//!
//! An [`Order`] is the root of a four-table aggregate keyed by `order_uid`. The wire
//! format (one JSON object per broker message) mirrors these types exactly, so the
//! same structs are used for decoding inbound messages, for persistence, and for the
//! HTTP read endpoint.
//!
//! # Wire example
//!
//! ```json
//! {
//!   "order_uid": "b563feb7b2b84b6test",
//!   "track_number": "WBILMTESTTRACK",
//!   "entry": "WBIL",
//!   "delivery": { "name": "Test Testov", "phone": "+9720000000", "zip": "2639809",
//!                 "city": "Kiryat Mozkin", "address": "Ploshad Mira 15",
//!                 "region": "Kraiot", "email": "test@gmail.com" },
//!   "payment": { "transaction": "b563feb7b2b84b6test", "request_id": "", "currency": "USD",
//!                "provider": "wbpay", "amount": 1817, "payment_dt": 1637907727,
//!                "bank": "alpha", "delivery_cost": 1500, "goods_total": 317, "custom_fee": 0 },
//!   "items": [ { "chrt_id": 9934930, "track_number": "WBILMTESTTRACK", "price": 453,
//!                "rid": "ab4219087a764ae0btest", "name": "Mascaras", "sale": 30, "size": "0",
//!                "total_price": 317, "nm_id": 2389212, "brand": "Vivienne Sabo", "status": 202 } ],
//!   "locale": "en", "internal_signature": "", "customer_id": "test",
//!   "delivery_service": "meest", "shardkey": "9", "sm_id": 99,
//!   "date_created": "2021-11-26T06:22:19Z", "oof_shard": "1"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Root of the order aggregate.
///
/// `order_uid` is the sole identity of an order. Re-ingesting the same identifier
/// never creates a second root row; the first `date_created` wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Globally unique order identifier
    pub order_uid: String,
    /// Shipment tracking number
    pub track_number: String,
    /// Entry point code
    pub entry: String,
    /// Delivery recipient (exactly one per order)
    pub delivery: Delivery,
    /// Payment record (exactly one per order)
    pub payment: Payment,
    /// Line items (zero or more per order)
    #[serde(default)]
    pub items: Vec<Item>,
    /// Customer locale
    pub locale: String,
    /// Internal signature, often empty
    #[serde(default)]
    pub internal_signature: String,
    /// Customer identifier
    pub customer_id: String,
    /// Delivery service name
    pub delivery_service: String,
    /// Shard key (`shardkey` on the wire)
    #[serde(rename = "shardkey")]
    pub shard_key: String,
    /// Shard map identifier
    pub sm_id: i32,
    /// When the order was created upstream
    pub date_created: DateTime<Utc>,
    /// Out-of-flow shard
    pub oof_shard: String,
}

/// Delivery recipient of an order, keyed by the owning `order_uid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Recipient name
    pub name: String,
    /// Recipient phone
    pub phone: String,
    /// Postal code
    #[serde(default)]
    pub zip: String,
    /// City
    pub city: String,
    /// Street address
    pub address: String,
    /// Region
    #[serde(default)]
    pub region: String,
    /// Contact email
    pub email: String,
}

/// Payment record of an order, keyed by the owning `order_uid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment transaction id
    pub transaction: String,
    /// Upstream request id, often empty
    #[serde(default)]
    pub request_id: String,
    /// ISO currency code
    pub currency: String,
    /// Payment provider
    pub provider: String,
    /// Total amount charged
    pub amount: i64,
    /// Payment time, epoch seconds
    pub payment_dt: i64,
    /// Bank name
    pub bank: String,
    /// Delivery cost
    pub delivery_cost: i64,
    /// Goods total
    pub goods_total: i64,
    /// Customs fee
    #[serde(default)]
    pub custom_fee: i64,
}

/// One line item of an order.
///
/// Items are identified within their order by `rid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Catalogue characteristic id
    pub chrt_id: i64,
    /// Tracking number
    pub track_number: String,
    /// Unit price
    pub price: i64,
    /// Item row identifier, unique within an order
    pub rid: String,
    /// Product name
    pub name: String,
    /// Discount percentage
    #[serde(default)]
    pub sale: i32,
    /// Size label
    #[serde(default)]
    pub size: String,
    /// Price after discount
    pub total_price: i64,
    /// Catalogue nomenclature id
    pub nm_id: i64,
    /// Brand
    pub brand: String,
    /// Item status code
    pub status: i32,
}

impl Order {
    /// Decode an order from a JSON payload.
    ///
    /// Unknown fields are ignored. Missing required fields or type mismatches fail.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when the payload is not a
    /// well-formed order object.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
