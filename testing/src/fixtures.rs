//! Sample orders and payloads.

use chrono::{TimeZone, Utc};
use order_ingest_core::{Delivery, InboundMessage, Item, Order, Payment};

/// Topic used by fixture messages.
pub const TOPIC: &str = "orders";

/// A valid order with one item, modelled on the reference sample.
#[must_use]
pub fn order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![item("ab4219087a764ae0btest", 9_934_930)],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shard_key: "9".to_string(),
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".to_string(),
    }
}

/// A valid order created `minutes` after the reference timestamp.
#[must_use]
pub fn order_created_at(order_uid: &str, minutes: i64) -> Order {
    let mut order = order(order_uid);
    order.date_created += chrono::Duration::minutes(minutes);
    order
}

/// A valid item.
#[must_use]
pub fn item(rid: &str, chrt_id: i64) -> Item {
    Item {
        chrt_id,
        track_number: "WBILMTESTTRACK".to_string(),
        price: 453,
        rid: rid.to_string(),
        name: "Mascaras".to_string(),
        sale: 30,
        size: "0".to_string(),
        total_price: 317,
        nm_id: 2_389_212,
        brand: "Vivienne Sabo".to_string(),
        status: 202,
    }
}

/// JSON payload for an order.
#[must_use]
pub fn payload(order: &Order) -> Vec<u8> {
    serde_json::to_vec(order).unwrap()
}

/// Broker message carrying an order at the given offset.
#[must_use]
pub fn message(order: &Order, offset: i64) -> InboundMessage {
    InboundMessage::new(TOPIC, 0, offset, payload(order))
}

/// Broker message carrying an arbitrary payload at the given offset.
#[must_use]
pub fn raw_message(payload: &[u8], offset: i64) -> InboundMessage {
    InboundMessage::new(TOPIC, 0, offset, payload.to_vec())
}
