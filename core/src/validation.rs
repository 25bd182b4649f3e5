//! Structural validation of inbound orders.
//!
//! Decoding only proves the payload has the right shape. Validation checks the
//! content: identifiers are non-blank, amounts are non-negative, nested records are
//! well formed and item `rid`s are unique within the order. Every violation is
//! collected so a rejected message can be diagnosed from a single log line.

use crate::order::{Delivery, Item, Order, Payment};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dotted path of the offending field (e.g. `items[2].rid`)
    pub field: String,
    /// What is wrong with it
    pub reason: &'static str,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// An order that decoded but failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("order {order_uid:?} failed validation: {}", join(.violations))]
pub struct ValidationError {
    /// Identifier of the rejected order, possibly blank
    pub order_uid: String,
    /// Every rule the order broke
    pub violations: Vec<FieldViolation>,
}

fn join(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

const BLANK: &str = "must not be blank";
const NEGATIVE: &str = "must not be negative";
const NOT_POSITIVE: &str = "must be positive";

struct Checker {
    violations: Vec<FieldViolation>,
}

impl Checker {
    fn fail(&mut self, field: impl Into<String>, reason: &'static str) {
        self.violations.push(FieldViolation {
            field: field.into(),
            reason,
        });
    }

    fn not_blank(&mut self, field: impl Into<String>, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, BLANK);
        }
    }

    fn identifier(&mut self, field: &'static str, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.fail(field, BLANK);
        } else if trimmed.len() != value.len() {
            self.fail(field, "must not have leading or trailing whitespace");
        }
    }

    fn non_negative(&mut self, field: impl Into<String>, value: i64) {
        if value < 0 {
            self.fail(field, NEGATIVE);
        }
    }

    fn positive(&mut self, field: impl Into<String>, value: i64) {
        if value <= 0 {
            self.fail(field, NOT_POSITIVE);
        }
    }

    fn delivery(&mut self, delivery: &Delivery) {
        self.not_blank("delivery.name", &delivery.name);
        self.not_blank("delivery.phone", &delivery.phone);
        self.not_blank("delivery.city", &delivery.city);
        self.not_blank("delivery.address", &delivery.address);
        self.not_blank("delivery.email", &delivery.email);
        if !delivery.email.trim().is_empty() && !delivery.email.contains('@') {
            self.fail("delivery.email", "must be an email address");
        }
    }

    fn payment(&mut self, payment: &Payment) {
        self.not_blank("payment.transaction", &payment.transaction);
        self.not_blank("payment.currency", &payment.currency);
        self.not_blank("payment.provider", &payment.provider);
        self.not_blank("payment.bank", &payment.bank);
        self.non_negative("payment.amount", payment.amount);
        self.positive("payment.payment_dt", payment.payment_dt);
        self.non_negative("payment.delivery_cost", payment.delivery_cost);
        self.non_negative("payment.goods_total", payment.goods_total);
        self.non_negative("payment.custom_fee", payment.custom_fee);
    }

    fn item(&mut self, index: usize, item: &Item) {
        let field = |name: &str| format!("items[{index}].{name}");
        self.positive(field("chrt_id"), item.chrt_id);
        self.not_blank(field("track_number"), &item.track_number);
        self.non_negative(field("price"), item.price);
        self.not_blank(field("rid"), &item.rid);
        self.not_blank(field("name"), &item.name);
        if !(0..=100).contains(&item.sale) {
            self.fail(field("sale"), "must be a percentage between 0 and 100");
        }
        self.non_negative(field("total_price"), item.total_price);
        self.positive(field("nm_id"), item.nm_id);
        self.not_blank(field("brand"), &item.brand);
        self.non_negative(field("status"), i64::from(item.status));
    }
}

impl Order {
    /// Check the order's structure.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker {
            violations: Vec::new(),
        };

        check.identifier("order_uid", &self.order_uid);
        check.not_blank("track_number", &self.track_number);
        check.not_blank("entry", &self.entry);
        check.not_blank("locale", &self.locale);
        check.not_blank("customer_id", &self.customer_id);
        check.not_blank("delivery_service", &self.delivery_service);
        check.not_blank("shardkey", &self.shard_key);
        check.not_blank("oof_shard", &self.oof_shard);
        check.non_negative("sm_id", i64::from(self.sm_id));

        check.delivery(&self.delivery);
        check.payment(&self.payment);

        let mut seen = HashSet::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            check.item(index, item);
            if !item.rid.trim().is_empty() && !seen.insert(item.rid.as_str()) {
                check.fail(format!("items[{index}].rid"), "duplicates another item in the order");
            }
        }

        if check.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                order_uid: self.order_uid.clone(),
                violations: check.violations,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use proptest::prelude::*;

    fn item(rid: &str) -> Item {
        Item {
            chrt_id: 9_934_930,
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

    fn order() -> Order {
        Order {
            order_uid: "A1".to_string(),
            track_number: "T1".to_string(),
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
                transaction: "A1".to_string(),
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
            items: vec![item("rid-1")],
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

    #[test]
    fn well_formed_order_passes() {
        assert!(order().validate().is_ok());
    }

    #[test]
    fn order_without_items_passes() {
        let mut order = order();
        order.items.clear();
        assert!(order.validate().is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut order = order();
        order.order_uid = "   ".to_string();
        order.delivery.email = "not-an-email".to_string();
        order.payment.amount = -1;

        let err = order.validate().unwrap_err();
        let fields: Vec<_> = err.violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["order_uid", "delivery.email", "payment.amount"]);
    }

    #[test]
    fn rejects_malformed_item() {
        let mut order = order();
        order.items[0].rid = String::new();
        order.items[0].sale = 140;

        let err = order.validate().unwrap_err();
        assert!(err.violations.iter().any(|v| v.field == "items[0].rid"));
        assert!(err.violations.iter().any(|v| v.field == "items[0].sale"));
    }

    #[test]
    fn rejects_duplicate_item_rid() {
        let mut order = order();
        order.items.push(item("rid-1"));

        let err = order.validate().unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, "items[1].rid");
    }

    #[test]
    fn rejects_padded_order_uid() {
        for padded in [" A1", "A1 ", "\tA1\n"] {
            let mut order = order();
            order.order_uid = padded.to_string();

            let err = order.validate().unwrap_err();
            assert_eq!(err.violations.len(), 1);
            assert_eq!(err.violations[0].field, "order_uid");
            assert_eq!(
                err.violations[0].reason,
                "must not have leading or trailing whitespace"
            );
        }
    }

    #[test]
    fn error_message_names_fields() {
        let mut order = order();
        order.track_number = String::new();
        let message = order.validate().unwrap_err().to_string();
        assert!(message.contains("\"A1\""));
        assert!(message.contains("track_number: must not be blank"));
    }

    proptest! {
        #[test]
        fn blank_order_uid_never_validates(spaces in "[ \t]{0,8}") {
            let mut order = order();
            order.order_uid = spaces;
            prop_assert!(order.validate().is_err());
        }
    }
}
