use super::ids::Id;
use super::money::{Money, Quantity};
use crate::error::{IntakeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(OrderStatus::Pending),
            "completed" => Some(OrderStatus::Completed),
            _ => None,
        }
    }
}

/// A line copied from the cart at checkout, priced at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: Quantity,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// The order record produced by a cart checkout.
///
/// Its id has the same shape as the cart it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Id,
    pub customer_id: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds a pending order from checkout lines; the total is always derived
    /// from the lines.
    pub fn from_lines(order_id: Id, customer_id: i64, items: Vec<OrderLine>) -> Self {
        let total_amount = items.iter().map(OrderLine::subtotal).sum();
        Self {
            order_id,
            customer_id,
            status: OrderStatus::Pending,
            items,
            total_amount,
            created_at: Utc::now(),
        }
    }
}

fn default_status() -> String {
    OrderStatus::Pending.as_str().to_string()
}

/// An item of a directly submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: Quantity,
    pub price: Money,
}

/// The payload accepted by both submission paths. The queue message body is
/// this same JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub order_id: String,
    pub customer_id: i64,
    #[serde(default = "default_status")]
    pub status: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderPayload {
    /// Decodes a payload; malformed JSON is a validation failure.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| IntakeError::validation(format!("invalid JSON body: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| IntakeError::BackendError(Box::new(e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.order_id.trim().is_empty() {
            return Err(IntakeError::validation("order_id is required"));
        }
        if self.items.is_empty() {
            return Err(IntakeError::validation(
                "order must contain at least one item",
            ));
        }
        if self.items.iter().any(|item| item.price < Money::ZERO) {
            return Err(IntakeError::validation("item price must not be negative"));
        }
        Ok(())
    }

    pub fn total(&self) -> Money {
        self.items
            .iter()
            .map(|item| item.price * item.quantity)
            .sum()
    }
}

/// Reply of the synchronous path, produced only after payment completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    pub processing_time: String,
    pub message: String,
}

/// Immediate acknowledgment of the asynchronous path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedResponse {
    pub order_id: String,
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payload_decoding() {
        let raw = r#"{"order_id":"o-1","customer_id":42,"items":[{"product_id":"7","quantity":2,"price":8.07}]}"#;
        let payload = OrderPayload::from_json(raw).unwrap();
        assert_eq!(payload.status, "pending");
        assert_eq!(payload.items[0].price, Money::new(dec!(8.07)));
        assert_eq!(payload.total(), Money::new(dec!(16.14)));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_payload_validation() {
        let empty = OrderPayload::from_json(r#"{"order_id":"o-2","customer_id":1,"items":[]}"#)
            .unwrap();
        assert!(matches!(
            empty.validate(),
            Err(IntakeError::ValidationError(_))
        ));

        let zero_qty = OrderPayload::from_json(
            r#"{"order_id":"o-3","customer_id":1,"items":[{"product_id":"1","quantity":0,"price":1}]}"#,
        );
        assert!(matches!(zero_qty, Err(IntakeError::ValidationError(_))));

        assert!(matches!(
            OrderPayload::from_json("{not json"),
            Err(IntakeError::ValidationError(_))
        ));
    }

    #[test]
    fn test_order_total_from_lines() {
        let order = Order::from_lines(
            Id::Numeric(1),
            42,
            vec![
                OrderLine {
                    product_id: 7,
                    quantity: Quantity::new(5).unwrap(),
                    unit_price: Money::new(dec!(8.07)),
                },
                OrderLine {
                    product_id: 9,
                    quantity: Quantity::new(1).unwrap(),
                    unit_price: Money::new(dec!(10.09)),
                },
            ],
        );
        assert_eq!(order.total_amount, Money::new(dec!(50.44)));
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
