use super::ids::Id;
use super::money::{Money, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shopping cart, without its lines.
///
/// A cart exists independently of its lines; an empty cart is valid until checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(rename = "shopping_cart_id")]
    pub id: Id,
    pub customer_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line of a cart, with the name and unit price that apply to it.
///
/// The relational backend resolves `product_name`/`product_price` from the
/// live catalog; the document backend reports the snapshot taken when the
/// line was first added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: i64,
    pub shopping_cart_id: Id,
    pub product_id: i64,
    pub product_name: String,
    pub product_price: Money,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    pub fn subtotal(&self) -> Money {
        self.product_price * self.quantity
    }
}

/// A consistent snapshot of a cart and all of its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartWithItems {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartLine>,
}

impl CartWithItems {
    pub fn total(&self) -> Money {
        self.items.iter().map(CartLine::subtotal).sum()
    }

    pub fn line_for(&self, product_id: i64) -> Option<&CartLine> {
        self.items.iter().find(|line| line.product_id == product_id)
    }
}
