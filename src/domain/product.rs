use super::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog entry, as far as carts and checkout care about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            name: name.into(),
            price,
        }
    }

    /// The deterministic seed product for `id`: `Product {id}` priced at
    /// `(id % 100) + 1` units plus `(id % 100)` hundredths.
    pub fn seeded(id: i64) -> Self {
        let bucket = id.rem_euclid(100);
        let price = Decimal::from(bucket + 1) + Decimal::new(bucket, 2);
        Self::new(id, format!("Product {id}"), Money::new(price))
    }
}
