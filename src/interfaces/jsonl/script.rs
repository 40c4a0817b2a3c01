use crate::domain::ids::Id;
use crate::domain::money::{Money, Quantity};
use crate::domain::ports::{CartStoreRef, CatalogRef};
use crate::domain::product::Product;
use crate::error::{IntakeError, Resource, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// One line of a cart script.
///
/// `cart` and `order` accept either a raw identifier or a name bound earlier
/// with `"as"`.
///
/// ```json
/// {"op":"create","customer_id":42,"as":"c1"}
/// {"op":"add","cart":"c1","product_id":7,"quantity":2}
/// {"op":"get","cart":"c1","items":true}
/// {"op":"checkout","cart":"c1","as":"o1"}
/// {"op":"get_order","order":"o1"}
/// {"op":"set_price","product_id":7,"price":"19.99"}
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CartCommand {
    Create {
        customer_id: i64,
        #[serde(rename = "as")]
        alias: Option<String>,
    },
    Get {
        cart: Id,
        #[serde(default)]
        items: bool,
    },
    Add {
        cart: Id,
        product_id: i64,
        quantity: i64,
    },
    Checkout {
        cart: Id,
        #[serde(rename = "as")]
        alias: Option<String>,
    },
    GetOrder {
        order: Id,
    },
    SetPrice {
        product_id: i64,
        price: Money,
        name: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct ItemAdded {
    shopping_cart_id: Id,
    product_id: i64,
    quantity: Quantity,
}

/// Runs [`CartCommand`]s against a cart store, keeping the alias table
/// between commands.
pub struct CartScript {
    store: CartStoreRef,
    catalog: CatalogRef,
    aliases: HashMap<String, Id>,
}

impl CartScript {
    pub fn new(store: CartStoreRef, catalog: CatalogRef) -> Self {
        Self {
            store,
            catalog,
            aliases: HashMap::new(),
        }
    }

    /// Maps a script identifier onto the store's identifier shape.
    ///
    /// Bound names win; other strings are parsed as the store expects. A bare
    /// JSON number is passed through untouched so a token store can reject it.
    fn resolve(&self, raw: &Id) -> Result<Id> {
        match raw {
            Id::Token(name) => match self.aliases.get(name) {
                Some(id) => Ok(id.clone()),
                None => Id::parse(name, self.store.id_kind()),
            },
            Id::Numeric(_) => Ok(raw.clone()),
        }
    }

    fn bind(&mut self, alias: Option<String>, id: &Id) {
        if let Some(alias) = alias {
            self.aliases.insert(alias, id.clone());
        }
    }

    pub async fn execute(&mut self, command: CartCommand) -> Result<Value> {
        match command {
            CartCommand::Create { customer_id, alias } => {
                let cart = self.store.create_cart(customer_id).await?;
                self.bind(alias, &cart.id);
                Ok(json!({ "shopping_cart_id": cart.id }))
            }
            CartCommand::Get { cart, items } => {
                let id = self.resolve(&cart)?;
                if items {
                    to_value(&self.store.get_cart_with_items(&id).await?)
                } else {
                    to_value(&self.store.get_cart(&id).await?)
                }
            }
            CartCommand::Add {
                cart,
                product_id,
                quantity,
            } => {
                let id = self.resolve(&cart)?;
                let quantity = Quantity::try_from(quantity)?;
                self.store.add_or_update_item(&id, product_id, quantity).await?;
                to_value(&ItemAdded {
                    shopping_cart_id: id,
                    product_id,
                    quantity,
                })
            }
            CartCommand::Checkout { cart, alias } => {
                let id = self.resolve(&cart)?;
                let order = self.store.checkout(&id).await?;
                self.bind(alias, &order.order_id);
                Ok(json!({ "order_id": order.order_id }))
            }
            CartCommand::GetOrder { order } => {
                let id = self.resolve(&order)?;
                to_value(&self.store.get_order(&id).await?)
            }
            CartCommand::SetPrice {
                product_id,
                price,
                name,
            } => {
                let name = match name {
                    Some(name) => name,
                    None => self
                        .catalog
                        .product(product_id)
                        .await?
                        .map(|product| product.name)
                        .ok_or(IntakeError::NotFound(Resource::Product))?,
                };
                let product = Product::new(product_id, name, price);
                self.catalog.upsert(product.clone()).await?;
                to_value(&product)
            }
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| IntakeError::BackendError(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::document::DocumentCartStore;
    use crate::infrastructure::in_memory::{InMemoryCatalog, InMemoryDocumentTable};
    use std::sync::Arc;

    fn command(raw: &str) -> CartCommand {
        serde_json::from_str(raw).unwrap()
    }

    fn document_script() -> CartScript {
        let catalog = Arc::new(InMemoryCatalog::seeded(100));
        let store = DocumentCartStore::new(
            Arc::new(InMemoryDocumentTable::new()),
            Arc::new(InMemoryDocumentTable::new()),
            catalog.clone(),
        );
        CartScript::new(Arc::new(store), catalog)
    }

    #[tokio::test]
    async fn test_aliases_flow_between_commands() {
        let mut script = document_script();
        let created = script
            .execute(command(r#"{"op":"create","customer_id":42,"as":"c1"}"#))
            .await
            .unwrap();
        assert!(created["shopping_cart_id"].is_string());

        script
            .execute(command(r#"{"op":"add","cart":"c1","product_id":7,"quantity":2}"#))
            .await
            .unwrap();
        let cart = script
            .execute(command(r#"{"op":"get","cart":"c1","items":true}"#))
            .await
            .unwrap();
        assert_eq!(cart["items"][0]["quantity"], 2);

        script
            .execute(command(r#"{"op":"checkout","cart":"c1","as":"o1"}"#))
            .await
            .unwrap();
        let order = script
            .execute(command(r#"{"op":"get_order","order":"o1"}"#))
            .await
            .unwrap();
        assert_eq!(order["customer_id"], 42);
    }

    #[tokio::test]
    async fn test_numeric_id_rejected_by_token_store() {
        let mut script = document_script();
        let result = script.execute(command(r#"{"op":"get","cart":5}"#)).await;
        assert!(matches!(result, Err(IntakeError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let mut script = document_script();
        script
            .execute(command(r#"{"op":"create","customer_id":1,"as":"c"}"#))
            .await
            .unwrap();
        let result = script
            .execute(command(r#"{"op":"add","cart":"c","product_id":1,"quantity":0}"#))
            .await;
        assert!(matches!(result, Err(IntakeError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_set_price_keeps_name() {
        let mut script = document_script();
        let product = script
            .execute(command(r#"{"op":"set_price","product_id":7,"price":"19.99"}"#))
            .await
            .unwrap();
        assert_eq!(product["name"], "Product 7");

        let missing = script
            .execute(command(r#"{"op":"set_price","product_id":1000,"price":"1"}"#))
            .await;
        assert!(matches!(missing, Err(IntakeError::NotFound(_))));
    }
}
