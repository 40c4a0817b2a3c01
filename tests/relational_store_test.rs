mod common;

use order_intake::domain::ids::Id;
use order_intake::domain::money::{Money, Quantity};
use order_intake::domain::ports::{CartStore, Catalog};
use order_intake::domain::product::Product;
use order_intake::error::{IntakeError, Resource};
use order_intake::infrastructure::relational::SqlCartStore;
use rand::Rng;
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn qty(value: i64) -> Quantity {
    Quantity::new(value).unwrap()
}

#[tokio::test]
async fn test_cart_lifecycle_example() {
    let store = common::relational_store().await;

    let cart = store.create_cart(42).await.unwrap();
    assert!(matches!(cart.id, Id::Numeric(_)));

    store.add_or_update_item(&cart.id, 7, qty(2)).await.unwrap();
    store.add_or_update_item(&cart.id, 7, qty(3)).await.unwrap();

    let snapshot = store.get_cart_with_items(&cart.id).await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
    let line = snapshot.line_for(7).unwrap();
    assert_eq!(line.quantity, qty(5));
    assert_eq!(line.product_name, "Product 7");

    let order = store.checkout(&cart.id).await.unwrap();
    assert_eq!(order.customer_id, 42);
    assert_eq!(order.total_amount, Money::new(dec!(40.35)));

    // The cart survives as an empty shell and never shows the old line again.
    let after = store.get_cart_with_items(&cart.id).await.unwrap();
    assert!(after.items.is_empty());

    let stored = store.get_order(&order.order_id).await.unwrap();
    assert_eq!(stored.total_amount, order.total_amount);
    assert_eq!(stored.items.len(), 1);
}

#[tokio::test]
async fn test_checkout_uses_live_price() {
    let store = common::relational_store().await;
    let catalog = store.catalog();

    let cart = store.create_cart(1).await.unwrap();
    store.add_or_update_item(&cart.id, 7, qty(2)).await.unwrap();

    catalog
        .upsert(Product::new(7, "Product 7", Money::new(dec!(10.00))))
        .await
        .unwrap();

    let snapshot = store.get_cart_with_items(&cart.id).await.unwrap();
    assert_eq!(snapshot.items[0].product_price, Money::new(dec!(10.00)));

    let order = store.checkout(&cart.id).await.unwrap();
    assert_eq!(order.items[0].unit_price, Money::new(dec!(10.00)));
    assert_eq!(order.total_amount, Money::new(dec!(20.00)));
}

#[tokio::test]
async fn test_empty_checkout_leaves_cart_untouched() {
    let store = common::relational_store().await;
    let cart = store.create_cart(9).await.unwrap();

    let result = store.checkout(&cart.id).await;
    assert!(matches!(result, Err(IntakeError::EmptyCart)));

    let unchanged = store.get_cart(&cart.id).await.unwrap();
    assert_eq!(unchanged.updated_at, cart.updated_at);

    assert!(matches!(
        store.checkout(&Id::Numeric(9999)).await,
        Err(IntakeError::NotFound(Resource::Cart))
    ));
}

#[tokio::test]
async fn test_second_checkout_sees_empty_cart() {
    let store = common::relational_store().await;
    let cart = store.create_cart(3).await.unwrap();
    store.add_or_update_item(&cart.id, 1, qty(1)).await.unwrap();

    store.checkout(&cart.id).await.unwrap();
    assert!(matches!(
        store.checkout(&cart.id).await,
        Err(IntakeError::EmptyCart)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_merge_into_one_line() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("carts.db").display());
    let store = SqlCartStore::connect(&url).await.unwrap();
    store.seed_products(10).await.unwrap();

    let cart = store.create_cart(5).await.unwrap();
    let quantities: Vec<i64> = {
        let mut rng = rand::thread_rng();
        (0..16).map(|_| rng.gen_range(1..=20)).collect()
    };

    let handles: Vec<_> = quantities
        .iter()
        .map(|&quantity| {
            let store = store.clone();
            let cart_id = cart.id.clone();
            tokio::spawn(async move {
                store
                    .add_or_update_item(&cart_id, 3, Quantity::new(quantity).unwrap())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let snapshot = store.get_cart_with_items(&cart.id).await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(
        i64::from(snapshot.items[0].quantity),
        quantities.iter().sum::<i64>()
    );
    store.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_checkouts_create_one_order() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("race.db").display());
    let store = SqlCartStore::connect(&url).await.unwrap();
    store.seed_products(10).await.unwrap();

    let cart = store.create_cart(5).await.unwrap();
    store.add_or_update_item(&cart.id, 2, qty(4)).await.unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let cart_id = cart.id.clone();
            tokio::spawn(async move { store.checkout(&cart_id).await })
        })
        .collect();

    let mut orders = 0;
    let mut empty = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => orders += 1,
            Err(IntakeError::EmptyCart) => empty += 1,
            Err(e) => panic!("unexpected checkout error: {e}"),
        }
    }
    assert_eq!((orders, empty), (1, 1));
    store.close().await;
}
