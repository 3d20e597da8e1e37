//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon,
//! so they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use domain::{Money, Order, OrderId, OrderItem, OrderStatus, PaymentStatus, Product, ProductId, UserId};
use serial_test::serial;
use sqlx::PgPool;
use store::{PostgresStore, Store, StoreError, Transaction};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let store = PostgresStore::connect(&connection_string, 2).await.unwrap();
            store.run_migrations().await.unwrap();
            store.pool().close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool, cleared tables and a seeded widget.
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    clear_tables(&pool).await;

    let store = PostgresStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    tx.upsert_product(&widget()).await.unwrap();
    tx.commit().await.unwrap();
    store
}

async fn clear_tables(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE order_items, orders, cart_items, carts, products")
        .execute(pool)
        .await
        .unwrap();
}

fn widget() -> Product {
    Product::new("SKU-001", "Widget", Money::from_cents(1000), 5)
}

fn widget_id() -> ProductId {
    ProductId::new("SKU-001")
}

async fn stock(store: &PostgresStore) -> u32 {
    let mut tx = store.begin().await.unwrap();
    tx.product(&widget_id()).await.unwrap().unwrap().stock
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn product_roundtrip() {
    let store = get_test_store().await;
    let mut tx = store.begin().await.unwrap();

    let product = tx.product(&widget_id()).await.unwrap().unwrap();
    assert_eq!(product, widget());
    assert!(tx.product(&ProductId::new("SKU-404")).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn debit_never_goes_negative() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.debit_stock(&widget_id(), 3).await.unwrap(), Some(2));
    assert_eq!(tx.debit_stock(&widget_id(), 3).await.unwrap(), None);
    tx.commit().await.unwrap();

    assert_eq!(stock(&store).await, 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn concurrent_debits_serialize_on_the_row() {
    let store = get_test_store().await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await.unwrap();
            let debited = tx.debit_stock(&widget_id(), 2).await.unwrap();
            tx.commit().await.unwrap();
            debited.is_some()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 2);
    assert_eq!(stock(&store).await, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn rollback_on_drop() {
    let store = get_test_store().await;

    {
        let mut tx = store.begin().await.unwrap();
        tx.debit_stock(&widget_id(), 5).await.unwrap();
    }

    assert_eq!(stock(&store).await, 5);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn cart_lines_merge_and_cascade_on_delete() {
    let store = get_test_store().await;
    let user = UserId::new();

    let mut tx = store.begin().await.unwrap();
    let cart = tx.open_cart(user, Utc::now()).await.unwrap();
    let again = tx.open_cart(user, Utc::now()).await.unwrap();
    assert_eq!(cart.id, again.id);

    tx.add_cart_item(cart.id, &widget_id(), 2).await.unwrap();
    let line = tx.add_cart_item(cart.id, &widget_id(), 1).await.unwrap();
    assert_eq!(line.quantity, 3);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let cart = tx.lock_cart_by_user(user).await.unwrap().unwrap();
    assert_eq!(cart.items.len(), 1);
    assert!(!tx.delete_cart(cart.id, UserId::new()).await.unwrap());
    assert!(tx.delete_cart(cart.id, user).await.unwrap());
    tx.commit().await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn order_roundtrip_and_status_update() {
    let store = get_test_store().await;
    let user = UserId::new();
    let id = OrderId::new();
    let items = vec![OrderItem::snapshot(id, &widget(), 3)];
    let order = Order::place(id, user, items, "pi_0001", Utc::now()).unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let mut locked = tx
        .lock_order_by_payment_ref("pi_0001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locked.total().cents(), 3000);
    locked
        .mark_failed(PaymentStatus::Paid, "insufficient stock for SKU-001")
        .unwrap();
    tx.update_order_status(&locked).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let stored = tx.order(id).await.unwrap().unwrap();
    assert_eq!(stored.status(), OrderStatus::Failed);
    assert_eq!(stored.payment_status(), PaymentStatus::Paid);
    assert_eq!(
        stored.failure_reason(),
        Some("insufficient stock for SKU-001")
    );
    assert_eq!(stored.items(), order.items());

    let listed = tx.orders_by_user(user).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(tx.lock_order_by_payment_ref("pi_9999").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn add_to_cart_deleted_by_checkout_conflicts() {
    let store = get_test_store().await;
    let user = UserId::new();

    let mut tx = store.begin().await.unwrap();
    let cart = tx.open_cart(user, Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    // Checkout holds the cart lock while the add waits on it.
    let mut checkout = store.begin().await.unwrap();
    let locked = checkout.lock_cart_by_user(user).await.unwrap().unwrap();

    let adder = store.clone();
    let add = tokio::spawn(async move {
        let mut tx = adder.begin().await.unwrap();
        tx.add_cart_item(cart.id, &widget_id(), 1).await
    });
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert!(checkout.delete_cart(locked.id, user).await.unwrap());
    checkout.commit().await.unwrap();

    let result = add.await.unwrap();
    assert!(matches!(
        result,
        Err(StoreError::Conflict { entity: "cart", .. })
    ));
}
