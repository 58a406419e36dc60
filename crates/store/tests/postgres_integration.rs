//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    BalanceStore, BusinessId, CartStore, CommissionRate, InventoryStore, LockMode,
    MarketplaceStore, Money, NewOrder, OrderStore, PostgresMarketplaceStore, ProductId,
    ProductResolution, StoreError, Transaction, UnavailableReason, UserId,
};
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

            let store = PostgresMarketplaceStore::connect(&connection_string, 1)
                .await
                .unwrap();
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

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresMarketplaceStore {
    let info = get_container_info().await;

    let store = PostgresMarketplaceStore::connect(&info.connection_string, 5)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE users_cart, users_balance, business_finances, products, product_data, \
         product_quantity, product_date, orders, order_date, order_price, order_cart RESTART IDENTITY",
    )
    .execute(store.pool())
    .await
    .unwrap();

    store
}

async fn seed_user(pool: &PgPool, user_id: i64, balance: i64, cart: &[i64]) {
    sqlx::query("INSERT INTO users_cart (user_id, shopping_cart) VALUES ($1, $2)")
        .bind(user_id)
        .bind(cart.to_vec())
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO users_balance (user_id, balance) VALUES ($1, $2)")
        .bind(user_id)
        .bind(balance)
        .execute(pool)
        .await
        .unwrap();
}

async fn seed_product(pool: &PgPool, creator_id: i64, price: i64, quantity: i64) -> i64 {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO products (price, name, creator_id, is_deleted) VALUES ($1, 'Widget', $2, FALSE) RETURNING id",
    )
    .bind(price)
    .bind(creator_id)
    .fetch_one(pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO product_data (product_id, description) VALUES ($1, 'A widget')")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO product_quantity (product_id, quantity) VALUES ($1, $2)")
        .bind(id)
        .bind(quantity)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO product_date (product_id, start_date) VALUES ($1, $2)")
        .bind(id)
        .bind(Utc::now() - ChronoDuration::days(1))
        .execute(pool)
        .await
        .unwrap();
    id
}

#[tokio::test]
#[serial]
async fn cart_add_remove_and_clear() {
    let store = get_test_store().await;
    seed_user(store.pool(), 1, 0, &[]).await;
    let user = UserId::new(1);

    let mut tx = store.begin().await.unwrap();
    tx.add_cart_item(user, ProductId::new(5)).await.unwrap();
    tx.add_cart_item(user, ProductId::new(5)).await.unwrap();
    tx.add_cart_item(user, ProductId::new(8)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.remove_cart_item(user, ProductId::new(5)).await.unwrap());
    assert!(!tx.remove_cart_item(user, ProductId::new(9)).await.unwrap());
    let cart = tx.get_cart(user, LockMode::None).await.unwrap().unwrap();
    assert_eq!(cart, vec![ProductId::new(5), ProductId::new(8)]);
    tx.clear_cart(user).await.unwrap();
    tx.clear_cart(user).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let cart = tx.get_cart(user, LockMode::None).await.unwrap();
    assert_eq!(cart, Some(vec![]));
}

#[tokio::test]
#[serial]
async fn missing_cart_row_is_not_an_error() {
    let store = get_test_store().await;
    let stranger = UserId::new(77);

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.get_cart(stranger, LockMode::ForUpdate).await.unwrap(), None);
    tx.add_cart_item(stranger, ProductId::new(1)).await.unwrap();
    assert!(!tx.remove_cart_item(stranger, ProductId::new(1)).await.unwrap());
    tx.commit().await.unwrap();
}

#[tokio::test]
#[serial]
async fn resolve_product_applies_availability_rules() {
    let store = get_test_store().await;
    let pool = store.pool();
    let live = seed_product(pool, 10, 250, 3).await;
    let deleted = seed_product(pool, 10, 100, 3).await;
    let expired = seed_product(pool, 10, 100, 3).await;
    let empty = seed_product(pool, 10, 100, 0).await;

    sqlx::query("UPDATE products SET is_deleted = TRUE WHERE id = $1")
        .bind(deleted)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("UPDATE product_date SET end_date = $2 WHERE product_id = $1")
        .bind(expired)
        .bind(Utc::now() - ChronoDuration::hours(1))
        .execute(pool)
        .await
        .unwrap();

    let now = Utc::now();
    let mut tx = store.begin().await.unwrap();

    let snapshot = tx
        .resolve_product(ProductId::new(live), now)
        .await
        .unwrap()
        .available()
        .unwrap();
    assert_eq!(snapshot.price, Money::new(250));
    assert_eq!(snapshot.creator_id, BusinessId::new(10));
    assert_eq!(snapshot.quantity, 3);
    assert_eq!(snapshot.description.as_deref(), Some("A widget"));

    let cases = [
        (deleted, UnavailableReason::Deleted),
        (expired, UnavailableReason::Expired),
        (empty, UnavailableReason::OutOfStock),
        (9999, UnavailableReason::NotFound),
    ];
    for (id, reason) in cases {
        assert_eq!(
            tx.resolve_product(ProductId::new(id), now).await.unwrap(),
            ProductResolution::Unavailable(reason),
            "product {id}"
        );
    }
}

#[tokio::test]
#[serial]
async fn balances_debit_and_credit() {
    let store = get_test_store().await;
    seed_user(store.pool(), 1, 500, &[]).await;
    let user = UserId::new(1);
    let shop = BusinessId::new(10);

    let mut tx = store.begin().await.unwrap();
    tx.debit_user(user, Money::new(120)).await.unwrap();
    tx.credit_business(shop, Money::new(100), CommissionRate::STANDARD)
        .await
        .unwrap();
    tx.credit_business(shop, Money::new(50), CommissionRate::STANDARD)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.user_balance(user, LockMode::None).await.unwrap(),
        Some(Money::new(380))
    );
    let finance = tx
        .business_finance(shop, LockMode::None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(finance.revenue, Money::new(150));
    assert_eq!(finance.balance, Money::new(147));
    assert_eq!(finance.earnings, Money::new(147));

    let missing = tx.debit_user(UserId::new(404), Money::new(1)).await;
    assert!(matches!(missing, Err(StoreError::MissingRow { .. })));
}

#[tokio::test]
#[serial]
async fn orders_are_written_with_sub_records() {
    let store = get_test_store().await;
    let placed_at = Utc::now();

    let mut tx = store.begin().await.unwrap();
    let order_id = tx
        .insert_order(NewOrder {
            creator_id: UserId::new(3),
            cart: vec![ProductId::new(1), ProductId::new(1), ProductId::new(2)],
            price: Money::new(90),
            placed_at,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let order = tx.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.creator_id, UserId::new(3));
    assert_eq!(order.price, Money::new(90));
    assert_eq!(order.discounted_price, Money::new(90));
    assert_eq!(order.cart.len(), 3);
    assert!(!order.is_canceled);
    assert!(!order.is_deleted);
    assert!(order.ended_at.is_none());
    assert!((order.placed_at - placed_at).num_milliseconds().abs() < 1);
}

#[tokio::test]
#[serial]
async fn dropped_transaction_rolls_back() {
    let store = get_test_store().await;
    let product = seed_product(store.pool(), 10, 10, 5).await;
    seed_user(store.pool(), 1, 100, &[product]).await;

    {
        let mut tx = store.begin().await.unwrap();
        tx.debit_user(UserId::new(1), Money::new(10)).await.unwrap();
        tx.decrement_quantity(ProductId::new(product), 1)
            .await
            .unwrap();
        tx.clear_cart(UserId::new(1)).await.unwrap();
    }

    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.user_balance(UserId::new(1), LockMode::None).await.unwrap(),
        Some(Money::new(100))
    );
    assert_eq!(
        tx.get_cart(UserId::new(1), LockMode::None).await.unwrap(),
        Some(vec![ProductId::new(product)])
    );
    let snapshot = tx
        .resolve_product(ProductId::new(product), Utc::now())
        .await
        .unwrap()
        .available()
        .unwrap();
    assert_eq!(snapshot.quantity, 5);
}

#[tokio::test]
#[serial]
async fn inventory_lock_blocks_second_transaction() {
    let store = get_test_store().await;
    let product = ProductId::new(seed_product(store.pool(), 10, 10, 5).await);

    let mut first = store.begin().await.unwrap();
    first.lock_inventory(&[product]).await.unwrap();

    let contender = store.clone();
    let waiter = tokio::spawn(async move {
        let mut second = contender.begin().await.unwrap();
        second.lock_inventory(&[product]).await.unwrap();
        let quantity = second
            .resolve_product(product, Utc::now())
            .await
            .unwrap()
            .available()
            .unwrap()
            .quantity;
        second.commit().await.unwrap();
        quantity
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished(), "second locker should be waiting");

    first.decrement_quantity(product, 2).await.unwrap();
    first.commit().await.unwrap();

    let seen = waiter.await.unwrap();
    assert_eq!(seen, 3);
}
