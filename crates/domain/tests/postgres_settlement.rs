//! Settlement against PostgreSQL.
//!
//! Run with:
//!
//! ```bash
//! cargo test -p domain --test postgres_settlement
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{BusinessId, CommissionRate, Money, ProductId, UserId};
use domain::{SettlementEngine, SettlementError};
use serial_test::serial;
use sqlx::PgPool;
use store::PostgresMarketplaceStore;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

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

async fn get_test_store() -> PostgresMarketplaceStore {
    let info = get_container_info().await;
    let store = PostgresMarketplaceStore::connect(&info.connection_string, 16)
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
        "INSERT INTO products (price, name, creator_id) VALUES ($1, 'Lamp', $2) RETURNING id",
    )
    .bind(price)
    .bind(creator_id)
    .fetch_one(pool)
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
        .bind(Utc::now() - Duration::days(1))
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn balance(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar("SELECT balance FROM users_balance WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn quantity(pool: &PgPool, product_id: i64) -> i64 {
    sqlx::query_scalar("SELECT quantity FROM product_quantity WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn cart(pool: &PgPool, user_id: i64) -> Vec<i64> {
    sqlx::query_scalar("SELECT shopping_cart FROM users_cart WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn settles_cart_into_order() {
    let store = get_test_store().await;
    let pool = store.pool().clone();
    let lamp = seed_product(&pool, 10, 100, 1).await;
    let shade = seed_product(&pool, 20, 30, 4).await;
    seed_user(&pool, 1, 160, &[lamp, shade, shade]).await;

    let engine = SettlementEngine::new(store, CommissionRate::STANDARD);
    let receipt = engine.begin_order(UserId::new(1)).await.unwrap();

    assert_eq!(receipt.total, Money::new(160));
    assert_eq!(balance(&pool, 1).await, 0);
    assert_eq!(quantity(&pool, lamp).await, 0);
    assert_eq!(quantity(&pool, shade).await, 2);
    assert!(cart(&pool, 1).await.is_empty());

    let (revenue, earnings): (i64, i64) =
        sqlx::query_as("SELECT revenue, earnings FROM business_finances WHERE business_id = $1")
            .bind(20_i64)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(revenue, 60);
    assert_eq!(earnings, 58);

    let order = engine
        .find_order(UserId::new(1), receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        order.cart,
        vec![
            ProductId::new(lamp),
            ProductId::new(shade),
            ProductId::new(shade)
        ]
    );
}

#[tokio::test]
#[serial]
async fn rejected_settlement_leaves_rows_untouched() {
    let store = get_test_store().await;
    let pool = store.pool().clone();
    let lamp = seed_product(&pool, 10, 10, 2).await;
    seed_user(&pool, 1, 1_000, &[lamp, lamp, lamp]).await;

    let err = SettlementEngine::new(store, CommissionRate::STANDARD)
        .begin_order(UserId::new(1))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SettlementError::InsufficientStock { shortfall: 1, .. }
    ));
    assert_eq!(balance(&pool, 1).await, 1_000);
    assert_eq!(quantity(&pool, lamp).await, 2);
    assert_eq!(cart(&pool, 1).await.len(), 3);

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orders, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_buyers_never_oversell() {
    let store = get_test_store().await;
    let pool = store.pool().clone();
    let lamp = seed_product(&pool, 10, 10, 3).await;
    for user in 1..=8 {
        seed_user(&pool, user, 100, &[lamp]).await;
    }

    let engine = Arc::new(SettlementEngine::new(store, CommissionRate::STANDARD));
    let mut handles = Vec::new();
    for user in 1..=8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.begin_order(UserId::new(user)).await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(SettlementError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(quantity(&pool, lamp).await, 0);
    let revenue: i64 =
        sqlx::query_scalar("SELECT revenue FROM business_finances WHERE business_id = $1")
            .bind(BusinessId::new(10).as_i64())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(revenue, 30);
}
