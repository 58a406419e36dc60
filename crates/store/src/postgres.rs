use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BusinessId, CommissionRate, Money, OrderId, ProductId, UserId};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};

use crate::{
    BusinessFinance, LockMode, NewOrder, OrderRecord, ProductRecord, ProductResolution, Result,
    StoreError, UnavailableReason,
    store::{BalanceStore, CartStore, InventoryStore, MarketplaceStore, OrderStore, Transaction},
};

/// PostgreSQL-backed marketplace store.
///
/// Transactions run at `READ COMMITTED`; reads that feed a decision take
/// `FOR UPDATE` row locks so concurrent settlements queue on the same rows
/// instead of acting on stale values.
#[derive(Clone)]
pub struct PostgresMarketplaceStore {
    pool: PgPool,
}

impl PostgresMarketplaceStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl MarketplaceStore for PostgresMarketplaceStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// Transaction over [`PostgresMarketplaceStore`].
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn sorted_ids(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn row_to_product(row: PgRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        product_id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category_id: row.try_get("category_id")?,
        price: Money::new(row.try_get("price")?),
        creator_id: BusinessId::new(row.try_get("creator_id")?),
        is_deleted: row.try_get("is_deleted")?,
        quantity: row.try_get::<Option<i64>, _>("quantity")?.unwrap_or(0),
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
    })
}

fn row_to_order(row: PgRow) -> Result<OrderRecord> {
    let cart: Vec<i64> = row.try_get("shopping_cart")?;
    Ok(OrderRecord {
        order_id: OrderId::new(row.try_get("id")?),
        creator_id: UserId::new(row.try_get("creator_id")?),
        is_canceled: row.try_get("is_canceled")?,
        is_deleted: row.try_get("is_deleted")?,
        placed_at: row.try_get("start_date")?,
        ended_at: row.try_get("end_date")?,
        price: Money::new(row.try_get("price")?),
        discounted_price: Money::new(row.try_get("discounted_price")?),
        cart: cart.into_iter().map(ProductId::new).collect(),
    })
}

#[async_trait]
impl CartStore for PostgresTransaction {
    async fn get_cart(
        &mut self,
        user_id: UserId,
        lock: LockMode,
    ) -> Result<Option<Vec<ProductId>>> {
        let sql = format!(
            "SELECT shopping_cart FROM users_cart WHERE user_id = $1{}",
            lock.sql_suffix()
        );
        let cart: Option<Vec<i64>> = sqlx::query_scalar(&sql)
            .bind(user_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(cart.map(|ids| ids.into_iter().map(ProductId::new).collect()))
    }

    async fn add_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users_cart SET shopping_cart = array_append(shopping_cart, $2) WHERE user_id = $1",
        )
        .bind(user_id.as_i64())
        .bind(product_id.as_i64())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(%user_id, %product_id, "add to cart ignored: no cart row");
        }
        Ok(())
    }

    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let Some(mut cart) = self.get_cart(user_id, LockMode::ForUpdate).await? else {
            return Ok(false);
        };
        let Some(index) = cart.iter().position(|id| *id == product_id) else {
            return Ok(false);
        };
        cart.remove(index);

        let ids: Vec<i64> = cart.into_iter().map(|id| id.as_i64()).collect();
        sqlx::query("UPDATE users_cart SET shopping_cart = $2 WHERE user_id = $1")
            .bind(user_id.as_i64())
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(true)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<()> {
        sqlx::query("UPDATE users_cart SET shopping_cart = '{}' WHERE user_id = $1")
            .bind(user_id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for PostgresTransaction {
    async fn user_balance(&mut self, user_id: UserId, lock: LockMode) -> Result<Option<Money>> {
        let sql = format!(
            "SELECT balance FROM users_balance WHERE user_id = $1{}",
            lock.sql_suffix()
        );
        let balance: Option<i64> = sqlx::query_scalar(&sql)
            .bind(user_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(balance.map(Money::new))
    }

    async fn business_finance(
        &mut self,
        business_id: BusinessId,
        lock: LockMode,
    ) -> Result<Option<BusinessFinance>> {
        let sql = format!(
            "SELECT balance, revenue, earnings FROM business_finances WHERE business_id = $1{}",
            lock.sql_suffix()
        );
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(business_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(BusinessFinance {
                balance: Money::new(row.try_get("balance")?),
                revenue: Money::new(row.try_get("revenue")?),
                earnings: Money::new(row.try_get("earnings")?),
            })),
            None => Ok(None),
        }
    }

    async fn lock_business_finances(&mut self, business_ids: &[BusinessId]) -> Result<()> {
        let ids = sorted_ids(business_ids.iter().map(|id| id.as_i64()));
        sqlx::query(
            "SELECT business_id FROM business_finances WHERE business_id = ANY($1) ORDER BY business_id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn debit_user(&mut self, user_id: UserId, amount: Money) -> Result<()> {
        let result = sqlx::query("UPDATE users_balance SET balance = balance - $2 WHERE user_id = $1")
            .bind(user_id.as_i64())
            .bind(amount.units())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: "users_balance",
                key: user_id.as_i64(),
            });
        }
        Ok(())
    }

    async fn credit_business(
        &mut self,
        business_id: BusinessId,
        amount: Money,
        commission: CommissionRate,
    ) -> Result<()> {
        let share = commission.seller_share(amount);
        sqlx::query(
            r#"
            INSERT INTO business_finances (business_id, balance, revenue, earnings)
            VALUES ($1, $3, $2, $3)
            ON CONFLICT (business_id) DO UPDATE SET
                balance = business_finances.balance + EXCLUDED.balance,
                revenue = business_finances.revenue + EXCLUDED.revenue,
                earnings = business_finances.earnings + EXCLUDED.earnings
            "#,
        )
        .bind(business_id.as_i64())
        .bind(amount.units())
        .bind(share.units())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresTransaction {
    async fn resolve_product(
        &mut self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<ProductResolution> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT p.id, p.name, p.price, p.creator_id, p.category_id, p.is_deleted,
                   d.description, q.quantity, dt.start_date, dt.end_date
            FROM products p
            LEFT JOIN product_data d ON d.product_id = p.id
            LEFT JOIN product_quantity q ON q.product_id = p.id
            LEFT JOIN product_date dt ON dt.product_id = p.id
            WHERE p.id = $1
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(row_to_product(row)?.resolve(now)),
            None => Ok(ProductResolution::Unavailable(UnavailableReason::NotFound)),
        }
    }

    async fn lock_inventory(&mut self, product_ids: &[ProductId]) -> Result<()> {
        let ids = sorted_ids(product_ids.iter().map(|id| id.as_i64()));
        sqlx::query(
            "SELECT product_id FROM product_quantity WHERE product_id = ANY($1) ORDER BY product_id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn decrement_quantity(&mut self, product_id: ProductId, units: u32) -> Result<()> {
        let result =
            sqlx::query("UPDATE product_quantity SET quantity = quantity - $2 WHERE product_id = $1")
                .bind(product_id.as_i64())
                .bind(i64::from(units))
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: "product_quantity",
                key: product_id.as_i64(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId> {
        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (creator_id, is_canceled, is_deleted) VALUES ($1, FALSE, FALSE) RETURNING id",
        )
        .bind(order.creator_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        sqlx::query("INSERT INTO order_date (order_id, start_date) VALUES ($1, $2)")
            .bind(order_id)
            .bind(order.placed_at)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query("INSERT INTO order_price (order_id, price, discounted_price) VALUES ($1, $2, $2)")
            .bind(order_id)
            .bind(order.price.units())
            .execute(&mut *self.tx)
            .await?;

        let cart: Vec<i64> = order.cart.iter().map(|id| id.as_i64()).collect();
        sqlx::query("INSERT INTO order_cart (order_id, shopping_cart) VALUES ($1, $2)")
            .bind(order_id)
            .bind(cart)
            .execute(&mut *self.tx)
            .await?;

        Ok(OrderId::new(order_id))
    }

    async fn get_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT o.id, o.creator_id, o.is_canceled, o.is_deleted,
                   dt.start_date, dt.end_date, pr.price, pr.discounted_price, c.shopping_cart
            FROM orders o
            JOIN order_date dt ON dt.order_id = o.id
            JOIN order_price pr ON pr.order_id = o.id
            JOIN order_cart c ON c.order_id = o.id
            WHERE o.id = $1
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_ids_are_sorted_and_unique() {
        assert_eq!(sorted_ids([5, 1, 3, 1, 5].into_iter()), vec![1, 3, 5]);
        assert!(sorted_ids(std::iter::empty()).is_empty());
    }
}
