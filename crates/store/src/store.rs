use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BusinessId, CommissionRate, Money, OrderId, ProductId, UserId};

use crate::{BusinessFinance, LockMode, NewOrder, OrderRecord, ProductResolution, Result};

/// Per-user shopping carts.
///
/// A cart is a multiset of product ids: order is irrelevant, repetition is
/// quantity.
#[async_trait]
pub trait CartStore: Send {
    /// Reads the cart multiset.
    ///
    /// Returns None if the account has no cart row.
    async fn get_cart(&mut self, user_id: UserId, lock: LockMode)
    -> Result<Option<Vec<ProductId>>>;

    /// Appends one unit of a product.
    ///
    /// The product is not checked against the catalog. A missing cart row
    /// makes this a no-op.
    async fn add_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<()>;

    /// Removes exactly one unit of a product.
    ///
    /// Returns false if the cart is absent or does not contain the product.
    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    /// Empties the cart. Clearing an empty cart is a no-op.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<()>;
}

/// User balances and business finances.
#[async_trait]
pub trait BalanceStore: Send {
    /// Returns None if the user has no balance row.
    async fn user_balance(&mut self, user_id: UserId, lock: LockMode) -> Result<Option<Money>>;

    /// Returns None if the business has no finance row.
    async fn business_finance(
        &mut self,
        business_id: BusinessId,
        lock: LockMode,
    ) -> Result<Option<BusinessFinance>>;

    /// Locks the finance rows of the given businesses in ascending id order.
    async fn lock_business_finances(&mut self, business_ids: &[BusinessId]) -> Result<()>;

    /// Subtracts `amount` from the user's balance.
    ///
    /// No floor is enforced here; callers validate sufficiency first.
    async fn debit_user(&mut self, user_id: UserId, amount: Money) -> Result<()>;

    /// Credits a sale to a business.
    ///
    /// `revenue` grows by `amount`; `balance` and `earnings` grow by the
    /// seller share left after `commission`.
    async fn credit_business(
        &mut self,
        business_id: BusinessId,
        amount: Money,
        commission: CommissionRate,
    ) -> Result<()>;
}

/// Catalog reads and inventory writes.
#[async_trait]
pub trait InventoryStore: Send {
    /// Resolves a product to a sellable snapshot, or reports why it cannot
    /// be sold at `now`.
    async fn resolve_product(
        &mut self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<ProductResolution>;

    /// Locks the inventory rows of the given products in ascending id order.
    async fn lock_inventory(&mut self, product_ids: &[ProductId]) -> Result<()>;

    /// Subtracts `units` from the product's quantity.
    ///
    /// No floor is enforced here; callers validate sufficiency first.
    async fn decrement_quantity(&mut self, product_id: ProductId, units: u32) -> Result<()>;
}

/// Order records.
#[async_trait]
pub trait OrderStore: Send {
    /// Writes the order row and its date, price and cart sub-records.
    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId>;

    /// Loads an order with its sub-records.
    async fn get_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>>;
}

/// A unit of work spanning every marketplace table.
///
/// Nothing written through a transaction is visible to others until
/// `commit`. Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait Transaction: CartStore + BalanceStore + InventoryStore + OrderStore + Send {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Entry point to a marketplace store backend.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// Starts a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}
