use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BusinessId, CommissionRate, Money, OrderId, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    BusinessFinance, LockMode, NewOrder, OrderRecord, ProductRecord, ProductResolution, Result,
    StoreError, UnavailableReason,
    store::{BalanceStore, CartStore, InventoryStore, MarketplaceStore, OrderStore, Transaction},
};

#[derive(Debug, Clone, Default)]
struct MarketState {
    carts: HashMap<UserId, Vec<ProductId>>,
    user_balances: HashMap<UserId, Money>,
    finances: HashMap<BusinessId, BusinessFinance>,
    products: HashMap<ProductId, ProductRecord>,
    orders: BTreeMap<OrderId, OrderRecord>,
    last_order_id: i64,
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_inventory_write: AtomicBool,
    fail_on_business_credit: AtomicBool,
}

/// In-memory marketplace store for testing and local runs.
///
/// A transaction holds the store's lock for its whole life and works on a
/// private copy of the state, which replaces the shared state on commit.
/// Transactions are therefore fully serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketplaceStore {
    state: Arc<Mutex<MarketState>>,
    faults: Arc<Faults>,
}

impl InMemoryMarketplaceStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with an empty cart and the given balance.
    pub async fn add_user(&self, user_id: UserId, balance: Money) {
        let mut state = self.state.lock().await;
        state.carts.insert(user_id, Vec::new());
        state.user_balances.insert(user_id, balance);
    }

    /// Registers a business with an empty finance row.
    pub async fn add_business(&self, business_id: BusinessId) {
        self.state
            .lock()
            .await
            .finances
            .insert(business_id, BusinessFinance::default());
    }

    /// Inserts or replaces a catalog product.
    pub async fn add_product(&self, product: ProductRecord) {
        self.state
            .lock()
            .await
            .products
            .insert(product.product_id, product);
    }

    /// Replaces a user's cart contents.
    pub async fn set_cart(&self, user_id: UserId, items: Vec<ProductId>) {
        self.state.lock().await.carts.insert(user_id, items);
    }

    /// Returns the committed cart of a user.
    pub async fn cart(&self, user_id: UserId) -> Option<Vec<ProductId>> {
        self.state.lock().await.carts.get(&user_id).cloned()
    }

    /// Returns the committed balance of a user.
    pub async fn balance_of(&self, user_id: UserId) -> Option<Money> {
        self.state.lock().await.user_balances.get(&user_id).copied()
    }

    /// Returns the committed finance row of a business.
    pub async fn finance_of(&self, business_id: BusinessId) -> Option<BusinessFinance> {
        self.state.lock().await.finances.get(&business_id).copied()
    }

    /// Returns the committed inventory of a product.
    pub async fn quantity_of(&self, product_id: ProductId) -> Option<i64> {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|p| p.quantity)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Configures inventory decrements to fail.
    pub fn set_fail_on_inventory_write(&self, fail: bool) {
        self.faults
            .fail_on_inventory_write
            .store(fail, Ordering::SeqCst);
    }

    /// Configures business credits to fail.
    pub fn set_fail_on_business_credit(&self, fail: bool) {
        self.faults
            .fail_on_business_credit
            .store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryMarketplaceStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }
}

/// Transaction over [`InMemoryMarketplaceStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MarketState>,
    working: MarketState,
    faults: Arc<Faults>,
}

#[async_trait]
impl CartStore for InMemoryTransaction {
    async fn get_cart(
        &mut self,
        user_id: UserId,
        _lock: LockMode,
    ) -> Result<Option<Vec<ProductId>>> {
        Ok(self.working.carts.get(&user_id).cloned())
    }

    async fn add_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<()> {
        if let Some(cart) = self.working.carts.get_mut(&user_id) {
            cart.push(product_id);
        }
        Ok(())
    }

    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let Some(cart) = self.working.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        match cart.iter().position(|id| *id == product_id) {
            Some(index) => {
                cart.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<()> {
        if let Some(cart) = self.working.carts.get_mut(&user_id) {
            cart.clear();
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for InMemoryTransaction {
    async fn user_balance(&mut self, user_id: UserId, _lock: LockMode) -> Result<Option<Money>> {
        Ok(self.working.user_balances.get(&user_id).copied())
    }

    async fn business_finance(
        &mut self,
        business_id: BusinessId,
        _lock: LockMode,
    ) -> Result<Option<BusinessFinance>> {
        Ok(self.working.finances.get(&business_id).copied())
    }

    async fn lock_business_finances(&mut self, _business_ids: &[BusinessId]) -> Result<()> {
        Ok(())
    }

    async fn debit_user(&mut self, user_id: UserId, amount: Money) -> Result<()> {
        let balance = self
            .working
            .user_balances
            .get_mut(&user_id)
            .ok_or(StoreError::MissingRow {
                table: "users_balance",
                key: user_id.as_i64(),
            })?;
        *balance = balance
            .checked_sub(amount)
            .ok_or_else(|| StoreError::Backend(format!("balance of user {user_id} overflows")))?;
        Ok(())
    }

    async fn credit_business(
        &mut self,
        business_id: BusinessId,
        amount: Money,
        commission: CommissionRate,
    ) -> Result<()> {
        if self.faults.fail_on_business_credit.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!(
                "credit to business {business_id} rejected"
            )));
        }
        let share = commission.seller_share(amount);
        let finance = self.working.finances.entry(business_id).or_default();
        let overflow =
            || StoreError::Backend(format!("finances of business {business_id} overflow"));
        let revenue = finance.revenue.checked_add(amount).ok_or_else(overflow)?;
        let balance = finance.balance.checked_add(share).ok_or_else(overflow)?;
        let earnings = finance.earnings.checked_add(share).ok_or_else(overflow)?;
        finance.revenue = revenue;
        finance.balance = balance;
        finance.earnings = earnings;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryTransaction {
    async fn resolve_product(
        &mut self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<ProductResolution> {
        Ok(match self.working.products.get(&product_id) {
            Some(product) => product.resolve(now),
            None => ProductResolution::Unavailable(UnavailableReason::NotFound),
        })
    }

    async fn lock_inventory(&mut self, _product_ids: &[ProductId]) -> Result<()> {
        Ok(())
    }

    async fn decrement_quantity(&mut self, product_id: ProductId, units: u32) -> Result<()> {
        if self.faults.fail_on_inventory_write.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!(
                "inventory write for product {product_id} rejected"
            )));
        }
        let product =
            self.working
                .products
                .get_mut(&product_id)
                .ok_or(StoreError::MissingRow {
                    table: "product_quantity",
                    key: product_id.as_i64(),
                })?;
        product.quantity -= i64::from(units);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderId> {
        self.working.last_order_id += 1;
        let order_id = OrderId::new(self.working.last_order_id);
        self.working.orders.insert(
            order_id,
            OrderRecord {
                order_id,
                creator_id: order.creator_id,
                is_canceled: false,
                is_deleted: false,
                placed_at: order.placed_at,
                ended_at: None,
                price: order.price,
                discounted_price: order.price,
                cart: order.cart,
            },
        );
        Ok(order_id)
    }

    async fn get_order(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
