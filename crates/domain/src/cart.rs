//! Shopping cart reads and mutations.

use chrono::{DateTime, Utc};
use common::{Account, Money, ProductId, UserId};
use indexmap::IndexMap;
use store::{
    CartStore, InventoryStore, LockMode, MarketplaceStore, ProductResolution, ProductSnapshot,
    StoreError, Transaction,
};

use crate::error::DomainError;

/// A product from the cart together with how many units were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineItem {
    pub product: ProductSnapshot,
    pub quantity: u32,
}

impl CartLineItem {
    /// Price of all requested units, or `None` if it overflows.
    pub fn subtotal(&self) -> Option<Money> {
        self.product.price.checked_mul(self.quantity)
    }

    /// Units requested beyond what inventory holds. Zero or negative means
    /// the line can be filled.
    pub fn shortfall(&self) -> i64 {
        i64::from(self.quantity) - self.product.quantity
    }
}

/// Groups a cart multiset into per-product quantities.
///
/// Products keep the position of their first appearance in the cart.
pub fn group_cart(items: &[ProductId]) -> IndexMap<ProductId, u32> {
    let mut grouped = IndexMap::new();
    for product_id in items {
        *grouped.entry(*product_id).or_insert(0) += 1;
    }
    grouped
}

/// Line items that could be resolved, and the products that were dropped.
#[derive(Debug, Default)]
pub(crate) struct ResolvedCart {
    pub lines: Vec<CartLineItem>,
    pub dropped: Vec<ProductId>,
}

/// Resolves every grouped product through the catalog.
pub(crate) async fn resolve_lines(
    tx: &mut dyn Transaction,
    grouped: &IndexMap<ProductId, u32>,
    now: DateTime<Utc>,
) -> Result<ResolvedCart, StoreError> {
    let mut resolved = ResolvedCart::default();
    for (&product_id, &quantity) in grouped {
        match tx.resolve_product(product_id, now).await? {
            ProductResolution::Available(product) => {
                resolved.lines.push(CartLineItem { product, quantity });
            }
            ProductResolution::Unavailable(reason) => {
                tracing::debug!(%product_id, %reason, "cart item unavailable");
                resolved.dropped.push(product_id);
            }
        }
    }
    Ok(resolved)
}

/// Cart operations for user accounts.
pub struct CartService<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the cart as resolved line items.
    ///
    /// Products that can no longer be sold are left out.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLineItem>, DomainError> {
        let mut tx = self.store.begin().await?;
        let items = tx
            .get_cart(user_id, LockMode::None)
            .await?
            .ok_or(DomainError::AccountNotFound {
                account: Account::User(user_id),
            })?;

        let resolved = resolve_lines(tx.as_mut(), &group_cart(&items), Utc::now()).await?;
        tx.commit().await?;
        Ok(resolved.lines)
    }

    /// Adds one unit of a product.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, user_id: UserId, product_id: ProductId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        tx.add_cart_item(user_id, product_id).await?;
        tx.commit().await?;

        metrics::counter!("cart_mutations_total", "op" => "add").increment(1);
        Ok(())
    }

    /// Removes one unit of a product. Returns false if the cart did not
    /// contain it.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, DomainError> {
        let mut tx = self.store.begin().await?;
        let removed = tx.remove_cart_item(user_id, product_id).await?;
        tx.commit().await?;

        if removed {
            metrics::counter!("cart_mutations_total", "op" => "remove").increment(1);
        }
        Ok(removed)
    }

    /// Empties the cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        tx.clear_cart(user_id).await?;
        tx.commit().await?;

        metrics::counter!("cart_mutations_total", "op" => "clear").increment(1);
        Ok(())
    }
}
