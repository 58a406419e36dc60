//! Cart-to-order settlement.
//!
//! [`SettlementEngine::begin_order`] turns a user's cart into an order in a
//! single store transaction. Rows are locked in a fixed order so that
//! concurrent settlements queue instead of deadlocking:
//!
//! 1. the user's cart row
//! 2. inventory rows, ascending product id
//! 3. the user's balance row
//! 4. business finance rows, ascending business id
//!
//! All validation happens before the first write. Any error rolls the whole
//! transaction back.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use common::{BusinessId, CommissionRate, Money, OrderId, ProductId, UserId};
use serde::Serialize;
use store::{
    BalanceStore, CartStore, InventoryStore, LockMode, MarketplaceStore, NewOrder, OrderRecord,
    OrderStore, Transaction,
};

use crate::cart::{CartLineItem, group_cart, resolve_lines};
use crate::error::{DomainError, SettlementError};

/// Result of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    /// Amount debited from the user.
    pub total: Money,
    /// Cart products that could not be sold and were left out of the order.
    pub dropped_product_ids: Vec<ProductId>,
}

/// Amount owed to one business for a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCredit {
    /// Full price of the business's products; added to revenue.
    pub gross: Money,
    /// Share left after commission; added to balance and earnings.
    pub net: Money,
}

/// Writes a validated settlement will perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub total: Money,
    /// Units to take from inventory, in cart order.
    pub decrements: Vec<(ProductId, u32)>,
    pub credits: BTreeMap<BusinessId, BusinessCredit>,
}

impl SettlementPlan {
    /// Total commission kept by the platform.
    pub fn commission_total(&self) -> Money {
        self.total - self.credits.values().map(|credit| credit.net).sum::<Money>()
    }
}

/// Validates line items against the buyer's balance and inventory.
///
/// Funds are checked before stock: a cart that is both too expensive and
/// short on stock fails with [`SettlementError::InsufficientFunds`]. An empty
/// or zero-priced order counts as insufficient funds. Stock failures report
/// the first short line in cart order. Negative subtotals and totals beyond
/// the range of [`Money`] fail with [`SettlementError::AmountOutOfRange`]
/// before anything else.
pub fn plan_settlement(
    lines: &[CartLineItem],
    balance: Money,
    commission: CommissionRate,
) -> Result<SettlementPlan, SettlementError> {
    let subtotals = lines
        .iter()
        .map(|line| line.subtotal().filter(|subtotal| !subtotal.is_negative()))
        .collect::<Option<Vec<Money>>>()
        .ok_or(SettlementError::AmountOutOfRange)?;
    let total = subtotals
        .iter()
        .try_fold(Money::zero(), |acc, subtotal| acc.checked_add(*subtotal))
        .ok_or(SettlementError::AmountOutOfRange)?;

    // Funds win when both checks would fail
    if total.is_zero() || total > balance {
        return Err(SettlementError::InsufficientFunds {
            required: total,
            available: balance,
        });
    }

    if let Some(line) = lines.iter().find(|line| line.shortfall() > 0) {
        return Err(SettlementError::InsufficientStock {
            product_id: line.product.product_id,
            shortfall: line.shortfall(),
        });
    }

    // Each business's gross is a partial sum of `total`, so it cannot overflow
    let mut gross: BTreeMap<BusinessId, Money> = BTreeMap::new();
    for (line, subtotal) in lines.iter().zip(subtotals) {
        *gross.entry(line.product.creator_id).or_default() += subtotal;
    }

    Ok(SettlementPlan {
        total,
        decrements: lines
            .iter()
            .map(|line| (line.product.product_id, line.quantity))
            .collect(),
        credits: gross
            .into_iter()
            .map(|(business_id, gross)| {
                let net = commission.seller_share(gross);
                (business_id, BusinessCredit { gross, net })
            })
            .collect(),
    })
}

/// Places orders from user carts.
pub struct SettlementEngine<S: MarketplaceStore> {
    store: S,
    commission: CommissionRate,
}

impl<S: MarketplaceStore> SettlementEngine<S> {
    pub fn new(store: S, commission: CommissionRate) -> Self {
        Self { store, commission }
    }

    /// Converts the user's cart into an order.
    ///
    /// On success the cart is empty, the user is debited by the order total,
    /// inventory is reduced by every settled unit and each selling business
    /// is credited. On failure nothing changes.
    #[tracing::instrument(skip(self))]
    pub async fn begin_order(&self, user_id: UserId) -> Result<OrderReceipt, SettlementError> {
        metrics::counter!("order_settlements_total").increment(1);
        let started = Instant::now();

        let mut tx = self.store.begin().await?;
        let outcome = match self.settle(tx.as_mut(), user_id).await {
            Ok(receipt) => match tx.commit().await {
                Ok(()) => Ok(receipt),
                Err(e) => Err(SettlementError::from(e)),
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "settlement rollback failed");
                }
                Err(e)
            }
        };

        metrics::histogram!("order_settlement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &outcome {
            Ok(receipt) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %receipt.order_id,
                    total = %receipt.total,
                    "order placed"
                );
            }
            Err(SettlementError::Store(e)) => {
                metrics::counter!("order_settlement_failures_total", "reason" => "store")
                    .increment(1);
                tracing::error!(error = %e, "settlement aborted");
            }
            Err(e) => {
                metrics::counter!("order_settlement_failures_total", "reason" => e.reason())
                    .increment(1);
                tracing::info!(reason = e.reason(), "settlement rejected");
            }
        }

        outcome
    }

    async fn settle(
        &self,
        tx: &mut dyn Transaction,
        user_id: UserId,
    ) -> Result<OrderReceipt, SettlementError> {
        let cart = tx
            .get_cart(user_id, LockMode::ForUpdate)
            .await?
            .ok_or(SettlementError::AccountNotFound { user_id })?;
        if cart.is_empty() {
            return Err(SettlementError::EmptyCart);
        }

        let grouped = group_cart(&cart);
        let product_ids: Vec<ProductId> = grouped.keys().copied().collect();
        tx.lock_inventory(&product_ids).await?;

        let resolved = resolve_lines(&mut *tx, &grouped, Utc::now()).await?;
        if !resolved.dropped.is_empty() {
            tracing::warn!(
                dropped = ?resolved.dropped,
                "unavailable products left out of order"
            );
        }

        let balance = tx
            .user_balance(user_id, LockMode::ForUpdate)
            .await?
            .ok_or(SettlementError::AccountNotFound { user_id })?;

        let plan = plan_settlement(&resolved.lines, balance, self.commission)?;

        let businesses: Vec<BusinessId> = plan.credits.keys().copied().collect();
        tx.lock_business_finances(&businesses).await?;

        let order_id = tx
            .insert_order(NewOrder {
                creator_id: user_id,
                cart,
                price: plan.total,
                placed_at: Utc::now(),
            })
            .await?;

        tx.clear_cart(user_id).await?;
        tx.debit_user(user_id, plan.total).await?;
        for &(product_id, units) in &plan.decrements {
            tx.decrement_quantity(product_id, units).await?;
        }
        for (&business_id, credit) in &plan.credits {
            tx.credit_business(business_id, credit.gross, self.commission)
                .await?;
        }

        Ok(OrderReceipt {
            order_id,
            total: plan.total,
            dropped_product_ids: resolved.dropped,
        })
    }

    /// Loads an order placed by `user_id`.
    ///
    /// Orders belonging to other users are reported as missing.
    #[tracing::instrument(skip(self))]
    pub async fn find_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<OrderRecord>, DomainError> {
        let mut tx = self.store.begin().await?;
        let order = tx.get_order(order_id).await?;
        tx.commit().await?;

        Ok(order.filter(|order| order.creator_id == user_id))
    }
}
