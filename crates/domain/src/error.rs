//! Domain error types.

use common::{Account, Money, ProductId, UserId};
use store::StoreError;
use thiserror::Error;

/// Reasons a cart cannot be turned into an order.
///
/// Every variant except [`SettlementError::Store`] is produced before any
/// write, so the transaction is rolled back with nothing to undo.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The user has no cart or balance row.
    #[error("Account not found: {user_id}")]
    AccountNotFound { user_id: UserId },

    /// The cart holds no product ids.
    #[error("Shopping cart is empty")]
    EmptyCart,

    /// The cart total exceeds the balance, or nothing in the cart is sellable.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// A line subtotal is negative, or a subtotal or the order total does
    /// not fit in a money amount.
    #[error("Order total is out of range")]
    AmountOutOfRange,

    /// More units were requested than remain in inventory.
    #[error("Insufficient stock for product {product_id}: short by {shortfall}")]
    InsufficientStock { product_id: ProductId, shortfall: i64 },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SettlementError {
    /// Short label used for failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            SettlementError::AccountNotFound { .. } => "account_not_found",
            SettlementError::EmptyCart => "empty_cart",
            SettlementError::InsufficientFunds { .. } => "insufficient_funds",
            SettlementError::AmountOutOfRange => "amount_out_of_range",
            SettlementError::InsufficientStock { .. } => "insufficient_stock",
            SettlementError::Store(_) => "store",
        }
    }
}

/// Errors from cart and balance operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The account has no row in the table being read.
    #[error("Account not found: {account}")]
    AccountNotFound { account: Account },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
