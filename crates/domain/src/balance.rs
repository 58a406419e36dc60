use common::{Account, Money};
use store::{BalanceStore, LockMode, MarketplaceStore, Transaction};

use crate::error::DomainError;

/// Read access to account balances.
pub struct BalanceService<S: MarketplaceStore> {
    store: S,
}

impl<S: MarketplaceStore> BalanceService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current spendable balance of a user or a business.
    #[tracing::instrument(skip(self))]
    pub async fn balance(&self, account: Account) -> Result<Money, DomainError> {
        let mut tx = self.store.begin().await?;
        let balance = match account {
            Account::User(user_id) => tx.user_balance(user_id, LockMode::None).await?,
            Account::Business(business_id) => tx
                .business_finance(business_id, LockMode::None)
                .await?
                .map(|finance| finance.balance),
        };
        tx.commit().await?;

        balance.ok_or(DomainError::AccountNotFound { account })
    }
}
