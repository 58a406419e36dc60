use std::sync::Arc;

use axum::extract::FromRef;
use common::CommissionRate;
use domain::{BalanceService, CartService, SettlementEngine};
use store::MarketplaceStore;

use crate::auth::TokenVerifier;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketplaceStore> {
    pub store: S,
    pub carts: CartService<S>,
    pub balances: BalanceService<S>,
    pub settlement: SettlementEngine<S>,
    pub tokens: TokenVerifier,
}

impl<S: MarketplaceStore + Clone> AppState<S> {
    /// Builds every service over the same store.
    pub fn new(store: S, tokens: TokenVerifier, commission: CommissionRate) -> Self {
        Self {
            carts: CartService::new(store.clone()),
            balances: BalanceService::new(store.clone()),
            settlement: SettlementEngine::new(store.clone(), commission),
            store,
            tokens,
        }
    }
}

impl<S: MarketplaceStore> FromRef<Arc<AppState<S>>> for TokenVerifier {
    fn from_ref(state: &Arc<AppState<S>>) -> Self {
        state.tokens.clone()
    }
}
