use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::Money;
use serde::Serialize;
use store::MarketplaceStore;

use crate::auth::AuthenticatedAccount;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BalanceResponse {
    pub balance: Money,
}

/// GET {ui_prefix}/balance: balance of the calling user or business.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketplaceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.balances.balance(account).await?;
    Ok(Json(BalanceResponse { balance }))
}
