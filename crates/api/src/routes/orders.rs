//! Order placement and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use domain::OrderReceipt;
use serde::Serialize;
use store::{MarketplaceStore, OrderRecord};

use crate::auth::UserAccount;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub creator_id: UserId,
    pub is_canceled: bool,
    pub is_deleted: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub price: Money,
    pub discounted_price: Money,
    pub shopping_cart: Vec<ProductId>,
}

impl From<OrderRecord> for OrderResponse {
    fn from(order: OrderRecord) -> Self {
        Self {
            id: order.order_id,
            creator_id: order.creator_id,
            is_canceled: order.is_canceled,
            is_deleted: order.is_deleted,
            start_date: order.placed_at,
            end_date: order.ended_at,
            price: order.price,
            discounted_price: order.discounted_price,
            shopping_cart: order.cart,
        }
    }
}

/// POST {prefix}/user/order/begin: settle the caller's cart into an order.
#[tracing::instrument(skip(state))]
pub async fn begin<S: MarketplaceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserAccount(user_id): UserAccount,
) -> Result<(StatusCode, Json<OrderReceipt>), ApiError> {
    let receipt = state.settlement.begin_order(user_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET {prefix}/user/order/{order_id}: an order placed by the caller.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketplaceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserAccount(user_id): UserAccount,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .settlement
        .find_order(user_id, OrderId::new(order_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))?;

    Ok(Json(OrderResponse::from(order)))
}
