//! Shopping cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{BusinessId, Money, ProductId};
use domain::CartLineItem;
use serde::Serialize;
use store::MarketplaceStore;

use super::StatusResponse;
use crate::auth::UserAccount;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProductDataResponse {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i16>,
    pub price: Money,
    pub creator_id: BusinessId,
    pub quantity: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_data: ProductDataResponse,
    pub quantity: u32,
}

impl From<CartLineItem> for CartItemResponse {
    fn from(line: CartLineItem) -> Self {
        let product = line.product;
        Self {
            product_data: ProductDataResponse {
                id: product.product_id,
                name: product.name,
                description: product.description,
                category_id: product.category_id,
                price: product.price,
                creator_id: product.creator_id,
                quantity: product.quantity,
                start_date: product.start_date,
                end_date: product.end_date,
            },
            quantity: line.quantity,
        }
    }
}

/// GET {prefix}/user/cart: the caller's cart grouped by product.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketplaceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserAccount(user_id): UserAccount,
) -> Result<Json<Vec<CartItemResponse>>, ApiError> {
    let empty = || ApiError::NotFound("Cart is empty or user doesn't exist".to_string());

    let lines = state.carts.get_cart(user_id).await.map_err(|e| match e {
        domain::DomainError::AccountNotFound { .. } => empty(),
        other => ApiError::from(other),
    })?;
    if lines.is_empty() {
        return Err(empty());
    }

    Ok(Json(lines.into_iter().map(CartItemResponse::from).collect()))
}

/// DELETE {prefix}/user/cart: empty the caller's cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: MarketplaceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserAccount(user_id): UserAccount,
) -> Result<Json<StatusResponse>, ApiError> {
    state.carts.clear(user_id).await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST {prefix}/user/cart/{product_id}/add: add one unit.
#[tracing::instrument(skip(state))]
pub async fn add_item<S: MarketplaceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserAccount(user_id): UserAccount,
    Path(product_id): Path<i64>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .carts
        .add_item(user_id, ProductId::new(product_id))
        .await?;
    Ok(Json(StatusResponse::ok()))
}

/// POST {prefix}/user/cart/{product_id}/delete: remove one unit.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: MarketplaceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserAccount(user_id): UserAccount,
    Path(product_id): Path<i64>,
) -> Result<Json<StatusResponse>, ApiError> {
    let removed = state
        .carts
        .remove_item(user_id, ProductId::new(product_id))
        .await?;
    if !removed {
        return Err(ApiError::Conflict("Item not in cart".to_string()));
    }
    Ok(Json(StatusResponse::ok()))
}
