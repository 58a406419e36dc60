//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, SettlementError};
use serde_json::json;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid access token.
    Unauthorized,
    /// The caller's role may not use the endpoint.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// The request conflicts with the current state.
    Conflict(String),
    /// Settlement rejected or aborted.
    Settlement(SettlementError),
    /// Cart or balance operation failed.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, message("Invalid access token.")),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, message(msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, message(msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, message(msg)),
            ApiError::Settlement(err) => settlement_error_to_response(err),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        (status, Json(json!({ "error": body }))).into_response()
    }
}

fn message(msg: impl Into<String>) -> serde_json::Value {
    serde_json::Value::String(msg.into())
}

fn settlement_error_to_response(err: SettlementError) -> (StatusCode, serde_json::Value) {
    match err {
        SettlementError::AccountNotFound { .. } => {
            (StatusCode::NOT_FOUND, message("User doesn't exists"))
        }
        SettlementError::EmptyCart => (StatusCode::CONFLICT, message("Cart is empty")),
        // A total beyond the range of money is bigger than any balance
        SettlementError::InsufficientFunds { .. } | SettlementError::AmountOutOfRange => (
            StatusCode::CONFLICT,
            message("Cart price bigger than balance"),
        ),
        SettlementError::InsufficientStock {
            product_id,
            shortfall,
        } => (
            StatusCode::CONFLICT,
            json!({
                "message": "Available quanity smaller",
                "product_id": product_id,
                "quanity_different": shortfall,
            }),
        ),
        SettlementError::Store(e) => {
            tracing::error!(error = %e, "settlement failed in store");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                message("Internal server error"),
            )
        }
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, serde_json::Value) {
    match err {
        DomainError::AccountNotFound { account } => (
            StatusCode::NOT_FOUND,
            message(format!("Account {account} not found")),
        ),
        DomainError::Store(e) => {
            tracing::error!(error = %e, "store operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                message("Internal server error"),
            )
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        ApiError::Settlement(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
