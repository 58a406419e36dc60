//! Domain layer for the marketplace.
//!
//! This crate provides:
//! - Cart grouping and the cart service
//! - Balance reads for users and businesses
//! - Order settlement: validation planning and the transactional engine

pub mod balance;
pub mod cart;
pub mod error;
pub mod settlement;

pub use balance::BalanceService;
pub use cart::{CartLineItem, CartService, group_cart};
pub use error::{DomainError, SettlementError};
pub use settlement::{
    BusinessCredit, OrderReceipt, SettlementEngine, SettlementPlan, plan_settlement,
};
