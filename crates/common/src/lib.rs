//! Shared types for the marketplace workspace.

pub mod money;
pub mod types;

pub use money::{CommissionRate, Money};
pub use types::{Account, BusinessId, OrderId, ParseRoleError, ProductId, Role, UserId};
