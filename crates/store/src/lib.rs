//! Transactional storage for carts, balances, inventory and orders.
//!
//! Every operation runs inside a [`Transaction`] obtained from a
//! [`MarketplaceStore`]. Two backends are provided: PostgreSQL for
//! production and an in-memory store for tests and local runs.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{BusinessId, CommissionRate, Money, OrderId, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryMarketplaceStore, InMemoryTransaction};
pub use model::{
    BusinessFinance, LockMode, NewOrder, OrderRecord, ProductRecord, ProductResolution,
    ProductSnapshot, UnavailableReason,
};
pub use postgres::{PostgresMarketplaceStore, PostgresTransaction};
pub use store::{BalanceStore, CartStore, InventoryStore, MarketplaceStore, OrderStore, Transaction};
