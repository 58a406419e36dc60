//! Row models shared by every store backend.

use chrono::{DateTime, Duration, Utc};
use common::{BusinessId, Money, OrderId, ProductId, UserId};

/// Row locking requested for a read inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Plain read.
    #[default]
    None,
    /// Hold an exclusive row lock until the transaction ends.
    ForUpdate,
}

impl LockMode {
    /// SQL suffix appended to a `SELECT`.
    pub(crate) fn sql_suffix(&self) -> &'static str {
        match self {
            LockMode::None => "",
            LockMode::ForUpdate => " FOR UPDATE",
        }
    }
}

/// A catalog product joined with its quantity and availability window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i16>,
    pub price: Money,
    pub creator_id: BusinessId,
    pub is_deleted: bool,
    pub quantity: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl ProductRecord {
    /// Creates a live product that became available a day ago and never expires.
    pub fn new(
        product_id: ProductId,
        creator_id: BusinessId,
        price: Money,
        quantity: i64,
    ) -> Self {
        Self {
            product_id,
            name: format!("Product {product_id}"),
            description: None,
            category_id: None,
            price,
            creator_id,
            is_deleted: false,
            quantity,
            start_date: Some(Utc::now() - Duration::days(1)),
            end_date: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn with_window(
        mut self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    /// Decides whether the product can be sold at `now`.
    ///
    /// A start date in the future does not make a product unavailable; only
    /// the end of the window is enforced.
    pub fn resolve(&self, now: DateTime<Utc>) -> ProductResolution {
        if self.is_deleted {
            return ProductResolution::Unavailable(UnavailableReason::Deleted);
        }
        if self.quantity <= 0 {
            return ProductResolution::Unavailable(UnavailableReason::OutOfStock);
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start > end
        {
            return ProductResolution::Unavailable(UnavailableReason::MalformedWindow);
        }
        if let Some(end) = self.end_date
            && end < now
        {
            return ProductResolution::Unavailable(UnavailableReason::Expired);
        }
        ProductResolution::Available(ProductSnapshot {
            product_id: self.product_id,
            name: self.name.clone(),
            description: self.description.clone(),
            category_id: self.category_id,
            price: self.price,
            creator_id: self.creator_id,
            quantity: self.quantity,
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

/// A sellable product as seen at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i16>,
    pub price: Money,
    pub creator_id: BusinessId,
    /// Units remaining in inventory.
    pub quantity: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Why a product cannot be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    NotFound,
    Deleted,
    OutOfStock,
    Expired,
    MalformedWindow,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::NotFound => "not_found",
            UnavailableReason::Deleted => "deleted",
            UnavailableReason::OutOfStock => "out_of_stock",
            UnavailableReason::Expired => "expired",
            UnavailableReason::MalformedWindow => "malformed_window",
        }
    }
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a product id through the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductResolution {
    Available(ProductSnapshot),
    Unavailable(UnavailableReason),
}

impl ProductResolution {
    pub fn available(self) -> Option<ProductSnapshot> {
        match self {
            ProductResolution::Available(snapshot) => Some(snapshot),
            ProductResolution::Unavailable(_) => None,
        }
    }
}

/// Finance row of a business account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusinessFinance {
    pub balance: Money,
    pub revenue: Money,
    pub earnings: Money,
}

/// Everything written when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub creator_id: UserId,
    /// Frozen copy of the cart multiset.
    pub cart: Vec<ProductId>,
    pub price: Money,
    pub placed_at: DateTime<Utc>,
}

/// A persisted order with its date, price and cart sub-records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub creator_id: UserId,
    pub is_canceled: bool,
    pub is_deleted: bool,
    pub placed_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub price: Money,
    pub discounted_price: Money,
    pub cart: Vec<ProductId>,
}
