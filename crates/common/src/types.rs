use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declares a row identifier backed by a database `BIGINT`.
///
/// Each identifier is its own type so that a product id can never be passed
/// where a user id is expected.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database id.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw database id.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type!(
    /// Identifier of an individual (buyer) account.
    UserId
);

id_type!(
    /// Identifier of a business (seller) account.
    BusinessId
);

id_type!(
    /// Identifier of a catalog product.
    ProductId
);

id_type!(
    /// Identifier of a placed order.
    OrderId
);

/// The two principal account kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Business,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Business => "business",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string is neither `user` nor `business`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "business" => Ok(Role::Business),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// An account reference of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Account {
    User(UserId),
    Business(BusinessId),
}

impl Account {
    /// Builds an account reference from a role and a raw id.
    pub fn new(role: Role, id: i64) -> Self {
        match role {
            Role::User => Account::User(UserId::new(id)),
            Role::Business => Account::Business(BusinessId::new(id)),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Account::User(_) => Role::User,
            Account::Business(_) => Role::Business,
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Account::User(id) => write!(f, "user:{id}"),
            Account::Business(id) => write!(f, "business:{id}"),
        }
    }
}
