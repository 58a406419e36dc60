pub mod balance;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;

use serde::Serialize;

/// Body returned by mutations that have nothing else to report.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}
