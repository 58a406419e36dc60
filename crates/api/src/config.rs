//! Application configuration loaded from environment variables.

use common::CommissionRate;

/// Signing key used when `JWT_SECRET` is not set. Only fit for local runs.
pub const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production-min-32-chars-long";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `JWT_SECRET`: HS256 key for access tokens
/// - `ACCESS_COOKIE`: cookie holding the access token (default: `"access_token"`)
/// - `ORDER_PREFIX`: prefix of cart and order routes (default: `"/order"`)
/// - `UI_PREFIX`: prefix of profile routes (default: `"/ui"`)
/// - `COMMISSION_BPS`: platform commission in basis points (default: `200`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: Option<String>,
    pub access_cookie: String,
    pub order_prefix: String,
    pub ui_prefix: String,
    pub commission: CommissionRate,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: lookup("JWT_SECRET").filter(|secret| !secret.is_empty()),
            access_cookie: lookup("ACCESS_COOKIE").unwrap_or(defaults.access_cookie),
            order_prefix: lookup("ORDER_PREFIX")
                .map(|p| normalize_prefix(&p))
                .unwrap_or(defaults.order_prefix),
            ui_prefix: lookup("UI_PREFIX")
                .map(|p| normalize_prefix(&p))
                .unwrap_or(defaults.ui_prefix),
            commission: lookup("COMMISSION_BPS")
                .and_then(|bps| bps.parse().ok())
                .map(CommissionRate::from_basis_points)
                .unwrap_or(defaults.commission),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the configured signing key, or the development key.
    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or(DEV_JWT_SECRET)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            jwt_secret: None,
            access_cookie: "access_token".to_string(),
            order_prefix: "/order".to_string(),
            ui_prefix: "/ui".to_string(),
            commission: CommissionRate::STANDARD,
        }
    }
}

/// Ensures a leading slash and no trailing slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.access_cookie, "access_token");
        assert_eq!(config.order_prefix, "/order");
        assert_eq!(config.ui_prefix, "/ui");
        assert_eq!(config.commission, CommissionRate::STANDARD);
        assert_eq!(config.jwt_secret(), DEV_JWT_SECRET);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_lookup_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://localhost/market"),
            ("JWT_SECRET", "s3cret"),
            ("ORDER_PREFIX", "shop/"),
            ("COMMISSION_BPS", "350"),
        ]));
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/market")
        );
        assert_eq!(config.jwt_secret(), "s3cret");
        assert_eq!(config.order_prefix, "/shop");
        assert_eq!(config.commission.basis_points(), 350);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("DATABASE_URL", ""),
            ("COMMISSION_BPS", "-5"),
        ]));
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.commission, CommissionRate::STANDARD);
    }
}
