//! Application configuration loaded from environment variables.

use chrono::Duration;
use rust_decimal::Decimal;

use common::CurrencyConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL URL; absent means the in-memory store
/// - `HOLD_WINDOW_HOURS` — reservation lifetime (default: `24`)
/// - `SESSION_TTL_HOURS` — shopping session lifetime (default: `24`)
/// - `RECONCILE_PERIOD_SECS` — scheduler sweep period (default: `900`)
/// - `STORE_TIMEOUT_MS` — per-call store timeout (default: `5000`)
/// - `NGN_SMALLEST_UNIT` — gateway NGN settlement unit (default: `"0.01"`)
/// - `DEFAULT_SHIPPING_KEY` — fallback shipping row (default: `"default"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub hold_window_hours: i64,
    pub session_ttl_hours: i64,
    pub reconcile_period_secs: u64,
    pub store_timeout_ms: u64,
    pub ngn_smallest_unit: Decimal,
    pub default_shipping_key: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            hold_window_hours: env_parse("HOLD_WINDOW_HOURS", 24),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", 24),
            reconcile_period_secs: env_parse("RECONCILE_PERIOD_SECS", 900),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS", 5000),
            ngn_smallest_unit: env_parse("NGN_SMALLEST_UNIT", Decimal::new(1, 2)),
            default_shipping_key: std::env::var("DEFAULT_SHIPPING_KEY")
                .unwrap_or_else(|_| "default".to_string()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reservation hold lifetime.
    pub fn hold_window(&self) -> Duration {
        Duration::hours(self.hold_window_hours)
    }

    /// Shopping session lifetime.
    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours)
    }

    /// Scheduler sweep period.
    pub fn reconcile_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reconcile_period_secs)
    }

    /// Per-call store timeout.
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }

    /// Currency conversion table for the payment gateway.
    pub fn currency_config(&self) -> CurrencyConfig {
        CurrencyConfig::new(self.ngn_smallest_unit)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            hold_window_hours: 24,
            session_ttl_hours: 24,
            reconcile_period_secs: 900,
            store_timeout_ms: 5000,
            ngn_smallest_unit: Decimal::new(1, 2),
            default_shipping_key: "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.hold_window_hours, 24);
        assert_eq!(config.reconcile_period_secs, 900);
        assert_eq!(config.ngn_smallest_unit, Decimal::new(1, 2));
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
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.hold_window(), Duration::hours(24));
        assert_eq!(config.reconcile_period(), std::time::Duration::from_secs(900));
        assert_eq!(config.store_timeout(), std::time::Duration::from_millis(5000));
    }
}
