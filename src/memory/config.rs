use std::time::Duration;
use tracing::{info, warn};

use crate::constants::{
    DEFAULT_IDLE_EXPIRY_HOURS, DEFAULT_MEMORY_LIMIT, MAX_IDLE_EXPIRY_HOURS, MAX_MEMORY_LIMIT,
};

/// Memory store settings, resolved once at startup. Raw values come from the
/// environment-backed CLI flags; anything missing, non-numeric, or out of
/// range falls back to the default instead of failing startup.
#[derive(Debug, Clone)]
pub(crate) struct MemoryConfig {
    /// Max entries retained per channel.
    pub(crate) memory_limit: usize,
    /// Inactivity window after which a channel's history is purged.
    pub(crate) idle_expiry: Duration,
}

impl MemoryConfig {
    pub(crate) fn resolve(memory_limit: Option<&str>, idle_expiry_hours: Option<&str>) -> Self {
        let memory_limit = match memory_limit.map(str::trim).filter(|s| !s.is_empty()) {
            None => DEFAULT_MEMORY_LIMIT,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if (1..=MAX_MEMORY_LIMIT).contains(&n) => n,
                Ok(n) => {
                    warn!(value = n, default = DEFAULT_MEMORY_LIMIT, "MEMORY_LIMIT out of range");
                    DEFAULT_MEMORY_LIMIT
                }
                Err(_) => {
                    warn!(value = %raw, default = DEFAULT_MEMORY_LIMIT, "MEMORY_LIMIT is not a number");
                    DEFAULT_MEMORY_LIMIT
                }
            },
        };

        let hours = match idle_expiry_hours.map(str::trim).filter(|s| !s.is_empty()) {
            None => DEFAULT_IDLE_EXPIRY_HOURS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if (1..=MAX_IDLE_EXPIRY_HOURS).contains(&n) => n,
                Ok(n) => {
                    warn!(
                        value = n,
                        default = DEFAULT_IDLE_EXPIRY_HOURS,
                        "MEMORY_CLEANUP_INTERVAL_HOURS out of range"
                    );
                    DEFAULT_IDLE_EXPIRY_HOURS
                }
                Err(_) => {
                    warn!(
                        value = %raw,
                        default = DEFAULT_IDLE_EXPIRY_HOURS,
                        "MEMORY_CLEANUP_INTERVAL_HOURS is not a number"
                    );
                    DEFAULT_IDLE_EXPIRY_HOURS
                }
            },
        };

        info!(memory_limit, idle_expiry_hours = hours, "Memory configuration resolved");
        Self {
            memory_limit,
            idle_expiry: Duration::from_secs(hours * 3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults_when_absent() {
        let config = MemoryConfig::resolve(None, None);
        assert_eq!(config.memory_limit, DEFAULT_MEMORY_LIMIT);
        assert_eq!(config.idle_expiry, Duration::from_secs(3600));
    }

    #[test]
    fn test_resolve_valid_values() {
        let config = MemoryConfig::resolve(Some("5"), Some("24"));
        assert_eq!(config.memory_limit, 5);
        assert_eq!(config.idle_expiry, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_resolve_limit_boundaries() {
        assert_eq!(MemoryConfig::resolve(Some("1"), None).memory_limit, 1);
        assert_eq!(MemoryConfig::resolve(Some("100"), None).memory_limit, 100);
    }

    #[test]
    fn test_resolve_limit_out_of_range_falls_back() {
        assert_eq!(MemoryConfig::resolve(Some("0"), None).memory_limit, DEFAULT_MEMORY_LIMIT);
        assert_eq!(MemoryConfig::resolve(Some("101"), None).memory_limit, DEFAULT_MEMORY_LIMIT);
    }

    #[test]
    fn test_resolve_limit_non_numeric_falls_back() {
        assert_eq!(MemoryConfig::resolve(Some("lots"), None).memory_limit, DEFAULT_MEMORY_LIMIT);
        assert_eq!(MemoryConfig::resolve(Some("-3"), None).memory_limit, DEFAULT_MEMORY_LIMIT);
        assert_eq!(MemoryConfig::resolve(Some(""), None).memory_limit, DEFAULT_MEMORY_LIMIT);
    }

    #[test]
    fn test_resolve_hours_boundaries() {
        assert_eq!(
            MemoryConfig::resolve(None, Some("168")).idle_expiry,
            Duration::from_secs(168 * 3600)
        );
        assert_eq!(
            MemoryConfig::resolve(None, Some("1")).idle_expiry,
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_resolve_hours_out_of_range_falls_back() {
        assert_eq!(
            MemoryConfig::resolve(None, Some("0")).idle_expiry,
            Duration::from_secs(DEFAULT_IDLE_EXPIRY_HOURS * 3600)
        );
        assert_eq!(
            MemoryConfig::resolve(None, Some("169")).idle_expiry,
            Duration::from_secs(DEFAULT_IDLE_EXPIRY_HOURS * 3600)
        );
    }

    #[test]
    fn test_resolve_hours_non_numeric_falls_back() {
        assert_eq!(
            MemoryConfig::resolve(None, Some("soon")).idle_expiry,
            Duration::from_secs(DEFAULT_IDLE_EXPIRY_HOURS * 3600)
        );
    }
}
