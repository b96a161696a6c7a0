//! Runtime configuration read from `STOCKROOM_*` environment variables.

use tracing::warn;

use crate::command_dispatcher::DEFAULT_MAX_ATTEMPTS;

pub const ENV_MAX_APPEND_ATTEMPTS: &str = "STOCKROOM_MAX_APPEND_ATTEMPTS";
pub const ENV_DEFAULT_PAGE_SIZE: &str = "STOCKROOM_DEFAULT_PAGE_SIZE";
pub const ENV_MAX_PAGE_SIZE: &str = "STOCKROOM_MAX_PAGE_SIZE";
pub const ENV_STATS_WINDOW_DAYS: &str = "STOCKROOM_STATS_WINDOW_DAYS";
pub const ENV_LOG: &str = "STOCKROOM_LOG";

/// Hard ceiling on a movement history page, whatever the configuration says.
pub const PAGE_SIZE_CEILING: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Optimistic append attempts before a command fails with `Conflict`.
    pub max_append_attempts: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Trailing window for movement statistics when the caller gives none.
    pub stats_window_days: u32,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_append_attempts: DEFAULT_MAX_ATTEMPTS,
            default_page_size: 50,
            max_page_size: PAGE_SIZE_CEILING,
            stats_window_days: 30,
            log_level: "info".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys keep their default; values that
    /// do not parse are reported and also keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_page_size = parse_positive(&lookup, ENV_MAX_PAGE_SIZE, defaults.max_page_size)
            .min(PAGE_SIZE_CEILING);
        let default_page_size =
            parse_positive(&lookup, ENV_DEFAULT_PAGE_SIZE, defaults.default_page_size);
        let default_page_size = if default_page_size > max_page_size {
            warn!(
                default_page_size,
                max_page_size, "default page size exceeds maximum; clamping"
            );
            max_page_size
        } else {
            default_page_size
        };

        Self {
            max_append_attempts: parse_positive(
                &lookup,
                ENV_MAX_APPEND_ATTEMPTS,
                defaults.max_append_attempts,
            ),
            default_page_size,
            max_page_size,
            stats_window_days: parse_positive(
                &lookup,
                ENV_STATS_WINDOW_DAYS,
                defaults.stats_window_days,
            ),
            log_level: lookup(ENV_LOG)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.log_level),
        }
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<u32>() {
        Ok(v) if v > 0 => v,
        _ => {
            warn!(key, value = %raw, default, "invalid configuration value; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(LedgerConfig::from_lookup(lookup(&[])), LedgerConfig::default());
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            (ENV_MAX_APPEND_ATTEMPTS, " 8 "),
            (ENV_DEFAULT_PAGE_SIZE, "20"),
            (ENV_STATS_WINDOW_DAYS, "7"),
            (ENV_LOG, "debug"),
        ]));
        assert_eq!(cfg.max_append_attempts, 8);
        assert_eq!(cfg.default_page_size, 20);
        assert_eq!(cfg.stats_window_days, 7);
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            (ENV_MAX_APPEND_ATTEMPTS, "0"),
            (ENV_STATS_WINDOW_DAYS, "a month"),
        ]));
        assert_eq!(cfg.max_append_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(cfg.stats_window_days, 30);
    }

    #[test]
    fn page_sizes_respect_the_ceiling() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            (ENV_MAX_PAGE_SIZE, "5000"),
            (ENV_DEFAULT_PAGE_SIZE, "2000"),
        ]));
        assert_eq!(cfg.max_page_size, PAGE_SIZE_CEILING);
        assert_eq!(cfg.default_page_size, PAGE_SIZE_CEILING);
    }
}
