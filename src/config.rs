//! # Bot Configuration Module
//!
//! Runtime settings for the expense tracker, read from the environment
//! (optionally via a `.env` file loaded by `main`).

use std::env;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::errors::ConfigError;
use crate::money::Currency;

// Constants for bot configuration
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_MAX_DESCRIPTION_LEN: usize = 50;
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 10;
pub const DEFAULT_EXPORT_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_CATEGORY_COLUMNS: usize = 3;
pub const DEFAULT_PAGINATION_COLUMNS: usize = 2;
pub const DEFAULT_TIMEZONE: &str = "Asia/Singapore";
pub const DEFAULT_CONTEXT_TTL_SECS: u64 = 24 * 60 * 60; // 1 day
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 10 * 60; // 10 minutes

/// Configuration structure for the bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub token: String,
    /// Postgres connection string; the in-memory store is used when absent
    pub database_url: Option<String>,
    /// Number of updates handled in parallel
    pub worker_count: usize,
    /// Maximum expense description length in characters
    pub max_description_len: usize,
    /// Transactions per `/list` page
    pub list_page_size: u32,
    /// Rows fetched per query while building an export
    pub export_page_size: u32,
    /// Buttons per row on category and transaction type keyboards
    pub category_columns: usize,
    /// Buttons per row on pagination keyboards
    pub pagination_columns: usize,
    /// Currency assigned to newly registered users
    pub default_currency: Currency,
    /// Timezone assigned to newly registered users
    pub default_timezone: Tz,
    /// Ask for a transaction type before the category
    pub transaction_type_tier: bool,
    /// Age after which an unused message context is purged
    pub context_ttl_secs: u64,
    /// How often the purge runs
    pub reaper_interval_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            database_url: None,
            worker_count: DEFAULT_WORKER_COUNT,
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            export_page_size: DEFAULT_EXPORT_PAGE_SIZE,
            category_columns: DEFAULT_CATEGORY_COLUMNS,
            pagination_columns: DEFAULT_PAGINATION_COLUMNS,
            default_currency: Currency::Sgd,
            default_timezone: chrono_tz::Asia::Singapore,
            transaction_type_tier: false,
            context_ttl_secs: DEFAULT_CONTEXT_TTL_SECS,
            reaper_interval_secs: DEFAULT_REAPER_INTERVAL_SECS,
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let config = Self {
            token,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            worker_count: env_or("WORKER_COUNT", defaults.worker_count)?,
            max_description_len: env_or("MAX_DESCRIPTION_LEN", defaults.max_description_len)?,
            list_page_size: env_or("LIST_PAGE_SIZE", defaults.list_page_size)?,
            export_page_size: env_or("EXPORT_PAGE_SIZE", defaults.export_page_size)?,
            category_columns: env_or("CATEGORY_COLUMNS", defaults.category_columns)?,
            pagination_columns: defaults.pagination_columns,
            default_currency: env_or("DEFAULT_CURRENCY", defaults.default_currency)?,
            default_timezone: env_or("DEFAULT_TIMEZONE", defaults.default_timezone)?,
            transaction_type_tier: env_or("TRANSACTION_TYPE_TIER", defaults.transaction_type_tier)?,
            context_ttl_secs: env_or("CONTEXT_TTL_SECS", defaults.context_ttl_secs)?,
            reaper_interval_secs: env_or(
                "CONTEXT_REAPER_INTERVAL_SECS",
                defaults.reaper_interval_secs,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break keyboard building or the worker pool
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&'static str, u64); 6] = [
            ("WORKER_COUNT", self.worker_count as u64),
            ("LIST_PAGE_SIZE", u64::from(self.list_page_size)),
            ("EXPORT_PAGE_SIZE", u64::from(self.export_page_size)),
            ("CATEGORY_COLUMNS", self.category_columns as u64),
            ("CONTEXT_TTL_SECS", self.context_ttl_secs),
            ("CONTEXT_REAPER_INTERVAL_SECS", self.reaper_interval_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        _ => Ok(default),
    }
}
