//! Configuration validation rules.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for an unusable origin, an empty version
    /// tag, a race budget outside 100ms..=60s, a fetch timeout shorter than a
    /// race budget, a zero body limit, or a prefix that is not `/`-delimited.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_version.trim().is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        for (field, ms) in [("api_timeout_ms", self.api_timeout_ms), ("page_timeout_ms", self.page_timeout_ms)] {
            if ms < 100 {
                return Err(invalid(field, "must be at least 100ms"));
            }
            if ms > 60_000 {
                return Err(invalid(field, "must not exceed 60000ms"));
            }
        }

        if self.fetch_timeout_ms < self.api_timeout_ms.max(self.page_timeout_ms) {
            return Err(invalid("fetch_timeout_ms", "must not be shorter than a race budget"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }

        if self.max_entries_per_store == Some(0) {
            return Err(invalid("max_entries_per_store", "must be greater than 0 when set"));
        }

        for (field, prefix) in [("api_prefix", &self.api_prefix), ("report_prefix", &self.report_prefix)] {
            if !prefix.starts_with('/') || !prefix.ends_with('/') || prefix.len() < 3 {
                return Err(invalid(field, "must look like /segment/"));
            }
        }

        if self.api_prefix == self.report_prefix {
            return Err(invalid("report_prefix", "must differ from api_prefix"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.precache.is_empty() {
            tracing::warn!("precache manifest is empty; nothing will be available offline until visited");
        }

        Ok(())
    }
}
