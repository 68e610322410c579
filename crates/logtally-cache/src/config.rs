//! Cache configuration options

use logtally_core::{Result, TallyError};
use serde::{Deserialize, Serialize};

/// Largest accepted safety margin, one day
pub const MAX_SAFETY_MARGIN_MINUTES: i64 = 24 * 60;

/// Configuration for the minute-bucket cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Minutes before the cached end that are re-fetched on overlap
    pub safety_margin_minutes: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            safety_margin_minutes: 2,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with a custom safety margin
    pub fn new(safety_margin_minutes: i64) -> Self {
        Self {
            enabled: true,
            safety_margin_minutes,
        }
    }

    /// Create a disabled cache configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the safety margin
    pub fn with_safety_margin(mut self, minutes: i64) -> Self {
        self.safety_margin_minutes = minutes;
        self
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Reject margins outside `0..=MAX_SAFETY_MARGIN_MINUTES`
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_SAFETY_MARGIN_MINUTES).contains(&self.safety_margin_minutes) {
            return Err(TallyError::Config(format!(
                "safety_margin_minutes must be between 0 and {}, got {}",
                MAX_SAFETY_MARGIN_MINUTES, self.safety_margin_minutes
            )));
        }
        Ok(())
    }
}
