//! Container tuning knobs.

use serde::{Deserialize, Serialize};

/// Settings for a [`Container`](crate::container::Container) and its
/// diagnostics.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use tether_container::config::ContainerConfig;
///
/// let config: ContainerConfig = serde_json::from_str(r#"{ "max_suggestions": 5 }"#).unwrap();
/// assert_eq!(config.max_suggestions, 5);
/// assert_eq!(config.deep_resolution_threshold, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Near-miss keys listed on a `DependencyNotRegistered` error.
    pub max_suggestions: usize,
    /// Length of the slowest-resolutions list in metrics reports.
    pub slowest_resolutions_limit: usize,
    /// Recent samples kept for percentile estimates.
    pub percentile_window: usize,
    /// Resolution depth above which the health check reports an issue.
    pub deep_resolution_threshold: usize,
    /// Live/total weak slot ratio below which the health check reports a leak.
    pub weak_efficiency_threshold: f64,
    /// Whether an `InstrumentedContainer` records samples.
    pub metrics_enabled: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 3,
            slowest_resolutions_limit: 10,
            percentile_window: 256,
            deep_resolution_threshold: 10,
            weak_efficiency_threshold: 0.7,
            metrics_enabled: true,
        }
    }
}
