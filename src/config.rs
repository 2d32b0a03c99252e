//! Configuration for monitor behavior and scoring heuristics

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the health monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Scoring weights for health calculation
    pub scoring_weights: ScoringWeights,
    /// Network configuration
    pub network: NetworkConfig,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Dependencies to skip during a scan
    pub ignored_dependencies: HashSet<String>,
}

/// Weights for the four primary components of the health score.
///
/// Code-quality and license scores are informational and carry no weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub security: f64,
    pub maintenance: f64,
    pub community: f64,
    pub popularity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            security: 0.35,
            maintenance: 0.30,
            community: 0.20,
            popularity: 0.15,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.security + self.maintenance + self.community + self.popularity
    }

    /// Validate that weights sum to approximately 1.0
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.sum();
        if (sum - 1.0).abs() > 0.01 {
            return Err(format!("Scoring weights must sum to 1.0, got {}", sum));
        }
        Ok(())
    }

    /// Normalize weights so they sum to 1.0
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.security /= sum;
            self.maintenance /= sum;
            self.community /= sum;
            self.popularity /= sum;
        }
    }
}

/// Network configuration for API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum number of retries for failed requests
    pub max_retries: u32,
    /// Delay between requests to avoid rate limiting (milliseconds)
    pub request_delay_ms: u64,
    /// GitHub API token (optional, for higher rate limits)
    pub github_token: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            request_delay_ms: 100,
            github_token: std::env::var("GITHUB_TOKEN").ok(),
        }
    }
}

impl NetworkConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get request delay as Duration
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled at all
    pub enabled: bool,
    /// Default time-to-live for cached entries, in seconds
    pub ttl_secs: u64,
    /// Cache directory; defaults to `~/.pkg-health/cache` when unset
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            dir: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scoring_weights: ScoringWeights::default(),
            network: NetworkConfig::default(),
            cache: CacheConfig::default(),
            ignored_dependencies: HashSet::new(),
        }
    }
}

impl MonitorConfig {
    /// Create a new builder for MonitorConfig
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }
}

/// Builder for MonitorConfig
#[derive(Default)]
pub struct MonitorConfigBuilder {
    scoring_weights: Option<ScoringWeights>,
    network: Option<NetworkConfig>,
    cache: Option<CacheConfig>,
    ignored_dependencies: HashSet<String>,
}

impl MonitorConfigBuilder {
    pub fn scoring_weights(mut self, weights: ScoringWeights) -> Self {
        self.scoring_weights = Some(weights);
        self
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ignore_dependency(mut self, name: String) -> Self {
        self.ignored_dependencies.insert(name);
        self
    }

    pub fn build(self) -> MonitorConfig {
        MonitorConfig {
            scoring_weights: self.scoring_weights.unwrap_or_default(),
            network: self.network.unwrap_or_default(),
            cache: self.cache.unwrap_or_default(),
            ignored_dependencies: self.ignored_dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = ScoringWeights::default();
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_normalize_rescales() {
        let mut weights = ScoringWeights {
            security: 0.5,
            maintenance: 0.5,
            ..Default::default()
        };
        weights.normalize();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        // Defaulted components keep their relative share
        assert!(weights.community > weights.popularity);
    }

    #[test]
    fn test_builder() {
        let config = MonitorConfig::builder()
            .ignore_dependency("setuptools".to_string())
            .build();
        assert!(config.ignored_dependencies.contains("setuptools"));
        assert!(config.cache.enabled);
    }
}
