//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::load_balancer::power_of_choices::{CandidateWindow, DEFAULT_CHOICES};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend selection settings.
    pub balancer: BalancerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Config file hot reload.
    pub reload: ReloadConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8090").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8090".to_string(),
        }
    }
}

/// Which selection strategy the balancer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Sample k backends, pick the least loaded.
    #[default]
    PowerOfChoices,
    /// Scan all backends, pick the least loaded.
    JoinShortestQueue,
    /// Uniform random pick, load is ignored.
    Random,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "power_of_choices" | "bestof" | "p2c" => Ok(Self::PowerOfChoices),
            "join_shortest_queue" | "jsq" | "least_conn" => Ok(Self::JoinShortestQueue),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PowerOfChoices => "power_of_choices",
            Self::JoinShortestQueue => "join_shortest_queue",
            Self::Random => "random",
        })
    }
}

/// Backend selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Selection strategy.
    pub strategy: StrategyKind,

    /// Backend addresses, in routing order (e.g., "http://127.0.0.1:3000").
    pub backends: Vec<String>,

    /// Sample size k for power-of-choices (0 = default of 2).
    pub choices: usize,

    /// How many shuffled candidates power-of-choices compares.
    pub candidate_window: CandidateWindow,

    /// Track high watermark and lifetime count per backend.
    pub diagnostics: bool,

    /// Seed for the random source; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            backends: Vec::new(),
            choices: DEFAULT_CHOICES,
            candidate_window: CandidateWindow::default(),
            diagnostics: false,
            seed: None,
        }
    }
}

/// Timeout configuration for upstream exchanges.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Hot reload of the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Watch the config file and apply backend changes.
    pub enabled: bool,

    /// Poll interval for the file watcher in seconds.
    pub poll_interval_secs: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_secs: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8090");
        assert_eq!(config.balancer.strategy, StrategyKind::PowerOfChoices);
        assert_eq!(config.balancer.choices, 2);
        assert!(!config.balancer.diagnostics);
        assert!(!config.reload.enabled);
    }

    #[test]
    fn test_parse_balancer_section() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [balancer]
            strategy = "join_shortest_queue"
            backends = ["http://testa:8080", "http://testb:8080"]
            choices = 3
            candidate_window = "inclusive"
            diagnostics = true
            seed = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.balancer.strategy, StrategyKind::JoinShortestQueue);
        assert_eq!(config.balancer.backends.len(), 2);
        assert_eq!(config.balancer.choices, 3);
        assert_eq!(config.balancer.candidate_window, CandidateWindow::Inclusive);
        assert_eq!(config.balancer.seed, Some(9));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("jsq".parse::<StrategyKind>().unwrap(), StrategyKind::JoinShortestQueue);
        assert_eq!("Power-Of-Choices".parse::<StrategyKind>().unwrap(), StrategyKind::PowerOfChoices);
        assert_eq!("random".parse::<StrategyKind>().unwrap(), StrategyKind::Random);
        assert!("round_robin".parse::<StrategyKind>().is_err());
    }
}
