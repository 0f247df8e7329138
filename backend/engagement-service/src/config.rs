/// Configuration management for the engagement service.
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration
    pub redis: RedisConfig,
    /// Counter cache, traversal and reconciliation tuning
    pub engagement: EngagementConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port for health checks and metrics
    pub http_port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL (redis://host:port)
    pub url: String,
}

/// Engagement subsystem tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Sliding TTL for cached counters and ranking sets, seconds
    #[serde(default = "default_counter_ttl_secs")]
    pub counter_ttl_secs: u64,
    /// Per-request deadline, seconds
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
    /// Deepest descendant level a cascading delete will traverse
    #[serde(default = "default_max_traversal_depth")]
    pub max_traversal_depth: usize,
    /// Most descendants a cascading delete will collect
    #[serde(default = "default_max_traversal_nodes")]
    pub max_traversal_nodes: usize,
    /// Seconds between reconciliation passes
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// Whether the reconciliation worker runs at all
    #[serde(default = "default_reconcile_enabled")]
    pub reconcile_enabled: bool,
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_counter_ttl_secs() -> u64 {
    3600
}

fn default_request_deadline_secs() -> u64 {
    10
}

fn default_max_traversal_depth() -> usize {
    1024
}

fn default_max_traversal_nodes() -> usize {
    100_000
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_reconcile_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8011), // engagement-service default HTTP port
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_connections),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_min_connections),
        };

        let redis = RedisConfig {
            url: std::env::var("REDIS_URL")
                .context("REDIS_URL environment variable not set")?,
        };

        let engagement = EngagementConfig {
            counter_ttl_secs: std::env::var("COUNTER_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_counter_ttl_secs),
            request_deadline_secs: std::env::var("REQUEST_DEADLINE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_request_deadline_secs),
            max_traversal_depth: std::env::var("SUBTREE_MAX_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_traversal_depth),
            max_traversal_nodes: std::env::var("SUBTREE_MAX_NODES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_traversal_nodes),
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_reconcile_interval_secs),
            reconcile_enabled: std::env::var("RECONCILE_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or_else(|_| default_reconcile_enabled()),
        };

        Ok(Config {
            app,
            database,
            redis,
            engagement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("REDIS_URL", "redis://localhost");

        let config = Config::from_env().unwrap();

        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.host, "0.0.0.0");
        assert_eq!(config.app.http_port, 8011);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.database.min_connections, 5);
        assert_eq!(config.engagement.counter_ttl_secs, 3600);
        assert_eq!(config.engagement.request_deadline_secs, 10);
        assert_eq!(config.engagement.max_traversal_depth, 1024);
        assert_eq!(config.engagement.max_traversal_nodes, 100_000);
        assert!(config.engagement.reconcile_enabled);
    }
}
