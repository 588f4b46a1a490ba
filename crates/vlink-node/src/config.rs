// ============================================
// File: crates/vlink-node/src/config.rs
// ============================================
//! # Node Configuration
//!
//! ## Creation Reason
//! Node-wide settings that are not part of any network's controller
//! config: rate gates, retry bounds, trusted physical paths and the
//! upstream used for WHOIS escalation.
//!
//! ## Main Functionality
//! - `NodeConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Per-section validation
//! - Trusted path lookup
//!
//! ## Configuration Sections
//! - `node`: authoritative flag, upstream address
//! - `limits`: gates, retry queue bounds, housekeeping period
//! - `trusted_paths`: path ids accepted without a MAC
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [node]
//! authoritative = false
//! upstream = "89e92ceee5"
//!
//! [limits]
//! whois_retry_ms = 500
//! retry_queue_per_address = 32
//! retry_queue_max_total = 1024
//!
//! [[trusted_paths]]
//! id = 42
//! network = "10.0.0.0/8"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Config changes require a node restart
//! - A trusted path skips the MAC entirely; keep the CIDR tight
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use vlink_common::types::Address;

use crate::error::{NodeError, Result};

// ============================================
// NodeConfig
// ============================================

/// Main node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node role.
    #[serde(default)]
    pub node: NodeSection,

    /// Rate gates and bounds.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Physical paths trusted without a MAC.
    #[serde(default)]
    pub trusted_paths: Vec<TrustedPathConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NodeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| NodeError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| NodeError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or fails validation.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| NodeError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigInvalid` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.node.validate()?;
        self.limits.validate()?;
        for (idx, path) in self.trusted_paths.iter().enumerate() {
            path.validate(idx)?;
        }
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Returns `true` if `path_id` is configured for a network containing `ip`.
    #[must_use]
    pub fn is_trusted_path(&self, path_id: u64, ip: IpAddr) -> bool {
        self.trusted_paths
            .iter()
            .any(|p| p.id == path_id && p.contains(ip))
    }
}

// ============================================
// NodeSection
// ============================================

/// `[node]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSection {
    /// Answers WHOIS without rate gating and authorizes multicast
    /// subscriptions for networks it has no membership for.
    #[serde(default)]
    pub authoritative: bool,

    /// Address WHOIS requests for unknown peers are escalated to.
    #[serde(default)]
    pub upstream: Option<String>,
}

impl NodeSection {
    fn validate(&self) -> Result<()> {
        if let Some(upstream) = &self.upstream {
            let addr = Address::from_str(upstream).map_err(|e| {
                NodeError::config_invalid("node.upstream", e.to_string())
            })?;
            if !addr.is_valid() {
                return Err(NodeError::config_invalid(
                    "node.upstream",
                    "address is nil or reserved",
                ));
            }
        }
        Ok(())
    }

    /// Parsed upstream address.
    #[must_use]
    pub fn upstream_address(&self) -> Option<Address> {
        self.upstream
            .as_deref()
            .and_then(|s| Address::from_str(s).ok())
    }
}

// ============================================
// LimitsConfig
// ============================================

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Minimum interval between answered WHOIS requests per peer.
    #[serde(default = "default_whois_rate_gate_ms")]
    pub whois_rate_gate_ms: i64,

    /// Minimum interval between credential pushes to one peer.
    #[serde(default = "default_credential_push_gate_ms")]
    pub credential_push_gate_ms: i64,

    /// Window in which a second WHOIS for the same address is suppressed.
    #[serde(default = "default_whois_retry_ms")]
    pub whois_retry_ms: i64,

    /// Deferred packets kept per pending address.
    #[serde(default = "default_retry_queue_per_address")]
    pub retry_queue_per_address: usize,

    /// Deferred packets kept across all pending addresses.
    #[serde(default = "default_retry_queue_max_total")]
    pub retry_queue_max_total: usize,

    /// Lifetime of a deferred packet.
    #[serde(default = "default_deferred_ttl_ms")]
    pub deferred_ttl_ms: i64,

    /// Lifetime of a MULTICAST_LIKE subscription.
    #[serde(default = "default_multicast_like_ttl_ms")]
    pub multicast_like_ttl_ms: i64,

    /// Period of the housekeeping task.
    #[serde(default = "default_housekeeping_interval_secs")]
    pub housekeeping_interval_secs: u64,

    /// Maximum members returned by one MULTICAST_GATHER reply.
    #[serde(default = "default_max_gather_results")]
    pub max_gather_results: u32,
}

fn default_whois_rate_gate_ms() -> i64 {
    100
}

fn default_credential_push_gate_ms() -> i64 {
    1_000
}

fn default_whois_retry_ms() -> i64 {
    500
}

fn default_retry_queue_per_address() -> usize {
    32
}

fn default_retry_queue_max_total() -> usize {
    1_024
}

fn default_deferred_ttl_ms() -> i64 {
    5_000
}

fn default_multicast_like_ttl_ms() -> i64 {
    600_000
}

fn default_housekeeping_interval_secs() -> u64 {
    10
}

fn default_max_gather_results() -> u32 {
    64
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        let positive = [
            ("limits.whois_rate_gate_ms", self.whois_rate_gate_ms),
            ("limits.credential_push_gate_ms", self.credential_push_gate_ms),
            ("limits.whois_retry_ms", self.whois_retry_ms),
            ("limits.deferred_ttl_ms", self.deferred_ttl_ms),
            ("limits.multicast_like_ttl_ms", self.multicast_like_ttl_ms),
        ];
        for (field, value) in positive {
            if value <= 0 {
                return Err(NodeError::config_invalid(field, "must be > 0"));
            }
        }

        if self.retry_queue_per_address == 0 {
            return Err(NodeError::config_invalid(
                "limits.retry_queue_per_address",
                "must be > 0",
            ));
        }

        if self.retry_queue_max_total < self.retry_queue_per_address {
            return Err(NodeError::config_invalid(
                "limits.retry_queue_max_total",
                "must be >= retry_queue_per_address",
            ));
        }

        if self.housekeeping_interval_secs == 0 {
            return Err(NodeError::config_invalid(
                "limits.housekeeping_interval_secs",
                "must be > 0",
            ));
        }

        Ok(())
    }

    /// Housekeeping period as a `Duration`.
    #[must_use]
    pub const fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            whois_rate_gate_ms: default_whois_rate_gate_ms(),
            credential_push_gate_ms: default_credential_push_gate_ms(),
            whois_retry_ms: default_whois_retry_ms(),
            retry_queue_per_address: default_retry_queue_per_address(),
            retry_queue_max_total: default_retry_queue_max_total(),
            deferred_ttl_ms: default_deferred_ttl_ms(),
            multicast_like_ttl_ms: default_multicast_like_ttl_ms(),
            housekeeping_interval_secs: default_housekeeping_interval_secs(),
            max_gather_results: default_max_gather_results(),
        }
    }
}

// ============================================
// TrustedPathConfig
// ============================================

/// One `[[trusted_paths]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedPathConfig {
    /// Path id carried in the packet's MAC field.
    pub id: u64,

    /// Physical network (CIDR) the path is valid from.
    pub network: String,
}

impl TrustedPathConfig {
    fn validate(&self, idx: usize) -> Result<()> {
        let field = format!("trusted_paths[{idx}].network");
        if self.id == 0 {
            return Err(NodeError::config_invalid(
                format!("trusted_paths[{idx}].id"),
                "must be non-zero",
            ));
        }
        self.parse_network()
            .map(|_| ())
            .map_err(|reason| NodeError::config_invalid(field, reason))
    }

    /// Parses the CIDR into (network, prefix_len).
    fn parse_network(&self) -> std::result::Result<(IpAddr, u8), String> {
        let (ip, prefix) = self
            .network
            .split_once('/')
            .ok_or_else(|| "must be in CIDR notation (e.g., 10.0.0.0/8)".to_string())?;

        let ip: IpAddr = ip.parse().map_err(|_| "invalid network address".to_string())?;
        let prefix: u8 = prefix.parse().map_err(|_| "invalid prefix length".to_string())?;

        let max = if ip.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(format!("prefix length cannot exceed {max}"));
        }
        Ok((ip, prefix))
    }

    /// Returns `true` if `ip` lies inside this path's network.
    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        let Ok((network, prefix)) = self.parse_network() else {
            return false;
        };
        match (network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "vlink_node=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
