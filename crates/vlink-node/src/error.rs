// ============================================
// File: crates/vlink-node/src/error.rs
// ============================================
//! # Node Error Types
//!
//! ## Creation Reason
//! Errors that can escape the node to its host. Packet-level problems
//! never show up here: the dispatcher turns them into `ProcessResult`
//! values. What remains is configuration, lifecycle and the wrapped
//! lower-layer errors used by the node's own helpers.
//!
//! ## Last Modified
//! v0.1.0 - Initial node error definitions

use thiserror::Error;

use vlink_common::error::CommonError;
use vlink_common::types::NetworkId;
use vlink_core::error::CoreError;
use vlink_transport::error::TransportError;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Node error types.
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum NodeError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("Network {0} is not joined")]
    NetworkNotJoined(NetworkId),

    #[error("Network config for {nwid} rejected: {reason}")]
    NetworkConfigRejected {
        nwid: NetworkId,
        reason: String,
    },

    #[error("Node failed to start: {reason}")]
    StartupFailed {
        reason: String,
    },

    #[error("Node is shutting down")]
    ShuttingDown,

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl NodeError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `NetworkConfigRejected` error.
    pub fn network_config_rejected(nwid: NetworkId, reason: impl Into<String>) -> Self {
        Self::NetworkConfigRejected {
            nwid,
            reason: reason.into(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for configuration problems.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns `true` if the host should stop the node.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::StartupFailed { .. }
        )
    }

    /// Returns `true` if retrying later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlink_common::types::Address;

    #[test]
    fn test_error_display() {
        let err = NodeError::config_load("/etc/vlink.toml", "file not found");
        assert!(err.to_string().contains("/etc/vlink.toml"));

        let err = NodeError::NetworkNotJoined(NetworkId::new(0x8056_c2e2_1c00_0001));
        assert!(err.to_string().contains("8056c2e21c000001"));
    }

    #[test]
    fn test_error_classification() {
        let config_err = NodeError::config_invalid("limits.whois_retry_ms", "must be > 0");
        assert!(config_err.is_config_error());
        assert!(config_err.is_fatal());

        let transport: NodeError = TransportError::NoPath {
            dest: Address::from_u64(1),
        }
        .into();
        assert!(transport.is_retryable());
        assert!(!transport.is_fatal());

        assert!(!NodeError::ShuttingDown.is_retryable());
    }
}
