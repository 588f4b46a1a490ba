// ============================================
// File: crates/vlink-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Errors a host reports back when the node asks it to send a packet or
//! deliver a frame.
//!
//! ## Error Categories
//! 1. **Send Errors**: the packet could not be queued for a peer
//! 2. **Delivery Errors**: the local port refused a frame
//! 3. **Lifecycle Errors**: the host is shutting down
//!
//! ## ⚠️ Important Note for Next Developer
//! - The dispatcher logs these and carries on; a failed reply never
//!   fails the inbound packet
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use vlink_common::error::CommonError;
use vlink_common::types::{Address, NetworkId};

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Send Errors
    // ========================================

    /// No path to the peer is known.
    #[error("No path to {dest}")]
    NoPath {
        /// Destination peer
        dest: Address,
    },

    /// Send operation failed.
    #[error("Failed to send to {dest}: {reason}")]
    SendFailed {
        /// Destination peer
        dest: Address,
        /// Why send failed
        reason: String,
    },

    // ========================================
    // Delivery Errors
    // ========================================

    /// The local port refused the frame.
    #[error("Failed to deliver frame on network {nwid}: {reason}")]
    DeliveryFailed {
        /// Network the frame belongs to
        nwid: NetworkId,
        /// Why delivery failed
        reason: String,
    },

    /// An outbound or delivery queue is full.
    #[error("Queue full (capacity {capacity})")]
    QueueFull {
        /// Queue capacity
        capacity: usize,
    },

    // ========================================
    // Lifecycle Errors
    // ========================================

    /// Host is shutting down.
    #[error("Transport is shutting down")]
    ShuttingDown,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `SendFailed` error.
    pub fn send_failed(dest: Address, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            dest,
            reason: reason.into(),
        }
    }

    /// Creates a `DeliveryFailed` error.
    pub fn delivery_failed(nwid: NetworkId, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            nwid,
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoPath { .. } | Self::SendFailed { .. } | Self::QueueFull { .. }
        )
    }

    /// Returns `true` if the host is going away.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }
}

// ============================================
// Tests
// ============================================
