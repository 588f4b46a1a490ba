// ============================================
// File: crates/vlink-transport/src/traits.rs
// ============================================
//! # Collaborator Traits
//!
//! ## Creation Reason
//! The node's only outputs are packets to peers and frames to the local
//! virtual port. Both are traits so the host supplies the real I/O and
//! tests supply recorders.
//!
//! ## Main Functionality
//! - `PacketSender`: send a verb + payload to a peer address
//! - `VirtualPort`: hand an Ethernet frame to the local port
//! - `InboundPath`: where a received packet physically came from
//!
//! ## ⚠️ Important Note for Next Developer
//! - `PacketSender` implementations own outbound armoring, compression and
//!   fragmentation; the node passes plain payloads
//! - Implementations must be Send + Sync; many workers call them at once
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::net::SocketAddr;
use std::time::Instant;

use vlink_common::types::{Address, Mac, NetworkId};
use vlink_core::protocol::Verb;

use crate::error::Result;

// ============================================
// InboundPath
// ============================================

/// Physical origin of a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InboundPath {
    /// Remote socket address.
    pub addr: SocketAddr,
    /// When the packet was received.
    pub received_at: Instant,
}

impl InboundPath {
    /// Creates a path stamped with the current time.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            received_at: Instant::now(),
        }
    }

    /// Time since the packet was received.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.received_at.elapsed()
    }
}

// ============================================
// PacketSender Trait
// ============================================

/// Sends packets to peers.
///
/// # Example
/// ```ignore
/// sender.send_packet(peer, Verb::Whois, &whois.to_bytes())?;
/// ```
pub trait PacketSender: Send + Sync {
    /// Queues `payload` for `dest` under `verb`.
    ///
    /// # Errors
    /// Returns an error if the packet cannot be queued.
    fn send_packet(&self, dest: Address, verb: Verb, payload: &[u8]) -> Result<()>;
}

// ============================================
// VirtualPort Trait
// ============================================

/// The local end of a joined network.
pub trait VirtualPort: Send + Sync {
    /// Delivers a frame that passed membership and filtering.
    ///
    /// # Errors
    /// Returns an error if the port refuses the frame.
    fn deliver_frame(
        &self,
        nwid: NetworkId,
        source: Mac,
        dest: Mac,
        ether_type: u16,
        vlan_id: u16,
        data: &[u8],
    ) -> Result<()>;
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_path() {
        let addr: SocketAddr = "192.0.2.7:9993".parse().unwrap();
        let path = InboundPath::new(addr);

        assert_eq!(path.addr, addr);
        assert!(path.age() < std::time::Duration::from_secs(1));
    }
}
