// ============================================
// File: crates/vlink-node/src/services/peer.rs
// ============================================
//! # Peer
//!
//! ## Creation Reason
//! Everything the node remembers about a remote node whose identity it
//! has verified: the identity itself, the agreed packet key, the remote
//! version and a few per-peer rate gates.
//!
//! ## ⚠️ Important Note for Next Developer
//! - A peer's identity never changes; a different identity claiming the
//!   same address is a collision and is refused by the topology
//!
//! ## Last Modified
//! v0.1.0 - Initial peer record

use std::sync::Arc;

use parking_lot::RwLock;

use vlink_common::time::AtomicMillis;
use vlink_common::types::Address;
use vlink_core::crypto::{Identity, PeerKey};
use vlink_core::protocol::SoftwareVersion;
use vlink_transport::traits::InboundPath;

use crate::error::Result;

// ============================================
// RemoteVersion
// ============================================

/// Version information reported by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteVersion {
    /// Protocol version.
    pub protocol: u8,
    /// Software version.
    pub software: SoftwareVersion,
}

// ============================================
// Peer
// ============================================

/// A known remote node.
pub struct Peer {
    identity: Arc<Identity>,
    key: PeerKey,
    version: RwLock<Option<RemoteVersion>>,
    last_path: RwLock<Option<InboundPath>>,
    /// Last time any authenticated packet arrived.
    pub last_receive: AtomicMillis,
    /// Last time a HELLO was accepted.
    pub last_hello: AtomicMillis,
    /// Rate gate for answering this peer's WHOIS requests.
    pub whois_gate: AtomicMillis,
}

impl Peer {
    /// Creates a peer, agreeing a key between `local` and `remote`.
    ///
    /// # Errors
    /// Propagates key agreement failures (e.g. `local` has no secret).
    pub fn new(local: &Identity, remote: Arc<Identity>) -> Result<Self> {
        let key = local.agree(&remote)?;
        Ok(Self {
            identity: remote,
            key,
            version: RwLock::new(None),
            last_path: RwLock::new(None),
            last_receive: AtomicMillis::new(0),
            last_hello: AtomicMillis::new(0),
            whois_gate: AtomicMillis::new(0),
        })
    }

    /// Peer address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.identity.address()
    }

    /// Peer identity.
    #[must_use]
    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    /// Packet key shared with this peer.
    #[must_use]
    pub const fn key(&self) -> &PeerKey {
        &self.key
    }

    /// Version reported in the last HELLO or OK(HELLO).
    #[must_use]
    pub fn version(&self) -> Option<RemoteVersion> {
        *self.version.read()
    }

    /// Records the peer's version.
    pub fn set_version(&self, protocol: u8, software: SoftwareVersion) {
        *self.version.write() = Some(RemoteVersion { protocol, software });
    }

    /// Physical path of the last authenticated packet.
    #[must_use]
    pub fn last_path(&self) -> Option<InboundPath> {
        *self.last_path.read()
    }

    /// Records activity on `path`.
    pub fn received(&self, path: InboundPath, now: i64) {
        *self.last_path.write() = Some(path);
        self.last_receive.store(now);
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("address", &self.address())
            .field("version", &self.version())
            .field("last_receive", &self.last_receive.load())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
