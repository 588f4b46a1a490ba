// ============================================
// File: crates/vlink-node/src/services/topology.rs
// ============================================
//! # Topology
//!
//! ## Creation Reason
//! The peer store. It answers "who is this address" for the credential
//! verifier and the packet authenticator, and it drives WHOIS when the
//! answer is unknown.
//!
//! ## Main Functionality
//! - `Topology`: address → `Peer` map
//! - `add_peer`: first-contact learning with collision detection
//! - `IdentityLookup` implementation with WHOIS suppression and
//!   upstream escalation
//!
//! ## WHOIS Flow
//! ```text
//! identity(addr) ── known ──► Some(identity)
//!       │
//!       └─ unknown ──► request_whois(addr)
//!                        │
//!                        ├─ asked < whois_retry_ms ago ──► suppressed
//!                        └─ otherwise ──► WHOIS(addr) → upstream
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - An address, once bound to an identity, is never rebound; a second
//!   identity is reported as `Collision` and discarded
//! - `request_whois` must stay non-blocking: the verifier calls it while
//!   a membership lock is held
//!
//! ## Last Modified
//! v0.1.0 - Initial topology

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, trace, warn};

use vlink_common::time::now_millis;
use vlink_common::types::Address;
use vlink_core::credential::IdentityLookup;
use vlink_core::crypto::Identity;
use vlink_core::protocol::messages::Whois;
use vlink_core::protocol::Verb;
use vlink_core::wire::WireCodec;
use vlink_transport::traits::PacketSender;

use super::peer::Peer;
use crate::error::Result;

// ============================================
// AddPeerResult
// ============================================

/// Outcome of learning an identity.
#[derive(Debug, Clone)]
pub enum AddPeerResult {
    /// New peer stored.
    Added(Arc<Peer>),
    /// The same identity was already stored.
    AlreadyKnown(Arc<Peer>),
    /// A different identity already owns the address.
    Collision,
}

impl AddPeerResult {
    /// The stored peer, unless this was a collision.
    #[must_use]
    pub fn peer(&self) -> Option<&Arc<Peer>> {
        match self {
            Self::Added(p) | Self::AlreadyKnown(p) => Some(p),
            Self::Collision => None,
        }
    }
}

// ============================================
// Topology
// ============================================

/// Known peers and outstanding WHOIS requests.
pub struct Topology {
    local: Arc<Identity>,
    peers: DashMap<Address, Arc<Peer>>,
    pending_whois: DashMap<Address, i64>,
    sender: Arc<dyn PacketSender>,
    upstream: Option<Address>,
    whois_retry_ms: i64,
}

impl Topology {
    /// Creates an empty topology for `local`.
    #[must_use]
    pub fn new(
        local: Arc<Identity>,
        sender: Arc<dyn PacketSender>,
        upstream: Option<Address>,
        whois_retry_ms: i64,
    ) -> Self {
        Self {
            local,
            peers: DashMap::new(),
            pending_whois: DashMap::new(),
            sender,
            upstream,
            whois_retry_ms,
        }
    }

    /// This node's identity.
    #[must_use]
    pub fn local(&self) -> &Arc<Identity> {
        &self.local
    }

    /// This node's address.
    #[must_use]
    pub fn local_address(&self) -> Address {
        self.local.address()
    }

    /// Configured WHOIS upstream.
    #[must_use]
    pub const fn upstream(&self) -> Option<Address> {
        self.upstream
    }

    /// Looks up a peer.
    #[must_use]
    pub fn get(&self, address: Address) -> Option<Arc<Peer>> {
        self.peers.get(&address).map(|p| Arc::clone(p.value()))
    }

    /// Number of known peers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.peers.len()
    }

    /// Learns `identity`.
    ///
    /// The caller must have checked `identity.locally_validate()`.
    ///
    /// # Errors
    /// Propagates key agreement failures.
    pub fn add_peer(&self, identity: Identity) -> Result<AddPeerResult> {
        let address = identity.address();
        let identity = Arc::new(identity.to_public());

        if address == self.local.address() {
            warn!(address = %address, "Remote identity claims our own address");
            return Ok(AddPeerResult::Collision);
        }

        match self.peers.entry(address) {
            Entry::Occupied(existing) => {
                if existing.get().identity().same_public(&identity) {
                    Ok(AddPeerResult::AlreadyKnown(Arc::clone(existing.get())))
                } else {
                    warn!(address = %address, "Identity collision, keeping known identity");
                    Ok(AddPeerResult::Collision)
                }
            }
            Entry::Vacant(slot) => {
                let peer = Arc::new(Peer::new(&self.local, identity)?);
                slot.insert(Arc::clone(&peer));
                self.pending_whois.remove(&address);
                info!(address = %address, "Peer learned");
                Ok(AddPeerResult::Added(peer))
            }
        }
    }

    /// Asks for `address` unless it was asked for within the retry window.
    ///
    /// Returns `true` if a WHOIS was sent.
    pub fn request_whois_at(&self, address: Address, now: i64) -> bool {
        if !address.is_valid() || self.peers.contains_key(&address) {
            return false;
        }

        match self.pending_whois.entry(address) {
            Entry::Occupied(mut asked) => {
                if now.saturating_sub(*asked.get()) < self.whois_retry_ms {
                    trace!(address = %address, "WHOIS already pending");
                    return false;
                }
                asked.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }

        let Some(upstream) = self.upstream.filter(|u| *u != address) else {
            debug!(address = %address, "No upstream to ask");
            return false;
        };

        let payload = Whois {
            addresses: vec![address],
        }
        .to_bytes();
        match self.sender.send_packet(upstream, Verb::Whois, &payload) {
            Ok(()) => {
                debug!(address = %address, upstream = %upstream, "WHOIS sent");
                true
            }
            Err(e) => {
                debug!(address = %address, error = %e, "WHOIS send failed");
                false
            }
        }
    }

    /// Returns `true` if a WHOIS for `address` is outstanding.
    #[must_use]
    pub fn is_whois_pending(&self, address: Address) -> bool {
        self.pending_whois.contains_key(&address)
    }

    /// Forgets WHOIS markers older than the retry window.
    pub fn expire_whois(&self, now: i64) -> usize {
        let before = self.pending_whois.len();
        self.pending_whois
            .retain(|_, asked| now.saturating_sub(*asked) < self.whois_retry_ms);
        before - self.pending_whois.len()
    }
}

impl IdentityLookup for Topology {
    fn identity(&self, address: Address) -> Option<Arc<Identity>> {
        if address == self.local.address() {
            return Some(Arc::new(self.local.to_public()));
        }
        self.peers
            .get(&address)
            .map(|p| Arc::clone(p.value().identity()))
    }

    fn request_whois(&self, address: Address) {
        self.request_whois_at(address, now_millis());
    }
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("local", &self.local.address())
            .field("peers", &self.peers.len())
            .field("pending_whois", &self.pending_whois.len())
            .field("upstream", &self.upstream)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
