// ============================================
// File: crates/vlink-node/src/services/network.rs
// ============================================
//! # Network
//!
//! ## Creation Reason
//! State of one joined network: the controller's current config, a
//! membership ledger entry per remote peer and the multicast
//! subscriptions announced on it. Verb handlers ask it two questions:
//! "may this peer talk here?" (the gate) and "may this frame pass?"
//! (the filter).
//!
//! ## Main Functionality
//! - Config snapshot swap (`apply_config`)
//! - Per-peer `Membership` behind its own `RwLock`
//! - Gate, authoritative fallback, bridging permission
//! - Inbound filtering with the sender's credentials
//! - Own credential bundle for pushing to peers
//! - Pruning of memberships left idle by `clean`
//!
//! ## Locking
//! ```text
//! config:      RwLock<Arc<NetworkConfig>>   (cloned out, never held)
//! memberships: DashMap<Address, Arc<RwLock<Membership>>>
//!                        │ Arc cloned out of the map before locking,
//!                        └ so no shard lock is held across a verify
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Revocations are filed under their target's membership, not the
//!   sender's
//! - A membership entry is created only by an accepted credential or a
//!   credential push; rejected and deferred credentials leave no trace
//! - Never hold a membership write lock while sending packets
//!
//! ## Last Modified
//! v0.1.0 - Initial network state

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use vlink_common::types::{Address, NetworkId};
use vlink_core::credential::{Credential, IdentityLookup};
use vlink_core::filter::{self, FilterContext, FrameMeta, IncomingDecision, RemoteCredentials};
use vlink_core::netconf::NetworkConfig;
use vlink_core::protocol::messages::NetworkCredentials;

use super::membership::{AddResult, Membership};
use super::multicast::MulticastSubscriptions;
use crate::error::{NodeError, Result};

/// Shared handle to one peer's membership.
pub type MembershipHandle = Arc<RwLock<Membership>>;

/// Joined networks by id.
pub type NetworkTable = DashMap<NetworkId, Arc<Network>>;

// ============================================
// Network
// ============================================

/// A joined network.
pub struct Network {
    nwid: NetworkId,
    local_address: Address,
    authoritative: bool,
    config: RwLock<Arc<NetworkConfig>>,
    memberships: DashMap<Address, MembershipHandle>,
    multicast: MulticastSubscriptions,
}

impl Network {
    /// Creates network state from an initial controller config.
    ///
    /// # Errors
    /// `NetworkConfigRejected` if `config` was not issued to `local_address`.
    pub fn new(
        config: NetworkConfig,
        local_address: Address,
        authoritative: bool,
        multicast_ttl_ms: i64,
    ) -> Result<Self> {
        if config.issued_to != local_address {
            return Err(NodeError::network_config_rejected(
                config.nwid,
                format!("issued to {} not {}", config.issued_to, local_address),
            ));
        }
        Ok(Self {
            nwid: config.nwid,
            local_address,
            authoritative,
            config: RwLock::new(Arc::new(config)),
            memberships: DashMap::new(),
            multicast: MulticastSubscriptions::new(multicast_ttl_ms),
        })
    }

    /// Network id.
    #[must_use]
    pub const fn nwid(&self) -> NetworkId {
        self.nwid
    }

    /// Current config snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<NetworkConfig> {
        Arc::clone(&self.config.read())
    }

    /// Replaces the config if `config` is not older than the current one.
    ///
    /// Returns `true` if the config was applied.
    ///
    /// # Errors
    /// `NetworkConfigRejected` for a config of another network or member.
    pub fn apply_config(&self, config: NetworkConfig) -> Result<bool> {
        if config.nwid != self.nwid {
            return Err(NodeError::network_config_rejected(
                self.nwid,
                format!("config is for {}", config.nwid),
            ));
        }
        if config.issued_to != self.local_address {
            return Err(NodeError::network_config_rejected(
                self.nwid,
                format!("issued to {}", config.issued_to),
            ));
        }

        let mut current = self.config.write();
        if config.revision < current.revision {
            debug!(
                nwid = %self.nwid,
                revision = config.revision,
                current = current.revision,
                "Ignoring older network config"
            );
            return Ok(false);
        }
        info!(nwid = %self.nwid, revision = config.revision, "Network config applied");
        *current = Arc::new(config);
        Ok(true)
    }

    /// Returns `true` if this node vouches for the network: it is the
    /// controller or runs as an authoritative node.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        self.authoritative || self.nwid.controller() == self.local_address
    }

    // ========================================
    // Memberships
    // ========================================

    /// Membership of `peer`, if one exists.
    #[must_use]
    pub fn membership(&self, peer: Address) -> Option<MembershipHandle> {
        self.memberships.get(&peer).map(|m| Arc::clone(m.value()))
    }

    fn membership_or_insert(&self, peer: Address) -> MembershipHandle {
        Arc::clone(self.memberships.entry(peer).or_default().value())
    }

    /// Number of peers with a membership entry.
    #[must_use]
    pub fn membership_count(&self) -> usize {
        self.memberships.len()
    }

    /// Offers a credential presented by `peer`.
    pub fn add_credential(
        &self,
        peer: Address,
        credential: &Credential,
        lookup: &dyn IdentityLookup,
    ) -> AddResult {
        let member = match credential {
            Credential::Revocation(rev) => rev.target(),
            _ => peer,
        };
        if !member.is_valid() {
            return AddResult::Rejected;
        }
        let conf = self.config();
        if let Some(handle) = self.membership(member) {
            return handle.write().add_credential(&conf, member, credential, lookup);
        }

        let mut fresh = Membership::new();
        let result = fresh.add_credential(&conf, member, credential, lookup);
        if !result.is_accepted() {
            return result;
        }
        let existing = match self.memberships.entry(member) {
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(fresh)));
                return result;
            }
            Entry::Occupied(slot) => Arc::clone(slot.get()),
        };
        // Lost a race with another insert for the same peer
        let mut membership = existing.write();
        membership.add_credential(&conf, member, credential, lookup)
    }

    /// The gate: may `peer` send traffic on this network?
    #[must_use]
    pub fn is_allowed(&self, peer: Address) -> bool {
        let conf = self.config();
        if conf.is_public() {
            return true;
        }
        self.membership(peer)
            .is_some_and(|m| m.read().is_allowed_on_network(&conf))
    }

    /// The gate, falling back to `is_authoritative` when `peer` has not
    /// presented a COM yet.
    #[must_use]
    pub fn is_allowed_or_authoritative(&self, peer: Address) -> bool {
        let conf = self.config();
        if let Some(m) = self.membership(peer) {
            let m = m.read();
            if m.com().is_some() {
                return m.is_allowed_on_network(&conf);
            }
        }
        conf.is_public() || self.is_authoritative()
    }

    /// Returns `true` if `peer` may send frames for MACs it does not own.
    #[must_use]
    pub fn permits_bridging(&self, peer: Address) -> bool {
        self.config().permits_bridging(peer)
    }

    /// Runs base rules and then `sender`'s capabilities over an inbound frame.
    #[must_use]
    pub fn filter_incoming(&self, sender: Address, frame: &FrameMeta<'_>) -> IncomingDecision {
        let conf = self.config();
        let membership = self.membership(sender);
        let guard = membership.as_ref().map(|m| m.read());

        let view = guard.as_ref().map(|m| m.view(&conf));
        let ctx = FilterContext {
            local_address: self.local_address,
            config: &conf,
            remote: view.as_ref().map(|v| v as &dyn RemoteCredentials),
        };

        match guard.as_ref() {
            Some(m) => filter::filter_incoming(&ctx, frame, m.capabilities(&conf)),
            None => filter::filter_incoming(&ctx, frame, std::iter::empty()),
        }
    }

    /// Atomically claims the right to push our credentials to `peer`.
    pub fn try_claim_push(&self, peer: Address, now: i64, interval_ms: i64) -> bool {
        self.membership_or_insert(peer)
            .read()
            .push_gate
            .try_advance(now, interval_ms)
    }

    /// Our own credentials on this network, for NETWORK_CREDENTIALS.
    #[must_use]
    pub fn own_credentials(&self) -> NetworkCredentials {
        let conf = self.config();
        NetworkCredentials {
            coms: conf.com.iter().cloned().collect(),
            capabilities: conf.capabilities.clone(),
            tags: conf.tags.clone(),
            revocations: Vec::new(),
            coos: conf.coos.clone(),
        }
    }

    /// Multicast subscriptions on this network.
    #[must_use]
    pub const fn multicast(&self) -> &MulticastSubscriptions {
        &self.multicast
    }

    /// Evicts invalid credentials from every membership.
    pub fn clean(&self) -> usize {
        let conf = self.config();
        let handles: Vec<MembershipHandle> = self
            .memberships
            .iter()
            .map(|m| Arc::clone(m.value()))
            .collect();
        handles.iter().map(|m| m.write().clean(&conf)).sum()
    }

    /// Drops memberships that hold nothing and whose push gate has been
    /// idle for at least `push_gate_ms`. Returns how many were dropped.
    pub fn prune_memberships(&self, now: i64, push_gate_ms: i64) -> usize {
        let mut dropped = 0;
        self.memberships.retain(|_, handle| {
            // A handle cloned out of the map is about to be written to
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            let membership = handle.read();
            let idle = membership.is_empty() && membership.push_gate.elapsed(now) >= push_gate_ms;
            if idle {
                dropped += 1;
            }
            !idle
        });
        if dropped > 0 {
            debug!(nwid = %self.nwid, dropped, "Pruned idle memberships");
        }
        dropped
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("nwid", &self.nwid)
            .field("revision", &self.config.read().revision)
            .field("memberships", &self.memberships.len())
            .field("authoritative", &self.is_authoritative())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
