// ============================================
// File: crates/vlink-node/src/node.rs
// ============================================
//! # Node
//!
//! ## Creation Reason
//! Owns every service of one overlay node and wires them to the host's
//! `PacketSender` and `VirtualPort`. Hosts talk to this type only.
//!
//! ## Main Functionality
//! - `Node`: construction, network join/leave, packet entry point
//! - Direct credential admission for hosts that receive credentials
//!   out of band (e.g. alongside a network config)
//! - Housekeeping: membership cleaning and expiry of deferred packets,
//!   WHOIS markers and multicast subscriptions
//!
//! ## Node Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Node                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  host datagram ──► Dispatcher ──► vl1 / vl2 handlers        │
//! │                        │                                    │
//! │         ┌──────────────┼──────────────┬──────────────┐      │
//! │         ▼              ▼              ▼              ▼      │
//! │   ┌──────────┐  ┌────────────┐  ┌───────────┐  ┌─────────┐ │
//! │   │ Topology │  │NetworkTable│  │RetryQueue │  │ Stats   │ │
//! │   └──────────┘  └────────────┘  └───────────┘  └─────────┘ │
//! │                                                             │
//! │  Housekeeping task ── interval ──► do_background_tasks      │
//! │        ▲                                                    │
//! │        └──── broadcast shutdown                             │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `process_wire_packet` is synchronous and may run on any thread
//! - Only housekeeping needs a tokio runtime
//! - Leaving a network drops its memberships; packets already queued
//!   for it are rejected when replayed
//!
//! ## Last Modified
//! v0.1.0 - Initial node implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use vlink_common::time::now_millis;
use vlink_common::types::{Address, NetworkId};
use vlink_core::credential::Credential;
use vlink_core::crypto::Identity;
use vlink_core::netconf::NetworkConfig;
use vlink_transport::traits::{InboundPath, PacketSender, VirtualPort};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::handlers::{Dispatcher, ProcessResult, StatsSnapshot};
use crate::services::{AddResult, Network, NetworkTable, RetryQueue, Topology};

// ============================================
// HousekeepingReport
// ============================================

/// What one housekeeping pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// Credentials evicted from memberships.
    pub credentials_evicted: usize,
    /// Membership entries dropped once empty and idle.
    pub memberships_pruned: usize,
    /// Deferred packets that expired unreplayed.
    pub deferred_expired: usize,
    /// WHOIS markers dropped.
    pub whois_expired: usize,
    /// Multicast subscriptions that timed out.
    pub subscriptions_expired: usize,
}

// ============================================
// Node
// ============================================

/// One overlay node.
///
/// # Lifecycle
/// 1. Create with `Node::new(config, identity, sender, port)`
/// 2. `join` networks as configs arrive from their controllers
/// 3. Feed every received datagram to `process_wire_packet`
/// 4. Run `spawn_housekeeping` (or call `do_background_tasks` yourself)
/// 5. `shutdown` stops the housekeeping task
pub struct Node {
    config: Arc<NodeConfig>,
    identity: Arc<Identity>,
    topology: Arc<Topology>,
    networks: Arc<NetworkTable>,
    retry: Arc<RetryQueue>,
    dispatcher: Dispatcher,
    shutdown: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl Node {
    /// Creates a node.
    ///
    /// # Arguments
    /// * `config` - Node configuration, validated here
    /// * `identity` - Local identity; must carry its private keys
    /// * `sender` - Outbound packet path
    /// * `port` - Local virtual port receiving admitted frames
    ///
    /// # Errors
    /// `ConfigInvalid` for a bad config, `StartupFailed` for an identity
    /// without private keys or one that fails validation.
    pub fn new(
        config: NodeConfig,
        identity: Identity,
        sender: Arc<dyn PacketSender>,
        port: Arc<dyn VirtualPort>,
    ) -> Result<Self> {
        config.validate()?;
        if !identity.has_private() {
            return Err(NodeError::startup_failed("identity has no private key"));
        }
        if !identity.locally_validate() {
            return Err(NodeError::startup_failed("identity failed local validation"));
        }

        let config = Arc::new(config);
        let identity = Arc::new(identity);
        let topology = Arc::new(Topology::new(
            Arc::clone(&identity),
            Arc::clone(&sender),
            config.node.upstream_address(),
            config.limits.whois_retry_ms,
        ));
        let networks = Arc::new(NetworkTable::new());
        let retry = Arc::new(RetryQueue::new(
            config.limits.retry_queue_per_address,
            config.limits.retry_queue_max_total,
            config.limits.deferred_ttl_ms,
        ));
        let dispatcher = Dispatcher::new(
            Arc::clone(&config),
            Arc::clone(&topology),
            Arc::clone(&networks),
            Arc::clone(&retry),
            sender,
            port,
        );
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(
            address = %identity.address(),
            authoritative = config.node.authoritative,
            upstream = ?config.node.upstream_address(),
            "Node created"
        );

        Ok(Self {
            config,
            identity,
            topology,
            networks,
            retry,
            dispatcher,
            shutdown: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    /// This node's address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.identity.address()
    }

    /// Node configuration.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Peer store.
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Packets waiting on an identity.
    #[must_use]
    pub fn retry_queue(&self) -> &RetryQueue {
        &self.retry
    }

    /// Dispatcher counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.dispatcher.stats().snapshot()
    }

    // ========================================
    // Networks
    // ========================================

    /// Joins a network, or applies a newer config to one already joined.
    ///
    /// # Errors
    /// `NetworkConfigRejected` if the config was issued to another node,
    /// `ShuttingDown` after `shutdown`.
    pub fn join(&self, config: NetworkConfig) -> Result<Arc<Network>> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(NodeError::ShuttingDown);
        }

        match self.networks.entry(config.nwid) {
            Entry::Occupied(entry) => {
                let network = Arc::clone(entry.get());
                drop(entry);
                network.apply_config(config)?;
                Ok(network)
            }
            Entry::Vacant(slot) => {
                let network = Arc::new(Network::new(
                    config,
                    self.address(),
                    self.config.node.authoritative,
                    self.config.limits.multicast_like_ttl_ms,
                )?);
                info!(nwid = %network.nwid(), "Joined network");
                slot.insert(Arc::clone(&network));
                Ok(network)
            }
        }
    }

    /// Leaves a network.
    ///
    /// # Errors
    /// `NetworkNotJoined` if `nwid` is not joined.
    pub fn leave(&self, nwid: NetworkId) -> Result<()> {
        match self.networks.remove(&nwid) {
            Some(_) => {
                info!(nwid = %nwid, "Left network");
                Ok(())
            }
            None => Err(NodeError::NetworkNotJoined(nwid)),
        }
    }

    /// A joined network.
    #[must_use]
    pub fn network(&self, nwid: NetworkId) -> Option<Arc<Network>> {
        self.networks.get(&nwid).map(|n| Arc::clone(n.value()))
    }

    /// Ids of all joined networks.
    #[must_use]
    pub fn networks(&self) -> Vec<NetworkId> {
        self.networks.iter().map(|n| *n.key()).collect()
    }

    // ========================================
    // Packets and credentials
    // ========================================

    /// Processes one datagram received on `path`.
    pub fn process_wire_packet(&self, data: &[u8], path: InboundPath) -> ProcessResult {
        self.dispatcher.process_wire_packet(data, path)
    }

    /// Offers a credential about `peer` on network `nwid`.
    ///
    /// # Errors
    /// `NetworkNotJoined` if `nwid` is not joined.
    pub fn add_credential(
        &self,
        nwid: NetworkId,
        peer: Address,
        credential: &Credential,
    ) -> Result<AddResult> {
        let network = self.network(nwid).ok_or(NodeError::NetworkNotJoined(nwid))?;
        Ok(network.add_credential(peer, credential, &*self.topology))
    }

    /// The gate: may `peer` exchange frames with us on `nwid`?
    #[must_use]
    pub fn is_allowed_on_network(&self, nwid: NetworkId, peer: Address) -> bool {
        self.network(nwid).is_some_and(|n| n.is_allowed(peer))
    }

    // ========================================
    // Housekeeping
    // ========================================

    /// Runs one housekeeping pass at `now`.
    pub fn do_background_tasks(&self, now: i64) -> HousekeepingReport {
        let networks: Vec<Arc<Network>> = self
            .networks
            .iter()
            .map(|n| Arc::clone(n.value()))
            .collect();

        let mut report = HousekeepingReport {
            deferred_expired: self.retry.expire(now),
            whois_expired: self.topology.expire_whois(now),
            ..HousekeepingReport::default()
        };
        for network in &networks {
            report.credentials_evicted += network.clean();
            report.memberships_pruned +=
                network.prune_memberships(now, self.config.limits.credential_push_gate_ms);
            report.subscriptions_expired += network.multicast().expire(now);
        }
        report
    }

    /// Spawns the periodic housekeeping task. It stops on `shutdown`.
    pub fn spawn_housekeeping(self: &Arc<Self>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.config.limits.housekeeping_interval();

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Housekeeping task received shutdown signal");
                        break;
                    }
                    _ = interval_timer.tick() => {
                        if node.shutdown.load(Ordering::SeqCst) {
                            break;
                        }

                        let report = node.do_background_tasks(now_millis());
                        debug!(
                            credentials_evicted = report.credentials_evicted,
                            memberships_pruned = report.memberships_pruned,
                            deferred_expired = report.deferred_expired,
                            whois_expired = report.whois_expired,
                            subscriptions_expired = report.subscriptions_expired,
                            peers = node.topology.count(),
                            networks = node.networks.len(),
                            "Housekeeping cycle complete"
                        );
                    }
                }
            }
        })
    }

    /// Stops the housekeeping task and refuses further joins.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address())
            .field("networks", &self.networks.len())
            .field("peers", &self.topology.count())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
