// ============================================
// File: crates/vlink-node/src/handlers/dispatcher.rs
// ============================================
//! # Verb Dispatcher
//!
//! ## Creation Reason
//! Single entry point for raw packets handed over by the socket layer.
//! Authenticates, decompresses and routes each packet to its verb
//! handler, and turns every outcome into a `ProcessResult` value.
//!
//! ## Main Functionality
//! - `Dispatcher::process_wire_packet`: bytes in, `ProcessResult` out
//! - Authentication by peer key, HELLO identity or trusted path
//! - Deferral of packets from unknown senders into the `RetryQueue`
//! - Replay of deferred packets once their identity is learned
//! - `DispatcherStats`: atomic per-outcome counters
//!
//! ## Packet State Machine
//! ```text
//! RECEIVED
//!    │
//!    ├─ trusted-path suite ──► path id + source IP check ─┐
//!    └─ MAC suites ─────────► MAC verify (peer key) ──────┤
//!                                                         │ fail: REJECTED(auth)
//!                                                         ▼
//!                                                    DECOMPRESS
//!                                                         │ fail: REJECTED(malformed)
//!                                                         ▼
//!                                                   VERB_DISPATCH
//!                                   ┌─────────────────────┼─────────────────────┐
//!                                   ▼                     ▼                     ▼
//!                                HANDLED          REJECTED(reason)      DEFERRED(address)
//!                                                                             │
//!                                                 RetryQueue ◄────────────────┘
//!                                                 replayed after HELLO / OK(WHOIS)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `process_wire_packet` never returns an error; failures are counted
//!   and logged, and the peer is told only where the protocol defines an
//!   ERROR reply
//! - A packet from an unknown sender is deferred, not dropped, and a
//!   WHOIS is requested (deduplicated by `Topology`)
//! - HELLO is the only verb authenticated with the identity it carries
//!
//! ## Last Modified
//! v0.1.0 - Initial dispatcher

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use vlink_common::time::now_millis;
use vlink_common::types::{Address, NetworkId};
use vlink_core::protocol::messages::{ErrorMessage, Hello, OkHeader};
use vlink_core::protocol::{CipherSuite, ErrorCode, Packet, Verb};
use vlink_core::wire::WireCodec;
use vlink_transport::traits::{InboundPath, PacketSender, VirtualPort};

use crate::config::NodeConfig;
use crate::services::{Network, NetworkTable, Peer, RetryQueue, Topology};

// ============================================
// ProcessResult
// ============================================

/// Why a packet was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Truncated, oversized or undecodable input.
    Malformed,
    /// MAC, identity or trusted-path check failed.
    Authentication,
    /// Wrong destination, unknown verb, unsupported version or
    /// identity collision.
    Protocol,
    /// Sender not admitted to the network, or the frame was denied.
    Unauthorized,
}

impl RejectReason {
    /// Short name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Authentication => "authentication",
            Self::Protocol => "protocol",
            Self::Unauthorized => "unauthorized",
        }
    }
}

/// Outcome of processing one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// Processed; replies may have been sent.
    Handled,
    /// Dropped.
    Rejected(RejectReason),
    /// Waiting on the identity of the given address; the packet has
    /// been queued for replay.
    Deferred(Address),
}

impl ProcessResult {
    /// Returns `true` for `Handled`.
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        matches!(self, Self::Handled)
    }

    /// Returns `true` for `Deferred`.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Returns `true` for `Rejected`.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

// ============================================
// DispatcherStats
// ============================================

/// Dispatcher counters.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Packets processed, replays included.
    pub packets_rx: AtomicU64,
    /// Packets handled.
    pub handled: AtomicU64,
    /// Packets rejected as malformed.
    pub rejected_malformed: AtomicU64,
    /// Packets failing authentication.
    pub rejected_auth: AtomicU64,
    /// Packets rejected for protocol reasons.
    pub rejected_protocol: AtomicU64,
    /// Packets from senders not admitted, or denied frames.
    pub rejected_unauthorized: AtomicU64,
    /// Packets deferred on an identity.
    pub deferred: AtomicU64,
    /// Deferred packets replayed.
    pub replayed: AtomicU64,
    /// Frames delivered to the virtual port.
    pub frames_delivered: AtomicU64,
}

impl DispatcherStats {
    fn record(&self, result: ProcessResult) {
        let counter = match result {
            ProcessResult::Handled => &self.handled,
            ProcessResult::Deferred(_) => &self.deferred,
            ProcessResult::Rejected(RejectReason::Malformed) => &self.rejected_malformed,
            ProcessResult::Rejected(RejectReason::Authentication) => &self.rejected_auth,
            ProcessResult::Rejected(RejectReason::Protocol) => &self.rejected_protocol,
            ProcessResult::Rejected(RejectReason::Unauthorized) => &self.rejected_unauthorized,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_rx: self.packets_rx.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            rejected_malformed: self.rejected_malformed.load(Ordering::Relaxed),
            rejected_auth: self.rejected_auth.load(Ordering::Relaxed),
            rejected_protocol: self.rejected_protocol.load(Ordering::Relaxed),
            rejected_unauthorized: self.rejected_unauthorized.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `DispatcherStats`.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets_rx: u64,
    pub handled: u64,
    pub rejected_malformed: u64,
    pub rejected_auth: u64,
    pub rejected_protocol: u64,
    pub rejected_unauthorized: u64,
    pub deferred: u64,
    pub replayed: u64,
    pub frames_delivered: u64,
}

// ============================================
// Inbound
// ============================================

/// An authenticated, decompressed packet on its way to a verb handler.
pub(crate) struct Inbound<'a> {
    pub(crate) packet_id: u64,
    pub(crate) verb: Verb,
    pub(crate) peer: Arc<Peer>,
    pub(crate) payload: &'a [u8],
    pub(crate) path: InboundPath,
    pub(crate) now: i64,
    /// Addresses whose identity became known while handling this packet.
    pub(crate) learned: Vec<Address>,
}

impl Inbound<'_> {
    pub(crate) fn source(&self) -> Address {
        self.peer.address()
    }

    /// Decodes the payload, mapping failure to `Rejected(Malformed)`.
    pub(crate) fn decode<T: WireCodec>(&self) -> Result<T, ProcessResult> {
        T::from_bytes(self.payload).map(|(value, _)| value).map_err(|e| {
            debug!(
                source = %self.source(),
                verb = self.verb.as_str(),
                error = %e,
                "Malformed payload"
            );
            ProcessResult::Rejected(RejectReason::Malformed)
        })
    }
}

// ============================================
// Dispatcher
// ============================================

/// Routes inbound packets to verb handlers.
///
/// # Thread Safety
/// All state lives behind the injected services; `process_wire_packet`
/// may be called from any number of threads at once.
pub struct Dispatcher {
    pub(crate) config: Arc<NodeConfig>,
    pub(crate) topology: Arc<Topology>,
    pub(crate) networks: Arc<NetworkTable>,
    pub(crate) retry: Arc<RetryQueue>,
    pub(crate) sender: Arc<dyn PacketSender>,
    pub(crate) port: Arc<dyn VirtualPort>,
    pub(crate) stats: DispatcherStats,
}

impl Dispatcher {
    /// Creates a dispatcher over the given services and collaborators.
    #[must_use]
    pub fn new(
        config: Arc<NodeConfig>,
        topology: Arc<Topology>,
        networks: Arc<NetworkTable>,
        retry: Arc<RetryQueue>,
        sender: Arc<dyn PacketSender>,
        port: Arc<dyn VirtualPort>,
    ) -> Self {
        Self {
            config,
            topology,
            networks,
            retry,
            sender,
            port,
            stats: DispatcherStats::default(),
        }
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    /// Processes one packet received on `path`.
    pub fn process_wire_packet(&self, data: &[u8], path: InboundPath) -> ProcessResult {
        self.process_at(data, path, now_millis())
    }

    /// Processes one packet with an explicit clock.
    pub fn process_at(&self, data: &[u8], path: InboundPath, now: i64) -> ProcessResult {
        let mut learned = Vec::new();
        let result = self.dispatch(data, path, now, &mut learned);
        if let ProcessResult::Deferred(waiting_on) = result {
            self.defer(waiting_on, Bytes::copy_from_slice(data), path, now);
        }
        self.replay(learned, now);
        result
    }

    fn defer(&self, waiting_on: Address, data: Bytes, path: InboundPath, queued_at: i64) {
        if !self.retry.push(waiting_on, data, path, queued_at) {
            debug!(waiting_on = %waiting_on, "Retry queue full, oldest packet evicted");
        }
    }

    /// Replays packets waiting on any address in `learned`. Replays may
    /// learn further identities, which are drained in the same loop.
    fn replay(&self, mut learned: Vec<Address>, now: i64) {
        while let Some(address) = learned.pop() {
            for deferred in self.retry.take(address, now) {
                self.stats.replayed.fetch_add(1, Ordering::Relaxed);
                trace!(address = %address, "Replaying deferred packet");
                let result = self.dispatch(&deferred.data, deferred.path, now, &mut learned);
                if let ProcessResult::Deferred(waiting_on) = result {
                    self.defer(waiting_on, deferred.data, deferred.path, deferred.queued_at);
                }
            }
        }
    }

    fn dispatch(
        &self,
        data: &[u8],
        path: InboundPath,
        now: i64,
        learned: &mut Vec<Address>,
    ) -> ProcessResult {
        self.stats.packets_rx.fetch_add(1, Ordering::Relaxed);
        let result = self.try_dispatch(data, path, now, learned);
        self.stats.record(result);
        if let ProcessResult::Rejected(reason) = result {
            trace!(addr = %path.addr, reason = reason.as_str(), "Packet rejected");
        }
        result
    }

    fn try_dispatch(
        &self,
        data: &[u8],
        path: InboundPath,
        now: i64,
        learned: &mut Vec<Address>,
    ) -> ProcessResult {
        let mut packet = match Packet::parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                trace!(addr = %path.addr, error = %e, "Unparseable packet");
                return ProcessResult::Rejected(RejectReason::Malformed);
            }
        };

        let local = self.topology.local_address();
        let source = packet.source();
        if packet.destination() != local {
            trace!(dest = %packet.destination(), "Packet not addressed to this node");
            return ProcessResult::Rejected(RejectReason::Protocol);
        }
        if packet.is_fragmented() {
            trace!(source = %source, "Fragment reached the dispatcher");
            return ProcessResult::Rejected(RejectReason::Protocol);
        }
        if !source.is_valid() || source == local {
            debug!(source = %source, addr = %path.addr, "Invalid source address");
            return ProcessResult::Rejected(RejectReason::Protocol);
        }

        let peer = match self.authenticate(&mut packet, path, now) {
            Ok(peer) => peer,
            Err(result) => return result,
        };

        if let Err(e) = packet.uncompress() {
            debug!(source = %source, error = %e, "Decompression failed");
            return ProcessResult::Rejected(RejectReason::Malformed);
        }
        let verb = match packet.verb() {
            Ok(verb) => verb,
            Err(e) => {
                debug!(source = %source, error = %e, "Unknown verb");
                return ProcessResult::Rejected(RejectReason::Protocol);
            }
        };

        peer.received(path, now);
        trace!(source = %source, verb = verb.as_str(), len = packet.len(), "Packet authenticated");

        let mut rx = Inbound {
            packet_id: packet.packet_id(),
            verb,
            peer,
            payload: packet.payload(),
            path,
            now,
            learned: Vec::new(),
        };
        let result = self.handle_verb(&mut rx);
        learned.append(&mut rx.learned);
        result
    }

    fn handle_verb(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        match rx.verb {
            Verb::Nop => ProcessResult::Handled,
            Verb::Hello => self.handle_hello(rx),
            Verb::Error => self.handle_error(rx),
            Verb::Ok => self.handle_ok(rx),
            Verb::Whois => self.handle_whois(rx),
            Verb::Echo => self.handle_echo(rx),
            Verb::Frame => self.handle_frame(rx),
            Verb::ExtFrame => self.handle_ext_frame(rx),
            Verb::MulticastLike => self.handle_multicast_like(rx),
            Verb::NetworkCredentials => self.handle_network_credentials(rx),
            Verb::MulticastGather => self.handle_multicast_gather(rx),
            Verb::MulticastFrame => self.handle_multicast_frame(rx),
            other => {
                trace!(source = %rx.source(), verb = other.as_str(), "Verb ignored");
                ProcessResult::Handled
            }
        }
    }

    // ========================================
    // Authentication
    // ========================================

    /// Finds the key for `packet` and verifies it.
    fn authenticate(
        &self,
        packet: &mut Packet,
        path: InboundPath,
        now: i64,
    ) -> Result<Arc<Peer>, ProcessResult> {
        let source = packet.source();
        match packet.cipher() {
            Some(CipherSuite::TrustedPath) => {
                let path_id = packet.trusted_path_id();
                if !self.config.is_trusted_path(path_id, path.addr.ip()) {
                    warn!(source = %source, path_id, addr = %path.addr, "Untrusted path id");
                    return Err(ProcessResult::Rejected(RejectReason::Authentication));
                }
                self.known_peer(source, now)
            }
            Some(suite) => {
                // The verb byte is only readable before dearmoring when
                // the payload is not encrypted.
                let peer = if suite == CipherSuite::MacOnly && matches!(packet.verb(), Ok(Verb::Hello)) {
                    self.hello_peer(packet)?
                } else {
                    self.known_peer(source, now)?
                };
                if let Err(e) = packet.dearmor(peer.key()) {
                    warn!(source = %source, addr = %path.addr, error = %e, "MAC check failed");
                    return Err(ProcessResult::Rejected(RejectReason::Authentication));
                }
                Ok(peer)
            }
            None => {
                debug!(source = %source, flags = packet.flags(), "Unsupported cipher suite");
                Err(ProcessResult::Rejected(RejectReason::Authentication))
            }
        }
    }

    fn known_peer(&self, source: Address, now: i64) -> Result<Arc<Peer>, ProcessResult> {
        self.topology.get(source).ok_or_else(|| {
            debug!(source = %source, "Sender unknown, deferring on WHOIS");
            self.topology.request_whois_at(source, now);
            ProcessResult::Deferred(source)
        })
    }

    /// Key holder for a HELLO: the known peer if the identity matches,
    /// otherwise a candidate built from the identity in the packet. The
    /// candidate is not stored until the HELLO handler runs.
    fn hello_peer(&self, packet: &Packet) -> Result<Arc<Peer>, ProcessResult> {
        if packet.is_compressed() {
            return Err(ProcessResult::Rejected(RejectReason::Malformed));
        }
        let (hello, _) = Hello::from_bytes(packet.payload()).map_err(|e| {
            debug!(source = %packet.source(), error = %e, "Malformed HELLO");
            ProcessResult::Rejected(RejectReason::Malformed)
        })?;

        let identity = hello.identity;
        if identity.address() != packet.source() || !identity.locally_validate() {
            warn!(source = %packet.source(), "HELLO identity does not derive its address");
            return Err(ProcessResult::Rejected(RejectReason::Authentication));
        }

        if let Some(known) = self.topology.get(packet.source()) {
            if known.identity().same_public(&identity) {
                return Ok(known);
            }
        }
        Peer::new(self.topology.local(), Arc::new(identity))
            .map(Arc::new)
            .map_err(|e| {
                warn!(source = %packet.source(), error = %e, "Key agreement failed");
                ProcessResult::Rejected(RejectReason::Authentication)
            })
    }

    // ========================================
    // Replies
    // ========================================

    pub(crate) fn send(&self, dest: Address, verb: Verb, payload: &[u8]) {
        if let Err(e) = self.sender.send_packet(dest, verb, payload) {
            debug!(dest = %dest, verb = verb.as_str(), error = %e, "Send failed");
        }
    }

    /// Sends OK in reply to `rx` with `body` after the common header.
    pub(crate) fn send_ok(&self, rx: &Inbound<'_>, body: &[u8]) {
        let mut payload = OkHeader::new(rx.verb, rx.packet_id).to_bytes();
        payload.extend_from_slice(body);
        self.send(rx.source(), Verb::Ok, &payload);
    }

    /// Sends ERROR in reply to `rx`.
    pub(crate) fn send_error(&self, rx: &Inbound<'_>, code: ErrorCode, nwid: Option<NetworkId>) {
        let error = ErrorMessage::new(rx.verb, rx.packet_id, code, nwid);
        self.send(rx.source(), Verb::Error, &error.to_bytes());
    }

    pub(crate) fn network(&self, nwid: NetworkId) -> Option<Arc<Network>> {
        self.networks.get(&nwid).map(|n| Arc::clone(n.value()))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("local", &self.topology.local_address())
            .field("networks", &self.networks.len())
            .field("deferred", &self.retry.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use vlink_core::protocol::messages::Whois;
    use vlink_core::protocol::packet::IDX_PAYLOAD;

    #[test]
    fn test_garbage_is_malformed() {
        let h = Harness::new();
        let result = h.dispatcher.process_wire_packet(&[0u8; 10], h.path());
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Malformed));
        assert!(result.is_rejected());
        assert_eq!(h.dispatcher.stats().snapshot().rejected_malformed, 1);
    }

    #[test]
    fn test_wrong_destination_rejected() {
        let h = Harness::new();
        let remote = h.remote();
        h.learn(&remote);
        let mut packet = Packet::new(1, Address::from_u64(0x12_3456_789a), remote.address(), Verb::Nop);
        packet.armor(&remote.agree(&h.local).unwrap(), false);
        let result = h.dispatcher.process_wire_packet(packet.as_bytes(), h.path());
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Protocol));
    }

    #[test]
    fn test_tampered_packet_fails_auth() {
        let h = Harness::new();
        let remote = h.remote();
        h.learn(&remote);
        let whois = Whois {
            addresses: vec![Address::from_u64(0x01_0203_0405)],
        };
        let mut bytes = h.packet_from(&remote, Verb::Whois, &whois.to_bytes(), true).to_vec();
        bytes[IDX_PAYLOAD] ^= 0x01;

        let result = h.dispatcher.process_wire_packet(&bytes, h.path());
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Authentication));
        assert_eq!(h.sender.sent_count(), 0);
    }

    #[test]
    fn test_unknown_sender_deferred_and_replayed_after_hello() {
        let h = Harness::new();
        let remote = h.remote();

        let echo = h.packet_from(&remote, Verb::Echo, b"ping", true);
        let result = h.dispatcher.process_wire_packet(&echo, h.path());
        assert_eq!(result, ProcessResult::Deferred(remote.address()));
        assert!(result.is_deferred() && !result.is_rejected());
        assert_eq!(h.retry.pending_for(remote.address()), 1);
        assert!(h.topology.is_whois_pending(remote.address()));

        let hello = h.hello_from(&remote);
        assert!(h.dispatcher.process_wire_packet(&hello, h.path()).is_handled());
        assert_eq!(h.retry.pending_for(remote.address()), 0);

        // OK(HELLO) plus the replayed ECHO's OK(ECHO)
        let oks = h.sender.take_verb(Verb::Ok);
        assert_eq!(oks.len(), 2);
        assert!(oks[1].payload.ends_with(b"ping"));
        let stats = h.dispatcher.stats().snapshot();
        assert_eq!(stats.deferred, 1);
        assert_eq!(stats.replayed, 1);
    }

    #[test]
    fn test_trusted_path() {
        let h = Harness::with_config(
            r#"
            [[trusted_paths]]
            id = 77
            network = "10.0.0.0/8"
            "#,
        );
        let remote = h.remote();
        h.learn(&remote);

        let mut packet = Packet::new(9, h.local.address(), remote.address(), Verb::Echo);
        packet.append_payload(b"hi").unwrap();
        packet.set_trusted_path(77);

        let inside = InboundPath::new("10.1.2.3:9993".parse().unwrap());
        assert!(h.dispatcher.process_wire_packet(packet.as_bytes(), inside).is_handled());

        let outside = InboundPath::new("192.168.1.1:9993".parse().unwrap());
        assert_eq!(
            h.dispatcher.process_wire_packet(packet.as_bytes(), outside),
            ProcessResult::Rejected(RejectReason::Authentication)
        );
    }

    #[test]
    fn test_compressed_payload_accepted() {
        let h = Harness::new();
        let remote = h.remote();
        h.learn(&remote);

        let body = vec![b'a'; 400];
        let mut packet = Packet::new(3, h.local.address(), remote.address(), Verb::Echo);
        packet.append_payload(&body).unwrap();
        assert!(packet.compress());
        packet.armor(&remote.agree(&h.local).unwrap(), true);

        assert!(h.dispatcher.process_wire_packet(packet.as_bytes(), h.path()).is_handled());
        let ok = h.sender.take_verb(Verb::Ok);
        assert!(ok[0].payload.ends_with(&body));
    }
}
