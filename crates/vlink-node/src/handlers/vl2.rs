// ============================================
// File: crates/vlink-node/src/handlers/vl2.rs
// ============================================
//! # Network-Level Verbs
//!
//! ## Creation Reason
//! Handlers for verbs scoped to a joined network: frames, credential
//! pushes and multicast subscription traffic. Every one of them goes
//! through the membership gate before touching network state.
//!
//! ## Frame Path
//! ```text
//! FRAME / EXT_FRAME / MULTICAST_FRAME
//!   │
//!   ├─ inline COM? ──► Network::add_credential (may defer on signer)
//!   │
//!   ├─ gate ── fail ──► ERROR(NEED_MEMBERSHIP_CERTIFICATE, nwid)
//!   │
//!   ├─ source MAC not the sender's ──► bridging permitted?
//!   │
//!   ├─ filter: base rules, then capabilities
//!   │     ├─ TEE/WATCH ──► EXT_FRAME copy
//!   │     ├─ REDIRECT  ──► EXT_FRAME to target, not delivered
//!   │     └─ DROP / no match ──► rejected
//!   │
//!   └─ VirtualPort::deliver_frame
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - An ungated sender never reaches the filter or the port
//! - If any credential in NETWORK_CREDENTIALS defers, the whole packet
//!   is deferred; credentials already applied stay applied (adding them
//!   again is redundant, not harmful)
//!
//! ## Last Modified
//! v0.1.0 - Initial network-level handlers

use std::sync::Arc;

use tracing::{debug, trace};

use vlink_common::types::{Address, Mac, MulticastGroup, NetworkId};
use vlink_core::credential::{CertificateOfMembership, Credential};
use vlink_core::filter::{CopyTarget, FrameMeta, Verdict};
use vlink_core::protocol::messages::{
    ExtFrame, Frame, GatherResult, MulticastFrame, MulticastGather, MulticastLike,
    NetworkCredentials, EXT_FRAME_FLAGS_REDIRECT, EXT_FRAME_FLAGS_TEE, EXT_FRAME_FLAGS_WATCH,
};
use vlink_core::protocol::{ErrorCode, Verb};
use vlink_core::wire::WireCodec;

use super::dispatcher::{Dispatcher, Inbound, ProcessResult, RejectReason};
use crate::services::{AddResult, Network};

impl Dispatcher {
    // ========================================
    // FRAME
    // ========================================

    pub(super) fn handle_frame(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let frame: Frame = match rx.decode() {
            Ok(frame) => frame,
            Err(result) => return result,
        };
        let network = match self.joined(rx, frame.nwid) {
            Ok(network) => network,
            Err(result) => return result,
        };
        if !self.gate(rx, &network) {
            return ProcessResult::Rejected(RejectReason::Unauthorized);
        }

        let nwid = network.nwid();
        let from = Mac::from_address(rx.source(), nwid);
        let to = Mac::from_address(self.topology.local_address(), nwid);
        self.filter_and_deliver(rx, &network, from, to, frame.ether_type, &frame.data)
    }

    pub(super) fn handle_ext_frame(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let frame: ExtFrame = match rx.decode() {
            Ok(frame) => frame,
            Err(result) => return result,
        };
        let network = match self.joined(rx, frame.nwid) {
            Ok(network) => network,
            Err(result) => return result,
        };
        if let Some(result) = self.add_inline_com(rx, &network, frame.com.clone()) {
            return result;
        }
        if !self.gate(rx, &network) {
            return ProcessResult::Rejected(RejectReason::Unauthorized);
        }

        // Filter copies carry the original sender's MAC
        let nwid = network.nwid();
        if !frame.is_filter_copy()
            && frame.from != Mac::from_address(rx.source(), nwid)
            && !network.permits_bridging(rx.source())
        {
            debug!(source = %rx.source(), nwid = %nwid, from = %frame.from, "Bridging not permitted");
            return ProcessResult::Rejected(RejectReason::Unauthorized);
        }

        let result =
            self.filter_and_deliver(rx, &network, frame.from, frame.to, frame.ether_type, &frame.data);
        if frame.wants_ack() && result.is_handled() {
            self.send_ok(rx, &nwid.as_u64().to_be_bytes());
        }
        result
    }

    pub(super) fn handle_multicast_frame(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let frame: MulticastFrame = match rx.decode() {
            Ok(frame) => frame,
            Err(result) => return result,
        };
        let network = match self.joined(rx, frame.nwid) {
            Ok(network) => network,
            Err(result) => return result,
        };
        if let Some(result) = self.add_inline_com(rx, &network, frame.com.clone()) {
            return result;
        }
        if !self.gate(rx, &network) {
            return ProcessResult::Rejected(RejectReason::Unauthorized);
        }

        let nwid = network.nwid();
        let own_mac = Mac::from_address(rx.source(), nwid);
        let from = frame.source_mac.unwrap_or(own_mac);
        if from != own_mac && !network.permits_bridging(rx.source()) {
            debug!(source = %rx.source(), nwid = %nwid, from = %from, "Bridging not permitted");
            return ProcessResult::Rejected(RejectReason::Unauthorized);
        }

        if let Some(limit) = frame.gather_limit {
            self.send_gather_reply(rx, &network, frame.group, limit);
        }

        let wanted = network.multicast().is_subscribed(frame.group)
            || (frame.group.mac.is_broadcast() && network.config().enable_broadcast());
        if !wanted {
            trace!(source = %rx.source(), nwid = %nwid, group = ?frame.group, "Unwanted multicast");
            self.send_error(rx, ErrorCode::UnwantedMulticast, Some(nwid));
            return ProcessResult::Handled;
        }

        self.filter_and_deliver(rx, &network, from, frame.group.mac, frame.ether_type, &frame.data)
    }

    // ========================================
    // NETWORK_CREDENTIALS
    // ========================================

    pub(super) fn handle_network_credentials(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let bundle: NetworkCredentials = match rx.decode() {
            Ok(bundle) => bundle,
            Err(result) => return result,
        };

        let mut deferred_on = None;
        for credential in bundle.into_credentials() {
            let nwid = credential.network_id();
            let Some(network) = self.network(nwid) else {
                trace!(source = %rx.source(), nwid = %nwid, "Credential for a network not joined");
                continue;
            };
            match network.add_credential(rx.source(), &credential, &*self.topology) {
                AddResult::AcceptedNew => trace!(
                    source = %rx.source(),
                    nwid = %nwid,
                    kind = credential.credential_type().as_str(),
                    "Credential accepted"
                ),
                AddResult::AcceptedRedundant => {}
                AddResult::Rejected => debug!(
                    source = %rx.source(),
                    nwid = %nwid,
                    kind = credential.credential_type().as_str(),
                    "Credential rejected"
                ),
                AddResult::DeferredForWhois => {
                    deferred_on.get_or_insert(credential.signer());
                }
            }
        }

        match deferred_on {
            Some(address) => ProcessResult::Deferred(address),
            None => ProcessResult::Handled,
        }
    }

    /// Sends our own credentials for `network` to `dest`, at most once
    /// per push interval. Returns `true` if a packet was sent.
    pub(crate) fn push_credentials(&self, network: &Network, dest: Address, now: i64) -> bool {
        if !network.try_claim_push(dest, now, self.config.limits.credential_push_gate_ms) {
            trace!(dest = %dest, nwid = %network.nwid(), "Credential push gated");
            return false;
        }
        let bundle = network.own_credentials();
        if bundle.is_empty() {
            return false;
        }
        self.send(dest, Verb::NetworkCredentials, &bundle.to_bytes());
        true
    }

    // ========================================
    // Multicast
    // ========================================

    pub(super) fn handle_multicast_like(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let like: MulticastLike = match rx.decode() {
            Ok(like) => like,
            Err(result) => return result,
        };

        for (nwid, group) in like.entries {
            let Some(network) = self.network(nwid) else {
                continue;
            };
            if network.is_allowed_or_authoritative(rx.source()) {
                network.multicast().like(group, rx.source(), rx.now);
            } else {
                self.send_error(rx, ErrorCode::NeedMembershipCertificate, Some(nwid));
            }
        }
        ProcessResult::Handled
    }

    pub(super) fn handle_multicast_gather(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let gather: MulticastGather = match rx.decode() {
            Ok(gather) => gather,
            Err(result) => return result,
        };
        let Some(network) = self.network(gather.nwid) else {
            trace!(source = %rx.source(), nwid = %gather.nwid, "GATHER for a network not joined");
            return ProcessResult::Handled;
        };
        if let Some(result) = self.add_inline_com(rx, &network, gather.com.clone()) {
            return result;
        }
        if !network.is_allowed_or_authoritative(rx.source()) {
            self.send_error(rx, ErrorCode::NeedMembershipCertificate, Some(gather.nwid));
            return ProcessResult::Rejected(RejectReason::Unauthorized);
        }

        self.send_gather_reply(rx, &network, gather.group, gather.limit);
        ProcessResult::Handled
    }

    fn send_gather_reply(&self, rx: &Inbound<'_>, network: &Network, group: MulticastGroup, limit: u32) {
        let limit = limit.min(self.config.limits.max_gather_results);
        if limit == 0 {
            return;
        }
        let (total, members) =
            network
                .multicast()
                .gather(group, limit as usize, rx.source(), rx.now);
        let reply = GatherResult {
            nwid: network.nwid(),
            group,
            total,
            members,
        };
        self.send_ok(rx, &reply.to_bytes());
    }

    // ========================================
    // Helpers
    // ========================================

    fn joined(&self, rx: &Inbound<'_>, nwid: NetworkId) -> Result<Arc<Network>, ProcessResult> {
        self.network(nwid).ok_or_else(|| {
            trace!(source = %rx.source(), nwid = %nwid, "Frame for a network not joined");
            ProcessResult::Rejected(RejectReason::Protocol)
        })
    }

    /// The gate, answering an ungated sender with a request for its COM.
    fn gate(&self, rx: &Inbound<'_>, network: &Network) -> bool {
        if network.is_allowed(rx.source()) {
            return true;
        }
        debug!(source = %rx.source(), nwid = %network.nwid(), "Sender not admitted, asking for COM");
        self.send_error(rx, ErrorCode::NeedMembershipCertificate, Some(network.nwid()));
        false
    }

    /// Offers a COM carried inside a frame or gather. Returns a result
    /// only if the packet must wait for the COM signer's identity.
    fn add_inline_com(
        &self,
        rx: &Inbound<'_>,
        network: &Network,
        com: Option<CertificateOfMembership>,
    ) -> Option<ProcessResult> {
        let credential = Credential::from(com?);
        match network.add_credential(rx.source(), &credential, &*self.topology) {
            AddResult::DeferredForWhois => Some(ProcessResult::Deferred(credential.signer())),
            _ => None,
        }
    }

    fn filter_and_deliver(
        &self,
        rx: &Inbound<'_>,
        network: &Network,
        from: Mac,
        to: Mac,
        ether_type: u16,
        data: &[u8],
    ) -> ProcessResult {
        let meta = FrameMeta {
            inbound: true,
            source: rx.source(),
            dest: self.topology.local_address(),
            mac_source: from,
            mac_dest: to,
            ether_type,
            vlan_id: 0,
            vlan_pcp: 0,
            vlan_dei: 0,
            data,
        };
        let decision = network.filter_incoming(rx.source(), &meta);
        let outcome = decision.outcome;

        if let Some(copy) = outcome.copy {
            self.send_filter_copy(network, copy, &meta);
        }

        match outcome.verdict {
            Verdict::Drop | Verdict::NoMatch => {
                debug!(
                    source = %rx.source(),
                    nwid = %network.nwid(),
                    ether_type,
                    "Frame denied by rules"
                );
                ProcessResult::Rejected(RejectReason::Unauthorized)
            }
            Verdict::Redirect(target) => {
                self.forward_frame(network, target, EXT_FRAME_FLAGS_REDIRECT, &meta, data.len());
                ProcessResult::Handled
            }
            Verdict::Accept | Verdict::SuperAccept => {
                match self
                    .port
                    .deliver_frame(network.nwid(), from, to, ether_type, 0, data)
                {
                    Ok(()) => self.stats.record_delivery(),
                    Err(e) => debug!(nwid = %network.nwid(), error = %e, "Port refused frame"),
                }
                trace!(
                    source = %rx.source(),
                    nwid = %network.nwid(),
                    capability = ?decision.capability,
                    len = data.len(),
                    "Frame delivered"
                );
                ProcessResult::Handled
            }
        }
    }

    fn send_filter_copy(&self, network: &Network, copy: CopyTarget, meta: &FrameMeta<'_>) {
        let flags = if copy.watch {
            EXT_FRAME_FLAGS_WATCH
        } else {
            EXT_FRAME_FLAGS_TEE
        };
        let length = match usize::from(copy.length) {
            0 => meta.data.len(),
            cap => cap.min(meta.data.len()),
        };
        self.forward_frame(network, copy.address, flags, meta, length);
    }

    /// Sends a filter-generated EXT_FRAME carrying our COM so the target
    /// admits it.
    fn forward_frame(
        &self,
        network: &Network,
        target: Address,
        flags: u8,
        meta: &FrameMeta<'_>,
        length: usize,
    ) {
        let frame = ExtFrame {
            nwid: network.nwid(),
            flags,
            com: network.config().com.clone(),
            to: meta.mac_dest,
            from: meta.mac_source,
            ether_type: meta.ether_type,
            data: meta.data[..length].to_vec(),
        };
        trace!(target = %target, nwid = %network.nwid(), flags, "Forwarding filter copy");
        self.send(target, Verb::ExtFrame, &frame.to_bytes());
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vlink_common::time::now_millis;
    use vlink_common::types::{Address, Mac, MulticastGroup};
    use vlink_core::credential::Credential;
    use vlink_core::crypto::Identity;
    use vlink_core::netconf::NetworkConfig;
    use vlink_core::protocol::messages::{
        ErrorMessage, ExtFrame, Frame, GatherResult, MulticastFrame, MulticastGather,
        MulticastLike, NetworkCredentials, OkHeader, WhoisResult, EXT_FRAME_FLAGS_REDIRECT,
        EXT_FRAME_FLAGS_TEE,
    };
    use vlink_core::protocol::{ErrorCode, Verb};
    use vlink_core::rules::{Forward, Rule, RuleKind};
    use vlink_core::wire::{WireCodec, WireReader};

    use crate::handlers::{ProcessResult, RejectReason};
    use crate::services::{AddResult, Network};
    use crate::testing::{Harness, TestNetwork};

    const IPV4: u16 = 0x0800;

    fn accept_all() -> Vec<Rule> {
        vec![Rule::new(RuleKind::Accept)]
    }

    /// Joins `conf` and admits `remote` with a COM matching its timestamp.
    fn admit(h: &Harness, net: &TestNetwork, remote: &Identity, conf: NetworkConfig) -> Arc<Network> {
        h.learn(net.controller());
        h.learn(remote);
        let com = net.com(remote.address(), conf.timestamp);
        let network = h.join_config(conf);
        let added = network.add_credential(remote.address(), &Credential::from(com), &*h.topology);
        assert_eq!(added, AddResult::AcceptedNew);
        network
    }

    fn send<T: WireCodec>(h: &Harness, from: &Identity, verb: Verb, body: &T) -> ProcessResult {
        let packet = h.packet_from(from, verb, &body.to_bytes(), true);
        h.dispatcher.process_wire_packet(&packet, h.path())
    }

    fn frame(net: &TestNetwork, ether_type: u16, len: usize) -> Frame {
        Frame {
            nwid: net.nwid(),
            ether_type,
            data: vec![0x45; len],
        }
    }

    fn ok_body<T: WireCodec>(payload: &[u8]) -> (OkHeader, T) {
        let mut reader = WireReader::new(payload);
        let header = OkHeader::decode(&mut reader).unwrap();
        (header, T::decode(&mut reader).unwrap())
    }

    #[test]
    fn test_frame_without_membership_asks_for_com() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        h.learn(&remote);
        h.join(&net);

        let result = send(&h, &remote, Verb::Frame, &frame(&net, IPV4, 64));
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Unauthorized));
        assert_eq!(h.port.delivered_count(), 0);

        let errors = h.sender.take_verb(Verb::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].dest, remote.address());
        let error: ErrorMessage = errors[0].decode().unwrap();
        assert_eq!(error.code, ErrorCode::NeedMembershipCertificate);
        assert_eq!(error.nwid, Some(net.nwid()));
        assert_eq!(error.in_re_verb, Verb::Frame.as_u8());
    }

    #[test]
    fn test_frame_for_unjoined_network_rejected() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        h.learn(&remote);

        let result = send(&h, &remote, Verb::Frame, &frame(&net, IPV4, 64));
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Protocol));
        assert_eq!(h.sender.sent_count(), 0);
    }

    #[test]
    fn test_admitted_frame_delivered() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        let mut conf = net.config(h.local.address(), now_millis());
        conf.rules = accept_all();
        admit(&h, &net, &remote, conf);

        assert!(send(&h, &remote, Verb::Frame, &frame(&net, IPV4, 64)).is_handled());

        let delivered = h.port.take_delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].source, Mac::from_address(remote.address(), net.nwid()));
        assert_eq!(delivered[0].dest, Mac::from_address(h.local.address(), net.nwid()));
        assert_eq!(delivered[0].ether_type, IPV4);
        assert_eq!(h.dispatcher.stats().snapshot().frames_delivered, 1);
    }

    #[test]
    fn test_capability_admits_frame_base_rules_miss() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        h.learn(net.controller());
        h.learn(&remote);

        let now = now_millis();
        let mut conf = net.config(h.local.address(), now);
        conf.rules = vec![Rule::new(RuleKind::EtherType(0x86dd)), Rule::new(RuleKind::Accept)];
        let network = h.join_config(conf);

        let com_only = NetworkCredentials {
            coms: vec![net.com(remote.address(), now)],
            ..NetworkCredentials::default()
        };
        assert!(send(&h, &remote, Verb::NetworkCredentials, &com_only).is_handled());
        assert!(network.is_allowed(remote.address()));

        // IPv4 misses the base rules and there is no capability yet
        let result = send(&h, &remote, Verb::Frame, &frame(&net, IPV4, 64));
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Unauthorized));
        assert_eq!(h.port.delivered_count(), 0);

        let with_cap = NetworkCredentials {
            capabilities: vec![net.capability(7, remote.address(), now, accept_all())],
            ..NetworkCredentials::default()
        };
        assert!(send(&h, &remote, Verb::NetworkCredentials, &with_cap).is_handled());

        assert!(send(&h, &remote, Verb::Frame, &frame(&net, IPV4, 64)).is_handled());
        assert_eq!(h.port.delivered_count(), 1);

        let membership = network.membership(remote.address()).unwrap();
        assert!(membership.read().capability(&network.config(), 7).is_some());
    }

    #[test]
    fn test_credentials_deferred_until_controller_learned() {
        let root = Identity::generate();
        let h = Harness::with_config(&format!("[node]\nupstream = \"{}\"\n", root.address()));
        let net = TestNetwork::new();
        let remote = h.remote();
        h.learn(&root);
        h.learn(&remote);

        let now = now_millis();
        let network = h.join_config(net.config(h.local.address(), now));
        let bundle = NetworkCredentials {
            coms: vec![net.com(remote.address(), now)],
            ..NetworkCredentials::default()
        };

        let controller = net.controller().address();
        assert_eq!(
            send(&h, &remote, Verb::NetworkCredentials, &bundle),
            ProcessResult::Deferred(controller)
        );
        assert_eq!(
            send(&h, &remote, Verb::NetworkCredentials, &bundle),
            ProcessResult::Deferred(controller)
        );
        assert!(!network.is_allowed(remote.address()));
        assert_eq!(h.retry.pending_for(controller), 2);

        let whois = h.sender.take_verb(Verb::Whois);
        assert_eq!(whois.len(), 1);
        assert_eq!(whois[0].dest, root.address());

        let mut reply = OkHeader::new(Verb::Whois, 1).to_bytes().to_vec();
        reply.extend_from_slice(
            &WhoisResult {
                identities: vec![net.controller().to_public()],
            }
            .to_bytes(),
        );
        let ok = h.packet_from(&root, Verb::Ok, &reply, true);
        assert!(h.dispatcher.process_wire_packet(&ok, h.path()).is_handled());

        assert_eq!(h.retry.pending_for(controller), 0);
        assert!(network.is_allowed(remote.address()));
        assert_eq!(h.dispatcher.stats().snapshot().replayed, 2);
    }

    #[test]
    fn test_ext_frame_bridging_requires_permission() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        let mut conf = net.config(h.local.address(), now_millis());
        conf.rules = accept_all();
        admit(&h, &net, &remote, conf);

        let bridged = ExtFrame {
            nwid: net.nwid(),
            flags: 0,
            com: None,
            to: Mac::from_address(h.local.address(), net.nwid()),
            from: Mac::from_u64(0x02_aa_bb_cc_dd_ee),
            ether_type: IPV4,
            data: vec![1; 32],
        };
        let result = send(&h, &remote, Verb::ExtFrame, &bridged);
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Unauthorized));
        assert_eq!(h.port.delivered_count(), 0);

        // Filter copies carry someone else's MAC and skip the check
        let copy = ExtFrame {
            flags: EXT_FRAME_FLAGS_TEE,
            ..bridged
        };
        assert!(send(&h, &remote, Verb::ExtFrame, &copy).is_handled());
        assert_eq!(h.port.delivered_count(), 1);
    }

    #[test]
    fn test_ext_frame_from_active_bridge() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        let mut conf = net.config(h.local.address(), now_millis());
        conf.rules = accept_all();
        conf.active_bridges = vec![remote.address()];
        admit(&h, &net, &remote, conf);

        let bridged = ExtFrame {
            nwid: net.nwid(),
            flags: vlink_core::protocol::messages::EXT_FRAME_FLAG_ACK,
            com: None,
            to: Mac::from_address(h.local.address(), net.nwid()),
            from: Mac::from_u64(0x02_aa_bb_cc_dd_ee),
            ether_type: IPV4,
            data: vec![1; 32],
        };
        assert!(send(&h, &remote, Verb::ExtFrame, &bridged).is_handled());
        assert_eq!(h.port.take_delivered()[0].source, bridged.from);

        let oks = h.sender.take_verb(Verb::Ok);
        assert_eq!(oks.len(), 1);
        assert!(oks[0].payload.ends_with(&net.nwid().as_u64().to_be_bytes()));
    }

    #[test]
    fn test_ext_frame_inline_com_admits_sender() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        h.learn(net.controller());
        h.learn(&remote);
        let now = now_millis();
        let mut conf = net.config(h.local.address(), now);
        conf.rules = accept_all();
        let network = h.join_config(conf);

        let ext = ExtFrame {
            nwid: net.nwid(),
            flags: 0,
            com: Some(net.com(remote.address(), now)),
            to: Mac::from_address(h.local.address(), net.nwid()),
            from: Mac::from_address(remote.address(), net.nwid()),
            ether_type: IPV4,
            data: vec![7; 20],
        };
        assert!(send(&h, &remote, Verb::ExtFrame, &ext).is_handled());
        assert!(network.is_allowed(remote.address()));
        assert_eq!(h.port.delivered_count(), 1);
    }

    #[test]
    fn test_tee_rule_copies_frame() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        let watcher = Address::from_u64(0x11_2233_4455);
        let mut conf = net.config(h.local.address(), now_millis());
        conf.rules = vec![
            Rule::new(RuleKind::Tee(Forward {
                address: watcher,
                flags: 0,
                length: 4,
            })),
            Rule::new(RuleKind::Accept),
        ];
        let network = admit(&h, &net, &remote, conf);

        assert!(send(&h, &remote, Verb::Frame, &frame(&net, IPV4, 16)).is_handled());
        assert_eq!(h.port.delivered_count(), 1);

        let copies = h.sender.take_verb(Verb::ExtFrame);
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].dest, watcher);
        let copy: ExtFrame = copies[0].decode().unwrap();
        assert_eq!(copy.flags, EXT_FRAME_FLAGS_TEE);
        assert_eq!(copy.data.len(), 4);
        assert_eq!(copy.com, network.config().com);
        assert_eq!(copy.from, Mac::from_address(remote.address(), net.nwid()));
    }

    #[test]
    fn test_redirect_rule_forwards_instead_of_delivering() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        let target = Address::from_u64(0x11_2233_4466);
        let mut conf = net.config(h.local.address(), now_millis());
        conf.rules = vec![Rule::new(RuleKind::Redirect(Forward {
            address: target,
            flags: 0,
            length: 0,
        }))];
        admit(&h, &net, &remote, conf);

        assert!(send(&h, &remote, Verb::Frame, &frame(&net, IPV4, 16)).is_handled());
        assert_eq!(h.port.delivered_count(), 0);

        let redirected = h.sender.take_verb(Verb::ExtFrame);
        assert_eq!(redirected.len(), 1);
        assert_eq!(redirected[0].dest, target);
        let ext: ExtFrame = redirected[0].decode().unwrap();
        assert_eq!(ext.flags, EXT_FRAME_FLAGS_REDIRECT);
        assert_eq!(ext.data.len(), 16);
    }

    #[test]
    fn test_multicast_frame_unwanted_then_subscribed() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        let mut conf = net.config(h.local.address(), now_millis());
        conf.rules = accept_all();
        let network = admit(&h, &net, &remote, conf);

        let group = MulticastGroup::new(Mac::from_u64(0x01_00_5e_00_00_fb), 0);
        let mcast = MulticastFrame {
            nwid: net.nwid(),
            com: None,
            gather_limit: None,
            source_mac: None,
            group,
            ether_type: IPV4,
            data: vec![9; 40],
        };

        assert!(send(&h, &remote, Verb::MulticastFrame, &mcast).is_handled());
        assert_eq!(h.port.delivered_count(), 0);
        let errors = h.sender.take_verb(Verb::Error);
        let error: ErrorMessage = errors[0].decode().unwrap();
        assert_eq!(error.code, ErrorCode::UnwantedMulticast);
        assert_eq!(error.nwid, Some(net.nwid()));

        assert!(network.multicast().subscribe(group));
        assert!(send(&h, &remote, Verb::MulticastFrame, &mcast).is_handled());
        let delivered = h.port.take_delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].dest, group.mac);
        assert!(h.sender.take_verb(Verb::Error).is_empty());
    }

    #[test]
    fn test_broadcast_wanted_by_default() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        let mut conf = net.config(h.local.address(), now_millis());
        conf.rules = accept_all();
        admit(&h, &net, &remote, conf);

        let broadcast = MulticastFrame {
            nwid: net.nwid(),
            com: None,
            gather_limit: None,
            source_mac: None,
            group: MulticastGroup::BROADCAST,
            ether_type: 0x0806,
            data: vec![0; 28],
        };
        assert!(send(&h, &remote, Verb::MulticastFrame, &broadcast).is_handled());
        assert_eq!(h.port.delivered_count(), 1);
    }

    #[test]
    fn test_like_then_gather_on_authoritative_node() {
        let h = Harness::with_config("[node]\nauthoritative = true\n");
        let net = TestNetwork::new();
        let liker = h.remote();
        let asker = h.remote();
        h.learn(&liker);
        h.learn(&asker);
        h.join(&net);

        let group = MulticastGroup::new(Mac::from_u64(0x33_33_00_00_00_01), 0);
        let like = MulticastLike {
            entries: vec![(net.nwid(), group)],
        };
        assert!(send(&h, &liker, Verb::MulticastLike, &like).is_handled());
        assert!(h.sender.take_verb(Verb::Error).is_empty());

        let gather = MulticastGather {
            nwid: net.nwid(),
            group,
            limit: 10,
            com: None,
        };
        assert!(send(&h, &asker, Verb::MulticastGather, &gather).is_handled());

        let oks = h.sender.take_verb(Verb::Ok);
        assert_eq!(oks.len(), 1);
        let (header, result): (OkHeader, GatherResult) = ok_body(&oks[0].payload);
        assert_eq!(header.in_re_verb, Verb::MulticastGather.as_u8());
        assert_eq!(result.nwid, net.nwid());
        assert_eq!(result.total, 1);
        assert_eq!(result.members, vec![liker.address()]);
    }

    #[test]
    fn test_like_from_non_member_refused() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        h.learn(&remote);
        let network = h.join(&net);

        let group = MulticastGroup::new(Mac::from_u64(0x33_33_00_00_00_02), 0);
        let like = MulticastLike {
            entries: vec![(net.nwid(), group)],
        };
        assert!(send(&h, &remote, Verb::MulticastLike, &like).is_handled());
        assert_eq!(network.multicast().member_count(group, now_millis()), 0);

        let error: ErrorMessage = h.sender.take_verb(Verb::Error)[0].decode().unwrap();
        assert_eq!(error.code, ErrorCode::NeedMembershipCertificate);
    }

    #[test]
    fn test_com_request_pushes_credentials_once_per_interval() {
        let h = Harness::new();
        let net = TestNetwork::new();
        let remote = h.remote();
        h.learn(&remote);
        let network = h.join(&net);

        let request = ErrorMessage::new(
            Verb::Frame,
            5,
            ErrorCode::NeedMembershipCertificate,
            Some(net.nwid()),
        )
        .to_bytes();
        let first = h.packet_from(&remote, Verb::Error, &request, true);
        let second = h.packet_from(&remote, Verb::Error, &request, true);
        let third = h.packet_from(&remote, Verb::Error, &request, true);
        assert!(h.dispatcher.process_at(&first, h.path(), 50_000).is_handled());
        assert!(h.dispatcher.process_at(&second, h.path(), 50_100).is_handled());

        let pushed = h.sender.take_verb(Verb::NetworkCredentials);
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].dest, remote.address());
        let bundle: NetworkCredentials = pushed[0].decode().unwrap();
        assert_eq!(bundle.coms.first(), network.config().com.as_ref());

        let interval = h.config.limits.credential_push_gate_ms;
        assert!(h.dispatcher.process_at(&third, h.path(), 50_000 + interval).is_handled());
        assert_eq!(h.sender.take_verb(Verb::NetworkCredentials).len(), 1);
    }
}
