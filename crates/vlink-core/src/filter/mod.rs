// ============================================
// File: crates/vlink-core/src/filter/mod.rs
// ============================================
//! # Filter / Rule Engine
//!
//! ## Creation Reason
//! Decides whether one frame from an admitted member may be delivered.
//! Wrong answers either admit unauthorized traffic or drop legitimate
//! traffic, so the evaluation order below is load-bearing.
//!
//! ## Main Functionality
//! - `run`: evaluate one rule table against one frame
//! - `filter_incoming`: base rules first, then the sender's capabilities
//! - `Verdict`, `FilterOutcome`: the result, including TEE/WATCH copy
//!   targets and QoS bucket
//!
//! ## Evaluation
//! ```text
//! acc = true
//! for rule in table:
//!   ACTION:
//!     acc  → fire (DROP/ACCEPT/PRIORITY/REDIRECT/BREAK return,
//!            TEE/WATCH record a copy and continue)
//!     !acc → acc = true (next clause)
//!   MATCH:
//!     !acc && !OR → skip (the clause can no longer hold)
//!     m = test(rule) ^ NOT
//!     acc = OR ? acc | m : acc & m
//! end of table → NoMatch (default deny)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NOT is applied to the single match result before it is combined
//! - `NoMatch` is a drop; only `filter_incoming` distinguishes it from an
//!   explicit DROP, and only to decide whether capabilities are consulted
//! - Capabilities are evaluated in ascending id order; a DROP inside one
//!   ends that capability only
//!
//! ## Last Modified
//! v0.1.0 - Initial filter engine

pub mod frame;

use std::net::IpAddr;

use tracing::trace;

use vlink_common::types::{Address, Mac};

use crate::credential::{Capability, Thing};
use crate::netconf::NetworkConfig;
use crate::rules::{characteristics, Forward, Rule, RuleKind, TagMatch};
use crate::rules::{ICMP_FLAG_CHECK_CODE, INTEGER_RANGE_LITTLE_ENDIAN};

use frame::{ClaimedSource, ETHERTYPE_IPV4, ETHERTYPE_IPV6};

// ============================================
// Constants
// ============================================

/// QoS bucket used when no PRIORITY action fired.
pub const DEFAULT_QOS_BUCKET: u8 = 4;

/// Highest valid QoS bucket.
pub const MAX_QOS_BUCKET: u8 = 8;

// ============================================
// Inputs
// ============================================

/// Credentials the remote member has presented, as seen by the filter.
///
/// Implementations must only expose credentials that are currently valid
/// (in the timestamp window and not revoked).
pub trait RemoteCredentials {
    /// Value of the member's tag `id`.
    fn tag_value(&self, id: u32) -> Option<u32>;

    /// Returns `true` if the member holds a COO for `thing`.
    fn owns(&self, thing: &Thing) -> bool;
}

/// The frame being filtered.
#[derive(Debug, Clone, Copy)]
pub struct FrameMeta<'a> {
    /// `true` if the frame arrives from the network.
    pub inbound: bool,
    /// Overlay address of the sender.
    pub source: Address,
    /// Overlay address of the receiver.
    pub dest: Address,
    /// Ethernet source MAC.
    pub mac_source: Mac,
    /// Ethernet destination MAC.
    pub mac_dest: Mac,
    /// Ethernet type.
    pub ether_type: u16,
    /// VLAN id, 0 if untagged.
    pub vlan_id: u16,
    /// VLAN priority code point.
    pub vlan_pcp: u8,
    /// VLAN drop eligible indicator.
    pub vlan_dei: u8,
    /// Ethernet payload.
    pub data: &'a [u8],
}

/// Everything besides the frame that rules may consult.
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    /// This node's address.
    pub local_address: Address,
    /// Network configuration (local tags, COOs and flags).
    pub config: &'a NetworkConfig,
    /// The remote member's credentials, if it has a membership.
    pub remote: Option<&'a dyn RemoteCredentials>,
}

// ============================================
// Outputs
// ============================================

/// Final decision for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// An explicit DROP fired.
    Drop,
    /// No action fired, or BREAK; treated as a drop.
    NoMatch,
    /// Deliver.
    Accept,
    /// Deliver; this node is the TEE/WATCH/REDIRECT target.
    SuperAccept,
    /// Send to the given node instead of delivering.
    Redirect(Address),
}

impl Verdict {
    /// Returns `true` if the frame must not be delivered or forwarded.
    #[must_use]
    pub const fn is_drop(&self) -> bool {
        matches!(self, Self::Drop | Self::NoMatch)
    }

    /// Returns `true` if the frame is delivered locally.
    #[must_use]
    pub const fn is_accept(&self) -> bool {
        matches!(self, Self::Accept | Self::SuperAccept)
    }
}

/// Copy of the frame requested by TEE or WATCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyTarget {
    /// Receiver of the copy.
    pub address: Address,
    /// Bytes to copy; 0 copies the whole frame.
    pub length: u16,
    /// `true` for WATCH.
    pub watch: bool,
}

/// Result of evaluating one rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Decision.
    pub verdict: Verdict,
    /// Last TEE/WATCH target recorded before the decision.
    pub copy: Option<CopyTarget>,
    /// QoS bucket (0..=8).
    pub qos_bucket: u8,
}

impl FilterOutcome {
    const fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            copy: None,
            qos_bucket: DEFAULT_QOS_BUCKET,
        }
    }
}

/// Result of `filter_incoming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingDecision {
    /// Decision and side outputs.
    pub outcome: FilterOutcome,
    /// Id of the capability that granted the frame, if any.
    pub capability: Option<u32>,
}

// ============================================
// Entry Points
// ============================================

/// Evaluates one rule table against `frame`.
#[must_use]
pub fn run(ctx: &FilterContext<'_>, frame: &FrameMeta<'_>, rules: &[Rule]) -> FilterOutcome {
    Evaluator::new(ctx, frame).run(rules)
}

/// Filters an inbound frame: base rules, then capabilities.
///
/// `capabilities` must yield the sender's valid capabilities in
/// ascending id order.
#[must_use]
pub fn filter_incoming<'c>(
    ctx: &FilterContext<'_>,
    frame: &FrameMeta<'_>,
    capabilities: impl IntoIterator<Item = &'c Capability>,
) -> IncomingDecision {
    let base = run(ctx, frame, &ctx.config.rules);
    match base.verdict {
        Verdict::Drop => IncomingDecision {
            outcome: FilterOutcome::new(Verdict::Drop),
            capability: None,
        },
        Verdict::Accept | Verdict::SuperAccept | Verdict::Redirect(_) => IncomingDecision {
            outcome: base,
            capability: None,
        },
        Verdict::NoMatch => {
            for cap in capabilities {
                let outcome = run(ctx, frame, cap.rules());
                if !outcome.verdict.is_drop() {
                    trace!(
                        capability = cap.id(),
                        source = %frame.source,
                        "Frame granted by capability"
                    );
                    return IncomingDecision {
                        outcome,
                        capability: Some(cap.id()),
                    };
                }
            }
            IncomingDecision {
                outcome: FilterOutcome::new(Verdict::NoMatch),
                capability: None,
            }
        }
    }
}

// ============================================
// Evaluator
// ============================================

struct Evaluator<'a> {
    ctx: &'a FilterContext<'a>,
    frame: &'a FrameMeta<'a>,
    super_accept: bool,
    ownership: Option<u64>,
}

impl<'a> Evaluator<'a> {
    fn new(ctx: &'a FilterContext<'a>, frame: &'a FrameMeta<'a>) -> Self {
        Self {
            ctx,
            frame,
            super_accept: false,
            ownership: None,
        }
    }

    fn run(mut self, rules: &[Rule]) -> FilterOutcome {
        let mut outcome = FilterOutcome::new(Verdict::NoMatch);
        let mut clause = true;

        for rule in rules {
            if rule.kind.is_action() {
                if !clause {
                    // Being the target of a forward that did not fire
                    // still means the sender meant us to see the frame.
                    if self.frame.inbound {
                        if let Some(fwd) = forward_of(&rule.kind) {
                            if fwd.address == self.ctx.local_address {
                                self.super_accept = true;
                            }
                        }
                    }
                    clause = true;
                    continue;
                }

                match &rule.kind {
                    RuleKind::Drop => {
                        outcome.verdict = Verdict::Drop;
                        return outcome;
                    }
                    RuleKind::Accept => {
                        outcome.verdict = if self.super_accept {
                            Verdict::SuperAccept
                        } else {
                            Verdict::Accept
                        };
                        return outcome;
                    }
                    RuleKind::Priority(bucket) => {
                        outcome.qos_bucket = if *bucket <= MAX_QOS_BUCKET {
                            *bucket
                        } else {
                            DEFAULT_QOS_BUCKET
                        };
                        outcome.verdict = Verdict::Accept;
                        return outcome;
                    }
                    RuleKind::Break => {
                        outcome.verdict = Verdict::NoMatch;
                        return outcome;
                    }
                    RuleKind::Tee(fwd) | RuleKind::Watch(fwd) | RuleKind::Redirect(fwd) => {
                        let target = fwd.address;
                        if target == self.frame.source {
                            continue;
                        }
                        if target == self.ctx.local_address {
                            if self.frame.inbound {
                                outcome.verdict = Verdict::SuperAccept;
                                return outcome;
                            }
                            continue;
                        }
                        if target == self.frame.dest {
                            continue;
                        }
                        if let RuleKind::Redirect(_) = rule.kind {
                            outcome.verdict = Verdict::Redirect(target);
                            return outcome;
                        }
                        outcome.copy = Some(CopyTarget {
                            address: target,
                            length: fwd.length,
                            watch: matches!(rule.kind, RuleKind::Watch(_)),
                        });
                    }
                    // Unknown actions are no-ops
                    _ => {}
                }
                continue;
            }

            if !clause && !rule.or {
                continue;
            }

            let matched = self.test(&rule.kind) ^ rule.not;
            clause = if rule.or {
                clause | matched
            } else {
                clause & matched
            };
        }

        outcome
    }

    // ========================================
    // Match Tests
    // ========================================

    fn test(&mut self, kind: &RuleKind) -> bool {
        let f = self.frame;
        let data = f.data;
        match kind {
            RuleKind::SourceAddress(a) => f.source == *a,
            RuleKind::DestAddress(a) => f.dest == *a,
            RuleKind::VlanId(v) => f.vlan_id == *v,
            RuleKind::VlanPcp(v) => f.vlan_pcp == *v,
            RuleKind::VlanDei(v) => f.vlan_dei == *v,
            RuleKind::MacSource(m) => f.mac_source == *m,
            RuleKind::MacDest(m) => f.mac_dest == *m,
            RuleKind::Ipv4Source { ip, prefix } => f.ether_type == ETHERTYPE_IPV4
                && frame::ipv4_source(data).is_some_and(|src| frame::ipv4_in(src, *ip, *prefix)),
            RuleKind::Ipv4Dest { ip, prefix } => f.ether_type == ETHERTYPE_IPV4
                && frame::ipv4_dest(data).is_some_and(|dst| frame::ipv4_in(dst, *ip, *prefix)),
            RuleKind::Ipv6Source { ip, prefix } => f.ether_type == ETHERTYPE_IPV6
                && frame::ipv6_source(data).is_some_and(|src| frame::ipv6_in(src, *ip, *prefix)),
            RuleKind::Ipv6Dest { ip, prefix } => f.ether_type == ETHERTYPE_IPV6
                && frame::ipv6_dest(data).is_some_and(|dst| frame::ipv6_in(dst, *ip, *prefix)),
            RuleKind::IpTos { mask, start, end } => frame::tos(f.ether_type, data)
                .is_some_and(|tos| (*start..=*end).contains(&(tos & mask))),
            RuleKind::IpProtocol(p) => {
                frame::transport(f.ether_type, data).is_some_and(|(proto, _)| proto == *p)
            }
            RuleKind::EtherType(t) => f.ether_type == *t,
            RuleKind::Icmp {
                icmp_type,
                code,
                flags,
            } => frame::icmp(f.ether_type, data).is_some_and(|(t, c)| {
                t == *icmp_type && (flags & ICMP_FLAG_CHECK_CODE == 0 || c == *code)
            }),
            RuleKind::SourcePortRange { start, end } => frame::ports(f.ether_type, data)
                .is_some_and(|(src, _)| (*start..=*end).contains(&src)),
            RuleKind::DestPortRange { start, end } => frame::ports(f.ether_type, data)
                .is_some_and(|(_, dst)| (*start..=*end).contains(&dst)),
            RuleKind::Characteristics(mask) => self.characteristics() & mask != 0,
            RuleKind::FrameSizeRange { start, end } => {
                (usize::from(*start)..=usize::from(*end)).contains(&data.len())
            }
            RuleKind::Random(p) => rand::random::<u32>() <= *p,
            RuleKind::TagsDifference(t)
            | RuleKind::TagsBitwiseAnd(t)
            | RuleKind::TagsBitwiseOr(t)
            | RuleKind::TagsBitwiseXor(t)
            | RuleKind::TagsEqual(t) => self.test_tag_pair(kind, *t),
            RuleKind::TagSender(t) | RuleKind::TagReceiver(t) => {
                self.test_tag_side(matches!(kind, RuleKind::TagSender(_)), *t)
            }
            RuleKind::IntegerRange(r) => {
                let bits = u32::from(r.format & 0x3f) + 1;
                let value = frame::integer_at(
                    data,
                    usize::from(r.idx),
                    bits,
                    r.format & INTEGER_RANGE_LITTLE_ENDIAN != 0,
                );
                value >= r.start && value <= r.start.saturating_add(u64::from(r.end))
            }
            RuleKind::UnknownMatch { .. } => self.ctx.config.unsupported_match_result(),
            // Actions never reach here
            _ => false,
        }
    }

    fn test_tag_pair(&self, kind: &RuleKind, t: TagMatch) -> bool {
        let Some(local) = self.ctx.config.tag(t.id).map(|tag| tag.value()) else {
            return false;
        };
        let Some(remote) = self.ctx.remote.and_then(|r| r.tag_value(t.id)) else {
            return !(self.frame.inbound && !self.super_accept);
        };
        match kind {
            RuleKind::TagsDifference(_) => local.abs_diff(remote) <= t.value,
            RuleKind::TagsBitwiseAnd(_) => (local & remote) == t.value,
            RuleKind::TagsBitwiseOr(_) => (local | remote) == t.value,
            RuleKind::TagsBitwiseXor(_) => (local ^ remote) == t.value,
            RuleKind::TagsEqual(_) => local == t.value && remote == t.value,
            _ => false,
        }
    }

    fn test_tag_side(&self, sender: bool, t: TagMatch) -> bool {
        if self.super_accept {
            return true;
        }
        // The remote member is the sender for inbound frames and the
        // receiver for outbound ones.
        if sender == self.frame.inbound {
            match self.ctx.remote.and_then(|r| r.tag_value(t.id)) {
                Some(value) => value == t.value,
                None => !sender,
            }
        } else {
            self.ctx
                .config
                .tag(t.id)
                .is_some_and(|tag| tag.value() == t.value)
        }
    }

    // ========================================
    // Characteristics
    // ========================================

    fn characteristics(&mut self) -> u64 {
        let f = self.frame;
        let mut cf = 0u64;
        if f.inbound {
            cf |= characteristics::INBOUND;
        }
        if f.mac_dest.is_multicast() {
            cf |= characteristics::MULTICAST;
        }
        if f.mac_dest.is_broadcast() {
            cf |= characteristics::BROADCAST;
        }
        cf |= self.ownership();
        cf | frame::tcp_flags(f.ether_type, f.data)
    }

    fn ownership(&mut self) -> u64 {
        if let Some(mask) = self.ownership {
            return mask;
        }

        let f = self.frame;
        let mut mask = 0u64;
        let claimed = frame::claimed_source(f.ether_type, f.data);
        if claimed == ClaimedSource::NeighborSolicitation {
            mask |= characteristics::SENDER_IP_AUTHENTICATED;
        }
        let ip_thing = match claimed {
            ClaimedSource::Ip(IpAddr::V4(ip)) => Some(Thing::Ipv4(ip)),
            ClaimedSource::Ip(IpAddr::V6(ip)) => Some(Thing::Ipv6(ip)),
            _ => None,
        };
        let mac_thing = Thing::Mac(f.mac_source);

        if f.inbound {
            if let Some(remote) = self.ctx.remote {
                if ip_thing.is_some_and(|t| remote.owns(&t)) {
                    mask |= characteristics::SENDER_IP_AUTHENTICATED;
                }
                if remote.owns(&mac_thing) {
                    mask |= characteristics::SENDER_MAC_AUTHENTICATED;
                }
            }
        } else {
            for coo in &self.ctx.config.coos {
                if ip_thing.is_some_and(|t| coo.owns(&t)) {
                    mask |= characteristics::SENDER_IP_AUTHENTICATED;
                }
                if coo.owns(&mac_thing) {
                    mask |= characteristics::SENDER_MAC_AUTHENTICATED;
                }
            }
        }

        self.ownership = Some(mask);
        mask
    }
}

fn forward_of(kind: &RuleKind) -> Option<&Forward> {
    match kind {
        RuleKind::Tee(f) | RuleKind::Watch(f) | RuleKind::Redirect(f) => Some(f),
        _ => None,
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CertificateOfOwnership, Tag};
    use crate::netconf::FLAG_RULES_RESULT_OF_UNSUPPORTED_MATCH;
    use super::frame::tests::{ipv4_packet, ipv6_packet};
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use vlink_common::types::NetworkId;

    const LOCAL: Address = Address::from_u64(0x0a_0000_0001);
    const REMOTE: Address = Address::from_u64(0x0b_0000_0002);
    const THIRD: Address = Address::from_u64(0x0c_0000_0003);

    #[derive(Default)]
    struct Remote {
        tags: HashMap<u32, u32>,
        things: Vec<Thing>,
    }

    impl RemoteCredentials for Remote {
        fn tag_value(&self, id: u32) -> Option<u32> {
            self.tags.get(&id).copied()
        }

        fn owns(&self, thing: &Thing) -> bool {
            self.things.contains(thing)
        }
    }

    fn config(rules: Vec<Rule>) -> NetworkConfig {
        let mut conf = NetworkConfig::new(NetworkId::new(0x0102), LOCAL, 0);
        conf.rules = rules;
        conf
    }

    fn inbound<'a>(ether_type: u16, data: &'a [u8]) -> FrameMeta<'a> {
        FrameMeta {
            inbound: true,
            source: REMOTE,
            dest: LOCAL,
            mac_source: Mac::from_u64(0x02_0000_0000_02),
            mac_dest: Mac::from_u64(0x02_0000_0000_01),
            ether_type,
            vlan_id: 0,
            vlan_pcp: 0,
            vlan_dei: 0,
            data,
        }
    }

    fn eval(conf: &NetworkConfig, remote: Option<&Remote>, frame: &FrameMeta<'_>) -> FilterOutcome {
        let ctx = FilterContext {
            local_address: LOCAL,
            config: conf,
            remote: remote.map(|r| r as &dyn RemoteCredentials),
        };
        run(&ctx, frame, &conf.rules)
    }

    fn udp(dst_port: u16) -> Vec<u8> {
        let mut l4 = vec![0x30, 0x39];
        l4.extend_from_slice(&dst_port.to_be_bytes());
        l4.extend_from_slice(&[0, 8, 0, 0]);
        ipv4_packet(0x11, [10, 0, 0, 2], [10, 0, 0, 1], &l4)
    }

    fn m(kind: RuleKind) -> Rule {
        Rule::new(kind)
    }

    // ========================================
    // Core Semantics
    // ========================================

    #[test]
    fn test_default_deny() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);

        assert_eq!(eval(&config(vec![]), None, &frame).verdict, Verdict::NoMatch);
        let only_matches = config(vec![
            m(RuleKind::EtherType(ETHERTYPE_IPV4)),
            m(RuleKind::IpProtocol(0x11)),
        ]);
        let outcome = eval(&only_matches, None, &frame);
        assert_eq!(outcome.verdict, Verdict::NoMatch);
        assert!(outcome.verdict.is_drop());
        assert!(!outcome.verdict.is_accept());
    }

    #[test]
    fn test_clause_short_circuit() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let conf = config(vec![
            m(RuleKind::EtherType(ETHERTYPE_IPV4)),
            m(RuleKind::Drop),
            m(RuleKind::IpProtocol(0x11)),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Drop);
    }

    #[test]
    fn test_failed_clause_resets() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let conf = config(vec![
            m(RuleKind::EtherType(0x0806)),
            m(RuleKind::Drop),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);
    }

    #[test]
    fn test_not_or_combinations() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let holds = || m(RuleKind::EtherType(ETHERTYPE_IPV4));
        let fails = || m(RuleKind::EtherType(0x0806));

        // AND, no NOT: false clause stays false
        let conf = config(vec![holds(), fails(), m(RuleKind::Accept)]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::NoMatch);

        // AND with NOT: inverted failing match holds
        let conf = config(vec![holds(), fails().negate(), m(RuleKind::Accept)]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);

        // OR, no NOT: a holding OR branch revives a false clause
        let conf = config(vec![fails(), holds().or(), m(RuleKind::Accept)]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);

        // OR with NOT: NOT applies to the match before OR-combining, so a
        // negated holding match contributes false and cannot revive it
        let conf = config(vec![fails(), holds().negate().or(), m(RuleKind::Accept)]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::NoMatch);

        // ...while a negated failing match contributes true
        let conf = config(vec![fails(), fails().negate().or(), m(RuleKind::Accept)]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);
    }

    #[test]
    fn test_integer_range_reads_window_tail() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);

        // 16-bit big-endian UDP destination port at bytes 22..24
        let port = |start: u64, end: u32| {
            config(vec![
                m(RuleKind::IntegerRange(crate::rules::IntegerRange {
                    start,
                    end,
                    idx: 16,
                    format: 15,
                })),
                m(RuleKind::Accept),
            ])
        };
        assert_eq!(eval(&port(53, 0), None, &frame).verdict, Verdict::Accept);
        assert_eq!(eval(&port(50, 5), None, &frame).verdict, Verdict::Accept);
        assert_eq!(eval(&port(54, 10), None, &frame).verdict, Verdict::NoMatch);
    }

    #[test]
    fn test_break_and_priority() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);

        let conf = config(vec![m(RuleKind::Break), m(RuleKind::Accept)]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::NoMatch);

        let conf = config(vec![m(RuleKind::Priority(2))]);
        let outcome = eval(&conf, None, &frame);
        assert_eq!(outcome.verdict, Verdict::Accept);
        assert_eq!(outcome.qos_bucket, 2);

        let conf = config(vec![m(RuleKind::Priority(200))]);
        assert_eq!(eval(&conf, None, &frame).qos_bucket, DEFAULT_QOS_BUCKET);
    }

    #[test]
    fn test_unknown_action_is_noop_and_unknown_match_uses_flag() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let unknown = || {
            m(RuleKind::UnknownMatch {
                kind: 60,
                value: vec![],
            })
        };

        let conf = config(vec![
            m(RuleKind::UnknownAction {
                kind: 12,
                value: vec![],
            }),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);

        let mut conf = config(vec![unknown(), m(RuleKind::Accept)]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::NoMatch);
        conf.flags |= FLAG_RULES_RESULT_OF_UNSUPPORTED_MATCH;
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);
    }

    // ========================================
    // Forwarding Actions
    // ========================================

    fn fwd(address: Address) -> Forward {
        Forward {
            address,
            flags: 0,
            length: 64,
        }
    }

    #[test]
    fn test_tee_records_copy_and_continues() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let conf = config(vec![m(RuleKind::Tee(fwd(THIRD))), m(RuleKind::Accept)]);
        let outcome = eval(&conf, None, &frame);
        assert_eq!(outcome.verdict, Verdict::Accept);
        assert_eq!(
            outcome.copy,
            Some(CopyTarget {
                address: THIRD,
                length: 64,
                watch: false
            })
        );
    }

    #[test]
    fn test_redirect_terminates() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let conf = config(vec![m(RuleKind::Redirect(fwd(THIRD))), m(RuleKind::Drop)]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Redirect(THIRD));
    }

    #[test]
    fn test_forward_to_self_super_accepts() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);

        // Forward target is this node: super-accept immediately
        let mut frame_to_other = frame;
        frame_to_other.dest = THIRD;
        let conf = config(vec![m(RuleKind::Watch(fwd(LOCAL))), m(RuleKind::Drop)]);
        assert_eq!(
            eval(&conf, None, &frame_to_other).verdict,
            Verdict::SuperAccept
        );

        // Non-firing forward naming this node upgrades a later ACCEPT
        let conf = config(vec![
            m(RuleKind::EtherType(0x0806)),
            m(RuleKind::Tee(fwd(LOCAL))),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::SuperAccept);
    }

    #[test]
    fn test_forward_to_source_or_dest_is_noop() {
        let pkt = udp(53);
        let mut frame = inbound(ETHERTYPE_IPV4, &pkt);
        frame.inbound = false;
        frame.source = LOCAL;
        frame.dest = THIRD;
        let conf = config(vec![
            m(RuleKind::Redirect(fwd(LOCAL))),
            m(RuleKind::Tee(fwd(THIRD))),
            m(RuleKind::Accept),
        ]);
        let outcome = eval(&conf, None, &frame);
        assert_eq!(outcome.verdict, Verdict::Accept);
        assert_eq!(outcome.copy, None);
    }

    // ========================================
    // Header Matches
    // ========================================

    #[test]
    fn test_ipv4_prefix_and_ports() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let conf = config(vec![
            m(RuleKind::Ipv4Source {
                ip: Ipv4Addr::new(10, 0, 0, 0),
                prefix: 24,
            }),
            m(RuleKind::DestPortRange { start: 53, end: 53 }),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);

        let pkt = udp(80);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::NoMatch);
    }

    #[test]
    fn test_ipv6_port_after_extension_headers() {
        let mut rest = vec![0x06, 0, 0, 0, 0, 0, 0, 0];
        let mut tcp = vec![0u8; 20];
        tcp[2..4].copy_from_slice(&443u16.to_be_bytes());
        tcp[13] = 0x02;
        rest.extend_from_slice(&tcp);
        let pkt = ipv6_packet(0, &rest);
        let frame = inbound(ETHERTYPE_IPV6, &pkt);

        let conf = config(vec![
            m(RuleKind::IpProtocol(0x06)),
            m(RuleKind::DestPortRange {
                start: 443,
                end: 443,
            }),
            m(RuleKind::Characteristics(0x02)),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);
    }

    #[test]
    fn test_truncated_frame_never_matches_header_rules() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt[..12]);
        let conf = config(vec![
            m(RuleKind::Ipv4Source {
                ip: Ipv4Addr::new(0, 0, 0, 0),
                prefix: 0,
            }),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::NoMatch);
    }

    #[test]
    fn test_characteristics_inbound_and_ownership() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let conf = config(vec![
            m(RuleKind::Characteristics(characteristics::SENDER_IP_AUTHENTICATED)),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::NoMatch);

        let remote = Remote {
            things: vec![Thing::Ipv4(Ipv4Addr::new(10, 0, 0, 2))],
            ..Remote::default()
        };
        assert_eq!(eval(&conf, Some(&remote), &frame).verdict, Verdict::Accept);

        let inbound_only = config(vec![
            m(RuleKind::Characteristics(characteristics::INBOUND)),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&inbound_only, None, &frame).verdict, Verdict::Accept);
    }

    #[test]
    fn test_outbound_ownership_uses_own_coos() {
        let pkt = udp(53);
        let mut frame = inbound(ETHERTYPE_IPV4, &pkt);
        frame.inbound = false;
        let mut conf = config(vec![
            m(RuleKind::Characteristics(characteristics::SENDER_MAC_AUTHENTICATED)),
            m(RuleKind::Accept),
        ]);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::NoMatch);

        let mut coo = CertificateOfOwnership::new(1, conf.nwid, 0, LOCAL);
        coo.add_thing(frame.mac_source).unwrap();
        conf.coos.push(coo);
        assert_eq!(eval(&conf, None, &frame).verdict, Verdict::Accept);
    }

    // ========================================
    // Tags
    // ========================================

    #[test]
    fn test_tag_matches() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let mut conf = config(vec![
            m(RuleKind::TagsEqual(TagMatch { id: 1, value: 7 })),
            m(RuleKind::Accept),
        ]);
        conf.tags.push(Tag::new(1, 7, conf.nwid, 0, LOCAL));

        // Missing remote tag on an inbound frame is a non-match
        assert_eq!(
            eval(&conf, Some(&Remote::default()), &frame).verdict,
            Verdict::NoMatch
        );

        let mut remote = Remote::default();
        remote.tags.insert(1, 7);
        assert_eq!(eval(&conf, Some(&remote), &frame).verdict, Verdict::Accept);

        remote.tags.insert(1, 8);
        assert_eq!(eval(&conf, Some(&remote), &frame).verdict, Verdict::NoMatch);

        conf.rules[0] = m(RuleKind::TagsDifference(TagMatch { id: 1, value: 1 }));
        assert_eq!(eval(&conf, Some(&remote), &frame).verdict, Verdict::Accept);
    }

    #[test]
    fn test_tag_sender() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let conf = config(vec![
            m(RuleKind::TagSender(TagMatch { id: 4, value: 1 })),
            m(RuleKind::Accept),
        ]);
        let mut remote = Remote::default();
        assert_eq!(eval(&conf, Some(&remote), &frame).verdict, Verdict::NoMatch);
        remote.tags.insert(4, 1);
        assert_eq!(eval(&conf, Some(&remote), &frame).verdict, Verdict::Accept);
    }

    // ========================================
    // Capabilities
    // ========================================

    #[test]
    fn test_capability_grants_are_additive() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        // Base rules only accept ARP
        let conf = config(vec![m(RuleKind::EtherType(0x0806)), m(RuleKind::Accept)]);
        let ctx = FilterContext {
            local_address: LOCAL,
            config: &conf,
            remote: None,
        };

        let deny_all = Capability::new(3, conf.nwid, 0, REMOTE, vec![m(RuleKind::Drop)]).unwrap();
        let ipv4 = Capability::new(
            7,
            conf.nwid,
            0,
            REMOTE,
            vec![m(RuleKind::EtherType(ETHERTYPE_IPV4)), m(RuleKind::Accept)],
        )
        .unwrap();

        assert_eq!(
            filter_incoming(&ctx, &frame, []).outcome.verdict,
            Verdict::NoMatch
        );
        let decision = filter_incoming(&ctx, &frame, [&deny_all, &ipv4]);
        assert_eq!(decision.outcome.verdict, Verdict::Accept);
        assert_eq!(decision.capability, Some(7));
    }

    #[test]
    fn test_explicit_base_drop_is_final() {
        let pkt = udp(53);
        let frame = inbound(ETHERTYPE_IPV4, &pkt);
        let conf = config(vec![m(RuleKind::Drop)]);
        let ctx = FilterContext {
            local_address: LOCAL,
            config: &conf,
            remote: None,
        };
        let accept_all =
            Capability::new(1, conf.nwid, 0, REMOTE, vec![m(RuleKind::Accept)]).unwrap();
        let decision = filter_incoming(&ctx, &frame, [&accept_all]);
        assert_eq!(decision.outcome.verdict, Verdict::Drop);
        assert_eq!(decision.capability, None);
    }
}
