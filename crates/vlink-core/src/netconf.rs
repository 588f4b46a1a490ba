// ============================================
// File: crates/vlink-core/src/netconf.rs
// ============================================
//! # Network Configuration
//!
//! ## Creation Reason
//! The controller hands every member a configuration: the base rule
//! table, the member's own credentials and the timing parameters used to
//! judge other members' credentials. Membership checks and the filter
//! both read it.
//!
//! ## Main Functionality
//! - `NetworkConfig`: the applied configuration snapshot
//! - Flag helpers (broadcast, bridging, unsupported-match result)
//!
//! ## ⚠️ Important Note for Next Developer
//! - A config is replaced wholesale, never mutated in place; callers hold
//!   it behind an `Arc` and swap it
//!
//! ## Last Modified
//! v0.1.0 - Initial network configuration

use vlink_common::types::{Address, NetworkId};

use crate::credential::{Capability, CertificateOfMembership, CertificateOfOwnership, Tag};
use crate::rules::Rule;

// ============================================
// Constants
// ============================================

/// Any member may bridge.
pub const FLAG_ALLOW_PASSIVE_BRIDGING: u64 = 0x01;

/// Ethernet broadcast is delivered.
pub const FLAG_ENABLE_BROADCAST: u64 = 0x02;

/// Rule matches this node does not understand evaluate to true.
pub const FLAG_RULES_RESULT_OF_UNSUPPORTED_MATCH: u64 = 0x08;

/// Default tolerated credential timestamp skew (2 hours).
pub const DEFAULT_CREDENTIAL_TIME_MAX_DELTA: i64 = 2 * 60 * 60 * 1000;

/// Default multicast recipient limit.
pub const DEFAULT_MULTICAST_LIMIT: u32 = 32;

// ============================================
// NetworkConfig
// ============================================

/// Configuration of one joined network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network id.
    pub nwid: NetworkId,
    /// Controller timestamp of this revision.
    pub timestamp: i64,
    /// Maximum skew between `timestamp` and a live credential.
    pub credential_time_max_delta: i64,
    /// Revision counter.
    pub revision: u64,
    /// Member this config was issued to.
    pub issued_to: Address,
    /// Human readable name.
    pub name: String,
    /// Private networks require a COM from every member.
    pub private: bool,
    /// `FLAG_*` bits.
    pub flags: u64,
    /// Maximum multicast recipients per frame.
    pub multicast_limit: u32,
    /// Base rule table.
    pub rules: Vec<Rule>,
    /// This member's capabilities, ascending by id.
    pub capabilities: Vec<Capability>,
    /// This member's tags.
    pub tags: Vec<Tag>,
    /// This member's ownership certificates.
    pub coos: Vec<CertificateOfOwnership>,
    /// This member's certificate of membership.
    pub com: Option<CertificateOfMembership>,
    /// Members allowed to bridge.
    pub active_bridges: Vec<Address>,
}

impl NetworkConfig {
    /// Creates an empty private configuration.
    #[must_use]
    pub fn new(nwid: NetworkId, issued_to: Address, timestamp: i64) -> Self {
        Self {
            nwid,
            timestamp,
            credential_time_max_delta: DEFAULT_CREDENTIAL_TIME_MAX_DELTA,
            revision: 1,
            issued_to,
            name: String::new(),
            private: true,
            flags: FLAG_ENABLE_BROADCAST,
            multicast_limit: DEFAULT_MULTICAST_LIMIT,
            rules: Vec::new(),
            capabilities: Vec::new(),
            tags: Vec::new(),
            coos: Vec::new(),
            com: None,
            active_bridges: Vec::new(),
        }
    }

    /// Address of the network's controller.
    #[must_use]
    pub const fn controller(&self) -> Address {
        self.nwid.controller()
    }

    /// Returns `true` if members need no COM.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        !self.private
    }

    /// Returns `true` if Ethernet broadcast is delivered.
    #[must_use]
    pub const fn enable_broadcast(&self) -> bool {
        self.flags & FLAG_ENABLE_BROADCAST != 0
    }

    /// Result used for rule matches this node does not understand.
    #[must_use]
    pub const fn unsupported_match_result(&self) -> bool {
        self.flags & FLAG_RULES_RESULT_OF_UNSUPPORTED_MATCH != 0
    }

    /// Returns `true` if `member` may send frames for MACs it does not own.
    #[must_use]
    pub fn permits_bridging(&self, member: Address) -> bool {
        self.flags & FLAG_ALLOW_PASSIVE_BRIDGING != 0 || self.active_bridges.contains(&member)
    }

    /// This member's tag with the given id.
    #[must_use]
    pub fn tag(&self, id: u32) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id() == id)
    }

    /// Returns `true` if `timestamp` is within the allowed skew.
    #[must_use]
    pub const fn timestamp_in_window(&self, timestamp: i64) -> bool {
        self.timestamp.abs_diff(timestamp) <= self.credential_time_max_delta.unsigned_abs()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_flags() {
        let nwid = NetworkId::from_controller(Address::from_u64(0x11_2233_4455), 7);
        let mut conf = NetworkConfig::new(nwid, Address::from_u64(9), 1_000);
        assert_eq!(conf.controller(), Address::from_u64(0x11_2233_4455));
        assert!(!conf.is_public());
        assert!(conf.enable_broadcast());
        assert!(!conf.unsupported_match_result());
        assert!(!conf.permits_bridging(Address::from_u64(3)));

        conf.active_bridges.push(Address::from_u64(3));
        assert!(conf.permits_bridging(Address::from_u64(3)));

        conf.flags |= FLAG_ALLOW_PASSIVE_BRIDGING;
        assert!(conf.permits_bridging(Address::from_u64(4)));
    }

    #[test]
    fn test_timestamp_window() {
        let mut conf = NetworkConfig::new(NetworkId::new(1), Address::NIL, 10_000);
        conf.credential_time_max_delta = 500;
        assert!(conf.timestamp_in_window(10_500));
        assert!(conf.timestamp_in_window(9_500));
        assert!(!conf.timestamp_in_window(10_501));
        assert!(!conf.timestamp_in_window(9_499));
    }

    #[test]
    fn test_tag_lookup() {
        let nwid = NetworkId::new(1);
        let mut conf = NetworkConfig::new(nwid, Address::from_u64(9), 0);
        conf.tags.push(Tag::new(5, 50, nwid, 0, Address::from_u64(9)));
        assert_eq!(conf.tag(5).map(Tag::value), Some(50));
        assert!(conf.tag(6).is_none());
    }
}
