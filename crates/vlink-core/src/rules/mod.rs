// ============================================
// File: crates/vlink-core/src/rules/mod.rs
// ============================================
//! # Flow Rules
//!
//! ## Creation Reason
//! Network rule tables and capabilities are ordered sequences of rules.
//! This module defines the typed rule model and its wire codec; evaluation
//! lives in [`crate::filter`].
//!
//! ## Main Functionality
//! - `Rule`: NOT/OR flags plus a `RuleKind`
//! - `RuleKind`: every action and match the engine understands, plus
//!   opaque variants for kinds it does not
//! - `encode_rules` / `decode_rules`: counted rule lists
//!
//! ## Wire Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ type (1): 0x80 NOT | 0x40 OR | kind (6 bits) │
//! │ value length (1)                             │
//! │ value (length bytes)                         │
//! └──────────────────────────────────────────────┘
//! kinds 0..=15 are actions, 24..=51 are matches
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Unknown kinds must round-trip untouched; controllers may be newer
//!   than this node
//! - A value longer than the kind needs is accepted and the excess ignored
//!
//! ## Last Modified
//! v0.1.0 - Initial rule model

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, Mac};

use crate::error::{CoreError, Result};
use crate::wire::{PutWire, WireCodec, WireReader};

// ============================================
// Constants
// ============================================

/// Type byte bit: invert the match result.
pub const RULE_FLAG_NOT: u8 = 0x80;

/// Type byte bit: combine into the clause with OR instead of AND.
pub const RULE_FLAG_OR: u8 = 0x40;

/// Type byte mask for the rule kind.
pub const RULE_KIND_MASK: u8 = 0x3f;

/// Highest kind id that denotes an action.
pub const MAX_ACTION_KIND: u8 = 15;

/// Rule kind ids.
pub mod kind {
    #![allow(missing_docs)]

    pub const ACTION_DROP: u8 = 0;
    pub const ACTION_ACCEPT: u8 = 1;
    pub const ACTION_TEE: u8 = 2;
    pub const ACTION_WATCH: u8 = 3;
    pub const ACTION_REDIRECT: u8 = 4;
    pub const ACTION_BREAK: u8 = 5;
    pub const ACTION_PRIORITY: u8 = 6;

    pub const MATCH_SOURCE_ADDRESS: u8 = 24;
    pub const MATCH_DEST_ADDRESS: u8 = 25;
    pub const MATCH_VLAN_ID: u8 = 26;
    pub const MATCH_VLAN_PCP: u8 = 27;
    pub const MATCH_VLAN_DEI: u8 = 28;
    pub const MATCH_MAC_SOURCE: u8 = 29;
    pub const MATCH_MAC_DEST: u8 = 30;
    pub const MATCH_IPV4_SOURCE: u8 = 31;
    pub const MATCH_IPV4_DEST: u8 = 32;
    pub const MATCH_IPV6_SOURCE: u8 = 33;
    pub const MATCH_IPV6_DEST: u8 = 34;
    pub const MATCH_IP_TOS: u8 = 35;
    pub const MATCH_IP_PROTOCOL: u8 = 36;
    pub const MATCH_ETHERTYPE: u8 = 37;
    pub const MATCH_ICMP: u8 = 38;
    pub const MATCH_IP_SOURCE_PORT_RANGE: u8 = 39;
    pub const MATCH_IP_DEST_PORT_RANGE: u8 = 40;
    pub const MATCH_CHARACTERISTICS: u8 = 41;
    pub const MATCH_FRAME_SIZE_RANGE: u8 = 42;
    pub const MATCH_RANDOM: u8 = 43;
    pub const MATCH_TAGS_DIFFERENCE: u8 = 44;
    pub const MATCH_TAGS_BITWISE_AND: u8 = 45;
    pub const MATCH_TAGS_BITWISE_OR: u8 = 46;
    pub const MATCH_TAGS_BITWISE_XOR: u8 = 47;
    pub const MATCH_TAGS_EQUAL: u8 = 48;
    pub const MATCH_TAG_SENDER: u8 = 49;
    pub const MATCH_TAG_RECEIVER: u8 = 50;
    pub const MATCH_INTEGER_RANGE: u8 = 51;
}

/// Frame characteristic bits tested by `RuleKind::Characteristics`.
pub mod characteristics {
    /// Frame is inbound (from the network to this node).
    pub const INBOUND: u64 = 1 << 63;
    /// Destination MAC is multicast.
    pub const MULTICAST: u64 = 1 << 62;
    /// Destination MAC is broadcast.
    pub const BROADCAST: u64 = 1 << 61;
    /// Sender holds a COO for the frame's source IP.
    pub const SENDER_IP_AUTHENTICATED: u64 = 1 << 60;
    /// Sender holds a COO for the frame's source MAC.
    pub const SENDER_MAC_AUTHENTICATED: u64 = 1 << 59;
    /// Mask of the TCP flag bits (NS, CWR, ECE, URG, ACK, PSH, RST, SYN, FIN).
    pub const TCP_FLAGS_MASK: u64 = 0x0fff;
}

/// `IntegerRange.format` bit selecting little-endian extraction.
pub const INTEGER_RANGE_LITTLE_ENDIAN: u8 = 0x80;

/// `Icmp` flag bit: the code field must match too.
pub const ICMP_FLAG_CHECK_CODE: u8 = 0x01;

// ============================================
// Rule Values
// ============================================

/// Target of a TEE, WATCH or REDIRECT action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forward {
    /// Node that receives the copy or the redirected frame.
    pub address: Address,
    /// Action flags (reserved).
    pub flags: u32,
    /// Maximum number of frame bytes copied; 0 copies everything.
    pub length: u16,
}

/// Tag id and value compared by tag matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMatch {
    /// Tag id.
    pub id: u32,
    /// Operand value.
    pub value: u32,
}

/// Integer extracted from the frame and tested against a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerRange {
    /// Lowest accepted value.
    pub start: u64,
    /// Width of the range; highest accepted value is `start + end`.
    pub end: u32,
    /// Byte offset in the frame.
    pub idx: u16,
    /// Bit 0x80 little-endian; low 6 bits are bit width minus one.
    pub format: u8,
}

// ============================================
// RuleKind
// ============================================

/// What a rule does or tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    // ========================================
    // Actions
    // ========================================
    /// Drop the frame.
    Drop,
    /// Accept the frame.
    Accept,
    /// Send a copy and continue evaluating.
    Tee(Forward),
    /// Send a copy that is also delivered to the original target.
    Watch(Forward),
    /// Send the frame elsewhere instead of its destination.
    Redirect(Forward),
    /// Stop evaluating this table without a verdict.
    Break,
    /// Accept with a QoS bucket.
    Priority(u8),
    /// An action this node does not understand; evaluated as a no-op.
    UnknownAction {
        /// Kind id.
        kind: u8,
        /// Raw value bytes.
        value: Vec<u8>,
    },

    // ========================================
    // Matches
    // ========================================
    /// Sending overlay address.
    SourceAddress(Address),
    /// Receiving overlay address.
    DestAddress(Address),
    /// 802.1Q VLAN id.
    VlanId(u16),
    /// 802.1Q priority code point.
    VlanPcp(u8),
    /// 802.1Q drop eligible indicator.
    VlanDei(u8),
    /// Ethernet source MAC.
    MacSource(Mac),
    /// Ethernet destination MAC.
    MacDest(Mac),
    /// IPv4 source within a prefix.
    Ipv4Source {
        /// Network address.
        ip: Ipv4Addr,
        /// Prefix length in bits.
        prefix: u8,
    },
    /// IPv4 destination within a prefix.
    Ipv4Dest {
        /// Network address.
        ip: Ipv4Addr,
        /// Prefix length in bits.
        prefix: u8,
    },
    /// IPv6 source within a prefix.
    Ipv6Source {
        /// Network address.
        ip: Ipv6Addr,
        /// Prefix length in bits.
        prefix: u8,
    },
    /// IPv6 destination within a prefix.
    Ipv6Dest {
        /// Network address.
        ip: Ipv6Addr,
        /// Prefix length in bits.
        prefix: u8,
    },
    /// Masked ToS / traffic class within a range.
    IpTos {
        /// Mask applied to the ToS byte.
        mask: u8,
        /// Lowest accepted value.
        start: u8,
        /// Highest accepted value.
        end: u8,
    },
    /// IP protocol (IPv6: after walking extension headers).
    IpProtocol(u8),
    /// Ethernet type.
    EtherType(u16),
    /// ICMP / ICMPv6 type and optionally code.
    Icmp {
        /// ICMP type.
        icmp_type: u8,
        /// ICMP code.
        code: u8,
        /// `ICMP_FLAG_CHECK_CODE` to also test the code.
        flags: u8,
    },
    /// Transport source port within a range.
    SourcePortRange {
        /// Lowest accepted port.
        start: u16,
        /// Highest accepted port.
        end: u16,
    },
    /// Transport destination port within a range.
    DestPortRange {
        /// Lowest accepted port.
        start: u16,
        /// Highest accepted port.
        end: u16,
    },
    /// Any of the given characteristic bits present.
    Characteristics(u64),
    /// Frame length within a range.
    FrameSizeRange {
        /// Smallest accepted length.
        start: u16,
        /// Largest accepted length.
        end: u16,
    },
    /// Matches with probability `p / 2^32`.
    Random(u32),
    /// |local - remote| <= value.
    TagsDifference(TagMatch),
    /// (local & remote) == value.
    TagsBitwiseAnd(TagMatch),
    /// (local | remote) == value.
    TagsBitwiseOr(TagMatch),
    /// (local ^ remote) == value.
    TagsBitwiseXor(TagMatch),
    /// local == value and remote == value.
    TagsEqual(TagMatch),
    /// Sender's tag equals value.
    TagSender(TagMatch),
    /// Receiver's tag equals value.
    TagReceiver(TagMatch),
    /// Integer read from the frame within a range.
    IntegerRange(IntegerRange),
    /// A match this node does not understand.
    UnknownMatch {
        /// Kind id.
        kind: u8,
        /// Raw value bytes.
        value: Vec<u8>,
    },
}

impl RuleKind {
    /// Wire kind id.
    #[must_use]
    pub fn id(&self) -> u8 {
        use kind::*;
        match self {
            Self::Drop => ACTION_DROP,
            Self::Accept => ACTION_ACCEPT,
            Self::Tee(_) => ACTION_TEE,
            Self::Watch(_) => ACTION_WATCH,
            Self::Redirect(_) => ACTION_REDIRECT,
            Self::Break => ACTION_BREAK,
            Self::Priority(_) => ACTION_PRIORITY,
            Self::UnknownAction { kind, .. } | Self::UnknownMatch { kind, .. } => *kind,
            Self::SourceAddress(_) => MATCH_SOURCE_ADDRESS,
            Self::DestAddress(_) => MATCH_DEST_ADDRESS,
            Self::VlanId(_) => MATCH_VLAN_ID,
            Self::VlanPcp(_) => MATCH_VLAN_PCP,
            Self::VlanDei(_) => MATCH_VLAN_DEI,
            Self::MacSource(_) => MATCH_MAC_SOURCE,
            Self::MacDest(_) => MATCH_MAC_DEST,
            Self::Ipv4Source { .. } => MATCH_IPV4_SOURCE,
            Self::Ipv4Dest { .. } => MATCH_IPV4_DEST,
            Self::Ipv6Source { .. } => MATCH_IPV6_SOURCE,
            Self::Ipv6Dest { .. } => MATCH_IPV6_DEST,
            Self::IpTos { .. } => MATCH_IP_TOS,
            Self::IpProtocol(_) => MATCH_IP_PROTOCOL,
            Self::EtherType(_) => MATCH_ETHERTYPE,
            Self::Icmp { .. } => MATCH_ICMP,
            Self::SourcePortRange { .. } => MATCH_IP_SOURCE_PORT_RANGE,
            Self::DestPortRange { .. } => MATCH_IP_DEST_PORT_RANGE,
            Self::Characteristics(_) => MATCH_CHARACTERISTICS,
            Self::FrameSizeRange { .. } => MATCH_FRAME_SIZE_RANGE,
            Self::Random(_) => MATCH_RANDOM,
            Self::TagsDifference(_) => MATCH_TAGS_DIFFERENCE,
            Self::TagsBitwiseAnd(_) => MATCH_TAGS_BITWISE_AND,
            Self::TagsBitwiseOr(_) => MATCH_TAGS_BITWISE_OR,
            Self::TagsBitwiseXor(_) => MATCH_TAGS_BITWISE_XOR,
            Self::TagsEqual(_) => MATCH_TAGS_EQUAL,
            Self::TagSender(_) => MATCH_TAG_SENDER,
            Self::TagReceiver(_) => MATCH_TAG_RECEIVER,
            Self::IntegerRange(_) => MATCH_INTEGER_RANGE,
        }
    }

    /// Returns `true` for action kinds.
    #[must_use]
    pub fn is_action(&self) -> bool {
        self.id() <= MAX_ACTION_KIND
    }

    fn encode_value(&self, buf: &mut BytesMut) {
        match self {
            Self::Drop | Self::Accept | Self::Break => {}
            Self::Tee(f) | Self::Watch(f) | Self::Redirect(f) => {
                buf.put_u64(f.address.as_u64());
                buf.put_u32(f.flags);
                buf.put_u16(f.length);
            }
            Self::Priority(q) | Self::VlanPcp(q) | Self::VlanDei(q) | Self::IpProtocol(q) => {
                buf.put_u8(*q);
            }
            Self::UnknownAction { value, .. } | Self::UnknownMatch { value, .. } => {
                buf.put_slice(value);
            }
            Self::SourceAddress(a) | Self::DestAddress(a) => buf.put_address(*a),
            Self::VlanId(v) | Self::EtherType(v) => buf.put_u16(*v),
            Self::MacSource(m) | Self::MacDest(m) => buf.put_mac(*m),
            Self::Ipv4Source { ip, prefix } | Self::Ipv4Dest { ip, prefix } => {
                buf.put_slice(&ip.octets());
                buf.put_u8(*prefix);
            }
            Self::Ipv6Source { ip, prefix } | Self::Ipv6Dest { ip, prefix } => {
                buf.put_slice(&ip.octets());
                buf.put_u8(*prefix);
            }
            Self::IpTos { mask, start, end } => {
                buf.put_u8(*mask);
                buf.put_u8(*start);
                buf.put_u8(*end);
            }
            Self::Icmp {
                icmp_type,
                code,
                flags,
            } => {
                buf.put_u8(*icmp_type);
                buf.put_u8(*code);
                buf.put_u8(*flags);
            }
            Self::SourcePortRange { start, end }
            | Self::DestPortRange { start, end }
            | Self::FrameSizeRange { start, end } => {
                buf.put_u16(*start);
                buf.put_u16(*end);
            }
            Self::Characteristics(c) => buf.put_u64(*c),
            Self::Random(p) => buf.put_u32(*p),
            Self::TagsDifference(t)
            | Self::TagsBitwiseAnd(t)
            | Self::TagsBitwiseOr(t)
            | Self::TagsBitwiseXor(t)
            | Self::TagsEqual(t)
            | Self::TagSender(t)
            | Self::TagReceiver(t) => {
                buf.put_u32(t.id);
                buf.put_u32(t.value);
            }
            Self::IntegerRange(r) => {
                buf.put_u64(r.start);
                buf.put_u32(r.end);
                buf.put_u16(r.idx);
                buf.put_u8(r.format);
            }
        }
    }

    fn decode_value(kind_id: u8, value: &[u8]) -> Result<Self> {
        use kind::*;

        let mut r = WireReader::new(value);
        let forward = |r: &mut WireReader<'_>| -> Result<Forward> {
            Ok(Forward {
                address: Address::from_u64(r.read_u64()?),
                flags: r.read_u32()?,
                length: r.read_u16()?,
            })
        };
        let tag = |r: &mut WireReader<'_>| -> Result<TagMatch> {
            Ok(TagMatch {
                id: r.read_u32()?,
                value: r.read_u32()?,
            })
        };

        let parsed = match kind_id {
            ACTION_DROP => Self::Drop,
            ACTION_ACCEPT => Self::Accept,
            ACTION_TEE => Self::Tee(forward(&mut r)?),
            ACTION_WATCH => Self::Watch(forward(&mut r)?),
            ACTION_REDIRECT => Self::Redirect(forward(&mut r)?),
            ACTION_BREAK => Self::Break,
            ACTION_PRIORITY => Self::Priority(r.read_u8()?),
            k if k <= MAX_ACTION_KIND => Self::UnknownAction {
                kind: k,
                value: value.to_vec(),
            },
            MATCH_SOURCE_ADDRESS => Self::SourceAddress(r.read_address()?),
            MATCH_DEST_ADDRESS => Self::DestAddress(r.read_address()?),
            MATCH_VLAN_ID => Self::VlanId(r.read_u16()?),
            MATCH_VLAN_PCP => Self::VlanPcp(r.read_u8()?),
            MATCH_VLAN_DEI => Self::VlanDei(r.read_u8()?),
            MATCH_MAC_SOURCE => Self::MacSource(r.read_mac()?),
            MATCH_MAC_DEST => Self::MacDest(r.read_mac()?),
            MATCH_IPV4_SOURCE | MATCH_IPV4_DEST => {
                let ip = Ipv4Addr::from(r.read_array::<4>()?);
                let prefix = r.read_u8()?;
                if kind_id == MATCH_IPV4_SOURCE {
                    Self::Ipv4Source { ip, prefix }
                } else {
                    Self::Ipv4Dest { ip, prefix }
                }
            }
            MATCH_IPV6_SOURCE | MATCH_IPV6_DEST => {
                let ip = Ipv6Addr::from(r.read_array::<16>()?);
                let prefix = r.read_u8()?;
                if kind_id == MATCH_IPV6_SOURCE {
                    Self::Ipv6Source { ip, prefix }
                } else {
                    Self::Ipv6Dest { ip, prefix }
                }
            }
            MATCH_IP_TOS => Self::IpTos {
                mask: r.read_u8()?,
                start: r.read_u8()?,
                end: r.read_u8()?,
            },
            MATCH_IP_PROTOCOL => Self::IpProtocol(r.read_u8()?),
            MATCH_ETHERTYPE => Self::EtherType(r.read_u16()?),
            MATCH_ICMP => Self::Icmp {
                icmp_type: r.read_u8()?,
                code: r.read_u8()?,
                flags: r.read_u8()?,
            },
            MATCH_IP_SOURCE_PORT_RANGE => Self::SourcePortRange {
                start: r.read_u16()?,
                end: r.read_u16()?,
            },
            MATCH_IP_DEST_PORT_RANGE => Self::DestPortRange {
                start: r.read_u16()?,
                end: r.read_u16()?,
            },
            MATCH_CHARACTERISTICS => Self::Characteristics(r.read_u64()?),
            MATCH_FRAME_SIZE_RANGE => Self::FrameSizeRange {
                start: r.read_u16()?,
                end: r.read_u16()?,
            },
            MATCH_RANDOM => Self::Random(r.read_u32()?),
            MATCH_TAGS_DIFFERENCE => Self::TagsDifference(tag(&mut r)?),
            MATCH_TAGS_BITWISE_AND => Self::TagsBitwiseAnd(tag(&mut r)?),
            MATCH_TAGS_BITWISE_OR => Self::TagsBitwiseOr(tag(&mut r)?),
            MATCH_TAGS_BITWISE_XOR => Self::TagsBitwiseXor(tag(&mut r)?),
            MATCH_TAGS_EQUAL => Self::TagsEqual(tag(&mut r)?),
            MATCH_TAG_SENDER => Self::TagSender(tag(&mut r)?),
            MATCH_TAG_RECEIVER => Self::TagReceiver(tag(&mut r)?),
            MATCH_INTEGER_RANGE => Self::IntegerRange(IntegerRange {
                start: r.read_u64()?,
                end: r.read_u32()?,
                idx: r.read_u16()?,
                format: r.read_u8()?,
            }),
            k => Self::UnknownMatch {
                kind: k,
                value: value.to_vec(),
            },
        };
        Ok(parsed)
    }
}

// ============================================
// Rule
// ============================================

/// One entry of a rule table.
///
/// # Example
/// ```
/// use vlink_core::rules::{Rule, RuleKind};
///
/// // Accept everything that is NOT ARP
/// let table = vec![
///     Rule::new(RuleKind::EtherType(0x0806)).negate(),
///     Rule::new(RuleKind::Accept),
/// ];
/// assert!(table[0].not);
/// assert!(table[1].kind.is_action());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Invert the match result before combining.
    pub not: bool,
    /// Combine with OR instead of AND.
    pub or: bool,
    /// Action or match.
    pub kind: RuleKind,
}

impl Rule {
    /// Creates a rule with both flags clear.
    #[must_use]
    pub const fn new(kind: RuleKind) -> Self {
        Self {
            not: false,
            or: false,
            kind,
        }
    }

    /// Sets the NOT flag.
    #[must_use]
    pub const fn negate(mut self) -> Self {
        self.not = true;
        self
    }

    /// Sets the OR flag.
    #[must_use]
    pub const fn or(mut self) -> Self {
        self.or = true;
        self
    }

    /// Wire type byte.
    #[must_use]
    pub fn type_byte(&self) -> u8 {
        let mut t = self.kind.id() & RULE_KIND_MASK;
        if self.not {
            t |= RULE_FLAG_NOT;
        }
        if self.or {
            t |= RULE_FLAG_OR;
        }
        t
    }
}

impl WireCodec for Rule {
    fn encode(&self, buf: &mut BytesMut) {
        let mut value = BytesMut::new();
        self.kind.encode_value(&mut value);
        buf.put_u8(self.type_byte());
        // Unknown kinds were decoded from a one-byte length, known ones
        // are far below it.
        buf.put_u8(u8::try_from(value.len()).unwrap_or(u8::MAX));
        buf.put_slice(&value[..value.len().min(usize::from(u8::MAX))]);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let type_byte = reader.read_u8()?;
        let len = usize::from(reader.read_u8()?);
        let value = reader.read_bytes(len)?;
        let kind = RuleKind::decode_value(type_byte & RULE_KIND_MASK, value)
            .map_err(|e| CoreError::invalid_data(format!("rule value: {e}")))?;
        Ok(Self {
            not: type_byte & RULE_FLAG_NOT != 0,
            or: type_byte & RULE_FLAG_OR != 0,
            kind,
        })
    }
}

// ============================================
// Rule Lists
// ============================================

/// Writes `rules` without a count prefix.
pub fn encode_rules(buf: &mut BytesMut, rules: &[Rule]) {
    for rule in rules {
        rule.encode(buf);
    }
}

/// Reads exactly `count` rules.
///
/// # Errors
/// Any rule decoding error.
pub fn decode_rules(reader: &mut WireReader<'_>, count: usize) -> Result<Vec<Rule>> {
    let mut rules = Vec::with_capacity(count);
    for _ in 0..count {
        rules.push(Rule::decode(reader)?);
    }
    Ok(rules)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(rule: &Rule) -> Rule {
        let bytes = rule.to_bytes();
        let (decoded, used) = Rule::from_bytes(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        decoded
    }

    #[test]
    fn test_type_byte_flags() {
        let rule = Rule::new(RuleKind::EtherType(0x0800)).negate().or();
        assert_eq!(rule.type_byte(), 0x80 | 0x40 | kind::MATCH_ETHERTYPE);
        assert_eq!(roundtrip(&rule), rule);
    }

    #[test]
    fn test_value_encodings() {
        let rule = Rule::new(RuleKind::Ipv4Source {
            ip: Ipv4Addr::new(10, 0, 0, 0),
            prefix: 8,
        });
        let bytes = rule.to_bytes();
        assert_eq!(bytes, vec![kind::MATCH_IPV4_SOURCE, 5, 10, 0, 0, 0, 8]);

        let tee = Rule::new(RuleKind::Tee(Forward {
            address: Address::from_u64(0x01_0203_0405),
            flags: 0,
            length: 128,
        }));
        assert_eq!(tee.to_bytes()[1], 14);
        assert_eq!(roundtrip(&tee), tee);

        let range = Rule::new(RuleKind::IntegerRange(IntegerRange {
            start: 10,
            end: 5,
            idx: 20,
            format: 0x0f,
        }));
        assert_eq!(range.to_bytes()[1], 15);
        assert_eq!(roundtrip(&range), range);
    }

    #[test]
    fn test_unknown_kinds_preserved() {
        let bytes = [0x3e, 3, 1, 2, 3, 0x0c, 1, 9];
        let mut r = WireReader::new(&bytes);
        let rules = decode_rules(&mut r, 2).unwrap();
        assert!(matches!(
            &rules[0].kind,
            RuleKind::UnknownMatch { kind: 0x3e, value } if value == &[1, 2, 3]
        ));
        assert!(matches!(&rules[1].kind, RuleKind::UnknownAction { kind: 12, .. }));
        assert!(rules[1].kind.is_action());

        let mut out = BytesMut::new();
        encode_rules(&mut out, &rules);
        assert_eq!(&out[..], &bytes[..]);
    }

    #[test]
    fn test_truncated_value_rejected() {
        // Ethertype needs 2 value bytes
        let bytes = [kind::MATCH_ETHERTYPE, 1, 0x08];
        assert!(Rule::from_bytes(&bytes).is_err());
        // Declared length runs past the buffer
        let bytes = [kind::MATCH_ETHERTYPE, 9, 0x08, 0x00];
        assert!(Rule::from_bytes(&bytes).is_err());
    }
}
