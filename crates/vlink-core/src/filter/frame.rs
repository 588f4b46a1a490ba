// ============================================
// File: crates/vlink-core/src/filter/frame.rs
// ============================================
//! # Frame Inspection Helpers
//!
//! Bounds-checked readers for the L3/L4 fields rules test. Every helper
//! returns `None` when the frame is too short, so a truncated frame can
//! never match a header-based rule.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Ethernet type of IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// Ethernet type of ARP.
pub const ETHERTYPE_ARP: u16 = 0x0806;
/// Ethernet type of IPv6.
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

/// IP protocol numbers carrying 16-bit source/destination ports.
pub const PORT_PROTOCOLS: [u8; 4] = [0x06, 0x11, 0x84, 0x88];

/// IP protocol number of TCP.
pub const IP_PROTO_TCP: u8 = 0x06;
/// IP protocol number of ICMP.
pub const IP_PROTO_ICMP: u8 = 0x01;
/// IP protocol number of ICMPv6.
pub const IP_PROTO_ICMPV6: u8 = 0x3a;

const IPV4_MIN_HEADER: usize = 20;
const IPV6_HEADER: usize = 40;

// ============================================
// IPv4
// ============================================

/// IPv4 header length in bytes, if the frame holds a minimal header.
#[must_use]
pub fn ipv4_header_len(data: &[u8]) -> Option<usize> {
    (data.len() >= IPV4_MIN_HEADER).then(|| usize::from(data[0] & 0x0f) * 4)
}

/// IPv4 source address (offset 12).
#[must_use]
pub fn ipv4_source(data: &[u8]) -> Option<Ipv4Addr> {
    ipv4_at(data, 12)
}

/// IPv4 destination address (offset 16).
#[must_use]
pub fn ipv4_dest(data: &[u8]) -> Option<Ipv4Addr> {
    ipv4_at(data, 16)
}

fn ipv4_at(data: &[u8], offset: usize) -> Option<Ipv4Addr> {
    if data.len() < IPV4_MIN_HEADER {
        return None;
    }
    let b = data.get(offset..offset + 4)?;
    Some(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
}

// ============================================
// IPv6
// ============================================

/// IPv6 source address (offset 8).
#[must_use]
pub fn ipv6_source(data: &[u8]) -> Option<Ipv6Addr> {
    ipv6_at(data, 8)
}

/// IPv6 destination address (offset 24).
#[must_use]
pub fn ipv6_dest(data: &[u8]) -> Option<Ipv6Addr> {
    ipv6_at(data, 24)
}

fn ipv6_at(data: &[u8], offset: usize) -> Option<Ipv6Addr> {
    if data.len() < IPV6_HEADER {
        return None;
    }
    let bytes: [u8; 16] = data.get(offset..offset + 16)?.try_into().ok()?;
    Some(Ipv6Addr::from(bytes))
}

/// Walks IPv6 extension headers.
///
/// Returns the upper-layer protocol and the offset of its header. Hop-by-
/// hop (0), routing (43), destination options (60) and mobility (135)
/// headers are skipped; anything else ends the walk. Only extension
/// headers must fit in the frame; the upper-layer payload may be short
/// or empty.
#[must_use]
pub fn ipv6_payload(data: &[u8]) -> Option<(u8, usize)> {
    if data.len() < IPV6_HEADER {
        return None;
    }
    let mut next = data[6];
    let mut pos = IPV6_HEADER;
    while pos <= data.len() {
        match next {
            0 | 43 | 60 | 135 => {
                if pos + 8 > data.len() {
                    return None;
                }
                next = data[pos];
                pos += usize::from(data[pos + 1]) * 8 + 8;
            }
            proto => return Some((proto, pos)),
        }
    }
    None
}

// ============================================
// Transport
// ============================================

/// Upper-layer protocol and header offset for IPv4 or IPv6 frames.
#[must_use]
pub fn transport(ether_type: u16, data: &[u8]) -> Option<(u8, usize)> {
    match ether_type {
        ETHERTYPE_IPV4 => ipv4_header_len(data).map(|hl| (data[9], hl)),
        ETHERTYPE_IPV6 => ipv6_payload(data),
        _ => None,
    }
}

/// Source and destination port, if the protocol carries them.
#[must_use]
pub fn ports(ether_type: u16, data: &[u8]) -> Option<(u16, u16)> {
    let (proto, pos) = transport(ether_type, data)?;
    if !PORT_PROTOCOLS.contains(&proto) || data.len() <= pos + 4 {
        return None;
    }
    let src = u16::from_be_bytes([data[pos], data[pos + 1]]);
    let dst = u16::from_be_bytes([data[pos + 2], data[pos + 3]]);
    Some((src, dst))
}

/// Masked IPv4 ToS or IPv6 traffic class.
#[must_use]
pub fn tos(ether_type: u16, data: &[u8]) -> Option<u8> {
    match ether_type {
        ETHERTYPE_IPV4 if data.len() >= IPV4_MIN_HEADER => Some(data[1]),
        ETHERTYPE_IPV6 if data.len() >= IPV6_HEADER => {
            Some(((data[0] << 4) & 0xf0) | ((data[1] >> 4) & 0x0f))
        }
        _ => None,
    }
}

/// ICMP type and code for ICMP or ICMPv6 frames.
#[must_use]
pub fn icmp(ether_type: u16, data: &[u8]) -> Option<(u8, u8)> {
    let (proto, pos) = transport(ether_type, data)?;
    let expected = if ether_type == ETHERTYPE_IPV4 {
        IP_PROTO_ICMP
    } else {
        IP_PROTO_ICMPV6
    };
    if proto != expected || data.len() < pos + 2 {
        return None;
    }
    Some((data[pos], data[pos + 1]))
}

/// TCP flag bits (low 12 bits of the characteristics word).
#[must_use]
pub fn tcp_flags(ether_type: u16, data: &[u8]) -> u64 {
    match transport(ether_type, data) {
        Some((IP_PROTO_TCP, pos)) if data.len() >= pos + 14 => {
            u64::from(data[pos + 13]) | (u64::from(data[pos + 12] & 0x0f) << 8)
        }
        _ => 0,
    }
}

/// What the sender claims as its source IP, for ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimedSource {
    /// No IP claim can be extracted.
    None,
    /// IPv6 neighbour solicitation; treated as authenticated.
    NeighborSolicitation,
    /// A source address to check against ownership certificates.
    Ip(IpAddr),
}

/// Extracts the source IP a frame claims.
///
/// IPv4 uses the header source, ARP the sender protocol address, IPv6 the
/// header source except for NDP where the target of an advertisement is
/// used and solicitations carry no usable claim.
#[must_use]
pub fn claimed_source(ether_type: u16, data: &[u8]) -> ClaimedSource {
    match ether_type {
        ETHERTYPE_IPV4 => ipv4_source(data).map_or(ClaimedSource::None, |ip| {
            ClaimedSource::Ip(IpAddr::V4(ip))
        }),
        ETHERTYPE_ARP if data.len() >= 28 => ClaimedSource::Ip(IpAddr::V4(Ipv4Addr::new(
            data[14], data[15], data[16], data[17],
        ))),
        ETHERTYPE_IPV6 if data.len() >= IPV6_HEADER => {
            let is_ndp = data.len() >= IPV6_HEADER + 8 + 16
                && data[6] == IP_PROTO_ICMPV6
                && (data[40] == 0x87 || data[40] == 0x88);
            if is_ndp {
                if data[40] == 0x87 {
                    return ClaimedSource::NeighborSolicitation;
                }
                return ipv6_at(data, 48).map_or(ClaimedSource::None, |ip| {
                    ClaimedSource::Ip(IpAddr::V6(ip))
                });
            }
            ipv6_source(data).map_or(ClaimedSource::None, |ip| ClaimedSource::Ip(IpAddr::V6(ip)))
        }
        _ => ClaimedSource::None,
    }
}

/// Reads an integer of `bits` bits from the 8-byte window at `idx`.
///
/// The field spans `ceil(bits / 8)` bytes. A big-endian field is the
/// tail of the window and keeps its low `bits` bits; a little-endian
/// field is the head of the window and keeps its high `bits` bits.
/// Returns 0 if the field runs past the frame.
#[must_use]
pub fn integer_at(data: &[u8], idx: usize, bits: u32, little_endian: bool) -> u64 {
    let bits = bits.clamp(1, 64);
    let len = bits.div_ceil(8);
    let width = len as usize;

    if little_endian {
        let value = data
            .get(idx..idx + width)
            .map_or(0, |b| b.iter().rev().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)));
        value >> (len * 8 - bits)
    } else {
        let start = idx + 8 - width;
        let value = data
            .get(start..start + width)
            .map_or(0, |b| b.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)));
        value & (u64::MAX >> (64 - bits))
    }
}

// ============================================
// Prefix Containment
// ============================================

/// Returns `true` if `ip` lies within `net/prefix`.
#[must_use]
pub fn ipv4_in(ip: Ipv4Addr, net: Ipv4Addr, prefix: u8) -> bool {
    let prefix = u32::from(prefix.min(32));
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    (u32::from(ip) & mask) == (u32::from(net) & mask)
}

/// Returns `true` if `ip` lies within `net/prefix`.
#[must_use]
pub fn ipv6_in(ip: Ipv6Addr, net: Ipv6Addr, prefix: u8) -> bool {
    let prefix = u32::from(prefix.min(128));
    let mask = if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - prefix)
    };
    (u128::from(ip) & mask) == (u128::from(net) & mask)
}

// ============================================
// Tests
// ============================================
