// ============================================
// File: crates/vlink-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the fixed-width identifiers of the overlay so that every
//! crate agrees on their wire size, ordering and textual form.
//!
//! ## Main Functionality
//! - `Address`: 40-bit overlay address of a node
//! - `NetworkId`: 64-bit virtual network id (top 40 bits name the controller)
//! - `Mac`: 48-bit virtual Ethernet address, derivable from an `Address`
//! - `MulticastGroup`: multicast MAC plus additional distinguishing info
//!
//! ## Wire Sizes
//! ```text
//! Address    5 bytes  big-endian
//! NetworkId  8 bytes  big-endian
//! Mac        6 bytes  big-endian
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Addresses starting with 0xff are reserved and never valid node addresses
//! - The MAC <-> address mapping is per network; always pass the network id
//! - Textual forms are lowercase hex and are used in configuration files
//!
//! ## Last Modified
//! v0.1.0 - Initial identifier types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Size of an `Address` on the wire.
pub const ADDRESS_SIZE: usize = 5;

/// Size of a `Mac` on the wire.
pub const MAC_SIZE: usize = 6;

/// Size of a `NetworkId` on the wire.
pub const NETWORK_ID_SIZE: usize = 8;

/// First byte reserved for non-node uses.
pub const ADDRESS_RESERVED_PREFIX: u8 = 0xff;

const ADDRESS_MASK: u64 = 0xff_ffff_ffff;
const MAC_MASK: u64 = 0xffff_ffff_ffff;

// ============================================
// Address
// ============================================

/// 40-bit overlay address of a node.
///
/// # Example
/// ```
/// use vlink_common::types::Address;
///
/// let addr: Address = "89e92ceee5".parse().unwrap();
/// assert_eq!(addr.to_bytes(), [0x89, 0xe9, 0x2c, 0xee, 0xe5]);
/// assert_eq!(addr.to_string(), "89e92ceee5");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address {
    /// The nil address, used where no signer or target is present.
    pub const NIL: Self = Self(0);

    /// Creates an address from an integer, keeping the low 40 bits.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value & ADDRESS_MASK)
    }

    /// Creates an address from exactly five big-endian bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ADDRESS_SIZE {
            return None;
        }
        Some(Self(
            bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
        ))
    }

    /// Returns the address as an integer.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the five big-endian wire bytes.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; ADDRESS_SIZE] {
        let b = self.0.to_be_bytes();
        [b[3], b[4], b[5], b[6], b[7]]
    }

    /// Returns `true` for the all-zero address.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the address uses the reserved prefix.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        (self.0 >> 32) as u8 == ADDRESS_RESERVED_PREFIX
    }

    /// Returns `true` if this address may belong to a node.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !self.is_nil() && !self.is_reserved()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ADDRESS_SIZE * 2 {
            return Err(CommonError::invalid_input(
                "address",
                format!("expected {} hex digits, got {}", ADDRESS_SIZE * 2, s.len()),
            ));
        }
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
            .ok_or_else(|| CommonError::invalid_length(ADDRESS_SIZE, bytes.len()))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// NetworkId
// ============================================

/// 64-bit virtual network identifier.
///
/// The most significant 40 bits are the address of the network's
/// controller; only that node may sign credentials for the network.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NetworkId(u64);

impl NetworkId {
    /// Creates a network id from its integer form.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Builds a network id from a controller address and a 24-bit suffix.
    #[must_use]
    pub const fn from_controller(controller: Address, suffix: u32) -> Self {
        Self((controller.as_u64() << 24) | (suffix as u64 & 0xff_ffff))
    }

    /// Returns the integer form.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the address of the controller that owns this network.
    #[must_use]
    pub const fn controller(&self) -> Address {
        Address::from_u64(self.0 >> 24)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkId({self})")
    }
}

impl FromStr for NetworkId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != NETWORK_ID_SIZE * 2 {
            return Err(CommonError::invalid_input(
                "network_id",
                format!("expected {} hex digits, got {}", NETWORK_ID_SIZE * 2, s.len()),
            ));
        }
        Ok(Self(u64::from_str_radix(s, 16)?))
    }
}

impl Serialize for NetworkId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Mac
// ============================================

/// 48-bit virtual Ethernet MAC address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Mac(u64);

impl Mac {
    /// The Ethernet broadcast address.
    pub const BROADCAST: Self = Self(MAC_MASK);

    /// Creates a MAC from an integer, keeping the low 48 bits.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value & MAC_MASK)
    }

    /// Creates a MAC from exactly six big-endian bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != MAC_SIZE {
            return None;
        }
        Some(Self(
            bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
        ))
    }

    /// Returns the integer form.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the six big-endian wire bytes.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; MAC_SIZE] {
        let b = self.0.to_be_bytes();
        [b[2], b[3], b[4], b[5], b[6], b[7]]
    }

    /// Returns `true` for the all-zero MAC.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the group bit of the first octet is set.
    #[must_use]
    pub const fn is_multicast(&self) -> bool {
        (self.0 >> 40) & 0x01 != 0
    }

    /// Returns `true` for ff:ff:ff:ff:ff:ff.
    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.0 == MAC_MASK
    }

    /// First octet of MACs derived for a given network.
    ///
    /// Locally administered, unicast, taken from the network id's low
    /// byte. 0x52 is avoided because common hypervisors claim it.
    const fn first_octet_for_network(nwid: NetworkId) -> u64 {
        let a = ((nwid.as_u64() & 0xfe) | 0x02) as u8;
        if a == 0x52 {
            0x32
        } else {
            a as u64
        }
    }

    const fn network_mask(nwid: NetworkId) -> u64 {
        let n = nwid.as_u64();
        (((n >> 8) & 0xff) << 32)
            | (((n >> 16) & 0xff) << 24)
            | (((n >> 24) & 0xff) << 16)
            | (((n >> 32) & 0xff) << 8)
            | ((n >> 40) & 0xff)
    }

    /// Derives the MAC a node uses on a network from its overlay address.
    #[must_use]
    pub const fn from_address(address: Address, nwid: NetworkId) -> Self {
        let m = (Self::first_octet_for_network(nwid) << 40) | address.as_u64();
        Self(m ^ Self::network_mask(nwid))
    }

    /// Recovers the overlay address from a MAC derived on `nwid`.
    #[must_use]
    pub const fn to_address(&self, nwid: NetworkId) -> Address {
        Address::from_u64((self.0 & ADDRESS_MASK) ^ Self::network_mask(nwid))
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mac({self})")
    }
}

// ============================================
// MulticastGroup
// ============================================

/// A multicast group: a multicast MAC plus 32 bits of additional
/// distinguishing information (used e.g. to scope IPv4 ARP by address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MulticastGroup {
    /// Multicast (or broadcast) MAC.
    pub mac: Mac,
    /// Additional distinguishing information.
    pub adi: u32,
}

impl MulticastGroup {
    /// The Ethernet broadcast group.
    pub const BROADCAST: Self = Self {
        mac: Mac::BROADCAST,
        adi: 0,
    };

    /// Creates a new group.
    #[must_use]
    pub const fn new(mac: Mac, adi: u32) -> Self {
        Self { mac, adi }
    }
}

impl fmt::Display for MulticastGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:08x}", self.mac, self.adi)
    }
}

// ============================================
// Tests
// ============================================
