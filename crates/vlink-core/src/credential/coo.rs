// ============================================
// File: crates/vlink-core/src/credential/coo.rs
// ============================================
//! # Certificate of Ownership
//!
//! ## Creation Reason
//! A COO proves that a member may legitimately source traffic from given
//! IP or MAC addresses. Rules test this through the
//! `SENDER_IP_AUTHENTICATED` and `SENDER_MAC_AUTHENTICATED`
//! characteristics bits.
//!
//! ## Wire Format
//! ```text
//! network id (8) │ timestamp (8) │ flags (8) │ id (4)
//! thing count (2, ≤ 16) │ things: type (1) + value (16)
//! issued to (5) │ signer (5) │ trailer
//! ```
//! Thing types: 1 MAC (6 bytes, zero padded), 2 IPv4 (4 bytes, zero
//! padded), 3 IPv6.
//!
//! ## Last Modified
//! v0.1.0 - Initial COO implementation

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, Mac, NetworkId, MAC_SIZE};

use super::{decode_trailer, encode_trailer, CredentialType, Signable};
use crate::error::{CoreError, Result};
use crate::wire::{PutWire, WireCodec, WireReader};

// ============================================
// Constants
// ============================================

/// Maximum things in one certificate.
pub const MAX_THINGS: usize = 16;

const THING_VALUE_SIZE: usize = 16;
const THING_MAC: u8 = 1;
const THING_IPV4: u8 = 2;
const THING_IPV6: u8 = 3;

// ============================================
// Thing
// ============================================

/// A resource whose ownership is certified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Thing {
    /// Ethernet MAC.
    Mac(Mac),
    /// IPv4 address.
    Ipv4(Ipv4Addr),
    /// IPv6 address.
    Ipv6(Ipv6Addr),
}

impl From<IpAddr> for Thing {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::Ipv4(v4),
            IpAddr::V6(v6) => Self::Ipv6(v6),
        }
    }
}

impl Thing {
    fn encode(&self, buf: &mut BytesMut) {
        let mut value = [0u8; THING_VALUE_SIZE];
        let kind = match self {
            Self::Mac(mac) => {
                value[..MAC_SIZE].copy_from_slice(&mac.to_bytes());
                THING_MAC
            }
            Self::Ipv4(ip) => {
                value[..4].copy_from_slice(&ip.octets());
                THING_IPV4
            }
            Self::Ipv6(ip) => {
                value.copy_from_slice(&ip.octets());
                THING_IPV6
            }
        };
        buf.put_u8(kind);
        buf.put_slice(&value);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let kind = reader.read_u8()?;
        let value: [u8; THING_VALUE_SIZE] = reader.read_array()?;
        match kind {
            THING_MAC => Mac::from_bytes(&value[..MAC_SIZE])
                .map(Self::Mac)
                .ok_or_else(|| CoreError::invalid_data("coo mac")),
            THING_IPV4 => Ok(Self::Ipv4(Ipv4Addr::new(
                value[0], value[1], value[2], value[3],
            ))),
            THING_IPV6 => Ok(Self::Ipv6(Ipv6Addr::from(value))),
            other => Err(CoreError::invalid_data(format!("unknown coo thing {other}"))),
        }
    }
}

// ============================================
// CertificateOfOwnership
// ============================================

/// Certificate of Ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateOfOwnership {
    nwid: NetworkId,
    timestamp: i64,
    flags: u64,
    id: u32,
    things: Vec<Thing>,
    issued_to: Address,
    signed_by: Address,
    signature: Vec<u8>,
}

impl CertificateOfOwnership {
    /// Creates an unsigned, empty certificate.
    #[must_use]
    pub const fn new(id: u32, nwid: NetworkId, timestamp: i64, issued_to: Address) -> Self {
        Self {
            nwid,
            timestamp,
            flags: 0,
            id,
            things: Vec::new(),
            issued_to,
            signed_by: Address::NIL,
            signature: Vec::new(),
        }
    }

    /// Adds a certified resource.
    ///
    /// # Errors
    /// `MessageTooLarge` once `MAX_THINGS` are present.
    pub fn add_thing(&mut self, thing: impl Into<Thing>) -> Result<()> {
        if self.things.len() >= MAX_THINGS {
            return Err(CoreError::too_large(MAX_THINGS, self.things.len() + 1));
        }
        self.things.push(thing.into());
        Ok(())
    }

    /// Returns `true` if `thing` is certified.
    #[must_use]
    pub fn owns(&self, thing: &Thing) -> bool {
        self.things.contains(thing)
    }

    /// Certified resources.
    #[must_use]
    pub fn things(&self) -> &[Thing] {
        &self.things
    }

    /// Certificate id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Network the certificate applies to.
    #[must_use]
    pub const fn network_id(&self) -> NetworkId {
        self.nwid
    }

    /// Issue timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Reserved flags.
    #[must_use]
    pub const fn flags(&self) -> u64 {
        self.flags
    }

    /// Member the certificate was issued to.
    #[must_use]
    pub const fn issued_to(&self) -> Address {
        self.issued_to
    }

    /// Signer address.
    #[must_use]
    pub const fn signer(&self) -> Address {
        self.signed_by
    }

    /// Signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn encode_fields(&self, buf: &mut BytesMut) {
        buf.put_network_id(self.nwid);
        buf.put_i64(self.timestamp);
        buf.put_u64(self.flags);
        buf.put_u32(self.id);
        buf.put_u16(self.things.len() as u16);
        for thing in &self.things {
            thing.encode(buf);
        }
        buf.put_address(self.issued_to);
        buf.put_address(self.signed_by);
    }
}

impl From<Mac> for Thing {
    fn from(mac: Mac) -> Self {
        Self::Mac(mac)
    }
}

impl Signable for CertificateOfOwnership {
    const TYPE: CredentialType = CredentialType::Coo;

    fn encode_signed_fields(&self, buf: &mut BytesMut) {
        self.encode_fields(buf);
    }

    fn set_signature(&mut self, signer: Address, signature: Vec<u8>) {
        self.signed_by = signer;
        self.signature = signature;
    }
}

impl WireCodec for CertificateOfOwnership {
    fn encode(&self, buf: &mut BytesMut) {
        self.encode_fields(buf);
        encode_trailer(buf, &self.signature);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let nwid = reader.read_network_id()?;
        let timestamp = reader.read_i64()?;
        let flags = reader.read_u64()?;
        let id = reader.read_u32()?;
        let count = usize::from(reader.read_u16()?);
        if count > MAX_THINGS {
            return Err(CoreError::too_large(MAX_THINGS, count));
        }
        let mut things = Vec::with_capacity(count);
        for _ in 0..count {
            things.push(Thing::decode(reader)?);
        }

        Ok(Self {
            nwid,
            timestamp,
            flags,
            id,
            things,
            issued_to: reader.read_address()?,
            signed_by: reader.read_address()?,
            signature: decode_trailer(reader)?,
        })
    }
}

// ============================================
// Tests
// ============================================
