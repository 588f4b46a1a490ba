// ============================================
// File: crates/vlink-core/src/credential/capability.rs
// ============================================
//! # Capability
//!
//! ## Creation Reason
//! A capability is a signed rule table granting its holder extra traffic
//! rights beyond the network's base rules. Capabilities are additive: the
//! filter consults them only when the base rules reach no verdict.
//!
//! ## Wire Format
//! ```text
//! network id (8) │ timestamp (8) │ id (4) │ rule count (2, ≤ 64)
//! rules │ issued to (5) │ signer (5) │ trailer
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial capability implementation

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, NetworkId};

use super::{decode_trailer, encode_trailer, CredentialType, Signable};
use crate::error::{CoreError, Result};
use crate::rules::{decode_rules, encode_rules, Rule};
use crate::wire::{PutWire, WireCodec, WireReader};

/// Maximum rules in one capability.
pub const MAX_CAPABILITY_RULES: usize = 64;

/// Signed rule table granted to one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    nwid: NetworkId,
    timestamp: i64,
    id: u32,
    rules: Vec<Rule>,
    issued_to: Address,
    signed_by: Address,
    signature: Vec<u8>,
}

impl Capability {
    /// Creates an unsigned capability.
    ///
    /// # Errors
    /// `MessageTooLarge` if `rules` exceeds `MAX_CAPABILITY_RULES`.
    pub fn new(
        id: u32,
        nwid: NetworkId,
        timestamp: i64,
        issued_to: Address,
        rules: Vec<Rule>,
    ) -> Result<Self> {
        if rules.len() > MAX_CAPABILITY_RULES {
            return Err(CoreError::too_large(MAX_CAPABILITY_RULES, rules.len()));
        }
        Ok(Self {
            nwid,
            timestamp,
            id,
            rules,
            issued_to,
            signed_by: Address::NIL,
            signature: Vec::new(),
        })
    }

    /// Capability id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Network the capability applies to.
    #[must_use]
    pub const fn network_id(&self) -> NetworkId {
        self.nwid
    }

    /// Issue timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Rule table.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Member the capability was issued to.
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
        buf.put_u32(self.id);
        buf.put_u16(self.rules.len() as u16);
        encode_rules(buf, &self.rules);
        buf.put_address(self.issued_to);
        buf.put_address(self.signed_by);
    }
}

impl Signable for Capability {
    const TYPE: CredentialType = CredentialType::Capability;

    fn encode_signed_fields(&self, buf: &mut BytesMut) {
        self.encode_fields(buf);
    }

    fn set_signature(&mut self, signer: Address, signature: Vec<u8>) {
        self.signed_by = signer;
        self.signature = signature;
    }
}

impl WireCodec for Capability {
    fn encode(&self, buf: &mut BytesMut) {
        self.encode_fields(buf);
        encode_trailer(buf, &self.signature);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let nwid = reader.read_network_id()?;
        let timestamp = reader.read_i64()?;
        let id = reader.read_u32()?;
        let count = usize::from(reader.read_u16()?);
        if count > MAX_CAPABILITY_RULES {
            return Err(CoreError::too_large(MAX_CAPABILITY_RULES, count));
        }
        let rules = decode_rules(reader, count)?;
        let issued_to = reader.read_address()?;
        let signed_by = reader.read_address()?;
        let signature = decode_trailer(reader)?;

        Ok(Self {
            nwid,
            timestamp,
            id,
            rules,
            issued_to,
            signed_by,
            signature,
        })
    }
}

// ============================================
// Tests
// ============================================
