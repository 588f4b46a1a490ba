// ============================================
// File: crates/vlink-core/src/credential/tag.rs
// ============================================
//! # Tag
//!
//! Signed `(id, value)` pair attached to one member. Tag matches in rule
//! tables compare the local node's value with the sender's.
//!
//! ```text
//! network id (8) │ timestamp (8) │ id (4) │ value (4)
//! issued to (5) │ signer (5) │ trailer
//! ```

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, NetworkId};

use super::{decode_trailer, encode_trailer, CredentialType, Signable};
use crate::error::Result;
use crate::wire::{PutWire, WireCodec, WireReader};

/// Signed tag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    nwid: NetworkId,
    timestamp: i64,
    id: u32,
    value: u32,
    issued_to: Address,
    signed_by: Address,
    signature: Vec<u8>,
}

impl Tag {
    /// Creates an unsigned tag.
    #[must_use]
    pub const fn new(id: u32, value: u32, nwid: NetworkId, timestamp: i64, issued_to: Address) -> Self {
        Self {
            nwid,
            timestamp,
            id,
            value,
            issued_to,
            signed_by: Address::NIL,
            signature: Vec::new(),
        }
    }

    /// Tag id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Tag value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Network the tag applies to.
    #[must_use]
    pub const fn network_id(&self) -> NetworkId {
        self.nwid
    }

    /// Issue timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Member the tag was issued to.
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
        buf.put_u32(self.value);
        buf.put_address(self.issued_to);
        buf.put_address(self.signed_by);
    }
}

impl Signable for Tag {
    const TYPE: CredentialType = CredentialType::Tag;

    fn encode_signed_fields(&self, buf: &mut BytesMut) {
        self.encode_fields(buf);
    }

    fn set_signature(&mut self, signer: Address, signature: Vec<u8>) {
        self.signed_by = signer;
        self.signature = signature;
    }
}

impl WireCodec for Tag {
    fn encode(&self, buf: &mut BytesMut) {
        self.encode_fields(buf);
        encode_trailer(buf, &self.signature);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            nwid: reader.read_network_id()?,
            timestamp: reader.read_i64()?,
            id: reader.read_u32()?,
            value: reader.read_u32()?,
            issued_to: reader.read_address()?,
            signed_by: reader.read_address()?,
            signature: decode_trailer(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Identity;

    #[test]
    fn test_signed_roundtrip() {
        let controller = Identity::generate();
        let mut tag = Tag::new(3, 42, NetworkId::new(77), 9_000, Address::from_u64(11));
        tag.sign(&controller).unwrap();

        let bytes = tag.to_bytes();
        let (decoded, used) = Tag::from_bytes(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, tag);
        assert_eq!(decoded.value(), 42);
    }

    #[test]
    fn test_signing_form_is_bracketed() {
        let tag = Tag::new(3, 42, NetworkId::new(77), 9_000, Address::from_u64(11));
        let form = tag.signing_bytes();
        assert_eq!(&form[..8], &super::super::SIGNATURE_SENTINEL);
        assert_eq!(form[8], CredentialType::Tag.as_u8());
        assert_eq!(&form[form.len() - 8..], &super::super::SIGNATURE_SENTINEL);
    }
}
