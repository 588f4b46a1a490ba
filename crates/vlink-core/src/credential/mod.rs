// ============================================
// File: crates/vlink-core/src/credential/mod.rs
// ============================================
//! # Credentials
//!
//! ## Creation Reason
//! Access to a private network is granted by signed credentials issued by
//! the network's controller. This module defines the five credential
//! types, their common signature trailer and the closed `Credential` enum
//! that the verifier and the membership ledger operate on.
//!
//! ## Main Functionality
//! - [`com`]: Certificate of Membership (qualifier agreement)
//! - [`capability`]: signed rule tables granting traffic rights
//! - [`tag`]: signed (id, value) pairs matched by rules
//! - [`coo`]: Certificate of Ownership for IP/MAC resources
//! - [`revocation`]: invalidates credentials issued before a threshold
//! - [`verify`]: signer authorization and signature checking
//!
//! ## Signing Form
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ 0x7f × 8 │ type (1) │ signed fields │ 0x7f × 8       │
//! └──────────────────────────────────────────────────────┘
//! ```
//! The type byte prevents a signature over one credential type from being
//! replayed as another.
//!
//! ## Common Trailer
//! ```text
//! algorithm (1) = 1 │ sig len (2) │ sig │ ext len (2) │ ext bytes
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Credentials are immutable once signed; share them by reference
//! - Extended bytes are skipped on decode and never re-emitted
//!
//! ## Last Modified
//! v0.1.0 - Initial credential types

pub mod capability;
pub mod com;
pub mod coo;
pub mod revocation;
pub mod tag;
pub mod verify;

pub use capability::Capability;
pub use com::{CertificateOfMembership, Qualifier};
pub use coo::{CertificateOfOwnership, Thing};
pub use revocation::Revocation;
pub use tag::Tag;
pub use verify::{CredentialVerifier, IdentityLookup, VerifyResult};

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, NetworkId};

use crate::crypto::Identity;
use crate::error::{CoreError, Result};
use crate::wire::{WireCodec, WireReader};

// ============================================
// Constants
// ============================================

/// Bytes that bracket the signing form.
pub const SIGNATURE_SENTINEL: [u8; 8] = [0x7f; 8];

/// Largest signature accepted on the wire.
pub const MAX_SIGNATURE_SIZE: usize = 96;

/// Signature algorithm tag for Ed25519.
pub const SIGNATURE_ALGORITHM_ED25519: u8 = 1;

// ============================================
// CredentialType
// ============================================

/// Credential type id, shared by the signing form and revocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CredentialType {
    /// Certificate of Membership.
    Com = 1,
    /// Capability.
    Capability = 2,
    /// Tag.
    Tag = 3,
    /// Certificate of Ownership.
    Coo = 4,
    /// Revocation.
    Revocation = 6,
}

impl CredentialType {
    /// Parses a wire type id.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Com),
            2 => Some(Self::Capability),
            3 => Some(Self::Tag),
            4 => Some(Self::Coo),
            6 => Some(Self::Revocation),
            _ => None,
        }
    }

    /// Wire type id.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Com => "com",
            Self::Capability => "capability",
            Self::Tag => "tag",
            Self::Coo => "coo",
            Self::Revocation => "revocation",
        }
    }
}

// ============================================
// Signable Trait
// ============================================

/// Behaviour shared by every credential type.
pub trait Signable {
    /// The credential's type id.
    const TYPE: CredentialType;

    /// Writes the fields covered by the signature.
    fn encode_signed_fields(&self, buf: &mut BytesMut);

    /// Stores the signer and signature.
    fn set_signature(&mut self, signer: Address, signature: Vec<u8>);

    /// Canonical bytes the signature covers.
    fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_slice(&SIGNATURE_SENTINEL);
        buf.put_u8(Self::TYPE.as_u8());
        self.encode_signed_fields(&mut buf);
        buf.put_slice(&SIGNATURE_SENTINEL);
        buf.to_vec()
    }

    /// Signs with `signer`, recording its address as the signer.
    ///
    /// # Errors
    /// `MissingPrivateKey` if `signer` holds no secret key.
    fn sign(&mut self, signer: &Identity) -> Result<()> {
        // The signer address is part of the signed fields
        self.set_signature(signer.address(), Vec::new());
        let signature = signer.sign(&self.signing_bytes())?;
        self.set_signature(signer.address(), signature.to_vec());
        Ok(())
    }
}

// ============================================
// Trailer Codec
// ============================================

/// Writes the common signature trailer.
pub(crate) fn encode_trailer(buf: &mut BytesMut, signature: &[u8]) {
    buf.put_u8(SIGNATURE_ALGORITHM_ED25519);
    buf.put_u16(u16::try_from(signature.len()).unwrap_or(0));
    buf.put_slice(signature);
    buf.put_u16(0);
}

/// Reads the common signature trailer, skipping extended fields.
pub(crate) fn decode_trailer(reader: &mut WireReader<'_>) -> Result<Vec<u8>> {
    let algorithm = reader.read_u8()?;
    if algorithm != SIGNATURE_ALGORITHM_ED25519 {
        return Err(CoreError::invalid_data(format!(
            "unknown signature algorithm {algorithm}"
        )));
    }
    let len = usize::from(reader.read_u16()?);
    if len > MAX_SIGNATURE_SIZE {
        return Err(CoreError::SignatureTooLong {
            len,
            max: MAX_SIGNATURE_SIZE,
        });
    }
    let signature = reader.read_bytes(len)?.to_vec();
    let ext = usize::from(reader.read_u16()?);
    reader
        .skip(ext)
        .map_err(|_| CoreError::invalid_data("extended fields overrun buffer"))?;
    Ok(signature)
}

// ============================================
// Credential
// ============================================

/// Any credential, as carried by NETWORK_CREDENTIALS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Certificate of Membership.
    Com(CertificateOfMembership),
    /// Capability.
    Capability(Capability),
    /// Tag.
    Tag(Tag),
    /// Certificate of Ownership.
    Coo(CertificateOfOwnership),
    /// Revocation.
    Revocation(Revocation),
}

impl Credential {
    /// Type id of the wrapped credential.
    #[must_use]
    pub const fn credential_type(&self) -> CredentialType {
        match self {
            Self::Com(_) => CredentialType::Com,
            Self::Capability(_) => CredentialType::Capability,
            Self::Tag(_) => CredentialType::Tag,
            Self::Coo(_) => CredentialType::Coo,
            Self::Revocation(_) => CredentialType::Revocation,
        }
    }

    /// Network the credential applies to.
    #[must_use]
    pub fn network_id(&self) -> NetworkId {
        match self {
            Self::Com(c) => c.network_id(),
            Self::Capability(c) => c.network_id(),
            Self::Tag(c) => c.network_id(),
            Self::Coo(c) => c.network_id(),
            Self::Revocation(c) => c.network_id(),
        }
    }

    /// Address that signed the credential.
    #[must_use]
    pub const fn signer(&self) -> Address {
        match self {
            Self::Com(c) => c.signer(),
            Self::Capability(c) => c.signer(),
            Self::Tag(c) => c.signer(),
            Self::Coo(c) => c.signer(),
            Self::Revocation(c) => c.signer(),
        }
    }

    /// Member the credential was issued to (a revocation's target).
    #[must_use]
    pub fn issued_to(&self) -> Address {
        match self {
            Self::Com(c) => c.issued_to(),
            Self::Capability(c) => c.issued_to(),
            Self::Tag(c) => c.issued_to(),
            Self::Coo(c) => c.issued_to(),
            Self::Revocation(c) => c.target(),
        }
    }

    /// Credential id; `None` for a COM.
    #[must_use]
    pub const fn id(&self) -> Option<u32> {
        match self {
            Self::Com(_) => None,
            Self::Capability(c) => Some(c.id()),
            Self::Tag(c) => Some(c.id()),
            Self::Coo(c) => Some(c.id()),
            Self::Revocation(c) => Some(c.id()),
        }
    }

    /// Timestamp (a revocation's threshold).
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Com(c) => c.timestamp(),
            Self::Capability(c) => c.timestamp(),
            Self::Tag(c) => c.timestamp(),
            Self::Coo(c) => c.timestamp(),
            Self::Revocation(c) => c.threshold(),
        }
    }

    /// Canonical bytes the signature covers.
    #[must_use]
    pub fn signing_bytes(&self) -> Vec<u8> {
        match self {
            Self::Com(c) => c.signing_bytes(),
            Self::Capability(c) => c.signing_bytes(),
            Self::Tag(c) => c.signing_bytes(),
            Self::Coo(c) => c.signing_bytes(),
            Self::Revocation(c) => c.signing_bytes(),
        }
    }

    /// Signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        match self {
            Self::Com(c) => c.signature(),
            Self::Capability(c) => c.signature(),
            Self::Tag(c) => c.signature(),
            Self::Coo(c) => c.signature(),
            Self::Revocation(c) => c.signature(),
        }
    }

    /// Wire form of the wrapped credential.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Com(c) => c.to_bytes(),
            Self::Capability(c) => c.to_bytes(),
            Self::Tag(c) => c.to_bytes(),
            Self::Coo(c) => c.to_bytes(),
            Self::Revocation(c) => c.to_bytes(),
        }
    }
}

impl From<CertificateOfMembership> for Credential {
    fn from(c: CertificateOfMembership) -> Self {
        Self::Com(c)
    }
}

impl From<Capability> for Credential {
    fn from(c: Capability) -> Self {
        Self::Capability(c)
    }
}

impl From<Tag> for Credential {
    fn from(c: Tag) -> Self {
        Self::Tag(c)
    }
}

impl From<CertificateOfOwnership> for Credential {
    fn from(c: CertificateOfOwnership) -> Self {
        Self::Coo(c)
    }
}

impl From<Revocation> for Credential {
    fn from(c: Revocation) -> Self {
        Self::Revocation(c)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_type_ids() {
        for t in [
            CredentialType::Com,
            CredentialType::Capability,
            CredentialType::Tag,
            CredentialType::Coo,
            CredentialType::Revocation,
        ] {
            assert_eq!(CredentialType::from_u8(t.as_u8()), Some(t));
        }
        assert_eq!(CredentialType::from_u8(5), None);
        assert_eq!(CredentialType::from_u8(0), None);
    }

    #[test]
    fn test_trailer_roundtrip() {
        let mut buf = BytesMut::new();
        encode_trailer(&mut buf, &[0xaa; 64]);
        let mut r = WireReader::new(&buf);
        assert_eq!(decode_trailer(&mut r).unwrap(), vec![0xaa; 64]);
        assert!(r.is_empty());
    }

    #[test]
    fn test_trailer_rejects_oversize_signature() {
        let mut buf = BytesMut::new();
        buf.put_u8(SIGNATURE_ALGORITHM_ED25519);
        buf.put_u16(200);
        buf.put_slice(&[0u8; 200]);
        buf.put_u16(0);
        let mut r = WireReader::new(&buf);
        assert!(matches!(
            decode_trailer(&mut r),
            Err(CoreError::SignatureTooLong { len: 200, .. })
        ));
    }

    #[test]
    fn test_trailer_skips_extended_fields() {
        let mut buf = BytesMut::new();
        buf.put_u8(SIGNATURE_ALGORITHM_ED25519);
        buf.put_u16(2);
        buf.put_slice(&[1, 2]);
        buf.put_u16(3);
        buf.put_slice(&[9, 9, 9]);
        let mut r = WireReader::new(&buf);
        assert_eq!(decode_trailer(&mut r).unwrap(), vec![1, 2]);
        assert!(r.is_empty());
    }

    #[test]
    fn test_trailer_rejects_extended_overrun() {
        let mut buf = BytesMut::new();
        buf.put_u8(SIGNATURE_ALGORITHM_ED25519);
        buf.put_u16(0);
        buf.put_u16(50);
        buf.put_slice(&[0u8; 10]);
        let mut r = WireReader::new(&buf);
        assert!(matches!(
            decode_trailer(&mut r),
            Err(CoreError::InvalidSerializedData { .. })
        ));
    }
}
