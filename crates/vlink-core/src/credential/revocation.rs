// ============================================
// File: crates/vlink-core/src/credential/revocation.rs
// ============================================
//! # Revocation
//!
//! ## Creation Reason
//! Lets the controller invalidate credentials before they expire. A
//! revocation names a credential type, an id (or every id of that type)
//! and a threshold: any credential of that (type, id) with a timestamp at
//! or before the threshold is dead for good.
//!
//! ## Wire Format
//! ```text
//! id (4) │ network id (8) │ credential id (4) │ threshold (8)
//! flags (8) │ target (5) │ credential type (1) │ signer (5) │ trailer
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A COM has no id; COM revocations always apply to the whole type
//!
//! ## Last Modified
//! v0.1.0 - Initial revocation implementation

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, NetworkId};

use super::{decode_trailer, encode_trailer, CredentialType, Signable};
use crate::error::{CoreError, Result};
use crate::wire::{PutWire, WireCodec, WireReader};

/// Flag: relay to other members immediately.
pub const REVOCATION_FLAG_FAST_PROPAGATE: u64 = 0x01;

/// Flag: applies to every credential of the type, not one id.
pub const REVOCATION_FLAG_ALL_OF_TYPE: u64 = 0x02;

/// Key under which a revocation threshold is stored.
///
/// `None` as id means every credential of the type.
pub type RevocationKey = (CredentialType, Option<u32>);

/// Signed revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    id: u32,
    nwid: NetworkId,
    credential_id: u32,
    threshold: i64,
    flags: u64,
    target: Address,
    credential_type: CredentialType,
    signed_by: Address,
    signature: Vec<u8>,
}

impl Revocation {
    /// Creates an unsigned revocation of one credential.
    #[must_use]
    pub const fn new(
        id: u32,
        nwid: NetworkId,
        credential_type: CredentialType,
        credential_id: u32,
        threshold: i64,
        target: Address,
    ) -> Self {
        Self {
            id,
            nwid,
            credential_id,
            threshold,
            flags: 0,
            target,
            credential_type,
            signed_by: Address::NIL,
            signature: Vec::new(),
        }
    }

    /// Sets flag bits.
    #[must_use]
    pub const fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    /// Revocation id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Network the revocation applies to.
    #[must_use]
    pub const fn network_id(&self) -> NetworkId {
        self.nwid
    }

    /// Id of the revoked credential.
    #[must_use]
    pub const fn credential_id(&self) -> u32 {
        self.credential_id
    }

    /// Credentials at or before this timestamp are revoked.
    #[must_use]
    pub const fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Flag bits.
    #[must_use]
    pub const fn flags(&self) -> u64 {
        self.flags
    }

    /// Member whose credential is revoked.
    #[must_use]
    pub const fn target(&self) -> Address {
        self.target
    }

    /// Type of the revoked credential.
    #[must_use]
    pub const fn credential_type(&self) -> CredentialType {
        self.credential_type
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

    /// Returns `true` if the revocation should be relayed at once.
    #[must_use]
    pub const fn fast_propagate(&self) -> bool {
        self.flags & REVOCATION_FLAG_FAST_PROPAGATE != 0
    }

    /// Threshold-map key this revocation writes.
    #[must_use]
    pub const fn key(&self) -> RevocationKey {
        if matches!(self.credential_type, CredentialType::Com)
            || self.flags & REVOCATION_FLAG_ALL_OF_TYPE != 0
        {
            (self.credential_type, None)
        } else {
            (self.credential_type, Some(self.credential_id))
        }
    }

    fn encode_fields(&self, buf: &mut BytesMut) {
        buf.put_u32(self.id);
        buf.put_network_id(self.nwid);
        buf.put_u32(self.credential_id);
        buf.put_i64(self.threshold);
        buf.put_u64(self.flags);
        buf.put_address(self.target);
        buf.put_u8(self.credential_type.as_u8());
        buf.put_address(self.signed_by);
    }
}

impl Signable for Revocation {
    const TYPE: CredentialType = CredentialType::Revocation;

    fn encode_signed_fields(&self, buf: &mut BytesMut) {
        self.encode_fields(buf);
    }

    fn set_signature(&mut self, signer: Address, signature: Vec<u8>) {
        self.signed_by = signer;
        self.signature = signature;
    }
}

impl WireCodec for Revocation {
    fn encode(&self, buf: &mut BytesMut) {
        self.encode_fields(buf);
        encode_trailer(buf, &self.signature);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let id = reader.read_u32()?;
        let nwid = reader.read_network_id()?;
        let credential_id = reader.read_u32()?;
        let threshold = reader.read_i64()?;
        let flags = reader.read_u64()?;
        let target = reader.read_address()?;
        let type_byte = reader.read_u8()?;
        let credential_type = CredentialType::from_u8(type_byte).ok_or_else(|| {
            CoreError::invalid_data(format!("revocation of unknown type {type_byte}"))
        })?;

        Ok(Self {
            id,
            nwid,
            credential_id,
            threshold,
            flags,
            target,
            credential_type,
            signed_by: reader.read_address()?,
            signature: decode_trailer(reader)?,
        })
    }
}
