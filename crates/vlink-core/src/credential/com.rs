// ============================================
// File: crates/vlink-core/src/credential/com.rs
// ============================================
//! # Certificate of Membership
//!
//! ## Creation Reason
//! A COM proves a peer is a member of a private network. Two members
//! admit each other when their COMs "agree": every qualifier of one is
//! present in the other and the values differ by no more than the
//! qualifier's max delta. Membership therefore expires naturally as the
//! controller advances the timestamp qualifier.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ format (1) = 1 │ qualifier count (2, ≤ 8)            │
//! ├──────────────────────────────────────────────────────┤
//! │ per qualifier: id (8) │ value (8) │ max delta (8)    │
//! │   (strictly ascending id)                            │
//! ├──────────────────────────────────────────────────────┤
//! │ signer (5) │ [trailer if signer != 0]                │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Standard Qualifiers
//! | id | meaning      | max delta                     |
//! |----|--------------|-------------------------------|
//! | 0  | timestamp    | network's credential max delta|
//! | 1  | network id   | 0                             |
//! | 2  | issued to    | u64::MAX (ignored)            |
//!
//! ## Last Modified
//! v0.1.0 - Initial COM implementation

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, NetworkId};

use super::{decode_trailer, encode_trailer, CredentialType, Signable};
use crate::error::{CoreError, Result};
use crate::wire::{PutWire, WireCodec, WireReader};

// ============================================
// Constants
// ============================================

/// Only COM format understood.
pub const COM_FORMAT: u8 = 1;

/// Maximum qualifiers in one COM.
pub const MAX_QUALIFIERS: usize = 8;

/// Qualifier id of the timestamp.
pub const QUALIFIER_TIMESTAMP: u64 = 0;

/// Qualifier id of the network id.
pub const QUALIFIER_NETWORK_ID: u64 = 1;

/// Qualifier id of the issued-to address.
pub const QUALIFIER_ISSUED_TO: u64 = 2;

// ============================================
// Qualifier
// ============================================

/// One (id, value, max delta) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qualifier {
    /// Qualifier id.
    pub id: u64,
    /// Value.
    pub value: u64,
    /// Largest tolerated difference from a peer's value.
    pub max_delta: u64,
}

// ============================================
// CertificateOfMembership
// ============================================

/// Certificate of Membership.
///
/// # Example
/// ```
/// use vlink_common::types::{Address, NetworkId};
/// use vlink_core::credential::CertificateOfMembership;
///
/// let nwid = NetworkId::new(0x8056_c2e2_1c00_0001);
/// let mine = CertificateOfMembership::new(10_000, 5_000, nwid, Address::from_u64(1));
/// let theirs = CertificateOfMembership::new(13_000, 5_000, nwid, Address::from_u64(2));
/// assert!(mine.agrees_with(&theirs));
///
/// let stale = CertificateOfMembership::new(1_000, 5_000, nwid, Address::from_u64(3));
/// assert!(!mine.agrees_with(&stale));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateOfMembership {
    qualifiers: Vec<Qualifier>,
    signed_by: Address,
    signature: Vec<u8>,
}

impl CertificateOfMembership {
    /// Creates an unsigned COM with the standard qualifiers.
    #[must_use]
    pub fn new(timestamp: i64, max_delta: u64, nwid: NetworkId, issued_to: Address) -> Self {
        Self {
            qualifiers: vec![
                Qualifier {
                    id: QUALIFIER_TIMESTAMP,
                    value: timestamp as u64,
                    max_delta,
                },
                Qualifier {
                    id: QUALIFIER_NETWORK_ID,
                    value: nwid.as_u64(),
                    max_delta: 0,
                },
                Qualifier {
                    id: QUALIFIER_ISSUED_TO,
                    value: issued_to.as_u64(),
                    max_delta: u64::MAX,
                },
            ],
            signed_by: Address::NIL,
            signature: Vec::new(),
        }
    }

    /// Creates an unsigned COM from arbitrary qualifiers.
    ///
    /// # Errors
    /// `InvalidSerializedData` if ids are not strictly ascending, or
    /// `MessageTooLarge` if there are more than `MAX_QUALIFIERS`.
    pub fn with_qualifiers(qualifiers: Vec<Qualifier>) -> Result<Self> {
        if qualifiers.len() > MAX_QUALIFIERS {
            return Err(CoreError::too_large(MAX_QUALIFIERS, qualifiers.len()));
        }
        if !qualifiers.windows(2).all(|w| w[0].id < w[1].id) {
            return Err(CoreError::invalid_data("qualifiers not in ascending order"));
        }
        Ok(Self {
            qualifiers,
            ..Self::default()
        })
    }

    fn qualifier(&self, id: u64) -> Option<&Qualifier> {
        self.qualifiers
            .binary_search_by_key(&id, |q| q.id)
            .ok()
            .map(|idx| &self.qualifiers[idx])
    }

    /// All qualifiers in ascending id order.
    #[must_use]
    pub fn qualifiers(&self) -> &[Qualifier] {
        &self.qualifiers
    }

    /// Timestamp qualifier, or 0 if absent.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.qualifier(QUALIFIER_TIMESTAMP)
            .map_or(0, |q| q.value as i64)
    }

    /// Network id qualifier, or 0 if absent.
    #[must_use]
    pub fn network_id(&self) -> NetworkId {
        NetworkId::new(self.qualifier(QUALIFIER_NETWORK_ID).map_or(0, |q| q.value))
    }

    /// Issued-to qualifier, or nil if absent.
    #[must_use]
    pub fn issued_to(&self) -> Address {
        self.qualifier(QUALIFIER_ISSUED_TO)
            .map_or(Address::NIL, |q| Address::from_u64(q.value))
    }

    /// Signer address; nil if unsigned.
    #[must_use]
    pub const fn signer(&self) -> Address {
        self.signed_by
    }

    /// Signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Returns `true` if a signature is attached.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.signed_by.is_nil() && !self.signature.is_empty()
    }

    /// Returns `true` if `other` agrees with this certificate.
    ///
    /// Every qualifier of `self` must exist in `other` and differ by at
    /// most the smaller of the two declared max deltas. Qualifiers only
    /// present in `other` are ignored.
    #[must_use]
    pub fn agrees_with(&self, other: &Self) -> bool {
        if self.qualifiers.is_empty() {
            return false;
        }
        self.qualifiers.iter().all(|mine| {
            other.qualifier(mine.id).is_some_and(|theirs| {
                mine.value.abs_diff(theirs.value) <= mine.max_delta.min(theirs.max_delta)
            })
        })
    }
}

impl Signable for CertificateOfMembership {
    const TYPE: CredentialType = CredentialType::Com;

    fn encode_signed_fields(&self, buf: &mut BytesMut) {
        for q in &self.qualifiers {
            buf.put_u64(q.id);
            buf.put_u64(q.value);
            buf.put_u64(q.max_delta);
        }
        buf.put_address(self.signed_by);
    }

    fn set_signature(&mut self, signer: Address, signature: Vec<u8>) {
        self.signed_by = signer;
        self.signature = signature;
    }
}

impl WireCodec for CertificateOfMembership {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(COM_FORMAT);
        buf.put_u16(self.qualifiers.len() as u16);
        for q in &self.qualifiers {
            buf.put_u64(q.id);
            buf.put_u64(q.value);
            buf.put_u64(q.max_delta);
        }
        buf.put_address(self.signed_by);
        if !self.signed_by.is_nil() {
            encode_trailer(buf, &self.signature);
        }
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let format = reader.read_u8()?;
        if format != COM_FORMAT {
            return Err(CoreError::invalid_data(format!("unknown COM format {format}")));
        }
        let count = usize::from(reader.read_u16()?);
        if count > MAX_QUALIFIERS {
            return Err(CoreError::too_large(MAX_QUALIFIERS, count));
        }

        let mut qualifiers: Vec<Qualifier> = Vec::with_capacity(count);
        for _ in 0..count {
            let q = Qualifier {
                id: reader.read_u64()?,
                value: reader.read_u64()?,
                max_delta: reader.read_u64()?,
            };
            if qualifiers.last().is_some_and(|prev| prev.id >= q.id) {
                return Err(CoreError::invalid_data("qualifiers not in ascending order"));
            }
            qualifiers.push(q);
        }

        let signed_by = reader.read_address()?;
        let signature = if signed_by.is_nil() {
            Vec::new()
        } else {
            decode_trailer(reader)?
        };

        Ok(Self {
            qualifiers,
            signed_by,
            signature,
        })
    }
}

// ============================================
// Tests
// ============================================
