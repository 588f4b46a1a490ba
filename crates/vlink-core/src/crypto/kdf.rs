// ============================================
// File: crates/vlink-core/src/crypto/kdf.rs
// ============================================
//! # Peer Key Derivation
//!
//! ## Creation Reason
//! Two nodes that know each other's identity share a long-lived symmetric
//! key used to authenticate every packet between them. This module turns
//! the raw X25519 agreement into that key.
//!
//! ## Main Functionality
//! - `PeerKey`: 32-byte pairwise key (zeroized, redacted)
//! - `derive_peer_key`: HKDF-SHA256 over the agreement output
//!
//! ## Key Binding
//! ```text
//! peer_key = HKDF-SHA256(
//!     ikm:  X25519(a, B) == X25519(b, A),
//!     salt: "vlink-v1",
//!     info: "vlink-peer-key" ‖ min(addrA, addrB) ‖ max(addrA, addrB)
//! )
//! ```
//! Ordering the addresses makes both sides derive the same key.
//!
//! ## Last Modified
//! v0.1.0 - Initial peer key derivation

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use vlink_common::types::{Address, ADDRESS_SIZE};

use super::{HKDF_INFO_PREFIX, HKDF_SALT, PEER_KEY_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// PeerKey
// ============================================

/// Symmetric key shared by two identities.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PeerKey([u8; PEER_KEY_SIZE]);

impl PeerKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PEER_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    ///
    /// # Security Warning
    /// Do not log or persist the returned material.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PEER_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerKey([REDACTED])")
    }
}

impl PartialEq for PeerKey {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for PeerKey {}

// ============================================
// Key Derivation
// ============================================

/// Derives the pairwise key from an X25519 shared secret.
///
/// # Errors
/// `KeyDerivation` if HKDF expansion fails.
pub fn derive_peer_key(shared_secret: &[u8; 32], a: Address, b: Address) -> Result<PeerKey> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

    let mut info = Vec::with_capacity(HKDF_INFO_PREFIX.len() + ADDRESS_SIZE * 2);
    info.extend_from_slice(HKDF_INFO_PREFIX);
    info.extend_from_slice(&lo.to_bytes());
    info.extend_from_slice(&hi.to_bytes());

    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared_secret);
    let mut key_bytes = [0u8; PEER_KEY_SIZE];
    hk.expand(&info, &mut key_bytes)
        .map_err(|_| CoreError::key_derivation("HKDF expansion failed"))?;

    Ok(PeerKey::from_bytes(key_bytes))
}

// ============================================
// Tests
// ============================================
