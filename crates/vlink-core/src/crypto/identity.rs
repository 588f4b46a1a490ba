// ============================================
// File: crates/vlink-core/src/crypto/identity.rs
// ============================================
//! # Node Identity
//!
//! ## Creation Reason
//! A node is named by a 40-bit address that is derived from its public
//! keys, so anyone holding the full identity can check that an address
//! claim is genuine.
//!
//! ## Main Functionality
//! - `Identity::generate`: fresh key pair with a valid derived address
//! - `Identity::locally_validate`: recompute and check the derivation
//! - `Identity::sign` / `Identity::verify`: Ed25519 over arbitrary bytes
//! - `Identity::agree`: X25519 agreement + HKDF into a `PeerKey`
//! - Wire codec (public form, or with secrets for local storage)
//!
//! ## Identity Layout
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ address (5) │ type (1) = 0                           │
//! ├──────────────────────────────────────────────────────┤
//! │ Ed25519 public (32) │ X25519 public (32)             │
//! ├──────────────────────────────────────────────────────┤
//! │ secret length (1) = 0 | 64                           │
//! │ [Ed25519 seed (32) │ X25519 secret (32)]             │
//! └──────────────────────────────────────────────────────┘
//!
//! address = SHA-512(Ed25519 public ‖ X25519 public)[59..64]
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Secret keys are never logged; `Debug` only prints the address
//! - Identities received from the wire are public-only; `sign` on them
//!   returns `MissingPrivateKey`
//!
//! ## Last Modified
//! v0.1.0 - Initial identity implementation

use std::fmt;

use bytes::{BufMut, BytesMut};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

use vlink_common::types::{Address, ADDRESS_SIZE};

use super::kdf::{derive_peer_key, PeerKey};
use super::{
    ED25519_PUBLIC_KEY_SIZE, ED25519_SECRET_KEY_SIZE, ED25519_SIGNATURE_SIZE,
    X25519_PUBLIC_KEY_SIZE, X25519_SECRET_KEY_SIZE,
};
use crate::error::{CoreError, Result};
use crate::wire::{PutWire, WireCodec, WireReader};

// ============================================
// Constants
// ============================================

/// Identity type byte for the Ed25519/X25519 scheme.
pub const IDENTITY_TYPE_C25519: u8 = 0;

const SECRET_LEN: usize = ED25519_SECRET_KEY_SIZE + X25519_SECRET_KEY_SIZE;

/// Encoded size of a public identity.
pub const IDENTITY_PUBLIC_SIZE: usize =
    ADDRESS_SIZE + 1 + ED25519_PUBLIC_KEY_SIZE + X25519_PUBLIC_KEY_SIZE + 1;

// ============================================
// Identity
// ============================================

#[derive(Clone)]
struct IdentitySecrets {
    signing: SigningKey,
    agreement: StaticSecret,
}

/// A node identity: address plus public keys, optionally with secrets.
///
/// # Example
/// ```
/// use vlink_core::crypto::Identity;
///
/// let id = Identity::generate();
/// assert!(id.locally_validate());
///
/// let sig = id.sign(b"hello").unwrap();
/// assert!(id.to_public().verify(b"hello", &sig));
/// ```
#[derive(Clone)]
pub struct Identity {
    address: Address,
    verifying: VerifyingKey,
    agreement_public: X25519PublicKey,
    secrets: Option<IdentitySecrets>,
}

impl Identity {
    // ========================================
    // Construction
    // ========================================

    /// Generates a new identity, retrying until the derived address is a
    /// valid node address.
    #[must_use]
    pub fn generate() -> Self {
        loop {
            let signing = SigningKey::generate(&mut OsRng);
            let agreement = StaticSecret::random_from_rng(OsRng);
            let verifying = signing.verifying_key();
            let agreement_public = X25519PublicKey::from(&agreement);

            let address = derive_address(&verifying, &agreement_public);
            if address.is_valid() {
                return Self {
                    address,
                    verifying,
                    agreement_public,
                    secrets: Some(IdentitySecrets { signing, agreement }),
                };
            }
        }
    }

    /// Returns a copy without secret keys.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            address: self.address,
            verifying: self.verifying,
            agreement_public: self.agreement_public,
            secrets: None,
        }
    }

    // ========================================
    // Accessors
    // ========================================

    /// The identity's overlay address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns `true` if secret keys are held.
    #[must_use]
    pub const fn has_private(&self) -> bool {
        self.secrets.is_some()
    }

    /// Raw Ed25519 public key.
    #[must_use]
    pub fn signing_public_key(&self) -> [u8; ED25519_PUBLIC_KEY_SIZE] {
        self.verifying.to_bytes()
    }

    /// Raw X25519 public key.
    #[must_use]
    pub fn agreement_public_key(&self) -> [u8; X25519_PUBLIC_KEY_SIZE] {
        self.agreement_public.to_bytes()
    }

    /// Returns `true` if both identities carry the same address and keys.
    #[must_use]
    pub fn same_public(&self, other: &Self) -> bool {
        self.address == other.address
            && self.verifying == other.verifying
            && self.agreement_public.as_bytes() == other.agreement_public.as_bytes()
    }

    // ========================================
    // Validation
    // ========================================

    /// Recomputes the address from the public keys and checks it.
    #[must_use]
    pub fn locally_validate(&self) -> bool {
        self.address.is_valid()
            && derive_address(&self.verifying, &self.agreement_public) == self.address
    }

    // ========================================
    // Signatures
    // ========================================

    /// Signs `message`.
    ///
    /// # Errors
    /// `MissingPrivateKey` if this is a public-only identity.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; ED25519_SIGNATURE_SIZE]> {
        let secrets = self
            .secrets
            .as_ref()
            .ok_or_else(|| CoreError::MissingPrivateKey {
                address: self.address.to_string(),
            })?;
        Ok(secrets.signing.sign(message).to_bytes())
    }

    /// Verifies a signature made by this identity.
    ///
    /// Signatures of the wrong length never verify.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(bytes) = <[u8; ED25519_SIGNATURE_SIZE]>::try_from(signature) else {
            return false;
        };
        self.verifying
            .verify(message, &Signature::from_bytes(&bytes))
            .is_ok()
    }

    // ========================================
    // Key Agreement
    // ========================================

    /// Derives the pairwise key shared with `other`.
    ///
    /// # Errors
    /// `MissingPrivateKey` if this identity holds no secrets, or
    /// `KeyDerivation` if HKDF fails.
    pub fn agree(&self, other: &Self) -> Result<PeerKey> {
        let secrets = self
            .secrets
            .as_ref()
            .ok_or_else(|| CoreError::MissingPrivateKey {
                address: self.address.to_string(),
            })?;
        let shared = secrets.agreement.diffie_hellman(&other.agreement_public);
        derive_peer_key(shared.as_bytes(), self.address, other.address)
    }

    // ========================================
    // Serialization
    // ========================================

    /// Encodes the identity including its secret keys.
    ///
    /// # Security Warning
    /// The output contains private key material.
    pub fn encode_with_secrets(&self, buf: &mut BytesMut) {
        self.encode_public_fields(buf);
        match &self.secrets {
            Some(secrets) => {
                buf.put_u8(SECRET_LEN as u8);
                let mut seed = secrets.signing.to_bytes();
                buf.put_slice(&seed);
                seed.zeroize();
                let mut agreement = secrets.agreement.to_bytes();
                buf.put_slice(&agreement);
                agreement.zeroize();
            }
            None => buf.put_u8(0),
        }
    }

    fn encode_public_fields(&self, buf: &mut BytesMut) {
        buf.put_address(self.address);
        buf.put_u8(IDENTITY_TYPE_C25519);
        buf.put_slice(self.verifying.as_bytes());
        buf.put_slice(self.agreement_public.as_bytes());
    }
}

impl WireCodec for Identity {
    /// Encodes the public form only.
    fn encode(&self, buf: &mut BytesMut) {
        self.encode_public_fields(buf);
        buf.put_u8(0);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let address = reader.read_address()?;
        let kind = reader.read_u8()?;
        if kind != IDENTITY_TYPE_C25519 {
            return Err(CoreError::invalid_identity(format!(
                "unsupported identity type {kind}"
            )));
        }

        let ed_public: [u8; ED25519_PUBLIC_KEY_SIZE] = reader.read_array()?;
        let verifying = VerifyingKey::from_bytes(&ed_public)
            .map_err(|_| CoreError::invalid_identity("bad Ed25519 public key"))?;
        let x_public: [u8; X25519_PUBLIC_KEY_SIZE] = reader.read_array()?;
        let agreement_public = X25519PublicKey::from(x_public);

        let secrets = match usize::from(reader.read_u8()?) {
            0 => None,
            SECRET_LEN => {
                let mut seed: [u8; ED25519_SECRET_KEY_SIZE] = reader.read_array()?;
                let signing = SigningKey::from_bytes(&seed);
                seed.zeroize();
                let agreement_bytes: [u8; X25519_SECRET_KEY_SIZE] = reader.read_array()?;
                let agreement = StaticSecret::from(agreement_bytes);

                if signing.verifying_key() != verifying
                    || X25519PublicKey::from(&agreement).as_bytes() != agreement_public.as_bytes()
                {
                    return Err(CoreError::invalid_identity(
                        "secret keys do not match public keys",
                    ));
                }
                Some(IdentitySecrets { signing, agreement })
            }
            other => {
                return Err(CoreError::invalid_identity(format!(
                    "bad secret key length {other}"
                )))
            }
        };

        Ok(Self {
            address,
            verifying,
            agreement_public,
            secrets,
        })
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.same_public(other)
    }
}

impl Eq for Identity {}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("fingerprint", &hex::encode(&self.verifying.as_bytes()[..8]))
            .field("has_private", &self.has_private())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

// ============================================
// Address Derivation
// ============================================

fn derive_address(verifying: &VerifyingKey, agreement: &X25519PublicKey) -> Address {
    let mut hasher = Sha512::new();
    hasher.update(verifying.as_bytes());
    hasher.update(agreement.as_bytes());
    let digest = hasher.finalize();
    Address::from_bytes(&digest[digest.len() - ADDRESS_SIZE..]).unwrap_or(Address::NIL)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_valid_address() {
        let id = Identity::generate();
        assert!(id.address().is_valid());
        assert!(id.locally_validate());
        assert!(id.has_private());
    }

    #[test]
    fn test_sign_verify() {
        let id = Identity::generate();
        let sig = id.sign(b"payload").unwrap();
        assert!(id.verify(b"payload", &sig));
        assert!(!id.verify(b"payloaD", &sig));
        assert!(!id.verify(b"payload", &sig[..63]));
    }

    #[test]
    fn test_public_identity_cannot_sign() {
        let public = Identity::generate().to_public();
        assert!(matches!(
            public.sign(b"x"),
            Err(CoreError::MissingPrivateKey { .. })
        ));
    }

    #[test]
    fn test_public_wire_roundtrip() {
        let id = Identity::generate();
        let bytes = id.to_bytes();
        assert_eq!(bytes.len(), IDENTITY_PUBLIC_SIZE);

        let (decoded, used) = Identity::from_bytes(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, id);
        assert_eq!(decoded.agreement_public_key(), id.agreement_public_key());
        assert!(!decoded.has_private());
        assert!(decoded.locally_validate());
    }

    #[test]
    fn test_secret_wire_roundtrip() {
        let id = Identity::generate();
        let mut buf = BytesMut::new();
        id.encode_with_secrets(&mut buf);

        let (decoded, _) = Identity::from_bytes(&buf).unwrap();
        assert!(decoded.has_private());
        let sig = decoded.sign(b"m").unwrap();
        assert!(id.verify(b"m", &sig));
    }

    #[test]
    fn test_forged_address_fails_validation() {
        let id = Identity::generate();
        let mut bytes = id.to_bytes();
        bytes[0] ^= 0x01;
        let (forged, _) = Identity::from_bytes(&bytes).unwrap();
        assert!(!forged.locally_validate());
    }

    #[test]
    fn test_agreement_symmetric() {
        let a = Identity::generate();
        let b = Identity::generate();
        let k1 = a.agree(&b.to_public()).unwrap();
        let k2 = b.agree(&a.to_public()).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let id = Identity::generate();
        let debug = format!("{id:?}");
        assert!(debug.contains("has_private: true"));
        assert!(debug.contains(&hex::encode(&id.signing_public_key()[..8])));
        assert!(!debug.contains("signing"));
    }
}
