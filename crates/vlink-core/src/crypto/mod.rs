// ============================================
// File: crates/vlink-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes node identities and packet authentication for the overlay,
//! using audited RustCrypto and dalek implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`identity`]: Node identity (Ed25519 signing + X25519 agreement)
//! - [`kdf`]: Pairwise peer key derivation (HKDF-SHA256)
//! - [`armor`]: Per-packet MAC and optional encryption (ChaCha20 + Poly1305)
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Identity A                                  Identity B     │
//! │    │  X25519 agreement ◄──────────────────────►  │         │
//! │    │              │                               │         │
//! │    │              ▼                               │         │
//! │    │  HKDF-SHA256(addrA, addrB) ─────► PeerKey   │         │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PeerKey ⊕ (dest, source, flags, length) ─► packet key     │
//! │  ChaCha20(packet key, packet id) ─► Poly1305 key + stream  │
//! │  MAC = Poly1305(verb ‖ payload)[0..8]                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER roll your own primitives; only compose RustCrypto ones
//! - ALL secret key types implement Zeroize and redact `Debug`
//! - MAC comparison must stay constant-time
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod armor;
pub mod identity;
pub mod kdf;

pub use identity::Identity;
pub use kdf::{derive_peer_key, PeerKey};

// ============================================
// Constants
// ============================================

/// Size of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 secret seed in bytes.
pub const ED25519_SECRET_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Size of an X25519 public key in bytes.
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an X25519 secret in bytes.
pub const X25519_SECRET_KEY_SIZE: usize = 32;

/// Size of a derived peer key in bytes.
pub const PEER_KEY_SIZE: usize = 32;

/// Size of the truncated packet MAC in bytes.
pub const PACKET_MAC_SIZE: usize = 8;

/// HKDF salt for peer key derivation.
pub const HKDF_SALT: &[u8] = b"vlink-v1";

/// HKDF info prefix for peer key derivation.
pub const HKDF_INFO_PREFIX: &[u8] = b"vlink-peer-key";
