// ============================================
// File: crates/vlink-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for wire decoding, credential handling and packet
//! cryptography in the vlink core crate.
//!
//! ## Error Categories
//! 1. **Malformed input**: truncated or oversized wire fields
//! 2. **Authentication**: bad MAC, bad signature
//! 3. **Key handling**: missing private key, key derivation
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - Everything decoded from the wire is untrusted; decoding errors are
//!   routine and must stay cheap to construct
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use vlink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for decoding and cryptographic operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Decoding Errors
    // ========================================

    /// Serialized data is structurally invalid.
    #[error("Invalid serialized data: {reason}")]
    InvalidSerializedData {
        /// What's wrong with the data
        reason: String,
    },

    /// Input ended before a field could be read.
    #[error("Message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length available
        actual: usize,
    },

    /// Input exceeds the maximum allowed size.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size received
        actual: usize,
    },

    /// A signature length field exceeds the signature buffer.
    #[error("Signature too long: {len} bytes exceeds maximum {max}")]
    SignatureTooLong {
        /// Declared signature length
        len: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// Unknown verb code.
    #[error("Unknown verb: 0x{0:02x}")]
    UnknownVerb(u8),

    /// Unsupported cipher suite selector.
    #[error("Unsupported cipher suite: {0}")]
    UnsupportedCipher(u8),

    /// Payload compression or decompression failed.
    #[error("Compression error: {reason}")]
    Compression {
        /// Why the codec failed
        reason: String,
    },

    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Packet MAC did not verify.
    #[error("Packet authentication failed")]
    Authentication,

    /// Signature verification failed.
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Operation requires a private key the identity does not hold.
    #[error("Identity {address} holds no private key")]
    MissingPrivateKey {
        /// Address of the public-only identity
        address: String,
    },

    /// Identity failed local validation.
    #[error("Invalid identity: {reason}")]
    InvalidIdentity {
        /// Why the identity is invalid
        reason: String,
    },

    /// Key derivation failed.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// Why derivation failed
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidSerializedData` error.
    pub fn invalid_data(reason: impl Into<String>) -> Self {
        Self::InvalidSerializedData {
            reason: reason.into(),
        }
    }

    /// Creates a `MessageTooShort` error.
    #[must_use]
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }

    /// Creates a `MessageTooLarge` error.
    #[must_use]
    pub const fn too_large(max: usize, actual: usize) -> Self {
        Self::MessageTooLarge { max, actual }
    }

    /// Creates a `Compression` error.
    pub fn compression(reason: impl Into<String>) -> Self {
        Self::Compression {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidIdentity` error.
    pub fn invalid_identity(reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            reason: reason.into(),
        }
    }

    /// Creates a `KeyDerivation` error.
    pub fn key_derivation(reason: impl Into<String>) -> Self {
        Self::KeyDerivation {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the input could not be parsed.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::InvalidSerializedData { .. }
                | Self::MessageTooShort { .. }
                | Self::MessageTooLarge { .. }
                | Self::SignatureTooLong { .. }
                | Self::UnknownVerb(_)
                | Self::UnsupportedCipher(_)
                | Self::Compression { .. }
        )
    }

    /// Returns `true` if this is an authentication failure.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication | Self::SignatureVerification)
    }

    /// Returns `true` if this error might indicate an attack.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::Authentication
                | Self::SignatureVerification
                | Self::SignatureTooLong { .. }
                | Self::InvalidIdentity { .. }
        )
    }
}

// ============================================
// Tests
// ============================================
