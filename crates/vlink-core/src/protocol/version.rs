// ============================================
// File: crates/vlink-core/src/protocol/version.rs
// ============================================
//! # Protocol Versioning
//!
//! ## Creation Reason
//! HELLO carries the sender's protocol version; peers older than the
//! minimum are refused with ERROR(BAD_PROTOCOL_VERSION).
//!
//! ## Version History
//! | Version | Description |
//! |---------|-------------|
//! | 4       | Oldest version still accepted |
//! | 11      | Current: COO credentials, trusted paths, zstd payloads |
//!
//! ## Last Modified
//! v0.1.0 - Initial version definitions

use std::fmt;

// ============================================
// Constants
// ============================================

/// Protocol version spoken by this node.
pub const CURRENT_PROTOCOL_VERSION: u8 = 11;

/// Oldest protocol version accepted in HELLO.
pub const MIN_SUPPORTED_VERSION: u8 = 4;

/// Software version advertised in HELLO.
pub const SOFTWARE_VERSION: SoftwareVersion = SoftwareVersion {
    major: 0,
    minor: 1,
    revision: 0,
};

// ============================================
// ProtocolVersion
// ============================================

/// Protocol version identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(u8);

impl ProtocolVersion {
    /// Creates a protocol version.
    #[must_use]
    pub const fn new(version: u8) -> Self {
        Self(version)
    }

    /// Returns the current protocol version.
    #[must_use]
    pub const fn current() -> Self {
        Self(CURRENT_PROTOCOL_VERSION)
    }

    /// Returns the raw version number.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Checks if a peer speaking this version may be admitted.
    ///
    /// Newer versions are accepted; they must stay wire compatible.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.0 >= MIN_SUPPORTED_VERSION
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u8> for ProtocolVersion {
    fn from(version: u8) -> Self {
        Self(version)
    }
}

// ============================================
// SoftwareVersion
// ============================================

/// Software release advertised by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SoftwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Revision.
    pub revision: u16,
}

impl fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

// ============================================
// Tests
// ============================================
