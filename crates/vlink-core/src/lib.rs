// ============================================
// File: crates/vlink-core/src/lib.rs
// ============================================
//! # vlink Core - Trust & Protocol Library
//!
//! ## Creation Reason
//! Holds everything that decides whether a packet or frame is trusted:
//! identities and packet authentication, controller-signed credentials,
//! the rule engine, and the overlay wire protocol. It performs no I/O;
//! the node crate drives it.
//!
//! ## Main Functionality
//!
//! ### Wire ([`wire`], [`protocol`])
//! - Bounds-checked reader used by every decoder
//! - Packet header, armor, compression, verb payloads
//!
//! ### Trust ([`crypto`], [`credential`])
//! - `Identity`, peer keys, per-packet MAC/encryption
//! - COM, Capability, Tag, COO, Revocation and their verifier
//!
//! ### Policy ([`rules`], [`filter`], [`netconf`])
//! - Rule model and codec, filter evaluation, network configuration
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 vlink-node                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     vlink-core  ◄──── vlink-transport               │
//! │   You are here                │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              vlink-common                           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto / dalek crates
//! - Decoders must go through `WireReader`; never index raw input
//! - Signed credentials are immutable; share them, don't copy-modify
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod credential;
pub mod crypto;
pub mod error;
pub mod filter;
pub mod netconf;
pub mod protocol;
pub mod rules;
pub mod wire;

// Re-export commonly used items
pub use credential::{Credential, CredentialType, CredentialVerifier, IdentityLookup, VerifyResult};
pub use crypto::{Identity, PeerKey};
pub use error::{CoreError, Result};
pub use filter::{FilterOutcome, Verdict};
pub use netconf::NetworkConfig;
pub use protocol::{Packet, Verb};
pub use rules::Rule;
pub use wire::{WireCodec, WireReader};
