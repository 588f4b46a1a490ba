// ============================================
// File: crates/vlink-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the overlay wire protocol: the packet header, its
//! authentication, the verb table and the typed payload of each verb.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`packet`]: Packet header, armor and compression
//! - [`verb`]: Verb ids and ERROR reason codes
//! - [`messages`]: Typed verb payloads
//! - [`compress`]: Bounded zstd payload compression
//! - [`version`]: Protocol and software versions
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  A ─────── HELLO (identity, in the clear, MAC'd) ──────► B │
//! │  A ◄────── OK(HELLO) ────────────────────────────────── B  │
//! │                                                             │
//! │  A ─────── NETWORK_CREDENTIALS (COM, caps, tags) ──────► B │
//! │  A ═══════ FRAME / EXT_FRAME (armored) ════════════════► B │
//! │  A ◄────── ERROR(NEED_MEMBERSHIP_CERTIFICATE) ───────── B  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ANY wire change requires a protocol version bump
//! - Big-endian byte order everywhere
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod compress;
pub mod messages;
pub mod packet;
pub mod verb;
pub mod version;

pub use packet::{CipherSuite, Packet, MAX_PACKET_SIZE, MIN_PACKET_SIZE};
pub use verb::{ErrorCode, Verb};
pub use version::{ProtocolVersion, SoftwareVersion, CURRENT_PROTOCOL_VERSION};
