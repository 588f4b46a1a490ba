// ============================================
// File: crates/vlink-common/src/lib.rs
// ============================================
//! # vlink Common - Shared Types Library
//!
//! ## Creation Reason
//! Provides the identifier types every other vlink crate speaks in:
//! overlay addresses, virtual MAC addresses, network ids and multicast
//! groups, plus a millisecond clock used for credential timestamps.
//!
//! ## Main Functionality
//! - [`types`]: `Address`, `NetworkId`, `Mac`, `MulticastGroup`
//! - [`time`]: Millisecond clock and atomic timestamps
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 vlink-node                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     vlink-core  ◄──── vlink-transport               │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              vlink-common  ◄── You are here         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Wire sizes of the identifier types are fixed by the protocol
//! - Keep dependencies minimal
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use types::{Address, Mac, MulticastGroup, NetworkId};
