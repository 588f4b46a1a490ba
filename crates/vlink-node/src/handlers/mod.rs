// ============================================
// File: crates/vlink-node/src/handlers/mod.rs
// ============================================
//! # Packet Handlers
//!
//! ## Creation Reason
//! Turns raw datagrams into verb handler calls and every outcome into a
//! `ProcessResult` the host can count, drop or retry.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`dispatcher`]: Parse, authenticate, dispatch, defer and replay
//! - `vl1`: Node-level verbs (HELLO, OK, ERROR, WHOIS, ECHO)
//! - `vl2`: Network-level verbs (frames, credentials, multicast)
//!
//! ## Handler Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  bytes ──► Packet::parse ──► authenticate ──► uncompress    │
//! │                                   │                │        │
//! │                        unknown peer│                ▼        │
//! │                                   ▼          handle_verb    │
//! │                          WHOIS + RetryQueue   │        │    │
//! │                                               ▼        ▼    │
//! │                                            vl1.rs   vl2.rs  │
//! │                                                             │
//! │  identity learned ──► replay queued packets (same loop)     │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers never return errors; every failure is a `ProcessResult`
//! - Handlers must not block: no awaits, no I/O besides `PacketSender`
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod dispatcher;
mod vl1;
mod vl2;

pub use dispatcher::{Dispatcher, DispatcherStats, ProcessResult, RejectReason, StatsSnapshot};
