// ============================================
// File: crates/vlink-node/src/lib.rs
// ============================================
//! # vlink Node Library
//!
//! ## Creation Reason
//! The stateful half of the overlay: who our peers are, what each of
//! them has proven on every joined network, and what to do with each
//! packet they send.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: TOML node configuration
//! - [`node`]: `Node` aggregate and housekeeping
//! - [`handlers`]: Verb dispatcher and handlers
//! - [`services`]: Business logic services
//!   - [`services::topology`]: Peer store and WHOIS
//!   - [`services::membership`]: Per-peer credential ledger
//!   - [`services::network`]: Joined networks and the gate
//!   - [`services::retry`]: Deferred packets
//! - [`error`]: Node-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           vlink Node                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐  │
//! │  │   Config    │────►│    Node     │────►│   Dispatcher    │  │
//! │  │   (TOML)    │     │             │     │  vl1 / vl2      │  │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘  │
//! │                             │                     │           │
//! │         ┌───────────────────┼───────────────────┬─┘           │
//! │         ▼                   ▼                   ▼             │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     │
//! │  │  Topology   │     │  Networks + │     │ RetryQueue  │     │
//! │  │  (peers)    │     │ Memberships │     │             │     │
//! │  └─────────────┘     └─────────────┘     └─────────────┘     │
//! │                                                               │
//! ├───────────────────────────────────────────────────────────────┤
//! │                  Host collaborators (traits)                  │
//! │  ┌─────────────────────┐     ┌─────────────────────────────┐ │
//! │  │    PacketSender     │     │        VirtualPort          │ │
//! │  │  (armor + send)     │     │   (admitted frames)         │ │
//! │  └─────────────────────┘     └─────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Peer → datagram → authenticate → verb handler → gate → filter → VirtualPort
//! Peer ← PacketSender ← OK / ERROR / WHOIS / NETWORK_CREDENTIALS
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The library never installs a tracing subscriber; hosts do
//! - No socket I/O lives here, hosts own the sockets
//!
//! ## Last Modified
//! v0.1.0 - Initial node library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod node;
pub mod services;

#[cfg(test)]
mod testing;

// Re-export primary types
pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use handlers::{ProcessResult, RejectReason, StatsSnapshot};
pub use node::{HousekeepingReport, Node};
