// ============================================
// File: crates/vlink-node/src/services/mod.rs
// ============================================
//! # Node Services
//!
//! ## Creation Reason
//! Stateful pieces the verb handlers work against. Each service owns
//! its own synchronization so handlers can run on any worker thread.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`peer`]: Known remote node (identity, key, version)
//! - [`topology`]: Peer store, identity lookup, WHOIS
//! - [`membership`]: Per-peer credential ledger and gate
//! - [`network`]: Joined network state and filtering
//! - [`multicast`]: Multicast subscriptions
//! - [`retry`]: Packets deferred on a pending identity
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Services                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐   identity    ┌──────────────────────┐   │
//! │  │   Topology   │◄──────────────│  Network (per nwid)  │   │
//! │  │              │   lookups     │                      │   │
//! │  │  Peer ...    │               │  Membership (per     │   │
//! │  │  WHOIS       │               │  peer) + Multicast   │   │
//! │  └──────┬───────┘               └──────────────────────┘   │
//! │         │ identity learned                                 │
//! │         ▼                                                  │
//! │  ┌──────────────┐                                          │
//! │  │  RetryQueue  │  deferred packets replayed              │
//! │  └──────────────┘                                          │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Services never call back into the dispatcher
//! - Lock order: network config, then membership; topology is lock-free
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod membership;
pub mod multicast;
pub mod network;
pub mod peer;
pub mod retry;
pub mod topology;

pub use membership::{AddResult, Membership, MembershipView};
pub use multicast::MulticastSubscriptions;
pub use network::{MembershipHandle, Network, NetworkTable};
pub use peer::{Peer, RemoteVersion};
pub use retry::{DeferredPacket, RetryQueue};
pub use topology::{AddPeerResult, Topology};
