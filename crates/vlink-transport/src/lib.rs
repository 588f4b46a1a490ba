// ============================================
// File: crates/vlink-transport/src/lib.rs
// ============================================
//! # vlink Transport - Collaborator Interfaces
//!
//! ## Creation Reason
//! The node never touches sockets or virtual network devices itself.
//! This crate names the two things it needs from the host (send a packet
//! to a peer, deliver a frame to the local port) and ships recording
//! mocks so the node can be tested without either.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `PacketSender`, `VirtualPort`, `InboundPath`
//! - [`mock`]: `MockSender`, `MockPort` recording implementations
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 vlink-node                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │     vlink-core  ◄──── vlink-transport               │
//! │                       You are here ◄──              │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │              vlink-common                           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Trait methods are synchronous and must not block; implementations
//!   hand work to their own I/O tasks
//! - Always use the traits for testability
//!
//! ## Last Modified
//! v0.1.0 - Initial collaborator interfaces

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod mock;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use mock::{DeliveredFrame, MockPort, MockSender, SentPacket};
pub use traits::{InboundPath, PacketSender, VirtualPort};
