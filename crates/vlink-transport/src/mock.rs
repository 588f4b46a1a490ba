// ============================================
// File: crates/vlink-transport/src/mock.rs
// ============================================
//! # Recording Mocks
//!
//! ## Creation Reason
//! Lets node tests observe every packet sent and every frame delivered
//! without sockets or a virtual device.
//!
//! ## Usage in Tests
//! ```
//! use vlink_transport::{MockSender, PacketSender};
//! use vlink_common::types::Address;
//! use vlink_core::protocol::Verb;
//!
//! let sender = MockSender::new();
//! sender.send_packet(Address::from_u64(1), Verb::Nop, b"").unwrap();
//! assert_eq!(sender.take_sent().len(), 1);
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Queues are bounded to prevent memory issues
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use vlink_common::types::{Address, Mac, NetworkId};
use vlink_core::protocol::Verb;
use vlink_core::wire::WireCodec;

use crate::error::{Result, TransportError};
use crate::traits::{PacketSender, VirtualPort};

// ============================================
// Constants
// ============================================

/// Maximum number of records kept per mock.
const MAX_QUEUE_SIZE: usize = 1000;

// ============================================
// MockSender
// ============================================

/// A packet captured by `MockSender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    /// Destination peer.
    pub dest: Address,
    /// Verb.
    pub verb: Verb,
    /// Plain payload.
    pub payload: Bytes,
}

impl SentPacket {
    /// Decodes the payload as `T`.
    ///
    /// # Errors
    /// Returns the decoder's error if the payload is not a valid `T`.
    pub fn decode<T: WireCodec>(&self) -> vlink_core::Result<T> {
        T::from_bytes(&self.payload).map(|(value, _)| value)
    }
}

/// `PacketSender` that records instead of sending.
#[derive(Default)]
pub struct MockSender {
    sent: Mutex<VecDeque<SentPacket>>,
    failing: AtomicBool,
}

impl MockSender {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Takes all recorded packets.
    #[must_use]
    pub fn take_sent(&self) -> Vec<SentPacket> {
        self.sent.lock().drain(..).collect()
    }

    /// Takes recorded packets with the given verb, keeping the others.
    #[must_use]
    pub fn take_verb(&self, verb: Verb) -> Vec<SentPacket> {
        let mut queue = self.sent.lock();
        let (matched, rest): (Vec<_>, Vec<_>) = queue.drain(..).partition(|p| p.verb == verb);
        queue.extend(rest);
        matched
    }

    /// Number of recorded packets.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl PacketSender for MockSender {
    fn send_packet(&self, dest: Address, verb: Verb, payload: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::Acquire) {
            return Err(TransportError::send_failed(dest, "mock failure"));
        }
        let mut queue = self.sent.lock();
        if queue.len() >= MAX_QUEUE_SIZE {
            return Err(TransportError::QueueFull {
                capacity: MAX_QUEUE_SIZE,
            });
        }
        trace!(dest = %dest, verb = %verb, len = payload.len(), "Mock send");
        queue.push_back(SentPacket {
            dest,
            verb,
            payload: Bytes::copy_from_slice(payload),
        });
        Ok(())
    }
}

impl std::fmt::Debug for MockSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSender")
            .field("sent", &self.sent_count())
            .field("failing", &self.failing.load(Ordering::Relaxed))
            .finish()
    }
}

// ============================================
// MockPort
// ============================================

/// A frame captured by `MockPort`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredFrame {
    /// Network.
    pub nwid: NetworkId,
    /// Source MAC.
    pub source: Mac,
    /// Destination MAC.
    pub dest: Mac,
    /// Ethernet type.
    pub ether_type: u16,
    /// VLAN id.
    pub vlan_id: u16,
    /// Frame payload.
    pub data: Bytes,
}

/// `VirtualPort` that records delivered frames.
#[derive(Default)]
pub struct MockPort {
    delivered: Mutex<VecDeque<DeliveredFrame>>,
}

impl MockPort {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes all delivered frames.
    #[must_use]
    pub fn take_delivered(&self) -> Vec<DeliveredFrame> {
        self.delivered.lock().drain(..).collect()
    }

    /// Number of delivered frames.
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }
}

impl VirtualPort for MockPort {
    fn deliver_frame(
        &self,
        nwid: NetworkId,
        source: Mac,
        dest: Mac,
        ether_type: u16,
        vlan_id: u16,
        data: &[u8],
    ) -> Result<()> {
        let mut queue = self.delivered.lock();
        if queue.len() >= MAX_QUEUE_SIZE {
            return Err(TransportError::QueueFull {
                capacity: MAX_QUEUE_SIZE,
            });
        }
        queue.push_back(DeliveredFrame {
            nwid,
            source,
            dest,
            ether_type,
            vlan_id,
            data: Bytes::copy_from_slice(data),
        });
        Ok(())
    }
}

impl std::fmt::Debug for MockPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPort")
            .field("delivered", &self.delivered_count())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use vlink_core::protocol::messages::Whois;

    #[test]
    fn test_sender_records_and_drains() {
        let sender = MockSender::new();
        let whois = Whois {
            addresses: vec![Address::from_u64(9)],
        };
        sender
            .send_packet(Address::from_u64(1), Verb::Whois, &whois.to_bytes())
            .unwrap();
        sender
            .send_packet(Address::from_u64(2), Verb::Nop, b"")
            .unwrap();

        let whoises = sender.take_verb(Verb::Whois);
        assert_eq!(whoises.len(), 1);
        assert_eq!(whoises[0].decode::<Whois>().unwrap(), whois);
        assert_eq!(sender.sent_count(), 1);
        assert_eq!(sender.take_sent()[0].verb, Verb::Nop);
        assert_eq!(sender.sent_count(), 0);
    }

    #[test]
    fn test_sender_failure_mode() {
        let sender = MockSender::new();
        sender.set_failing(true);
        assert!(sender
            .send_packet(Address::from_u64(1), Verb::Nop, b"")
            .is_err());
        sender.set_failing(false);
        assert!(sender
            .send_packet(Address::from_u64(1), Verb::Nop, b"")
            .is_ok());
    }

    #[test]
    fn test_port_records_frames() {
        let port = MockPort::new();
        port.deliver_frame(
            NetworkId::new(7),
            Mac::from_u64(1),
            Mac::from_u64(2),
            0x0800,
            0,
            b"payload",
        )
        .unwrap();
        let frames = port.take_delivered();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].nwid, NetworkId::new(7));
        assert_eq!(&frames[0].data[..], b"payload");
        assert_eq!(port.delivered_count(), 0);
    }
}
