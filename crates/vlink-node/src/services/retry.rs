// ============================================
// File: crates/vlink-node/src/services/retry.rs
// ============================================
//! # Deferred Packet Queue
//!
//! ## Creation Reason
//! A packet whose processing needs an identity we do not have yet is
//! neither accepted nor dropped. It waits here, keyed by the address
//! being looked up, until HELLO or OK(WHOIS) teaches us that identity.
//!
//! ## Main Functionality
//! - `RetryQueue`: per-address FIFOs under a global cap, with a
//!   time-to-live
//! - `DeferredPacket`: raw bytes plus the path they came in on
//!
//! ## ⚠️ Important Note for Next Developer
//! - When a queue is full the oldest packet is evicted
//! - Packets are deferred before the sender is authenticated, so the
//!   number of addresses is attacker-chosen; `max_total` caps the whole
//!   queue and evicts the oldest packet of any address
//! - Draining removes the queue; a packet deferred again on replay is
//!   re-queued by the dispatcher
//!
//! ## Last Modified
//! v0.1.0 - Initial retry queue

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};

use vlink_common::types::Address;
use vlink_transport::traits::InboundPath;

// ============================================
// DeferredPacket
// ============================================

/// A packet waiting for an identity.
#[derive(Debug, Clone)]
pub struct DeferredPacket {
    /// Raw wire bytes as received.
    pub data: Bytes,
    /// Physical path the packet arrived on.
    pub path: InboundPath,
    /// When the packet was queued (ms).
    pub queued_at: i64,
}

// ============================================
// RetryQueue
// ============================================

#[derive(Default)]
struct Queues {
    by_address: HashMap<Address, VecDeque<DeferredPacket>>,
    total: usize,
}

impl Queues {
    /// Removes the packet queued earliest across every address.
    fn evict_oldest(&mut self) -> Option<Address> {
        let oldest = self
            .by_address
            .iter()
            .filter_map(|(address, queue)| queue.front().map(|p| (p.queued_at, *address)))
            .min_by_key(|(queued_at, _)| *queued_at)
            .map(|(_, address)| address)?;

        if let Some(queue) = self.by_address.get_mut(&oldest) {
            queue.pop_front();
            self.total -= 1;
            if queue.is_empty() {
                self.by_address.remove(&oldest);
            }
        }
        Some(oldest)
    }
}

/// Deferred packets grouped by the address they wait on.
pub struct RetryQueue {
    queues: Mutex<Queues>,
    per_address: usize,
    max_total: usize,
    ttl_ms: i64,
}

impl RetryQueue {
    /// Creates a queue holding at most `per_address` packets per address
    /// and `max_total` packets overall, each for at most `ttl_ms`
    /// milliseconds.
    #[must_use]
    pub fn new(per_address: usize, max_total: usize, ttl_ms: i64) -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            per_address: per_address.max(1),
            max_total: max_total.max(1),
            ttl_ms,
        }
    }

    /// Queues `data` until `waiting_on` becomes known.
    ///
    /// Returns `false` if an older packet had to be evicted.
    pub fn push(&self, waiting_on: Address, data: Bytes, path: InboundPath, now: i64) -> bool {
        let mut queues = self.queues.lock();

        let mut evicted = false;
        if let Some(queue) = queues.by_address.get_mut(&waiting_on) {
            let mut dropped = 0;
            while queue.len() >= self.per_address {
                queue.pop_front();
                dropped += 1;
            }
            if dropped > 0 {
                queues.total -= dropped;
                evicted = true;
                debug!(address = %waiting_on, "Retry queue full, evicted oldest packet");
            }
        }
        while queues.total >= self.max_total {
            let Some(victim) = queues.evict_oldest() else {
                break;
            };
            evicted = true;
            debug!(
                address = %waiting_on,
                victim = %victim,
                max_total = self.max_total,
                "Retry queue at capacity, evicted globally oldest packet"
            );
        }

        let queue = queues.by_address.entry(waiting_on).or_default();
        queue.push_back(DeferredPacket {
            data,
            path,
            queued_at: now,
        });
        let queued = queue.len();
        queues.total += 1;

        if !evicted {
            trace!(address = %waiting_on, queued, "Packet deferred");
        }
        !evicted
    }

    /// Removes and returns every live packet waiting on `address`, oldest first.
    pub fn take(&self, address: Address, now: i64) -> Vec<DeferredPacket> {
        let queue = {
            let mut queues = self.queues.lock();
            let Some(queue) = queues.by_address.remove(&address) else {
                return Vec::new();
            };
            queues.total -= queue.len();
            queue
        };
        queue
            .into_iter()
            .filter(|p| now.saturating_sub(p.queued_at) < self.ttl_ms)
            .collect()
    }

    /// Drops expired packets. Returns how many were removed.
    pub fn expire(&self, now: i64) -> usize {
        let mut removed = 0;
        let mut queues = self.queues.lock();
        queues.by_address.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|p| now.saturating_sub(p.queued_at) < self.ttl_ms);
            removed += before - queue.len();
            !queue.is_empty()
        });
        queues.total -= removed;
        removed
    }

    /// Number of packets waiting on `address`.
    #[must_use]
    pub fn pending_for(&self, address: Address) -> usize {
        self.queues
            .lock()
            .by_address
            .get(&address)
            .map_or(0, VecDeque::len)
    }

    /// Number of addresses with at least one packet waiting.
    #[must_use]
    pub fn address_count(&self) -> usize {
        self.queues.lock().by_address.len()
    }

    /// Total queued packets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.lock().total
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.lock().total == 0
    }
}

impl std::fmt::Debug for RetryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryQueue")
            .field("queued", &self.len())
            .field("per_address", &self.per_address)
            .field("max_total", &self.max_total)
            .field("ttl_ms", &self.ttl_ms)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> InboundPath {
        InboundPath::new("192.0.2.1:9993".parse().unwrap())
    }

    #[test]
    fn test_push_and_take_in_order() {
        let queue = RetryQueue::new(4, 64, 1_000);
        let a = Address::from_u64(0xaa);

        assert!(queue.push(a, Bytes::from_static(b"one"), path(), 0));
        assert!(queue.push(a, Bytes::from_static(b"two"), path(), 1));
        assert_eq!(queue.pending_for(a), 2);

        let drained = queue.take(a, 10);
        assert_eq!(drained.len(), 2);
        assert_eq!(&drained[0].data[..], b"one");
        assert_eq!(&drained[1].data[..], b"two");
        assert!(queue.is_empty());
        assert!(queue.take(a, 10).is_empty());
    }

    #[test]
    fn test_bounded_per_address() {
        let queue = RetryQueue::new(2, 64, 1_000);
        let a = Address::from_u64(0xaa);
        let b = Address::from_u64(0xbb);

        queue.push(a, Bytes::from_static(b"1"), path(), 0);
        queue.push(a, Bytes::from_static(b"2"), path(), 0);
        assert!(!queue.push(a, Bytes::from_static(b"3"), path(), 0));
        queue.push(b, Bytes::from_static(b"x"), path(), 0);

        assert_eq!(queue.pending_for(a), 2);
        assert_eq!(queue.len(), 3);

        let drained = queue.take(a, 0);
        assert_eq!(&drained[0].data[..], b"2");
        assert_eq!(&drained[1].data[..], b"3");
    }

    #[test]
    fn test_ttl() {
        let queue = RetryQueue::new(8, 64, 100);
        let a = Address::from_u64(0xaa);

        queue.push(a, Bytes::from_static(b"old"), path(), 0);
        queue.push(a, Bytes::from_static(b"new"), path(), 80);

        assert_eq!(queue.expire(150), 1);
        assert_eq!(queue.pending_for(a), 1);

        // Expired entries are also filtered when draining
        let drained = queue.take(a, 200);
        assert!(drained.is_empty());
    }

    #[test]
    fn test_bounded_across_addresses() {
        let queue = RetryQueue::new(4, 8, 1_000);

        for i in 0..100u64 {
            let spoofed = Address::from_u64(0x10_0000_0000 + i);
            queue.push(spoofed, Bytes::from_static(b"x"), path(), i64::try_from(i).unwrap());
            assert!(queue.len() <= 8);
        }
        assert_eq!(queue.len(), 8);
        assert_eq!(queue.address_count(), 8);

        // The newest survive
        assert_eq!(queue.pending_for(Address::from_u64(0x10_0000_0000 + 99)), 1);
        assert_eq!(queue.pending_for(Address::from_u64(0x10_0000_0000)), 0);
    }

    #[test]
    fn test_global_cap_evicts_oldest_of_any_address() {
        let queue = RetryQueue::new(4, 3, 1_000);
        let a = Address::from_u64(0xaa);
        let b = Address::from_u64(0xbb);

        assert!(queue.push(a, Bytes::from_static(b"a1"), path(), 0));
        assert!(queue.push(b, Bytes::from_static(b"b1"), path(), 1));
        assert!(queue.push(a, Bytes::from_static(b"a2"), path(), 2));
        assert!(!queue.push(b, Bytes::from_static(b"b2"), path(), 3));

        assert_eq!(queue.len(), 3);
        let drained = queue.take(a, 10);
        assert_eq!(drained.len(), 1);
        assert_eq!(&drained[0].data[..], b"a2");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.expire(2_000), 2);
        assert!(queue.is_empty());
    }
}
