// ============================================
// File: crates/vlink-node/src/services/multicast.rs
// ============================================
//! # Multicast Subscriptions
//!
//! ## Creation Reason
//! Tracks which peers announced interest in which multicast groups on a
//! network (MULTICAST_LIKE), and which groups the local port listens to.
//! MULTICAST_GATHER answers are drawn from here.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Remote subscriptions expire unless re-announced; the housekeeping
//!   task calls `expire`
//! - Gather results are a random sample when more members are known
//!   than requested
//!
//! ## Last Modified
//! v0.1.0 - Initial subscription store

use std::collections::{BTreeSet, HashMap};

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::seq::SliceRandom;

use vlink_common::types::{Address, MulticastGroup};

/// Remote and local multicast subscriptions of one network.
pub struct MulticastSubscriptions {
    members: DashMap<MulticastGroup, HashMap<Address, i64>>,
    local: RwLock<BTreeSet<MulticastGroup>>,
    ttl_ms: i64,
}

impl MulticastSubscriptions {
    /// Creates an empty store whose remote entries live `ttl_ms`.
    #[must_use]
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            members: DashMap::new(),
            local: RwLock::new(BTreeSet::new()),
            ttl_ms,
        }
    }

    /// Records that `member` wants `group`.
    pub fn like(&self, group: MulticastGroup, member: Address, now: i64) {
        self.members.entry(group).or_default().insert(member, now);
    }

    /// Samples up to `limit` members of `group`, never including `exclude`.
    ///
    /// Returns the number of live members known and the sample.
    #[must_use]
    pub fn gather(
        &self,
        group: MulticastGroup,
        limit: usize,
        exclude: Address,
        now: i64,
    ) -> (u32, Vec<Address>) {
        let Some(entry) = self.members.get(&group) else {
            return (0, Vec::new());
        };
        let live: Vec<Address> = entry
            .iter()
            .filter(|(addr, seen)| **addr != exclude && now.saturating_sub(**seen) < self.ttl_ms)
            .map(|(addr, _)| *addr)
            .collect();
        drop(entry);

        let total = u32::try_from(live.len()).unwrap_or(u32::MAX);
        let sample = live
            .choose_multiple(&mut rand::thread_rng(), limit)
            .copied()
            .collect();
        (total, sample)
    }

    /// Live members of `group`.
    #[must_use]
    pub fn member_count(&self, group: MulticastGroup, now: i64) -> usize {
        self.members.get(&group).map_or(0, |m| {
            m.values()
                .filter(|seen| now.saturating_sub(**seen) < self.ttl_ms)
                .count()
        })
    }

    /// Drops expired remote subscriptions. Returns how many were removed.
    pub fn expire(&self, now: i64) -> usize {
        let mut removed = 0;
        self.members.retain(|_, members| {
            let before = members.len();
            members.retain(|_, seen| now.saturating_sub(*seen) < self.ttl_ms);
            removed += before - members.len();
            !members.is_empty()
        });
        removed
    }

    // ========================================
    // Local
    // ========================================

    /// Subscribes the local port to `group`.
    pub fn subscribe(&self, group: MulticastGroup) -> bool {
        self.local.write().insert(group)
    }

    /// Unsubscribes the local port from `group`.
    pub fn unsubscribe(&self, group: MulticastGroup) -> bool {
        self.local.write().remove(&group)
    }

    /// Returns `true` if the local port listens to `group`.
    #[must_use]
    pub fn is_subscribed(&self, group: MulticastGroup) -> bool {
        self.local.read().contains(&group)
    }

    /// Groups the local port listens to.
    #[must_use]
    pub fn local_groups(&self) -> Vec<MulticastGroup> {
        self.local.read().iter().copied().collect()
    }
}

impl std::fmt::Debug for MulticastSubscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MulticastSubscriptions")
            .field("groups", &self.members.len())
            .field("local", &self.local.read().len())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
