// ============================================
// File: crates/vlink-node/src/services/membership.rs
// ============================================
//! # Membership Ledger
//!
//! ## Creation Reason
//! For every (joined network, remote peer) pair the node keeps the
//! credentials that peer has shown: its COM, capabilities, tags and
//! ownership certificates, plus the revocation thresholds the controller
//! has published against it. The gate and the filter read from here.
//!
//! ## Main Functionality
//! - `Membership::add_credential`: the only mutation path
//! - `Membership::is_allowed_on_network`: the gate
//! - Validity-filtered accessors (`get_tag`, `capabilities`,
//!   `has_certificate_of_ownership_for`)
//! - `Membership::clean`: evicts credentials that fell out of validity
//!
//! ## Admission Order
//! ```text
//! credential
//!   │ wrong network / not issued to sender ──────────► Rejected
//!   │ revocation ──► threshold map (verify first) ───► New | Redundant
//!   │ revoked (ts <= threshold) ─────────────────────► Rejected
//!   │ outside credential_time_max_delta ─────────────► Rejected
//!   │ byte-identical to stored ──────────────────────► Redundant
//!   │ verifier: NeedIdentity ────────────────────────► DeferredForWhois
//!   │ verifier: BadSignature ────────────────────────► Rejected
//!   │ stored same (type,id) with ts >= new ──────────► Redundant
//!   └ store ─────────────────────────────────────────► New
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every accessor applies the validity check; do not add one that
//!   hands out stored credentials directly
//! - Revocation thresholds are never lowered and never cleaned
//!
//! ## Last Modified
//! v0.1.0 - Initial membership ledger

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace, warn};

use vlink_common::time::AtomicMillis;
use vlink_common::types::Address;
use vlink_core::credential::revocation::RevocationKey;
use vlink_core::credential::{
    Capability, CertificateOfMembership, CertificateOfOwnership, Credential, CredentialType,
    CredentialVerifier, IdentityLookup, Revocation, Tag, Thing, VerifyResult,
};
use vlink_core::filter::RemoteCredentials;
use vlink_core::netconf::NetworkConfig;

// ============================================
// AddResult
// ============================================

/// Outcome of `Membership::add_credential`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// Invalid, revoked, stale or not applicable.
    Rejected,
    /// Stored; state changed.
    AcceptedNew,
    /// Valid but nothing newer than what is held; state unchanged.
    AcceptedRedundant,
    /// The signer's identity is being looked up; retry later.
    DeferredForWhois,
}

impl AddResult {
    /// Returns `true` for either accepted outcome.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::AcceptedNew | Self::AcceptedRedundant)
    }
}

// ============================================
// Membership
// ============================================

/// Credentials one remote peer holds on one network.
#[derive(Debug, Default)]
pub struct Membership {
    com: Option<CertificateOfMembership>,
    capabilities: BTreeMap<u32, Capability>,
    tags: BTreeMap<u32, Tag>,
    coos: BTreeMap<u32, CertificateOfOwnership>,
    revocations: HashMap<RevocationKey, i64>,
    /// Last time our own credentials were pushed to this peer.
    pub push_gate: AtomicMillis,
}

impl Membership {
    /// Creates an empty membership.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================
    // Mutation
    // ========================================

    /// Offers `credential`, presented by `peer`, to the ledger.
    pub fn add_credential(
        &mut self,
        conf: &NetworkConfig,
        peer: Address,
        credential: &Credential,
        lookup: &dyn IdentityLookup,
    ) -> AddResult {
        let kind = credential.credential_type();

        if credential.network_id() != conf.nwid {
            debug!(
                peer = %peer,
                kind = kind.as_str(),
                nwid = %credential.network_id(),
                "Credential for another network"
            );
            return AddResult::Rejected;
        }

        if credential.issued_to() != peer {
            debug!(
                peer = %peer,
                kind = kind.as_str(),
                issued_to = %credential.issued_to(),
                "Credential not issued to this peer"
            );
            return AddResult::Rejected;
        }

        if let Credential::Revocation(rev) = credential {
            return self.add_revocation(rev, credential, lookup);
        }

        let id = credential.id();
        let timestamp = credential.timestamp();

        if self.is_revoked(kind, id, timestamp) {
            debug!(peer = %peer, kind = kind.as_str(), id = ?id, "Credential revoked");
            return AddResult::Rejected;
        }

        if !conf.timestamp_in_window(timestamp) {
            debug!(
                peer = %peer,
                kind = kind.as_str(),
                timestamp,
                network_timestamp = conf.timestamp,
                "Credential outside time window"
            );
            return AddResult::Rejected;
        }

        if self.holds_identical(credential) {
            return AddResult::AcceptedRedundant;
        }

        match CredentialVerifier::new().verify(credential, lookup) {
            VerifyResult::Ok => {}
            VerifyResult::NeedIdentity => return AddResult::DeferredForWhois,
            VerifyResult::BadSignature => {
                warn!(peer = %peer, kind = kind.as_str(), id = ?id, "Credential signature invalid");
                return AddResult::Rejected;
            }
        }

        if self.stored_timestamp(kind, id).is_some_and(|held| held >= timestamp) {
            return AddResult::AcceptedRedundant;
        }

        match credential {
            Credential::Com(c) => self.com = Some(c.clone()),
            Credential::Capability(c) => {
                self.capabilities.insert(c.id(), c.clone());
            }
            Credential::Tag(c) => {
                self.tags.insert(c.id(), c.clone());
            }
            Credential::Coo(c) => {
                self.coos.insert(c.id(), c.clone());
            }
            Credential::Revocation(_) => {}
        }
        trace!(peer = %peer, kind = kind.as_str(), id = ?id, timestamp, "Credential accepted");
        AddResult::AcceptedNew
    }

    fn add_revocation(
        &mut self,
        rev: &Revocation,
        credential: &Credential,
        lookup: &dyn IdentityLookup,
    ) -> AddResult {
        let key = rev.key();
        if self
            .revocations
            .get(&key)
            .is_some_and(|held| *held >= rev.threshold())
        {
            return AddResult::AcceptedRedundant;
        }

        match CredentialVerifier::new().verify(credential, lookup) {
            VerifyResult::Ok => {}
            VerifyResult::NeedIdentity => return AddResult::DeferredForWhois,
            VerifyResult::BadSignature => {
                warn!(target_peer = %rev.target(), id = rev.id(), "Revocation signature invalid");
                return AddResult::Rejected;
            }
        }

        self.revocations.insert(key, rev.threshold());
        debug!(
            target_peer = %rev.target(),
            kind = key.0.as_str(),
            credential_id = ?key.1,
            threshold = rev.threshold(),
            "Revocation applied"
        );
        AddResult::AcceptedNew
    }

    /// Evicts credentials that are revoked or outside the time window.
    ///
    /// Returns the number of credentials removed.
    pub fn clean(&mut self, conf: &NetworkConfig) -> usize {
        let before = self.credential_count();

        let revocations = &self.revocations;
        let valid = |kind: CredentialType, id: u32, ts: i64| {
            conf.timestamp_in_window(ts) && !revoked_in(revocations, kind, Some(id), ts)
        };
        self.capabilities
            .retain(|id, c| valid(CredentialType::Capability, *id, c.timestamp()));
        self.tags
            .retain(|id, c| valid(CredentialType::Tag, *id, c.timestamp()));
        self.coos
            .retain(|id, c| valid(CredentialType::Coo, *id, c.timestamp()));

        if self
            .com
            .as_ref()
            .is_some_and(|c| revoked_in(&self.revocations, CredentialType::Com, None, c.timestamp()))
        {
            self.com = None;
        }

        before - self.credential_count()
    }

    // ========================================
    // Gate
    // ========================================

    /// Returns `true` if the peer may send traffic on the network.
    #[must_use]
    pub fn is_allowed_on_network(&self, conf: &NetworkConfig) -> bool {
        if conf.is_public() {
            return true;
        }
        let Some(com) = &self.com else {
            return false;
        };
        if self.is_revoked(CredentialType::Com, None, com.timestamp()) {
            return false;
        }
        conf.com.as_ref().is_some_and(|mine| mine.agrees_with(com))
    }

    // ========================================
    // Accessors
    // ========================================

    /// The held COM, if any.
    #[must_use]
    pub fn com(&self) -> Option<&CertificateOfMembership> {
        self.com.as_ref()
    }

    /// Valid tag `id`.
    #[must_use]
    pub fn get_tag(&self, conf: &NetworkConfig, id: u32) -> Option<&Tag> {
        self.tags
            .get(&id)
            .filter(|t| self.is_valid(conf, CredentialType::Tag, id, t.timestamp()))
    }

    /// Valid capability `id`.
    #[must_use]
    pub fn capability(&self, conf: &NetworkConfig, id: u32) -> Option<&Capability> {
        self.capabilities
            .get(&id)
            .filter(|c| self.is_valid(conf, CredentialType::Capability, id, c.timestamp()))
    }

    /// Valid capabilities in ascending id order.
    pub fn capabilities<'a>(
        &'a self,
        conf: &'a NetworkConfig,
    ) -> impl Iterator<Item = &'a Capability> + 'a {
        self.capabilities.iter().filter_map(move |(id, c)| {
            self.is_valid(conf, CredentialType::Capability, *id, c.timestamp())
                .then_some(c)
        })
    }

    /// Returns `true` if a valid COO covers `thing`.
    #[must_use]
    pub fn has_certificate_of_ownership_for(&self, conf: &NetworkConfig, thing: &Thing) -> bool {
        self.coos.iter().any(|(id, c)| {
            c.owns(thing) && self.is_valid(conf, CredentialType::Coo, *id, c.timestamp())
        })
    }

    /// Filter view of this membership under `conf`.
    #[must_use]
    pub fn view<'a>(&'a self, conf: &'a NetworkConfig) -> MembershipView<'a> {
        MembershipView {
            membership: self,
            conf,
        }
    }

    /// Threshold recorded for `key`.
    #[must_use]
    pub fn revocation_threshold(&self, key: RevocationKey) -> Option<i64> {
        self.revocations.get(&key).copied()
    }

    /// Returns `true` if no credential and no revocation threshold is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credential_count() == 0 && self.revocations.is_empty()
    }

    /// Stored credentials (COM, capabilities, tags, COOs), valid or not.
    #[must_use]
    pub fn credential_count(&self) -> usize {
        usize::from(self.com.is_some()) + self.capabilities.len() + self.tags.len() + self.coos.len()
    }

    // ========================================
    // Validity
    // ========================================

    fn is_valid(&self, conf: &NetworkConfig, kind: CredentialType, id: u32, ts: i64) -> bool {
        conf.timestamp_in_window(ts) && !self.is_revoked(kind, Some(id), ts)
    }

    fn is_revoked(&self, kind: CredentialType, id: Option<u32>, ts: i64) -> bool {
        revoked_in(&self.revocations, kind, id, ts)
    }

    fn stored_timestamp(&self, kind: CredentialType, id: Option<u32>) -> Option<i64> {
        match (kind, id) {
            (CredentialType::Com, _) => self.com.as_ref().map(CertificateOfMembership::timestamp),
            (CredentialType::Capability, Some(id)) => {
                self.capabilities.get(&id).map(Capability::timestamp)
            }
            (CredentialType::Tag, Some(id)) => self.tags.get(&id).map(Tag::timestamp),
            (CredentialType::Coo, Some(id)) => {
                self.coos.get(&id).map(CertificateOfOwnership::timestamp)
            }
            _ => None,
        }
    }

    fn holds_identical(&self, credential: &Credential) -> bool {
        match credential {
            Credential::Com(c) => self.com.as_ref() == Some(c),
            Credential::Capability(c) => self.capabilities.get(&c.id()) == Some(c),
            Credential::Tag(c) => self.tags.get(&c.id()) == Some(c),
            Credential::Coo(c) => self.coos.get(&c.id()) == Some(c),
            Credential::Revocation(_) => false,
        }
    }
}

fn revoked_in(
    revocations: &HashMap<RevocationKey, i64>,
    kind: CredentialType,
    id: Option<u32>,
    ts: i64,
) -> bool {
    let all = revocations.get(&(kind, None));
    let one = id.and_then(|id| revocations.get(&(kind, Some(id))));
    all.into_iter().chain(one).any(|threshold| ts <= *threshold)
}

// ============================================
// MembershipView
// ============================================

/// A membership paired with the config its validity is judged against.
#[derive(Debug, Clone, Copy)]
pub struct MembershipView<'a> {
    membership: &'a Membership,
    conf: &'a NetworkConfig,
}

impl RemoteCredentials for MembershipView<'_> {
    fn tag_value(&self, id: u32) -> Option<u32> {
        self.membership.get_tag(self.conf, id).map(Tag::value)
    }

    fn owns(&self, thing: &Thing) -> bool {
        self.membership
            .has_certificate_of_ownership_for(self.conf, thing)
    }
}

// ============================================
// Tests
// ============================================
