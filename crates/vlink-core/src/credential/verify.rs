// ============================================
// File: crates/vlink-core/src/credential/verify.rs
// ============================================
//! # Credential Verifier
//!
//! ## Creation Reason
//! Credentials arrive from arbitrary peers but must have been signed by
//! the network's controller. Verification can need the controller's full
//! identity before it is known locally, so the result has three states
//! instead of two: the caller defers rather than drops on `NeedIdentity`.
//!
//! ## Verification Flow
//! ```text
//! signer nil or != controller(nwid) ──► BadSignature
//!          │
//!          ▼
//! lookup.identity(signer) ── None ──► lookup.request_whois(signer)
//!          │                          └─► NeedIdentity
//!          ▼
//! verify(signing_bytes, signature) ──► Ok | BadSignature
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial verifier

use std::sync::Arc;

use tracing::{debug, trace};

use vlink_common::types::Address;

use super::Credential;
use crate::crypto::Identity;

// ============================================
// IdentityLookup Trait
// ============================================

/// Resolves addresses to identities.
///
/// Implemented by the node's peer store. `request_whois` must not block;
/// it only schedules a lookup.
pub trait IdentityLookup: Send + Sync {
    /// Returns the identity for `address` if it is known locally.
    fn identity(&self, address: Address) -> Option<Arc<Identity>>;

    /// Asks the network for the identity of `address`.
    fn request_whois(&self, address: Address);
}

// ============================================
// VerifyResult
// ============================================

/// Outcome of verifying one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyResult {
    /// Signed by the controller.
    Ok,
    /// Wrong signer or invalid signature.
    BadSignature,
    /// Signer identity unknown; a WHOIS has been requested.
    NeedIdentity,
}

// ============================================
// CredentialVerifier
// ============================================

/// Checks signer authorization and signatures.
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialVerifier;

impl CredentialVerifier {
    /// Creates a verifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Verifies `credential` against its network's controller.
    pub fn verify(&self, credential: &Credential, lookup: &dyn IdentityLookup) -> VerifyResult {
        let signer = credential.signer();
        let controller = credential.network_id().controller();

        if signer.is_nil() || signer != controller {
            debug!(
                kind = credential.credential_type().as_str(),
                signer = %signer,
                controller = %controller,
                "Credential not signed by network controller"
            );
            return VerifyResult::BadSignature;
        }

        let Some(identity) = lookup.identity(signer) else {
            trace!(signer = %signer, "Signer identity unknown, requesting WHOIS");
            lookup.request_whois(signer);
            return VerifyResult::NeedIdentity;
        };

        if identity.verify(&credential.signing_bytes(), credential.signature()) {
            VerifyResult::Ok
        } else {
            VerifyResult::BadSignature
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{
        Capability, CertificateOfMembership, CertificateOfOwnership, CredentialType, Revocation,
        Signable, Tag,
    };
    use crate::rules::{Rule, RuleKind};
    use crate::wire::WireCodec;
    use support::Lookup;
    use vlink_common::types::NetworkId;

    /// Minimal in-memory lookup for tests.
    mod support {
        use std::collections::HashMap;
        use std::sync::Arc;

        use parking_lot::Mutex;

        use super::super::IdentityLookup;
        use crate::crypto::Identity;
        use vlink_common::types::Address;

        #[derive(Default)]
        pub struct Lookup {
            pub known: Mutex<HashMap<Address, Arc<Identity>>>,
            pub whois: Mutex<Vec<Address>>,
        }

        impl Lookup {
            pub fn learn(&self, id: &Identity) {
                self.known
                    .lock()
                    .insert(id.address(), Arc::new(id.to_public()));
            }
        }

        impl IdentityLookup for Lookup {
            fn identity(&self, address: Address) -> Option<Arc<Identity>> {
                self.known.lock().get(&address).cloned()
            }

            fn request_whois(&self, address: Address) {
                self.whois.lock().push(address);
            }
        }
    }

    fn all_credentials(controller: &Identity) -> Vec<Credential> {
        let nwid = NetworkId::from_controller(controller.address(), 1);
        let member = Address::from_u64(0x11_2233_4455);

        let mut com = CertificateOfMembership::new(1_000, 500, nwid, member);
        com.sign(controller).unwrap();
        let mut cap = Capability::new(
            7,
            nwid,
            1_000,
            member,
            vec![Rule::new(RuleKind::EtherType(0x0800)), Rule::new(RuleKind::Accept)],
        )
        .unwrap();
        cap.sign(controller).unwrap();
        let mut tag = Tag::new(1, 2, nwid, 1_000, member);
        tag.sign(controller).unwrap();
        let mut coo = CertificateOfOwnership::new(1, nwid, 1_000, member);
        coo.add_thing(vlink_common::types::Mac::from_u64(0x02_0000_0000_01))
            .unwrap();
        coo.sign(controller).unwrap();
        let mut rev = Revocation::new(1, nwid, CredentialType::Tag, 1, 900, member);
        rev.sign(controller).unwrap();

        vec![com.into(), cap.into(), tag.into(), coo.into(), rev.into()]
    }

    fn decode_like(original: &Credential, bytes: &[u8]) -> Option<Credential> {
        let decoded = match original {
            Credential::Com(_) => CertificateOfMembership::from_bytes(bytes).ok()?.0.into(),
            Credential::Capability(_) => Capability::from_bytes(bytes).ok()?.0.into(),
            Credential::Tag(_) => Tag::from_bytes(bytes).ok()?.0.into(),
            Credential::Coo(_) => CertificateOfOwnership::from_bytes(bytes).ok()?.0.into(),
            Credential::Revocation(_) => Revocation::from_bytes(bytes).ok()?.0.into(),
        };
        Some(decoded)
    }

    #[test]
    fn test_verify_ok_for_every_type() {
        let controller = Identity::generate();
        let lookup = Lookup::default();
        lookup.learn(&controller);

        for cred in all_credentials(&controller) {
            assert_eq!(
                CredentialVerifier::new().verify(&cred, &lookup),
                VerifyResult::Ok,
                "{:?}",
                cred.credential_type()
            );
        }
    }

    #[test]
    fn test_need_identity_requests_whois() {
        let controller = Identity::generate();
        let lookup = Lookup::default();

        let creds = all_credentials(&controller);
        assert_eq!(
            CredentialVerifier::new().verify(&creds[0], &lookup),
            VerifyResult::NeedIdentity
        );
        assert_eq!(*lookup.whois.lock(), vec![controller.address()]);
    }

    #[test]
    fn test_wrong_signer_rejected_without_lookup() {
        let controller = Identity::generate();
        let impostor = Identity::generate();
        let lookup = Lookup::default();
        lookup.learn(&impostor);

        let nwid = NetworkId::from_controller(controller.address(), 1);
        let mut tag = Tag::new(1, 2, nwid, 1_000, Address::from_u64(1));
        tag.sign(&impostor).unwrap();

        assert_eq!(
            CredentialVerifier::new().verify(&tag.into(), &lookup),
            VerifyResult::BadSignature
        );
        assert!(lookup.whois.lock().is_empty());
    }

    #[test]
    fn test_unsigned_rejected() {
        let controller = Identity::generate();
        let lookup = Lookup::default();
        lookup.learn(&controller);
        let nwid = NetworkId::from_controller(controller.address(), 1);
        let com = CertificateOfMembership::new(1, 1, nwid, Address::from_u64(1));
        assert_eq!(
            CredentialVerifier::new().verify(&com.into(), &lookup),
            VerifyResult::BadSignature
        );
    }

    #[test]
    fn test_tampered_payload_detected() {
        let controller = Identity::generate();
        let lookup = Lookup::default();
        lookup.learn(&controller);
        let verifier = CredentialVerifier::new();

        for cred in all_credentials(&controller) {
            let bytes = cred.to_bytes();
            let sig_len = cred.signature().len();
            // Trailer: alg(1) sig_len(2) sig ext_len(2); everything before
            // it is signed payload.
            let payload_len = bytes.len() - (1 + 2 + sig_len + 2);

            for i in 0..payload_len {
                let mut tampered = bytes.clone();
                tampered[i] ^= 0x01;
                // Flips that break decoding are rejected earlier; all that
                // decode must fail verification.
                if let Some(decoded) = decode_like(&cred, &tampered) {
                    assert_eq!(
                        verifier.verify(&decoded, &lookup),
                        VerifyResult::BadSignature,
                        "{:?} byte {i}",
                        cred.credential_type()
                    );
                }
            }
        }
    }
}
