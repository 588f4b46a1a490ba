// ============================================
// File: crates/vlink-node/src/handlers/vl1.rs
// ============================================
//! # Peer-Level Verbs
//!
//! ## Creation Reason
//! Handlers for the verbs that concern peers rather than networks:
//! HELLO, WHOIS, OK, ERROR and ECHO.
//!
//! ## ⚠️ Important Note for Next Developer
//! - HELLO never rebinds an address; a different identity for a known
//!   address is answered with ERROR(IDENTITY_COLLISION)
//! - OK(WHOIS) is only trusted for addresses this node asked about
//! - WHOIS answers are rate-gated per requester unless the node is
//!   authoritative
//!
//! ## Last Modified
//! v0.1.0 - Initial peer-level handlers

use tracing::{debug, info, trace, warn};

use vlink_core::credential::IdentityLookup;
use vlink_core::protocol::messages::{ErrorMessage, Hello, OkHeader, OkHello, Whois, WhoisResult};
use vlink_core::protocol::version::SOFTWARE_VERSION;
use vlink_core::protocol::{ErrorCode, ProtocolVersion, Verb, CURRENT_PROTOCOL_VERSION};
use vlink_core::wire::{WireCodec, WireReader};

use super::dispatcher::{Dispatcher, Inbound, ProcessResult, RejectReason};
use crate::services::AddPeerResult;

impl Dispatcher {
    // ========================================
    // HELLO
    // ========================================

    pub(super) fn handle_hello(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let hello: Hello = match rx.decode() {
            Ok(hello) => hello,
            Err(result) => return result,
        };

        if !ProtocolVersion::new(hello.protocol_version).is_supported() {
            debug!(
                source = %rx.source(),
                version = hello.protocol_version,
                "Unsupported protocol version"
            );
            self.send_error(rx, ErrorCode::BadProtocolVersion, None);
            return ProcessResult::Rejected(RejectReason::Protocol);
        }

        match self.topology.add_peer(hello.identity) {
            Ok(AddPeerResult::Added(peer)) => {
                rx.learned.push(peer.address());
                rx.peer = peer;
            }
            Ok(AddPeerResult::AlreadyKnown(peer)) => rx.peer = peer,
            Ok(AddPeerResult::Collision) => {
                self.send_error(rx, ErrorCode::IdentityCollision, None);
                return ProcessResult::Rejected(RejectReason::Protocol);
            }
            Err(e) => {
                warn!(source = %rx.source(), error = %e, "Cannot learn peer");
                return ProcessResult::Rejected(RejectReason::Authentication);
            }
        }

        rx.peer.set_version(hello.protocol_version, hello.software);
        rx.peer.last_hello.store(rx.now);
        rx.peer.received(rx.path, rx.now);

        let reply = OkHello {
            timestamp_echo: hello.timestamp,
            protocol_version: CURRENT_PROTOCOL_VERSION,
            software: SOFTWARE_VERSION,
        };
        self.send_ok(rx, &reply.to_bytes());
        trace!(source = %rx.source(), version = hello.protocol_version, "HELLO answered");
        ProcessResult::Handled
    }

    // ========================================
    // WHOIS
    // ========================================

    pub(super) fn handle_whois(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let whois: Whois = match rx.decode() {
            Ok(whois) => whois,
            Err(result) => return result,
        };

        let authoritative = self.config.node.authoritative;
        if !authoritative
            && !rx
                .peer
                .whois_gate
                .try_advance(rx.now, self.config.limits.whois_rate_gate_ms)
        {
            trace!(source = %rx.source(), "WHOIS rate gated");
            return ProcessResult::Handled;
        }

        let mut found = Vec::new();
        for address in whois.addresses {
            match self.topology.identity(address) {
                Some(identity) => found.push((*identity).clone()),
                None if authoritative => {
                    trace!(address = %address, "WHOIS for unknown address");
                }
                None => {
                    self.topology.request_whois_at(address, rx.now);
                }
            }
        }

        if found.is_empty() {
            if authoritative {
                self.send_error(rx, ErrorCode::ObjNotFound, None);
            }
        } else {
            self.send_ok(rx, &WhoisResult { identities: found }.to_bytes());
        }
        ProcessResult::Handled
    }

    // ========================================
    // OK
    // ========================================

    pub(super) fn handle_ok(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let mut reader = WireReader::new(rx.payload);
        let Ok(header) = OkHeader::decode(&mut reader) else {
            return ProcessResult::Rejected(RejectReason::Malformed);
        };

        match Verb::from_u8(header.in_re_verb) {
            Some(Verb::Hello) => {
                let Ok(ok) = OkHello::decode(&mut reader) else {
                    return ProcessResult::Rejected(RejectReason::Malformed);
                };
                rx.peer.set_version(ok.protocol_version, ok.software);
                trace!(
                    source = %rx.source(),
                    latency_ms = rx.now.saturating_sub(ok.timestamp_echo),
                    "OK(HELLO)"
                );
                ProcessResult::Handled
            }
            Some(Verb::Whois) => match WhoisResult::decode(&mut reader) {
                Ok(result) => self.handle_ok_whois(rx, result),
                Err(_) => ProcessResult::Rejected(RejectReason::Malformed),
            },
            other => {
                trace!(source = %rx.source(), in_re = ?other, "OK ignored");
                ProcessResult::Handled
            }
        }
    }

    fn handle_ok_whois(&self, rx: &mut Inbound<'_>, result: WhoisResult) -> ProcessResult {
        for identity in result.identities {
            let address = identity.address();
            if !self.topology.is_whois_pending(address) {
                trace!(address = %address, source = %rx.source(), "Unsolicited WHOIS answer");
                continue;
            }
            if !identity.locally_validate() {
                warn!(address = %address, source = %rx.source(), "WHOIS answer fails validation");
                continue;
            }
            match self.topology.add_peer(identity) {
                Ok(AddPeerResult::Added(_)) => {
                    info!(address = %address, source = %rx.source(), "Identity resolved by WHOIS");
                    rx.learned.push(address);
                }
                Ok(_) => {}
                Err(e) => debug!(address = %address, error = %e, "Cannot learn peer"),
            }
        }
        ProcessResult::Handled
    }

    // ========================================
    // ERROR
    // ========================================

    pub(super) fn handle_error(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        let error: ErrorMessage = match rx.decode() {
            Ok(error) => error,
            Err(result) => return result,
        };

        match error.code {
            ErrorCode::NeedMembershipCertificate => {
                let network = error.nwid.and_then(|nwid| self.network(nwid));
                if let Some(network) = network {
                    debug!(source = %rx.source(), nwid = %network.nwid(), "Peer asks for our credentials");
                    self.push_credentials(&network, rx.source(), rx.now);
                }
            }
            ErrorCode::IdentityCollision => {
                warn!(source = %rx.source(), "Peer reports an identity collision with us");
            }
            code => {
                debug!(source = %rx.source(), code = ?code, in_re = error.in_re_verb, "ERROR received");
            }
        }
        ProcessResult::Handled
    }

    // ========================================
    // ECHO
    // ========================================

    pub(super) fn handle_echo(&self, rx: &mut Inbound<'_>) -> ProcessResult {
        self.send_ok(rx, rx.payload);
        ProcessResult::Handled
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use vlink_common::types::Address;
    use vlink_core::crypto::Identity;
    use vlink_core::protocol::messages::{ErrorMessage, Hello, OkHeader, OkHello, Whois, WhoisResult};
    use vlink_core::protocol::version::SOFTWARE_VERSION;
    use vlink_core::protocol::{ErrorCode, Verb};
    use vlink_core::wire::{WireCodec, WireReader};

    use crate::handlers::{ProcessResult, RejectReason};
    use crate::testing::Harness;

    fn ok_body<T: WireCodec>(payload: &[u8]) -> (OkHeader, T) {
        let mut reader = WireReader::new(payload);
        let header = OkHeader::decode(&mut reader).unwrap();
        (header, T::decode(&mut reader).unwrap())
    }

    #[test]
    fn test_hello_learns_peer_and_answers() {
        let h = Harness::new();
        let remote = h.remote();

        let result = h.dispatcher.process_wire_packet(&h.hello_from(&remote), h.path());
        assert_eq!(result, ProcessResult::Handled);

        let peer = h.topology.get(remote.address()).unwrap();
        assert_eq!(peer.version().unwrap().protocol, vlink_core::protocol::CURRENT_PROTOCOL_VERSION);

        let sent = h.sender.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].verb, Verb::Ok);
        let (header, ok): (OkHeader, OkHello) = ok_body(&sent[0].payload);
        assert_eq!(header.in_re_verb, Verb::Hello.as_u8());
        assert_eq!(ok.timestamp_echo, 1234);
        assert_eq!(ok.software, SOFTWARE_VERSION);
    }

    #[test]
    fn test_hello_collision_reported_not_overwritten() {
        let h = Harness::new();
        let remote = h.remote();

        // Another key pair already bound to the same address
        let squatter = Identity::generate().to_public();
        let mut bytes = squatter.to_bytes();
        bytes[..5].copy_from_slice(&remote.address().to_bytes());
        let (squatter, _) = Identity::from_bytes(&bytes).unwrap();
        h.topology.add_peer(squatter.clone()).unwrap();

        let result = h.dispatcher.process_wire_packet(&h.hello_from(&remote), h.path());
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Protocol));

        let errors = h.sender.take_verb(Verb::Error);
        assert_eq!(errors.len(), 1);
        let error: ErrorMessage = errors[0].decode().unwrap();
        assert_eq!(error.code, ErrorCode::IdentityCollision);

        let kept = h.topology.get(remote.address()).unwrap();
        assert!(kept.identity().same_public(&squatter));
    }

    #[test]
    fn test_hello_with_forged_identity_rejected() {
        let h = Harness::new();
        let remote = h.remote();

        let mut bytes = Identity::generate().to_public().to_bytes();
        bytes[..5].copy_from_slice(&remote.address().to_bytes());
        let (forged, _) = Identity::from_bytes(&bytes).unwrap();
        let hello = Hello {
            protocol_version: vlink_core::protocol::CURRENT_PROTOCOL_VERSION,
            software: SOFTWARE_VERSION,
            timestamp: 1,
            identity: forged,
        };
        let packet = h.packet_from(&remote, Verb::Hello, &hello.to_bytes(), false);

        let result = h.dispatcher.process_wire_packet(&packet, h.path());
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Authentication));
        assert!(h.topology.get(remote.address()).is_none());
        assert_eq!(h.sender.sent_count(), 0);
    }

    #[test]
    fn test_hello_bad_version() {
        let h = Harness::new();
        let remote = h.remote();
        let hello = Hello {
            protocol_version: 1,
            software: SOFTWARE_VERSION,
            timestamp: 1,
            identity: remote.to_public(),
        };
        let packet = h.packet_from(&remote, Verb::Hello, &hello.to_bytes(), false);

        let result = h.dispatcher.process_wire_packet(&packet, h.path());
        assert_eq!(result, ProcessResult::Rejected(RejectReason::Protocol));
        let errors = h.sender.take_verb(Verb::Error);
        let error: ErrorMessage = errors[0].decode().unwrap();
        assert_eq!(error.code, ErrorCode::BadProtocolVersion);
        assert!(h.topology.get(remote.address()).is_none());
    }

    #[test]
    fn test_whois_answers_known_and_escalates_unknown() {
        let h = Harness::with_config(
            r#"
            [node]
            upstream = "00000000aa"
            "#,
        );
        let asker = h.remote();
        let known = h.remote();
        h.learn(&asker);
        h.learn(&known);
        let unknown = Address::from_u64(0x00_1234_5678);

        let whois = Whois {
            addresses: vec![known.address(), unknown],
        };
        let packet = h.packet_from(&asker, Verb::Whois, &whois.to_bytes(), true);
        assert!(h.dispatcher.process_wire_packet(&packet, h.path()).is_handled());

        let oks = h.sender.take_verb(Verb::Ok);
        assert_eq!(oks.len(), 1);
        let (_, result): (OkHeader, WhoisResult) = ok_body(&oks[0].payload);
        assert_eq!(result.identities.len(), 1);
        assert!(result.identities[0].same_public(&known));

        let escalated = h.sender.take_verb(Verb::Whois);
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].dest, Address::from_u64(0xaa));
        assert_eq!(escalated[0].decode::<Whois>().unwrap().addresses, vec![unknown]);
    }

    #[test]
    fn test_whois_rate_gated() {
        let h = Harness::new();
        let asker = h.remote();
        let known = h.remote();
        h.learn(&asker);
        h.learn(&known);
        let whois = Whois {
            addresses: vec![known.address()],
        }
        .to_bytes();

        let first = h.packet_from(&asker, Verb::Whois, &whois, true);
        let second = h.packet_from(&asker, Verb::Whois, &whois, true);
        h.dispatcher.process_at(&first, h.path(), 10_000);
        h.dispatcher.process_at(&second, h.path(), 10_010);
        assert_eq!(h.sender.take_verb(Verb::Ok).len(), 1);
    }

    #[test]
    fn test_ok_whois_only_for_pending() {
        let h = Harness::new();
        let upstream = h.remote();
        h.learn(&upstream);
        let asked = h.remote();
        let unsolicited = h.remote();

        h.topology.request_whois_at(asked.address(), 0);
        let mut body = OkHeader::new(Verb::Whois, 5).to_bytes();
        body.extend(
            WhoisResult {
                identities: vec![asked.to_public(), unsolicited.to_public()],
            }
            .to_bytes(),
        );
        let packet = h.packet_from(&upstream, Verb::Ok, &body, true);
        assert!(h.dispatcher.process_wire_packet(&packet, h.path()).is_handled());

        assert!(h.topology.get(asked.address()).is_some());
        assert!(h.topology.get(unsolicited.address()).is_none());
    }

    #[test]
    fn test_echo() {
        let h = Harness::new();
        let remote = h.remote();
        h.learn(&remote);

        let packet = h.packet_from(&remote, Verb::Echo, b"hello there", true);
        assert!(h.dispatcher.process_wire_packet(&packet, h.path()).is_handled());
        let oks = h.sender.take_verb(Verb::Ok);
        let mut reader = WireReader::new(&oks[0].payload);
        let header = OkHeader::decode(&mut reader).unwrap();
        assert_eq!(header.in_re_verb, Verb::Echo.as_u8());
        assert_eq!(reader.read_rest(), b"hello there");
    }
}
