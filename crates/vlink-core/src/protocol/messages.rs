// ============================================
// File: crates/vlink-core/src/protocol/messages.rs
// ============================================
//! # Verb Payloads
//!
//! ## Creation Reason
//! Handlers work on typed payloads, never on offsets. Every payload here
//! is decoded through `WireReader`, so a truncated or lying length field
//! surfaces as an error instead of an out-of-bounds read.
//!
//! ## Main Functionality
//! - Session verbs: `Hello`, `OkHeader` and its bodies, `ErrorMessage`,
//!   `Whois`
//! - Data verbs: `Frame`, `ExtFrame`, `MulticastFrame`
//! - Multicast control: `MulticastLike`, `MulticastGather`,
//!   `GatherResult`
//! - `NetworkCredentials`: the credential push bundle
//!
//! ## ⚠️ Important Note for Next Developer
//! - All integers are big-endian
//! - Optional sections are announced by flag bits in the same payload;
//!   keep encode and decode checking the same bits
//!
//! ## Last Modified
//! v0.1.0 - Initial verb payloads

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, Mac, MulticastGroup, NetworkId};

use super::verb::{ErrorCode, Verb};
use super::version::SoftwareVersion;
use crate::credential::{
    Capability, CertificateOfMembership, CertificateOfOwnership, Credential, Revocation, Tag,
};
use crate::crypto::Identity;
use crate::error::{CoreError, Result};
use crate::wire::{PutWire, WireCodec, WireReader};

// ============================================
// Constants
// ============================================

/// EXT_FRAME: a COM precedes the MACs.
pub const EXT_FRAME_FLAG_COM: u8 = 0x01;
/// EXT_FRAME: frame was redirected by a rule.
pub const EXT_FRAME_FLAG_REDIRECTED: u8 = 0x02;
/// EXT_FRAME: copy produced by WATCH.
pub const EXT_FRAME_FLAG_WATCH: u8 = 0x04;
/// EXT_FRAME: copy produced by the filter.
pub const EXT_FRAME_FLAG_COPY: u8 = 0x08;
/// EXT_FRAME: sender wants OK(EXT_FRAME).
pub const EXT_FRAME_FLAG_ACK: u8 = 0x10;

/// Flags used for a TEE copy.
pub const EXT_FRAME_FLAGS_TEE: u8 = EXT_FRAME_FLAG_COPY;
/// Flags used for a WATCH copy.
pub const EXT_FRAME_FLAGS_WATCH: u8 = EXT_FRAME_FLAG_COPY | EXT_FRAME_FLAG_WATCH | EXT_FRAME_FLAG_ACK;
/// Flags used for a redirect.
pub const EXT_FRAME_FLAGS_REDIRECT: u8 = EXT_FRAME_FLAG_COPY | EXT_FRAME_FLAG_REDIRECTED;

/// MULTICAST_GATHER: a COM follows.
pub const GATHER_FLAG_COM: u8 = 0x01;

/// MULTICAST_FRAME: a COM follows the flags.
pub const MULTICAST_FRAME_FLAG_COM: u8 = 0x01;
/// MULTICAST_FRAME: a gather limit follows.
pub const MULTICAST_FRAME_FLAG_GATHER: u8 = 0x02;
/// MULTICAST_FRAME: an explicit source MAC follows.
pub const MULTICAST_FRAME_FLAG_SOURCE_MAC: u8 = 0x04;

/// Largest credential count accepted per array in NETWORK_CREDENTIALS.
pub const MAX_CREDENTIALS_PER_ARRAY: usize = 128;

// ============================================
// HELLO
// ============================================

/// HELLO payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Hello {
    /// Sender's protocol version.
    pub protocol_version: u8,
    /// Sender's software version.
    pub software: SoftwareVersion,
    /// Sender clock, echoed in OK(HELLO).
    pub timestamp: i64,
    /// Sender's public identity.
    pub identity: Identity,
}

impl WireCodec for Hello {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.protocol_version);
        put_software(buf, self.software);
        buf.put_i64(self.timestamp);
        self.identity.encode(buf);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            protocol_version: reader.read_u8()?,
            software: read_software(reader)?,
            timestamp: reader.read_i64()?,
            identity: Identity::decode(reader)?,
        })
    }
}

fn put_software(buf: &mut BytesMut, v: SoftwareVersion) {
    buf.put_u8(v.major);
    buf.put_u8(v.minor);
    buf.put_u16(v.revision);
}

fn read_software(reader: &mut WireReader<'_>) -> Result<SoftwareVersion> {
    Ok(SoftwareVersion {
        major: reader.read_u8()?,
        minor: reader.read_u8()?,
        revision: reader.read_u16()?,
    })
}

// ============================================
// OK
// ============================================

/// Common prefix of every OK payload; the body follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OkHeader {
    /// Verb being answered (raw id, may be unknown).
    pub in_re_verb: u8,
    /// Packet id being answered.
    pub in_re_packet_id: u64,
}

impl OkHeader {
    /// Creates a header answering `verb` / `packet_id`.
    #[must_use]
    pub const fn new(verb: Verb, packet_id: u64) -> Self {
        Self {
            in_re_verb: verb.as_u8(),
            in_re_packet_id: packet_id,
        }
    }
}

impl WireCodec for OkHeader {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.in_re_verb);
        buf.put_u64(self.in_re_packet_id);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            in_re_verb: reader.read_u8()?,
            in_re_packet_id: reader.read_u64()?,
        })
    }
}

/// Body of OK(HELLO).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OkHello {
    /// Timestamp from the HELLO being answered.
    pub timestamp_echo: i64,
    /// Responder's protocol version.
    pub protocol_version: u8,
    /// Responder's software version.
    pub software: SoftwareVersion,
}

impl WireCodec for OkHello {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64(self.timestamp_echo);
        buf.put_u8(self.protocol_version);
        put_software(buf, self.software);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            timestamp_echo: reader.read_i64()?,
            protocol_version: reader.read_u8()?,
            software: read_software(reader)?,
        })
    }
}

/// Body of OK(WHOIS): the identities that were found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhoisResult {
    /// Public identities.
    pub identities: Vec<Identity>,
}

impl WireCodec for WhoisResult {
    fn encode(&self, buf: &mut BytesMut) {
        for id in &self.identities {
            id.encode(buf);
        }
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let mut identities = Vec::new();
        while !reader.is_empty() {
            identities.push(Identity::decode(reader)?);
        }
        Ok(Self { identities })
    }
}

/// Body of OK(MULTICAST_GATHER) and OK(MULTICAST_FRAME).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherResult {
    /// Network.
    pub nwid: NetworkId,
    /// Group.
    pub group: MulticastGroup,
    /// Total subscribers known to the responder.
    pub total: u32,
    /// Subscribers returned in this reply.
    pub members: Vec<Address>,
}

impl WireCodec for GatherResult {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_network_id(self.nwid);
        put_group(buf, self.group);
        buf.put_u32(self.total);
        let count = self.members.len().min(usize::from(u16::MAX));
        buf.put_u16(count as u16);
        for member in &self.members[..count] {
            buf.put_address(*member);
        }
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let nwid = reader.read_network_id()?;
        let group = read_group(reader)?;
        let total = reader.read_u32()?;
        let count = usize::from(reader.read_u16()?);
        let mut members = Vec::with_capacity(count.min(reader.remaining() / 5));
        for _ in 0..count {
            members.push(reader.read_address()?);
        }
        Ok(Self {
            nwid,
            group,
            total,
            members,
        })
    }
}

// ============================================
// ERROR
// ============================================

/// ERROR payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMessage {
    /// Verb being answered (raw id).
    pub in_re_verb: u8,
    /// Packet id being answered.
    pub in_re_packet_id: u64,
    /// Reason.
    pub code: ErrorCode,
    /// Network, for network-scoped codes.
    pub nwid: Option<NetworkId>,
}

impl ErrorMessage {
    /// Creates an error reply.
    #[must_use]
    pub const fn new(verb: Verb, packet_id: u64, code: ErrorCode, nwid: Option<NetworkId>) -> Self {
        Self {
            in_re_verb: verb.as_u8(),
            in_re_packet_id: packet_id,
            code,
            nwid,
        }
    }
}

impl WireCodec for ErrorMessage {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.in_re_verb);
        buf.put_u64(self.in_re_packet_id);
        buf.put_u8(self.code.as_u8());
        if let Some(nwid) = self.nwid {
            buf.put_network_id(nwid);
        }
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let in_re_verb = reader.read_u8()?;
        let in_re_packet_id = reader.read_u64()?;
        let raw = reader.read_u8()?;
        let code = ErrorCode::from_u8(raw)
            .ok_or_else(|| CoreError::invalid_data(format!("unknown error code {raw}")))?;
        let nwid = if code.has_network_id() && reader.remaining() >= 8 {
            Some(reader.read_network_id()?)
        } else {
            None
        };
        Ok(Self {
            in_re_verb,
            in_re_packet_id,
            code,
            nwid,
        })
    }
}

// ============================================
// WHOIS
// ============================================

/// WHOIS payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Whois {
    /// Addresses being asked about.
    pub addresses: Vec<Address>,
}

impl WireCodec for Whois {
    fn encode(&self, buf: &mut BytesMut) {
        for a in &self.addresses {
            buf.put_address(*a);
        }
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let mut addresses = Vec::with_capacity(reader.remaining() / 5);
        while reader.remaining() >= 5 {
            addresses.push(reader.read_address()?);
        }
        if addresses.is_empty() {
            return Err(CoreError::too_short(5, reader.remaining()));
        }
        Ok(Self { addresses })
    }
}

// ============================================
// FRAME / EXT_FRAME
// ============================================

/// FRAME payload; MACs are implied by the sender and receiver addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Network.
    pub nwid: NetworkId,
    /// Ethernet type.
    pub ether_type: u16,
    /// Ethernet payload.
    pub data: Vec<u8>,
}

impl WireCodec for Frame {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_network_id(self.nwid);
        buf.put_u16(self.ether_type);
        buf.put_slice(&self.data);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            nwid: reader.read_network_id()?,
            ether_type: reader.read_u16()?,
            data: reader.read_rest().to_vec(),
        })
    }
}

/// EXT_FRAME payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtFrame {
    /// Network.
    pub nwid: NetworkId,
    /// `EXT_FRAME_FLAG_*` bits (the COM bit is derived from `com`).
    pub flags: u8,
    /// Inline certificate of membership.
    pub com: Option<CertificateOfMembership>,
    /// Destination MAC.
    pub to: Mac,
    /// Source MAC.
    pub from: Mac,
    /// Ethernet type.
    pub ether_type: u16,
    /// Ethernet payload.
    pub data: Vec<u8>,
}

impl ExtFrame {
    /// Returns `true` if the sender asked for OK(EXT_FRAME).
    #[must_use]
    pub const fn wants_ack(&self) -> bool {
        self.flags & EXT_FRAME_FLAG_ACK != 0
    }

    /// Returns `true` if this is a TEE/WATCH/REDIRECT product.
    #[must_use]
    pub const fn is_filter_copy(&self) -> bool {
        self.flags & EXT_FRAME_FLAG_COPY != 0
    }
}

impl WireCodec for ExtFrame {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_network_id(self.nwid);
        let mut flags = self.flags & !EXT_FRAME_FLAG_COM;
        if self.com.is_some() {
            flags |= EXT_FRAME_FLAG_COM;
        }
        buf.put_u8(flags);
        if let Some(com) = &self.com {
            com.encode(buf);
        }
        buf.put_mac(self.to);
        buf.put_mac(self.from);
        buf.put_u16(self.ether_type);
        buf.put_slice(&self.data);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let nwid = reader.read_network_id()?;
        let flags = reader.read_u8()?;
        let com = if flags & EXT_FRAME_FLAG_COM != 0 {
            Some(CertificateOfMembership::decode(reader)?)
        } else {
            None
        };
        Ok(Self {
            nwid,
            flags,
            com,
            to: reader.read_mac()?,
            from: reader.read_mac()?,
            ether_type: reader.read_u16()?,
            data: reader.read_rest().to_vec(),
        })
    }
}

// ============================================
// Multicast
// ============================================

fn put_group(buf: &mut BytesMut, group: MulticastGroup) {
    buf.put_mac(group.mac);
    buf.put_u32(group.adi);
}

fn read_group(reader: &mut WireReader<'_>) -> Result<MulticastGroup> {
    Ok(MulticastGroup::new(reader.read_mac()?, reader.read_u32()?))
}

/// MULTICAST_LIKE payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MulticastLike {
    /// Subscribed (network, group) pairs.
    pub entries: Vec<(NetworkId, MulticastGroup)>,
}

impl WireCodec for MulticastLike {
    fn encode(&self, buf: &mut BytesMut) {
        for (nwid, group) in &self.entries {
            buf.put_network_id(*nwid);
            put_group(buf, *group);
        }
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        const ENTRY: usize = 8 + 6 + 4;
        let mut entries = Vec::with_capacity(reader.remaining() / ENTRY);
        while reader.remaining() >= ENTRY {
            entries.push((reader.read_network_id()?, read_group(reader)?));
        }
        Ok(Self { entries })
    }
}

/// MULTICAST_GATHER payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastGather {
    /// Network.
    pub nwid: NetworkId,
    /// Group to gather.
    pub group: MulticastGroup,
    /// Maximum members wanted.
    pub limit: u32,
    /// Inline certificate of membership.
    pub com: Option<CertificateOfMembership>,
}

impl WireCodec for MulticastGather {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_network_id(self.nwid);
        buf.put_u8(if self.com.is_some() { GATHER_FLAG_COM } else { 0 });
        put_group(buf, self.group);
        buf.put_u32(self.limit);
        if let Some(com) = &self.com {
            com.encode(buf);
        }
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let nwid = reader.read_network_id()?;
        let flags = reader.read_u8()?;
        let group = read_group(reader)?;
        let limit = reader.read_u32()?;
        let com = if flags & GATHER_FLAG_COM != 0 {
            Some(CertificateOfMembership::decode(reader)?)
        } else {
            None
        };
        Ok(Self {
            nwid,
            group,
            limit,
            com,
        })
    }
}

/// MULTICAST_FRAME payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastFrame {
    /// Network.
    pub nwid: NetworkId,
    /// Inline certificate of membership.
    pub com: Option<CertificateOfMembership>,
    /// If set, the receiver should also answer with gathered members.
    pub gather_limit: Option<u32>,
    /// Explicit source MAC (bridged frames).
    pub source_mac: Option<Mac>,
    /// Destination group.
    pub group: MulticastGroup,
    /// Ethernet type.
    pub ether_type: u16,
    /// Ethernet payload.
    pub data: Vec<u8>,
}

impl WireCodec for MulticastFrame {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_network_id(self.nwid);
        let mut flags = 0;
        if self.com.is_some() {
            flags |= MULTICAST_FRAME_FLAG_COM;
        }
        if self.gather_limit.is_some() {
            flags |= MULTICAST_FRAME_FLAG_GATHER;
        }
        if self.source_mac.is_some() {
            flags |= MULTICAST_FRAME_FLAG_SOURCE_MAC;
        }
        buf.put_u8(flags);
        if let Some(com) = &self.com {
            com.encode(buf);
        }
        if let Some(limit) = self.gather_limit {
            buf.put_u32(limit);
        }
        if let Some(mac) = self.source_mac {
            buf.put_mac(mac);
        }
        put_group(buf, self.group);
        buf.put_u16(self.ether_type);
        buf.put_slice(&self.data);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let nwid = reader.read_network_id()?;
        let flags = reader.read_u8()?;
        let com = if flags & MULTICAST_FRAME_FLAG_COM != 0 {
            Some(CertificateOfMembership::decode(reader)?)
        } else {
            None
        };
        let gather_limit = if flags & MULTICAST_FRAME_FLAG_GATHER != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let source_mac = if flags & MULTICAST_FRAME_FLAG_SOURCE_MAC != 0 {
            Some(reader.read_mac()?)
        } else {
            None
        };
        Ok(Self {
            nwid,
            com,
            gather_limit,
            source_mac,
            group: read_group(reader)?,
            ether_type: reader.read_u16()?,
            data: reader.read_rest().to_vec(),
        })
    }
}

// ============================================
// NETWORK_CREDENTIALS
// ============================================

/// NETWORK_CREDENTIALS payload.
///
/// ```text
/// COM* │ 0x00 │ n (2) Capability* │ n (2) Tag* │ n (2) Revocation* │ [n (2) COO*]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkCredentials {
    /// Certificates of membership.
    pub coms: Vec<CertificateOfMembership>,
    /// Capabilities.
    pub capabilities: Vec<Capability>,
    /// Tags.
    pub tags: Vec<Tag>,
    /// Revocations.
    pub revocations: Vec<Revocation>,
    /// Certificates of ownership.
    pub coos: Vec<CertificateOfOwnership>,
}

impl NetworkCredentials {
    /// Returns `true` if the bundle carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coms.is_empty()
            && self.capabilities.is_empty()
            && self.tags.is_empty()
            && self.revocations.is_empty()
            && self.coos.is_empty()
    }

    /// All credentials in wire order, as the closed credential enum.
    #[must_use]
    pub fn into_credentials(self) -> Vec<Credential> {
        let mut out = Vec::with_capacity(
            self.coms.len()
                + self.capabilities.len()
                + self.tags.len()
                + self.revocations.len()
                + self.coos.len(),
        );
        out.extend(self.coms.into_iter().map(Credential::from));
        out.extend(self.capabilities.into_iter().map(Credential::from));
        out.extend(self.tags.into_iter().map(Credential::from));
        out.extend(self.revocations.into_iter().map(Credential::from));
        out.extend(self.coos.into_iter().map(Credential::from));
        out
    }
}

fn put_array<T: WireCodec>(buf: &mut BytesMut, items: &[T]) {
    let count = items.len().min(MAX_CREDENTIALS_PER_ARRAY);
    buf.put_u16(count as u16);
    for item in &items[..count] {
        item.encode(buf);
    }
}

fn read_array<T: WireCodec>(reader: &mut WireReader<'_>) -> Result<Vec<T>> {
    let count = usize::from(reader.read_u16()?);
    if count > MAX_CREDENTIALS_PER_ARRAY {
        return Err(CoreError::too_large(MAX_CREDENTIALS_PER_ARRAY, count));
    }
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::decode(reader)?);
    }
    Ok(items)
}

impl WireCodec for NetworkCredentials {
    fn encode(&self, buf: &mut BytesMut) {
        for com in self.coms.iter().take(MAX_CREDENTIALS_PER_ARRAY) {
            com.encode(buf);
        }
        buf.put_u8(0);
        put_array(buf, &self.capabilities);
        put_array(buf, &self.tags);
        put_array(buf, &self.revocations);
        put_array(buf, &self.coos);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        let mut coms = Vec::new();
        loop {
            match reader.peek_u8() {
                Some(0) => {
                    reader.skip(1)?;
                    break;
                }
                Some(_) if coms.len() < MAX_CREDENTIALS_PER_ARRAY => {
                    coms.push(CertificateOfMembership::decode(reader)?);
                }
                Some(_) => {
                    return Err(CoreError::too_large(MAX_CREDENTIALS_PER_ARRAY, coms.len() + 1))
                }
                None => return Err(CoreError::too_short(1, 0)),
            }
        }

        let capabilities = read_array(reader)?;
        let tags = read_array(reader)?;
        let revocations = read_array(reader)?;
        // Older senders stop after revocations
        let coos = if reader.remaining() >= 2 {
            read_array(reader)?
        } else {
            Vec::new()
        };

        Ok(Self {
            coms,
            capabilities,
            tags,
            revocations,
            coos,
        })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CredentialType, Signable};
    use crate::rules::{Rule, RuleKind};
    use crate::protocol::version::{CURRENT_PROTOCOL_VERSION, SOFTWARE_VERSION};

    #[test]
    fn test_hello_roundtrip() {
        let id = Identity::generate();
        let hello = Hello {
            protocol_version: CURRENT_PROTOCOL_VERSION,
            software: SOFTWARE_VERSION,
            timestamp: 1_700_000_000_000,
            identity: id.to_public(),
        };
        let bytes = hello.to_bytes();
        let (decoded, used) = Hello::from_bytes(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, hello);
        assert!(!decoded.identity.has_private());
    }

    #[test]
    fn test_hello_truncated() {
        let hello = Hello {
            protocol_version: CURRENT_PROTOCOL_VERSION,
            software: SOFTWARE_VERSION,
            timestamp: 5,
            identity: Identity::generate().to_public(),
        };
        let bytes = hello.to_bytes();
        for cut in [0, 4, 13, 20, bytes.len() - 1] {
            assert!(Hello::from_bytes(&bytes[..cut]).is_err(), "cut {cut}");
        }
    }

    #[test]
    fn test_error_with_and_without_network() {
        let nwid = NetworkId::new(0xabcd);
        let err = ErrorMessage::new(
            Verb::Frame,
            99,
            ErrorCode::NeedMembershipCertificate,
            Some(nwid),
        );
        let (decoded, _) = ErrorMessage::from_bytes(&err.to_bytes()).unwrap();
        assert_eq!(decoded, err);

        let collision = ErrorMessage::new(Verb::Hello, 1, ErrorCode::IdentityCollision, None);
        let (decoded, _) = ErrorMessage::from_bytes(&collision.to_bytes()).unwrap();
        assert_eq!(decoded.nwid, None);

        let mut bad = collision.to_bytes();
        bad[9] = 0xee;
        assert!(ErrorMessage::from_bytes(&bad).is_err());
    }

    #[test]
    fn test_whois_requires_an_address() {
        assert!(Whois::from_bytes(&[1, 2, 3]).is_err());
        let whois = Whois {
            addresses: vec![Address::from_u64(1), Address::from_u64(2)],
        };
        assert_eq!(Whois::from_bytes(&whois.to_bytes()).unwrap().0, whois);
    }

    #[test]
    fn test_ext_frame_with_com() {
        let nwid = NetworkId::new(5);
        let frame = ExtFrame {
            nwid,
            flags: EXT_FRAME_FLAG_ACK,
            com: Some(CertificateOfMembership::new(10, 100, nwid, Address::from_u64(3))),
            to: Mac::from_u64(0x02_0000_0000_01),
            from: Mac::from_u64(0x02_0000_0000_02),
            ether_type: 0x0800,
            data: vec![0x45; 20],
        };
        let bytes = frame.to_bytes();
        let (decoded, _) = ExtFrame::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.flags, EXT_FRAME_FLAG_ACK | EXT_FRAME_FLAG_COM);
        assert_eq!(decoded.com, frame.com);
        assert_eq!(decoded.data, frame.data);
        assert!(decoded.wants_ack());
        assert!(!decoded.is_filter_copy());
    }

    #[test]
    fn test_multicast_frame_optional_sections() {
        let frame = MulticastFrame {
            nwid: NetworkId::new(5),
            com: None,
            gather_limit: Some(16),
            source_mac: Some(Mac::from_u64(0x02_1111_1111_11)),
            group: MulticastGroup::BROADCAST,
            ether_type: 0x0806,
            data: vec![1; 28],
        };
        let (decoded, _) = MulticastFrame::from_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_gather_result_count_is_checked() {
        let result = GatherResult {
            nwid: NetworkId::new(1),
            group: MulticastGroup::BROADCAST,
            total: 9,
            members: vec![Address::from_u64(7)],
        };
        let mut bytes = result.to_bytes();
        assert_eq!(GatherResult::from_bytes(&bytes).unwrap().0, result);
        // Claim two members but carry one
        let count_at = 8 + 6 + 4 + 4;
        bytes[count_at + 1] = 2;
        assert!(GatherResult::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_network_credentials_bundle() {
        let controller = Identity::generate();
        let nwid = NetworkId::from_controller(controller.address(), 1);
        let member = Address::from_u64(0x11_2233_4455);

        let mut com = CertificateOfMembership::new(1_000, 500, nwid, member);
        com.sign(&controller).unwrap();
        let mut cap = Capability::new(
            7,
            nwid,
            1_000,
            member,
            vec![
                Rule::new(RuleKind::EtherType(0x0800)),
                Rule::new(RuleKind::Accept),
            ],
        )
        .unwrap();
        cap.sign(&controller).unwrap();
        let mut rev = Revocation::new(2, nwid, CredentialType::Tag, 9, 50, member);
        rev.sign(&controller).unwrap();

        let bundle = NetworkCredentials {
            coms: vec![com],
            capabilities: vec![cap],
            tags: vec![],
            revocations: vec![rev],
            coos: vec![],
        };
        let bytes = bundle.to_bytes();
        let (decoded, used) = NetworkCredentials::from_bytes(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, bundle);

        let creds = decoded.into_credentials();
        assert_eq!(creds.len(), 3);
        assert_eq!(creds[1].credential_type(), CredentialType::Capability);

        // Without the trailing COO array
        let legacy = &bytes[..bytes.len() - 2];
        let (decoded, _) = NetworkCredentials::from_bytes(legacy).unwrap();
        assert!(decoded.coos.is_empty());
        assert_eq!(decoded.capabilities.len(), 1);
    }

    #[test]
    fn test_network_credentials_rejects_overlong_counts() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&u16::MAX.to_be_bytes());
        assert!(NetworkCredentials::from_bytes(&bytes).is_err());
        assert!(NetworkCredentials::from_bytes(&[]).is_err());
    }
}
