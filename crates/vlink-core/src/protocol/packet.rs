// ============================================
// File: crates/vlink-core/src/protocol/packet.rs
// ============================================
//! # Packet Codec
//!
//! ## Creation Reason
//! Every overlay message travels in one packet with a fixed header. The
//! header is parsed and length-checked before any other field is read,
//! and the MAC is verified before the verb is trusted.
//!
//! ## Wire Format
//! ```text
//! ┌────────────┬──────────┬──────────┬───────┬─────────┬──────┬─────────┐
//! │ packet id  │ dest     │ source   │ flags │ MAC     │ verb │ payload │
//! │ 8 bytes    │ 5 bytes  │ 5 bytes  │ 1     │ 8 bytes │ 1    │ ...     │
//! └────────────┴──────────┴──────────┴───────┴─────────┴──────┴─────────┘
//! flags: 0x80 legacy cipher │ 0x40 fragmented │ bits 3..5 cipher suite │ bits 0..2 hops
//! verb:  0x80 compressed    │ low 5 bits verb id
//! ```
//!
//! ## Receive Path
//! ```text
//! parse ──► cipher suite ──┬─ trusted path ─► caller checks path id
//!                          └─ MAC / encrypted ─► dearmor
//!       ──► uncompress ──► verb ──► payload
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Armor covers verb and payload only; hops may change in flight and
//!   are excluded from the key
//! - Compress before armoring, uncompress after dearmoring
//!
//! ## Last Modified
//! v0.1.0 - Initial packet codec

use bytes::{BufMut, Bytes, BytesMut};

use vlink_common::types::Address;

use super::compress;
use super::verb::Verb;
use crate::crypto::armor::{self, ADDRESSING_SIZE};
use crate::crypto::{PeerKey, PACKET_MAC_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Offset of the packet id.
pub const IDX_PACKET_ID: usize = 0;
/// Offset of the destination address.
pub const IDX_DEST: usize = 8;
/// Offset of the source address.
pub const IDX_SOURCE: usize = 13;
/// Offset of the flags byte.
pub const IDX_FLAGS: usize = 18;
/// Offset of the MAC (or trusted path id).
pub const IDX_MAC: usize = 19;
/// Offset of the verb byte.
pub const IDX_VERB: usize = 27;
/// Offset of the payload.
pub const IDX_PAYLOAD: usize = 28;

/// Smallest valid packet (header with empty payload).
pub const MIN_PACKET_SIZE: usize = IDX_PAYLOAD;

/// Largest packet accepted or produced.
pub const MAX_PACKET_SIZE: usize = 16384;

/// Legacy cipher flag; packets carrying it are not accepted.
pub const FLAG_ENCRYPTED_LEGACY: u8 = 0x80;

/// Packet is the head of a fragmented message.
pub const FLAG_FRAGMENTED: u8 = 0x40;

/// Mask of the cipher suite bits.
pub const FLAGS_CIPHER_MASK: u8 = 0x38;

/// Mask of the hop counter.
pub const FLAGS_HOPS_MASK: u8 = 0x07;

/// Verb byte flag: payload is compressed.
pub const VERB_FLAG_COMPRESSED: u8 = 0x80;

/// Mask of the verb id in the verb byte.
pub const VERB_MASK: u8 = 0x1f;

// ============================================
// CipherSuite
// ============================================

/// How a packet is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    /// Authenticated, payload in clear.
    MacOnly = 0,
    /// Authenticated and encrypted.
    Encrypted = 1,
    /// No crypto; the MAC field holds a trusted path id.
    TrustedPath = 2,
}

impl CipherSuite {
    /// Parses the suite from a flags byte.
    #[must_use]
    pub const fn from_flags(flags: u8) -> Option<Self> {
        if flags & FLAG_ENCRYPTED_LEGACY != 0 {
            return None;
        }
        match (flags & FLAGS_CIPHER_MASK) >> 3 {
            0 => Some(Self::MacOnly),
            1 => Some(Self::Encrypted),
            2 => Some(Self::TrustedPath),
            _ => None,
        }
    }

    const fn bits(self) -> u8 {
        (self as u8) << 3
    }
}

// ============================================
// Packet
// ============================================

/// A packet held in an owned buffer.
///
/// Construction guarantees the buffer is between `MIN_PACKET_SIZE` and
/// `MAX_PACKET_SIZE` bytes, so header accessors never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    buf: BytesMut,
}

impl Packet {
    /// Creates a packet with an empty payload, MAC-only suite, zero hops.
    #[must_use]
    pub fn new(packet_id: u64, dest: Address, source: Address, verb: Verb) -> Self {
        let mut buf = BytesMut::with_capacity(MIN_PACKET_SIZE + 64);
        buf.put_u64(packet_id);
        buf.put_slice(&dest.to_bytes());
        buf.put_slice(&source.to_bytes());
        buf.put_u8(0);
        buf.put_bytes(0, PACKET_MAC_SIZE);
        buf.put_u8(verb.as_u8());
        Self { buf }
    }

    /// Parses raw bytes received from the network.
    ///
    /// # Errors
    /// `MessageTooShort` / `MessageTooLarge` if the length is out of range.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_PACKET_SIZE {
            return Err(CoreError::too_short(MIN_PACKET_SIZE, data.len()));
        }
        if data.len() > MAX_PACKET_SIZE {
            return Err(CoreError::too_large(MAX_PACKET_SIZE, data.len()));
        }
        Ok(Self {
            buf: BytesMut::from(data),
        })
    }

    // ========================================
    // Header
    // ========================================

    /// Packet id (also the cipher nonce).
    #[must_use]
    pub fn packet_id(&self) -> u64 {
        u64::from_be_bytes(self.array::<8>(IDX_PACKET_ID))
    }

    /// Destination address.
    #[must_use]
    pub fn destination(&self) -> Address {
        address_at(&self.buf, IDX_DEST)
    }

    /// Source address.
    #[must_use]
    pub fn source(&self) -> Address {
        address_at(&self.buf, IDX_SOURCE)
    }

    /// Raw flags byte.
    #[must_use]
    pub fn flags(&self) -> u8 {
        self.buf[IDX_FLAGS]
    }

    /// Cipher suite, `None` if unsupported.
    #[must_use]
    pub fn cipher(&self) -> Option<CipherSuite> {
        CipherSuite::from_flags(self.flags())
    }

    /// Returns `true` if the packet is the head of a fragmented message.
    #[must_use]
    pub fn is_fragmented(&self) -> bool {
        self.flags() & FLAG_FRAGMENTED != 0
    }

    /// Hop count.
    #[must_use]
    pub fn hops(&self) -> u8 {
        self.flags() & FLAGS_HOPS_MASK
    }

    /// Increments the hop count, saturating at 7.
    pub fn increment_hops(&mut self) {
        let hops = self.hops();
        if hops < FLAGS_HOPS_MASK {
            self.buf[IDX_FLAGS] = (self.flags() & !FLAGS_HOPS_MASK) | (hops + 1);
        }
    }

    /// MAC field.
    #[must_use]
    pub fn mac(&self) -> [u8; PACKET_MAC_SIZE] {
        self.array::<PACKET_MAC_SIZE>(IDX_MAC)
    }

    /// Trusted path id carried in the MAC field.
    #[must_use]
    pub fn trusted_path_id(&self) -> u64 {
        u64::from_be_bytes(self.mac())
    }

    /// Returns `true` if the payload is compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.buf[IDX_VERB] & VERB_FLAG_COMPRESSED != 0
    }

    /// Verb id without flags.
    #[must_use]
    pub fn verb_id(&self) -> u8 {
        self.buf[IDX_VERB] & VERB_MASK
    }

    /// Verb.
    ///
    /// # Errors
    /// `UnknownVerb` for unassigned ids.
    pub fn verb(&self) -> Result<Verb> {
        let id = self.verb_id();
        Verb::from_u8(id).ok_or(CoreError::UnknownVerb(id))
    }

    // ========================================
    // Payload
    // ========================================

    /// Payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf[IDX_PAYLOAD..]
    }

    /// Appends to the payload.
    ///
    /// # Errors
    /// `MessageTooLarge` if the packet would exceed `MAX_PACKET_SIZE`.
    pub fn append_payload(&mut self, data: &[u8]) -> Result<()> {
        let total = self.buf.len() + data.len();
        if total > MAX_PACKET_SIZE {
            return Err(CoreError::too_large(MAX_PACKET_SIZE, total));
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Full packet length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Always `false`; a packet holds at least its header.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Converts into immutable bytes for sending.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    // ========================================
    // Compression
    // ========================================

    /// Compresses the payload if that saves space. Returns `true` if it did.
    pub fn compress(&mut self) -> bool {
        if self.is_compressed() {
            return false;
        }
        let Some(packed) = compress::compress(self.payload()) else {
            return false;
        };
        self.buf.truncate(IDX_PAYLOAD);
        self.buf.extend_from_slice(&packed);
        self.buf[IDX_VERB] |= VERB_FLAG_COMPRESSED;
        true
    }

    /// Decompresses the payload in place if it is compressed.
    ///
    /// # Errors
    /// `Compression` if the payload is corrupt or inflates past
    /// `MAX_PACKET_SIZE`.
    pub fn uncompress(&mut self) -> Result<()> {
        if !self.is_compressed() {
            return Ok(());
        }
        let plain = compress::decompress(self.payload(), MAX_PACKET_SIZE - IDX_PAYLOAD)?;
        self.buf.truncate(IDX_PAYLOAD);
        self.buf.extend_from_slice(&plain);
        self.buf[IDX_VERB] &= !VERB_FLAG_COMPRESSED;
        Ok(())
    }

    // ========================================
    // Armor
    // ========================================

    /// Authenticates (and optionally encrypts) the packet with `key`.
    pub fn armor(&mut self, key: &PeerKey, encrypt: bool) {
        let suite = if encrypt {
            CipherSuite::Encrypted
        } else {
            CipherSuite::MacOnly
        };
        self.set_cipher(suite);

        let packet_key =
            armor::per_packet_key(key, &self.addressing(), self.flags(), self.buf.len());
        let packet_id = self.packet_id();
        let mac = armor::seal(&packet_key, packet_id, &mut self.buf[IDX_VERB..], encrypt);
        self.buf[IDX_MAC..IDX_VERB].copy_from_slice(&mac);
    }

    /// Verifies the MAC and decrypts in place.
    ///
    /// # Errors
    /// - `UnsupportedCipher` for trusted-path or unknown suites
    /// - `Authentication` if the MAC does not verify
    pub fn dearmor(&mut self, key: &PeerKey) -> Result<()> {
        let encrypted = match self.cipher() {
            Some(CipherSuite::MacOnly) => false,
            Some(CipherSuite::Encrypted) => true,
            _ => return Err(CoreError::UnsupportedCipher((self.flags() & FLAGS_CIPHER_MASK) >> 3)),
        };

        let packet_key =
            armor::per_packet_key(key, &self.addressing(), self.flags(), self.buf.len());
        let packet_id = self.packet_id();
        let mac = self.mac();
        armor::open(&packet_key, packet_id, &mut self.buf[IDX_VERB..], &mac, encrypted)
    }

    /// Marks the packet as sent over a trusted path with id `path_id`.
    pub fn set_trusted_path(&mut self, path_id: u64) {
        self.set_cipher(CipherSuite::TrustedPath);
        self.buf[IDX_MAC..IDX_VERB].copy_from_slice(&path_id.to_be_bytes());
    }

    fn set_cipher(&mut self, suite: CipherSuite) {
        self.buf[IDX_FLAGS] = (self.flags() & !(FLAGS_CIPHER_MASK | FLAG_ENCRYPTED_LEGACY)) | suite.bits();
    }

    fn addressing(&self) -> [u8; ADDRESSING_SIZE] {
        self.array::<ADDRESSING_SIZE>(IDX_DEST)
    }

    fn array<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[at..at + N]);
        out
    }
}

fn address_at(buf: &[u8], at: usize) -> Address {
    let mut value = 0u64;
    for b in &buf[at..at + 5] {
        value = (value << 8) | u64::from(*b);
    }
    Address::from_u64(value)
}

// ============================================
// Tests
// ============================================
