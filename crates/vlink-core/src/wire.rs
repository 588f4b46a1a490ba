// ============================================
// File: crates/vlink-core/src/wire.rs
// ============================================
//! # Wire Codec Primitives
//!
//! ## Creation Reason
//! Every byte that reaches the core comes from an untrusted peer. All
//! decoding goes through [`WireReader`], a cursor over a borrowed slice
//! whose every read is length-checked, so no decoder can construct a
//! value that overruns its backing buffer.
//!
//! ## Main Functionality
//! - `WireReader`: bounds-checked big-endian cursor
//! - `WireCodec`: encode/decode trait implemented by credentials, rules
//!   and verb payloads
//! - `PutWire`: `BufMut` helpers for overlay identifier types
//!
//! ## Wire Format
//! All multi-byte integers are big-endian.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never index the input slice directly in a decoder; use the reader
//! - Length fields read from the wire must be bounded before use
//!
//! ## Last Modified
//! v0.1.0 - Initial wire primitives

use bytes::{BufMut, BytesMut};

use vlink_common::types::{Address, Mac, NetworkId, ADDRESS_SIZE, MAC_SIZE};

use crate::error::{CoreError, Result};

// ============================================
// WireReader
// ============================================

/// Bounds-checked cursor over untrusted input.
///
/// # Example
/// ```
/// use vlink_core::wire::WireReader;
///
/// let mut reader = WireReader::new(&[0x00, 0x2a, 0x07]);
/// assert_eq!(reader.read_u16().unwrap(), 42);
/// assert_eq!(reader.read_u8().unwrap(), 7);
/// assert!(reader.read_u8().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns `true` if every byte has been consumed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the next byte without consuming it.
    #[must_use]
    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Consumes and returns the next `n` bytes.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or_else(|| CoreError::invalid_data("length overflow"))?;
        if end > self.buf.len() {
            return Err(CoreError::too_short(end, self.buf.len()));
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Consumes everything that is left.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    /// Skips `n` bytes.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than `n` bytes remain.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Reads a fixed-size array.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads one byte.
    ///
    /// # Errors
    /// `MessageTooShort` at end of input.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a big-endian `u16`.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian `u32`.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian `u64`.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian `i64`.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than 8 bytes remain.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Reads a 5-byte overlay address.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than 5 bytes remain.
    pub fn read_address(&mut self) -> Result<Address> {
        let bytes = self.read_bytes(ADDRESS_SIZE)?;
        Address::from_bytes(bytes).ok_or_else(|| CoreError::invalid_data("address"))
    }

    /// Reads a 6-byte MAC.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than 6 bytes remain.
    pub fn read_mac(&mut self) -> Result<Mac> {
        let bytes = self.read_bytes(MAC_SIZE)?;
        Mac::from_bytes(bytes).ok_or_else(|| CoreError::invalid_data("mac"))
    }

    /// Reads an 8-byte network id.
    ///
    /// # Errors
    /// `MessageTooShort` if fewer than 8 bytes remain.
    pub fn read_network_id(&mut self) -> Result<NetworkId> {
        Ok(NetworkId::new(self.read_u64()?))
    }
}

// ============================================
// PutWire
// ============================================

/// Writers for overlay identifiers in their wire form.
pub trait PutWire: BufMut {
    /// Appends a 5-byte address.
    fn put_address(&mut self, address: Address) {
        self.put_slice(&address.to_bytes());
    }

    /// Appends a 6-byte MAC.
    fn put_mac(&mut self, mac: Mac) {
        self.put_slice(&mac.to_bytes());
    }

    /// Appends an 8-byte network id.
    fn put_network_id(&mut self, nwid: NetworkId) {
        self.put_u64(nwid.as_u64());
    }
}

impl<T: BufMut + ?Sized> PutWire for T {}

// ============================================
// WireCodec Trait
// ============================================

/// Types with a canonical wire encoding.
pub trait WireCodec: Sized {
    /// Appends the wire form to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Decodes one value, advancing the reader past it.
    ///
    /// # Errors
    /// Any decoding error; the reader position is unspecified afterwards.
    fn decode(reader: &mut WireReader<'_>) -> Result<Self>;

    /// Returns the wire form as an owned buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }

    /// Decodes one value from the start of `data`, returning it and the
    /// number of bytes consumed.
    ///
    /// # Errors
    /// Any decoding error.
    fn from_bytes(data: &[u8]) -> Result<(Self, usize)> {
        let mut reader = WireReader::new(data);
        let value = Self::decode(&mut reader)?;
        Ok((value, reader.position()))
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_integers() {
        let data = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
            0x0f,
        ];
        let mut r = WireReader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x0203);
        assert_eq!(r.read_u32().unwrap(), 0x0405_0607);
        assert_eq!(r.read_u64().unwrap(), 0x0809_0a0b_0c0d_0e0f);
        assert!(r.is_empty());
    }

    #[test]
    fn test_reader_rejects_overrun() {
        let mut r = WireReader::new(&[0u8; 4]);
        assert!(matches!(
            r.read_u64(),
            Err(CoreError::MessageTooShort { expected: 8, actual: 4 })
        ));
        // Failed reads do not consume input
        assert_eq!(r.position(), 0);
        assert!(r.read_bytes(usize::MAX).is_err());
    }

    #[test]
    fn test_reader_identifiers() {
        let mut buf = BytesMut::new();
        buf.put_address(Address::from_u64(0x01_0203_0405));
        buf.put_mac(Mac::from_u64(0x0a0b_0c0d_0e0f));
        buf.put_network_id(NetworkId::new(42));

        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_address().unwrap(), Address::from_u64(0x01_0203_0405));
        assert_eq!(r.read_mac().unwrap(), Mac::from_u64(0x0a0b_0c0d_0e0f));
        assert_eq!(r.read_network_id().unwrap(), NetworkId::new(42));
    }

    #[test]
    fn test_reader_peek_and_rest() {
        let mut r = WireReader::new(&[9, 8, 7]);
        assert_eq!(r.peek_u8(), Some(9));
        r.skip(1).unwrap();
        assert_eq!(r.read_rest(), &[8, 7]);
        assert_eq!(r.peek_u8(), None);
    }
}
