// ============================================
// File: crates/vlink-core/src/crypto/armor.rs
// ============================================
//! # Packet Armor
//!
//! ## Creation Reason
//! Every packet between two peers carries an 8-byte MAC computed with a
//! key unique to that packet. Optionally the verb and payload are also
//! encrypted. This module holds the primitive; header handling lives in
//! `protocol::packet`.
//!
//! ## Main Functionality
//! - `per_packet_key`: mangle the peer key with header fields
//! - `seal`: (optionally encrypt, then) compute the MAC
//! - `open`: verify the MAC in constant time, then (optionally) decrypt
//!
//! ## Construction
//! ```text
//! key'  = peer_key ⊕ (dest ‖ source ‖ flags & 0xf8 ‖ len_lo ‖ len_hi)
//! nonce = packet_id (8, BE) ‖ 0x00000000
//! block0 = ChaCha20(key', nonce)[0..64]
//! poly_key = block0[0..32]
//! body  = body ⊕ ChaCha20 stream from byte 64        (encrypted suite only)
//! mac   = Poly1305(poly_key, body)[0..8]
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Hop bits are masked out of the key so relays can increment hops
//!   without invalidating the MAC
//! - Never reuse a packet id with the same key
//!
//! ## Last Modified
//! v0.1.0 - Initial packet armor

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use poly1305::universal_hash::KeyInit;
use poly1305::Poly1305;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use super::kdf::PeerKey;
use super::{PACKET_MAC_SIZE, PEER_KEY_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Destination plus source address bytes mixed into the packet key.
pub const ADDRESSING_SIZE: usize = 10;

/// Flag bits that participate in the packet key (hops excluded).
pub const FLAGS_KEY_MASK: u8 = 0xf8;

// ============================================
// Key Mangling
// ============================================

/// Derives the key used for one packet.
#[must_use]
pub fn per_packet_key(
    key: &PeerKey,
    addressing: &[u8; ADDRESSING_SIZE],
    flags: u8,
    packet_len: usize,
) -> Zeroizing<[u8; PEER_KEY_SIZE]> {
    let mut out = Zeroizing::new(*key.as_bytes());
    for (k, a) in out.iter_mut().zip(addressing.iter()) {
        *k ^= *a;
    }
    out[ADDRESSING_SIZE] ^= flags & FLAGS_KEY_MASK;
    out[ADDRESSING_SIZE + 1] ^= (packet_len & 0xff) as u8;
    out[ADDRESSING_SIZE + 2] ^= ((packet_len >> 8) & 0xff) as u8;
    out
}

fn keystream(key: &[u8; PEER_KEY_SIZE], packet_id: u64) -> (ChaCha20, Poly1305) {
    let mut nonce = [0u8; 12];
    nonce[..8].copy_from_slice(&packet_id.to_be_bytes());

    let mut cipher = ChaCha20::new(key.into(), (&nonce).into());
    let mut block = [0u8; 64];
    cipher.apply_keystream(&mut block);
    let mac = Poly1305::new(poly1305::Key::from_slice(&block[..32]));
    block.zeroize();

    (cipher, mac)
}

// ============================================
// Seal / Open
// ============================================

/// Encrypts `body` in place when `encrypt` is set and returns the MAC.
#[must_use]
pub fn seal(
    key: &[u8; PEER_KEY_SIZE],
    packet_id: u64,
    body: &mut [u8],
    encrypt: bool,
) -> [u8; PACKET_MAC_SIZE] {
    let (mut cipher, mac) = keystream(key, packet_id);
    if encrypt {
        cipher.apply_keystream(body);
    }
    let tag = mac.compute_unpadded(body);
    let mut out = [0u8; PACKET_MAC_SIZE];
    out.copy_from_slice(&tag[..PACKET_MAC_SIZE]);
    out
}

/// Verifies `mac` over `body` and decrypts it in place when `encrypted`.
///
/// # Errors
/// `Authentication` if the MAC does not match; `body` is left untouched.
pub fn open(
    key: &[u8; PEER_KEY_SIZE],
    packet_id: u64,
    body: &mut [u8],
    mac: &[u8],
    encrypted: bool,
) -> Result<()> {
    let (mut cipher, poly) = keystream(key, packet_id);
    let tag = poly.compute_unpadded(body);
    if mac.len() != PACKET_MAC_SIZE || !bool::from(tag[..PACKET_MAC_SIZE].ct_eq(mac)) {
        return Err(CoreError::Authentication);
    }
    if encrypted {
        cipher.apply_keystream(body);
    }
    Ok(())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> Zeroizing<[u8; PEER_KEY_SIZE]> {
        per_packet_key(&PeerKey::from_bytes([7u8; 32]), &[1u8; 10], 0x08, 100)
    }

    #[test]
    fn test_seal_open_mac_only() {
        let key = test_key();
        let mut body = b"verb and payload".to_vec();
        let mac = seal(&key, 42, &mut body, false);
        assert_eq!(&body, b"verb and payload");
        assert!(open(&key, 42, &mut body, &mac, false).is_ok());
    }

    #[test]
    fn test_seal_open_encrypted() {
        let key = test_key();
        let mut body = b"secret payload".to_vec();
        let mac = seal(&key, 9, &mut body, true);
        assert_ne!(&body, b"secret payload");
        open(&key, 9, &mut body, &mac, true).unwrap();
        assert_eq!(&body, b"secret payload");
    }

    #[test]
    fn test_tamper_detected() {
        let key = test_key();
        let mut body = b"payload".to_vec();
        let mac = seal(&key, 1, &mut body, false);
        body[0] ^= 1;
        assert!(matches!(
            open(&key, 1, &mut body, &mac, false),
            Err(CoreError::Authentication)
        ));
    }

    #[test]
    fn test_packet_id_and_header_bound() {
        let key = test_key();
        let mut body = b"payload".to_vec();
        let mac = seal(&key, 1, &mut body, false);
        assert!(open(&key, 2, &mut body, &mac, false).is_err());

        let other = per_packet_key(&PeerKey::from_bytes([7u8; 32]), &[1u8; 10], 0x08, 101);
        assert!(open(&other, 1, &mut body, &mac, false).is_err());
    }

    #[test]
    fn test_hops_do_not_change_key() {
        let peer = PeerKey::from_bytes([3u8; 32]);
        let a = per_packet_key(&peer, &[0u8; 10], 0x08, 64);
        let b = per_packet_key(&peer, &[0u8; 10], 0x0f, 64);
        assert_eq!(*a, *b);
    }
}
