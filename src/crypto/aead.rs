//! AEAD_CHACHA20_POLY1305.
//!
//! Encryption and decryption are in place: the caller's buffer holds
//! plaintext going in and ciphertext coming out (or vice versa), which lets
//! the record layer wrap and unwrap directly inside the connection buffers.
//!
//! # References
//!
//! * [RFC 7539 Section 2.8](https://datatracker.ietf.org/doc/html/rfc7539#section-2.8)

use super::chacha20::ChaCha20;
use super::poly1305::{Poly1305, Tag};

/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

/// One-time Poly1305 key: the first 32 bytes of the keystream at counter 0.
///
/// # References
///
/// * [RFC 7539 Section 2.6](https://datatracker.ietf.org/doc/html/rfc7539#section-2.6)
fn poly1305_key(key: &[u8; 32], nonce: &[u8; 12]) -> [u8; 32] {
    let block = ChaCha20::new(key, 0, nonce).keystream_block();
    block[..32].try_into().unwrap()
}

/// MAC input: `aad ‖ pad16(aad) ‖ ciphertext ‖ pad16(ciphertext) ‖
/// le64(len(aad)) ‖ le64(len(ciphertext))`.
fn authenticate(poly_key: &[u8; 32], aad: &[u8], ciphertext: &[u8]) -> Tag {
    const ZERO_PAD: [u8; 16] = [0; 16];
    let pad16 = |len: usize| (16 - len % 16) % 16;

    let mut poly = Poly1305::new(poly_key);
    poly.update(aad);
    poly.update(&ZERO_PAD[..pad16(aad.len())]);
    poly.update(ciphertext);
    poly.update(&ZERO_PAD[..pad16(ciphertext.len())]);
    poly.update(&(aad.len() as u64).to_le_bytes());
    poly.update(&(ciphertext.len() as u64).to_le_bytes());
    poly.finalize()
}

/// Encrypt `data` in place and return the authenticator tag.
pub fn encrypt(key: &[u8; 32], nonce: &[u8; 12], aad: &[u8], data: &mut [u8]) -> [u8; TAG_LEN] {
    let poly_key = poly1305_key(key, nonce);
    ChaCha20::new(key, 1, nonce).crypt(data);
    authenticate(&poly_key, aad, data).0
}

/// Verify `tag` in constant time and decrypt `data` in place.
///
/// Returns `false` on tag mismatch; the buffer contents are indeterminate in
/// that case and must not be used.
#[must_use]
pub fn decrypt(
    key: &[u8; 32],
    nonce: &[u8; 12],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> bool {
    let poly_key = poly1305_key(key, nonce);
    let expected = authenticate(&poly_key, aad, data);
    ChaCha20::new(key, 1, nonce).crypt(data);
    expected.ct_eq_bytes(tag)
}
