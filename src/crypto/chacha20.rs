//! ChaCha20 stream cipher.
//!
//! Hand-rolled rather than pulled from RustCrypto so that records can be
//! crypted in place directly inside the connection buffers, mirroring how the
//! record layer consumes it.
//!
//! # References
//!
//! * [RFC 7539 Section 2.3](https://datatracker.ietf.org/doc/html/rfc7539#section-2.3)

/// `"expand 32-byte k"` as four little-endian words.
const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646E, 0x7962_2D32, 0x6B20_6574];

/// ChaCha20 keystream generator.
///
/// State layout (16 little-endian words): constants, 8 words of key, 1 word
/// of block counter, 3 words of nonce. The initial counter is caller
/// supplied: 1 for AEAD payloads, 0 when deriving the Poly1305 one-time key.
pub struct ChaCha20 {
    state: [u32; 16],
}

#[inline(always)]
fn quarter_round(state: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] = (state[d] ^ state[a]).rotate_left(16);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_left(12);
    state[a] = state[a].wrapping_add(state[b]);
    state[d] = (state[d] ^ state[a]).rotate_left(8);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_left(7);
}

impl ChaCha20 {
    pub fn new(key: &[u8; 32], counter: u32, nonce: &[u8; 12]) -> Self {
        let mut state: [u32; 16] = [0; 16];
        state[..4].copy_from_slice(&CONSTANTS);
        for (word, chunk) in state[4..12].iter_mut().zip(key.chunks_exact(4)) {
            *word = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        state[12] = counter;
        for (word, chunk) in state[13..].iter_mut().zip(nonce.chunks_exact(4)) {
            *word = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        Self { state }
    }

    /// Produce the next 64-byte keystream block, advancing the counter.
    pub fn keystream_block(&mut self) -> [u8; 64] {
        let mut working = self.state;
        for _ in 0..10 {
            // column rounds
            quarter_round(&mut working, 0, 4, 8, 12);
            quarter_round(&mut working, 1, 5, 9, 13);
            quarter_round(&mut working, 2, 6, 10, 14);
            quarter_round(&mut working, 3, 7, 11, 15);
            // diagonal rounds
            quarter_round(&mut working, 0, 5, 10, 15);
            quarter_round(&mut working, 1, 6, 11, 12);
            quarter_round(&mut working, 2, 7, 8, 13);
            quarter_round(&mut working, 3, 4, 9, 14);
        }

        let mut block: [u8; 64] = [0; 64];
        for (i, chunk) in block.chunks_exact_mut(4).enumerate() {
            chunk.copy_from_slice(&working[i].wrapping_add(self.state[i]).to_le_bytes());
        }
        self.state[12] = self.state[12].wrapping_add(1);
        block
    }

    /// XOR `data` with the keystream in place.
    pub fn crypt(&mut self, data: &mut [u8]) {
        for chunk in data.chunks_mut(64) {
            let block = self.keystream_block();
            for (byte, key_byte) in chunk.iter_mut().zip(block) {
                *byte ^= key_byte;
            }
        }
    }

    #[cfg(test)]
    fn state_bytes(&self) -> [u8; 64] {
        let mut bytes: [u8; 64] = [0; 64];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.state) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}
