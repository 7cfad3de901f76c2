//! Poly1305 one-time authenticator.
//!
//! Arithmetic over 2^130 - 5 with five 26-bit limbs, the same constant-time
//! radix scheme poly1305-donna uses. A key must never authenticate more than
//! one message; the AEAD derives a fresh one per record.
//!
//! # References
//!
//! * [RFC 7539 Section 2.5](https://datatracker.ietf.org/doc/html/rfc7539#section-2.5)

use subtle::ConstantTimeEq;

const BLOCK_SIZE: usize = 16;
const MASK_26: u32 = 0x03FF_FFFF;

/// 16-byte authenticator tag with constant-time equality.
#[derive(Clone, Copy, Debug)]
pub struct Tag(pub [u8; 16]);

impl Tag {
    /// Constant-time comparison against a received tag.
    pub fn ct_eq_bytes(&self, other: &[u8; 16]) -> bool {
        self.0.ct_eq(other).into()
    }
}

/// Incremental Poly1305 state.
pub struct Poly1305 {
    /// Clamped `r`, split into 26-bit limbs.
    r: [u32; 5],
    /// `r[1..5] * 5`, folded in during reduction.
    s: [u32; 4],
    /// Accumulator.
    h: [u32; 5],
    /// `s` part of the key, added after the final reduction.
    pad: [u32; 4],
    buffer: [u8; BLOCK_SIZE],
    buffered: usize,
}

impl Poly1305 {
    pub fn new(key: &[u8; 32]) -> Self {
        let le32 = |i: usize| u32::from_le_bytes(key[i..i + 4].try_into().unwrap());

        // r &= 0x0ffffffc0ffffffc0ffffffc0fffffff
        let r = [
            le32(0) & 0x03FF_FFFF,
            (le32(3) >> 2) & 0x03FF_FF03,
            (le32(6) >> 4) & 0x03FF_C0FF,
            (le32(9) >> 6) & 0x03F0_3FFF,
            (le32(12) >> 8) & 0x000F_FFFF,
        ];

        Self {
            r,
            s: [r[1] * 5, r[2] * 5, r[3] * 5, r[4] * 5],
            h: [0; 5],
            pad: [le32(16), le32(20), le32(24), le32(28)],
            buffer: [0; BLOCK_SIZE],
            buffered: 0,
        }
    }

    fn process_block(&mut self, block: &[u8; BLOCK_SIZE], high_bit: u32) {
        let le32 = |i: usize| u32::from_le_bytes(block[i..i + 4].try_into().unwrap());

        let h0 = self.h[0] + (le32(0) & MASK_26);
        let h1 = self.h[1] + ((le32(3) >> 2) & MASK_26);
        let h2 = self.h[2] + ((le32(6) >> 4) & MASK_26);
        let h3 = self.h[3] + ((le32(9) >> 6) & MASK_26);
        let h4 = self.h[4] + ((le32(12) >> 8) | high_bit);

        let [r0, r1, r2, r3, r4] = self.r.map(u64::from);
        let [s1, s2, s3, s4] = self.s.map(u64::from);
        let [h0, h1, h2, h3, h4] = [h0, h1, h2, h3, h4].map(u64::from);

        // h *= r mod 2^130 - 5; the s-limbs carry the reduction of the
        // products that overflow 2^130.
        let d0 = h0 * r0 + h1 * s4 + h2 * s3 + h3 * s2 + h4 * s1;
        let d1 = h0 * r1 + h1 * r0 + h2 * s4 + h3 * s3 + h4 * s2;
        let d2 = h0 * r2 + h1 * r1 + h2 * r0 + h3 * s4 + h4 * s3;
        let d3 = h0 * r3 + h1 * r2 + h2 * r1 + h3 * r0 + h4 * s4;
        let d4 = h0 * r4 + h1 * r3 + h2 * r2 + h3 * r1 + h4 * r0;

        let mut carry: u64;
        let mut h: [u32; 5] = [0; 5];
        carry = d0 >> 26;
        h[0] = (d0 as u32) & MASK_26;
        let d1 = d1 + carry;
        carry = d1 >> 26;
        h[1] = (d1 as u32) & MASK_26;
        let d2 = d2 + carry;
        carry = d2 >> 26;
        h[2] = (d2 as u32) & MASK_26;
        let d3 = d3 + carry;
        carry = d3 >> 26;
        h[3] = (d3 as u32) & MASK_26;
        let d4 = d4 + carry;
        carry = d4 >> 26;
        h[4] = (d4 as u32) & MASK_26;

        h[0] += (carry as u32) * 5;
        let carry = h[0] >> 26;
        h[0] &= MASK_26;
        h[1] += carry;

        self.h = h;
    }

    pub fn update(&mut self, mut data: &[u8]) {
        if self.buffered > 0 {
            let want = (BLOCK_SIZE - self.buffered).min(data.len());
            self.buffer[self.buffered..self.buffered + want].copy_from_slice(&data[..want]);
            self.buffered += want;
            data = &data[want..];
            if self.buffered < BLOCK_SIZE {
                return;
            }
            let block = self.buffer;
            self.process_block(&block, 1 << 24);
            self.buffered = 0;
        }

        let mut chunks = data.chunks_exact(BLOCK_SIZE);
        for chunk in &mut chunks {
            let block: [u8; BLOCK_SIZE] = chunk.try_into().unwrap();
            self.process_block(&block, 1 << 24);
        }

        let rem = chunks.remainder();
        self.buffer[..rem.len()].copy_from_slice(rem);
        self.buffered = rem.len();
    }

    pub fn finalize(mut self) -> Tag {
        if self.buffered > 0 {
            // final partial block: append 0x01, zero-pad, no high bit
            let mut block: [u8; BLOCK_SIZE] = [0; BLOCK_SIZE];
            block[..self.buffered].copy_from_slice(&self.buffer[..self.buffered]);
            block[self.buffered] = 1;
            self.process_block(&block, 0);
        }

        let mut h = self.h;

        // full carry propagation
        let mut carry = h[1] >> 26;
        h[1] &= MASK_26;
        h[2] += carry;
        carry = h[2] >> 26;
        h[2] &= MASK_26;
        h[3] += carry;
        carry = h[3] >> 26;
        h[3] &= MASK_26;
        h[4] += carry;
        carry = h[4] >> 26;
        h[4] &= MASK_26;
        h[0] += carry * 5;
        carry = h[0] >> 26;
        h[0] &= MASK_26;
        h[1] += carry;

        // g = h + 5 - 2^130; select g when h >= p, without branching
        let mut g: [u32; 5] = [0; 5];
        carry = 5;
        for i in 0..4 {
            let v = h[i] + carry;
            carry = v >> 26;
            g[i] = v & MASK_26;
        }
        g[4] = h[4].wrapping_add(carry).wrapping_sub(1 << 26);

        let mask = (g[4] >> 31).wrapping_sub(1);
        for i in 0..5 {
            h[i] = (h[i] & !mask) | (g[i] & mask);
        }

        // squeeze 5x26 bits into 4x32 and add the pad with 64-bit carries
        let packed: [u32; 4] = [
            h[0] | (h[1] << 26),
            (h[1] >> 6) | (h[2] << 20),
            (h[2] >> 12) | (h[3] << 14),
            (h[3] >> 18) | (h[4] << 8),
        ];

        let mut tag: [u8; 16] = [0; 16];
        let mut wide: u64 = 0;
        for i in 0..4 {
            wide = u64::from(packed[i]) + u64::from(self.pad[i]) + (wide >> 32);
            tag[i * 4..i * 4 + 4].copy_from_slice(&(wide as u32).to_le_bytes());
        }

        Tag(tag)
    }
}
