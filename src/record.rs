//! TLS record framing and AEAD protection.
//!
//! # References
//!
//! * [RFC 8446 Section 5](https://datatracker.ietf.org/doc/html/rfc8446#section-5)

use crate::codec::View;
use crate::crypto::{aead, TAG_LEN};
use crate::key_schedule::{from_prk, hkdf_expand_label};
use crate::status::Error;
use sha2::digest::{
    generic_array::GenericArray,
    typenum::{U12, U32},
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Record header length: type, two version bytes, big-endian length.
pub(crate) const HEADER_LEN: usize = 5;

/// Ciphertext length cap; anything larger is a `record_overflow`.
///
/// # References
///
/// * [RFC 8446 Section 5.2](https://datatracker.ietf.org/doc/html/rfc8446#section-5.2)
pub(crate) const MAX_CIPHERTEXT_LEN: usize = (1 << 14) + 256;

/// Record content type.
///
/// ```text
/// enum {
///     invalid(0),
///     change_cipher_spec(20),
///     alert(21),
///     handshake(22),
///     application_data(23),
///     (255)
/// } ContentType;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub(crate) enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl From<ContentType> for u8 {
    #[inline]
    fn from(content_type: ContentType) -> Self {
        content_type as u8
    }
}

impl TryFrom<u8> for ContentType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == (Self::ChangeCipherSpec as u8) => Ok(Self::ChangeCipherSpec),
            x if x == (Self::Alert as u8) => Ok(Self::Alert),
            x if x == (Self::Handshake as u8) => Ok(Self::Handshake),
            x if x == (Self::ApplicationData as u8) => Ok(Self::ApplicationData),
            _ => Err(value),
        }
    }
}

/// Parsed 5-byte record header.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordHeader {
    buf: [u8; HEADER_LEN],
}

impl RecordHeader {
    /// Validate the version bytes and content type of a raw header.
    ///
    /// The major version must be 3. The minor version may be 1 (the
    /// compatibility version on ClientHello records), 3, or 4; anything else
    /// means the stream is not TLS and the connection is unrecoverable.
    pub fn deser(buf: [u8; HEADER_LEN]) -> Result<Self, Error> {
        if ContentType::try_from(buf[0]).is_err() {
            return Err(Error::decode(format!(
                "invalid record content type 0x{:02x}",
                buf[0]
            )));
        }
        if buf[1] != 3 {
            return Err(Error::decode(format!(
                "record version major is {}, expected 3",
                buf[1]
            )));
        }
        if buf[2] != 1 && buf[2] != 3 && buf[2] != 4 {
            return Err(Error::decode(format!(
                "record version minor is {}, expected 1, 3 or 4",
                buf[2]
            )));
        }
        Ok(Self { buf })
    }

    pub fn ser(content_type: ContentType, length: u16) -> Self {
        Self {
            buf: [
                content_type.into(),
                0x03,
                0x03,
                (length >> 8) as u8,
                length as u8,
            ],
        }
    }

    pub fn content_type(&self) -> ContentType {
        // validated in the constructor
        ContentType::try_from(self.buf[0]).unwrap()
    }

    pub fn length(&self) -> usize {
        usize::from(u16::from_be_bytes([self.buf[3], self.buf[4]]))
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.buf
    }
}

/// Per-direction AEAD state: traffic key, static IV, record counter.
///
/// The counter is owned exclusively by this struct and advances exactly once
/// per wrap/unwrap, which is what keeps nonces from ever repeating within a
/// direction.
///
/// # References
///
/// * [RFC 8446 Section 5.3](https://datatracker.ietf.org/doc/html/rfc8446#section-5.3)
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct RecordWrapper {
    key: [u8; 32],
    iv: [u8; 12],
    counter: u64,
}

impl RecordWrapper {
    /// Derive the key and IV from a traffic secret.
    ///
    /// ```text
    /// [sender]_write_key = HKDF-Expand-Label(Secret, "key", "", key_length)
    /// [sender]_write_iv  = HKDF-Expand-Label(Secret, "iv", "", iv_length)
    /// ```
    pub fn from_traffic_secret(secret: &[u8; 32]) -> Self {
        let hkdf = from_prk(secret);
        let key: GenericArray<u8, U32> = hkdf_expand_label(&hkdf, b"key", &[]);
        let iv: GenericArray<u8, U12> = hkdf_expand_label(&hkdf, b"iv", &[]);
        Self {
            key: key.into(),
            iv: iv.into(),
            counter: 0,
        }
    }

    /// Per-record nonce: the 64-bit big-endian counter XORed into the last
    /// eight bytes of the IV.
    fn nonce(&self) -> [u8; 12] {
        let mut nonce = self.iv;
        for (nonce_byte, counter_byte) in
            nonce[4..].iter_mut().zip(self.counter.to_be_bytes())
        {
            *nonce_byte ^= counter_byte;
        }
        nonce
    }

    /// Wrap `plaintext` as one protected record appended to `out`.
    ///
    /// The emitted layout is `header ‖ AEAD(plaintext ‖ inner_type) ‖ tag`,
    /// encrypted in place inside `out` with the header as associated data.
    pub fn wrap(&mut self, out: &mut Vec<u8>, inner_type: ContentType, plaintext: &[u8]) {
        let length = plaintext.len() + 1 + TAG_LEN;
        debug_assert!(length <= MAX_CIPHERTEXT_LEN);

        let header = RecordHeader::ser(ContentType::ApplicationData, length as u16);
        out.extend_from_slice(header.as_bytes());

        let body_start = out.len();
        out.extend_from_slice(plaintext);
        out.push(inner_type.into());

        let nonce = self.nonce();
        let tag = aead::encrypt(&self.key, &nonce, header.as_bytes(), &mut out[body_start..]);
        out.extend_from_slice(&tag);

        self.counter += 1;
    }

    /// Unwrap a protected record in place.
    ///
    /// Returns the inner content type and the length of the plaintext, which
    /// now occupies `contents[..len]`.
    pub fn unwrap(
        &mut self,
        header: &RecordHeader,
        contents: &mut [u8],
    ) -> Result<(u8, usize), Error> {
        if contents.len() < TAG_LEN + 1 {
            return Err(Error::decode(format!(
                "encrypted record of {} bytes cannot hold a tag and content type",
                contents.len()
            )));
        }

        let tag: [u8; TAG_LEN] = View::new(contents).last(TAG_LEN).try_into().unwrap();
        let split = contents.len() - TAG_LEN;
        let data = &mut contents[..split];

        let nonce = self.nonce();
        let ok = aead::decrypt(&self.key, &nonce, header.as_bytes(), data, &tag);
        self.counter += 1;
        if !ok {
            return Err(Error::crypto("record authentication failed".to_string()));
        }

        // The plaintext ends with the true content type, optionally followed
        // by zero padding (RFC 8446 Section 5.4).
        let mut end = data.len();
        while end > 0 && data[end - 1] == 0 {
            end -= 1;
        }
        if end == 0 {
            return Err(Error::decode(
                "protected record holds no content type".to_string(),
            ));
        }
        Ok((data[end - 1], end - 1))
    }
}
