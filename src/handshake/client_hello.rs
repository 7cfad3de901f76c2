//! ClientHello serialization.
//!
//! The layout below is bit-exact: a server-side capture of this hello is the
//! ground truth for the extension set, ordering, and every length prefix.
//!
//! # References
//!
//! * [RFC 8446 Section 4.1.2](https://datatracker.ietf.org/doc/html/rfc8446#section-4.1.2)
//!
//! ```text
//! struct {
//!     ProtocolVersion legacy_version = 0x0303;    /* TLS v1.2 */
//!     Random random;
//!     opaque legacy_session_id<0..32>;
//!     CipherSuite cipher_suites<2..2^16-2>;
//!     opaque legacy_compression_methods<1..2^8-1>;
//!     Extension extensions<8..2^16-1>;
//! } ClientHello;
//! ```

use crate::cipher_suites::{CipherSuite, EMPTY_RENEGOTIATION_INFO_SCSV};
use crate::codec::{append_u16_be, put_u16_be, put_u24_be};
use crate::extension::{ExtensionType, NamedGroup};
use crate::handshake::HandshakeType;
use crate::record::ContentType;
use sha2::{Digest, Sha256};
use x25519_dalek::PublicKey;

/// Offered cipher suites: ChaCha20-Poly1305 first (the only one the client
/// can run), the GCM suites for compatibility, then the renegotiation SCSV.
const CIPHER_SUITES: [CipherSuite; 3] = [
    CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
    CipherSuite::TLS_AES_128_GCM_SHA256,
    CipherSuite::TLS_AES_256_GCM_SHA384,
];

/// Offered groups; only x25519 is backed by an implementation.
const SUPPORTED_GROUPS: [NamedGroup; 10] = [
    NamedGroup::x25519,
    NamedGroup::secp256r1,
    NamedGroup::x448,
    NamedGroup::secp521r1,
    NamedGroup::secp384r1,
    NamedGroup::ffdhe2048,
    NamedGroup::ffdhe3072,
    NamedGroup::ffdhe4096,
    NamedGroup::ffdhe6144,
    NamedGroup::ffdhe8192,
];

/// Advertised signature schemes (the client never verifies signatures, but a
/// server may refuse a hello without a plausible list).
const SIGNATURE_ALGORITHMS: [u16; 14] = [
    0x0807, // ED25519
    0x0403, // ECDSA-SECP256r1-SHA256
    0x0503, // ECDSA-SECP384r1-SHA384
    0x0603, // ECDSA-SECP521r1-SHA512
    0x0808, // ED448
    0x0809, // RSA-PSS-PSS-SHA256
    0x080A, // RSA-PSS-PSS-SHA384
    0x080B, // RSA-PSS-PSS-SHA512
    0x0804, // RSA-PSS-RSAE-SHA256
    0x0805, // RSA-PSS-RSAE-SHA384
    0x0806, // RSA-PSS-RSAE-SHA512
    0x0401, // RSA-PKCS1-SHA256
    0x0501, // RSA-PKCS1-SHA384
    0x0601, // RSA-PKCS1-SHA512
];

/// EC point formats: uncompressed, ansiX962_compressed_prime,
/// ansiX962_compressed_char2.
const EC_POINT_FORMATS: [u8; 3] = [0x00, 0x01, 0x02];

/// Serialize the ClientHello record into `out` and absorb the handshake body
/// (record header excluded) into `transcript`.
pub(crate) fn ser(
    out: &mut Vec<u8>,
    transcript: &mut Sha256,
    random: &[u8; 32],
    session_id: &[u8; 32],
    server_name: Option<&str>,
    client_public: &PublicKey,
) {
    // Record header: handshake, protocol version TLS 1.0 for compatibility.
    out.push(ContentType::Handshake.into());
    out.extend_from_slice(&[0x03, 0x01]);
    let record_length_offset = out.len();
    append_u16_be(out, 0); // placeholder
    let record_begin = out.len();

    out.push(HandshakeType::ClientHello.into());
    let handshake_length_offset = out.len();
    out.extend_from_slice(&[0, 0, 0]); // placeholder
    let handshake_begin = out.len();

    // client version: TLS 1.2 for compatibility
    out.extend_from_slice(&[0x03, 0x03]);
    out.extend_from_slice(random);

    // opaque legacy session id
    out.push(session_id.len() as u8);
    out.extend_from_slice(session_id);

    append_u16_be(out, ((CIPHER_SUITES.len() + 1) * 2) as u16);
    for suite in CIPHER_SUITES {
        out.extend_from_slice(&suite.value());
    }
    out.extend_from_slice(&EMPTY_RENEGOTIATION_INFO_SCSV);

    // legacy compression: null only
    out.extend_from_slice(&[0x01, 0x00]);

    let extensions_length_offset = out.len();
    append_u16_be(out, 0); // placeholder
    let extensions_begin = out.len();

    // server name indication
    // https://datatracker.ietf.org/doc/html/rfc6066#section-3
    if let Some(name) = server_name {
        let hostname_length = name.len() as u16;
        let entry_length = hostname_length + 3;
        let extension_length = entry_length + 2;
        append_u16_be(out, ExtensionType::ServerName.into());
        append_u16_be(out, extension_length);
        append_u16_be(out, entry_length);
        out.push(0x00); // entry type: DNS hostname
        append_u16_be(out, hostname_length);
        out.extend_from_slice(name.as_bytes());
    }

    append_u16_be(out, ExtensionType::EcPointFormats.into());
    append_u16_be(out, (EC_POINT_FORMATS.len() + 1) as u16);
    out.push(EC_POINT_FORMATS.len() as u8);
    out.extend_from_slice(&EC_POINT_FORMATS);

    append_u16_be(out, ExtensionType::SupportedGroups.into());
    append_u16_be(out, (SUPPORTED_GROUPS.len() * 2 + 2) as u16);
    append_u16_be(out, (SUPPORTED_GROUPS.len() * 2) as u16);
    for group in SUPPORTED_GROUPS {
        append_u16_be(out, group.into());
    }

    append_u16_be(out, ExtensionType::SessionTicket.into());
    append_u16_be(out, 0);

    append_u16_be(out, ExtensionType::EncryptThenMac.into());
    append_u16_be(out, 0);

    append_u16_be(out, ExtensionType::ExtendedMasterSecret.into());
    append_u16_be(out, 0);

    append_u16_be(out, ExtensionType::SignatureAlgorithms.into());
    append_u16_be(out, (SIGNATURE_ALGORITHMS.len() * 2 + 2) as u16);
    append_u16_be(out, (SIGNATURE_ALGORITHMS.len() * 2) as u16);
    for scheme in SIGNATURE_ALGORITHMS {
        append_u16_be(out, scheme);
    }

    // supported versions: TLS 1.3 only
    append_u16_be(out, ExtensionType::SupportedVersions.into());
    append_u16_be(out, 3);
    out.push(0x02);
    out.extend_from_slice(&[0x03, 0x04]);

    // PSK key exchange modes: PSK with (EC)DHE
    append_u16_be(out, ExtensionType::PskKeyExchangeModes.into());
    append_u16_be(out, 2);
    out.push(0x01);
    out.push(0x01);

    // key share: a single x25519 entry
    append_u16_be(out, ExtensionType::KeyShare.into());
    append_u16_be(out, 38);
    append_u16_be(out, 36);
    append_u16_be(out, NamedGroup::x25519.into());
    append_u16_be(out, 32);
    out.extend_from_slice(client_public.as_bytes());

    let extensions_length = (out.len() - extensions_begin) as u16;
    put_u16_be(out, extensions_length_offset, extensions_length);
    let handshake_length = (out.len() - handshake_begin) as u32;
    put_u24_be(out, handshake_length_offset, handshake_length);
    let record_length = (out.len() - record_begin) as u16;
    put_u16_be(out, record_length_offset, record_length);

    transcript.update(&out[record_begin..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::View;
    use sha2::{Digest, Sha256};
    use x25519_dalek::{PublicKey, StaticSecret};

    fn example_hello(server_name: Option<&str>) -> (Vec<u8>, Sha256) {
        let mut out: Vec<u8> = Vec::new();
        let mut transcript = Sha256::new();
        let public = PublicKey::from(&StaticSecret::from([0x42; 32]));
        ser(
            &mut out,
            &mut transcript,
            &[0x11; 32],
            &[0x22; 32],
            server_name,
            &public,
        );
        (out, transcript)
    }

    #[test]
    fn record_framing() {
        let (hello, _) = example_hello(Some("example.com"));

        // handshake record, protocol version TLS 1.0
        assert_eq!(&hello[..3], &[0x16, 0x03, 0x01]);
        let record_len = u16::from_be_bytes([hello[3], hello[4]]) as usize;
        assert_eq!(hello.len(), 5 + record_len);

        // exactly one ClientHello message filling the record
        assert_eq!(hello[5], 0x01);
        let handshake_len =
            u32::from_be_bytes([0, hello[6], hello[7], hello[8]]) as usize;
        assert_eq!(record_len, handshake_len + 4);
    }

    #[test]
    fn body_layout() {
        let (hello, _) = example_hello(Some("example.com"));
        let mut view = View::new(&hello[9..]);

        assert_eq!(view.u16(), 0x0303); // legacy client version
        assert_eq!(view.take(32), &[0x11; 32]); // client random
        assert_eq!(view.u8(), 0x20); // session id length
        assert_eq!(view.take(32), &[0x22; 32]); // session id

        // cipher suites: length 8, ChaCha20 first, SCSV last
        assert_eq!(view.u16(), 0x0008);
        assert_eq!(view.u16(), 0x1303);
        assert_eq!(view.u16(), 0x1301);
        assert_eq!(view.u16(), 0x1302);
        assert_eq!(view.u16(), 0x00FF);

        // compression: null only
        assert_eq!(view.u8(), 0x01);
        assert_eq!(view.u8(), 0x00);

        let extensions_length = view.u16() as usize;
        assert_eq!(extensions_length, view.len());
    }

    #[test]
    fn extension_order_and_key_share() {
        let (hello, _) = example_hello(Some("example.com"));
        let secret = StaticSecret::from([0x42; 32]);
        let expected_public = PublicKey::from(&secret);

        // seek to the extension block
        let mut view = View::new(&hello[9..]);
        view.skip(2 + 32 + 1 + 32 + 2 + 8 + 2);
        let extensions_length = view.u16() as usize;
        assert_eq!(extensions_length, view.len());

        let mut types: Vec<u16> = Vec::new();
        let mut key_share: Vec<u8> = Vec::new();
        while !view.is_empty() {
            let extension_type = view.u16();
            let extension_length = view.u16() as usize;
            assert!(extension_length <= view.len());
            let data = view.take(extension_length);
            if extension_type == 0x0033 {
                key_share = data.to_vec();
            }
            types.push(extension_type);
        }

        assert_eq!(
            types,
            [0x0000, 0x000B, 0x000A, 0x0023, 0x0016, 0x0017, 0x000D, 0x002B, 0x002D, 0x0033]
        );

        // key share: one x25519 entry carrying the raw public point
        let mut share = View::new(&key_share);
        assert_eq!(share.u16(), 36);
        assert_eq!(share.u16(), 0x001D);
        assert_eq!(share.u16(), 32);
        assert_eq!(share.take(32), expected_public.as_bytes());
    }

    #[test]
    fn server_name_is_optional() {
        let (with_name, _) = example_hello(Some("example.com"));
        let (without, _) = example_hello(None);
        assert_eq!(with_name.len(), without.len() + 4 + 5 + "example.com".len());

        // no server_name extension type in the nameless hello
        let mut view = View::new(&without[9..]);
        view.skip(2 + 32 + 1 + 32 + 2 + 8 + 2 + 2);
        assert_eq!(view.u16(), 0x000B);
    }

    #[test]
    fn transcript_covers_handshake_body_only() {
        let (hello, transcript) = example_hello(Some("example.com"));
        assert_eq!(
            transcript.finalize(),
            Sha256::digest(&hello[5..]),
        );
    }
}
