//! ServerHello parsing.
//!
//! # References
//!
//! * [RFC 8446 Appendix B.3.1](https://datatracker.ietf.org/doc/html/rfc8446#appendix-B.3.1)
//!
//! ```text
//! struct {
//!     ProtocolVersion legacy_version = 0x0303;    /* TLS v1.2 */
//!     Random random;
//!     opaque legacy_session_id_echo<0..32>;
//!     CipherSuite cipher_suite;
//!     uint8 legacy_compression_method = 0;
//!     Extension extensions<6..2^16-1>;
//! } ServerHello;
//! ```

use crate::cipher_suites::CipherSuite;
use crate::codec::View;
use crate::crypto::x25519;
use crate::extension::{ExtensionType, NamedGroup};
use crate::handshake::{HandshakeType, MESSAGE_HEADER_LEN};
use crate::status::Error;
use log::{debug, trace};
use x25519_dalek::PublicKey;

/// The parts of a ServerHello this client acts on.
#[derive(Debug)]
pub(crate) struct ServerHello {
    /// The server's x25519 key share.
    pub server_public: PublicKey,
}

/// Parse a plaintext handshake record expected to hold one ServerHello.
pub(crate) fn parse(contents: &[u8]) -> Result<ServerHello, Error> {
    let mut view = View::new(contents);
    if view.len() < MESSAGE_HEADER_LEN {
        return Err(Error::decode(format!(
            "handshake record of {} bytes is shorter than a handshake header",
            view.len()
        )));
    }

    let handshake_type = view.u8();
    let handshake_length = view.u24() as usize;
    if handshake_length > view.len() {
        return Err(Error::decode(format!(
            "handshake header claims {handshake_length} bytes but only {} remain in the record",
            view.len()
        )));
    }
    if handshake_type != u8::from(HandshakeType::ServerHello) {
        return Err(Error::decode(format!(
            "received handshake type {handshake_type}, expected 2 (ServerHello)"
        )));
    }

    // 2 version + 32 random + session id length byte
    if view.len() < 35 {
        return Err(Error::decode("truncated ServerHello".to_string()));
    }
    let _legacy_version = view.u16();
    view.skip(32); // server random
    let session_id_length = view.u8() as usize;
    if view.len() < session_id_length {
        return Err(Error::decode("ServerHello session id overruns".to_string()));
    }
    view.skip(session_id_length);

    if view.len() < 5 {
        return Err(Error::decode("truncated ServerHello".to_string()));
    }
    let cipher_suite = view.u16().to_be_bytes();
    match CipherSuite::try_from(cipher_suite) {
        Ok(CipherSuite::TLS_CHACHA20_POLY1305_SHA256) => {}
        Ok(other) => {
            return Err(Error::unsupported(format!(
                "server selected {other:?}, only TLS_CHACHA20_POLY1305_SHA256 is implemented"
            )));
        }
        Err(raw) => {
            return Err(Error::unsupported(format!(
                "server selected unknown cipher suite {raw:02x?}"
            )));
        }
    }

    let compression_method = view.u8();
    if compression_method != 0 {
        return Err(Error::decode(format!(
            "compression method is {compression_method}, expected 0"
        )));
    }

    let extensions_length = view.u16() as usize;
    if extensions_length != view.len() {
        return Err(Error::decode(format!(
            "ServerHello extensions length is {extensions_length} but {} bytes remain",
            view.len()
        )));
    }

    // If supported_versions is missing the server is assumed to have picked
    // TLS 1.3, since that is the only version the hello offered.
    let mut selected_version: (u8, u8) = (3, 4);
    let mut server_public: Option<PublicKey> = None;

    while !view.is_empty() {
        if view.len() < 4 {
            return Err(Error::decode(
                "trailing garbage in ServerHello extensions".to_string(),
            ));
        }
        let extension_type = view.u16();
        let extension_length = view.u16() as usize;
        if extension_length > view.len() {
            return Err(Error::decode(format!(
                "extension length {extension_length} overruns the remaining {} bytes",
                view.len()
            )));
        }
        let mut extension = View::new(view.take(extension_length));

        match ExtensionType::try_from(extension_type) {
            Ok(ExtensionType::SupportedVersions) => {
                selected_version = (extension.u8(), extension.u8());
                if selected_version != (3, 4) {
                    return Err(Error::unsupported(format!(
                        "server selected protocol version {}.{}, expected TLS 1.3",
                        selected_version.0, selected_version.1
                    )));
                }
            }
            Ok(ExtensionType::KeyShare) => {
                let group = extension.u16();
                let length = extension.u16() as usize;
                if group != u16::from(NamedGroup::x25519) {
                    return Err(Error::unsupported(format!(
                        "server key share group is 0x{group:04x}, only x25519 is implemented"
                    )));
                }
                if length != 32 || extension.len() != 32 {
                    return Err(Error::decode(format!(
                        "x25519 key share length is {length} with {} bytes present, expected 32",
                        extension.len()
                    )));
                }
                let point: [u8; 32] = extension.take(32).try_into().unwrap();
                server_public = Some(x25519::PublicKey::from(point));
            }
            other => {
                // Everything else carries nothing this client acts on.
                trace!("ignoring ServerHello extension {other:?}");
            }
        }
    }

    debug!(
        "ServerHello: version {}.{}, x25519 key share {}",
        selected_version.0,
        selected_version.1,
        if server_public.is_some() { "present" } else { "missing" },
    );

    let server_public = server_public.ok_or_else(|| {
        Error::decode("ServerHello is missing the key_share extension".to_string())
    })?;

    Ok(ServerHello { server_public })
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::status::ErrorKind;
    use hex_literal::hex;

    /// RFC 8448 Section 3 ServerHello, with the cipher suite swapped from
    /// TLS_AES_128_GCM_SHA256 to TLS_CHACHA20_POLY1305_SHA256 (the transcript
    /// tests use the unmodified bytes).
    fn rfc8448_server_hello(cipher_suite: [u8; 2]) -> Vec<u8> {
        let mut bytes = hex!(
            "020000560303a6af06a4121860dc5e6e60249cd34c95930c8ac5cb1434dac155772ed3e26928"
            "00130100002e00330024001d0020c9828876112095fe66762bdbf7c672e156d6cc253b833df1dd69"
            "b1b04e751f0f002b00020304"
        )
        .to_vec();
        bytes[39..41].copy_from_slice(&cipher_suite);
        bytes
    }

    #[test]
    fn parses_key_share() {
        let hello = parse(&rfc8448_server_hello([0x13, 0x03])).unwrap();
        assert_eq!(
            hello.server_public.as_bytes(),
            &hex!("c9828876112095fe66762bdbf7c672e156d6cc253b833df1dd69b1b04e751f0f")
        );
    }

    #[test]
    fn rejects_aes_suite() {
        let err = parse(&rfc8448_server_hello([0x13, 0x01])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedParameter);
    }

    #[test]
    fn rejects_unknown_suite() {
        let err = parse(&rfc8448_server_hello([0xC0, 0x2F])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedParameter);
    }

    #[test]
    fn rejects_wrong_handshake_type() {
        let mut bytes = rfc8448_server_hello([0x13, 0x03]);
        bytes[0] = 0x01;
        let err = parse(&bytes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolDecode);
    }

    #[test]
    fn rejects_overlong_handshake_length() {
        let mut bytes = rfc8448_server_hello([0x13, 0x03]);
        bytes[3] = 0xFF;
        let err = parse(&bytes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolDecode);
    }

    #[test]
    fn rejects_non_x25519_key_share() {
        let mut bytes = rfc8448_server_hello([0x13, 0x03]);
        // key share group is at offset 48..50 (00 1d)
        bytes[48..50].copy_from_slice(&[0x00, 0x17]);
        let err = parse(&bytes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedParameter);
    }

    #[test]
    fn rejects_non_tls13_selection() {
        let mut bytes = rfc8448_server_hello([0x13, 0x03]);
        let len = bytes.len();
        bytes[len - 2..].copy_from_slice(&[0x03, 0x03]);
        let err = parse(&bytes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedParameter);
    }

    #[test]
    fn missing_supported_versions_is_tolerated() {
        // truncate the supported_versions extension and fix up the lengths
        let mut bytes = rfc8448_server_hello([0x13, 0x03]);
        bytes.truncate(bytes.len() - 6);
        // handshake length (u24 at offset 1..4) and extensions length
        bytes[3] -= 6;
        bytes[43] -= 6;
        let hello = parse(&bytes).unwrap();
        assert_eq!(
            hello.server_public.as_bytes(),
            &hex!("c9828876112095fe66762bdbf7c672e156d6cc253b833df1dd69b1b04e751f0f")
        );
    }

    #[test]
    fn missing_key_share_is_rejected() {
        // strip everything after the extensions length and keep only
        // supported_versions
        let mut bytes = rfc8448_server_hello([0x13, 0x03]).to_vec();
        bytes.drain(44..44 + 40); // the 40-byte key_share extension
        bytes[3] -= 40;
        bytes[43] -= 40;
        let err = parse(&bytes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolDecode);
    }
}
