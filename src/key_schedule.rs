//! TLS 1.3 key schedule helpers.
//!
//! The phases orchestrate the schedule; this module owns the HKDF label
//! plumbing and the Finished MAC so every derivation goes through one place.
//!
//! # References
//!
//! * [RFC 5869](https://datatracker.ietf.org/doc/html/rfc5869)
//! * [RFC 8446 Section 7.1](https://datatracker.ietf.org/doc/html/rfc8446#section-7.1)

use core::mem::size_of;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{
    digest::{
        crypto_common::generic_array::{ArrayLength, GenericArray},
        typenum::U32,
        OutputSizeUser,
    },
    Sha256,
};

/// SHA-256 of the empty string, used as the context of `"derived"` secrets.
pub(crate) const EMPTY_HASH: [u8; 32] = [
    0xE3, 0xB0, 0xC4, 0x42, 0x98, 0xFC, 0x1C, 0x14, 0x9A, 0xFB, 0xF4, 0xC8, 0x99, 0x6F, 0xB9, 0x24,
    0x27, 0xAE, 0x41, 0xE4, 0x64, 0x9B, 0x93, 0x4C, 0xA4, 0x95, 0x99, 0x1B, 0x78, 0x52, 0xB8, 0x55,
];

const SHA256_LEN: usize = 256 / 8;
pub(crate) const ZEROS_OF_HASH_LEN: [u8; SHA256_LEN] = [0; SHA256_LEN];

/// Create a TLS `HkdfLabel`.
///
/// Callers pass the label without the `"tls13 "` prefix; it is prepended
/// here.
///
/// ```text
/// struct {
///     uint16 length = Length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255> = Context;
/// } HkdfLabel;
/// ```
const HKDF_LABEL_LEN_MAX: usize = size_of::<u16>() + 255 + 255;
fn hkdf_label(len: u16, label: &[u8], context: &[u8]) -> heapless::Vec<u8, HKDF_LABEL_LEN_MAX> {
    let mut hkdf_label: heapless::Vec<u8, HKDF_LABEL_LEN_MAX> = heapless::Vec::new();
    hkdf_label.extend_from_slice(&len.to_be_bytes()).unwrap();

    const LABEL_PREFIX: &[u8] = b"tls13 ";
    let label_len: u8 = u8::try_from(label.len() + LABEL_PREFIX.len()).unwrap();

    hkdf_label.push(label_len).unwrap();
    hkdf_label.extend_from_slice(LABEL_PREFIX).unwrap();
    hkdf_label.extend_from_slice(label).unwrap();

    let context_len: u8 = u8::try_from(context.len()).unwrap();
    hkdf_label.push(context_len).unwrap();
    hkdf_label.extend_from_slice(context).unwrap();

    hkdf_label
}

/// TLS `HKDF-Expand-Label`.
///
/// ```text
/// HKDF-Expand-Label(Secret, Label, Context, Length) =
///     HKDF-Expand(Secret, HkdfLabel, Length)
/// ```
pub(crate) fn hkdf_expand_label<N: ArrayLength<u8>>(
    secret: &Hkdf<Sha256>,
    label: &[u8],
    context: &[u8],
) -> GenericArray<u8, N> {
    let label: heapless::Vec<u8, HKDF_LABEL_LEN_MAX> = hkdf_label(N::to_u16(), label, context);
    let mut okm: GenericArray<u8, N> = Default::default();
    secret.expand(&label, &mut okm).unwrap();
    okm
}

/// TLS `Derive-Secret` over an already-computed transcript hash.
///
/// ```text
/// Derive-Secret(Secret, Label, Messages) =
///     HKDF-Expand-Label(Secret, Label,
///                       Transcript-Hash(Messages), Hash.length)
/// ```
pub(crate) fn derive_secret(
    secret: &Hkdf<Sha256>,
    label: &[u8],
    context: &[u8],
) -> GenericArray<u8, <Sha256 as OutputSizeUser>::OutputSize> {
    hkdf_expand_label::<<Sha256 as OutputSizeUser>::OutputSize>(secret, label, context)
}

/// An HKDF instance keyed by a raw 32-byte PRK.
pub(crate) fn from_prk(prk: &[u8; 32]) -> Hkdf<Sha256> {
    // infallible: the PRK has exactly hash length
    Hkdf::<Sha256>::from_prk(prk).unwrap()
}

/// `Derive-Secret(Extract(0, 0), "derived", "")`, the salt feeding the
/// handshake-secret extraction. A constant since there is no PSK.
pub(crate) fn early_derived_secret() -> [u8; 32] {
    let (_, early) = Hkdf::<Sha256>::extract(Some(&ZEROS_OF_HASH_LEN), &ZEROS_OF_HASH_LEN);
    derive_secret(&early, b"derived", &EMPTY_HASH).into()
}

/// Finished MAC over a transcript hash.
///
/// ```text
/// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
/// verify_data = HMAC(finished_key, Transcript-Hash(...))
/// ```
pub(crate) fn finished_verify_data(
    traffic_secret: &[u8; 32],
    transcript_hash: &[u8],
) -> GenericArray<u8, U32> {
    let key: GenericArray<u8, U32> =
        hkdf_expand_label(&from_prk(traffic_secret), b"finished", &[]);
    let mut hmac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
    hmac.update(transcript_hash);
    hmac.finalize().into_bytes()
}

/// Constant-time check of a received Finished MAC.
pub(crate) fn verify_finished(
    traffic_secret: &[u8; 32],
    transcript_hash: &[u8],
    candidate: &[u8],
) -> bool {
    let key: GenericArray<u8, U32> =
        hkdf_expand_label(&from_prk(traffic_secret), b"finished", &[]);
    let mut hmac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
    hmac.update(transcript_hash);
    hmac.verify_slice(candidate).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use sha2::digest::typenum::{U12, U16};
    use sha2::Digest;

    #[test]
    fn label_encoding() {
        let label = hkdf_label(12, b"iv", b"ctx");
        assert_eq!(&label[..], b"\x00\x0c\x08tls13 iv\x03ctx");
    }

    /// RFC 5869 Appendix A.1.
    #[test]
    fn hkdf_sha256() {
        let salt = hex!("000102030405060708090a0b0c");
        let ikm = hex!("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
        let info = hex!("f0f1f2f3f4f5f6f7f8f9");

        let (prk, hkdf) = Hkdf::<Sha256>::extract(Some(&salt), &ikm);
        assert_eq!(
            prk[..],
            hex!("077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5")
        );

        let mut okm: [u8; 42] = [0; 42];
        hkdf.expand(&info, &mut okm).unwrap();
        assert_eq!(
            okm,
            hex!(
                "3cb25f25faacd57a90434f64d0362f2a"
                "2d2d0a90cf1a5a4c5db02d56ecc4c5bf"
                "34007208d5b887185865"
            )
        );
    }

    #[test]
    fn empty_hash_constant() {
        assert_eq!(Sha256::digest(b"")[..], EMPTY_HASH);
    }

    /// RFC 8448 Section 3, "Simple 1-RTT Handshake": the full schedule from
    /// the literal ClientHello/ServerHello transcript through the server
    /// traffic key and IV.
    #[test]
    fn rfc8448_key_schedule() {
        const CLIENT_HELLO: [u8; 196] = hex!(
            "010000c00303cb34ecb1e78163ba1c38c6dacb196a6dffa21a8d9912ec18a2ef6283024dece7"
            "000006130113031302010000910000000b0009000006736572766572ff01000100000a00140012001d"
            "0017001800190100010101020103010400230000003300260024001d002099381de560e4bd43d23d8e"
            "435a7dbafeb3c06e51c13cae4d5413691e529aaf2c002b0003020304000d0020001e040305030603"
            "020308040805080604010501060102010402050206020202002d00020101001c00024001"
        );
        const SERVER_HELLO: [u8; 90] = hex!(
            "020000560303a6af06a4121860dc5e6e60249cd34c95930c8ac5cb1434dac155772ed3e26928"
            "00130100002e00330024001d0020c9828876112095fe66762bdbf7c672e156d6cc253b833df1dd69"
            "b1b04e751f0f002b00020304"
        );
        const SHARED_SECRET: [u8; 32] =
            hex!("8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d");

        // early secret: Extract(zero salt, zero IKM)
        let (early_secret, early) =
            Hkdf::<Sha256>::extract(Some(&ZEROS_OF_HASH_LEN), &ZEROS_OF_HASH_LEN);
        assert_eq!(
            early_secret[..],
            hex!("33ad0a1c607ec03b09e6cd9893680ce210adf300aa1f2660e1b22e10f170f92a")
        );

        let derived: [u8; 32] = derive_secret(&early, b"derived", &EMPTY_HASH).into();
        assert_eq!(
            derived,
            hex!("6f2615a108c702c5678f54fc9dbab69716c076189c48250cebeac3576c3611ba")
        );
        assert_eq!(derived, early_derived_secret());

        let (handshake_secret, handshake) =
            Hkdf::<Sha256>::extract(Some(&derived), &SHARED_SECRET);
        assert_eq!(
            handshake_secret[..],
            hex!("1dc826e93606aa6fdc0aadc12f741b01046aa6b99f691ed221a9f0ca043fbeac")
        );

        let mut transcript = Sha256::new();
        transcript.update(CLIENT_HELLO);
        transcript.update(SERVER_HELLO);
        let hello_hash = transcript.finalize();

        let client_hs: [u8; 32] =
            derive_secret(&handshake, b"c hs traffic", &hello_hash).into();
        assert_eq!(
            client_hs,
            hex!("b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21")
        );

        let server_hs: [u8; 32] =
            derive_secret(&handshake, b"s hs traffic", &hello_hash).into();
        assert_eq!(
            server_hs,
            hex!("b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38")
        );

        // RFC 8448 runs TLS_AES_128_GCM_SHA256, so its traffic key is 16
        // bytes; the label plumbing is what is under test here.
        let server_hkdf = from_prk(&server_hs);
        let key: GenericArray<u8, U16> = hkdf_expand_label(&server_hkdf, b"key", &[]);
        assert_eq!(key[..], hex!("3fce516009c21727d0f2e4e86ee403bc"));

        let iv: GenericArray<u8, U12> = hkdf_expand_label(&server_hkdf, b"iv", &[]);
        assert_eq!(iv[..], hex!("5d313eb2671276ee13000b30"));
    }

    /// Incremental hashing with a cloned snapshot matches the one-shot hash.
    #[test]
    fn transcript_snapshots() {
        let mut builder = Sha256::new();
        builder.update(b"client hello");
        let snapshot = builder.clone().finalize();
        assert_eq!(snapshot, Sha256::digest(b"client hello"));

        // finalizing the clone did not disturb the builder
        builder.update(b" and server hello");
        assert_eq!(
            builder.finalize(),
            Sha256::digest(b"client hello and server hello")
        );
    }
}
