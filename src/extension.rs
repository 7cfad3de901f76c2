//! Extension type codes.
//!
//! # References
//!
//! * [RFC 8446 Section 4.2](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2)
//! * [RFC 6066](https://datatracker.ietf.org/doc/html/rfc6066)

/// Extension types emitted in the ClientHello or met while parsing.
#[repr(u16)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExtensionType {
    ServerName = 0,            // RFC 6066
    SupportedGroups = 10,      // RFC 8422, 7919
    EcPointFormats = 11,       // RFC 8422
    SignatureAlgorithms = 13,  // RFC 8446
    EncryptThenMac = 22,       // RFC 7366
    ExtendedMasterSecret = 23, // RFC 7627
    SessionTicket = 35,        // RFC 5077
    PreSharedKey = 41,         // RFC 8446
    SupportedVersions = 43,    // RFC 8446
    PskKeyExchangeModes = 45,  // RFC 8446
    KeyShare = 51,             // RFC 8446
}

impl From<ExtensionType> for u16 {
    #[inline]
    fn from(extension_type: ExtensionType) -> Self {
        extension_type as u16
    }
}

impl TryFrom<u16> for ExtensionType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            x if x == (Self::ServerName as u16) => Ok(Self::ServerName),
            x if x == (Self::SupportedGroups as u16) => Ok(Self::SupportedGroups),
            x if x == (Self::EcPointFormats as u16) => Ok(Self::EcPointFormats),
            x if x == (Self::SignatureAlgorithms as u16) => Ok(Self::SignatureAlgorithms),
            x if x == (Self::EncryptThenMac as u16) => Ok(Self::EncryptThenMac),
            x if x == (Self::ExtendedMasterSecret as u16) => Ok(Self::ExtendedMasterSecret),
            x if x == (Self::SessionTicket as u16) => Ok(Self::SessionTicket),
            x if x == (Self::PreSharedKey as u16) => Ok(Self::PreSharedKey),
            x if x == (Self::SupportedVersions as u16) => Ok(Self::SupportedVersions),
            x if x == (Self::PskKeyExchangeModes as u16) => Ok(Self::PskKeyExchangeModes),
            x if x == (Self::KeyShare as u16) => Ok(Self::KeyShare),
            _ => Err(value),
        }
    }
}

/// Named groups for key exchange.
///
/// # References
///
/// * [RFC 8446 Section 4.2.7](https://datatracker.ietf.org/doc/html/rfc8446#section-4.2.7)
#[repr(u16)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types, dead_code)]
pub(crate) enum NamedGroup {
    secp256r1 = 0x0017,
    secp384r1 = 0x0018,
    secp521r1 = 0x0019,
    x25519 = 0x001D,
    x448 = 0x001E,
    ffdhe2048 = 0x0100,
    ffdhe3072 = 0x0101,
    ffdhe4096 = 0x0102,
    ffdhe6144 = 0x0103,
    ffdhe8192 = 0x0104,
}

impl From<NamedGroup> for u16 {
    #[inline]
    fn from(group: NamedGroup) -> Self {
        group as u16
    }
}
