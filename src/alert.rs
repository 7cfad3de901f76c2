//! TLS alert protocol.
//!
//! # References
//!
//! * [RFC 8446 Section 6](https://datatracker.ietf.org/doc/html/rfc8446#section-6)

use crate::codec::View;
use crate::status::Error;

/// Alert level.
///
/// ```text
/// enum { warning(1), fatal(2), (255) } AlertLevel;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AlertLevel {
    /// Warning.
    Warning = 1,
    /// Fatal. Also assumed for unknown level values.
    Fatal = 2,
}

impl From<AlertLevel> for u8 {
    #[inline]
    fn from(alert_level: AlertLevel) -> Self {
        alert_level as u8
    }
}

impl TryFrom<u8> for AlertLevel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == (Self::Warning as u8) => Ok(Self::Warning),
            x if x == (Self::Fatal as u8) => Ok(Self::Fatal),
            _ => Err(value),
        }
    }
}

/// Alert description.
///
/// In TLS 1.3 the description, not the level, decides severity; everything
/// except `close_notify` and `user_canceled` is fatal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AlertDescription {
    /// Orderly end of the connection.
    CloseNotify = 0,
    /// A message arrived that the peer's state machine cannot accept.
    UnexpectedMessage = 10,
    /// Record deprotection failed.
    BadRecordMac = 20,
    /// Record longer than the protocol permits.
    RecordOverflow = 22,
    /// No acceptable set of security parameters.
    HandshakeFailure = 40,
    /// A certificate was corrupt or its signatures did not verify.
    BadCertificate = 42,
    /// A certificate was of an unsupported type.
    UnsupportedCertificate = 43,
    /// A certificate was revoked by its signer.
    CertificateRevoked = 44,
    /// A certificate has expired.
    CertificateExpired = 45,
    /// Unspecified certificate problem.
    CertificateUnknown = 46,
    /// A handshake field was syntactically valid but wrong.
    IllegalParameter = 47,
    /// No trust anchor matched the certificate chain.
    UnknownCa = 48,
    /// The peer declined to proceed after access control.
    AccessDenied = 49,
    /// A message could not be decoded.
    DecodeError = 50,
    /// A handshake cryptographic check (signature, Finished, binder) failed.
    DecryptError = 51,
    /// The negotiated protocol version is recognized but unsupported.
    ProtocolVersion = 70,
    /// The server requires stronger parameters than the client offered.
    InsufficientSecurity = 71,
    /// Internal failure unrelated to the protocol.
    InternalError = 80,
    /// Invalid connection retry attempt.
    InappropriateFallback = 86,
    /// The sender cancelled the handshake for a non-protocol reason.
    UserCanceled = 90,
    /// A mandatory extension was missing.
    MissingExtension = 109,
    /// A prohibited extension was present.
    UnsupportedExtension = 110,
    /// No server exists with the name the client asked for.
    UnrecognizedName = 112,
    /// Invalid OCSP response.
    BadCertificateStatusResponse = 113,
    /// No acceptable PSK identity was offered.
    UnknownPskIdentity = 115,
    /// A client certificate was required but not supplied.
    CertificateRequired = 116,
    /// ALPN found no protocol in common.
    NoApplicationProtocol = 120,
}

impl From<AlertDescription> for u8 {
    #[inline]
    fn from(alert_description: AlertDescription) -> Self {
        alert_description as u8
    }
}

impl TryFrom<u8> for AlertDescription {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == (Self::CloseNotify as u8) => Ok(Self::CloseNotify),
            x if x == (Self::UnexpectedMessage as u8) => Ok(Self::UnexpectedMessage),
            x if x == (Self::BadRecordMac as u8) => Ok(Self::BadRecordMac),
            x if x == (Self::RecordOverflow as u8) => Ok(Self::RecordOverflow),
            x if x == (Self::HandshakeFailure as u8) => Ok(Self::HandshakeFailure),
            x if x == (Self::BadCertificate as u8) => Ok(Self::BadCertificate),
            x if x == (Self::UnsupportedCertificate as u8) => Ok(Self::UnsupportedCertificate),
            x if x == (Self::CertificateRevoked as u8) => Ok(Self::CertificateRevoked),
            x if x == (Self::CertificateExpired as u8) => Ok(Self::CertificateExpired),
            x if x == (Self::CertificateUnknown as u8) => Ok(Self::CertificateUnknown),
            x if x == (Self::IllegalParameter as u8) => Ok(Self::IllegalParameter),
            x if x == (Self::UnknownCa as u8) => Ok(Self::UnknownCa),
            x if x == (Self::AccessDenied as u8) => Ok(Self::AccessDenied),
            x if x == (Self::DecodeError as u8) => Ok(Self::DecodeError),
            x if x == (Self::DecryptError as u8) => Ok(Self::DecryptError),
            x if x == (Self::ProtocolVersion as u8) => Ok(Self::ProtocolVersion),
            x if x == (Self::InsufficientSecurity as u8) => Ok(Self::InsufficientSecurity),
            x if x == (Self::InternalError as u8) => Ok(Self::InternalError),
            x if x == (Self::InappropriateFallback as u8) => Ok(Self::InappropriateFallback),
            x if x == (Self::UserCanceled as u8) => Ok(Self::UserCanceled),
            x if x == (Self::MissingExtension as u8) => Ok(Self::MissingExtension),
            x if x == (Self::UnsupportedExtension as u8) => Ok(Self::UnsupportedExtension),
            x if x == (Self::UnrecognizedName as u8) => Ok(Self::UnrecognizedName),
            x if x == (Self::BadCertificateStatusResponse as u8) => {
                Ok(Self::BadCertificateStatusResponse)
            }
            x if x == (Self::UnknownPskIdentity as u8) => Ok(Self::UnknownPskIdentity),
            x if x == (Self::CertificateRequired as u8) => Ok(Self::CertificateRequired),
            x if x == (Self::NoApplicationProtocol as u8) => Ok(Self::NoApplicationProtocol),
            _ => Err(value),
        }
    }
}

/// A decoded alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    /// Alert level.
    pub level: AlertLevel,
    /// Alert description.
    pub description: AlertDescription,
}

impl Alert {
    /// `close_notify` sent when the client closes the stream.
    pub(crate) const CLOSE_NOTIFY: Alert = Alert {
        level: AlertLevel::Warning,
        description: AlertDescription::CloseNotify,
    };

    /// `true` for everything except an orderly close.
    pub fn is_fatal(&self) -> bool {
        self.description != AlertDescription::CloseNotify
    }

    pub(crate) fn as_bytes(&self) -> [u8; 2] {
        [self.level.into(), self.description.into()]
    }

    /// Decode a 2-byte alert body.
    pub(crate) fn deser(body: &[u8]) -> Result<Self, Error> {
        if body.len() != 2 {
            return Err(Error::decode(format!(
                "alert body is {} bytes, expected 2",
                body.len()
            )));
        }
        let mut view = View::new(body);
        // Unknown levels are treated as fatal rather than rejected; the
        // description byte decides severity in TLS 1.3 anyway.
        let level = AlertLevel::try_from(view.u8()).unwrap_or(AlertLevel::Fatal);
        let description = AlertDescription::try_from(view.u8())
            .map_err(|x| Error::decode(format!("unknown alert description {x}")))?;
        Ok(Alert { level, description })
    }
}
