//! Handshake messages and the phase state machine.
//!
//! The handshake progresses through three states with disjoint cryptographic
//! state. Each is a variant of [`Phase`] owning exactly what that stretch of
//! the protocol needs; a transition replaces the variant, dropping (and
//! zeroizing) the previous phase's secrets.

pub(crate) mod client_hello;
mod encrypted;
mod established;
mod hello;
mod server_hello;

pub(crate) use encrypted::EncryptedHandshake;
pub(crate) use established::Established;
pub(crate) use hello::HelloExchange;

use crate::record::RecordHeader;
use crate::status::Error;

/// Handshake message type.
///
/// ```text
/// enum {
///     client_hello(1),
///     server_hello(2),
///     new_session_ticket(4),
///     end_of_early_data(5),
///     encrypted_extensions(8),
///     certificate(11),
///     certificate_request(13),
///     certificate_verify(15),
///     finished(20),
///     key_update(24),
///     message_hash(254),
///     (255)
/// } HandshakeType;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub(crate) enum HandshakeType {
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    EncryptedExtensions = 8,
    Certificate = 11,
    CertificateVerify = 15,
    Finished = 20,
}

impl From<HandshakeType> for u8 {
    #[inline]
    fn from(handshake_type: HandshakeType) -> Self {
        handshake_type as u8
    }
}

impl TryFrom<u8> for HandshakeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == (Self::ClientHello as u8) => Ok(Self::ClientHello),
            x if x == (Self::ServerHello as u8) => Ok(Self::ServerHello),
            x if x == (Self::NewSessionTicket as u8) => Ok(Self::NewSessionTicket),
            x if x == (Self::EncryptedExtensions as u8) => Ok(Self::EncryptedExtensions),
            x if x == (Self::Certificate as u8) => Ok(Self::Certificate),
            x if x == (Self::CertificateVerify as u8) => Ok(Self::CertificateVerify),
            x if x == (Self::Finished as u8) => Ok(Self::Finished),
            _ => Err(value),
        }
    }
}

/// Handshake message header length: type byte plus big-endian u24 length.
pub(crate) const MESSAGE_HEADER_LEN: usize = 4;

/// Buffers the phases write into while processing a record.
///
/// The phase borrows these for the duration of one call; it never stores the
/// connection.
pub(crate) struct Io<'a> {
    /// Raw bytes queued for the network.
    pub tcp_outbox: &'a mut Vec<u8>,
    /// Decrypted application data for the user.
    pub inbox: &'a mut Vec<u8>,
    /// Plaintext queued by the user, wrapped once keys exist.
    pub outbox: &'a mut Vec<u8>,
}

/// Connection phase. Owns the cryptographic state of the current handshake
/// stretch.
pub(crate) enum Phase {
    /// Sent ClientHello, waiting for the plaintext ServerHello.
    WaitServerHello(HelloExchange),
    /// Handshake keys established, waiting for ServerFinished.
    WaitFinished(EncryptedHandshake),
    /// Application traffic keys in use.
    Connected(Established),
    /// Closed cleanly or torn down after an error.
    Closed,
}

impl Phase {
    /// Dispatch one complete record to the current phase.
    ///
    /// Consumes the phase and returns its successor; on error the caller
    /// drops everything and closes.
    pub fn process_record(
        self,
        header: &RecordHeader,
        contents: &mut [u8],
        io: &mut Io<'_>,
    ) -> Result<Phase, Error> {
        match self {
            Phase::WaitServerHello(hello) => hello.process_record(header, contents),
            Phase::WaitFinished(handshake) => handshake.process_record(header, contents, io),
            Phase::Connected(established) => established.process_record(header, contents, io),
            Phase::Closed => Err(Error::state(
                "record received on a closed connection".to_string(),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::WaitServerHello(_) => "WaitServerHello",
            Phase::WaitFinished(_) => "WaitFinished",
            Phase::Connected(_) => "Connected",
            Phase::Closed => "Closed",
        }
    }

    /// Remember that the user wants `send()` as soon as keys exist.
    pub fn request_send(&mut self) {
        match self {
            Phase::WaitServerHello(hello) => hello.send_requested = true,
            Phase::WaitFinished(handshake) => handshake.send_requested = true,
            Phase::Connected(_) | Phase::Closed => {}
        }
    }
}

/// Serialize a Finished message (handshake header plus 32-byte MAC).
pub(crate) fn finished_message(verify_data: &[u8; 32]) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::with_capacity(MESSAGE_HEADER_LEN + verify_data.len());
    buf.push(HandshakeType::Finished.into());
    crate::codec::append_u24_be(&mut buf, verify_data.len() as u32);
    buf.extend_from_slice(verify_data);
    buf
}
