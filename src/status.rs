//! Error frames and the per-connection status list.
//!
//! Every failure in the core is fatal and terminal: a frame is appended to
//! the connection [`Status`], the TCP stream is closed, and the active phase
//! (with its key material) is dropped. No errors cross the API boundary as
//! panics.

use crate::alert::Alert;
use core::fmt;
use core::panic::Location;

/// Failure taxonomy observed through [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// TCP connect/read/write failure, or the remote closed the stream
    /// before the handshake completed.
    Transport,
    /// Malformed wire data: bad record version, length overflow, missing
    /// required extension, unknown handshake type.
    ProtocolDecode,
    /// The server negotiated something this client does not implement
    /// (cipher suite other than `TLS_CHACHA20_POLY1305_SHA256`, key-share
    /// group other than x25519, protocol version other than TLS 1.3).
    UnsupportedParameter,
    /// AEAD tag mismatch, Finished MAC mismatch, or entropy unavailable.
    Crypto,
    /// The server sent a fatal alert.
    RemoteAlert,
    /// A message arrived in a phase that cannot accept it.
    StateViolation,
}

/// A single error with its capture site.
#[derive(Debug, Clone)]
pub struct Error {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Source location that produced the error.
    pub location: &'static Location<'static>,
}

impl Error {
    #[track_caller]
    pub(crate) fn new(kind: ErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn transport(message: String) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    #[track_caller]
    pub(crate) fn decode(message: String) -> Self {
        Self::new(ErrorKind::ProtocolDecode, message)
    }

    #[track_caller]
    pub(crate) fn unsupported(message: String) -> Self {
        Self::new(ErrorKind::UnsupportedParameter, message)
    }

    #[track_caller]
    pub(crate) fn crypto(message: String) -> Self {
        Self::new(ErrorKind::Crypto, message)
    }

    #[track_caller]
    pub(crate) fn state(message: String) -> Self {
        Self::new(ErrorKind::StateViolation, message)
    }

    #[track_caller]
    pub(crate) fn remote_alert(alert: Alert) -> Self {
        Self::new(
            ErrorKind::RemoteAlert,
            format!("server alert: {:?} {:?}", alert.level, alert.description),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} at {}:{}: {}",
            self.kind,
            self.location.file(),
            self.location.line(),
            self.message
        )
    }
}

impl std::error::Error for Error {}

/// Ordered list of error frames accumulated by a connection.
///
/// The first frame is the root cause; later frames add context.
#[derive(Debug, Default)]
pub struct Status {
    frames: Vec<Error>,
}

impl Status {
    /// `true` while no error has been recorded.
    pub fn ok(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn push(&mut self, error: Error) {
        log::error!("{error}");
        self.frames.push(error);
    }

    /// All frames, oldest first.
    pub fn frames(&self) -> &[Error] {
        &self.frames
    }

    /// Kind of the root-cause frame, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.frames.first().map(|frame| frame.kind)
    }

    /// All frames joined into one message, or `None` when [`Status::ok`].
    pub fn error_message(&self) -> Option<String> {
        if self.frames.is_empty() {
            return None;
        }
        Some(
            self.frames
                .iter()
                .map(Error::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_accumulation() {
        let mut status = Status::default();
        assert!(status.ok());
        assert_eq!(status.error_message(), None);

        status.push(Error::decode("bad length".to_string()));
        status.push(Error::transport("closing".to_string()));

        assert!(!status.ok());
        assert_eq!(status.kind(), Some(ErrorKind::ProtocolDecode));
        let message = status.error_message().unwrap();
        assert!(message.contains("bad length"));
        assert!(message.contains("status.rs"));
    }
}
