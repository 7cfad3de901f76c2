//! Bare-minimum TLS 1.3 client over non-blocking TCP.
//!
//! Implements just enough of [RFC 8446] to fetch bytes from a modern server:
//! the x25519 key exchange, the `TLS_CHACHA20_POLY1305_SHA256` cipher suite,
//! and nothing else. The record layer and its primitives (ChaCha20, Poly1305,
//! the AEAD composition) are implemented here; hashing and key derivation use
//! `sha2`/`hmac`/`hkdf`.
//!
//! # Warning
//!
//! ⚠️ This client does **not** authenticate the server. ⚠️
//!
//! `Certificate` and `CertificateVerify` are accepted and ignored, so an
//! active attacker can man-in-the-middle any connection. The transcript MAC
//! (ServerFinished) is verified, which only proves the peer derived the same
//! keys. Do not use this where the server's identity matters.
//!
//! # Limitations
//!
//! * Cipher: `TLS_CHACHA20_POLY1305_SHA256`
//! * Key exchange: x25519
//! * No certificate validation (see above)
//! * No session resumption; tickets are advertised then ignored
//! * No post-handshake key update
//! * No client certificates
//!
//! # Driving a connection
//!
//! The client is event-driven and single-threaded: it never blocks and never
//! spawns. The host owns the readiness notification (epoll, kqueue, a polling
//! loop) and calls [`Connection::on_readable`] / [`Connection::on_writable`]
//! when the socket is ready.
//!
//! ```no_run
//! use minitls::{Config, Connection, Event};
//!
//! let mut config = Config::new("142.250.0.103".parse().unwrap(), 443);
//! config.server_name = Some("www.google.com".to_string());
//!
//! let mut conn = Connection::connect(config);
//! conn.outbox.extend_from_slice(b"GET / HTTP/1.1\r\nHost: www.google.com\r\n\r\n");
//! conn.send(); // queued until the handshake completes
//!
//! loop {
//!     conn.on_writable();
//!     match conn.on_readable() {
//!         Event::ApplicationData => break,
//!         Event::Disconnect => break,
//!         _ => std::thread::yield_now(),
//!     }
//! }
//! assert!(conn.ok(), "{:?}", conn.error_message());
//! println!("{}", String::from_utf8_lossy(&conn.inbox));
//! ```
//!
//! [RFC 8446]: https://datatracker.ietf.org/doc/html/rfc8446

#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod alert;
mod cipher_suites;
mod codec;
mod connection;
mod crypto;
mod extension;
mod handshake;
mod key_schedule;
mod record;
mod status;
mod tcp;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use cipher_suites::CipherSuite;
pub use connection::{Config, Connection, Event};
pub use status::{Error, ErrorKind, Status};
pub use tcp::TcpConfig;
