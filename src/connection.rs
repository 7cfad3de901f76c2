//! The TLS connection façade.
//!
//! A [`Connection`] glues the TCP transport, the record parser and the phase
//! state machine together. The host event loop feeds it readiness
//! notifications; the user reads and writes the plaintext `inbox`/`outbox`.

use crate::codec::View;
use crate::handshake::{HelloExchange, Io, Phase};
use crate::record::{RecordHeader, HEADER_LEN, MAX_CIPHERTEXT_LEN};
use crate::status::{Error, Status};
use crate::tcp::{TcpConfig, TcpConn};
use log::{debug, warn};
use std::net::IpAddr;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote address.
    pub remote_ip: IpAddr,
    /// Remote port.
    pub remote_port: u16,
    /// Optional local address to bind before connecting.
    pub local_ip: Option<IpAddr>,
    /// Optional local port to bind before connecting.
    pub local_port: Option<u16>,
    /// Hostname for the `server_name` extension; the extension is omitted
    /// when `None`.
    pub server_name: Option<String>,
}

impl Config {
    /// Configuration with an unbound local endpoint and no server name.
    pub fn new(remote_ip: IpAddr, remote_port: u16) -> Self {
        Self {
            remote_ip,
            remote_port,
            local_ip: None,
            local_port: None,
            server_name: None,
        }
    }

    fn tcp(&self) -> TcpConfig {
        TcpConfig {
            remote_ip: self.remote_ip,
            remote_port: self.remote_port,
            local_ip: self.local_ip,
            local_port: self.local_port,
        }
    }
}

/// Notification returned by [`Connection::on_readable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Nothing the user needs to act on.
    None,
    /// New plaintext was appended to [`Connection::inbox`].
    ApplicationData,
    /// The handshake completed; `send()` now flushes immediately.
    HandshakeFinished,
    /// The connection is closed, cleanly or not; check [`Connection::ok`].
    Disconnect,
}

/// A TLS 1.3 client connection.
pub struct Connection {
    pub(crate) tcp: TcpConn,
    /// Plaintext received from the server. Read and drain at will.
    pub inbox: Vec<u8>,
    /// Plaintext to send. Filled by the user, flushed by [`Connection::send`].
    pub outbox: Vec<u8>,
    pub(crate) phase: Phase,
    status: Status,
}

impl Connection {
    /// Open a connection and queue the ClientHello.
    ///
    /// Always returns synchronously; failures are reported through
    /// [`Connection::ok`] and [`Connection::error_message`].
    pub fn connect(config: Config) -> Self {
        let mut conn = Self {
            tcp: TcpConn::detached(),
            inbox: Vec::new(),
            outbox: Vec::new(),
            phase: Phase::Closed,
            status: Status::default(),
        };

        match TcpConn::connect(&config.tcp()) {
            Ok(tcp) => conn.tcp = tcp,
            Err(e) => {
                conn.status.push(e);
                return conn;
            }
        }

        match HelloExchange::start(&mut conn.tcp.outbox, config.server_name.as_deref()) {
            Ok(hello) => conn.phase = Phase::WaitServerHello(hello),
            Err(e) => {
                conn.fail(e);
                return conn;
            }
        }

        if let Err(e) = conn.tcp.send() {
            conn.fail(e);
        }
        conn
    }

    /// `true` while no error has been recorded.
    pub fn ok(&self) -> bool {
        self.status.ok()
    }

    /// All recorded errors joined into one message.
    pub fn error_message(&self) -> Option<String> {
        self.status.error_message()
    }

    /// The accumulated error frames.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// `true` once the handshake has completed and `send()` flushes
    /// immediately.
    pub fn connected(&self) -> bool {
        matches!(self.phase, Phase::Connected(_))
    }

    /// `true` after a clean or failed shutdown.
    pub fn closed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }

    /// Flush [`Connection::outbox`] to the server.
    ///
    /// Before the handshake completes the intent is remembered and the
    /// queued plaintext goes out together with ClientFinished.
    pub fn send(&mut self) {
        match &mut self.phase {
            Phase::Connected(established) => {
                let mut io = Io {
                    tcp_outbox: &mut self.tcp.outbox,
                    inbox: &mut self.inbox,
                    outbox: &mut self.outbox,
                };
                established.send_user_data(&mut io);
                if let Err(e) = self.tcp.send() {
                    self.fail(e);
                }
            }
            Phase::Closed => warn!("send() on a closed connection"),
            phase => {
                debug!("send() before handshake completion; remembering intent");
                phase.request_send();
            }
        }
    }

    /// Close the connection, sending `close_notify` best-effort once
    /// application keys exist.
    pub fn close(&mut self) {
        if let Phase::Connected(established) = &mut self.phase {
            established.send_close_notify(&mut self.tcp.outbox);
            self.tcp.closing = true;
            self.tcp.send().ok();
        }
        debug!("{} -> Closed", self.phase.name());
        self.phase = Phase::Closed;
        self.tcp.close();
    }

    /// Notification that the socket may be readable: pull bytes, parse
    /// records, drive the state machine.
    pub fn on_readable(&mut self) -> Event {
        if self.closed() {
            return Event::Disconnect;
        }

        let was_connected = self.connected();
        let inbox_before = self.inbox.len();

        match self.tcp.on_readable() {
            Ok(_) => {}
            Err(e) => {
                self.fail(e);
                return Event::Disconnect;
            }
        }

        self.consume_records();

        if !self.ok() {
            return Event::Disconnect;
        }

        // EOF handling: before the handshake completes a FIN is a protocol
        // violation, afterwards it is an orderly (if impolite) shutdown.
        if self.tcp.peer_closed && !self.closed() {
            if self.connected() {
                debug!("EOF from peer; closing");
                self.phase = Phase::Closed;
                self.tcp.close();
            } else {
                self.fail(Error::transport(
                    "remote closed the connection during the handshake".to_string(),
                ));
            }
            return Event::Disconnect;
        }

        if self.closed() {
            // a close_notify was processed above
            self.tcp.close();
            return Event::Disconnect;
        }
        if self.inbox.len() > inbox_before {
            return Event::ApplicationData;
        }
        if !was_connected && self.connected() {
            return Event::HandshakeFinished;
        }
        Event::None
    }

    /// Notification that the socket may be writable: continue draining the
    /// raw outbox.
    pub fn on_writable(&mut self) {
        if let Err(e) = self.tcp.on_writable() {
            self.fail(e);
        }
    }

    /// Parse and dispatch as many complete records as the raw inbox holds.
    ///
    /// Consumed bytes are only removed after the phase accepted the record;
    /// on any error the connection closes without further parsing.
    fn consume_records(&mut self) {
        loop {
            if self.tcp.inbox.len() < HEADER_LEN {
                break;
            }

            let header_bytes: [u8; HEADER_LEN] = View::new(&self.tcp.inbox)
                .first(HEADER_LEN)
                .try_into()
                .unwrap();
            let header = match RecordHeader::deser(header_bytes) {
                Ok(header) => header,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            };
            let length = header.length();
            if length > MAX_CIPHERTEXT_LEN {
                self.fail(Error::decode(format!(
                    "record length {length} exceeds the {MAX_CIPHERTEXT_LEN} byte limit"
                )));
                break;
            }
            if self.tcp.inbox.len() < HEADER_LEN + length {
                break; // wait for the rest of the record
            }

            let phase = std::mem::replace(&mut self.phase, Phase::Closed);
            let (inbox, tcp_outbox) = (&mut self.tcp.inbox, &mut self.tcp.outbox);
            let contents = &mut inbox[HEADER_LEN..HEADER_LEN + length];
            let mut io = Io {
                tcp_outbox,
                inbox: &mut self.inbox,
                outbox: &mut self.outbox,
            };

            match phase.process_record(&header, contents, &mut io) {
                Ok(next) => {
                    self.phase = next;
                    self.tcp.inbox.drain(..HEADER_LEN + length);
                }
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }

            if self.closed() {
                break;
            }
        }

        // Anything the phases queued (ClientFinished, piggybacked user data)
        // goes out in one contiguous write.
        if !self.tcp.outbox.is_empty() && self.tcp.is_open() {
            if let Err(e) = self.tcp.send() {
                self.fail(e);
            }
        }
    }

    /// Record a fatal error, tear down TCP and drop all phase state.
    fn fail(&mut self, error: Error) {
        self.status.push(error);
        self.phase = Phase::Closed;
        self.tcp.close();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // dropping the phase zeroizes the wrappers; the socket just closes
        self.tcp.close();
    }
}
