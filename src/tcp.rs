//! Non-blocking TCP transport.
//!
//! The connection owns raw byte buffers; readiness notification is the
//! host's job. When the event loop reports the socket readable it calls
//! [`TcpConn::on_readable`], when writable [`TcpConn::on_writable`], and the
//! TLS layer above decides what the bytes mean.

use crate::status::Error;
use log::{debug, trace};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream};

/// TCP endpoint configuration.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Remote address.
    pub remote_ip: IpAddr,
    /// Remote port.
    pub remote_port: u16,
    /// Optional local address to bind before connecting.
    pub local_ip: Option<IpAddr>,
    /// Optional local port to bind before connecting.
    pub local_port: Option<u16>,
}

impl TcpConfig {
    /// Configuration with an unbound local endpoint.
    pub fn new(remote_ip: IpAddr, remote_port: u16) -> Self {
        Self {
            remote_ip,
            remote_port,
            local_ip: None,
            local_port: None,
        }
    }
}

/// A TCP connection with owned read/write buffers.
pub(crate) struct TcpConn {
    stream: Option<TcpStream>,
    /// Raw bytes received from the peer, not yet consumed by the record
    /// parser.
    pub inbox: Vec<u8>,
    /// Raw bytes queued for the peer. Drained across writable events.
    pub outbox: Vec<u8>,
    /// When set, a FIN is sent once the outbox has flushed.
    pub closing: bool,
    /// The peer sent a FIN.
    pub peer_closed: bool,
}

impl TcpConn {
    /// A connection with no socket; records pushed into `inbox` by tests are
    /// still parsed normally.
    pub fn detached() -> Self {
        Self {
            stream: None,
            inbox: Vec::new(),
            outbox: Vec::new(),
            closing: false,
            peer_closed: false,
        }
    }

    /// Open a socket to the configured remote, optionally binding a local
    /// address first, and switch it to non-blocking mode.
    pub fn connect(config: &TcpConfig) -> Result<Self, Error> {
        let remote = SocketAddr::new(config.remote_ip, config.remote_port);
        let domain = match remote {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };

        let map_err = |stage: &'static str| {
            move |e: std::io::Error| Error::transport(format!("{stage} {remote}: {e}"))
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(map_err("socket for"))?;

        if config.local_ip.is_some() || config.local_port.is_some() {
            let unspecified: IpAddr = match remote {
                SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
                SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
            };
            let local = SocketAddr::new(
                config.local_ip.unwrap_or(unspecified),
                config.local_port.unwrap_or(0),
            );
            socket.bind(&local.into()).map_err(map_err("bind"))?;
        }

        socket.connect(&remote.into()).map_err(map_err("connect to"))?;
        socket
            .set_nonblocking(true)
            .map_err(map_err("set_nonblocking on"))?;

        debug!("connected to {remote}");

        Ok(Self {
            stream: Some(TcpStream::from(socket)),
            inbox: Vec::new(),
            outbox: Vec::new(),
            closing: false,
            peer_closed: false,
        })
    }

    /// Read everything currently available into the inbox.
    ///
    /// Returns the number of new bytes. Sets [`TcpConn::peer_closed`] on EOF.
    pub fn on_readable(&mut self) -> Result<usize, Error> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };

        let mut total: usize = 0;
        let mut chunk: [u8; 4096] = [0; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    debug!("peer closed the connection");
                    self.peer_closed = true;
                    break;
                }
                Ok(n) => {
                    self.inbox.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::transport(format!("read: {e}"))),
            }
        }
        trace!("received {total} bytes, {} buffered", self.inbox.len());
        Ok(total)
    }

    /// Flush as much of the outbox as the socket accepts.
    ///
    /// Large payloads drain across multiple writable events; call this again
    /// when the host reports the socket writable.
    pub fn on_writable(&mut self) -> Result<(), Error> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        let mut written: usize = 0;
        while written < self.outbox.len() {
            match stream.write(&self.outbox[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.outbox.drain(..written);
                    return Err(Error::transport(format!("write: {e}")));
                }
            }
        }
        self.outbox.drain(..written);
        trace!("sent {written} bytes, {} still queued", self.outbox.len());

        if self.closing && self.outbox.is_empty() {
            if let Some(stream) = self.stream.as_ref() {
                stream.shutdown(Shutdown::Write).ok();
            }
        }
        Ok(())
    }

    /// Queue-flush entry point; alias of [`TcpConn::on_writable`] so call
    /// sites read like the intent.
    pub fn send(&mut self) -> Result<(), Error> {
        self.on_writable()
    }

    /// Drop the socket. Unsent bytes in the outbox are discarded.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.shutdown(Shutdown::Both).ok();
        }
        self.outbox.clear();
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
