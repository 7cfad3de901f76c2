//! Transport-contract tests against a loopback TCP peer.
//!
//! These do not require a TLS server; they exercise the plaintext stretch of
//! the protocol and the failure paths the transport can produce.

use minitls::{Config, Connection, ErrorKind, Event};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

fn localhost_config(port: u16) -> Config {
    let mut config = Config::new(Ipv4Addr::LOCALHOST.into(), port);
    config.server_name = Some("localhost".to_string());
    config
}

/// Drive the connection until it disconnects or the timeout hits.
fn drive_to_disconnect(conn: &mut Connection) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        conn.on_writable();
        match conn.on_readable() {
            Event::Disconnect => return,
            _ => {}
        }
        assert!(Instant::now() < deadline, "connection never disconnected");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Read one TLS record from the raw stream.
fn read_record(peer: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header: [u8; 5] = [0; 5];
    peer.read_exact(&mut header).unwrap();
    let length = u16::from_be_bytes([header[3], header[4]]) as usize;
    let mut contents = vec![0; length];
    peer.read_exact(&mut contents).unwrap();
    (header[0], contents)
}

#[test]
fn client_hello_reaches_the_server() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        let (record_type, contents) = read_record(&mut peer);

        // a plaintext handshake record holding one ClientHello
        assert_eq!(record_type, 0x16);
        assert_eq!(contents[0], 0x01);
        let handshake_length =
            u32::from_be_bytes([0, contents[1], contents[2], contents[3]]) as usize;
        assert_eq!(contents.len(), handshake_length + 4);

        // the server name travels in the clear
        assert!(contents
            .windows(b"localhost".len())
            .any(|w| w == b"localhost"));

        // refuse politely
        peer.write_all(&[0x15, 0x03, 0x03, 0x00, 0x02, 0x02, 0x28])
            .unwrap();
    });

    let mut conn = Connection::connect(localhost_config(port));
    assert!(conn.ok(), "{:?}", conn.error_message());
    drive_to_disconnect(&mut conn);
    server.join().unwrap();

    assert_eq!(conn.status().kind(), Some(ErrorKind::RemoteAlert));
    assert!(conn.error_message().unwrap().contains("HandshakeFailure"));
}

#[test]
fn eof_during_handshake_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        let mut buf: [u8; 5] = [0; 5];
        peer.read_exact(&mut buf).unwrap();
        // hang up mid-handshake
    });

    let mut conn = Connection::connect(localhost_config(port));
    drive_to_disconnect(&mut conn);
    server.join().unwrap();

    assert!(!conn.ok());
    assert_eq!(conn.status().kind(), Some(ErrorKind::Transport));
}

#[test]
fn garbage_from_the_server_is_a_decode_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        let mut buf: [u8; 5] = [0; 5];
        peer.read_exact(&mut buf).unwrap();
        peer.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").unwrap();
    });

    let mut conn = Connection::connect(localhost_config(port));
    drive_to_disconnect(&mut conn);
    server.join().unwrap();

    assert!(!conn.ok());
    assert_eq!(conn.status().kind(), Some(ErrorKind::ProtocolDecode));
}
