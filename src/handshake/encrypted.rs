//! Encrypted handshake phase: from the key schedule entry after ServerHello
//! until ClientFinished is on the wire.

use super::{finished_message, Established, HandshakeType, Io, Phase, MESSAGE_HEADER_LEN};
use crate::alert::Alert;
use crate::codec::View;
use crate::key_schedule::{
    derive_secret, early_derived_secret, finished_verify_data, from_prk, verify_finished,
    EMPTY_HASH, ZEROS_OF_HASH_LEN,
};
use crate::record::{ContentType, RecordHeader, RecordWrapper};
use crate::status::Error;
use hkdf::Hkdf;
use log::{debug, trace, warn};
use sha2::{Digest, Sha256};
use x25519_dalek::SharedSecret;
use zeroize::Zeroizing;

/// State between ServerHello and ServerFinished.
pub(crate) struct EncryptedHandshake {
    transcript: Sha256,
    /// Decrypted handshake bytes not yet parsed; messages may span record
    /// boundaries.
    pending: Vec<u8>,
    handshake_secret: Zeroizing<[u8; 32]>,
    client_secret: Zeroizing<[u8; 32]>,
    server_secret: Zeroizing<[u8; 32]>,
    server_wrapper: RecordWrapper,
    client_wrapper: RecordWrapper,
    pub send_requested: bool,
}

impl EncryptedHandshake {
    /// Derive the handshake key schedule.
    ///
    /// ```text
    ///             0
    ///             |
    ///             v
    ///   PSK ->  HKDF-Extract = Early Secret
    ///             |
    ///             v
    ///       Derive-Secret(., "derived", "")
    ///             |
    ///             v
    /// (EC)DHE -> HKDF-Extract = Handshake Secret
    ///             +-> Derive-Secret(., "c hs traffic", ClientHello...ServerHello)
    ///             +-> Derive-Secret(., "s hs traffic", ClientHello...ServerHello)
    /// ```
    pub fn new(transcript: Sha256, shared_secret: &SharedSecret, send_requested: bool) -> Self {
        let derived = early_derived_secret();
        let (handshake_secret, handshake) =
            Hkdf::<Sha256>::extract(Some(&derived), shared_secret.as_bytes());

        let hello_hash = transcript.clone().finalize();
        let client_secret: [u8; 32] =
            derive_secret(&handshake, b"c hs traffic", &hello_hash).into();
        let server_secret: [u8; 32] =
            derive_secret(&handshake, b"s hs traffic", &hello_hash).into();

        Self {
            transcript,
            pending: Vec::new(),
            handshake_secret: Zeroizing::new(handshake_secret.into()),
            client_secret: Zeroizing::new(client_secret),
            server_secret: Zeroizing::new(server_secret),
            server_wrapper: RecordWrapper::from_traffic_secret(&server_secret),
            client_wrapper: RecordWrapper::from_traffic_secret(&client_secret),
            send_requested,
        }
    }

    pub fn process_record(
        mut self,
        header: &RecordHeader,
        contents: &mut [u8],
        io: &mut Io<'_>,
    ) -> Result<Phase, Error> {
        match header.content_type() {
            // Middlebox-compatibility record; dropped without processing.
            ContentType::ChangeCipherSpec => {
                trace!("ignoring ChangeCipherSpec");
                Ok(Phase::WaitFinished(self))
            }
            ContentType::ApplicationData => {
                let (inner_type, length) = self.server_wrapper.unwrap(header, contents)?;
                match ContentType::try_from(inner_type) {
                    Ok(ContentType::Handshake) => {
                        self.pending.extend_from_slice(&contents[..length]);
                        self.drain_messages(io)
                    }
                    Ok(ContentType::Alert) => {
                        Err(Error::remote_alert(Alert::deser(&contents[..length])?))
                    }
                    other => Err(Error::state(format!(
                        "received {other:?} record during the handshake, expected Handshake"
                    ))),
                }
            }
            other => Err(Error::state(format!(
                "received {other:?} record during the encrypted handshake"
            ))),
        }
    }

    /// Parse complete handshake messages out of `pending`.
    ///
    /// Each message is hashed into the transcript only after it is handled,
    /// so the ServerFinished check can use the transcript that precedes it.
    fn drain_messages(mut self, io: &mut Io<'_>) -> Result<Phase, Error> {
        loop {
            if self.pending.len() < MESSAGE_HEADER_LEN {
                return Ok(Phase::WaitFinished(self));
            }
            let mut view = View::new(&self.pending);
            let message_type = view.u8();
            let length = view.u24() as usize;
            if view.len() < length {
                // fragmented across records; wait for more
                trace!(
                    "handshake message 0x{message_type:02x} needs {length} bytes, {} buffered",
                    view.len()
                );
                return Ok(Phase::WaitFinished(self));
            }

            let message_end = MESSAGE_HEADER_LEN + length;
            match HandshakeType::try_from(message_type) {
                Ok(HandshakeType::EncryptedExtensions) => {
                    trace!("ignoring EncryptedExtensions ({length} bytes)");
                }
                // Deliberately unauthenticated: the certificate chain and its
                // transcript signature are accepted without verification.
                Ok(HandshakeType::Certificate) => {
                    warn!("ignoring Certificate ({length} bytes); peer is NOT authenticated");
                }
                Ok(HandshakeType::CertificateVerify) => {
                    trace!("ignoring CertificateVerify ({length} bytes)");
                }
                Ok(HandshakeType::Finished) => {
                    return self.finish(message_end, io);
                }
                other => {
                    return Err(Error::decode(format!(
                        "unexpected handshake message {other:?} before ServerFinished"
                    )));
                }
            }

            self.transcript.update(&self.pending[..message_end]);
            self.pending.drain(..message_end);
        }
    }

    /// Check ServerFinished, emit ChangeCipherSpec + ClientFinished, and
    /// switch to application keys.
    fn finish(mut self, message_end: usize, io: &mut Io<'_>) -> Result<Phase, Error> {
        let verify_data = &self.pending[MESSAGE_HEADER_LEN..message_end];
        if verify_data.len() != 32 {
            return Err(Error::decode(format!(
                "ServerFinished verify_data is {} bytes, expected 32",
                verify_data.len()
            )));
        }

        // Keyed off the transcript up to CertificateVerify.
        let pre_finished_hash = self.transcript.clone().finalize();
        if !verify_finished(&self.server_secret, &pre_finished_hash, verify_data) {
            return Err(Error::crypto(
                "ServerFinished verification failed".to_string(),
            ));
        }

        self.transcript.update(&self.pending[..message_end]);
        self.pending.drain(..message_end);
        if !self.pending.is_empty() {
            return Err(Error::decode(format!(
                "{} bytes of handshake data after ServerFinished",
                self.pending.len()
            )));
        }

        // Application secrets are keyed off the transcript through
        // ServerFinished; ClientFinished is not part of it.
        let handshake_hash = self.transcript.clone().finalize();

        // Compatibility ChangeCipherSpec, never encrypted or hashed.
        io.tcp_outbox
            .extend_from_slice(&[0x14, 0x03, 0x03, 0x00, 0x01, 0x01]);

        let verify_data = finished_verify_data(&self.client_secret, &handshake_hash);
        let message = finished_message(&verify_data.into());
        self.client_wrapper
            .wrap(io.tcp_outbox, ContentType::Handshake, &message);
        debug!("ClientFinished queued; WaitFinished -> Connected");

        // ```text
        // Derive-Secret(., "derived", "")
        //       |
        //       v
        // 0 -> HKDF-Extract = Master Secret
        //       +-> Derive-Secret(., "c ap traffic", ClientHello...server Finished)
        //       +-> Derive-Secret(., "s ap traffic", ClientHello...server Finished)
        // ```
        let handshake = from_prk(&self.handshake_secret);
        let derived: [u8; 32] = derive_secret(&handshake, b"derived", &EMPTY_HASH).into();
        let (_, master) = Hkdf::<Sha256>::extract(Some(&derived), &ZEROS_OF_HASH_LEN);
        let client_app: [u8; 32] =
            derive_secret(&master, b"c ap traffic", &handshake_hash).into();
        let server_app: [u8; 32] =
            derive_secret(&master, b"s ap traffic", &handshake_hash).into();

        let mut established = Established::new(
            RecordWrapper::from_traffic_secret(&server_app),
            RecordWrapper::from_traffic_secret(&client_app),
        );

        // A send requested before keys existed goes out in the same network
        // write as ClientFinished.
        if self.send_requested && !io.outbox.is_empty() {
            established.send_user_data(io);
        }

        Ok(Phase::Connected(established))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::HEADER_LEN;
    use crate::status::ErrorKind;
    use x25519_dalek::{PublicKey, StaticSecret};

    /// The server's view of the same handshake: an identical schedule derived
    /// independently, plus its sending wrapper.
    struct FakeServer {
        transcript: Sha256,
        client_secret: [u8; 32],
        server_secret: [u8; 32],
        handshake_secret: [u8; 32],
        wrapper: RecordWrapper,
    }

    impl FakeServer {
        fn message(&mut self, msg_type: u8, body: &[u8]) -> Vec<u8> {
            let mut message = vec![msg_type, 0, 0, 0];
            message[1..4].copy_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
            message.extend_from_slice(body);
            self.transcript.update(&message);
            message
        }

        fn finished(&mut self) -> Vec<u8> {
            let hash = self.transcript.clone().finalize();
            let verify_data = finished_verify_data(&self.server_secret, &hash);
            self.message(0x14, &verify_data)
        }

        fn record(&mut self, payload: &[u8]) -> Vec<u8> {
            let mut out: Vec<u8> = Vec::new();
            self.wrapper.wrap(&mut out, ContentType::Handshake, payload);
            out
        }
    }

    fn handshake_pair() -> (EncryptedHandshake, FakeServer) {
        let client = StaticSecret::from([1; 32]);
        let server = StaticSecret::from([2; 32]);
        let shared = client.diffie_hellman(&PublicKey::from(&server));

        let mut transcript = Sha256::new();
        transcript.update(b"client hello body");
        transcript.update(b"server hello body");

        let phase = EncryptedHandshake::new(transcript.clone(), &shared, false);

        let derived = early_derived_secret();
        let (handshake_secret, handshake) =
            Hkdf::<Sha256>::extract(Some(&derived), shared.as_bytes());
        let hello_hash = transcript.clone().finalize();
        let client_secret: [u8; 32] =
            derive_secret(&handshake, b"c hs traffic", &hello_hash).into();
        let server_secret: [u8; 32] =
            derive_secret(&handshake, b"s hs traffic", &hello_hash).into();

        let server = FakeServer {
            transcript,
            client_secret,
            server_secret,
            handshake_secret: handshake_secret.into(),
            wrapper: RecordWrapper::from_traffic_secret(&server_secret),
        };
        (phase, server)
    }

    fn feed(
        phase: Phase,
        record: &mut [u8],
        tcp_outbox: &mut Vec<u8>,
        outbox: &mut Vec<u8>,
    ) -> Result<Phase, Error> {
        let header =
            RecordHeader::deser(record[..HEADER_LEN].try_into().unwrap()).unwrap();
        let mut inbox: Vec<u8> = Vec::new();
        let mut io = Io {
            tcp_outbox,
            inbox: &mut inbox,
            outbox,
        };
        phase.process_record(&header, &mut record[HEADER_LEN..], &mut io)
    }

    fn server_flight(server: &mut FakeServer) -> Vec<u8> {
        let mut flight: Vec<u8> = Vec::new();
        flight.extend_from_slice(&server.message(0x08, &[0x00, 0x00]));
        flight.extend_from_slice(&server.message(0x0B, b"not a real certificate chain"));
        flight.extend_from_slice(&server.message(0x0F, b"not a real signature"));
        let finished = server.finished();
        flight.extend_from_slice(&finished);
        flight
    }

    #[test]
    fn full_server_flight_produces_client_finished() {
        let (phase, mut server) = handshake_pair();
        let flight = server_flight(&mut server);
        let mut record = server.record(&flight);

        let mut tcp_outbox: Vec<u8> = Vec::new();
        let mut outbox: Vec<u8> = Vec::new();
        let next = feed(
            Phase::WaitFinished(phase),
            &mut record,
            &mut tcp_outbox,
            &mut outbox,
        )
        .unwrap();
        assert!(matches!(next, Phase::Connected(_)));

        // the compatibility ChangeCipherSpec leads, as one contiguous block
        assert_eq!(&tcp_outbox[..6], &[0x14, 0x03, 0x03, 0x00, 0x01, 0x01]);

        // then one wrapped record holding the client Finished
        let header =
            RecordHeader::deser(tcp_outbox[6..6 + HEADER_LEN].try_into().unwrap()).unwrap();
        let body = &mut tcp_outbox[6 + HEADER_LEN..];
        let mut unwrapper = RecordWrapper::from_traffic_secret(&server.client_secret);
        let (inner_type, length) = unwrapper.unwrap(&header, body).unwrap();
        assert_eq!(inner_type, u8::from(ContentType::Handshake));

        // the MAC is keyed off the transcript through ServerFinished
        let handshake_hash = server.transcript.clone().finalize();
        let expected = finished_verify_data(&server.client_secret, &handshake_hash);
        assert_eq!(&body[..length], &finished_message(&expected.into())[..]);
    }

    #[test]
    fn flight_fragmented_across_records_is_reassembled() {
        let (phase, mut server) = handshake_pair();
        let flight = server_flight(&mut server);

        // split mid-message
        let mut first = server.record(&flight[..7]);
        let mut second = server.record(&flight[7..]);

        let mut tcp_outbox: Vec<u8> = Vec::new();
        let mut outbox: Vec<u8> = Vec::new();

        let next = feed(
            Phase::WaitFinished(phase),
            &mut first,
            &mut tcp_outbox,
            &mut outbox,
        )
        .unwrap();
        assert!(matches!(next, Phase::WaitFinished(_)));
        assert!(tcp_outbox.is_empty());

        let next = feed(next, &mut second, &mut tcp_outbox, &mut outbox).unwrap();
        assert!(matches!(next, Phase::Connected(_)));
        assert!(!tcp_outbox.is_empty());
    }

    #[test]
    fn change_cipher_spec_is_ignored() {
        let (phase, _) = handshake_pair();
        let mut record: Vec<u8> = vec![0x14, 0x03, 0x03, 0x00, 0x01, 0x01];

        let mut tcp_outbox: Vec<u8> = Vec::new();
        let mut outbox: Vec<u8> = Vec::new();
        let next = feed(
            Phase::WaitFinished(phase),
            &mut record,
            &mut tcp_outbox,
            &mut outbox,
        )
        .unwrap();
        assert!(matches!(next, Phase::WaitFinished(_)));
    }

    #[test]
    fn bad_server_finished_is_a_crypto_error() {
        let (phase, mut server) = handshake_pair();
        let mut flight = server_flight(&mut server);
        let last = flight.len() - 1;
        flight[last] ^= 0x01; // corrupt the verify_data
        let mut record = server.record(&flight);

        let mut tcp_outbox: Vec<u8> = Vec::new();
        let mut outbox: Vec<u8> = Vec::new();
        let err = match feed(
            Phase::WaitFinished(phase),
            &mut record,
            &mut tcp_outbox,
            &mut outbox,
        ) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert_eq!(err.kind, ErrorKind::Crypto);
        assert!(tcp_outbox.is_empty());
    }

    #[test]
    fn queued_send_goes_out_with_client_finished() {
        let (mut phase, mut server) = handshake_pair();
        phase.send_requested = true;
        let flight = server_flight(&mut server);
        let mut record = server.record(&flight);

        let mut tcp_outbox: Vec<u8> = Vec::new();
        let mut outbox: Vec<u8> = b"queued request".to_vec();
        let next = feed(
            Phase::WaitFinished(phase),
            &mut record,
            &mut tcp_outbox,
            &mut outbox,
        )
        .unwrap();
        assert!(matches!(next, Phase::Connected(_)));
        assert!(outbox.is_empty());

        // CCS ‖ ClientFinished ‖ first application record, contiguously
        assert_eq!(&tcp_outbox[..6], &[0x14, 0x03, 0x03, 0x00, 0x01, 0x01]);
        let finished_header =
            RecordHeader::deser(tcp_outbox[6..6 + HEADER_LEN].try_into().unwrap()).unwrap();
        let app_start = 6 + HEADER_LEN + finished_header.length();

        let header = RecordHeader::deser(
            tcp_outbox[app_start..app_start + HEADER_LEN]
                .try_into()
                .unwrap(),
        )
        .unwrap();
        let body = &mut tcp_outbox[app_start + HEADER_LEN..];

        // decrypt with the client application traffic secret
        let handshake = crate::key_schedule::from_prk(&server.handshake_secret);
        let derived: [u8; 32] = derive_secret(&handshake, b"derived", &EMPTY_HASH).into();
        let (_, master) = Hkdf::<Sha256>::extract(Some(&derived), &ZEROS_OF_HASH_LEN);
        let handshake_hash = server.transcript.clone().finalize();
        let client_app: [u8; 32] =
            derive_secret(&master, b"c ap traffic", &handshake_hash).into();

        let mut unwrapper = RecordWrapper::from_traffic_secret(&client_app);
        let (inner_type, length) = unwrapper.unwrap(&header, body).unwrap();
        assert_eq!(inner_type, u8::from(ContentType::ApplicationData));
        assert_eq!(&body[..length], b"queued request");
    }
}
