//! Plaintext phase: ClientHello out, ServerHello in.

use super::{client_hello, server_hello, EncryptedHandshake, Phase};
use crate::alert::Alert;
use crate::crypto::x25519;
use crate::record::{ContentType, RecordHeader};
use crate::status::Error;
use log::debug;
use sha2::{Digest, Sha256};
use x25519_dalek::StaticSecret;

/// State between ClientHello and ServerHello.
pub(crate) struct HelloExchange {
    client_secret: StaticSecret,
    transcript: Sha256,
    /// The user called `send()` before any keys existed; remembered so the
    /// queued plaintext goes out with the first application keys.
    pub send_requested: bool,
}

impl HelloExchange {
    /// Generate the ephemeral key material and serialize the ClientHello
    /// into `tcp_outbox`.
    pub fn start(
        tcp_outbox: &mut Vec<u8>,
        server_name: Option<&str>,
    ) -> Result<Self, Error> {
        let (client_secret, client_public) = x25519::keygen()?;

        let mut random: [u8; 32] = [0; 32];
        let mut session_id: [u8; 32] = [0; 32];
        x25519::fill_random(&mut random)?;
        x25519::fill_random(&mut session_id)?;

        let mut transcript = Sha256::new();
        client_hello::ser(
            tcp_outbox,
            &mut transcript,
            &random,
            &session_id,
            server_name,
            &client_public,
        );
        debug!("ClientHello queued, {} bytes", tcp_outbox.len());

        Ok(Self {
            client_secret,
            transcript,
            send_requested: false,
        })
    }

    pub fn process_record(
        mut self,
        header: &RecordHeader,
        contents: &mut [u8],
    ) -> Result<Phase, Error> {
        match header.content_type() {
            ContentType::Handshake => {
                let server_hello = server_hello::parse(contents)?;
                self.transcript.update(&*contents);

                let shared_secret =
                    x25519::diffie_hellman(self.client_secret, &server_hello.server_public)?;

                debug!("WaitServerHello -> WaitFinished");
                Ok(Phase::WaitFinished(EncryptedHandshake::new(
                    self.transcript,
                    &shared_secret,
                    self.send_requested,
                )))
            }
            // A server refusing the hello does so with a plaintext alert.
            ContentType::Alert => Err(Error::remote_alert(Alert::deser(contents)?)),
            other => Err(Error::state(format!(
                "received {other:?} record while waiting for ServerHello"
            ))),
        }
    }
}
