//! Application phase: encrypted user data in both directions.

use super::{Io, Phase};
use crate::alert::Alert;
use crate::record::{ContentType, RecordHeader, RecordWrapper};
use crate::status::Error;
use log::{debug, trace};

/// State after the handshake has completed.
pub(crate) struct Established {
    server_wrapper: RecordWrapper,
    client_wrapper: RecordWrapper,
}

impl Established {
    pub fn new(server_wrapper: RecordWrapper, client_wrapper: RecordWrapper) -> Self {
        Self {
            server_wrapper,
            client_wrapper,
        }
    }

    pub fn process_record(
        mut self,
        header: &RecordHeader,
        contents: &mut [u8],
        io: &mut Io<'_>,
    ) -> Result<Phase, Error> {
        if header.content_type() != ContentType::ApplicationData {
            return Err(Error::state(format!(
                "received {:?} record after the handshake",
                header.content_type()
            )));
        }

        let (inner_type, length) = self.server_wrapper.unwrap(header, contents)?;
        match ContentType::try_from(inner_type) {
            Ok(ContentType::ApplicationData) => {
                // A user-visible message may span several records; fragments
                // simply concatenate in the inbox.
                io.inbox.extend_from_slice(&contents[..length]);
                trace!("{length} bytes of application data");
                Ok(Phase::Connected(self))
            }
            Ok(ContentType::Alert) => {
                let alert = Alert::deser(&contents[..length])?;
                if alert.is_fatal() {
                    Err(Error::remote_alert(alert))
                } else {
                    debug!("close_notify received; Connected -> Closed");
                    Ok(Phase::Closed)
                }
            }
            // NewSessionTicket and KeyUpdate; neither is implemented.
            Ok(ContentType::Handshake) => {
                trace!("ignoring post-handshake message ({length} bytes)");
                Ok(Phase::Connected(self))
            }
            other => Err(Error::decode(format!(
                "unknown inner content type {other:?}"
            ))),
        }
    }

    /// Wrap the whole user outbox as a single ApplicationData record.
    pub fn send_user_data(&mut self, io: &mut Io<'_>) {
        if io.outbox.is_empty() {
            return;
        }
        self.client_wrapper
            .wrap(io.tcp_outbox, ContentType::ApplicationData, io.outbox.as_slice());
        trace!("wrapped {} bytes of application data", io.outbox.len());
        io.outbox.clear();
    }

    /// Best-effort encrypted `close_notify`.
    pub fn send_close_notify(&mut self, tcp_outbox: &mut Vec<u8>) {
        self.client_wrapper
            .wrap(tcp_outbox, ContentType::Alert, &Alert::CLOSE_NOTIFY.as_bytes());
    }
}
