//! The TCP client for the specMech controller.
//!
//! [`MechClient`] owns the connection and serializes every command/response
//! interaction behind a single lock: a command is written, then bytes are
//! read until the reply terminator is observed, and the decoded
//! [`MechReply`] is returned to the caller. The protocol has no mid-reply
//! cancellation, so a timeout drops the stream and the client must be
//! started again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;

use specmech_types::{MechReply, ReplyCode};

use crate::codec::{Frame, MechClientCodec, MechCodecError, MechCommand};
use crate::config::{SequenceIdMode, SpecMechConfig};

/// Bound on the initial TCP connect.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
struct Inner {
    transport: Option<Framed<TcpStream, MechClientCodec>>,
    command_number: u64,
}

/// Client for the spectrograph mechanics controller.
#[derive(Debug)]
pub struct MechClient {
    address: String,
    port: u16,
    write_log: bool,
    sequence_id_mode: SequenceIdMode,
    inner: Mutex<Inner>,
    connected: AtomicBool,
    reboot_pending: AtomicBool,
}

impl MechClient {
    pub fn new(config: &SpecMechConfig) -> Self {
        Self {
            address: config.address.clone(),
            port: config.port,
            write_log: config.write_log,
            sequence_id_mode: config.sequence_id_mode,
            inner: Mutex::new(Inner::default()),
            connected: AtomicBool::new(false),
            reboot_pending: AtomicBool::new(false),
        }
    }

    /// Opens the connection and resets the per-connection state.
    pub async fn start(&self) -> Result<(), specmech_types::MechError> {
        let mut inner = self.inner.lock().await;

        info!(
            "Opening connection with {} on port {}",
            self.address, self.port
        );

        let connect = TcpStream::connect((self.address.as_str(), self.port));
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, connect)
            .await
            .map_err(|_| specmech_types::MechError::ConnectionFailed)??;

        inner.transport = Some(Framed::new(stream, MechClientCodec));
        inner.command_number = 0;
        self.connected.store(true, Ordering::SeqCst);
        self.reboot_pending.store(false, Ordering::SeqCst);

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether a controller reboot is awaiting acknowledgement.
    pub fn reboot_pending(&self) -> bool {
        self.reboot_pending.load(Ordering::SeqCst)
    }

    /// Sends a command and awaits its complete reply.
    ///
    /// Callers are serialized: the next command is written only after the
    /// current one has received its terminator. Read or write failures, and
    /// an expired `timeout`, yield a `ConnectionFailed` reply and drop the
    /// stream; the client must be [`start`](MechClient::start)ed again.
    pub async fn send(&self, command: MechCommand, timeout: Option<Duration>) -> MechReply {
        let mut inner = self.inner.lock().await;

        let sequence = if command.is_ack() {
            None
        } else {
            inner.command_number += 1;
            Some(match self.sequence_id_mode {
                SequenceIdMode::Wrap => inner.command_number % 10,
                SequenceIdMode::Monotonic => inner.command_number,
            })
        };

        let frame = Frame::new(command, sequence);

        if self.write_log {
            debug!("Sent to specMech: {:?}", frame);
        }

        let outcome = {
            let transport = match inner.transport.as_mut() {
                Some(transport) => transport,
                None => return MechReply::failed(ReplyCode::ConnectionFailed),
            };

            let interaction = async {
                transport.send(frame).await?;
                match transport.next().await {
                    Some(result) => result,
                    None => Err(MechCodecError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "specMech closed the connection",
                    ))),
                }
            };

            match timeout {
                Some(timeout) => match tokio::time::timeout(timeout, interaction).await {
                    Ok(result) => result,
                    Err(_) => Err(MechCodecError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "timed out waiting for a specMech reply",
                    ))),
                },
                None => interaction.await,
            }
        };

        let mut reply = match outcome {
            Ok(reply) => reply,
            Err(error) => {
                warn!("specMech connection failed: {}", error);
                inner.transport = None;
                self.connected.store(false, Ordering::SeqCst);
                return MechReply::failed(ReplyCode::ConnectionFailed);
            }
        };

        if self.write_log {
            debug!(
                "Received from specMech: {:?}",
                String::from_utf8_lossy(&reply.raw)
            );
        }

        match reply.code {
            ReplyCode::ControllerRebooted => {
                self.reboot_pending.store(true, Ordering::SeqCst);
            }
            ReplyCode::RebootAcknowledged => {
                self.reboot_pending.store(false, Ordering::SeqCst);
            }
            ReplyCode::Valid => {
                // An echo id of 0 means the id could not be parsed; the
                // decoder has already warned about it.
                if let Some(expected) = sequence {
                    if reply.command_id != 0 && reply.command_id != expected {
                        reply.code = ReplyCode::MismatchedId;
                    }
                }
            }
            _ => {}
        }

        reply
    }

    /// Closes the connection. Closing an unconnected client is a no-op.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(mut transport) = inner.transport.take() {
            info!("Closing the connection to the specMech.");
            if let Err(error) = SinkExt::<Frame>::close(&mut transport).await {
                warn!("Error closing the specMech connection: {}", error);
            }
        }

        self.connected.store(false, Ordering::SeqCst);
    }
}
