//! High-level mechanism operations on top of the client.
//!
//! The client never retries; every retry that is semantically meaningful
//! (the pneumatic transition poll, the motor settle poll) lives here.

mod collimator;
mod timesync;

use std::sync::Arc;
use std::time::Duration;

use log::{error, warn};
use serde_json::json;
use tokio::task::JoinHandle;

use specmech_types::{
    MechError, MechReply, Mechanism, PneumaticState, ReplyCode, Status, StatusKind,
};

use crate::bus::BusCommand;
use crate::client::MechClient;
use crate::codec::{decode::strip_telnet, MechCommand};
use crate::config::{CollimatorConfig, Config, TimeoutsConfig};

pub use collimator::{MoveRequest, MAX_POSITION_POLLS, POSITION_POLL_GAP, SETTLE_MARGIN};
pub use timesync::{TIME_SYNC_INTERVAL, TIME_SYNC_RETRY};

/// Raises the error for a reply that did not complete normally.
pub fn check_reply(reply: &MechReply) -> Result<(), MechError> {
    match MechError::from_reply(reply) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Coordinates mechanism operations against the specMech.
#[derive(Debug)]
pub struct MechCoordinator {
    client: Arc<MechClient>,
    motors: CollimatorConfig,
    timeouts: TimeoutsConfig,
    time_sync: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MechCoordinator {
    pub fn new(client: Arc<MechClient>, config: &Config) -> Self {
        Self {
            client,
            motors: config.spec_mech.motors.clone(),
            timeouts: config.timeouts,
            time_sync: std::sync::Mutex::new(None),
        }
    }

    pub fn client(&self) -> &Arc<MechClient> {
        &self.client
    }

    /// Stops the periodic tasks. The client connection is left untouched.
    pub fn stop(&self) {
        if let Some(handle) = self.time_sync.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Sends a command, refusing while a reboot is unacknowledged, and
    /// checks the reply.
    pub(crate) async fn send_checked(&self, command: MechCommand) -> Result<MechReply, MechError> {
        if self.client.reboot_pending() && !command.is_ack() {
            return Err(MechError::ControllerRebooted);
        }

        let reply = self.client.send(command, None).await;
        check_reply(&reply)?;

        Ok(reply)
    }

    /// Opens or closes a pneumatic mechanism and polls until it arrives.
    ///
    /// After the move command is accepted the pneumatics report is polled up
    /// to two times, sleeping `timeouts.pneumatics` seconds before each
    /// poll. The first miss emits a warning; the second fails the move.
    pub async fn pneumatic_move(
        &self,
        mechanism: Mechanism,
        open: bool,
        command: Option<&dyn BusCommand>,
    ) -> Result<PneumaticState, MechError> {
        let wire = if open {
            MechCommand::Open(mechanism)
        } else {
            MechCommand::Close(mechanism)
        };
        self.send_checked(wire).await?;

        let destination = if open {
            PneumaticState::Open
        } else {
            PneumaticState::Closed
        };

        for attempt in 1..=2 {
            tokio::time::sleep(Duration::from_secs_f64(self.timeouts.pneumatics)).await;

            let status = match self.client.get_stat(StatusKind::Pneumatics).await {
                Ok(Status::Pneumatics(status)) => status,
                Ok(_) => return Err(MechError::Protocol(ReplyCode::Unparsable)),
                Err(error) => {
                    warn!(
                        "Failed checking the status of the pneumatics after a move: {}",
                        error
                    );
                    return Err(error);
                }
            };

            if status.get(mechanism) == destination {
                if let Some(command) = command {
                    command.info(json!({ mechanism.keyword(): destination }));
                }
                return Ok(destination);
            }

            if attempt == 1 {
                let text = "Pneumatics did not reach the desired position. Waiting a bit longer ...";
                match command {
                    Some(command) => command.warning(json!({ "text": text })),
                    None => warn!("{}", text),
                }
            }
        }

        Err(MechError::MechanismTransition(mechanism))
    }

    /// Returns the current state of a single pneumatic mechanism.
    pub async fn pneumatic_status(
        &self,
        mechanism: Mechanism,
    ) -> Result<PneumaticState, MechError> {
        match self.client.get_stat(StatusKind::Pneumatics).await? {
            Status::Pneumatics(status) => Ok(status.get(mechanism)),
            _ => Err(MechError::Protocol(ReplyCode::Unparsable)),
        }
    }

    /// Sets the controller clock to the given ISO timestamp.
    pub async fn set_time(&self, iso: &str) -> Result<(), MechError> {
        self.send_checked(MechCommand::SetTime(iso.to_string()))
            .await
            .map(|_| ())
    }

    /// Turns the specMech fan on or off.
    pub async fn fan(&self, on: bool) -> Result<(), MechError> {
        self.send_checked(MechCommand::Fan(on)).await.map(|_| ())
    }

    /// Acknowledges a controller reboot.
    pub async fn ack(&self) -> Result<(), MechError> {
        let reply = self.client.send(MechCommand::Ack, None).await;
        check_reply(&reply)?;

        if reply.code != ReplyCode::RebootAcknowledged {
            return Err(MechError::AckFailed);
        }

        Ok(())
    }

    /// Commands a controller reboot.
    ///
    /// The controller drops into its boot sequence and announces itself with
    /// the `!` marker once it is back; operations are then refused until the
    /// reboot is [`ack`](MechCoordinator::ack)nowledged.
    pub async fn reboot(&self) -> Result<(), MechError> {
        let reply = self.client.send(MechCommand::Reboot, None).await;

        match reply.code {
            ReplyCode::Valid | ReplyCode::ControllerRebooted => Ok(()),
            _ => check_reply(&reply),
        }
    }

    /// Sends a raw string and returns the raw reply, with telnet
    /// negotiations stripped.
    pub async fn talk(&self, data: &str) -> Result<String, MechError> {
        let reply = self.client.send(MechCommand::Raw(data.to_string()), None).await;
        check_reply(&reply)?;

        let stripped = strip_telnet(&reply.raw).unwrap_or(&reply.raw);
        Ok(String::from_utf8_lossy(stripped).to_string())
    }

    /// Closes and reopens the connection.
    pub async fn reconnect(&self) -> Result<(), MechError> {
        self.client.close().await;
        self.client.start().await
    }

    pub async fn disconnect(&self) {
        self.client.close().await;
    }

    /// Quick sanity check used before starting an operation that relies on
    /// the mechanics: connected, and answering a time report promptly.
    pub async fn check_controller(&self) -> bool {
        if !self.client.is_connected() {
            error!("The specMech is not connected.");
            return false;
        }

        let timeout = Duration::from_secs_f64(self.timeouts.controller);
        let reply = self
            .client
            .send(MechCommand::Report(StatusKind::Time), Some(timeout))
            .await;

        if reply.code == ReplyCode::ConnectionFailed {
            error!("The specMech did not reply to the sanity check.");
            return false;
        }

        true
    }
}
