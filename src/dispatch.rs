//! Binding of operator verbs to coordinator operations.
//!
//! The bus-side command parser is the daemon's business; by the time an
//! operation reaches this module it is already a typed [`MechOp`]. Every
//! dispatch terminates the command with exactly one `finish` or `fail`.

use serde_json::{json, Value};

use specmech_types::{MechError, Mechanism, Status, StatusKind};

use crate::bus::BusCommand;
use crate::mech::{MechCoordinator, MoveRequest};

/// A user-visible operation on the mechanics.
#[derive(Clone, Debug, PartialEq)]
pub enum MechOp {
    /// Report one status kind, or all of them.
    Status(Option<StatusKind>),
    /// Acknowledge a controller reboot.
    Ack,
    /// Pass a raw string through to the controller.
    Talk(String),
    /// Set the controller clock.
    SetTime(String),
    /// Open pneumatic mechanisms; the shutter when empty.
    Open(Vec<Mechanism>),
    /// Close pneumatic mechanisms; the shutter when empty.
    Close(Vec<Mechanism>),
    /// Move the collimator motors.
    Move(MoveRequest),
    Reboot,
    Reconnect,
    Disconnect,
    Fan(bool),
}

/// Status kinds reported by a bare `status`.
const ALL_STATUS_KINDS: [StatusKind; 7] = [
    StatusKind::Time,
    StatusKind::Version,
    StatusKind::Environment,
    StatusKind::Vacuum,
    StatusKind::Orientation,
    StatusKind::Pneumatics,
    StatusKind::SpecMech,
];

/// Runs `op` and reports its outcome on `command`.
pub async fn dispatch(coordinator: &MechCoordinator, op: MechOp, command: &dyn BusCommand) {
    match run(coordinator, op, command).await {
        Ok(message) => command.finish(message),
        Err(error) => command.fail(json!({ "error": error.to_string() })),
    }
}

async fn run(
    coordinator: &MechCoordinator,
    op: MechOp,
    command: &dyn BusCommand,
) -> Result<Option<Value>, MechError> {
    match op {
        MechOp::Status(kind) => {
            let kinds: Vec<StatusKind> = match kind {
                Some(kind) => vec![kind],
                None => ALL_STATUS_KINDS.to_vec(),
            };

            for kind in kinds {
                let status = coordinator.client().get_stat(kind).await?;
                command.info(status_message(kind, &status));
            }

            Ok(None)
        }

        MechOp::Ack => {
            coordinator.ack().await?;
            Ok(Some(json!({ "text": "specMech has been acknowledged." })))
        }

        MechOp::Talk(data) => {
            let raw = coordinator.talk(&data).await?;
            Ok(Some(json!({ "mech_raw_reply": raw })))
        }

        MechOp::SetTime(time) => {
            coordinator.set_time(&time).await?;
            Ok(None)
        }

        MechOp::Open(mechanisms) => {
            pneumatic_moves(coordinator, mechanisms, true, command).await?;
            Ok(None)
        }

        MechOp::Close(mechanisms) => {
            pneumatic_moves(coordinator, mechanisms, false, command).await?;
            Ok(None)
        }

        MechOp::Move(request) => {
            let positions = coordinator.collimator_move(&request).await?;
            Ok(Some(json!({ "collimator": positions })))
        }

        MechOp::Reboot => {
            coordinator.reboot().await?;
            Ok(Some(json!({
                "text": "specMech is rebooting. Acknowledge the reboot once it is back."
            })))
        }

        MechOp::Reconnect => {
            coordinator.reconnect().await?;
            Ok(Some(json!({ "text": "The connection to the specMech has been reopened." })))
        }

        MechOp::Disconnect => {
            coordinator.disconnect().await;
            Ok(Some(json!({ "text": "The specMech has been disconnected." })))
        }

        MechOp::Fan(on) => {
            coordinator.fan(on).await?;
            Ok(None)
        }
    }
}

async fn pneumatic_moves(
    coordinator: &MechCoordinator,
    mechanisms: Vec<Mechanism>,
    open: bool,
    command: &dyn BusCommand,
) -> Result<(), MechError> {
    let mechanisms = if mechanisms.is_empty() {
        vec![Mechanism::Shutter]
    } else {
        mechanisms
    };

    for mechanism in mechanisms {
        coordinator
            .pneumatic_move(mechanism, open, Some(command))
            .await?;
    }

    Ok(())
}

fn status_message(kind: StatusKind, status: &Status) -> Value {
    let key = kind.to_string().replace('-', "_");
    json!({ key: status })
}

#[cfg(test)]
mod tests {
    use specmech_types::{AirState, PneumaticState, PneumaticsStatus};

    use super::*;

    #[test]
    fn test_status_message_keys() {
        let status = Status::Pneumatics(PneumaticsStatus {
            shutter: PneumaticState::Open,
            hartmann_left: PneumaticState::Closed,
            hartmann_right: PneumaticState::Open,
            air_pressure: AirState::On,
        });

        let message = status_message(StatusKind::Pneumatics, &status);
        assert_eq!(
            message,
            json!({
                "pneumatics": {
                    "shutter": "open",
                    "hartmann_left": "closed",
                    "hartmann_right": "open",
                    "air_pressure": "on",
                }
            })
        );

        let message = status_message(
            StatusKind::Motor(specmech_types::MotorAxis::A),
            &Status::Pneumatics(PneumaticsStatus {
                shutter: PneumaticState::Open,
                hartmann_left: PneumaticState::Closed,
                hartmann_right: PneumaticState::Open,
                air_pressure: AirState::On,
            }),
        );
        assert!(message.get("motor_a").is_some());
    }
}
