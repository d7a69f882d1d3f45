//! The error union shared by the client and the coordinator.

use thiserror::Error;

use crate::reply::{ReplyCode, SentenceTag};
use crate::status::{Mechanism, MotorAxis};

/// Errors surfaced by the specMech client and coordinator.
#[derive(Debug, Error)]
pub enum MechError {
    /// The reply could not be parsed or failed a checksum.
    #[error("Failed parsing specMech reply: {0}")]
    Protocol(ReplyCode),

    /// The controller answered with an `ERR` sentence.
    #[error("Error {code} found in specMech reply: {message:?}.")]
    Reply { code: String, message: String },

    #[error("The specMech controller has rebooted. Acknowledge the reboot before continuing.")]
    ControllerRebooted,

    #[error("The connection to the specMech failed. Try reconnecting.")]
    ConnectionFailed,

    #[error("SpecMech client not connected.")]
    NotConnected,

    /// A pneumatic mechanism did not reach its target after polling.
    #[error("The {0} did not reach the desired position.")]
    MechanismTransition(Mechanism),

    #[error("Motor {0} is moving.")]
    MotorBusy(MotorAxis),

    #[error("Limit switch triggered on motor {0}.")]
    LimitSwitch(MotorAxis),

    /// A commanded position, or an encoder bound reported by a motor, falls
    /// outside the configured range.
    #[error("Motor {axis}: position {position} is outside the allowed range [{min}, {max}].")]
    OutOfRange {
        axis: MotorAxis,
        position: i32,
        min: i32,
        max: i32,
    },

    /// The motors settled away from their targets.
    #[error("Motors did not converge: positions {positions:?}, targets {targets:?}.")]
    MoveDidNotConverge {
        positions: [i32; 3],
        targets: [i32; 3],
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A sentence field could not be converted to its typed form.
    #[error("Invalid field {index} in {tag} sentence: {value:?}")]
    InvalidField {
        tag: SentenceTag,
        index: usize,
        value: String,
    },

    #[error("Invalid specMech stat {0:?}.")]
    InvalidStat(String),

    #[error("Invalid mechanism {0:?}.")]
    InvalidMechanism(String),

    #[error("specMech did not acknowledge.")]
    AckFailed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MechError {
    /// Builds the error for a reply that did not complete normally.
    ///
    /// `Valid` and `RebootAcknowledged` replies produce no error. An `ERR`
    /// sentence is unpacked into [`MechError::Reply`].
    pub fn from_reply(reply: &crate::reply::MechReply) -> Option<MechError> {
        match reply.code {
            ReplyCode::Valid | ReplyCode::RebootAcknowledged => None,
            ReplyCode::ErrInReply => {
                let (code, message) = reply
                    .error_sentence()
                    .unwrap_or_else(|| ("?".to_string(), String::new()));
                Some(MechError::Reply { code, message })
            }
            ReplyCode::ControllerRebooted => Some(MechError::ControllerRebooted),
            ReplyCode::ConnectionFailed => Some(MechError::ConnectionFailed),
            code => Some(MechError::Protocol(code)),
        }
    }
}
