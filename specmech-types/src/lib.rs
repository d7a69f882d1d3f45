#![deny(missing_debug_implementations)]

//! Wire-level and domain-level types for the specMech controller.
//!
//! This crate contains no I/O. It defines the reply model produced by the
//! protocol decoder ([`MechReply`], [`Sentence`], [`ReplyCode`]), the typed
//! status records decoded from report replies ([`status`]), and the error
//! union shared by the client and coordinator ([`MechError`]).

pub mod error;
pub mod reply;
pub mod status;

pub use error::MechError;
pub use reply::{MechReply, ReplyCode, Sentence, SentenceTag};
pub use status::{
    AirState, EnvironmentStatus, Ln2Status, Mechanism, MotorAxis, MotorPositions, MotorStatus,
    OrientationStatus, PneumaticState, PneumaticsStatus, SpecMechStatus, Status, StatusKind,
    ThermistorState, TimeStatus, VacuumStatus, ValveState, VersionStatus,
};
