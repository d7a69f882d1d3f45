#![deny(missing_debug_implementations)]

//! Protocol client and mechanism coordinator for the specMech spectrograph
//! mechanics controller.
//!
//! The specMech speaks an NMEA-like text protocol over TCP: one command goes
//! out as `c;N\r`, the controller echoes it as a checksummed `$S2CMD`
//! sentence, optionally followed by `$S2<TAG>` data sentences, and the
//! interaction ends with `>`. The [`client::MechClient`] serializes these
//! interactions, [`status`] refines the sentences into typed records, and
//! [`mech::MechCoordinator`] builds the stateful operations on top: pneumatic
//! moves with transition polling, collimator moves with range and limit
//! checks, clock synchronization, and reboot handling. [`alerts::AlertBot`]
//! drives the periodic temperature and heartbeat monitors.

pub mod alerts;
pub mod bus;
pub mod checksum;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod mech;
pub mod parse;
pub mod status;

pub use specmech_types;
pub use specmech_types as types;

pub use alerts::AlertBot;
pub use client::MechClient;
pub use codec::{decode_reply, MechClientCodec, MechCommand};
pub use config::Config;
pub use dispatch::{dispatch, MechOp};
pub use mech::{check_reply, MechCoordinator, MoveRequest};
pub use status::decode_status;
