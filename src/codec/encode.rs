//! Encoding of outgoing specMech commands.

use std::io::Write;

use specmech_types::{Mechanism, MotorAxis, StatusKind};

pub trait Encode {
    fn encode(&self, writer: &mut impl Write) -> std::io::Result<()>;
}

/// An outgoing specMech command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MechCommand {
    /// A status report request (`rt`, `rV`, `re`, ...).
    Report(StatusKind),
    /// Open a pneumatic mechanism (`os`, `ol`, `or`).
    Open(Mechanism),
    /// Close a pneumatic mechanism (`cs`, `cl`, `cr`).
    Close(Mechanism),
    /// Offset all three collimator motors (`md<N>`).
    MoveAll(i32),
    /// Move one motor to an absolute position (`mA<N>`/`mB<N>`/`mC<N>`).
    MoveAbsolute(MotorAxis, i32),
    /// Offset one motor (`ma<N>`/`mb<N>`/`mc<N>`).
    MoveRelative(MotorAxis, i32),
    /// Set the controller clock (`st<ISO>`).
    SetTime(String),
    /// Turn the fan on (`sf+`) or off (`sf-`).
    Fan(bool),
    /// Reboot the controller (`R`).
    Reboot,
    /// Acknowledge a controller reboot (`!`).
    Ack,
    /// An arbitrary string passed through unchanged.
    Raw(String),
}

impl MechCommand {
    /// The wire form of this command, without sequence id or terminator.
    pub fn wire(&self) -> String {
        match self {
            MechCommand::Report(kind) => kind.wire_command(),
            MechCommand::Open(Mechanism::Shutter) => "os".to_string(),
            MechCommand::Open(Mechanism::Left) => "ol".to_string(),
            MechCommand::Open(Mechanism::Right) => "or".to_string(),
            MechCommand::Close(Mechanism::Shutter) => "cs".to_string(),
            MechCommand::Close(Mechanism::Left) => "cl".to_string(),
            MechCommand::Close(Mechanism::Right) => "cr".to_string(),
            MechCommand::MoveAll(offset) => format!("md{}", offset),
            MechCommand::MoveAbsolute(axis, position) => {
                format!("m{}{}", axis.to_wire().to_ascii_uppercase(), position)
            }
            MechCommand::MoveRelative(axis, offset) => format!("m{}{}", axis.to_wire(), offset),
            MechCommand::SetTime(time) => format!("st{}", time),
            MechCommand::Fan(true) => "sf+".to_string(),
            MechCommand::Fan(false) => "sf-".to_string(),
            MechCommand::Reboot => "R".to_string(),
            MechCommand::Ack => "!".to_string(),
            MechCommand::Raw(data) => data.clone(),
        }
    }

    /// The reboot acknowledgement is the only command framed without a
    /// sequence id.
    pub fn is_ack(&self) -> bool {
        matches!(self, MechCommand::Ack)
    }
}

/// A command plus the sequence id it is framed with.
///
/// A normal command `c` with id `N` goes out as `c;N\r`; the reboot
/// acknowledgement goes out as `!\r`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub command: MechCommand,
    pub sequence: Option<u64>,
}

impl Frame {
    pub fn new(command: MechCommand, sequence: Option<u64>) -> Self {
        Self { command, sequence }
    }
}

impl Encode for Frame {
    fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(self.command.wire().as_bytes())?;
        if let Some(sequence) = self.sequence {
            write!(writer, ";{}", sequence)?;
        }
        writer.write_all(b"\r")
    }
}
