//! Traits through which the core talks to its collaborators.
//!
//! The actor owns the alert bot and the bot's alerts only see the actor
//! through these interfaces, which keeps the lifetimes acyclic. The operator
//! command handle is likewise reduced to the methods the core calls on it.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde_json::Value;

use specmech_types::MechError;

/// Severity of a message or keyed event.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// An in-progress operator command.
///
/// Every command terminates with exactly one [`fail`](BusCommand::fail) or
/// [`finish`](BusCommand::finish).
pub trait BusCommand: Send + Sync {
    /// Emits a keyed message at `severity`.
    fn write(&self, severity: Severity, message: Value);

    /// Terminates the command successfully.
    fn finish(&self, message: Option<Value>);

    /// Terminates the command with a failure.
    fn fail(&self, message: Value);

    fn debug(&self, message: Value) {
        self.write(Severity::Debug, message);
    }

    fn info(&self, message: Value) {
        self.write(Severity::Info, message);
    }

    fn warning(&self, message: Value) {
        self.write(Severity::Warning, message);
    }

    fn error(&self, message: Value) {
        self.write(Severity::Error, message);
    }
}

/// Sink for keyed events published outside any command, e.g. by the alerts.
pub trait StatusPublisher: Send + Sync {
    fn publish(&self, severity: Severity, key: &str, value: Value);
}

/// The slice of a CCD controller the alerts consume: its latest device
/// status and the float parameters of its active configuration.
pub trait DeviceStatusSource: Send + Sync {
    fn device_status(&self) -> BoxFuture<'_, Result<HashMap<String, f64>, MechError>>;

    fn config_float(&self, parameter: &str) -> Option<f64>;
}
