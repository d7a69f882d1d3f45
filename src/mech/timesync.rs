//! Periodic synchronization of the controller clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};

use crate::codec::MechCommand;

use super::{check_reply, MechCoordinator};

/// Interval between successful clock syncs.
pub const TIME_SYNC_INTERVAL: Duration = Duration::from_secs(86_400);

/// Retry interval after a failed sync.
pub const TIME_SYNC_RETRY: Duration = Duration::from_secs(60);

/// The ISO-8601 UTC format the controller accepts: no fractional seconds,
/// no offset suffix.
pub(crate) fn iso_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

impl MechCoordinator {
    /// Spawns the clock synchronization task.
    ///
    /// The task sends `st<ISO>` once a day, falling back to a one-minute
    /// retry after a failure. It runs until [`stop`](MechCoordinator::stop).
    pub fn start_time_sync(&self) {
        let client = Arc::clone(&self.client);

        let handle = tokio::spawn(async move {
            loop {
                let reply = client
                    .send(MechCommand::SetTime(iso_now()), None)
                    .await;

                let delay = match check_reply(&reply) {
                    Ok(()) => {
                        debug!("specMech clock synchronized.");
                        TIME_SYNC_INTERVAL
                    }
                    Err(error) => {
                        warn!("Failed synchronizing the specMech clock: {}", error);
                        TIME_SYNC_RETRY
                    }
                };

                tokio::time::sleep(delay).await;
            }
        });

        let mut slot = self.time_sync.lock().unwrap();
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }
}
