//! Periodic alert monitors.
//!
//! Each alert runs in its own task, sampling a condition on a fixed
//! interval. The public value of an alert only flips after two consecutive
//! samples agree, which keeps a single noisy reading from toggling the
//! alarm. Positive values are re-published on every check; negative values
//! only on the transition.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;
use tokio::task::JoinHandle;

use specmech_types::MechError;

use crate::bus::{DeviceStatusSource, Severity, StatusPublisher};
use crate::config::{AlertsConfig, Setpoint};

/// Delay before the first check of a freshly started alert.
const START_DELAY: Duration = Duration::from_secs(1);

/// A periodic alert.
pub trait Alert: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Keyword under which the alert value is published.
    fn keyword(&self) -> &str;

    /// Samples the alert condition.
    ///
    /// Returns `Some(true)` when the alert condition holds, `Some(false)`
    /// when it does not, or `None` for alerts that publish directly and
    /// carry no rolling state.
    fn check<'a>(
        &'a self,
        publisher: &'a dyn StatusPublisher,
    ) -> BoxFuture<'a, Result<Option<bool>, MechError>>;

    /// Whether the alert publishes its boolean value. Heartbeat-style
    /// alerts do not.
    fn publishes_value(&self) -> bool {
        true
    }
}

/// Rolling two-sample window plus the public value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct AlertState {
    samples: Vec<bool>,
    value: bool,
}

impl AlertState {
    /// Records a sample. When the last two samples agree the public value
    /// is set and `(old, new)` is returned.
    fn record(&mut self, sample: bool) -> Option<(bool, bool)> {
        if self.samples.len() == 2 {
            self.samples.remove(0);
        }
        self.samples.push(sample);

        if self.samples.len() == 2 && self.samples[0] == self.samples[1] {
            let old = self.value;
            self.value = sample;
            Some((old, sample))
        } else {
            None
        }
    }
}

/// Owns the alert tasks for the actor.
pub struct AlertBot {
    tasks: Vec<JoinHandle<()>>,
}

impl Debug for AlertBot {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("AlertBot")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl AlertBot {
    /// Builds the fixed alert set and starts one task per alert.
    pub fn start(
        config: &AlertsConfig,
        controllers: HashMap<String, Arc<dyn DeviceStatusSource>>,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        let controllers = Arc::new(controllers);
        let sp2 = &config.sp2;

        let alerts: Vec<Box<dyn Alert>> = vec![
            Box::new(TemperatureAlert {
                name: "r2_ccd_temp_alert".to_string(),
                keyword: "r2_ccd_temp_alert".to_string(),
                controller: "sp2".to_string(),
                status_param: sp2.r2_ccd_status_param.clone(),
                setpoint: sp2.r2_setpoint_param.clone(),
                max_increase: sp2.ccd_temperature_max_increase,
                controllers: Arc::clone(&controllers),
            }),
            Box::new(TemperatureAlert {
                name: "r2_ln2_temp_alert".to_string(),
                keyword: "r2_ln2_temp_alert".to_string(),
                controller: "sp2".to_string(),
                status_param: sp2.r2_ln2_status_param.clone(),
                setpoint: sp2.ln2_base_temperature.clone(),
                max_increase: sp2.ln2_temperature_max_increase,
                controllers: Arc::clone(&controllers),
            }),
            Box::new(TemperatureAlert {
                name: "b2_ccd_temp_alert".to_string(),
                keyword: "b2_ccd_temp_alert".to_string(),
                controller: "sp2".to_string(),
                status_param: sp2.b2_ccd_status_param.clone(),
                setpoint: sp2.b2_setpoint_param.clone(),
                max_increase: sp2.ccd_temperature_max_increase,
                controllers: Arc::clone(&controllers),
            }),
            Box::new(TemperatureAlert {
                name: "b2_ln2_temp_alert".to_string(),
                keyword: "b2_ln2_temp_alert".to_string(),
                controller: "sp2".to_string(),
                status_param: sp2.b2_ln2_status_param.clone(),
                setpoint: sp2.ln2_base_temperature.clone(),
                max_increase: sp2.ln2_temperature_max_increase,
                controllers: Arc::clone(&controllers),
            }),
            Box::new(Heartbeat),
        ];

        let interval = Duration::from_secs_f64(sp2.interval);
        let tasks = alerts
            .into_iter()
            .map(|alert| tokio::spawn(run_alert(alert, interval, Arc::clone(&publisher))))
            .collect();

        Self { tasks }
    }

    /// Stops all the alert tasks.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

async fn run_alert(alert: Box<dyn Alert>, interval: Duration, publisher: Arc<dyn StatusPublisher>) {
    let mut state = AlertState::default();

    if alert.publishes_value() {
        // Announce the cleared state on start.
        publisher.publish(Severity::Info, alert.keyword(), json!(0));
    }

    tokio::time::sleep(START_DELAY).await;

    loop {
        match alert.check(publisher.as_ref()).await {
            Ok(Some(sample)) => {
                if let Some((old, new)) = state.record(sample) {
                    if new {
                        publisher.publish(Severity::Warning, alert.keyword(), json!(1));
                    } else if old {
                        publisher.publish(Severity::Info, alert.keyword(), json!(0));
                    }
                }
            }
            Ok(None) => {}
            Err(error) => {
                publisher.publish(
                    Severity::Warning,
                    "error",
                    json!(format!("Failed checking alert {}: {}", alert.name(), error)),
                );
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// Alert on a CCD or LN2 temperature exceeding its setpoint.
pub struct TemperatureAlert {
    name: String,
    keyword: String,
    controller: String,
    status_param: String,
    setpoint: Setpoint,
    max_increase: f64,
    controllers: Arc<HashMap<String, Arc<dyn DeviceStatusSource>>>,
}

impl Debug for TemperatureAlert {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("TemperatureAlert")
            .field("name", &self.name)
            .field("controller", &self.controller)
            .field("status_param", &self.status_param)
            .finish()
    }
}

impl Alert for TemperatureAlert {
    fn name(&self) -> &str {
        &self.name
    }

    fn keyword(&self) -> &str {
        &self.keyword
    }

    fn check<'a>(
        &'a self,
        _publisher: &'a dyn StatusPublisher,
    ) -> BoxFuture<'a, Result<Option<bool>, MechError>> {
        Box::pin(async move {
            let controller = self.controllers.get(&self.controller).ok_or_else(|| {
                MechError::Config(format!("Unknown controller {:?}.", self.controller))
            })?;

            let status = controller.device_status().await?;
            let temperature = *status.get(&self.status_param).ok_or_else(|| {
                MechError::Config(format!(
                    "Device status has no parameter {:?}.",
                    self.status_param
                ))
            })?;

            let setpoint = match &self.setpoint {
                Setpoint::Fixed(value) => *value,
                Setpoint::Parameter(name) => controller.config_float(name).ok_or_else(|| {
                    MechError::Config("Controller has no configuration loaded.".to_string())
                })?,
            };

            Ok(Some(temperature > setpoint + self.max_increase))
        })
    }
}

/// Publishes the current time every interval to signal the actor is alive.
#[derive(Clone, Copy, Debug, Default)]
pub struct Heartbeat;

impl Alert for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn keyword(&self) -> &str {
        "alive_at"
    }

    fn check<'a>(
        &'a self,
        publisher: &'a dyn StatusPublisher,
    ) -> BoxFuture<'a, Result<Option<bool>, MechError>> {
        Box::pin(async move {
            let now = Utc::now().timestamp_millis() as f64 / 1000.0;
            publisher.publish(Severity::Debug, self.keyword(), json!(now));
            Ok(None)
        })
    }

    fn publishes_value(&self) -> bool {
        false
    }
}
