//! Injected configuration.
//!
//! The configuration is handed to the core at construction; loading it from
//! disk is the daemon's business. The structures deserialize from the same
//! layout the daemon's configuration file uses (`specMech.*`, `timeouts.*`,
//! `alerts.*`).

use serde::Deserialize;

/// How the client frames the command sequence id and matches the echo.
///
/// One firmware revision echoes only a single decimal digit, which makes the
/// wrap behavior ambiguous; both readings are supported.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SequenceIdMode {
    /// Frame `command_number % 10` and expect the single-digit echo.
    #[default]
    Wrap,
    /// Frame the full monotonic id and accept a multi-digit echo.
    Monotonic,
}

/// The `specMech` configuration section.
#[derive(Clone, Debug, Deserialize)]
pub struct SpecMechConfig {
    /// Host of the specMech controller.
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log raw wire traffic at debug level.
    #[serde(default)]
    pub write_log: bool,
    #[serde(default)]
    pub sequence_id_mode: SequenceIdMode,
    pub motors: CollimatorConfig,
}

/// Collimator motor limits and kinematics.
#[derive(Clone, Debug, Deserialize)]
pub struct CollimatorConfig {
    /// Minimum encoder position, matched against the motor report.
    #[serde(rename = "minP")]
    pub min_encoder: i32,
    /// Maximum encoder position, matched against the motor report.
    #[serde(rename = "maxP")]
    pub max_encoder: i32,
    /// Minimum commanded position, microns.
    pub min_microns: i32,
    /// Maximum commanded position, microns.
    pub max_microns: i32,
    /// Nominal motor speed used to estimate move times.
    #[serde(default = "default_speed")]
    pub speed_microns_per_sec: f64,
    /// Position the `--center` move targets.
    #[serde(default)]
    pub home_position: i32,
    /// Default convergence tolerance, microns.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct TimeoutsConfig {
    /// Seconds to wait between pneumatic transition polls.
    pub pneumatics: f64,
    /// Seconds allowed for the controller sanity check.
    #[serde(default = "default_controller_timeout")]
    pub controller: f64,
}

/// A temperature setpoint: either a fixed value or the name of a parameter
/// in the CCD controller's active configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Setpoint {
    Fixed(f64),
    Parameter(String),
}

/// Alert thresholds for the sp2 spectrograph.
#[derive(Clone, Debug, Deserialize)]
pub struct Sp2AlertsConfig {
    pub r2_ccd_status_param: String,
    pub b2_ccd_status_param: String,
    pub r2_ln2_status_param: String,
    pub b2_ln2_status_param: String,
    pub r2_setpoint_param: Setpoint,
    pub b2_setpoint_param: Setpoint,
    pub ln2_base_temperature: Setpoint,
    pub ccd_temperature_max_increase: f64,
    pub ln2_temperature_max_increase: f64,
    /// Seconds between alert checks.
    #[serde(default = "default_alert_interval")]
    pub interval: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AlertsConfig {
    pub sp2: Sp2AlertsConfig,
}

/// The full configuration consumed by the core.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(rename = "specMech")]
    pub spec_mech: SpecMechConfig,
    pub timeouts: TimeoutsConfig,
    pub alerts: AlertsConfig,
}

fn default_port() -> u16 {
    23
}

fn default_speed() -> f64 {
    25.0
}

fn default_tolerance() -> f64 {
    2.0
}

fn default_controller_timeout() -> f64 {
    3.0
}

fn default_alert_interval() -> f64 {
    60.0
}
