//! Typed records decoded from specMech report replies.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Serialize;

/// A pneumatic mechanism: the shutter or one of the Hartmann doors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    Shutter,
    Left,
    Right,
}

impl Mechanism {
    pub const ALL: [Mechanism; 3] = [Mechanism::Shutter, Mechanism::Left, Mechanism::Right];

    /// The keyword under which this mechanism's state is reported.
    pub fn keyword(&self) -> &'static str {
        match self {
            Mechanism::Shutter => "shutter",
            Mechanism::Left => "hartmann_left",
            Mechanism::Right => "hartmann_right",
        }
    }
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Mechanism::Shutter => write!(f, "shutter"),
            Mechanism::Left => write!(f, "left"),
            Mechanism::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Mechanism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shutter" => Ok(Mechanism::Shutter),
            "left" => Ok(Mechanism::Left),
            "right" => Ok(Mechanism::Right),
            other => Err(other.to_string()),
        }
    }
}

/// State of a pneumatic mechanism.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PneumaticState {
    Open,
    Closed,
    Transitioning,
}

impl PneumaticState {
    /// Maps the raw status character: `c` is closed, `o` is open, anything
    /// else means the mechanism is in transit.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "c" => PneumaticState::Closed,
            "o" => PneumaticState::Open,
            _ => PneumaticState::Transitioning,
        }
    }
}

impl Display for PneumaticState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PneumaticState::Open => write!(f, "open"),
            PneumaticState::Closed => write!(f, "closed"),
            PneumaticState::Transitioning => write!(f, "transitioning"),
        }
    }
}

/// State of the pneumatics air supply.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AirState {
    On,
    Off,
}

impl AirState {
    pub fn from_wire(value: &str) -> Self {
        if value == "0" {
            AirState::Off
        } else {
            AirState::On
        }
    }
}

impl Display for AirState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            AirState::On => write!(f, "on"),
            AirState::Off => write!(f, "off"),
        }
    }
}

/// One of the three collimator motor axes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorAxis {
    A,
    B,
    C,
}

impl MotorAxis {
    pub const ALL: [MotorAxis; 3] = [MotorAxis::A, MotorAxis::B, MotorAxis::C];

    /// The lowercase wire letter for this axis.
    pub fn to_wire(&self) -> char {
        match self {
            MotorAxis::A => 'a',
            MotorAxis::B => 'b',
            MotorAxis::C => 'c',
        }
    }
}

impl Display for MotorAxis {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

impl FromStr for MotorAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Ok(MotorAxis::A),
            "b" => Ok(MotorAxis::B),
            "c" => Ok(MotorAxis::C),
            other => Err(other.to_string()),
        }
    }
}

/// State of an LN2 fill/vent valve.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValveState {
    Closed,
    Open,
    Timeout,
    Disabled,
    Unknown,
}

impl ValveState {
    pub fn from_wire(value: char) -> Self {
        match value.to_ascii_uppercase() {
            'C' => ValveState::Closed,
            'O' => ValveState::Open,
            'T' => ValveState::Timeout,
            'X' => ValveState::Disabled,
            _ => ValveState::Unknown,
        }
    }
}

/// State of a dewar thermistor.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermistorState {
    Cold,
    Warm,
    Unknown,
}

impl ThermistorState {
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "C" => ThermistorState::Cold,
            "H" => ThermistorState::Warm,
            _ => ThermistorState::Unknown,
        }
    }
}

/// Controller clock report (`rt`).
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct TimeStatus {
    pub boot_time: String,
    pub clock_time: String,
    pub set_time: String,
}

/// Firmware version report (`rV`).
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct VersionStatus {
    pub version: String,
}

/// Environment report (`re`): three temperature/humidity sensor pairs plus
/// the specMech board temperature.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EnvironmentStatus {
    pub temperature0: f64,
    pub humidity0: f64,
    pub temperature1: f64,
    pub humidity1: f64,
    pub temperature2: f64,
    pub humidity2: f64,
    pub specmech_temperature: f64,
}

/// Dewar vacuum report (`rv`), both values in log10(Pa).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VacuumStatus {
    pub red_dewar: f64,
    pub blue_dewar: f64,
}

/// Positions of the three collimator motors (`rd`), in microns.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct MotorPositions {
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

impl MotorPositions {
    pub fn get(&self, axis: MotorAxis) -> i32 {
        match axis {
            MotorAxis::A => self.a,
            MotorAxis::B => self.b,
            MotorAxis::C => self.c,
        }
    }

    pub fn as_array(&self) -> [i32; 3] {
        [self.a, self.b, self.c]
    }
}

/// Single-motor report (`ra`/`rb`/`rc`).
///
/// The encoder bounds are echoed by some firmware revisions; they are `None`
/// when the sentence does not carry them.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct MotorStatus {
    pub axis: MotorAxis,
    pub position: i32,
    pub speed: i32,
    pub current: i32,
    pub direction: String,
    pub limit_switch: bool,
    pub min_position: Option<i32>,
    pub max_position: Option<i32>,
}

/// Accelerometer orientation report (`ro`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OrientationStatus {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Pneumatics report (`rp`).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct PneumaticsStatus {
    pub shutter: PneumaticState,
    pub hartmann_left: PneumaticState,
    pub hartmann_right: PneumaticState,
    pub air_pressure: AirState,
}

impl PneumaticsStatus {
    pub fn get(&self, mechanism: Mechanism) -> PneumaticState {
        match mechanism {
            Mechanism::Shutter => self.shutter,
            Mechanism::Left => self.hartmann_left,
            Mechanism::Right => self.hartmann_right,
        }
    }
}

/// Internal specMech status report (`rs`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SpecMechStatus {
    pub fan_on: bool,
    pub power_supply_volts: f64,
}

/// Liquid nitrogen system report (`rn`).
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct Ln2Status {
    pub buffer_dewar_supply: ValveState,
    pub buffer_dewar_vent: ValveState,
    pub red_dewar_vent: ValveState,
    pub blue_dewar_vent: ValveState,
    pub time_next_fill: i64,
    pub max_valve_open_time: i64,
    pub fill_interval: i64,
    pub ln2_pressure: i64,
    pub buffer_dewar_thermistor: ThermistorState,
    pub red_dewar_thermistor: ThermistorState,
    pub blue_dewar_thermistor: ThermistorState,
}

/// The report kinds accepted by the status command.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StatusKind {
    Time,
    Version,
    Environment,
    Vacuum,
    Motors,
    Motor(MotorAxis),
    Orientation,
    Pneumatics,
    SpecMech,
    Nitrogen,
}

impl StatusKind {
    /// The wire report command for this kind.
    pub fn wire_command(&self) -> String {
        match self {
            StatusKind::Time => "rt".to_string(),
            StatusKind::Version => "rV".to_string(),
            StatusKind::Environment => "re".to_string(),
            StatusKind::Vacuum => "rv".to_string(),
            StatusKind::Motors => "rd".to_string(),
            StatusKind::Motor(axis) => format!("r{}", axis.to_wire()),
            StatusKind::Orientation => "ro".to_string(),
            StatusKind::Pneumatics => "rp".to_string(),
            StatusKind::SpecMech => "rs".to_string(),
            StatusKind::Nitrogen => "rn".to_string(),
        }
    }
}

impl Display for StatusKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            StatusKind::Time => write!(f, "time"),
            StatusKind::Version => write!(f, "version"),
            StatusKind::Environment => write!(f, "environment"),
            StatusKind::Vacuum => write!(f, "vacuum"),
            StatusKind::Motors => write!(f, "motors"),
            StatusKind::Motor(axis) => write!(f, "motor-{}", axis),
            StatusKind::Orientation => write!(f, "orientation"),
            StatusKind::Pneumatics => write!(f, "pneumatics"),
            StatusKind::SpecMech => write!(f, "specmech"),
            StatusKind::Nitrogen => write!(f, "nitrogen"),
        }
    }
}

impl FromStr for StatusKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "time" => Ok(StatusKind::Time),
            "version" => Ok(StatusKind::Version),
            "environment" => Ok(StatusKind::Environment),
            "vacuum" => Ok(StatusKind::Vacuum),
            "motors" => Ok(StatusKind::Motors),
            "motor-a" => Ok(StatusKind::Motor(MotorAxis::A)),
            "motor-b" => Ok(StatusKind::Motor(MotorAxis::B)),
            "motor-c" => Ok(StatusKind::Motor(MotorAxis::C)),
            "orientation" => Ok(StatusKind::Orientation),
            "pneumatics" => Ok(StatusKind::Pneumatics),
            "specmech" => Ok(StatusKind::SpecMech),
            "nitrogen" => Ok(StatusKind::Nitrogen),
            other => Err(other.to_string()),
        }
    }
}

/// A typed status record, one variant per report kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Status {
    Time(TimeStatus),
    Version(VersionStatus),
    Environment(EnvironmentStatus),
    Vacuum(VacuumStatus),
    MotorPositions(MotorPositions),
    Motor(MotorStatus),
    Orientation(OrientationStatus),
    Pneumatics(PneumaticsStatus),
    SpecMech(SpecMechStatus),
    Nitrogen(Ln2Status),
}
