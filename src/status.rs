//! Conversion of reply sentences into typed status records.
//!
//! The report sentences interleave values with unit or placeholder fields;
//! the field positions below follow the controller's layout. Decoding is
//! pure so it can be tested without a connection; [`MechClient::get_stat`]
//! composes the report command, the reply check, and the decode.

use std::time::Duration;

use specmech_types::{
    AirState, EnvironmentStatus, Ln2Status, MechError, MechReply, MotorAxis, MotorPositions,
    MotorStatus, OrientationStatus, PneumaticState, PneumaticsStatus, ReplyCode, Sentence,
    SentenceTag, SpecMechStatus, Status, StatusKind, ThermistorState, TimeStatus, VacuumStatus,
    ValveState, VersionStatus,
};

use crate::client::MechClient;
use crate::codec::MechCommand;

impl MechClient {
    /// Issues the report command for `kind` and returns the typed record.
    pub async fn get_stat(&self, kind: StatusKind) -> Result<Status, MechError> {
        self.get_stat_with_timeout(kind, None).await
    }

    pub async fn get_stat_with_timeout(
        &self,
        kind: StatusKind,
        timeout: Option<Duration>,
    ) -> Result<Status, MechError> {
        let reply = self.send(MechCommand::Report(kind), timeout).await;

        if let Some(error) = MechError::from_reply(&reply) {
            return Err(error);
        }

        decode_status(kind, &reply)
    }
}

/// Decodes the data sentences of `reply` into the record for `kind`.
pub fn decode_status(kind: StatusKind, reply: &MechReply) -> Result<Status, MechError> {
    match kind {
        StatusKind::Time => {
            let sentence = data_sentence(reply, SentenceTag::Tim)?;
            Ok(Status::Time(TimeStatus {
                boot_time: sentence.field(3).to_string(),
                clock_time: sentence.field(0).to_string(),
                set_time: sentence.field(1).to_string(),
            }))
        }

        StatusKind::Version => {
            let sentence = data_sentence(reply, SentenceTag::Ver)?;
            Ok(Status::Version(VersionStatus {
                version: sentence.field(1).to_string(),
            }))
        }

        StatusKind::Environment => {
            let sentence = data_sentence(reply, SentenceTag::Env)?;
            Ok(Status::Environment(EnvironmentStatus {
                temperature0: float_field(sentence, 1)?,
                humidity0: float_field(sentence, 3)?,
                temperature1: float_field(sentence, 5)?,
                humidity1: float_field(sentence, 7)?,
                temperature2: float_field(sentence, 9)?,
                humidity2: float_field(sentence, 11)?,
                specmech_temperature: float_field(sentence, 13)?,
            }))
        }

        StatusKind::Vacuum => {
            let sentence = data_sentence(reply, SentenceTag::Vac)?;
            Ok(Status::Vacuum(VacuumStatus {
                red_dewar: float_field(sentence, 1)?,
                blue_dewar: float_field(sentence, 3)?,
            }))
        }

        StatusKind::Motors => {
            let mut positions = MotorPositions { a: 0, b: 0, c: 0 };
            let mut seen = 0;

            for sentence in reply.data() {
                if sentence.tag != SentenceTag::Mtr {
                    return Err(MechError::Protocol(ReplyCode::Unparsable));
                }

                let axis = axis_field(sentence, 1)?;
                let position = int_field(sentence, 2)?;
                match axis {
                    MotorAxis::A => positions.a = position,
                    MotorAxis::B => positions.b = position,
                    MotorAxis::C => positions.c = position,
                }
                seen += 1;
            }

            if seen != 3 {
                return Err(MechError::Protocol(ReplyCode::Unparsable));
            }

            Ok(Status::MotorPositions(positions))
        }

        StatusKind::Motor(_) => {
            let sentence = data_sentence(reply, SentenceTag::Mtr)?;
            Ok(Status::Motor(MotorStatus {
                axis: axis_field(sentence, 1)?,
                position: int_field(sentence, 2)?,
                speed: int_field(sentence, 4)?,
                current: int_field(sentence, 6)?,
                direction: sentence.field(8).to_string(),
                limit_switch: sentence.field(10) == "Y",
                min_position: optional_int_field(sentence, 12)?,
                max_position: optional_int_field(sentence, 14)?,
            }))
        }

        StatusKind::Orientation => {
            let sentence = data_sentence(reply, SentenceTag::Ori)?;
            Ok(Status::Orientation(OrientationStatus {
                x: float_field(sentence, 1)?,
                y: float_field(sentence, 2)?,
                z: float_field(sentence, 3)?,
            }))
        }

        StatusKind::Pneumatics => {
            let sentence = data_sentence(reply, SentenceTag::Pnu)?;
            Ok(Status::Pneumatics(PneumaticsStatus {
                shutter: PneumaticState::from_wire(sentence.field(1)),
                hartmann_left: PneumaticState::from_wire(sentence.field(3)),
                hartmann_right: PneumaticState::from_wire(sentence.field(5)),
                air_pressure: AirState::from_wire(sentence.field(7)),
            }))
        }

        StatusKind::SpecMech => {
            let sentence = data_sentence(reply, SentenceTag::S2)?;
            Ok(Status::SpecMech(SpecMechStatus {
                fan_on: int_field(sentence, 1)? != 0,
                power_supply_volts: float_field(sentence, 3)?,
            }))
        }

        StatusKind::Nitrogen => {
            let sentence = data_sentence(reply, SentenceTag::Ln2)?;

            let valves: Vec<ValveState> = sentence
                .field(1)
                .chars()
                .map(ValveState::from_wire)
                .collect();
            if valves.len() != 4 {
                return Err(invalid_field(sentence, 1));
            }

            Ok(Status::Nitrogen(Ln2Status {
                buffer_dewar_supply: valves[0],
                buffer_dewar_vent: valves[1],
                red_dewar_vent: valves[2],
                blue_dewar_vent: valves[3],
                time_next_fill: int_field(sentence, 2)? as i64,
                max_valve_open_time: int_field(sentence, 4)? as i64,
                fill_interval: int_field(sentence, 6)? as i64,
                ln2_pressure: int_field(sentence, 8)? as i64,
                buffer_dewar_thermistor: ThermistorState::from_wire(sentence.field(10)),
                red_dewar_thermistor: ThermistorState::from_wire(sentence.field(12)),
                blue_dewar_thermistor: ThermistorState::from_wire(sentence.field(14)),
            }))
        }
    }
}

fn data_sentence(reply: &MechReply, tag: SentenceTag) -> Result<&Sentence, MechError> {
    match reply.first_data() {
        Some(sentence) if sentence.tag == tag => Ok(sentence),
        _ => Err(MechError::Protocol(ReplyCode::Unparsable)),
    }
}

fn invalid_field(sentence: &Sentence, index: usize) -> MechError {
    MechError::InvalidField {
        tag: sentence.tag,
        index,
        value: sentence.field(index).to_string(),
    }
}

fn float_field(sentence: &Sentence, index: usize) -> Result<f64, MechError> {
    sentence
        .field(index)
        .parse()
        .map_err(|_| invalid_field(sentence, index))
}

fn int_field(sentence: &Sentence, index: usize) -> Result<i32, MechError> {
    sentence
        .field(index)
        .parse()
        .map_err(|_| invalid_field(sentence, index))
}

fn optional_int_field(sentence: &Sentence, index: usize) -> Result<Option<i32>, MechError> {
    match sentence.fields.get(index) {
        None => Ok(None),
        Some(field) if field.is_empty() => Ok(None),
        Some(_) => int_field(sentence, index).map(Some),
    }
}

fn axis_field(sentence: &Sentence, index: usize) -> Result<MotorAxis, MechError> {
    sentence
        .field(index)
        .parse()
        .map_err(|_| invalid_field(sentence, index))
}
