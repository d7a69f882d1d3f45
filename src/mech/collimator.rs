//! Collimator motor moves.

use std::time::Duration;

use specmech_types::{
    MechError, MotorAxis, MotorPositions, MotorStatus, ReplyCode, Status, StatusKind,
};

use crate::codec::MechCommand;
use crate::config::CollimatorConfig;

use super::MechCoordinator;

/// Extra settle time added to the estimated move duration.
pub const SETTLE_MARGIN: Duration = Duration::from_secs(2);

/// Gap between position polls after the settle sleep.
pub const POSITION_POLL_GAP: Duration = Duration::from_secs(3);

/// Number of position polls before the move is declared failed.
pub const MAX_POSITION_POLLS: usize = 2;

/// A requested collimator move.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveRequest {
    /// Position in microns: an offset, or an absolute target when
    /// `absolute` or `center` is set.
    pub position: i32,
    /// Move a single motor instead of all three.
    pub motor: Option<MotorAxis>,
    pub absolute: bool,
    /// Move all motors to the center position, ignoring `position`.
    pub center: bool,
    /// Target of a `center` move; defaults to the configured home position.
    pub center_position: Option<i32>,
    /// Convergence tolerance in microns; defaults to the configured value.
    pub tolerance: Option<f64>,
    /// Wait for the move to complete and verify convergence.
    pub wait: bool,
}

impl MoveRequest {
    pub fn offset(position: i32) -> Self {
        Self {
            position,
            motor: None,
            absolute: false,
            center: false,
            center_position: None,
            tolerance: None,
            wait: true,
        }
    }

    pub fn absolute(position: i32) -> Self {
        Self {
            absolute: true,
            ..Self::offset(position)
        }
    }
}

/// Computes the per-axis targets for a request, checking the micron range.
fn move_targets(
    current: [i32; 3],
    request: &MoveRequest,
    config: &CollimatorConfig,
) -> Result<[i32; 3], MechError> {
    let position = if request.center {
        request.center_position.unwrap_or(config.home_position)
    } else {
        request.position
    };
    let absolute = request.absolute || request.center;

    let mut targets = current;
    for (index, axis) in MotorAxis::ALL.iter().enumerate() {
        if request.motor.map_or(true, |motor| motor == *axis) {
            targets[index] = if absolute {
                position
            } else {
                current[index] + position
            };
        }
    }

    for (index, axis) in MotorAxis::ALL.iter().enumerate() {
        if targets[index] < config.min_microns || targets[index] > config.max_microns {
            return Err(MechError::OutOfRange {
                axis: *axis,
                position: targets[index],
                min: config.min_microns,
                max: config.max_microns,
            });
        }
    }

    Ok(targets)
}

/// Estimated move duration at the configured nominal speed.
fn move_time(current: [i32; 3], targets: [i32; 3], speed_microns_per_sec: f64) -> Duration {
    let max_travel = current
        .iter()
        .zip(targets.iter())
        .map(|(from, to)| (to - from).unsigned_abs())
        .max()
        .unwrap_or(0);

    Duration::from_secs_f64(max_travel as f64 / speed_microns_per_sec)
}

impl MechCoordinator {
    /// Moves the collimator motors.
    ///
    /// No wire command is issued unless every precondition holds: all three
    /// motors report successfully, are stopped, have no limit switch
    /// triggered, echo the configured encoder bounds, and every computed
    /// target lies within the allowed micron range.
    ///
    /// After the move command the coordinator sleeps the estimated move
    /// time plus a settle margin and then polls the positions, succeeding
    /// once every axis is within tolerance of its target.
    pub async fn collimator_move(&self, request: &MoveRequest) -> Result<MotorPositions, MechError> {
        let config = self.motors.clone();

        let mut current = [0i32; 3];
        for (index, axis) in MotorAxis::ALL.iter().enumerate() {
            let status = self.motor_status(*axis).await?;

            if status.speed != 0 {
                return Err(MechError::MotorBusy(*axis));
            }
            if status.limit_switch {
                return Err(MechError::LimitSwitch(*axis));
            }

            // Older firmware does not echo the encoder bounds; the check
            // only applies when they are present.
            if let (Some(min), Some(max)) = (status.min_position, status.max_position) {
                if min != config.min_encoder || max != config.max_encoder {
                    return Err(MechError::OutOfRange {
                        axis: *axis,
                        position: if min != config.min_encoder { min } else { max },
                        min: config.min_encoder,
                        max: config.max_encoder,
                    });
                }
            }

            current[index] = status.position;
        }

        let targets = move_targets(current, request, &config)?;

        let position = if request.center {
            request.center_position.unwrap_or(config.home_position)
        } else {
            request.position
        };

        match (request.motor, request.absolute || request.center) {
            (None, false) => {
                self.send_checked(MechCommand::MoveAll(position)).await?;
            }
            (None, true) => {
                for axis in MotorAxis::ALL {
                    self.send_checked(MechCommand::MoveAbsolute(axis, position))
                        .await?;
                }
            }
            (Some(axis), true) => {
                self.send_checked(MechCommand::MoveAbsolute(axis, position))
                    .await?;
            }
            (Some(axis), false) => {
                self.send_checked(MechCommand::MoveRelative(axis, position))
                    .await?;
            }
        }

        if !request.wait {
            return Ok(MotorPositions {
                a: targets[0],
                b: targets[1],
                c: targets[2],
            });
        }

        let settle = move_time(current, targets, config.speed_microns_per_sec) + SETTLE_MARGIN;
        tokio::time::sleep(settle).await;

        let tolerance = request.tolerance.unwrap_or(config.tolerance);
        let mut positions = MotorPositions { a: 0, b: 0, c: 0 };

        for attempt in 1..=MAX_POSITION_POLLS {
            positions = match self.client.get_stat(StatusKind::Motors).await? {
                Status::MotorPositions(positions) => positions,
                _ => return Err(MechError::Protocol(ReplyCode::Unparsable)),
            };

            let converged = positions
                .as_array()
                .iter()
                .zip(targets.iter())
                .all(|(position, target)| ((position - target).abs() as f64) <= tolerance);

            if converged {
                return Ok(positions);
            }

            if attempt < MAX_POSITION_POLLS {
                tokio::time::sleep(POSITION_POLL_GAP).await;
            }
        }

        Err(MechError::MoveDidNotConverge {
            positions: positions.as_array(),
            targets,
        })
    }

    async fn motor_status(&self, axis: MotorAxis) -> Result<MotorStatus, MechError> {
        match self.client.get_stat(StatusKind::Motor(axis)).await? {
            Status::Motor(status) => Ok(status),
            _ => Err(MechError::Protocol(ReplyCode::Unparsable)),
        }
    }
}
