// Actuation - boundary to the vehicle's flight primitives
//
// The flight machine never talks to a radio directly. It hands
// VehicleCommand values to an `Actuation` implementation and retries a
// rejected command exactly once before giving up.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::FlightError;

/// Estimated vehicle position in metres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One primitive understood by the vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum VehicleCommand {
    Takeoff {
        altitude_m: f32,
        duration_s: f32,
    },
    Land {
        altitude_m: f32,
        duration_s: f32,
    },
    GoTo {
        x: f32,
        y: f32,
        z: f32,
        yaw: f32,
        duration_s: f32,
    },
    RelativeMove {
        dx: f32,
        dy: f32,
        dz: f32,
        duration_s: f32,
    },
    Stop,
}

impl VehicleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            VehicleCommand::Takeoff { .. } => "takeoff",
            VehicleCommand::Land { .. } => "land",
            VehicleCommand::GoTo { .. } => "go_to",
            VehicleCommand::RelativeMove { .. } => "relative_move",
            VehicleCommand::Stop => "stop",
        }
    }
}

impl fmt::Display for VehicleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleCommand::Takeoff { altitude_m, .. } => write!(f, "takeoff({:.2} m)", altitude_m),
            VehicleCommand::Land { altitude_m, .. } => write!(f, "land({:.2} m)", altitude_m),
            VehicleCommand::GoTo { x, y, z, yaw, .. } => {
                write!(f, "go_to({:.2}, {:.2}, {:.2}, yaw {:.1})", x, y, z, yaw)
            }
            VehicleCommand::RelativeMove { dx, dy, dz, .. } => {
                write!(f, "relative_move({:+.2}, {:+.2}, {:+.2})", dx, dy, dz)
            }
            VehicleCommand::Stop => f.write_str("stop"),
        }
    }
}

/// Rejection reported by the vehicle link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuationFault {
    pub reason: String,
}

impl ActuationFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ActuationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Vehicle interface driven by the flight-control worker
///
/// Implementations must be `Send`: the actuator is moved onto the flight
/// thread and owned there exclusively.
pub trait Actuation: Send {
    /// Issue one command and wait for the vehicle to accept it
    fn execute(&mut self, command: &VehicleCommand) -> Result<(), ActuationFault>;

    /// Current position estimate
    fn position(&mut self) -> Result<Position, ActuationFault>;
}

/// Issue `command`, retrying once on rejection
///
/// # Returns
/// Number of attempts used (1 or 2)
pub fn execute_with_retry(
    actuator: &mut dyn Actuation,
    command: &VehicleCommand,
) -> Result<u32, FlightError> {
    match actuator.execute(command) {
        Ok(()) => Ok(1),
        Err(first) => {
            tracing::warn!(
                "[FlightMachine] {} rejected ({}), retrying once",
                command,
                first
            );
            actuator
                .execute(command)
                .map(|()| 2)
                .map_err(|second| FlightError::ActuationFailed {
                    command: command.to_string(),
                    reason: second.reason,
                })
        }
    }
}

/// Read the position estimate, retrying once on failure
pub fn position_with_retry(actuator: &mut dyn Actuation) -> Result<Position, FlightError> {
    actuator.position().or_else(|first| {
        tracing::warn!(
            "[FlightMachine] Position read failed ({}), retrying once",
            first
        );
        actuator
            .position()
            .map_err(|second| FlightError::PositionUnavailable {
                reason: second.reason,
            })
    })
}

#[derive(Debug, Default)]
struct RecorderState {
    commands: Vec<VehicleCommand>,
    position: Position,
    failing_commands: u32,
    failing_reads: u32,
}

/// Shared view of a [`RecordingActuator`]
///
/// Stays usable after the actuator itself has moved to the flight thread.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    state: Arc<Mutex<RecorderState>>,
}

impl CommandLog {
    /// Accepted commands, oldest first
    pub fn commands(&self) -> Vec<VehicleCommand> {
        self.state
            .lock()
            .map(|state| state.commands.clone())
            .unwrap_or_default()
    }

    /// Number of accepted commands with the given name
    pub fn count(&self, name: &str) -> usize {
        self.commands().iter().filter(|c| c.name() == name).count()
    }

    pub fn position(&self) -> Position {
        self.state
            .lock()
            .map(|state| state.position)
            .unwrap_or_default()
    }

    /// Place the simulated vehicle at `position`
    pub fn set_position(&self, position: Position) {
        if let Ok(mut state) = self.state.lock() {
            state.position = position;
        }
    }

    /// Reject the next `count` commands
    pub fn fail_next_commands(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_commands = count;
        }
    }

    /// Fail the next `count` position reads
    pub fn fail_next_reads(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_reads = count;
        }
    }
}

/// In-process vehicle that records accepted commands
///
/// Tracks a simulated position so captured waypoints and `go_to` targets
/// are observable without hardware.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    log: CommandLog,
}

impl RecordingActuator {
    pub fn new() -> (Self, CommandLog) {
        let log = CommandLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl Actuation for RecordingActuator {
    fn execute(&mut self, command: &VehicleCommand) -> Result<(), ActuationFault> {
        let mut state = self
            .log
            .state
            .lock()
            .map_err(|_| ActuationFault::new("recorder state poisoned"))?;
        if state.failing_commands > 0 {
            state.failing_commands -= 1;
            return Err(ActuationFault::new(format!("{} not acknowledged", command.name())));
        }

        match command {
            VehicleCommand::Takeoff { altitude_m, .. } => state.position.z = *altitude_m,
            VehicleCommand::Land { .. } => state.position.z = 0.0,
            VehicleCommand::GoTo { x, y, z, .. } => state.position = Position::new(*x, *y, *z),
            VehicleCommand::RelativeMove { dx, dy, dz, .. } => {
                state.position.x += dx;
                state.position.y += dy;
                state.position.z += dz;
            }
            VehicleCommand::Stop => {}
        }
        state.commands.push(command.clone());
        Ok(())
    }

    fn position(&mut self) -> Result<Position, ActuationFault> {
        let mut state = self
            .log
            .state
            .lock()
            .map_err(|_| ActuationFault::new("recorder state poisoned"))?;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(ActuationFault::new("no position estimate"));
        }
        Ok(state.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_single_rejection_is_retried() {
        let (mut actuator, log) = RecordingActuator::new();
        log.fail_next_commands(1);

        let attempts = execute_with_retry(&mut actuator, &VehicleCommand::Stop).unwrap();
        assert_eq!(attempts, 2);
        assert_eq!(log.commands(), vec![VehicleCommand::Stop]);
    }

    #[test]
    fn test_second_rejection_is_fatal() {
        let (mut actuator, log) = RecordingActuator::new();
        log.fail_next_commands(2);

        let command = VehicleCommand::Takeoff {
            altitude_m: 0.3,
            duration_s: 0.6,
        };
        let err = execute_with_retry(&mut actuator, &command).unwrap_err();
        assert_eq!(err.code(), 3002);
        assert!(!err.is_recoverable());
        assert!(log.commands().is_empty());
    }

    #[test]
    fn test_position_read_is_retried_once() {
        let (mut actuator, log) = RecordingActuator::new();
        log.set_position(Position::new(1.0, 2.0, 0.5));
        log.fail_next_reads(1);
        assert_eq!(
            position_with_retry(&mut actuator).unwrap(),
            Position::new(1.0, 2.0, 0.5)
        );

        log.fail_next_reads(2);
        assert!(matches!(
            position_with_retry(&mut actuator),
            Err(FlightError::PositionUnavailable { .. })
        ));
    }

    #[test]
    fn test_recorder_tracks_simulated_position() {
        let (mut actuator, log) = RecordingActuator::new();
        actuator
            .execute(&VehicleCommand::Takeoff {
                altitude_m: 0.3,
                duration_s: 0.6,
            })
            .unwrap();
        actuator
            .execute(&VehicleCommand::RelativeMove {
                dx: 0.1,
                dy: -0.1,
                dz: 0.0,
                duration_s: 0.1,
            })
            .unwrap();

        let position = log.position();
        assert!((position.x - 0.1).abs() < 1e-6);
        assert!((position.y + 0.1).abs() < 1e-6);
        assert!((position.z - 0.3).abs() < 1e-6);
        assert_eq!(log.count("takeoff"), 1);
    }

    #[test]
    fn test_command_serializes_with_tag() {
        let json = serde_json::to_string(&VehicleCommand::Stop).unwrap();
        assert_eq!(json, r#"{"command":"stop"}"#);
    }
}
