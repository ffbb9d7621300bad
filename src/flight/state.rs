// FlightStateMachine - validated gestures and joystick frames to vehicle commands
//
// GestureMode is the hub. A validated gesture moves the machine into its
// transient state (Start, Land, WpNext, WpBack), performs the action and
// returns to GestureMode whatever the outcome. Advisory events (early, none,
// end) never act. Direct-control frames bypass the gesture states entirely.
//
// Empty-stack waypoint operations are absorbed with a warning. A command
// the vehicle rejects twice is returned as an error and ends the loop.

use std::fmt;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::analysis::{GestureLabel, GestureMessage};
use crate::config::FlightConfig;
use crate::error::{log_flight_error, FlightError};
use crate::flight::actuation::{execute_with_retry, position_with_retry, Actuation, VehicleCommand};
use crate::flight::direct::{DirectAction, DirectControlOverlay, EMERGENCY_BUTTON};
use crate::flight::retraction::{retraction_base, RetractionOutcome, RetractionTracker};
use crate::flight::waypoints::{Waypoint, WaypointStack};
use crate::packet::DirectFrame;
use crate::telemetry::{Component, TelemetryHub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightState {
    GestureMode,
    Start,
    Land,
    WpNext,
    WpBack,
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightState::GestureMode => "GestureMode",
            FlightState::Start => "Start",
            FlightState::Land => "Land",
            FlightState::WpNext => "WpNext",
            FlightState::WpBack => "WpBack",
        };
        f.write_str(name)
    }
}

/// Gesture vocabulary understood by the flight machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightCommand {
    Start,
    Land,
    WpSet,
    WpDel,
    WpNext,
    WpBack,
    /// Release of a previous gesture, e.g. `startR`
    Retraction,
}

impl FlightCommand {
    /// `None` for labels outside the vocabulary
    pub fn from_label(label: &GestureLabel) -> Option<Self> {
        let GestureLabel::Gesture(name) = label else {
            return None;
        };
        match name.as_str() {
            "start" => Some(FlightCommand::Start),
            "land" => Some(FlightCommand::Land),
            "wp_set" => Some(FlightCommand::WpSet),
            "wp_del" => Some(FlightCommand::WpDel),
            "wp_next" => Some(FlightCommand::WpNext),
            "wp_back" => Some(FlightCommand::WpBack),
            other => retraction_base(other).map(|_| FlightCommand::Retraction),
        }
    }

    /// Transient state entered while the command runs
    pub fn transient_state(&self) -> FlightState {
        match self {
            FlightCommand::Start => FlightState::Start,
            FlightCommand::Land => FlightState::Land,
            FlightCommand::WpNext => FlightState::WpNext,
            FlightCommand::WpBack => FlightState::WpBack,
            FlightCommand::WpSet | FlightCommand::WpDel | FlightCommand::Retraction => {
                FlightState::GestureMode
            }
        }
    }
}

/// Whether the control loop keeps running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightStep {
    Continue,
    /// Emergency land-and-stop completed
    Halt,
}

/// Flight command state owned by the flight-control worker
pub struct FlightStateMachine {
    actuator: Box<dyn Actuation>,
    config: FlightConfig,
    telemetry: Arc<TelemetryHub>,
    state: FlightState,
    waypoints: WaypointStack,
    overlay: DirectControlOverlay,
    retraction: RetractionTracker,
    landed: bool,
}

impl FlightStateMachine {
    /// The vehicle is assumed to start on the ground
    pub fn new(
        actuator: Box<dyn Actuation>,
        config: FlightConfig,
        telemetry: Arc<TelemetryHub>,
    ) -> Self {
        Self {
            overlay: DirectControlOverlay::new(config.direct_step_m),
            actuator,
            config,
            telemetry,
            state: FlightState::GestureMode,
            waypoints: WaypointStack::new(),
            retraction: RetractionTracker::new(),
            landed: true,
        }
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn waypoints(&self) -> &WaypointStack {
        &self.waypoints
    }

    pub fn is_landed(&self) -> bool {
        self.landed
    }

    /// Act on one event from the gesture channel
    pub fn handle_gesture(&mut self, message: &GestureMessage) -> Result<FlightStep, FlightError> {
        let event = &message.event;
        if !event.is_validated() {
            tracing::trace!(
                "[FlightMachine] {}: advisory {:?} {} ignored",
                self.state,
                event.stage,
                event.label
            );
            return Ok(FlightStep::Continue);
        }

        let Some(command) = FlightCommand::from_label(&event.label) else {
            tracing::debug!(
                "[FlightMachine] {}: unrecognized gesture {} ignored",
                self.state,
                event.label
            );
            return Ok(FlightStep::Continue);
        };

        let outcome = self.retraction.observe(event.label.as_str());
        if command == FlightCommand::Retraction {
            match outcome {
                RetractionOutcome::Paired { gesture } => {
                    tracing::debug!("[FlightMachine] {} released", gesture)
                }
                _ => tracing::debug!(
                    "[FlightMachine] {} without a matching gesture",
                    event.label
                ),
            }
            self.state = FlightState::GestureMode;
            return Ok(FlightStep::Continue);
        }

        self.state = command.transient_state();
        tracing::info!("[FlightMachine] {}: {}", self.state, event.label);
        let result = self.perform(&command);
        self.state = FlightState::GestureMode;

        self.absorb_state_error(result, event.label.as_str())
            .map(|()| FlightStep::Continue)
    }

    /// Act on one frame from the direct-control channel
    pub fn handle_direct(&mut self, frame: &DirectFrame) -> Result<FlightStep, FlightError> {
        if self.landed
            && self.config.direct_auto_takeoff
            && !frame.buttons.pressed(EMERGENCY_BUTTON)
        {
            tracing::info!("[FlightMachine] Direct control while landed, taking off");
            self.take_off()?;
        }

        for action in self.overlay.interpret(frame) {
            match action {
                DirectAction::Move { dx, dy, dz } => {
                    self.issue(VehicleCommand::RelativeMove {
                        dx,
                        dy,
                        dz,
                        duration_s: self.config.direct_move_duration_s,
                    })?;
                }
                DirectAction::EmergencyLand => {
                    tracing::warn!("[FlightMachine] Emergency land requested, stopping loop");
                    self.issue(VehicleCommand::Land {
                        altitude_m: self.config.land_altitude_m,
                        duration_s: self.config.land_duration_s,
                    })?;
                    self.issue(VehicleCommand::Stop)?;
                    self.landed = true;
                    return Ok(FlightStep::Halt);
                }
            }
        }
        Ok(FlightStep::Continue)
    }

    fn perform(&mut self, command: &FlightCommand) -> Result<(), FlightError> {
        match command {
            FlightCommand::Start => self.take_off(),
            FlightCommand::Land => {
                self.issue(VehicleCommand::Land {
                    altitude_m: self.config.land_altitude_m,
                    duration_s: self.config.land_duration_s,
                })?;
                // Blocks the flight loop, so the emergency button is not polled
                // until the settle delay has passed
                thread::sleep(self.config.land_settle());
                self.issue(VehicleCommand::Stop)?;
                self.landed = true;
                Ok(())
            }
            FlightCommand::WpSet => {
                let position = position_with_retry(self.actuator.as_mut())?;
                self.waypoints.push(Waypoint::from(position));
                tracing::info!(
                    "[FlightMachine] Waypoint {} set at ({:.2}, {:.2}, {:.2})",
                    self.waypoints.cursor(),
                    position.x,
                    position.y,
                    position.z
                );
                Ok(())
            }
            FlightCommand::WpDel => {
                self.waypoints.pop()?;
                tracing::info!(
                    "[FlightMachine] Waypoint deleted, {} left",
                    self.waypoints.len()
                );
                Ok(())
            }
            FlightCommand::WpNext => {
                let waypoint = self.waypoints.advance()?;
                self.go_to(waypoint)
            }
            FlightCommand::WpBack => {
                let waypoint = self.waypoints.retreat()?;
                self.go_to(waypoint)
            }
            FlightCommand::Retraction => Ok(()),
        }
    }

    fn take_off(&mut self) -> Result<(), FlightError> {
        self.issue(VehicleCommand::Takeoff {
            altitude_m: self.config.takeoff_altitude_m,
            duration_s: self.config.takeoff_duration_s,
        })?;
        self.landed = false;
        Ok(())
    }

    fn go_to(&mut self, waypoint: Waypoint) -> Result<(), FlightError> {
        self.issue(VehicleCommand::GoTo {
            x: waypoint.x,
            y: waypoint.y,
            z: waypoint.z,
            yaw: waypoint.yaw,
            duration_s: self.config.goto_duration_s,
        })
    }

    fn issue(&mut self, command: VehicleCommand) -> Result<(), FlightError> {
        let attempts = execute_with_retry(self.actuator.as_mut(), &command)?;
        tracing::debug!("[FlightMachine] {} accepted", command);
        self.telemetry.record_command(command.name(), attempts);
        Ok(())
    }

    fn absorb_state_error(
        &self,
        result: Result<(), FlightError>,
        label: &str,
    ) -> Result<(), FlightError> {
        match result {
            Err(err) if err.is_recoverable() => {
                let context = format!("FlightMachine/{}", label);
                log_flight_error(&err, &context);
                self.telemetry
                    .record_warning(Component::FlightControl, err.to_string());
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
