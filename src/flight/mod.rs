// Flight module - command state machine and its control loop
//
// The flight-control worker interleaves two independent streams: validated
// gesture events from the classification worker and raw direct-control
// frames from the transport. Neither receive blocks, so a quiet gesture path
// never delays joystick input and vice versa. FIFO order holds within each
// stream.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::analysis::GestureMessage;
use crate::error::{log_flight_error, FlightError};
use crate::packet::DirectFrame;
use crate::telemetry::{Component, TelemetryHub, WorkerPhase};

pub mod actuation;
pub mod direct;
pub mod retraction;
pub mod state;
pub mod waypoints;

pub use actuation::{Actuation, CommandLog, Position, RecordingActuator, VehicleCommand};
pub use state::{FlightCommand, FlightState, FlightStateMachine, FlightStep};
pub use waypoints::{Waypoint, WaypointStack};

/// Why the control loop ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightExit {
    /// Both input channels closed and drained
    ChannelsClosed,
    /// Emergency land-and-stop from the direct-control stream
    EmergencyLand,
}

enum Poll<T> {
    Ready(T),
    Empty,
    Closed,
}

fn poll<T>(rx: &mut mpsc::Receiver<T>) -> Poll<T> {
    match rx.try_recv() {
        Ok(item) => Poll::Ready(item),
        Err(TryRecvError::Empty) => Poll::Empty,
        Err(TryRecvError::Disconnected) => Poll::Closed,
    }
}

struct FlightWorker {
    gesture_rx: mpsc::Receiver<GestureMessage>,
    direct_rx: mpsc::Receiver<DirectFrame>,
    machine: FlightStateMachine,
    poll_interval: Duration,
    telemetry: Arc<TelemetryHub>,
}

impl FlightWorker {
    fn run(mut self) -> Result<FlightExit, FlightError> {
        tracing::info!("[FlightThread] Starting control loop");
        self.telemetry
            .record_worker_phase(Component::FlightControl, WorkerPhase::Started);

        match self.control_loop() {
            Ok(exit) => {
                tracing::info!("[FlightThread] Stopped: {:?}", exit);
                self.telemetry
                    .record_worker_phase(Component::FlightControl, WorkerPhase::Stopped);
                Ok(exit)
            }
            Err(err) => {
                let context = format!("FlightThread/{}", self.machine.state());
                log_flight_error(&err, &context);
                self.telemetry
                    .record_error(Component::FlightControl, &err, &context);
                self.telemetry
                    .record_worker_phase(Component::FlightControl, WorkerPhase::Failed);
                Err(err)
            }
        }
    }

    fn control_loop(&mut self) -> Result<FlightExit, FlightError> {
        loop {
            let mut idle = true;

            let gesture_closed = match poll(&mut self.gesture_rx) {
                Poll::Ready(message) => {
                    idle = false;
                    if self.machine.handle_gesture(&message)? == FlightStep::Halt {
                        return Ok(FlightExit::EmergencyLand);
                    }
                    false
                }
                Poll::Empty => false,
                Poll::Closed => true,
            };

            let direct_closed = match poll(&mut self.direct_rx) {
                Poll::Ready(frame) => {
                    idle = false;
                    if self.machine.handle_direct(&frame)? == FlightStep::Halt {
                        return Ok(FlightExit::EmergencyLand);
                    }
                    false
                }
                Poll::Empty => false,
                Poll::Closed => true,
            };

            if gesture_closed && direct_closed {
                return Ok(FlightExit::ChannelsClosed);
            }
            if idle {
                thread::sleep(self.poll_interval);
            }
        }
    }
}

/// Spawn the flight-control worker on its own thread
pub fn spawn_flight_thread(
    gesture_rx: mpsc::Receiver<GestureMessage>,
    direct_rx: mpsc::Receiver<DirectFrame>,
    machine: FlightStateMachine,
    poll_interval: Duration,
    telemetry: Arc<TelemetryHub>,
) -> JoinHandle<Result<FlightExit, FlightError>> {
    thread::spawn(move || {
        FlightWorker {
            gesture_rx,
            direct_rx,
            machine,
            poll_interval,
            telemetry,
        }
        .run()
    })
}
