// Analysis module - windowed two-stage gesture classification
//
// This module turns the ordered stream of decoded motion samples into
// debounced gesture events for the flight-control worker.
//
// Architecture:
// - ClassificationThread: blocking loop over the sample channel, one tick
//   per sample, strictly in arrival order
// - Pipeline: WindowBuffer → ClassifierBank (early / validation) →
//   GestureStateMachine
// - Output: non-idle GestureMessage values on the gesture channel

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::error::{log_classification_error, ClassificationError};
use crate::packet::Sample;
use crate::telemetry::{Component, TelemetryHub, WorkerPhase};

pub mod classifier;
pub mod gesture;
pub mod label;
pub mod model;
pub mod window;

pub use classifier::{ClassifierBank, ClassifierSet, OneVsRestModel, UNKNOWN_CLASS};
pub use gesture::{GesturePhase, GestureStateMachine};
pub use label::{GestureLabel, GestureMessage, PredictionEvent, PredictionStage};
pub use model::{load_classifier_bank, MlpModel};
pub use window::{WindowBuffer, WindowConfig};

struct ClassificationWorker {
    sample_rx: mpsc::Receiver<Sample>,
    gesture_tx: mpsc::Sender<GestureMessage>,
    machine: GestureStateMachine,
    telemetry: Arc<TelemetryHub>,
    processed_samples: u64,
    emitted_events: u64,
}

impl ClassificationWorker {
    fn new(
        sample_rx: mpsc::Receiver<Sample>,
        gesture_tx: mpsc::Sender<GestureMessage>,
        machine: GestureStateMachine,
        telemetry: Arc<TelemetryHub>,
    ) -> Self {
        Self {
            sample_rx,
            gesture_tx,
            machine,
            telemetry,
            processed_samples: 0,
            emitted_events: 0,
        }
    }

    fn run(mut self) -> Result<(), ClassificationError> {
        tracing::info!("[ClassificationThread] Starting classification loop");
        self.telemetry
            .record_worker_phase(Component::Classification, WorkerPhase::Started);

        // Runs until every sample sender is dropped
        while let Some(sample) = self.sample_rx.blocking_recv() {
            self.processed_samples += 1;
            let phase = self.machine.phase();

            match self.machine.on_sample(&sample) {
                Ok(event) if event.is_idle() => {}
                Ok(event) => {
                    self.telemetry.record_gesture(&event);
                    self.emitted_events += 1;
                    let message = GestureMessage {
                        event,
                        buttons: sample.buttons,
                    };
                    if self.gesture_tx.blocking_send(message).is_err() {
                        tracing::info!(
                            "[ClassificationThread] Gesture receiver dropped, exiting"
                        );
                        break;
                    }
                }
                Err(err) => {
                    let context = format!("ClassificationThread/{}", phase);
                    log_classification_error(&err, &context);
                    self.telemetry
                        .record_error(Component::Classification, &err, &context);
                    if err.is_fatal() {
                        self.telemetry
                            .record_worker_phase(Component::Classification, WorkerPhase::Failed);
                        return Err(err);
                    }
                }
            }
        }

        tracing::info!(
            "[ClassificationThread] Stopped after {} samples, {} events",
            self.processed_samples,
            self.emitted_events
        );
        self.telemetry
            .record_worker_phase(Component::Classification, WorkerPhase::Stopped);
        Ok(())
    }
}

/// Spawn the classification worker on its own thread
///
/// The handle yields the fatal configuration error that stopped the worker,
/// or `Ok(())` once the sample channel closed.
pub fn spawn_classification_thread(
    sample_rx: mpsc::Receiver<Sample>,
    gesture_tx: mpsc::Sender<GestureMessage>,
    machine: GestureStateMachine,
    telemetry: Arc<TelemetryHub>,
) -> JoinHandle<Result<(), ClassificationError>> {
    thread::spawn(move || {
        ClassificationWorker::new(sample_rx, gesture_tx, machine, telemetry).run()
    })
}

#[cfg(test)]
mod tests;
