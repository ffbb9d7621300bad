//! Pipeline wiring between the transport, the classification worker and the
//! flight-control worker.
//!
//! ```text
//! transport ──raw──▶ classification ──gesture──▶ flight control ──▶ vehicle
//!     └─────────────────direct──────────────────────▲
//! ```
//!
//! All three channels are bounded MPSC queues. Producers block when a queue
//! is full, so the transport is throttled to the speed of the slowest stage
//! instead of dropping samples.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use crate::analysis::{
    spawn_classification_thread, ClassifierBank, GestureLabel, GestureMessage,
    GestureStateMachine, PredictionEvent, PredictionStage,
};
use crate::config::{AppConfig, ChannelConfig};
use crate::error::{
    log_decode_error, log_pipeline_error, ClassificationError, DecodeError, FlightError,
    PipelineError,
};
use crate::flight::{spawn_flight_thread, Actuation, FlightExit, FlightStateMachine};
use crate::packet::{decode_with_deadzone, peek_mode, ButtonState, DirectFrame, Packet, Sample};
use crate::telemetry::{Component, TelemetryHub, TelemetrySnapshot};

/// Both ends of the three pipeline channels
pub struct PipelineChannels {
    pub sample_tx: mpsc::Sender<Sample>,
    pub sample_rx: mpsc::Receiver<Sample>,
    pub gesture_tx: mpsc::Sender<GestureMessage>,
    pub gesture_rx: mpsc::Receiver<GestureMessage>,
    pub direct_tx: mpsc::Sender<DirectFrame>,
    pub direct_rx: mpsc::Receiver<DirectFrame>,
}

impl PipelineChannels {
    pub fn new(config: &ChannelConfig) -> Self {
        let (sample_tx, sample_rx) = mpsc::channel(config.raw_capacity.max(1));
        let (gesture_tx, gesture_rx) = mpsc::channel(config.gesture_capacity.max(1));
        let (direct_tx, direct_rx) = mpsc::channel(config.direct_capacity.max(1));
        Self {
            sample_tx,
            sample_rx,
            gesture_tx,
            gesture_rx,
            direct_tx,
            direct_rx,
        }
    }
}

/// Producer side of a running pipeline
///
/// Cheap to clone; every clone is an independent producer. The submit
/// operations block while the target channel is full and must not be
/// called from inside an async runtime.
#[derive(Clone)]
pub struct PipelineInput {
    sample_tx: mpsc::Sender<Sample>,
    gesture_tx: mpsc::Sender<GestureMessage>,
    direct_tx: mpsc::Sender<DirectFrame>,
    deadzone: f32,
    telemetry: Arc<TelemetryHub>,
}

impl PipelineInput {
    /// Decode one envelope and route it by mode byte
    pub fn submit_packet(&self, bytes: &[u8]) -> Result<(), PipelineError> {
        match self.decode(bytes, "submit_packet")? {
            Packet::Motion(sample) => self.send_sample(sample),
            Packet::Direct(frame) => self.send_direct(frame),
        }
    }

    /// Enqueue a mode 1 or 2 packet for classification
    pub fn submit_raw_sample(&self, bytes: &[u8]) -> Result<(), PipelineError> {
        match self.decode(bytes, "submit_raw_sample")? {
            Packet::Motion(sample) => self.send_sample(sample),
            Packet::Direct(_) => Err(self.reject(
                DecodeError::WrongStream {
                    expected: "motion",
                    mode: 3,
                },
                "submit_raw_sample",
            )),
        }
    }

    /// Enqueue a mode 3 packet for the direct-control overlay
    pub fn submit_direct_frame(&self, bytes: &[u8]) -> Result<(), PipelineError> {
        match self.decode(bytes, "submit_direct_frame")? {
            Packet::Direct(frame) => self.send_direct(frame),
            Packet::Motion(_) => {
                let mode = peek_mode(bytes).map(|m| m.as_byte()).unwrap_or_default();
                Err(self.reject(
                    DecodeError::WrongStream {
                        expected: "direct-control",
                        mode,
                    },
                    "submit_direct_frame",
                ))
            }
        }
    }

    /// Inject a classified event straight onto the gesture channel
    pub fn submit_gesture_event(
        &self,
        stage: PredictionStage,
        label: impl Into<GestureLabel>,
        buttons: [i8; 4],
    ) -> Result<(), PipelineError> {
        let message = GestureMessage {
            event: PredictionEvent::new(stage, label.into()),
            buttons: ButtonState(buttons),
        };
        self.gesture_tx.blocking_send(message).map_err(|_| {
            report_pipeline_error(
                &self.telemetry,
                PipelineError::ChannelClosed { channel: "gesture" },
                "submit_gesture_event",
            )
        })
    }

    fn decode(&self, bytes: &[u8], context: &str) -> Result<Packet, PipelineError> {
        decode_with_deadzone(bytes, self.deadzone).map_err(|err| self.reject(err, context))
    }

    fn reject(&self, err: DecodeError, context: &str) -> PipelineError {
        log_decode_error(&err, context);
        self.telemetry.record_error(Component::Decoder, &err, context);
        PipelineError::Decode(err)
    }

    fn send_sample(&self, sample: Sample) -> Result<(), PipelineError> {
        self.sample_tx
            .blocking_send(sample)
            .map_err(|_| {
                report_pipeline_error(
                    &self.telemetry,
                    PipelineError::ChannelClosed { channel: "raw" },
                    "send_sample",
                )
            })?;
        self.record_occupancy("raw", &self.sample_tx);
        Ok(())
    }

    fn send_direct(&self, frame: DirectFrame) -> Result<(), PipelineError> {
        self.direct_tx
            .blocking_send(frame)
            .map_err(|_| {
                report_pipeline_error(
                    &self.telemetry,
                    PipelineError::ChannelClosed { channel: "direct" },
                    "send_direct",
                )
            })?;
        self.record_occupancy("direct", &self.direct_tx);
        Ok(())
    }

    fn record_occupancy<T>(&self, channel: &'static str, tx: &mpsc::Sender<T>) {
        let max = tx.max_capacity() as f32;
        let used = max - tx.capacity() as f32;
        self.telemetry
            .record_channel_occupancy(channel, used / max * 100.0);
    }
}

fn report_pipeline_error(
    telemetry: &TelemetryHub,
    err: PipelineError,
    context: &str,
) -> PipelineError {
    log_pipeline_error(&err, context);
    telemetry.record_error(Component::Pipeline, &err, context);
    err
}

/// How each worker ended
#[derive(Debug)]
pub struct PipelineReport {
    pub classification: Result<(), ClassificationError>,
    pub flight: Result<FlightExit, FlightError>,
    pub telemetry: TelemetrySnapshot,
}

/// Running classification and flight-control workers
pub struct PipelineHandle {
    input: PipelineInput,
    telemetry: Arc<TelemetryHub>,
    classification: JoinHandle<Result<(), ClassificationError>>,
    flight: JoinHandle<Result<FlightExit, FlightError>>,
}

impl PipelineHandle {
    /// Build both state machines and spawn their workers
    ///
    /// Fails before spawning anything if the classifier bank does not fit
    /// the configured window.
    pub fn start(
        config: &AppConfig,
        bank: ClassifierBank,
        actuator: Box<dyn Actuation>,
    ) -> Result<Self, ClassificationError> {
        let machine =
            GestureStateMachine::new(bank, config.window, config.classification.clone())?;
        let telemetry = Arc::new(TelemetryHub::default());
        let flight_machine =
            FlightStateMachine::new(actuator, config.flight.clone(), Arc::clone(&telemetry));

        let channels = PipelineChannels::new(&config.channels);
        let input = PipelineInput {
            sample_tx: channels.sample_tx,
            gesture_tx: channels.gesture_tx.clone(),
            direct_tx: channels.direct_tx,
            deadzone: config.classification.deadzone,
            telemetry: Arc::clone(&telemetry),
        };

        let classification = spawn_classification_thread(
            channels.sample_rx,
            channels.gesture_tx,
            machine,
            Arc::clone(&telemetry),
        );
        let flight = spawn_flight_thread(
            channels.gesture_rx,
            channels.direct_rx,
            flight_machine,
            config.flight.poll_interval(),
            Arc::clone(&telemetry),
        );

        tracing::info!(
            "[Pipeline] Started ({}, window {} samples)",
            config.window.dimensionality.name(),
            config.window.sample_count
        );
        Ok(Self {
            input,
            telemetry,
            classification,
            flight,
        })
    }

    pub fn input(&self) -> &PipelineInput {
        &self.input
    }

    pub fn telemetry(&self) -> &Arc<TelemetryHub> {
        &self.telemetry
    }

    /// Whether the flight-control loop has ended
    pub fn is_flight_finished(&self) -> bool {
        self.flight.is_finished()
    }

    /// Close the inputs and wait for both workers to drain and exit
    ///
    /// Every [`PipelineInput`] clone handed out must be dropped first, or the
    /// workers never see their channels close.
    pub fn shutdown(self) -> Result<PipelineReport, PipelineError> {
        let Self {
            input,
            telemetry,
            classification,
            flight,
        } = self;
        drop(input);

        let classification = classification.join().map_err(|_| {
            report_pipeline_error(
                &telemetry,
                PipelineError::WorkerPanicked {
                    worker: "classification",
                },
                "shutdown",
            )
        })?;
        let flight = flight.join().map_err(|_| {
            report_pipeline_error(
                &telemetry,
                PipelineError::WorkerPanicked { worker: "flight" },
                "shutdown",
            )
        })?;

        tracing::info!("[Pipeline] Shut down");
        Ok(PipelineReport {
            classification,
            flight,
            telemetry: telemetry.snapshot(),
        })
    }
}
