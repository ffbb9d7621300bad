//! Core telemetry event types describing pipeline activity exposed to the
//! CLI and to any subscriber of a pipeline's hub.

use serde::{Deserialize, Serialize};

use crate::analysis::{GestureLabel, PredictionStage};

/// Pipeline component a metric is attributed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Decoder,
    Classification,
    FlightControl,
    /// Submit and shutdown boundary around the workers
    Pipeline,
}

/// Worker lifecycle stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Started,
    Stopped,
    Failed,
}

/// Rich metric events covering gestures, vehicle commands and failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Non-idle event emitted by the classification machine
    Gesture {
        stage: PredictionStage,
        label: GestureLabel,
    },
    /// Command accepted by the vehicle
    VehicleCommand { command: String, attempts: u32 },
    /// Recoverable state error absorbed as a no-op
    StateWarning {
        component: Component,
        message: String,
    },
    ChannelOccupancy { channel: String, percent: f32 },
    WorkerLifecycle {
        component: Component,
        phase: WorkerPhase,
        timestamp_ms: u64,
    },
    Error {
        component: Component,
        code: i32,
        context: String,
    },
}
