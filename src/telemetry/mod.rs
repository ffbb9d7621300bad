//! Pipeline telemetry collector and helpers.
//!
//! The collector multiplexes gesture events, vehicle commands, channel
//! occupancy and worker failures into a bounded history plus a broadcast
//! stream. Each pipeline owns its own hub; workers hold an `Arc` to it.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use crate::analysis::PredictionEvent;
use crate::error::ErrorCode;

pub mod events;

pub use events::{Component, MetricEvent, WorkerPhase};

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

impl TelemetrySnapshot {
    /// Count recent events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&MetricEvent) -> bool) -> usize {
        self.recent.iter().filter(|event| predicate(event)).count()
    }
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut history) = self.history.lock() {
            if history.len() >= self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            if self.history_capacity > 0 {
                history.push_back(event.clone());
            }
        }

        // No subscribers is not an error
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = self
            .history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

/// Top-level hub wrapping the collector plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    channel_gauges: Mutex<HashMap<&'static str, f32>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            channel_gauges: Mutex::new(HashMap::new()),
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.collector.subscribe()
    }

    pub fn record_gesture(&self, event: &PredictionEvent) {
        self.collector.publish(MetricEvent::Gesture {
            stage: event.stage,
            label: event.label.clone(),
        });
    }

    pub fn record_command(&self, command: impl Into<String>, attempts: u32) {
        self.collector.publish(MetricEvent::VehicleCommand {
            command: command.into(),
            attempts,
        });
    }

    pub fn record_warning(&self, component: Component, message: impl Into<String>) {
        self.collector.publish(MetricEvent::StateWarning {
            component,
            message: message.into(),
        });
    }

    /// Publish channel fill level, skipping changes under 2.5 points
    pub fn record_channel_occupancy(&self, channel: &'static str, percent: f32) {
        let normalized = percent.clamp(0.0, 100.0);
        let Ok(mut gauges) = self.channel_gauges.lock() else {
            return;
        };

        let should_emit = gauges
            .get(channel)
            .map(|last| (last - normalized).abs() >= 2.5)
            .unwrap_or(true);

        if should_emit {
            gauges.insert(channel, normalized);
            self.collector.publish(MetricEvent::ChannelOccupancy {
                channel: channel.to_string(),
                percent: normalized,
            });
        }
    }

    pub fn record_worker_phase(&self, component: Component, phase: WorkerPhase) {
        self.collector.publish(MetricEvent::WorkerLifecycle {
            component,
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_error(&self, component: Component, err: &impl ErrorCode, context: &str) {
        self.collector.publish(MetricEvent::Error {
            component,
            code: err.code(),
            context: format!("{}: {}", context, err.message()),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
