// Gesture Pilot Core - wearable IMU gestures to drone commands
// Two-worker pipeline: windowed classification feeding a flight state machine

// Module declarations
pub mod analysis;
pub mod config;
pub mod error;
pub mod flight;
pub mod packet;
pub mod pipeline;
pub mod telemetry;
pub mod testing;

// Re-exports for convenience
pub use config::AppConfig;
pub use pipeline::{PipelineHandle, PipelineInput, PipelineReport};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Honors `RUST_LOG`, defaulting to `info`. Output goes to stderr so the
/// CLI's JSON on stdout stays parseable. Later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
