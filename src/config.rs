//! Configuration management for runtime parameter tuning
//!
//! This module loads the pipeline configuration from a JSON file so that
//! tick intervals, confidence floors, flight distances and channel sizes
//! can be adjusted without recompilation. Every section and field falls back
//! to its default when absent.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::WindowConfig;

/// Default config file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "assets/gesture_pilot.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub classification: ClassificationConfig,
    pub flight: FlightConfig,
    pub channels: ChannelConfig,
}

/// Gesture classification state machine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Ticks between early classifications
    pub early_interval_ticks: u32,
    /// Ticks between validation classifications
    pub validation_interval_ticks: u32,
    /// Idle ticks after a validated gesture before rest detection starts
    pub rest_interval_ticks: u32,
    /// Consecutive validation disagreements before giving up on a gesture
    pub max_validation_mismatches: u32,
    /// Votes below this are reported as unknown
    pub unknown_threshold: f32,
    /// Motion scalars with |v| <= deadzone are clamped to 0
    pub deadzone: f32,
    /// Directory holding manifest.json and the per-gesture model files
    pub models_dir: Option<PathBuf>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            early_interval_ticks: 5,
            validation_interval_ticks: 10,
            rest_interval_ticks: 5,
            max_validation_mismatches: 9,
            unknown_threshold: 0.3,
            deadzone: 0.5,
            models_dir: None,
        }
    }
}

/// Flight command parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub takeoff_altitude_m: f32,
    pub takeoff_duration_s: f32,
    pub land_altitude_m: f32,
    pub land_duration_s: f32,
    /// Wait between the land descent and the motor stop
    pub land_settle_ms: u64,
    /// Travel time for waypoint moves
    pub goto_duration_s: f32,
    /// Relative displacement per direct-control step
    pub direct_step_m: f32,
    pub direct_move_duration_s: f32,
    /// Take off automatically on the first direct frame while landed
    pub direct_auto_takeoff: bool,
    /// Sleep between channel polls when both channels are empty
    pub poll_interval_ms: u64,
}

impl FlightConfig {
    pub fn land_settle(&self) -> Duration {
        Duration::from_millis(self.land_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            takeoff_altitude_m: 0.3,
            takeoff_duration_s: 0.6,
            land_altitude_m: 0.3,
            land_duration_s: 2.0,
            land_settle_ms: 5000,
            goto_duration_s: 5.0,
            direct_step_m: 0.1,
            direct_move_duration_s: 0.1,
            direct_auto_takeoff: true,
            poll_interval_ms: 2,
        }
    }
}

/// Bounded channel capacities between the pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Transport → classification
    pub raw_capacity: usize,
    /// Classification → flight control
    pub gesture_capacity: usize,
    /// Transport → flight control
    pub direct_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            raw_capacity: 256,
            gesture_capacity: 64,
            direct_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file doesn't exist
    /// or the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }
}
