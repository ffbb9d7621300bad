// WindowBuffer - fixed-length sliding history of decoded samples
//
// Samples are stored flattened: sample k occupies slots
// [k * width, (k + 1) * width). Until the window fills, unused slots stay at
// zero. Once full, every append drops the oldest sample and writes the new
// one at the tail, so the stored length never changes.

use serde::{Deserialize, Serialize};

use crate::error::ClassificationError;
use crate::packet::{Dimensionality, DEFAULT_DEADZONE};

fn default_sample_count() -> usize {
    40
}

fn default_early_sample_count() -> usize {
    20
}

/// Window geometry chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub dimensionality: Dimensionality,
    /// Samples held by the full (validation) window
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    /// Leading samples classified by the early set
    #[serde(default = "default_early_sample_count")]
    pub early_sample_count: usize,
}

impl WindowConfig {
    pub fn new(dimensionality: Dimensionality) -> Self {
        Self {
            dimensionality,
            sample_count: default_sample_count(),
            early_sample_count: default_early_sample_count(),
        }
    }

    pub fn sample_width(&self) -> usize {
        self.dimensionality.sample_width()
    }

    /// Total scalar slots: 240 for 3D, 120 for 2D with default counts
    pub fn capacity(&self) -> usize {
        self.sample_count * self.sample_width()
    }

    /// Both the full window and the early slice must hold samples
    pub fn validate(&self) -> Result<(), ClassificationError> {
        if self.sample_count == 0 {
            return Err(ClassificationError::InvalidWindow {
                field: "sample_count",
            });
        }
        if self.early_sample_count == 0 {
            return Err(ClassificationError::InvalidWindow {
                field: "early_sample_count",
            });
        }
        Ok(())
    }

    /// Scalar slots handed to the early classifier set
    pub fn early_len(&self) -> usize {
        self.early_sample_count.min(self.sample_count) * self.sample_width()
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new(Dimensionality::ThreeD)
    }
}

/// Sliding window owned by the classification worker
///
/// No interior locking: one owner, one writer.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    config: WindowConfig,
    deadzone: f32,
    slots: Vec<f32>,
    filled: usize,
}

impl WindowBuffer {
    /// # Panics
    /// Panics if the configured window holds no samples
    pub fn new(config: WindowConfig) -> Self {
        Self::with_deadzone(config, DEFAULT_DEADZONE)
    }

    /// # Panics
    /// Panics if the configured window holds no samples, see
    /// [`WindowConfig::validate`]
    pub fn with_deadzone(config: WindowConfig, deadzone: f32) -> Self {
        assert!(config.sample_count > 0, "sample_count must be greater than 0");
        Self {
            config,
            deadzone,
            slots: vec![0.0; config.capacity()],
            filled: 0,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Append one sample's scalars, evicting the oldest sample when full
    ///
    /// Values beyond the sample width are ignored and missing ones stay 0.
    pub fn append(&mut self, values: &[f32]) {
        let width = self.config.sample_width();
        let offset = if self.filled < self.config.sample_count {
            let offset = self.filled * width;
            self.filled += 1;
            offset
        } else {
            self.slots.copy_within(width.., 0);
            self.slots.len() - width
        };

        let tail = &mut self.slots[offset..offset + width];
        tail.fill(0.0);
        for (slot, value) in tail.iter_mut().zip(values) {
            *slot = if value.abs() <= self.deadzone { 0.0 } else { *value };
        }
    }

    /// Full window, always `capacity()` long
    pub fn snapshot(&self) -> &[f32] {
        &self.slots
    }

    /// Leading `early_sample_count` samples of the window
    pub fn early_slice(&self) -> &[f32] {
        &self.slots[..self.config.early_len()]
    }

    /// Scalars of the sample stored at position `index`
    pub fn sample(&self, index: usize) -> Option<&[f32]> {
        let width = self.config.sample_width();
        (index < self.config.sample_count).then(|| &self.slots[index * width..(index + 1) * width])
    }

    /// Number of samples written since the last clear, capped at capacity
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Zero every slot and restart filling from the head
    pub fn clear(&mut self) {
        self.slots.fill(0.0);
        self.filled = 0;
    }
}
