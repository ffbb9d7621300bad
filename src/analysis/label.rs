// Gesture labels and the tagged events emitted by the classification machine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::packet::ButtonState;

/// Gesture identifier or one of the classifier sentinels
///
/// Serialized as the plain string the models were trained with, so
/// `"stillGesture"` maps to [`GestureLabel::Still`] and any string outside
/// the sentinels is a vocabulary gesture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GestureLabel {
    /// Gesture from the configured vocabulary
    Gesture(String),
    /// No classifier voted above the confidence floor
    Unknown,
    /// Rest pose that separates two gestures
    Still,
    /// Nothing in progress
    None,
}

impl GestureLabel {
    pub const UNKNOWN: &'static str = "unknown";
    pub const STILL: &'static str = "stillGesture";
    pub const NONE: &'static str = "none";

    pub fn gesture(name: impl Into<String>) -> Self {
        GestureLabel::from(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            GestureLabel::Gesture(name) => name,
            GestureLabel::Unknown => Self::UNKNOWN,
            GestureLabel::Still => Self::STILL,
            GestureLabel::None => Self::NONE,
        }
    }

    /// True for labels that never start a validation pass
    pub fn is_idle(&self) -> bool {
        !matches!(self, GestureLabel::Gesture(_))
    }
}

impl From<String> for GestureLabel {
    fn from(value: String) -> Self {
        match value.as_str() {
            Self::UNKNOWN => GestureLabel::Unknown,
            Self::STILL => GestureLabel::Still,
            Self::NONE => GestureLabel::None,
            _ => GestureLabel::Gesture(value),
        }
    }
}

impl From<&str> for GestureLabel {
    fn from(value: &str) -> Self {
        GestureLabel::from(value.to_string())
    }
}

impl From<GestureLabel> for String {
    fn from(label: GestureLabel) -> Self {
        match label {
            GestureLabel::Gesture(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence stage attached to an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStage {
    /// First pass on the leading half of the window
    Early,
    /// Second pass on the full window agreed with the first
    Vali,
    /// Rest pose detected after a validated gesture
    End,
    /// Advisory, no decision
    None,
}

/// Tagged classification outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionEvent {
    pub stage: PredictionStage,
    pub label: GestureLabel,
}

impl PredictionEvent {
    pub fn new(stage: PredictionStage, label: GestureLabel) -> Self {
        Self { stage, label }
    }

    pub fn idle() -> Self {
        Self::new(PredictionStage::None, GestureLabel::None)
    }

    /// Idle events carry no information and are not forwarded
    pub fn is_idle(&self) -> bool {
        self.stage == PredictionStage::None && self.label == GestureLabel::None
    }

    pub fn is_validated(&self) -> bool {
        self.stage == PredictionStage::Vali
    }
}

/// Element of the classify → flight-control channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureMessage {
    pub event: PredictionEvent,
    /// Buttons of the sample that produced the event
    pub buttons: ButtonState,
}
