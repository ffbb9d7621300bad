// Classification error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Classification error code constants
///
/// Error code range: 2001-2007
pub struct ClassificationErrorCodes {}

impl ClassificationErrorCodes {
    /// Sample dimensionality differs from the configured classifier bank
    pub const DIMENSIONALITY_MISMATCH: i32 = 2001;

    /// A classifier set required by the state machine is empty
    pub const MISSING_CLASSIFIER_SET: i32 = 2002;

    /// A model has no "unknown" output column
    pub const MISSING_UNKNOWN_CLASS: i32 = 2003;

    /// Feature slice length does not match the model input
    pub const FEATURE_LENGTH: i32 = 2004;

    /// Underlying inference call failed
    pub const INFERENCE_FAILED: i32 = 2005;

    /// Model artifact could not be loaded
    pub const MODEL_LOAD: i32 = 2006;

    /// Window geometry holds no samples for a classifier stage
    pub const INVALID_WINDOW: i32 = 2007;
}

/// Log a classification error with component and state context
pub fn log_classification_error(err: &ClassificationError, context: &str) {
    error!(
        "Classification error in {}: code={}, component=GestureClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the classifier adapter and the classification worker
///
/// `DimensionalityMismatch`, `MissingClassifierSet` and `InvalidWindow` are
/// configuration errors and terminate the worker. Everything else is a classifier error:
/// the current tick's decision is skipped and the working label is kept.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationError {
    /// A packet arrived for a dimensionality with no configured classifier set
    DimensionalityMismatch {
        configured: &'static str,
        received: &'static str,
    },

    /// The early or validation classifier set is empty
    MissingClassifierSet { stage: &'static str },

    /// Model output classes contain no "unknown" column
    MissingUnknownClass { label: String },

    /// Features handed to a model have the wrong length
    FeatureLength { expected: usize, actual: usize },

    /// Inference produced no usable output
    InferenceFailed { label: String, reason: String },

    /// Model artifact could not be read or parsed
    ModelLoad { path: String, reason: String },

    /// Configured window or early slice is empty
    InvalidWindow { field: &'static str },
}

impl ClassificationError {
    /// Whether this error must terminate the classification worker
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClassificationError::DimensionalityMismatch { .. }
                | ClassificationError::MissingClassifierSet { .. }
                | ClassificationError::InvalidWindow { .. }
        )
    }
}

impl ErrorCode for ClassificationError {
    fn code(&self) -> i32 {
        match self {
            ClassificationError::DimensionalityMismatch { .. } => {
                ClassificationErrorCodes::DIMENSIONALITY_MISMATCH
            }
            ClassificationError::MissingClassifierSet { .. } => {
                ClassificationErrorCodes::MISSING_CLASSIFIER_SET
            }
            ClassificationError::MissingUnknownClass { .. } => {
                ClassificationErrorCodes::MISSING_UNKNOWN_CLASS
            }
            ClassificationError::FeatureLength { .. } => ClassificationErrorCodes::FEATURE_LENGTH,
            ClassificationError::InferenceFailed { .. } => {
                ClassificationErrorCodes::INFERENCE_FAILED
            }
            ClassificationError::ModelLoad { .. } => ClassificationErrorCodes::MODEL_LOAD,
            ClassificationError::InvalidWindow { .. } => ClassificationErrorCodes::INVALID_WINDOW,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassificationError::DimensionalityMismatch {
                configured,
                received,
            } => format!(
                "Dimension change from {} to {} not allowed during runtime",
                configured, received
            ),
            ClassificationError::MissingClassifierSet { stage } => {
                format!("No {} classifier set configured", stage)
            }
            ClassificationError::MissingUnknownClass { label } => {
                format!("Model for '{}' has no 'unknown' output class", label)
            }
            ClassificationError::FeatureLength { expected, actual } => {
                format!("Expected {} features, got {}", expected, actual)
            }
            ClassificationError::InferenceFailed { label, reason } => {
                format!("Inference failed for '{}': {}", label, reason)
            }
            ClassificationError::ModelLoad { path, reason } => {
                format!("Failed to load model {}: {}", path, reason)
            }
            ClassificationError::InvalidWindow { field } => {
                format!("Window {} must be greater than 0", field)
            }
        }
    }
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassificationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassificationError {}
