// Classifier - one-vs-rest gesture vote over a window slice
//
// Every gesture in the vocabulary owns one binary probabilistic model that
// separates it from everything else. A model's output columns are named by
// its classes; the column called "unknown" is the "rest" side, so the
// complementary probability is that gesture's vote.
//
// The set with the highest vote wins. A winning vote below the confidence
// floor (0.3 by default) is reported as "unknown" whichever model cast it.
// Ties keep the first-registered gesture.

use crate::analysis::label::GestureLabel;
use crate::analysis::window::WindowConfig;
use crate::error::ClassificationError;
use crate::packet::Dimensionality;

/// Output class name that marks the "rest" column of a one-vs-rest model
pub const UNKNOWN_CLASS: &str = "unknown";

/// Votes below this are reported as unknown
pub const DEFAULT_UNKNOWN_THRESHOLD: f32 = 0.3;

/// Opaque probabilistic one-vs-rest model produced by offline training
pub trait OneVsRestModel: Send {
    /// Output class names, one per probability column
    fn classes(&self) -> &[String];

    /// Probability per output column for one flattened feature slice
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ClassificationError>;

    /// Expected feature slice length, if the model knows it
    fn input_len(&self) -> Option<usize> {
        None
    }

    /// Index of the "unknown" output column
    fn unknown_column(&self) -> Option<usize> {
        self.classes().iter().position(|c| c == UNKNOWN_CLASS)
    }
}

struct RegisteredModel {
    label: GestureLabel,
    unknown_column: usize,
    model: Box<dyn OneVsRestModel>,
}

/// Ordered collection of one-vs-rest models for one stage
pub struct ClassifierSet {
    models: Vec<RegisteredModel>,
    unknown_threshold: f32,
}

impl ClassifierSet {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_UNKNOWN_THRESHOLD)
    }

    pub fn with_threshold(unknown_threshold: f32) -> Self {
        Self {
            models: Vec::new(),
            unknown_threshold,
        }
    }

    /// Register the model voting for `label`
    ///
    /// Registration order is the tie-break order.
    pub fn register(
        &mut self,
        label: impl Into<GestureLabel>,
        model: Box<dyn OneVsRestModel>,
    ) -> Result<(), ClassificationError> {
        let label = label.into();
        let unknown_column =
            model
                .unknown_column()
                .ok_or_else(|| ClassificationError::MissingUnknownClass {
                    label: label.to_string(),
                })?;
        self.models.push(RegisteredModel {
            label,
            unknown_column,
            model,
        });
        Ok(())
    }

    /// Builder form of [`ClassifierSet::register`]
    pub fn with_model(
        mut self,
        label: impl Into<GestureLabel>,
        model: Box<dyn OneVsRestModel>,
    ) -> Result<Self, ClassificationError> {
        self.register(label, model)?;
        Ok(self)
    }

    pub fn labels(&self) -> impl Iterator<Item = &GestureLabel> {
        self.models.iter().map(|m| &m.label)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn unknown_threshold(&self) -> f32 {
        self.unknown_threshold
    }

    /// Check every model that declares an input length against `expected`
    pub fn check_input_len(&self, expected: usize) -> Result<(), ClassificationError> {
        for registered in &self.models {
            if let Some(actual) = registered.model.input_len() {
                if actual != expected {
                    return Err(ClassificationError::FeatureLength { expected, actual });
                }
            }
        }
        Ok(())
    }

    /// Classify one feature slice
    ///
    /// # Returns
    /// Tuple of (winning label or unknown, winning vote 0.0-1.0)
    pub fn predict(&self, features: &[f32]) -> Result<(GestureLabel, f32), ClassificationError> {
        let mut best: Option<(&GestureLabel, f32)> = None;

        for registered in &self.models {
            let probabilities = registered.model.predict_proba(features)?;
            let unknown = probabilities
                .get(registered.unknown_column)
                .copied()
                .ok_or_else(|| ClassificationError::InferenceFailed {
                    label: registered.label.to_string(),
                    reason: format!(
                        "{} output columns, unknown column is {}",
                        probabilities.len(),
                        registered.unknown_column
                    ),
                })?;
            let vote = 1.0 - unknown;
            if !vote.is_finite() {
                return Err(ClassificationError::InferenceFailed {
                    label: registered.label.to_string(),
                    reason: "non-finite probability".to_string(),
                });
            }

            // Strictly greater keeps the earlier registration on ties
            if best.map(|(_, top)| vote > top).unwrap_or(true) {
                best = Some((&registered.label, vote));
            }
        }

        match best {
            Some((label, vote)) if vote >= self.unknown_threshold => Ok((label.clone(), vote)),
            Some((_, vote)) => Ok((GestureLabel::Unknown, vote)),
            None => Ok((GestureLabel::Unknown, 0.0)),
        }
    }
}

impl Default for ClassifierSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Free-function form of [`ClassifierSet::predict`]
pub fn predict(
    features: &[f32],
    classifiers: &ClassifierSet,
) -> Result<(GestureLabel, f32), ClassificationError> {
    classifiers.predict(features)
}

/// Early and validation classifier sets for one dimensionality
pub struct ClassifierBank {
    dimensionality: Dimensionality,
    early: ClassifierSet,
    validation: ClassifierSet,
}

impl ClassifierBank {
    /// Both sets must hold at least one model
    pub fn new(
        dimensionality: Dimensionality,
        early: ClassifierSet,
        validation: ClassifierSet,
    ) -> Result<Self, ClassificationError> {
        if early.is_empty() {
            return Err(ClassificationError::MissingClassifierSet { stage: "early" });
        }
        if validation.is_empty() {
            return Err(ClassificationError::MissingClassifierSet {
                stage: "validation",
            });
        }
        Ok(Self {
            dimensionality,
            early,
            validation,
        })
    }

    /// Verify declared model input sizes against the window geometry
    pub fn check_window(&self, window: &WindowConfig) -> Result<(), ClassificationError> {
        window.validate()?;
        if window.dimensionality != self.dimensionality {
            return Err(ClassificationError::DimensionalityMismatch {
                configured: window.dimensionality.name(),
                received: self.dimensionality.name(),
            });
        }
        self.early.check_input_len(window.early_len())?;
        self.validation.check_input_len(window.capacity())
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.dimensionality
    }

    pub fn early(&self) -> &ClassifierSet {
        &self.early
    }

    pub fn validation(&self) -> &ClassifierSet {
        &self.validation
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
