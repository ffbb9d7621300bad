// Model artifacts - JSON multilayer perceptrons trained offline
//
// Each gesture ships two files in the model directory, one per stage:
//
//   manifest.json            {"dimensionality": "3d", "labels": ["start", ...]}
//   <label>_early.json       MLP over the leading early window slice
//   <label>_validation.json  MLP over the full window
//
// A model file holds the output class names, the hidden activation and the
// dense layers. Weights are stored row-major as weights[output][input]. One
// output unit means a binary logistic head whose probability belongs to the
// second class; more units go through softmax.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::classifier::{ClassifierBank, ClassifierSet, OneVsRestModel};
use crate::analysis::window::WindowConfig;
use crate::error::ClassificationError;
use crate::packet::Dimensionality;

/// Manifest file name inside a model directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Hidden layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Logistic,
    Identity,
}

impl Activation {
    fn apply(self, value: f32) -> f32 {
        match self {
            Activation::Relu => value.max(0.0),
            Activation::Tanh => value.tanh(),
            Activation::Logistic => logistic(value),
            Activation::Identity => value,
        }
    }
}

fn logistic(value: f32) -> f32 {
    1.0 / (1.0 + (-value).exp())
}

/// Fully connected layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// `weights[output][input]`
    pub weights: Vec<Vec<f32>>,
    pub biases: Vec<f32>,
}

impl DenseLayer {
    fn inputs(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect()
    }
}

/// Probabilistic one-vs-rest model read from a JSON artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpModel {
    pub classes: Vec<String>,
    #[serde(default)]
    pub activation: Activation,
    pub layers: Vec<DenseLayer>,
}

impl MlpModel {
    /// Parse and validate a model; `source` names the artifact in errors
    pub fn from_json_str(json: &str, source: &str) -> Result<Self, ClassificationError> {
        let model: MlpModel =
            serde_json::from_str(json).map_err(|e| ClassificationError::ModelLoad {
                path: source.to_string(),
                reason: e.to_string(),
            })?;
        model.validate().map_err(|reason| ClassificationError::ModelLoad {
            path: source.to_string(),
            reason,
        })?;
        Ok(model)
    }

    pub fn from_file(path: &Path) -> Result<Self, ClassificationError> {
        let source = path.display().to_string();
        let json = fs::read_to_string(path).map_err(|e| ClassificationError::ModelLoad {
            path: source.clone(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json, &source)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.classes.len() < 2 {
            return Err(format!("expected at least 2 classes, got {}", self.classes.len()));
        }
        let Some(first) = self.layers.first() else {
            return Err("model has no layers".to_string());
        };

        let mut width = first.inputs();
        if width == 0 {
            return Err("first layer has no inputs".to_string());
        }
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.biases.len() {
                return Err(format!(
                    "layer {}: {} weight rows but {} biases",
                    index,
                    layer.weights.len(),
                    layer.biases.len()
                ));
            }
            if let Some(row) = layer.weights.iter().position(|row| row.len() != width) {
                return Err(format!(
                    "layer {}: row {} has {} inputs, expected {}",
                    index,
                    row,
                    layer.weights[row].len(),
                    width
                ));
            }
            width = layer.biases.len();
        }

        let expected_outputs = if self.classes.len() == 2 {
            1
        } else {
            self.classes.len()
        };
        if width != expected_outputs {
            return Err(format!(
                "output layer has {} units, expected {} for {} classes",
                width,
                expected_outputs,
                self.classes.len()
            ));
        }
        Ok(())
    }
}

impl OneVsRestModel for MlpModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ClassificationError> {
        let Some((output, hidden)) = self.layers.split_last() else {
            return Err(ClassificationError::ModelLoad {
                path: "<in-memory>".to_string(),
                reason: "model has no layers".to_string(),
            });
        };
        let expected = hidden.first().unwrap_or(output).inputs();
        if features.len() != expected {
            return Err(ClassificationError::FeatureLength {
                expected,
                actual: features.len(),
            });
        }

        let mut activations = features.to_vec();
        for layer in hidden {
            activations = layer
                .forward(&activations)
                .into_iter()
                .map(|v| self.activation.apply(v))
                .collect();
        }
        let logits = output.forward(&activations);

        if logits.len() == 1 {
            let p = logistic(logits[0]);
            return Ok(vec![1.0 - p, p]);
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
        let total: f32 = exps.iter().sum();
        Ok(exps.into_iter().map(|v| v / total).collect())
    }

    fn input_len(&self) -> Option<usize> {
        self.layers.first().map(DenseLayer::inputs)
    }
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub dimensionality: Dimensionality,
    /// Gesture labels in registration (tie-break) order
    pub labels: Vec<String>,
}

impl ModelManifest {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read model manifest {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse model manifest {}", path.display()))
    }
}

fn load_stage(
    dir: &Path,
    labels: &[String],
    stage: &str,
    unknown_threshold: f32,
) -> Result<ClassifierSet> {
    let mut set = ClassifierSet::with_threshold(unknown_threshold);
    for label in labels {
        let path = dir.join(format!("{}_{}.json", label, stage));
        let model = MlpModel::from_file(&path)?;
        set.register(label.as_str(), Box::new(model))
            .with_context(|| format!("Failed to register {} model for {}", stage, label))?;
    }
    Ok(set)
}

/// Load the early and validation sets described by `dir/manifest.json`
///
/// The manifest's dimensionality must match the window, and every model's
/// input size must match its stage's slice length.
pub fn load_classifier_bank(
    dir: &Path,
    window: &WindowConfig,
    unknown_threshold: f32,
) -> Result<ClassifierBank> {
    let manifest = ModelManifest::load(dir)?;
    if manifest.labels.is_empty() {
        bail!("Model manifest in {} lists no gestures", dir.display());
    }
    if manifest.dimensionality != window.dimensionality {
        return Err(ClassificationError::DimensionalityMismatch {
            configured: window.dimensionality.name(),
            received: manifest.dimensionality.name(),
        }
        .into());
    }

    let early = load_stage(dir, &manifest.labels, "early", unknown_threshold)?;
    let validation = load_stage(dir, &manifest.labels, "validation", unknown_threshold)?;
    let bank = ClassifierBank::new(manifest.dimensionality, early, validation)?;
    bank.check_window(window)?;

    let loaded: Vec<String> = bank.early().labels().map(|l| l.to_string()).collect();
    log::info!(
        "[Models] Loaded gestures [{}] ({}) from {}",
        loaded.join(", "),
        manifest.dimensionality.name(),
        dir.display()
    );
    Ok(bank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::label::GestureLabel;
    use std::path::PathBuf;

    fn binary_linear(label: &str, inputs: usize, weight: f32) -> MlpModel {
        let mut row = vec![0.0; inputs];
        row[0] = weight;
        MlpModel {
            classes: vec!["unknown".to_string(), label.to_string()],
            activation: Activation::Relu,
            layers: vec![DenseLayer {
                weights: vec![row],
                biases: vec![0.0],
            }],
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "gesture_pilot_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_json<T: Serialize>(path: PathBuf, value: &T) {
        fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    #[test]
    fn test_binary_head_probability_belongs_to_second_class() {
        let model = binary_linear("start", 2, 1.0);
        let neutral = model.predict_proba(&[0.0, 0.0]).unwrap();
        assert!((neutral[0] - 0.5).abs() < 1e-6);
        assert!((neutral[1] - 0.5).abs() < 1e-6);

        let strong = model.predict_proba(&[10.0, 0.0]).unwrap();
        assert!(strong[1] > 0.99);
        assert!((strong[0] + strong[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hidden_layer_activation() {
        // relu(x0 - x1) + relu(x1 - x0) = |x0 - x1|
        let model = MlpModel {
            classes: vec!["wp_set".to_string(), "unknown".to_string()],
            activation: Activation::Relu,
            layers: vec![
                DenseLayer {
                    weights: vec![vec![1.0, -1.0], vec![-1.0, 1.0]],
                    biases: vec![0.0, 0.0],
                },
                DenseLayer {
                    weights: vec![vec![1.0, 1.0]],
                    biases: vec![0.0],
                },
            ],
        };
        let a = model.predict_proba(&[3.0, 1.0]).unwrap();
        let b = model.predict_proba(&[1.0, 3.0]).unwrap();
        assert!((a[1] - b[1]).abs() < 1e-6);
        assert!((a[1] - logistic(2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_model_without_layers_fails_inference() {
        let model = MlpModel {
            classes: vec!["unknown".to_string(), "start".to_string()],
            activation: Activation::Relu,
            layers: vec![],
        };
        assert_eq!(model.input_len(), None);
        assert!(matches!(
            model.predict_proba(&[0.0; 4]),
            Err(ClassificationError::ModelLoad { .. })
        ));
    }

    #[test]
    fn test_softmax_head_sums_to_one() {
        let model = MlpModel {
            classes: vec!["land".to_string(), "landR".to_string(), "unknown".to_string()],
            activation: Activation::Tanh,
            layers: vec![DenseLayer {
                weights: vec![vec![2.0], vec![1.0], vec![0.0]],
                biases: vec![0.0, 0.0, 0.0],
            }],
        };
        let proba = model.predict_proba(&[1.0]).unwrap();
        assert_eq!(proba.len(), 3);
        assert!((proba.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(proba[0] > proba[1] && proba[1] > proba[2]);
    }

    #[test]
    fn test_wrong_feature_length_is_rejected() {
        let model = binary_linear("start", 4, 1.0);
        let err = model.predict_proba(&[0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            ClassificationError::FeatureLength {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_inconsistent_layers_fail_to_load() {
        let json = r#"{
            "classes": ["unknown", "start"],
            "layers": [
                {"weights": [[1.0, 2.0], [3.0]], "biases": [0.0, 0.0]},
                {"weights": [[1.0, 1.0]], "biases": [0.0]}
            ]
        }"#;
        let err = MlpModel::from_json_str(json, "start_early.json").unwrap_err();
        match err {
            ClassificationError::ModelLoad { path, reason } => {
                assert_eq!(path, "start_early.json");
                assert!(reason.contains("row 1"), "{}", reason);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_output_width_must_match_classes() {
        let json = r#"{
            "classes": ["unknown", "start", "land"],
            "layers": [{"weights": [[1.0]], "biases": [0.0]}]
        }"#;
        assert!(MlpModel::from_json_str(json, "bad.json").is_err());
    }

    #[test]
    fn test_load_classifier_bank_from_directory() {
        let dir = scratch_dir("bank");
        let window = WindowConfig::new(Dimensionality::TwoD);
        write_json(
            dir.join(MANIFEST_FILE),
            &ModelManifest {
                dimensionality: Dimensionality::TwoD,
                labels: vec!["start".to_string(), "land".to_string()],
            },
        );
        for (label, weight) in [("start", 5.0), ("land", -5.0)] {
            write_json(
                dir.join(format!("{}_early.json", label)),
                &binary_linear(label, window.early_len(), weight),
            );
            write_json(
                dir.join(format!("{}_validation.json", label)),
                &binary_linear(label, window.capacity(), weight),
            );
        }

        let bank = load_classifier_bank(&dir, &window, 0.3).unwrap();
        let labels: Vec<_> = bank.early().labels().cloned().collect();
        assert_eq!(
            labels,
            vec![GestureLabel::gesture("start"), GestureLabel::gesture("land")]
        );

        let mut features = vec![0.0; window.capacity()];
        features[0] = 1.0;
        let (label, _) = bank.validation().predict(&features).unwrap();
        assert_eq!(label, GestureLabel::gesture("start"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rejects_dimensionality_switch() {
        let dir = scratch_dir("dims");
        write_json(
            dir.join(MANIFEST_FILE),
            &ModelManifest {
                dimensionality: Dimensionality::ThreeD,
                labels: vec!["start".to_string()],
            },
        );
        let err = load_classifier_bank(&dir, &WindowConfig::new(Dimensionality::TwoD), 0.3)
            .err()
            .unwrap();
        let classification = err.downcast_ref::<ClassificationError>().unwrap();
        assert!(classification.is_fatal());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_reports_missing_model_file() {
        let dir = scratch_dir("missing");
        write_json(
            dir.join(MANIFEST_FILE),
            &ModelManifest {
                dimensionality: Dimensionality::ThreeD,
                labels: vec!["wp_set".to_string()],
            },
        );
        let err = load_classifier_bank(&dir, &WindowConfig::default(), 0.3)
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("wp_set_early.json"));

        let _ = fs::remove_dir_all(&dir);
    }
}
