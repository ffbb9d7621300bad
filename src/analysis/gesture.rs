// GestureStateMachine - two-stage debounce from samples to gesture events
//
// One tick per appended sample. Every phase counts its interval in idle
// ticks and classifies on the tick after, so the default early pass runs on
// the 6th sample. The machine cycles through three phases:
//
//   EarlyPrediction  every `early_interval_ticks`, classify the leading
//                    slice with the early set; a vocabulary gesture becomes
//                    the working label and is emitted as (early, label)
//   Validation       every `validation_interval_ticks`, classify the full
//                    window with the validation set; agreement emits
//                    (vali, label), disagreement emits (none, result) and
//                    `max_validation_mismatches` in a row abandon the label
//   Validated        idle for `rest_interval_ticks`, then classify the
//                    leading slice with the early set on every tick until
//                    the rest pose appears; that emits (end, none) and
//                    clears the window
//
// A failed inference leaves counters and the working label untouched, so the
// same decision is retried on the next tick.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::classifier::ClassifierBank;
use crate::analysis::label::{GestureLabel, PredictionEvent, PredictionStage};
use crate::analysis::window::{WindowBuffer, WindowConfig};
use crate::config::ClassificationConfig;
use crate::error::ClassificationError;
use crate::packet::Sample;

/// Debounce phase of the classification machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    EarlyPrediction,
    Validation,
    Validated,
}

impl fmt::Display for GesturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GesturePhase::EarlyPrediction => "EARLY_PREDICTION",
            GesturePhase::Validation => "VALIDATION",
            GesturePhase::Validated => "VALIDATED",
        };
        f.write_str(name)
    }
}

/// Classification state owned by the classification worker
pub struct GestureStateMachine {
    bank: ClassifierBank,
    window: WindowBuffer,
    config: ClassificationConfig,
    phase: GesturePhase,
    working_label: GestureLabel,
    early_ticks: u32,
    validation_ticks: u32,
    rest_ticks: u32,
    mismatches: u32,
}

impl GestureStateMachine {
    /// Fails on an empty `window` or a bank that does not fit its geometry
    pub fn new(
        bank: ClassifierBank,
        window: WindowConfig,
        config: ClassificationConfig,
    ) -> Result<Self, ClassificationError> {
        bank.check_window(&window)?;
        Ok(Self {
            bank,
            window: WindowBuffer::with_deadzone(window, config.deadzone),
            config,
            phase: GesturePhase::EarlyPrediction,
            working_label: GestureLabel::None,
            early_ticks: 0,
            validation_ticks: 0,
            rest_ticks: 0,
            mismatches: 0,
        })
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    pub fn working_label(&self) -> &GestureLabel {
        &self.working_label
    }

    pub fn window(&self) -> &WindowBuffer {
        &self.window
    }

    /// Consecutive validation disagreements for the current working label
    pub fn mismatches(&self) -> u32 {
        self.mismatches
    }

    /// Append a decoded sample to the window
    ///
    /// A sample of another dimensionality is a fatal configuration error:
    /// there is no classifier set for it.
    pub fn push_sample(&mut self, sample: &Sample) -> Result<(), ClassificationError> {
        let configured = self.window.config().dimensionality;
        if sample.dimensionality != configured {
            return Err(ClassificationError::DimensionalityMismatch {
                configured: configured.name(),
                received: sample.dimensionality.name(),
            });
        }
        self.window.append(&sample.values);
        Ok(())
    }

    /// Append a sample and advance one tick
    pub fn on_sample(&mut self, sample: &Sample) -> Result<PredictionEvent, ClassificationError> {
        self.push_sample(sample)?;
        self.tick()
    }

    /// Advance the machine by one tick
    pub fn tick(&mut self) -> Result<PredictionEvent, ClassificationError> {
        match self.phase {
            GesturePhase::EarlyPrediction => self.tick_early(),
            GesturePhase::Validation => self.tick_validation(),
            GesturePhase::Validated => self.tick_validated(),
        }
    }

    fn tick_early(&mut self) -> Result<PredictionEvent, ClassificationError> {
        if self.early_ticks < self.config.early_interval_ticks {
            self.early_ticks += 1;
            return Ok(PredictionEvent::idle());
        }

        let (label, vote) = self.bank.early().predict(self.window.early_slice())?;
        self.early_ticks = 0;

        if label.is_idle() {
            tracing::trace!(
                "[GestureMachine] {}: early result {} ({:.2}), staying",
                self.phase,
                label,
                vote
            );
            return Ok(PredictionEvent::idle());
        }

        tracing::debug!(
            "[GestureMachine] {}: early {} ({:.2}), validating",
            self.phase,
            label,
            vote
        );
        self.working_label = label.clone();
        self.validation_ticks = 0;
        self.phase = GesturePhase::Validation;
        Ok(PredictionEvent::new(PredictionStage::Early, label))
    }

    fn tick_validation(&mut self) -> Result<PredictionEvent, ClassificationError> {
        if self.validation_ticks < self.config.validation_interval_ticks {
            self.validation_ticks += 1;
            return Ok(PredictionEvent::idle());
        }

        let (label, vote) = self.bank.validation().predict(self.window.snapshot())?;
        self.validation_ticks = 0;

        if label == self.working_label {
            tracing::info!(
                "[GestureMachine] {}: validated {} ({:.2})",
                self.phase,
                label,
                vote
            );
            self.working_label = GestureLabel::None;
            self.mismatches = 0;
            self.rest_ticks = 0;
            self.phase = GesturePhase::Validated;
            return Ok(PredictionEvent::new(PredictionStage::Vali, label));
        }

        self.mismatches += 1;
        tracing::debug!(
            "[GestureMachine] {}: expected {}, got {} ({:.2}), mismatch {}/{}",
            self.phase,
            self.working_label,
            label,
            vote,
            self.mismatches,
            self.config.max_validation_mismatches
        );
        if self.mismatches >= self.config.max_validation_mismatches {
            tracing::info!(
                "[GestureMachine] {}: abandoning {} after {} mismatches",
                self.phase,
                self.working_label,
                self.mismatches
            );
            self.reset_to_early();
        }
        Ok(PredictionEvent::new(PredictionStage::None, label))
    }

    fn tick_validated(&mut self) -> Result<PredictionEvent, ClassificationError> {
        // The rest counter is never re-armed here: once it reaches the
        // interval, every tick polls for the rest pose.
        if self.rest_ticks < self.config.rest_interval_ticks {
            self.rest_ticks += 1;
            return Ok(PredictionEvent::idle());
        }

        let (label, _) = self.bank.early().predict(self.window.early_slice())?;
        if label != GestureLabel::Still {
            return Ok(PredictionEvent::idle());
        }

        tracing::debug!("[GestureMachine] {}: rest pose, clearing window", self.phase);
        self.window.clear();
        self.reset_to_early();
        Ok(PredictionEvent::new(PredictionStage::End, GestureLabel::None))
    }

    fn reset_to_early(&mut self) {
        self.working_label = GestureLabel::None;
        self.early_ticks = 0;
        self.validation_ticks = 0;
        self.rest_ticks = 0;
        self.mismatches = 0;
        self.phase = GesturePhase::EarlyPrediction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::ClassifierSet;
    use crate::packet::Dimensionality;
    use crate::testing::fixtures::{
        sample_2d, sample_3d, ConstantVoteModel, FailingModel, ScriptedVoteModel, VoteScript,
    };

    struct Scripts {
        early_start: VoteScript,
        early_still: VoteScript,
        validation_start: VoteScript,
    }

    fn scripted_machine() -> (GestureStateMachine, Scripts) {
        let (early_start_model, early_start) = ScriptedVoteModel::new("start", 0.0);
        let (early_still_model, early_still) =
            ScriptedVoteModel::new(GestureLabel::STILL, 0.0);
        let (validation_model, validation_start) = ScriptedVoteModel::new("start", 0.0);

        let early = ClassifierSet::new()
            .with_model("start", Box::new(early_start_model))
            .and_then(|set| set.with_model(GestureLabel::STILL, Box::new(early_still_model)))
            .unwrap();
        let validation = ClassifierSet::new()
            .with_model("start", Box::new(validation_model))
            .unwrap();
        let bank = ClassifierBank::new(Dimensionality::ThreeD, early, validation).unwrap();
        let machine = GestureStateMachine::new(
            bank,
            WindowConfig::default(),
            ClassificationConfig::default(),
        )
        .unwrap();

        (
            machine,
            Scripts {
                early_start,
                early_still,
                validation_start,
            },
        )
    }

    fn motion() -> Sample {
        sample_3d([1.5, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    /// Run `ticks` ticks and collect the non-idle events with their tick number
    fn run(
        machine: &mut GestureStateMachine,
        ticks: usize,
    ) -> Vec<(usize, PredictionEvent)> {
        (1..=ticks)
            .filter_map(|tick| {
                let event = machine.on_sample(&motion()).unwrap();
                (!event.is_idle()).then_some((tick, event))
            })
            .collect()
    }

    #[test]
    fn test_full_gesture_cycle() {
        let (mut machine, scripts) = scripted_machine();
        scripts.early_start.push(&[0.9]);
        scripts.validation_start.push(&[0.95]);
        // tick 6 early pass, tick 23 first rest poll, tick 24 rest pose
        scripts.early_still.push(&[0.0, 0.1, 0.9]);

        let events = run(&mut machine, 24);
        assert_eq!(
            events,
            vec![
                (
                    6,
                    PredictionEvent::new(PredictionStage::Early, GestureLabel::gesture("start"))
                ),
                (
                    17,
                    PredictionEvent::new(PredictionStage::Vali, GestureLabel::gesture("start"))
                ),
                (24, PredictionEvent::new(PredictionStage::End, GestureLabel::None)),
            ]
        );
        assert_eq!(machine.phase(), GesturePhase::EarlyPrediction);
        assert_eq!(machine.working_label(), &GestureLabel::None);
        assert_eq!(machine.window().filled(), 0);
        assert!(machine.window().snapshot().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_early_never_advances_on_unknown_or_still() {
        let (mut machine, scripts) = scripted_machine();
        // alternate rest pose and low-confidence results
        for _ in 0..10 {
            scripts.early_still.push(&[0.9, 0.0]);
        }

        let events = run(&mut machine, 100);
        assert!(events.is_empty(), "{:?}", events);
        assert_eq!(machine.phase(), GesturePhase::EarlyPrediction);
        // one early pass every 6 ticks
        assert_eq!(scripts.early_start.calls(), 16);
        assert_eq!(scripts.validation_start.calls(), 0);
    }

    #[test]
    fn test_nine_mismatches_return_to_early() {
        let (mut machine, scripts) = scripted_machine();
        scripts.early_start.push(&[0.9]);

        run(&mut machine, 6);
        assert_eq!(machine.phase(), GesturePhase::Validation);

        // one validation pass every 11 ticks
        let events = run(&mut machine, 88);
        assert_eq!(events.len(), 8);
        assert!(events.iter().all(|(_, e)| e.stage == PredictionStage::None
            && e.label == GestureLabel::Unknown));
        assert_eq!(machine.phase(), GesturePhase::Validation);
        assert_eq!(machine.mismatches(), 8);
        assert_eq!(machine.working_label(), &GestureLabel::gesture("start"));

        let events = run(&mut machine, 11);
        assert_eq!(events.len(), 1);
        assert_eq!(machine.phase(), GesturePhase::EarlyPrediction);
        assert_eq!(machine.working_label(), &GestureLabel::None);
        assert_eq!(machine.mismatches(), 0);
    }

    #[test]
    fn test_mismatch_then_match_validates() {
        let (mut machine, scripts) = scripted_machine();
        scripts.early_start.push(&[0.9]);
        scripts.validation_start.push(&[0.1, 0.1, 0.8]);

        let events = run(&mut machine, 39);
        let stages: Vec<_> = events.iter().map(|(t, e)| (*t, e.stage)).collect();
        assert_eq!(
            stages,
            vec![
                (6, PredictionStage::Early),
                (17, PredictionStage::None),
                (28, PredictionStage::None),
                (39, PredictionStage::Vali),
            ]
        );
        assert_eq!(machine.mismatches(), 0);
    }

    #[test]
    fn test_validated_polls_every_tick_after_rest_interval() {
        let (mut machine, scripts) = scripted_machine();
        scripts.early_start.push(&[0.9]);
        scripts.validation_start.push(&[0.95]);

        run(&mut machine, 17);
        assert_eq!(machine.phase(), GesturePhase::Validated);
        let calls_at_validation = scripts.early_still.calls();

        run(&mut machine, 5);
        assert_eq!(scripts.early_still.calls(), calls_at_validation);

        run(&mut machine, 7);
        assert_eq!(scripts.early_still.calls(), calls_at_validation + 7);
        assert_eq!(machine.phase(), GesturePhase::Validated);
        assert!(machine.window().filled() > 0);
    }

    #[test]
    fn test_classifier_error_keeps_working_label() {
        let early = ClassifierSet::new()
            .with_model("land", ConstantVoteModel::boxed("land", 0.9))
            .unwrap();
        let validation = ClassifierSet::new()
            .with_model("land", Box::new(FailingModel::new("land")))
            .unwrap();
        let bank = ClassifierBank::new(Dimensionality::ThreeD, early, validation).unwrap();
        let mut machine = GestureStateMachine::new(
            bank,
            WindowConfig::default(),
            ClassificationConfig::default(),
        )
        .unwrap();

        for _ in 0..16 {
            machine.on_sample(&motion()).unwrap();
        }
        for _ in 0..3 {
            let err = machine.on_sample(&motion()).unwrap_err();
            assert!(!err.is_fatal());
            assert_eq!(machine.phase(), GesturePhase::Validation);
            assert_eq!(machine.working_label(), &GestureLabel::gesture("land"));
        }
    }

    #[test]
    fn test_other_dimensionality_is_fatal() {
        let (mut machine, _) = scripted_machine();
        let err = machine
            .on_sample(&sample_2d([1.0, 1.0, 1.0]))
            .unwrap_err();
        assert_eq!(
            err,
            ClassificationError::DimensionalityMismatch {
                configured: "3D",
                received: "2D"
            }
        );
        assert!(err.is_fatal());
        assert_eq!(machine.window().filled(), 0);
    }

    #[test]
    fn test_bank_for_other_dimensionality_is_rejected() {
        let set = || {
            ClassifierSet::new()
                .with_model("start", ConstantVoteModel::boxed("start", 0.9))
                .unwrap()
        };
        let bank = ClassifierBank::new(Dimensionality::TwoD, set(), set()).unwrap();
        let result = GestureStateMachine::new(
            bank,
            WindowConfig::new(Dimensionality::ThreeD),
            ClassificationConfig::default(),
        );
        assert!(matches!(
            result,
            Err(ClassificationError::DimensionalityMismatch { .. })
        ));
    }
}
