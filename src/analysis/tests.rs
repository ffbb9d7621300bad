use super::*;
use crate::config::ClassificationConfig;
use crate::packet::Dimensionality;
use crate::telemetry::MetricEvent;
use crate::testing::fixtures::{sample_2d, sample_3d, ConstantVoteModel, FailingModel};

fn machine_with(early_vote: f32, validation: Box<dyn OneVsRestModel>) -> GestureStateMachine {
    let early = ClassifierSet::new()
        .with_model("start", ConstantVoteModel::boxed("start", early_vote))
        .unwrap();
    let validation = ClassifierSet::new().with_model("start", validation).unwrap();
    let bank = ClassifierBank::new(Dimensionality::ThreeD, early, validation).unwrap();
    GestureStateMachine::new(
        bank,
        WindowConfig::default(),
        ClassificationConfig::default(),
    )
    .unwrap()
}

fn moving() -> Sample {
    sample_3d([2.0, 0.0, 0.0, 0.0, 0.0, 0.0])
}

#[test]
fn test_worker_forwards_non_idle_events_with_buttons() {
    let (sample_tx, sample_rx) = mpsc::channel(64);
    let (gesture_tx, mut gesture_rx) = mpsc::channel(64);
    let telemetry = Arc::new(TelemetryHub::default());
    let handle = spawn_classification_thread(
        sample_rx,
        gesture_tx,
        machine_with(0.9, ConstantVoteModel::boxed("start", 0.95)),
        Arc::clone(&telemetry),
    );

    for tick in 0..17 {
        let mut sample = moving();
        if tick == 16 {
            sample.buttons.0 = [0, 0, 1, 0];
        }
        sample_tx.blocking_send(sample).unwrap();
    }
    drop(sample_tx);

    assert!(handle.join().unwrap().is_ok());

    let early = gesture_rx.blocking_recv().unwrap();
    assert_eq!(early.event.stage, PredictionStage::Early);
    let vali = gesture_rx.blocking_recv().unwrap();
    assert_eq!(
        vali.event,
        PredictionEvent::new(PredictionStage::Vali, GestureLabel::gesture("start"))
    );
    assert!(vali.buttons.pressed(2));
    assert!(gesture_rx.blocking_recv().is_none());

    let snapshot = telemetry.snapshot();
    assert_eq!(
        snapshot.count(|e| matches!(e, MetricEvent::Gesture { .. })),
        2
    );
}

#[test]
fn test_worker_survives_classifier_errors() {
    let (sample_tx, sample_rx) = mpsc::channel(64);
    let (gesture_tx, mut gesture_rx) = mpsc::channel(64);
    let telemetry = Arc::new(TelemetryHub::default());
    let handle = spawn_classification_thread(
        sample_rx,
        gesture_tx,
        machine_with(0.9, Box::new(FailingModel::new("start"))),
        Arc::clone(&telemetry),
    );

    for _ in 0..20 {
        sample_tx.blocking_send(moving()).unwrap();
    }
    drop(sample_tx);

    assert!(handle.join().unwrap().is_ok());
    assert_eq!(
        gesture_rx.blocking_recv().unwrap().event.stage,
        PredictionStage::Early
    );
    assert!(gesture_rx.blocking_recv().is_none());
    // ticks 17..=20 each retry the failed validation
    assert_eq!(
        telemetry
            .snapshot()
            .count(|e| matches!(e, MetricEvent::Error { code: 2005, .. })),
        4
    );
}

#[test]
fn test_worker_stops_on_dimensionality_switch() {
    let (sample_tx, sample_rx) = mpsc::channel(8);
    let (gesture_tx, _gesture_rx) = mpsc::channel(8);
    let handle = spawn_classification_thread(
        sample_rx,
        gesture_tx,
        machine_with(0.1, ConstantVoteModel::boxed("start", 0.1)),
        Arc::new(TelemetryHub::default()),
    );

    sample_tx.blocking_send(moving()).unwrap();
    sample_tx.blocking_send(sample_2d([1.0, 1.0, 1.0])).unwrap();

    let err = handle.join().unwrap().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        ClassificationError::DimensionalityMismatch { .. }
    ));
}
