use gesture_pilot::analysis::{ClassifierBank, ClassifierSet, PredictionStage};
use gesture_pilot::config::{AppConfig, FlightConfig};
use gesture_pilot::flight::{FlightExit, Position, RecordingActuator, VehicleCommand, Waypoint};
use gesture_pilot::packet::Dimensionality;
use gesture_pilot::telemetry::MetricEvent;
use gesture_pilot::testing::fixtures::{
    direct_packet, gesture_packet_3d, AxisThresholdModel, RestNoise, RestPoseModel,
};
use gesture_pilot::PipelineHandle;

const ACC_X: usize = 0;

fn config() -> AppConfig {
    AppConfig {
        flight: FlightConfig {
            land_settle_ms: 0,
            ..FlightConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Early set: `start` on a strong acc-x swing, `stillGesture` on a flat slice.
/// Validation set: `start` only.
fn start_bank() -> ClassifierBank {
    let width = Dimensionality::ThreeD.sample_width();
    let early = ClassifierSet::new()
        .with_model(
            "start",
            Box::new(AxisThresholdModel::new("start", width, ACC_X, 1.0, 0.9)),
        )
        .and_then(|set| set.with_model("stillGesture", Box::new(RestPoseModel::new(0.9))))
        .expect("early set");
    let validation = ClassifierSet::new()
        .with_model(
            "start",
            Box::new(AxisThresholdModel::new("start", width, ACC_X, 1.0, 0.9)),
        )
        .expect("validation set");
    ClassifierBank::new(Dimensionality::ThreeD, early, validation).expect("bank")
}

#[test]
fn start_gesture_takes_off_exactly_once() {
    let (actuator, log) = RecordingActuator::new();
    let pipeline = PipelineHandle::start(&config(), start_bank(), Box::new(actuator))
        .expect("pipeline starts");
    let input = pipeline.input().clone();

    for ts in 0..10u16 {
        input
            .submit_raw_sample(&gesture_packet_3d(ts * 20, 2.0))
            .expect("gesture sample accepted");
    }
    let mut noise = RestNoise::new(42);
    for _ in 0..70 {
        input
            .submit_raw_sample(&noise.next_packet())
            .expect("rest sample accepted");
    }
    drop(input);

    let report = pipeline.shutdown().expect("clean shutdown");
    assert!(report.classification.is_ok());
    assert_eq!(report.flight.expect("flight ok"), FlightExit::ChannelsClosed);

    assert_eq!(
        log.commands(),
        vec![VehicleCommand::Takeoff {
            altitude_m: 0.3,
            duration_s: 0.6
        }]
    );

    let stages: Vec<PredictionStage> = report
        .telemetry
        .recent
        .iter()
        .filter_map(|event| match event {
            MetricEvent::Gesture { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            PredictionStage::Early,
            PredictionStage::Vali,
            PredictionStage::End
        ]
    );
}

#[test]
fn resting_hand_never_produces_events() {
    let (actuator, log) = RecordingActuator::new();
    let pipeline = PipelineHandle::start(&config(), start_bank(), Box::new(actuator))
        .expect("pipeline starts");

    let mut noise = RestNoise::new(7);
    for _ in 0..120 {
        pipeline
            .input()
            .submit_packet(&noise.next_packet())
            .expect("rest sample accepted");
    }

    let report = pipeline.shutdown().expect("clean shutdown");
    assert!(log.commands().is_empty());
    assert_eq!(
        report
            .telemetry
            .count(|e| matches!(e, MetricEvent::Gesture { .. })),
        0
    );
}

#[test]
fn held_direction_moves_once_after_auto_takeoff() {
    let (actuator, log) = RecordingActuator::new();
    let pipeline = PipelineHandle::start(&config(), start_bank(), Box::new(actuator))
        .expect("pipeline starts");

    for _ in 0..5 {
        pipeline
            .input()
            .submit_direct_frame(&direct_packet(1, [0.0; 3], [0; 4]))
            .expect("direct frame accepted");
    }

    let report = pipeline.shutdown().expect("clean shutdown");
    assert!(report.flight.is_ok());
    assert_eq!(
        log.commands(),
        vec![
            VehicleCommand::Takeoff {
                altitude_m: 0.3,
                duration_s: 0.6
            },
            VehicleCommand::RelativeMove {
                dx: 0.0,
                dy: 0.1,
                dz: 0.0,
                duration_s: 0.1
            },
        ]
    );
}

#[test]
fn held_direction_without_auto_takeoff_moves_once() {
    let mut config = config();
    config.flight.direct_auto_takeoff = false;
    let (actuator, log) = RecordingActuator::new();
    let pipeline =
        PipelineHandle::start(&config, start_bank(), Box::new(actuator)).expect("pipeline starts");

    for _ in 0..5 {
        pipeline
            .input()
            .submit_packet(&direct_packet(1, [0.0; 3], [0; 4]))
            .expect("direct frame accepted");
    }

    pipeline.shutdown().expect("clean shutdown");
    assert_eq!(log.count("relative_move"), 1);
    assert_eq!(log.count("takeoff"), 0);
}

#[test]
fn set_set_delete_keeps_first_waypoint() {
    let (actuator, log) = RecordingActuator::new();
    log.set_position(Position::new(0.5, 1.5, 0.0));
    let pipeline = PipelineHandle::start(&config(), start_bank(), Box::new(actuator))
        .expect("pipeline starts");

    // Takeoff lifts the simulated vehicle, so the two waypoints differ in z
    for label in ["wp_set", "start", "wp_set", "wp_del", "wp_next"] {
        pipeline
            .input()
            .submit_gesture_event(PredictionStage::Vali, label, [0; 4])
            .expect("event accepted");
    }

    let report = pipeline.shutdown().expect("clean shutdown");
    assert!(report.flight.is_ok());
    assert_eq!(
        log.commands(),
        vec![
            VehicleCommand::Takeoff {
                altitude_m: 0.3,
                duration_s: 0.6
            },
            VehicleCommand::GoTo {
                x: 0.5,
                y: 1.5,
                z: 0.0,
                yaw: 0.0,
                duration_s: 5.0
            },
        ]
    );
    assert_eq!(
        Waypoint::from(log.position()),
        Waypoint {
            x: 0.5,
            y: 1.5,
            z: 0.0,
            yaw: 0.0
        }
    );
}

#[test]
fn empty_stack_navigation_only_warns() {
    let (actuator, log) = RecordingActuator::new();
    let pipeline = PipelineHandle::start(&config(), start_bank(), Box::new(actuator))
        .expect("pipeline starts");

    for label in ["wp_next", "wp_back", "wp_del"] {
        pipeline
            .input()
            .submit_gesture_event(PredictionStage::Vali, label, [0; 4])
            .expect("event accepted");
    }

    let report = pipeline.shutdown().expect("clean shutdown");
    assert!(report.flight.is_ok());
    assert!(log.commands().is_empty());
    assert_eq!(
        report
            .telemetry
            .count(|e| matches!(e, MetricEvent::StateWarning { .. })),
        3
    );
}

#[test]
fn emergency_button_lands_and_ends_flight_loop() {
    let (actuator, log) = RecordingActuator::new();
    let pipeline = PipelineHandle::start(&config(), start_bank(), Box::new(actuator))
        .expect("pipeline starts");

    pipeline
        .input()
        .submit_gesture_event(PredictionStage::Vali, "start", [0; 4])
        .expect("event accepted");
    pipeline
        .input()
        .submit_direct_frame(&direct_packet(0, [0.0; 3], [1, 0, 0, 0]))
        .expect("direct frame accepted");

    let report = pipeline.shutdown().expect("clean shutdown");
    assert_eq!(report.flight.expect("flight ok"), FlightExit::EmergencyLand);
    assert_eq!(log.count("land"), 1);
    assert_eq!(log.count("stop"), 1);
}
