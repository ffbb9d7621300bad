use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gesture_pilot::analysis::{load_classifier_bank, GestureLabel, GestureMessage, PredictionEvent, PredictionStage};
use gesture_pilot::config::AppConfig;
use gesture_pilot::error::ErrorCode;
use gesture_pilot::flight::{FlightStateMachine, FlightStep, RecordingActuator, VehicleCommand, Waypoint};
use gesture_pilot::packet::{decode_with_deadzone, ButtonState, DirectFrame, PACKET_LEN};
use gesture_pilot::telemetry::{MetricEvent, TelemetryHub};
use gesture_pilot::{init_logging, PipelineHandle};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "gesture_pilot",
    about = "Replay and inspect wearable gesture streams against a simulated vehicle"
)]
struct Cli {
    /// Configuration file (defaults to assets/gesture_pilot.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a hex packet log through the full pipeline
    Run {
        /// One 20-byte packet per line as hex, `#` starts a comment
        #[arg(long)]
        input: PathBuf,
        /// Model directory, overrides classification.models_dir
        #[arg(long)]
        models: Option<PathBuf>,
    },
    /// Decode hex packets and print them as JSON
    Decode {
        #[arg(required = true)]
        packets: Vec<String>,
        #[arg(long, default_value_t = 0.5)]
        deadzone: f32,
    },
    /// Feed a JSON list of gesture events and direct frames to the flight machine
    Script {
        #[arg(long)]
        file: PathBuf,
        /// Override the post-landing settle delay
        #[arg(long)]
        settle_ms: Option<u64>,
    },
}

#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ScriptStep {
    Gesture {
        stage: PredictionStage,
        label: GestureLabel,
        #[serde(default)]
        buttons: [i8; 4],
    },
    Direct {
        code: u8,
        #[serde(default)]
        buttons: [i8; 4],
    },
}

#[derive(Serialize)]
struct FlightReport<'a> {
    outcome: String,
    commands: Vec<VehicleCommand>,
    waypoints: &'a [Waypoint],
    warnings: usize,
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Run { input, models } => run_replay(config, &input, models),
        Commands::Decode { packets, deadzone } => run_decode(&packets, deadzone),
        Commands::Script { file, settle_ms } => run_script(config, &file, settle_ms),
    }
}

fn run_replay(config: AppConfig, input: &Path, models: Option<PathBuf>) -> Result<ExitCode> {
    let Some(models_dir) = models.or_else(|| config.classification.models_dir.clone()) else {
        bail!("no model directory: pass --models or set classification.models_dir");
    };
    let bank = load_classifier_bank(
        &models_dir,
        &config.window,
        config.classification.unknown_threshold,
    )?;
    let log = fs::read_to_string(input)
        .with_context(|| format!("reading packet log {}", input.display()))?;

    let (actuator, commands) = RecordingActuator::new();
    let pipeline = PipelineHandle::start(&config, bank, Box::new(actuator))
        .context("starting pipeline")?;

    let mut rejected = 0usize;
    for (line_no, line) in packet_lines(&log) {
        let bytes = parse_hex(line).with_context(|| format!("line {}", line_no))?;
        if pipeline.is_flight_finished() {
            eprintln!("Flight loop ended at line {}, stopping replay", line_no);
            break;
        }
        // Decode failures are already logged and counted by the pipeline
        if pipeline.input().submit_packet(&bytes).is_err() {
            rejected += 1;
        }
    }

    let report = pipeline.shutdown()?;
    let outcome = match (&report.classification, &report.flight) {
        (Ok(()), Ok(exit)) => format!("{:?}", exit),
        (Err(err), _) => format!("classification failed: code {}", err.code()),
        (_, Err(err)) => format!("flight failed: code {}", err.code()),
    };
    let success = report.classification.is_ok() && report.flight.is_ok();

    let summary = serde_json::json!({
        "outcome": outcome,
        "rejected_packets": rejected,
        "commands": commands.commands(),
        "gesture_events": report.telemetry.count(|e| matches!(e, MetricEvent::Gesture { .. })),
        "warnings": report.telemetry.count(|e| matches!(e, MetricEvent::StateWarning { .. })),
        "dropped_telemetry": report.telemetry.dropped_events,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(if success {
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    })
}

fn run_decode(packets: &[String], deadzone: f32) -> Result<ExitCode> {
    let mut failed = false;
    for text in packets {
        let bytes = parse_hex(text)?;
        match decode_with_deadzone(&bytes, deadzone) {
            Ok(packet) => println!("{}", serde_json::to_string(&packet)?),
            Err(err) => {
                failed = true;
                eprintln!(
                    "{}",
                    serde_json::json!({ "code": err.code(), "message": err.message() })
                );
            }
        }
    }
    Ok(if failed {
        ExitCode::from(2)
    } else {
        ExitCode::from(0)
    })
}

fn run_script(mut config: AppConfig, file: &Path, settle_ms: Option<u64>) -> Result<ExitCode> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("reading script {}", file.display()))?;
    let steps: Vec<ScriptStep> = serde_json::from_str(&text)
        .with_context(|| format!("parsing script {}", file.display()))?;
    if let Some(ms) = settle_ms {
        config.flight.land_settle_ms = ms;
    }

    let telemetry = Arc::new(TelemetryHub::default());
    let (actuator, commands) = RecordingActuator::new();
    let mut machine =
        FlightStateMachine::new(Box::new(actuator), config.flight, Arc::clone(&telemetry));

    let mut outcome = String::from("completed");
    let mut success = true;
    for step in steps {
        let result = match step {
            ScriptStep::Gesture {
                stage,
                label,
                buttons,
            } => machine.handle_gesture(&GestureMessage {
                event: PredictionEvent::new(stage, label),
                buttons: ButtonState(buttons),
            }),
            ScriptStep::Direct { code, buttons } => machine.handle_direct(&DirectFrame {
                code,
                roll: 0.0,
                pitch: 0.0,
                yaw: 0.0,
                buttons: ButtonState(buttons),
            }),
        };
        match result {
            Ok(FlightStep::Continue) => {}
            Ok(FlightStep::Halt) => {
                outcome = String::from("emergency_land");
                break;
            }
            Err(err) => {
                outcome = format!("failed: code {}", err.code());
                success = false;
                break;
            }
        }
    }

    let report = FlightReport {
        outcome,
        commands: commands.commands(),
        waypoints: machine.waypoints().as_slice(),
        warnings: telemetry
            .snapshot()
            .count(|e| matches!(e, MetricEvent::StateWarning { .. })),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if success {
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    })
}

fn packet_lines(log: &str) -> impl Iterator<Item = (usize, &str)> {
    log.lines().enumerate().filter_map(|(index, line)| {
        let line = line.split('#').next().unwrap_or_default().trim();
        (!line.is_empty()).then_some((index + 1, line))
    })
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("non-hex characters in {:?}", text);
    }
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits in {:?}", text);
    }
    let bytes = (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect::<Result<Vec<u8>>>()?;
    if bytes.len() != PACKET_LEN {
        tracing::debug!("[CLI] {} bytes in {:?}, expected {}", bytes.len(), text, PACKET_LEN);
    }
    Ok(bytes)
}
