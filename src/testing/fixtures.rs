//! Deterministic packet builders and stand-in models for tests and harnesses.
//!
//! Packets are assembled byte-for-byte in the wearable's wire layout so the
//! decoder is exercised the same way live data would exercise it. The models
//! implement [`OneVsRestModel`] with simple, inspectable rules in place of
//! trained networks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::analysis::classifier::{OneVsRestModel, UNKNOWN_CLASS};
use crate::error::ClassificationError;
use crate::packet::{ButtonState, Dimensionality, RawPacket, Sample, PACKET_LEN};

/// Largest raw accelerometer count still inside the default deadzone
pub const ACC_DEADZONE_RAW: i16 = 409;

/// Largest raw gyroscope count still inside the default deadzone
pub const GYRO_DEADZONE_RAW: i16 = 16;

fn put_i16(bytes: &mut RawPacket, offset: usize, value: i16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_buttons(bytes: &mut RawPacket, buttons: [i8; 4]) {
    for (i, flag) in buttons.iter().enumerate() {
        bytes[14 + i] = *flag as u8;
    }
}

/// Mode 1 packet from raw sensor counts
pub fn motion_packet_3d(
    timestamp: u16,
    acc_raw: [i16; 3],
    gyro_raw: [i16; 3],
    buttons: [i8; 4],
) -> RawPacket {
    let mut bytes = [0u8; PACKET_LEN];
    bytes[0..2].copy_from_slice(&timestamp.to_le_bytes());
    for (axis, value) in acc_raw.iter().chain(gyro_raw.iter()).enumerate() {
        put_i16(&mut bytes, 2 + axis * 2, *value);
    }
    put_buttons(&mut bytes, buttons);
    bytes[19] = 1;
    bytes
}

/// Mode 2 packet: acc x, acc y, gyro z
pub fn motion_packet_2d(
    timestamp: u16,
    acc_raw: [i16; 2],
    gyro_z_raw: i16,
    buttons: [i8; 4],
) -> RawPacket {
    let mut bytes = [0u8; PACKET_LEN];
    bytes[0..2].copy_from_slice(&timestamp.to_le_bytes());
    put_i16(&mut bytes, 2, acc_raw[0]);
    put_i16(&mut bytes, 4, acc_raw[1]);
    put_i16(&mut bytes, 6, gyro_z_raw);
    put_buttons(&mut bytes, buttons);
    bytes[19] = 2;
    bytes
}

/// Mode 3 packet: direction code, roll/pitch/yaw
pub fn direct_packet(code: u8, attitude: [f32; 3], buttons: [i8; 4]) -> RawPacket {
    let mut bytes = [0u8; PACKET_LEN];
    bytes[0] = code;
    for (i, value) in attitude.iter().enumerate() {
        let offset = 1 + i * 4;
        bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
    put_buttons(&mut bytes, buttons);
    bytes[19] = 3;
    bytes
}

/// 3D packet whose acc x reads as `acc_x_g` after scaling
pub fn gesture_packet_3d(timestamp: u16, acc_x_g: f32) -> RawPacket {
    let raw = (acc_x_g * crate::packet::ACC_COMPRESSION).round() as i16;
    motion_packet_3d(timestamp, [raw, 0, 0], [0, 0, 0], [0; 4])
}

/// Already-decoded 3D sample
pub fn sample_3d(values: [f32; 6]) -> Sample {
    Sample {
        timestamp: 0,
        dimensionality: Dimensionality::ThreeD,
        values: values.to_vec(),
        buttons: ButtonState::default(),
    }
}

/// Already-decoded 2D sample
pub fn sample_2d(values: [f32; 3]) -> Sample {
    Sample {
        timestamp: 0,
        dimensionality: Dimensionality::TwoD,
        values: values.to_vec(),
        buttons: ButtonState::default(),
    }
}

/// Seeded source of resting-hand packets
///
/// Every axis jitters strictly inside the deadzone, so the decoded sample is
/// all zeros while the raw bytes differ from packet to packet.
pub struct RestNoise {
    rng: StdRng,
    timestamp: u16,
}

impl RestNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            timestamp: 0,
        }
    }

    pub fn next_packet(&mut self) -> RawPacket {
        let acc = [
            self.rng.gen_range(-ACC_DEADZONE_RAW..=ACC_DEADZONE_RAW),
            self.rng.gen_range(-ACC_DEADZONE_RAW..=ACC_DEADZONE_RAW),
            self.rng.gen_range(-ACC_DEADZONE_RAW..=ACC_DEADZONE_RAW),
        ];
        let gyro = [
            self.rng.gen_range(-GYRO_DEADZONE_RAW..=GYRO_DEADZONE_RAW),
            self.rng.gen_range(-GYRO_DEADZONE_RAW..=GYRO_DEADZONE_RAW),
            self.rng.gen_range(-GYRO_DEADZONE_RAW..=GYRO_DEADZONE_RAW),
        ];
        self.timestamp = self.timestamp.wrapping_add(20);
        motion_packet_3d(self.timestamp, acc, gyro, [0; 4])
    }
}

/// Output classes of a binary one-vs-rest model
pub fn binary_classes(label: &str, unknown_first: bool) -> Vec<String> {
    if unknown_first {
        vec![UNKNOWN_CLASS.to_string(), label.to_string()]
    } else {
        vec![label.to_string(), UNKNOWN_CLASS.to_string()]
    }
}

fn binary_proba(vote: f32, unknown_first: bool) -> Vec<f32> {
    if unknown_first {
        vec![1.0 - vote, vote]
    } else {
        vec![vote, 1.0 - vote]
    }
}

/// Model that always casts the same vote
pub struct ConstantVoteModel {
    classes: Vec<String>,
    unknown_first: bool,
    vote: f32,
}

impl ConstantVoteModel {
    pub fn new(label: &str, vote: f32) -> Self {
        Self::with_column_order(label, vote, false)
    }

    pub fn with_column_order(label: &str, vote: f32, unknown_first: bool) -> Self {
        Self {
            classes: binary_classes(label, unknown_first),
            unknown_first,
            vote,
        }
    }

    pub fn boxed(label: &str, vote: f32) -> Box<dyn OneVsRestModel> {
        Box::new(Self::new(label, vote))
    }
}

impl OneVsRestModel for ConstantVoteModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f32>, ClassificationError> {
        Ok(binary_proba(self.vote, self.unknown_first))
    }
}

/// Shared handle to feed and inspect a [`ScriptedVoteModel`]
#[derive(Clone, Default)]
pub struct VoteScript {
    votes: Arc<Mutex<VecDeque<f32>>>,
    calls: Arc<AtomicUsize>,
}

impl VoteScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue votes returned by the next calls, oldest first
    pub fn push(&self, votes: &[f32]) {
        if let Ok(mut queue) = self.votes.lock() {
            queue.extend(votes.iter().copied());
        }
    }

    /// Number of inference calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Model that replays queued votes, then falls back to a fixed vote
pub struct ScriptedVoteModel {
    classes: Vec<String>,
    script: VoteScript,
    fallback: f32,
}

impl ScriptedVoteModel {
    pub fn new(label: &str, fallback: f32) -> (Self, VoteScript) {
        let script = VoteScript::new();
        (
            Self {
                classes: binary_classes(label, false),
                script: script.clone(),
                fallback,
            },
            script,
        )
    }
}

impl OneVsRestModel for ScriptedVoteModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f32>, ClassificationError> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        let vote = self
            .script
            .votes
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or(self.fallback);
        Ok(binary_proba(vote, false))
    }
}

/// Votes `hit` when any sample's value on `axis` reaches `trigger`
pub struct AxisThresholdModel {
    classes: Vec<String>,
    sample_width: usize,
    axis: usize,
    trigger: f32,
    hit: f32,
    miss: f32,
}

impl AxisThresholdModel {
    pub fn new(label: &str, sample_width: usize, axis: usize, trigger: f32, hit: f32) -> Self {
        Self {
            classes: binary_classes(label, true),
            sample_width,
            axis,
            trigger,
            hit,
            miss: 0.05,
        }
    }
}

impl OneVsRestModel for AxisThresholdModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ClassificationError> {
        let triggered = features
            .chunks(self.sample_width)
            .filter_map(|sample| sample.get(self.axis))
            .any(|value| *value >= self.trigger);
        let vote = if triggered { self.hit } else { self.miss };
        Ok(binary_proba(vote, true))
    }
}

/// Votes `hit` when the whole slice is at rest (all zeros)
pub struct RestPoseModel {
    classes: Vec<String>,
    hit: f32,
}

impl RestPoseModel {
    pub fn new(hit: f32) -> Self {
        Self {
            classes: binary_classes(crate::analysis::GestureLabel::STILL, false),
            hit,
        }
    }
}

impl OneVsRestModel for RestPoseModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ClassificationError> {
        let vote = if features.iter().all(|v| *v == 0.0) {
            self.hit
        } else {
            0.05
        };
        Ok(binary_proba(vote, false))
    }
}

/// Model whose inference always fails
pub struct FailingModel {
    classes: Vec<String>,
}

impl FailingModel {
    pub fn new(label: &str) -> Self {
        Self {
            classes: binary_classes(label, false),
        }
    }
}

impl OneVsRestModel for FailingModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f32>, ClassificationError> {
        Err(ClassificationError::InferenceFailed {
            label: self.classes[0].clone(),
            reason: "simulated backend failure".to_string(),
        })
    }
}
