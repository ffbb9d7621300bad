//! Wearable packet decoding.
//!
//! Every notification from the wearable is a fixed 20-byte little-endian
//! envelope. Byte 19 selects how the rest is read:
//!
//! | mode | layout |
//! |------|--------|
//! | 1 (3D) | `u16` timestamp, six `i16` axes (acc x/y/z, gyro x/y/z), four `i8` buttons |
//! | 2 (2D) | `u16` timestamp, acc x, acc y, gyro z as `i16`, four `i8` buttons |
//! | 3 (direct) | `u8` direction code, roll/pitch/yaw as `f32`, four `i8` buttons |
//!
//! Accelerations are divided by [`ACC_COMPRESSION`], rates by
//! [`GYRO_COMPRESSION`]. Motion scalars inside the deadzone are clamped to 0
//! before they reach the window.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Fixed envelope size in bytes
pub const PACKET_LEN: usize = 20;

/// Raw accelerometer counts per g
pub const ACC_COMPRESSION: f32 = 819.0;

/// Raw gyroscope counts per degree/s
pub const GYRO_COMPRESSION: f32 = 32.0;

/// Default deadzone applied to every motion scalar
pub const DEFAULT_DEADZONE: f32 = 0.5;

const MODE_INDEX: usize = 19;

/// Raw 20-byte envelope as delivered by the transport
pub type RawPacket = [u8; PACKET_LEN];

/// Stream selected by the mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketMode {
    Gesture3d,
    Gesture2d,
    DirectControl,
}

impl PacketMode {
    pub fn from_byte(mode: u8) -> Result<Self, DecodeError> {
        match mode {
            1 => Ok(PacketMode::Gesture3d),
            2 => Ok(PacketMode::Gesture2d),
            3 => Ok(PacketMode::DirectControl),
            other => Err(DecodeError::UnknownMode { mode: other }),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            PacketMode::Gesture3d => 1,
            PacketMode::Gesture2d => 2,
            PacketMode::DirectControl => 3,
        }
    }
}

/// Number of motion axes carried per sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimensionality {
    #[serde(rename = "3d")]
    ThreeD,
    #[serde(rename = "2d")]
    TwoD,
}

impl Dimensionality {
    /// Scalars per sample: acc x/y/z + gyro x/y/z, or acc x/y + gyro z
    pub fn sample_width(self) -> usize {
        match self {
            Dimensionality::ThreeD => 6,
            Dimensionality::TwoD => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dimensionality::ThreeD => "3D",
            Dimensionality::TwoD => "2D",
        }
    }
}

/// The four button flags of the wearable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState(pub [i8; 4]);

impl ButtonState {
    /// A button counts as pressed only when its flag is exactly 1
    pub fn pressed(&self, index: usize) -> bool {
        self.0.get(index).copied() == Some(1)
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        ButtonState([
            bytes[14] as i8,
            bytes[15] as i8,
            bytes[16] as i8,
            bytes[17] as i8,
        ])
    }
}

/// One decoded motion sample (mode 1 or 2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: u16,
    pub dimensionality: Dimensionality,
    /// Deadzone-clamped scalars, `dimensionality.sample_width()` long
    pub values: Vec<f32>,
    pub buttons: ButtonState,
}

/// One decoded direct-control frame (mode 3)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectFrame {
    /// Direction bitmask, 0 is neutral
    pub code: u8,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub buttons: ButtonState,
}

/// Result of decoding one envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Packet {
    Motion(Sample),
    Direct(DirectFrame),
}

/// Read the mode byte without decoding the payload
pub fn peek_mode(bytes: &[u8]) -> Result<PacketMode, DecodeError> {
    check_len(bytes)?;
    PacketMode::from_byte(bytes[MODE_INDEX])
}

/// Decode an envelope using the default deadzone
pub fn decode(bytes: &[u8]) -> Result<Packet, DecodeError> {
    decode_with_deadzone(bytes, DEFAULT_DEADZONE)
}

/// Decode an envelope, clamping motion scalars with `|v| <= deadzone` to 0
pub fn decode_with_deadzone(bytes: &[u8], deadzone: f32) -> Result<Packet, DecodeError> {
    match peek_mode(bytes)? {
        PacketMode::Gesture3d => Ok(Packet::Motion(decode_motion(
            bytes,
            Dimensionality::ThreeD,
            deadzone,
        ))),
        PacketMode::Gesture2d => Ok(Packet::Motion(decode_motion(
            bytes,
            Dimensionality::TwoD,
            deadzone,
        ))),
        PacketMode::DirectControl => Ok(Packet::Direct(decode_direct(bytes))),
    }
}

fn check_len(bytes: &[u8]) -> Result<(), DecodeError> {
    if bytes.len() != PACKET_LEN {
        return Err(DecodeError::InvalidLength {
            expected: PACKET_LEN,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn read_i16(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn clamp_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() <= deadzone {
        0.0
    } else {
        value
    }
}

fn decode_motion(bytes: &[u8], dimensionality: Dimensionality, deadzone: f32) -> Sample {
    let acc = |offset| read_i16(bytes, offset) as f32 / ACC_COMPRESSION;
    let gyro = |offset| read_i16(bytes, offset) as f32 / GYRO_COMPRESSION;

    let raw = match dimensionality {
        Dimensionality::ThreeD => vec![acc(2), acc(4), acc(6), gyro(8), gyro(10), gyro(12)],
        Dimensionality::TwoD => vec![acc(2), acc(4), gyro(6)],
    };

    Sample {
        timestamp: u16::from_le_bytes([bytes[0], bytes[1]]),
        dimensionality,
        values: raw
            .into_iter()
            .map(|v| clamp_deadzone(v, deadzone))
            .collect(),
        buttons: ButtonState::from_bytes(bytes),
    }
}

fn decode_direct(bytes: &[u8]) -> DirectFrame {
    DirectFrame {
        code: bytes[0],
        roll: read_f32(bytes, 1),
        pitch: read_f32(bytes, 5),
        yaw: read_f32(bytes, 9),
        buttons: ButtonState::from_bytes(bytes),
    }
}
