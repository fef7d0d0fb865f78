//! Sensor Frame Decoder
//!
//! Turns a 4-byte proximity frame (`up, right, down, left`) into a pointer
//! intent. A flat hand covering the right, down and left sensors is a click;
//! anything else moves the pointer toward the uncovered sides.

use crate::domain::models::{ButtonSide, PointerIntent, SensorFrame};
use thiserror::Error;

/// Channel value below which an object counts as touching the sensor
pub const CLICK_THRESHOLD: u8 = 25;

/// Pixels of movement per unit of channel difference
pub const POINTER_SPEED: f64 = 0.1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed sensor frame: expected {expected} bytes, got {len}")]
    Malformed { len: usize, expected: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    pub click_threshold: u8,
    pub speed: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            click_threshold: CLICK_THRESHOLD,
            speed: POINTER_SPEED,
        }
    }
}

/// Parse a raw notification payload into a frame.
///
/// Byte order on the wire is `[up, right, down, left]`.
pub fn parse_frame(payload: &[u8]) -> Result<SensorFrame, FrameError> {
    match *payload {
        [up, right, down, left] => Ok(SensorFrame::new(up, right, down, left)),
        _ => Err(FrameError::Malformed {
            len: payload.len(),
            expected: SensorFrame::LEN,
        }),
    }
}

/// Decode a frame with the default threshold and speed
#[cfg(test)]
pub fn decode(frame: SensorFrame) -> PointerIntent {
    decode_with(&DecoderConfig::default(), frame)
}

pub fn decode_with(config: &DecoderConfig, frame: SensorFrame) -> PointerIntent {
    let near = |value: u8| value < config.click_threshold;

    if near(frame.right) && near(frame.down) && near(frame.left) {
        let side = if near(frame.up) {
            ButtonSide::Left
        } else {
            ButtonSide::Right
        };
        return PointerIntent::ClickButton(side);
    }

    let inv = |value: u8| f64::from(255 - value);
    PointerIntent::Move {
        dx: (inv(frame.right) - inv(frame.left)) * config.speed,
        dy: (inv(frame.down) - inv(frame.up)) * config.speed,
    }
}
