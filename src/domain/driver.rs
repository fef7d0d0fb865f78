//! Pointer Action Driver
//!
//! Applies decoded intents to the button latch and emits the host input
//! calls needed to reach the new state. Only one button may be held at a
//! time; moving the pointer releases whatever is held.

use crate::domain::decoder::{self, DecoderConfig};
use crate::domain::models::{ButtonLatchState, ButtonSide, HostInputCall, PointerIntent};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Only the native backends construct these.
#[derive(Debug, Error)]
pub enum InputError {
    #[cfg_attr(not(all(target_os = "linux", feature = "xtest")), allow(dead_code))]
    #[error("host input backend unavailable: {0}")]
    Unavailable(String),
    #[cfg_attr(
        not(any(windows, all(target_os = "linux", feature = "xtest"))),
        allow(dead_code)
    )]
    #[error("host input call failed: {0}")]
    Platform(String),
}

/// Host pointer-injection interface.
///
/// Calls are fire-and-forget from the driver's point of view: a failure is
/// logged and the stream keeps going.
pub trait PointerSink {
    fn button_down(&self, side: ButtonSide) -> Result<(), InputError>;
    fn button_up(&self, side: ButtonSide) -> Result<(), InputError>;
    fn move_relative(&self, dx: f64, dy: f64) -> Result<(), InputError>;
}

impl<S: PointerSink + ?Sized> PointerSink for Box<S> {
    fn button_down(&self, side: ButtonSide) -> Result<(), InputError> {
        (**self).button_down(side)
    }

    fn button_up(&self, side: ButtonSide) -> Result<(), InputError> {
        (**self).button_up(side)
    }

    fn move_relative(&self, dx: f64, dy: f64) -> Result<(), InputError> {
        (**self).move_relative(dx, dy)
    }
}

/// Update `state` for `intent` and return the calls that realise it, in order.
pub fn apply(intent: PointerIntent, state: &mut ButtonLatchState) -> Vec<HostInputCall> {
    let mut calls = Vec::with_capacity(2);

    match intent {
        PointerIntent::ClickButton(side) => {
            if state.is_down(side) {
                return calls;
            }
            let other = side.other();
            if state.is_down(other) {
                calls.push(HostInputCall::ButtonUp(other));
                state.set(other, false);
            }
            calls.push(HostInputCall::ButtonDown(side));
            state.set(side, true);
        }
        PointerIntent::Move { dx, dy } => {
            calls.extend(release_all(state));
            calls.push(HostInputCall::MoveRelative { dx, dy });
        }
    }

    calls
}

/// Release every latched button, left first.
pub fn release_all(state: &mut ButtonLatchState) -> Vec<HostInputCall> {
    let mut calls = Vec::new();
    for side in [ButtonSide::Left, ButtonSide::Right] {
        if state.is_down(side) {
            calls.push(HostInputCall::ButtonUp(side));
            state.set(side, false);
        }
    }
    calls
}

/// Send `calls` to the sink in order.
pub fn execute<S: PointerSink + ?Sized>(sink: &S, calls: &[HostInputCall]) {
    for call in calls {
        let result = match *call {
            HostInputCall::ButtonDown(side) => sink.button_down(side),
            HostInputCall::ButtonUp(side) => sink.button_up(side),
            HostInputCall::MoveRelative { dx, dy } => sink.move_relative(dx, dy),
        };
        if let Err(e) = result {
            warn!("Pointer call {:?} failed: {}", call, e);
        }
    }
}

/// Decoder and driver wired together for one notification stream.
pub struct MotionPipeline<S: PointerSink> {
    config: DecoderConfig,
    state: ButtonLatchState,
    sink: S,
}

impl<S: PointerSink> MotionPipeline<S> {
    pub fn new(config: DecoderConfig, sink: S) -> Self {
        Self {
            config,
            state: ButtonLatchState::default(),
            sink,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ButtonLatchState {
        self.state
    }

    /// Process one raw notification payload.
    ///
    /// Returns the calls that were sent, or `None` when the payload is not a
    /// sensor frame (the latch is left untouched in that case).
    pub fn handle_payload(&mut self, payload: &[u8]) -> Option<Vec<HostInputCall>> {
        let frame = match decoder::parse_frame(payload) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Skipping notification: {}", e);
                return None;
            }
        };

        let intent = decoder::decode_with(&self.config, frame);
        trace!("{:?} -> {:?}", frame, intent);

        let calls = apply(intent, &mut self.state);
        execute(&self.sink, &calls);
        Some(calls)
    }

    /// Release anything still held when the stream ends.
    pub fn finish(&mut self) -> Vec<HostInputCall> {
        let calls = release_all(&mut self.state);
        if !calls.is_empty() {
            debug!("Releasing held buttons at end of stream");
            execute(&self.sink, &calls);
        }
        calls
    }
}
