use std::fmt;

/// One reading from the four-way proximity sensor.
///
/// Each channel is the raw distance value: 0 means an object is right on the
/// sensor, 255 means nothing is in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFrame {
    pub up: u8,
    pub right: u8,
    pub down: u8,
    pub left: u8,
}

impl SensorFrame {
    pub const LEN: usize = 4;

    pub fn new(up: u8, right: u8, down: u8, left: u8) -> Self {
        Self {
            up,
            right,
            down,
            left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonSide {
    Left,
    Right,
}

impl ButtonSide {
    pub fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for ButtonSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// What a sensor frame asks the pointer to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerIntent {
    /// The named button should be held; the other one released.
    ClickButton(ButtonSide),
    /// Relative pointer displacement, no button interaction.
    Move { dx: f64, dy: f64 },
}

/// Which virtual buttons are currently held down.
///
/// At most one of the two flags is ever set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonLatchState {
    pub left_down: bool,
    pub right_down: bool,
}

impl ButtonLatchState {
    pub fn is_down(&self, side: ButtonSide) -> bool {
        match side {
            ButtonSide::Left => self.left_down,
            ButtonSide::Right => self.right_down,
        }
    }

    pub fn set(&mut self, side: ButtonSide, down: bool) {
        match side {
            ButtonSide::Left => self.left_down = down,
            ButtonSide::Right => self.right_down = down,
        }
    }
}

/// A single call against the host pointer-injection interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostInputCall {
    ButtonDown(ButtonSide),
    ButtonUp(ButtonSide),
    MoveRelative { dx: f64, dy: f64 },
}

/// A peripheral seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDevice {
    pub name: Option<String>,
    pub address: String,
    pub signal_strength: Option<i16>,
}

impl ScannedDevice {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("N/A")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_set_and_query() {
        let mut state = ButtonLatchState::default();
        assert!(!state.is_down(ButtonSide::Left));
        state.set(ButtonSide::Right, true);
        assert!(state.is_down(ButtonSide::Right));
        assert!(!state.left_down);
    }

    #[test]
    fn test_scanned_device_without_name() {
        let device = ScannedDevice {
            name: None,
            address: "FD:D3:9D:E7:40:E0".to_string(),
            signal_strength: Some(-60),
        };
        assert_eq!(device.display_name(), "N/A");
    }
}
