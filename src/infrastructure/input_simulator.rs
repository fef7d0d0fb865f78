//! Host pointer injection.
//!
//! The backend is picked at compile time: `SendInput` on Windows, XTest on
//! Linux when built with the `xtest` feature. Everywhere else, and whenever
//! `dry_run` is set, calls are only logged.

use crate::domain::driver::{InputError, PointerSink};
use crate::domain::models::ButtonSide;
use tracing::info;

/// Round a fractional displacement to whole pixels
fn to_pixels(value: f64) -> i32 {
    value.round() as i32
}

/// Pick the pointer backend for this platform
pub fn platform_pointer(dry_run: bool) -> Result<Box<dyn PointerSink>, InputError> {
    if dry_run {
        return Ok(Box::new(LoggingPointer));
    }
    native_pointer()
}

#[cfg(windows)]
fn native_pointer() -> Result<Box<dyn PointerSink>, InputError> {
    Ok(Box::new(windows_input::SendInputPointer::new()))
}

#[cfg(all(target_os = "linux", feature = "xtest"))]
fn native_pointer() -> Result<Box<dyn PointerSink>, InputError> {
    Ok(Box::new(xtest_input::XTestPointer::open()?))
}

#[cfg(not(any(windows, all(target_os = "linux", feature = "xtest"))))]
fn native_pointer() -> Result<Box<dyn PointerSink>, InputError> {
    tracing::warn!("No pointer backend for this platform; pointer calls will only be logged");
    Ok(Box::new(LoggingPointer))
}

/// Logs every call instead of moving the real pointer.
pub struct LoggingPointer;

impl PointerSink for LoggingPointer {
    fn button_down(&self, side: ButtonSide) -> Result<(), InputError> {
        info!("Mouse {} down", side);
        Ok(())
    }

    fn button_up(&self, side: ButtonSide) -> Result<(), InputError> {
        info!("Mouse {} up", side);
        Ok(())
    }

    fn move_relative(&self, dx: f64, dy: f64) -> Result<(), InputError> {
        info!("Mouse move ({}, {})", to_pixels(dx), to_pixels(dy));
        Ok(())
    }
}

#[cfg(windows)]
mod windows_input {
    use super::to_pixels;
    use crate::domain::driver::{InputError, PointerSink};
    use crate::domain::models::ButtonSide;
    use tracing::{debug, trace};
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEINPUT, MOUSE_EVENT_FLAGS,
        MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN,
        MOUSEEVENTF_RIGHTUP,
    };

    pub struct SendInputPointer;

    impl SendInputPointer {
        pub fn new() -> Self {
            Self
        }

        fn send_mouse(&self, flags: MOUSE_EVENT_FLAGS, dx: i32, dy: i32) -> Result<(), InputError> {
            let input = INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dx,
                        dy,
                        mouseData: 0,
                        dwFlags: flags,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            };

            let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
            if sent == 0 {
                return Err(InputError::Platform(format!(
                    "SendInput rejected {:?}",
                    flags
                )));
            }
            Ok(())
        }
    }

    impl PointerSink for SendInputPointer {
        fn button_down(&self, side: ButtonSide) -> Result<(), InputError> {
            debug!("Mouse {} down", side);
            let flags = match side {
                ButtonSide::Left => MOUSEEVENTF_LEFTDOWN,
                ButtonSide::Right => MOUSEEVENTF_RIGHTDOWN,
            };
            self.send_mouse(flags, 0, 0)
        }

        fn button_up(&self, side: ButtonSide) -> Result<(), InputError> {
            debug!("Mouse {} up", side);
            let flags = match side {
                ButtonSide::Left => MOUSEEVENTF_LEFTUP,
                ButtonSide::Right => MOUSEEVENTF_RIGHTUP,
            };
            self.send_mouse(flags, 0, 0)
        }

        fn move_relative(&self, dx: f64, dy: f64) -> Result<(), InputError> {
            let (dx, dy) = (to_pixels(dx), to_pixels(dy));
            trace!("Moving mouse by ({}, {})", dx, dy);
            self.send_mouse(MOUSEEVENTF_MOVE, dx, dy)
        }
    }
}

#[cfg(all(target_os = "linux", feature = "xtest"))]
mod xtest_input {
    use super::to_pixels;
    use crate::domain::driver::{InputError, PointerSink};
    use crate::domain::models::ButtonSide;
    use std::ptr;
    use tracing::{debug, trace};
    use x11::{xlib, xtest};

    /// Passing 0 as the delay means "now"
    const CURRENT_TIME: std::os::raw::c_ulong = 0;

    /// X11 pointer injection through the XTest extension
    pub struct XTestPointer {
        display: *mut xlib::Display,
    }

    impl XTestPointer {
        pub fn open() -> Result<Self, InputError> {
            let display = unsafe { xlib::XOpenDisplay(ptr::null()) };
            if display.is_null() {
                return Err(InputError::Unavailable(
                    "cannot open X display (is DISPLAY set?)".to_string(),
                ));
            }
            Ok(Self { display })
        }

        fn button_event(&self, side: ButtonSide, pressed: bool) -> Result<(), InputError> {
            let button = match side {
                ButtonSide::Left => 1,
                ButtonSide::Right => 3,
            };
            let ok = unsafe {
                let ok = xtest::XTestFakeButtonEvent(
                    self.display,
                    button,
                    pressed as i32,
                    CURRENT_TIME,
                );
                xlib::XFlush(self.display);
                ok
            };
            if ok == 0 {
                return Err(InputError::Platform(format!(
                    "XTestFakeButtonEvent failed for {} button",
                    side
                )));
            }
            Ok(())
        }
    }

    impl PointerSink for XTestPointer {
        fn button_down(&self, side: ButtonSide) -> Result<(), InputError> {
            debug!("Mouse {} down", side);
            self.button_event(side, true)
        }

        fn button_up(&self, side: ButtonSide) -> Result<(), InputError> {
            debug!("Mouse {} up", side);
            self.button_event(side, false)
        }

        fn move_relative(&self, dx: f64, dy: f64) -> Result<(), InputError> {
            let (dx, dy) = (to_pixels(dx), to_pixels(dy));
            trace!("Moving mouse by ({}, {})", dx, dy);
            let ok = unsafe {
                let ok = xtest::XTestFakeRelativeMotionEvent(self.display, dx, dy, CURRENT_TIME);
                xlib::XFlush(self.display);
                ok
            };
            if ok == 0 {
                return Err(InputError::Platform(
                    "XTestFakeRelativeMotionEvent failed".to_string(),
                ));
            }
            Ok(())
        }
    }

    impl Drop for XTestPointer {
        fn drop(&mut self) {
            unsafe {
                xlib::XCloseDisplay(self.display);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixels_rounds() {
        assert_eq!(to_pixels(17.0), 17);
        assert_eq!(to_pixels(2.5), 3);
        assert_eq!(to_pixels(-0.4), 0);
        assert_eq!(to_pixels(-1.6), -2);
    }

    #[test]
    fn test_dry_run_uses_logging_pointer() {
        let sink = platform_pointer(true).unwrap();
        assert!(sink.button_down(ButtonSide::Left).is_ok());
        assert!(sink.move_relative(1.0, -1.0).is_ok());
        assert!(sink.button_up(ButtonSide::Left).is_ok());
    }
}
