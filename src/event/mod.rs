//! Input events fired by keys and the rotary encoder
//!
//! An [`Event`] is the packed two-field record stored in the assignment
//! table. The lower nibble of `device_and_type` selects the device
//! (keyboard, mouse, consumer, delay) and the higher nibble the action
//! (stroke, press, release, increment). `keycode_or_delay` carries the
//! usage code, a packed mouse target + signed delta, or a delay in ms.

pub mod keycodes;
mod table;

pub use table::{AssignmentTable, Edge, Input, TableError, Trigger, N_EDGES, N_INPUTS};

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Maximum number of events per (input, edge) pair
pub const N_EVENTS: usize = 10;

/// Errors decoding a packed event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("unknown device nibble 0x{0:x}")]
    UnknownDevice(u8),
    #[error("unknown action nibble 0x{0:x}")]
    UnknownAction(u8),
    #[error("{action:?} is not valid for {device:?}")]
    InvalidAction {
        device: DeviceKind,
        action: ActionKind,
    },
    #[error("unknown mouse axis 0x{0:02x}")]
    UnknownAxis(u8),
}

/// Device kind (lower nibble)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceKind {
    /// Unused slot, ends a sequence
    None = 0x0,
    Keyboard = 0x1,
    Mouse = 0x2,
    Consumer = 0x3,
    Delay = 0x4,
}

impl TryFrom<u8> for DeviceKind {
    type Error = EventError;

    fn try_from(nibble: u8) -> Result<Self, Self::Error> {
        match nibble {
            0x0 => Ok(DeviceKind::None),
            0x1 => Ok(DeviceKind::Keyboard),
            0x2 => Ok(DeviceKind::Mouse),
            0x3 => Ok(DeviceKind::Consumer),
            0x4 => Ok(DeviceKind::Delay),
            other => Err(EventError::UnknownDevice(other)),
        }
    }
}

/// Action kind (higher nibble)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionKind {
    /// Press immediately followed by release
    Stroke = 0x0,
    Press = 0x1,
    Release = 0x2,
    /// Relative movement by the signed value in the low byte
    Increment = 0x3,
}

impl TryFrom<u8> for ActionKind {
    type Error = EventError;

    fn try_from(nibble: u8) -> Result<Self, Self::Error> {
        match nibble {
            0x0 => Ok(ActionKind::Stroke),
            0x1 => Ok(ActionKind::Press),
            0x2 => Ok(ActionKind::Release),
            0x3 => Ok(ActionKind::Increment),
            other => Err(EventError::UnknownAction(other)),
        }
    }
}

/// Key-like actions (everything except increments)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Stroke,
    Press,
    Release,
}

impl From<KeyAction> for ActionKind {
    fn from(action: KeyAction) -> Self {
        key_action_kind(action)
    }
}

/// Mouse axis targeted by an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseAxis {
    X = 0x01,
    Y = 0x02,
    Wheel = 0x03,
}

impl TryFrom<u8> for MouseAxis {
    type Error = EventError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MouseAxis::X),
            0x02 => Ok(MouseAxis::Y),
            0x03 => Ok(MouseAxis::Wheel),
            other => Err(EventError::UnknownAxis(other)),
        }
    }
}

/// Decoded view of an [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Keyboard { code: u16, action: KeyAction },
    Consumer { code: u16, action: KeyAction },
    MouseButton { buttons: u8, action: KeyAction },
    MouseMove { axis: MouseAxis, delta: i8 },
    Delay { ms: u16 },
}

impl Action {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Action::Delay { ms } => Some(Duration::from_millis(u64::from(*ms))),
            _ => None,
        }
    }
}

/// Packed event record as stored in the assignment table
///
/// Three bytes without padding, as on the keypad's 8-bit controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C, packed)]
pub struct Event {
    pub device_and_type: u8,
    pub keycode_or_delay: u16,
}

impl Event {
    /// Sentinel for unused slots
    pub const EMPTY: Event = Event {
        device_and_type: 0,
        keycode_or_delay: 0,
    };

    pub const fn pack(device: DeviceKind, action: ActionKind, value: u16) -> Self {
        Self {
            device_and_type: ((action as u8) << 4) | (device as u8),
            keycode_or_delay: value,
        }
    }

    pub const fn keyboard(code: u16, action: KeyAction) -> Self {
        Self::pack(DeviceKind::Keyboard, key_action_kind(action), code)
    }

    pub const fn consumer(code: u16, action: KeyAction) -> Self {
        Self::pack(DeviceKind::Consumer, key_action_kind(action), code)
    }

    pub const fn mouse_button(buttons: u8, action: KeyAction) -> Self {
        Self::pack(
            DeviceKind::Mouse,
            key_action_kind(action),
            (buttons as u16) << 8,
        )
    }

    pub const fn mouse_move(axis: MouseAxis, delta: i8) -> Self {
        Self::pack(
            DeviceKind::Mouse,
            ActionKind::Increment,
            ((axis as u16) << 8) | (delta as u8 as u16),
        )
    }

    pub const fn delay(ms: u16) -> Self {
        Self::pack(DeviceKind::Delay, ActionKind::Stroke, ms)
    }

    pub fn is_empty(&self) -> bool {
        self.device_and_type & 0x0f == DeviceKind::None as u8
    }

    /// Raw device nibble
    pub fn device_nibble(&self) -> u8 {
        self.device_and_type & 0x0f
    }

    /// Raw action nibble
    pub fn action_nibble(&self) -> u8 {
        self.device_and_type >> 4
    }

    /// Mouse button mask or axis (high byte)
    pub fn mouse_target(&self) -> u8 {
        (self.keycode_or_delay >> 8) as u8
    }

    /// Signed mouse increment (low byte)
    pub fn mouse_delta(&self) -> i8 {
        (self.keycode_or_delay & 0xff) as u8 as i8
    }

    /// Decode the record. `Ok(None)` for the empty sentinel.
    pub fn action(&self) -> Result<Option<Action>, EventError> {
        let device = DeviceKind::try_from(self.device_nibble())?;
        if device == DeviceKind::None {
            return Ok(None);
        }
        let kind = ActionKind::try_from(self.action_nibble())?;
        let invalid = EventError::InvalidAction {
            device,
            action: kind,
        };

        let action = match device {
            DeviceKind::None => return Ok(None),
            DeviceKind::Keyboard => Action::Keyboard {
                code: self.keycode_or_delay,
                action: key_action(kind).ok_or(invalid)?,
            },
            DeviceKind::Consumer => Action::Consumer {
                code: self.keycode_or_delay,
                action: key_action(kind).ok_or(invalid)?,
            },
            DeviceKind::Mouse => match key_action(kind) {
                Some(action) => Action::MouseButton {
                    buttons: self.mouse_target(),
                    action,
                },
                None => Action::MouseMove {
                    axis: MouseAxis::try_from(self.mouse_target())?,
                    delta: self.mouse_delta(),
                },
            },
            DeviceKind::Delay => {
                if kind != ActionKind::Stroke {
                    return Err(invalid);
                }
                Action::Delay {
                    ms: self.keycode_or_delay,
                }
            }
        };

        Ok(Some(action))
    }
}

impl From<Action> for Event {
    fn from(action: Action) -> Self {
        match action {
            Action::Keyboard { code, action } => Event::keyboard(code, action),
            Action::Consumer { code, action } => Event::consumer(code, action),
            Action::MouseButton { buttons, action } => Event::mouse_button(buttons, action),
            Action::MouseMove { axis, delta } => Event::mouse_move(axis, delta),
            Action::Delay { ms } => Event::delay(ms),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:04x}",
            self.device_and_type,
            { self.keycode_or_delay }
        )
    }
}

const fn key_action_kind(action: KeyAction) -> ActionKind {
    match action {
        KeyAction::Stroke => ActionKind::Stroke,
        KeyAction::Press => ActionKind::Press,
        KeyAction::Release => ActionKind::Release,
    }
}

fn key_action(kind: ActionKind) -> Option<KeyAction> {
    match kind {
        ActionKind::Stroke => Some(KeyAction::Stroke),
        ActionKind::Press => Some(KeyAction::Press),
        ActionKind::Release => Some(KeyAction::Release),
        ActionKind::Increment => None,
    }
}
