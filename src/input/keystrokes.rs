use anyhow::{anyhow, Result};
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use tracing::{debug, warn};

use super::handler::{HidBackend, KeyState};
use crate::event::{
    keycodes::{consumer, mouse},
    MouseAxis,
};

/// Injects events into the focused window of the host desktop
pub struct EnigoBackend {
    enigo: Enigo,
}

impl EnigoBackend {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow!("Failed to initialize Enigo: {}", e))?;
        Ok(Self { enigo })
    }
}

fn direction(state: KeyState) -> Direction {
    match state {
        KeyState::Down => Direction::Press,
        KeyState::Up => Direction::Release,
    }
}

/// Map a HID keyboard usage to an enigo key
pub fn hid_to_key(code: u16) -> Option<Key> {
    let key = match code {
        0x04..=0x1d => Key::Unicode(char::from(b'a' + (code - 0x04) as u8)),
        0x1e..=0x26 => Key::Unicode(char::from(b'1' + (code - 0x1e) as u8)),
        0x27 => Key::Unicode('0'),
        0x28 | 0x58 => Key::Return,
        0x29 => Key::Escape,
        0x2a => Key::Backspace,
        0x2b => Key::Tab,
        0x2c => Key::Space,
        0x2d | 0x56 => Key::Unicode('-'),
        0x2e => Key::Unicode('='),
        0x2f => Key::Unicode('['),
        0x30 => Key::Unicode(']'),
        0x31 => Key::Unicode('\\'),
        0x33 => Key::Unicode(';'),
        0x34 => Key::Unicode('\''),
        0x35 => Key::Unicode('`'),
        0x36 => Key::Unicode(','),
        0x37 | 0x63 => Key::Unicode('.'),
        0x38 | 0x54 => Key::Unicode('/'),
        0x39 => Key::CapsLock,
        0x3a => Key::F1,
        0x3b => Key::F2,
        0x3c => Key::F3,
        0x3d => Key::F4,
        0x3e => Key::F5,
        0x3f => Key::F6,
        0x40 => Key::F7,
        0x41 => Key::F8,
        0x42 => Key::F9,
        0x43 => Key::F10,
        0x44 => Key::F11,
        0x45 => Key::F12,
        0x4a => Key::Home,
        0x4b => Key::PageUp,
        0x4c => Key::Delete,
        0x4d => Key::End,
        0x4e => Key::PageDown,
        0x4f => Key::RightArrow,
        0x50 => Key::LeftArrow,
        0x51 => Key::DownArrow,
        0x52 => Key::UpArrow,
        0x55 => Key::Unicode('*'),
        0x57 => Key::Unicode('+'),
        0x59..=0x61 => Key::Unicode(char::from(b'1' + (code - 0x59) as u8)),
        0x62 => Key::Unicode('0'),
        0x68 => Key::F13,
        0x69 => Key::F14,
        0x6a => Key::F15,
        0x6b => Key::F16,
        0x6c => Key::F17,
        0x6d => Key::F18,
        0x6e => Key::F19,
        0x6f => Key::F20,
        0xe0 | 0xe4 => Key::Control,
        0xe1 | 0xe5 => Key::Shift,
        0xe2 | 0xe6 => Key::Alt,
        0xe3 | 0xe7 => Key::Meta,
        _ => return None,
    };
    Some(key)
}

/// Map a HID consumer usage to an enigo media key
pub fn consumer_to_key(code: u16) -> Option<Key> {
    let key = match code {
        consumer::MEDIA_VOLUME_UP => Key::VolumeUp,
        consumer::MEDIA_VOLUME_DOWN => Key::VolumeDown,
        consumer::MEDIA_VOLUME_MUTE => Key::VolumeMute,
        consumer::MEDIA_PLAY_PAUSE | consumer::MEDIA_PAUSE => Key::MediaPlayPause,
        consumer::MEDIA_NEXT => Key::MediaNextTrack,
        consumer::MEDIA_PREVIOUS => Key::MediaPrevTrack,
        _ => return None,
    };
    Some(key)
}

impl HidBackend for EnigoBackend {
    fn keyboard(&mut self, code: u16, state: KeyState) -> Result<()> {
        let Some(key) = hid_to_key(code) else {
            warn!("No desktop key for HID usage 0x{:02x}", code);
            return Ok(());
        };
        debug!("Sending key: {:?} {:?}", key, state);
        self.enigo
            .key(key, direction(state))
            .map_err(|e| anyhow!("Key injection failed: {}", e))
    }

    fn consumer(&mut self, code: u16, state: KeyState) -> Result<()> {
        let Some(key) = consumer_to_key(code) else {
            warn!("No desktop key for consumer usage 0x{:03x}", code);
            return Ok(());
        };
        debug!("Sending media key: {:?} {:?}", key, state);
        self.enigo
            .key(key, direction(state))
            .map_err(|e| anyhow!("Media key injection failed: {}", e))
    }

    fn mouse_buttons(&mut self, buttons: u8, state: KeyState) -> Result<()> {
        let mapping = [
            (mouse::MOUSE_LEFT, Button::Left),
            (mouse::MOUSE_RIGHT, Button::Right),
            (mouse::MOUSE_MIDDLE, Button::Middle),
        ];
        for (mask, button) in mapping {
            if u16::from(buttons) & mask != 0 {
                debug!("Sending mouse button: {:?} {:?}", button, state);
                self.enigo
                    .button(button, direction(state))
                    .map_err(|e| anyhow!("Mouse button injection failed: {}", e))?;
            }
        }
        Ok(())
    }

    fn mouse_move(&mut self, axis: MouseAxis, delta: i8) -> Result<()> {
        let delta = i32::from(delta);
        let result = match axis {
            MouseAxis::X => self.enigo.move_mouse(delta, 0, Coordinate::Rel),
            MouseAxis::Y => self.enigo.move_mouse(0, delta, Coordinate::Rel),
            // HID wheel is positive upwards, enigo scrolls down for positive lengths
            MouseAxis::Wheel => self.enigo.scroll(-delta, Axis::Vertical),
        };
        result.map_err(|e| anyhow!("Mouse injection failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::keycodes::keyboard;

    #[test]
    fn test_hid_to_key_letters_and_digits() {
        assert_eq!(hid_to_key(keyboard::KEY_A), Some(Key::Unicode('a')));
        assert_eq!(hid_to_key(keyboard::KEY_Z), Some(Key::Unicode('z')));
        assert_eq!(hid_to_key(keyboard::KEY_1), Some(Key::Unicode('1')));
        assert_eq!(hid_to_key(keyboard::KEY_0), Some(Key::Unicode('0')));
        assert_eq!(hid_to_key(keyboard::KEYPAD_9), Some(Key::Unicode('9')));
    }

    #[test]
    fn test_hid_to_key_named() {
        assert_eq!(hid_to_key(keyboard::KEY_ENTER), Some(Key::Return));
        assert_eq!(hid_to_key(keyboard::KEY_F12), Some(Key::F12));
        assert_eq!(hid_to_key(keyboard::KEY_LEFT), Some(Key::LeftArrow));
        assert_eq!(hid_to_key(keyboard::KEY_RIGHT_SHIFT), Some(Key::Shift));
        assert_eq!(hid_to_key(keyboard::KEY_RESERVED), None);
    }

    #[test]
    fn test_consumer_to_key() {
        assert_eq!(consumer_to_key(consumer::MEDIA_VOLUME_UP), Some(Key::VolumeUp));
        assert_eq!(consumer_to_key(consumer::MEDIA_VOL_DOWN), Some(Key::VolumeDown));
        assert_eq!(consumer_to_key(consumer::MEDIA_VOLUME_MUTE), Some(Key::VolumeMute));
        assert_eq!(
            consumer_to_key(consumer::MEDIA_PLAY_PAUSE),
            Some(Key::MediaPlayPause)
        );
        assert_eq!(consumer_to_key(consumer::MEDIA_NEXT), Some(Key::MediaNextTrack));
        assert_eq!(consumer_to_key(consumer::MEDIA_PREV), Some(Key::MediaPrevTrack));
        assert_eq!(consumer_to_key(consumer::CONSUMER_CALCULATOR), None);
    }
}
