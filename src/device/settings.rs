//! inkkeys hardware wiring and firmware constants
//!
//! Pin mapping (Pro Micro GPIO numbers):
//!   - E-ink display:  DIN 16, CLK 15, CS 19, DC 18, RST 10, BUSY 14
//!   - LED strip:      data on 20, 12 LEDs
//!   - Rotary encoder: A 0, B 1, push switch (key 1) 21
//!   - Keys 2-9:       pins 2-9

use serde::{Deserialize, Serialize};

// Display
pub const PIN_DIN: u8 = 16;
pub const PIN_CLK: u8 = 15;
pub const PIN_CS: u8 = 19;
pub const PIN_DC: u8 = 18;
pub const PIN_RST: u8 = 10;
pub const PIN_BUSY: u8 = 14;

/// Display width in pixels
pub const DISP_W: u16 = 128;
/// Display height in pixels
pub const DISP_H: u16 = 296;

// LEDs
pub const PIN_LED: u8 = 20;
/// Number of LEDs on the strip
pub const N_LED: u8 = 12;

// Rotary encoder
pub const PIN_ROTA: u8 = 0;
pub const PIN_ROTB: u8 = 1;
pub const PIN_SW1: u8 = 21;

/// Smallest reported step, typically one "click" on the encoder
pub const ROT_FACTOR: u8 = 4;
/// Encoder clicks in a full circle
pub const ROT_CIRCLE_STEPS: u8 = 20;

// Keys
pub const PIN_SW2: u8 = 2;
pub const PIN_SW3: u8 = 3;
pub const PIN_SW4: u8 = 4;
pub const PIN_SW5: u8 = 5;
pub const PIN_SW6: u8 = 6;
pub const PIN_SW7: u8 = 7;
pub const PIN_SW8: u8 = 8;
pub const PIN_SW9: u8 = 9;

/// Switch pins in key order (key 1 is the encoder push switch)
pub const KEY_PINS: [u8; 9] = [
    PIN_SW1, PIN_SW2, PIN_SW3, PIN_SW4, PIN_SW5, PIN_SW6, PIN_SW7, PIN_SW8, PIN_SW9,
];

/// Debounce reject interval in milliseconds
pub const DEBOUNCE_TIME: u32 = 50;

/// USB Vendor ID of the Pro Micro the keypad is built on
pub const VENDOR_ID: u16 = 0x1b4f;

/// USB Product ID of the Pro Micro
pub const PRODUCT_ID: u16 = 0x9206;

/// Serial baud rate expected by the firmware
pub const BAUD_RATE: u32 = 115_200;

/// Run-time view of the device, as reported by the `I` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Device runs the hardware test firmware
    pub test_mode: bool,
    pub n_leds: u8,
    pub disp_w: u16,
    pub disp_h: u16,
    pub rot_circle_steps: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            test_mode: false,
            n_leds: N_LED,
            disp_w: DISP_W,
            disp_h: DISP_H,
            rot_circle_steps: ROT_CIRCLE_STEPS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_wiring() {
        assert_eq!(
            [PIN_DIN, PIN_CLK, PIN_CS, PIN_DC, PIN_RST, PIN_BUSY],
            [16, 15, 19, 18, 10, 14]
        );
        assert_eq!((DISP_W, DISP_H), (128, 296));
    }

    #[test]
    fn test_key_pins_are_unique() {
        let mut pins = KEY_PINS.to_vec();
        pins.extend([PIN_ROTA, PIN_ROTB, PIN_LED]);
        pins.extend([PIN_DIN, PIN_CLK, PIN_CS, PIN_DC, PIN_RST, PIN_BUSY]);
        let count = pins.len();
        pins.sort_unstable();
        pins.dedup();
        assert_eq!(pins.len(), count);
    }

    #[test]
    fn test_key_pin_order() {
        assert_eq!(KEY_PINS[0], 21);
        assert_eq!(&KEY_PINS[1..], &[2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_default_settings_match_constants() {
        let settings = Settings::default();
        assert!(!settings.test_mode);
        assert_eq!(settings.n_leds, 12);
        assert_eq!(settings.rot_circle_steps, 20);
        assert_eq!(ROT_FACTOR, 4);
        assert_eq!(DEBOUNCE_TIME, 50);
    }
}
