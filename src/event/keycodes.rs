//! HID usage codes understood by the keypad
//!
//! Keyboard codes are HID keyboard page usages, consumer codes are HID
//! consumer page usages and mouse codes are button bit masks.

macro_rules! keycodes {
    ($($name:ident = $code:expr),* $(,)?) => {
        $(pub const $name: u16 = $code;)*

        /// Name/code pairs, aliases included
        pub const NAMES: &[(&str, u16)] = &[$((stringify!($name), $code)),*];

        /// Resolve a code by name (case-insensitive)
        pub fn lookup(name: &str) -> Option<u16> {
            NAMES
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, code)| *code)
        }

        /// First name registered for a code
        pub fn name_of(code: u16) -> Option<&'static str> {
            NAMES.iter().find(|(_, c)| *c == code).map(|(n, _)| *n)
        }
    };
}

pub mod keyboard {
    keycodes! {
        KEY_RESERVED = 0x00,
        KEY_A = 0x04,
        KEY_B = 0x05,
        KEY_C = 0x06,
        KEY_D = 0x07,
        KEY_E = 0x08,
        KEY_F = 0x09,
        KEY_G = 0x0a,
        KEY_H = 0x0b,
        KEY_I = 0x0c,
        KEY_J = 0x0d,
        KEY_K = 0x0e,
        KEY_L = 0x0f,
        KEY_M = 0x10,
        KEY_N = 0x11,
        KEY_O = 0x12,
        KEY_P = 0x13,
        KEY_Q = 0x14,
        KEY_R = 0x15,
        KEY_S = 0x16,
        KEY_T = 0x17,
        KEY_U = 0x18,
        KEY_V = 0x19,
        KEY_W = 0x1a,
        KEY_X = 0x1b,
        KEY_Y = 0x1c,
        KEY_Z = 0x1d,
        KEY_1 = 0x1e,
        KEY_2 = 0x1f,
        KEY_3 = 0x20,
        KEY_4 = 0x21,
        KEY_5 = 0x22,
        KEY_6 = 0x23,
        KEY_7 = 0x24,
        KEY_8 = 0x25,
        KEY_9 = 0x26,
        KEY_0 = 0x27,
        KEY_ENTER = 0x28,
        KEY_RETURN = 0x28,
        KEY_ESC = 0x29,
        KEY_BACKSPACE = 0x2a,
        KEY_TAB = 0x2b,
        KEY_SPACE = 0x2c,
        KEY_MINUS = 0x2d,
        KEY_EQUAL = 0x2e,
        KEY_LEFT_BRACE = 0x2f,
        KEY_RIGHT_BRACE = 0x30,
        KEY_BACKSLASH = 0x31,
        KEY_NON_US_NUM = 0x32,
        KEY_SEMICOLON = 0x33,
        KEY_QUOTE = 0x34,
        KEY_TILDE = 0x35,
        KEY_COMMA = 0x36,
        KEY_PERIOD = 0x37,
        KEY_SLASH = 0x38,
        KEY_CAPS_LOCK = 0x39,
        KEY_F1 = 0x3a,
        KEY_F2 = 0x3b,
        KEY_F3 = 0x3c,
        KEY_F4 = 0x3d,
        KEY_F5 = 0x3e,
        KEY_F6 = 0x3f,
        KEY_F7 = 0x40,
        KEY_F8 = 0x41,
        KEY_F9 = 0x42,
        KEY_F10 = 0x43,
        KEY_F11 = 0x44,
        KEY_F12 = 0x45,
        KEY_PRINTSCREEN = 0x46,
        KEY_SCROLL_LOCK = 0x47,
        KEY_PAUSE = 0x48,
        KEY_INSERT = 0x49,
        KEY_HOME = 0x4a,
        KEY_PAGE_UP = 0x4b,
        KEY_DELETE = 0x4c,
        KEY_END = 0x4d,
        KEY_PAGE_DOWN = 0x4e,
        KEY_RIGHT = 0x4f,
        KEY_LEFT = 0x50,
        KEY_DOWN = 0x51,
        KEY_UP = 0x52,
        KEY_NUM_LOCK = 0x53,
        KEYPAD_DIVIDE = 0x54,
        KEYPAD_MULTIPLY = 0x55,
        KEYPAD_SUBTRACT = 0x56,
        KEYPAD_ADD = 0x57,
        KEYPAD_ENTER = 0x58,
        KEYPAD_1 = 0x59,
        KEYPAD_2 = 0x5a,
        KEYPAD_3 = 0x5b,
        KEYPAD_4 = 0x5c,
        KEYPAD_5 = 0x5d,
        KEYPAD_6 = 0x5e,
        KEYPAD_7 = 0x5f,
        KEYPAD_8 = 0x60,
        KEYPAD_9 = 0x61,
        KEYPAD_0 = 0x62,
        KEYPAD_DOT = 0x63,
        KEY_NON_US = 0x64,
        KEY_MENU = 0x65,
        KEY_POWER = 0x66,
        KEY_PAD_EQUALS = 0x67,
        KEY_F13 = 0x68,
        KEY_F14 = 0x69,
        KEY_F15 = 0x6a,
        KEY_F16 = 0x6b,
        KEY_F17 = 0x6c,
        KEY_F18 = 0x6d,
        KEY_F19 = 0x6e,
        KEY_F20 = 0x6f,
        KEY_F21 = 0x70,
        KEY_F22 = 0x71,
        KEY_F23 = 0x72,
        KEY_F24 = 0x73,
        KEY_HELP = 0x75,
        KEY_UNDO = 0x7a,
        KEY_CUT = 0x7b,
        KEY_COPY = 0x7c,
        KEY_PASTE = 0x7d,
        KEY_FIND = 0x7e,
        KEY_MUTE = 0x7f,
        KEY_VOLUME_UP = 0x80,
        KEY_VOLUME_DOWN = 0x81,
        KEY_LEFT_CTRL = 0xe0,
        KEY_LEFT_SHIFT = 0xe1,
        KEY_LEFT_ALT = 0xe2,
        KEY_LEFT_GUI = 0xe3,
        KEY_RIGHT_CTRL = 0xe4,
        KEY_RIGHT_SHIFT = 0xe5,
        KEY_RIGHT_ALT = 0xe6,
        KEY_RIGHT_GUI = 0xe7,
    }
}

pub mod consumer {
    keycodes! {
        CONSUMER_POWER = 0x30,
        CONSUMER_SLEEP = 0x32,
        CONSUMER_BRIGHTNESS_UP = 0x6f,
        CONSUMER_BRIGHTNESS_DOWN = 0x70,
        MEDIA_PAUSE = 0xb0,
        MEDIA_RECORD = 0xb2,
        MEDIA_FAST_FORWARD = 0xb3,
        MEDIA_REWIND = 0xb4,
        MEDIA_NEXT = 0xb5,
        MEDIA_PREVIOUS = 0xb6,
        MEDIA_PREV = 0xb6,
        MEDIA_STOP = 0xb7,
        MEDIA_PLAY_PAUSE = 0xcd,
        MEDIA_VOLUME_MUTE = 0xe2,
        MEDIA_VOL_MUTE = 0xe2,
        MEDIA_VOLUME_UP = 0xe9,
        MEDIA_VOL_UP = 0xe9,
        MEDIA_VOLUME_DOWN = 0xea,
        MEDIA_VOL_DOWN = 0xea,
        CONSUMER_PROGRAMMABLE_BUTTON_CONFIGURATION = 0x182,
        CONSUMER_CONTROL_CONFIGURATION = 0x183,
        CONSUMER_EMAIL_READER = 0x18a,
        CONSUMER_CALCULATOR = 0x192,
        CONSUMER_EXPLORER = 0x194,
        CONSUMER_SCREENSAVER = 0x19e,
        CONSUMER_BROWSER_HOME = 0x223,
        CONSUMER_BROWSER_BACK = 0x224,
        CONSUMER_BROWSER_FORWARD = 0x225,
        CONSUMER_BROWSER_REFRESH = 0x227,
        CONSUMER_BROWSER_BOOKMARKS = 0x22a,
    }
}

pub mod mouse {
    keycodes! {
        MOUSE_LEFT = 0x01,
        MOUSE_RIGHT = 0x02,
        MOUSE_MIDDLE = 0x04,
        MOUSE_PREV = 0x08,
        MOUSE_NEXT = 0x10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(keyboard::lookup("KEY_SPACE"), Some(0x2c));
        assert_eq!(keyboard::lookup("key_space"), Some(0x2c));
        assert_eq!(consumer::lookup("media_vol_up"), Some(0xe9));
        assert_eq!(mouse::lookup("MOUSE_RIGHT"), Some(2));
        assert_eq!(keyboard::lookup("KEY_NOPE"), None);
    }

    #[test]
    fn test_aliases_share_codes() {
        assert_eq!(keyboard::KEY_ENTER, keyboard::KEY_RETURN);
        assert_eq!(consumer::MEDIA_PREV, consumer::MEDIA_PREVIOUS);
        assert_eq!(keyboard::name_of(0x28), Some("KEY_ENTER"));
    }
}
