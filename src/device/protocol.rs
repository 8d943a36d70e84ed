//! Serial line protocol between host and keypad
//!
//! Host → device (one command per line):
//!   - `A <trigger> [<event>...]`  assign a sequence, no events clears it
//!   - `D <x> <y> <w> <h>`         followed by `ceil(w/8)*h` raw bitmap bytes
//!   - `L <rrggbb>...`             LED colours
//!   - `R p|f|o`                   partial/full refresh or display off, answered by `ok`
//!   - `I`                         info block `Inkkeys` ... `Done`
//!
//! Device → host:
//!   - `<n>p` / `<n>r`             key n pressed/released (key 1 = encoder switch)
//!   - `R<position>`               encoder moved, cumulative click count
//!
//! Triggers are written `1p`..`9r`, `R+` (clockwise) and `R-`.
//! Event tokens: `k<code>[p|r]`, `c<code>[p|r]`, `m<mask>[p|r]`,
//! `m<x|y|w>i<delta>` and `d<ms>`. Without suffix a key event is a stroke.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::event::{
    Action, Edge, Event, EventError, Input, KeyAction, MouseAxis, TableError, Trigger,
};

use super::settings::Settings;

/// First line of the info block
pub const INFO_HEADER: &str = "Inkkeys";
/// Last line of the info block
pub const INFO_FOOTER: &str = "Done";
/// Acknowledgement of a refresh command
pub const ACK: &str = "ok";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("invalid trigger '{0}'")]
    InvalidTrigger(String),
    #[error("invalid event token '{0}'")]
    InvalidEvent(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("invalid colour '{0}'")]
    InvalidColor(String),
    #[error("unknown refresh mode '{0}'")]
    InvalidRefresh(String),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Table(#[from] TableError),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.input.key_number(), self.edge) {
            (Some(n), Edge::Press) => write!(f, "{}p", n),
            (Some(n), Edge::Release) => write!(f, "{}r", n),
            (None, Edge::Press) => write!(f, "R+"),
            (None, Edge::Release) => write!(f, "R-"),
        }
    }
}

impl FromStr for Trigger {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidTrigger(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(invalid());
        }

        match (bytes[0], bytes[1]) {
            (b'R', b'+') => Ok(Trigger::new(Input::ROTARY, Edge::INCREMENT)),
            (b'R', b'-') => Ok(Trigger::new(Input::ROTARY, Edge::DECREMENT)),
            (digit @ b'1'..=b'9', edge) => {
                let input = Input::key(digit - b'0').ok_or_else(invalid)?;
                let edge = match edge {
                    b'p' => Edge::Press,
                    b'r' => Edge::Release,
                    _ => return Err(invalid()),
                };
                Ok(Trigger::new(input, edge))
            }
            _ => Err(invalid()),
        }
    }
}

/// Format an event as its wire token
pub fn format_event(event: &Event) -> Result<String, ProtocolError> {
    let action = event
        .action()?
        .ok_or_else(|| ProtocolError::InvalidEvent("<empty>".to_string()))?;

    let token = match action {
        Action::Keyboard { code, action } => format!("k{}{}", code, key_suffix(action)),
        Action::Consumer { code, action } => format!("c{}{}", code, key_suffix(action)),
        Action::MouseButton { buttons, action } => format!("m{}{}", buttons, key_suffix(action)),
        Action::MouseMove { axis, delta } => format!("m{}i{}", axis_char(axis), delta),
        Action::Delay { ms } => format!("d{}", ms),
    };
    Ok(token)
}

/// Parse a wire token into an event
pub fn parse_event(token: &str) -> Result<Event, ProtocolError> {
    let invalid = || ProtocolError::InvalidEvent(token.to_string());
    let mut chars = token.chars();
    let device = chars.next().ok_or_else(invalid)?;
    let rest = chars.as_str();

    match device {
        'd' => Ok(Event::delay(parse_number(rest)?)),
        'k' => {
            let (code, action) = split_key_suffix(rest).ok_or_else(invalid)?;
            Ok(Event::keyboard(parse_number(code)?, action))
        }
        'c' => {
            let (code, action) = split_key_suffix(rest).ok_or_else(invalid)?;
            Ok(Event::consumer(parse_number(code)?, action))
        }
        'm' => {
            if let Some(axis) = rest.chars().next().and_then(parse_axis) {
                let delta = rest[1..].strip_prefix('i').ok_or_else(invalid)?;
                let delta: i8 = delta
                    .parse()
                    .map_err(|_| ProtocolError::InvalidNumber(delta.to_string()))?;
                Ok(Event::mouse_move(axis, delta))
            } else {
                let (mask, action) = split_key_suffix(rest).ok_or_else(invalid)?;
                Ok(Event::mouse_button(parse_number(mask)?, action))
            }
        }
        _ => Err(invalid()),
    }
}

fn key_suffix(action: KeyAction) -> &'static str {
    match action {
        KeyAction::Stroke => "",
        KeyAction::Press => "p",
        KeyAction::Release => "r",
    }
}

fn split_key_suffix(s: &str) -> Option<(&str, KeyAction)> {
    let (code, action) = if let Some(code) = s.strip_suffix('p') {
        (code, KeyAction::Press)
    } else if let Some(code) = s.strip_suffix('r') {
        (code, KeyAction::Release)
    } else {
        (s, KeyAction::Stroke)
    };
    (!code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())).then_some((code, action))
}

fn axis_char(axis: MouseAxis) -> char {
    match axis {
        MouseAxis::X => 'x',
        MouseAxis::Y => 'y',
        MouseAxis::Wheel => 'w',
    }
}

fn parse_axis(c: char) -> Option<MouseAxis> {
    match c {
        'x' => Some(MouseAxis::X),
        'y' => Some(MouseAxis::Y),
        'w' => Some(MouseAxis::Wheel),
        _ => None,
    }
}

fn parse_number<T: FromStr>(s: &str) -> Result<T, ProtocolError> {
    s.parse()
        .map_err(|_| ProtocolError::InvalidNumber(s.to_string()))
}

/// Refresh modes of the e-ink display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Partial,
    Full,
    /// Power the display down after an update
    Off,
}

impl RefreshMode {
    fn code(&self) -> char {
        match self {
            RefreshMode::Partial => 'p',
            RefreshMode::Full => 'f',
            RefreshMode::Off => 'o',
        }
    }
}

/// Number of payload bytes following a `D` command
pub fn bitmap_len(width: u16, height: u16) -> usize {
    (width as usize).div_ceil(8) * height as usize
}

/// Host → device commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Assign { trigger: Trigger, events: Vec<Event> },
    Display { x: u16, y: u16, width: u16, height: u16 },
    Leds(Vec<u32>),
    Refresh(RefreshMode),
    Info,
}

impl Command {
    /// Wire line without the trailing newline
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let line = match self {
            Command::Assign { trigger, events } => {
                let mut line = format!("A {}", trigger);
                for event in events {
                    line.push(' ');
                    line.push_str(&format_event(event)?);
                }
                line
            }
            Command::Display {
                x,
                y,
                width,
                height,
            } => format!("D {} {} {} {}", x, y, width, height),
            Command::Leds(colors) => {
                let mut line = String::from("L");
                for color in colors {
                    line.push_str(&format!(" {:06x}", color & 0xff_ffff));
                }
                line
            }
            Command::Refresh(mode) => format!("R {}", mode.code()),
            Command::Info => "I".to_string(),
        };
        Ok(line)
    }

    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut parts = line.split_whitespace();
        let command = parts.next().ok_or(ProtocolError::Empty)?;

        match command {
            "A" => {
                let trigger: Trigger = parts
                    .next()
                    .ok_or(ProtocolError::MissingArgument("trigger"))?
                    .parse()?;
                let events = parts.map(parse_event).collect::<Result<Vec<_>, _>>()?;
                Ok(Command::Assign { trigger, events })
            }
            "D" => {
                let mut next = |name: &'static str| -> Result<u16, ProtocolError> {
                    parse_number(parts.next().ok_or(ProtocolError::MissingArgument(name))?)
                };
                Ok(Command::Display {
                    x: next("x")?,
                    y: next("y")?,
                    width: next("width")?,
                    height: next("height")?,
                })
            }
            "L" => {
                let colors = parts
                    .map(|hex| {
                        Some(hex)
                            .filter(|h| h.len() == 6 && h.bytes().all(|b| b.is_ascii_hexdigit()))
                            .and_then(|h| u32::from_str_radix(h, 16).ok())
                            .ok_or_else(|| ProtocolError::InvalidColor(hex.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Command::Leds(colors))
            }
            "R" => {
                let mode = parts.next().ok_or(ProtocolError::MissingArgument("mode"))?;
                let mode = match mode {
                    "p" => RefreshMode::Partial,
                    "f" => RefreshMode::Full,
                    "o" => RefreshMode::Off,
                    other => return Err(ProtocolError::InvalidRefresh(other.to_string())),
                };
                Ok(Command::Refresh(mode))
            }
            "I" => Ok(Command::Info),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Device → host input reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Key { number: u8, edge: Edge },
    /// Cumulative encoder position in clicks
    Rotary(i32),
}

impl Report {
    pub fn to_line(&self) -> String {
        match self {
            Report::Key { number, edge } => {
                let suffix = if *edge == Edge::Press { 'p' } else { 'r' };
                format!("{}{}", number, suffix)
            }
            Report::Rotary(position) => format!("R{}", position),
        }
    }

    /// Parse an input report, `None` for any other line
    pub fn parse(line: &str) -> Option<Self> {
        if let Some(position) = line.strip_prefix('R') {
            return position.parse().ok().map(Report::Rotary);
        }
        match line.parse::<Trigger>() {
            Ok(trigger) => trigger.input.key_number().map(|number| Report::Key {
                number,
                edge: trigger.edge,
            }),
            Err(_) => None,
        }
    }
}

/// Lines of the info block, header and footer included
pub fn info_lines(settings: &Settings) -> Vec<String> {
    vec![
        INFO_HEADER.to_string(),
        format!("TEST {}", u8::from(settings.test_mode)),
        format!("N_LED {}", settings.n_leds),
        format!("DISP_W {}", settings.disp_w),
        format!("DISP_H {}", settings.disp_h),
        format!("ROT_CIRCLE_STEPS {}", settings.rot_circle_steps),
        INFO_FOOTER.to_string(),
    ]
}

/// Apply one line of the info block, returns false for unknown lines
pub fn apply_info_line(settings: &mut Settings, line: &str) -> bool {
    let Some((key, value)) = line.split_once(' ') else {
        return false;
    };
    let value = value.trim();

    match key {
        "TEST" => {
            settings.test_mode = value != "0";
            true
        }
        "N_LED" => value.parse().map(|v| settings.n_leds = v).is_ok(),
        "DISP_W" => value.parse().map(|v| settings.disp_w = v).is_ok(),
        "DISP_H" => value.parse().map(|v| settings.disp_h = v).is_ok(),
        "ROT_CIRCLE_STEPS" => value.parse().map(|v| settings.rot_circle_steps = v).is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::keycodes::{consumer, keyboard, mouse};

    #[test]
    fn test_trigger_wire_form() {
        assert_eq!("1p".parse::<Trigger>().unwrap().input.index(), 0);
        assert_eq!("9r".parse::<Trigger>().unwrap().edge, Edge::Release);
        assert_eq!(
            "R+".parse::<Trigger>().unwrap(),
            Trigger::new(Input::ROTARY, Edge::INCREMENT)
        );
        assert_eq!(Trigger::new(Input::ROTARY, Edge::DECREMENT).to_string(), "R-");
        assert_eq!(
            Trigger::new(Input::key(6).unwrap(), Edge::Release).to_string(),
            "6r"
        );
        for bad in ["0p", "1x", "R", "R*", "10p", ""] {
            assert!(bad.parse::<Trigger>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_event_tokens() {
        assert_eq!(
            parse_event("k44p").unwrap(),
            Event::keyboard(keyboard::KEY_SPACE, KeyAction::Press)
        );
        assert_eq!(
            parse_event("k80").unwrap(),
            Event::keyboard(keyboard::KEY_LEFT, KeyAction::Stroke)
        );
        assert_eq!(
            parse_event("c205r").unwrap(),
            Event::consumer(consumer::MEDIA_PLAY_PAUSE, KeyAction::Release)
        );
        assert_eq!(
            parse_event("mwi-1").unwrap(),
            Event::mouse_move(MouseAxis::Wheel, -1)
        );
        assert_eq!(
            parse_event("m1p").unwrap(),
            Event::mouse_button(mouse::MOUSE_LEFT as u8, KeyAction::Press)
        );
        assert_eq!(parse_event("d150").unwrap(), Event::delay(150));
    }

    #[test]
    fn test_event_tokens_format() {
        let events = [
            (Event::keyboard(keyboard::KEY_F12, KeyAction::Stroke), "k69"),
            (Event::consumer(consumer::MEDIA_VOL_UP, KeyAction::Press), "c233p"),
            (Event::mouse_move(MouseAxis::X, 5), "mxi5"),
            (Event::mouse_button(2, KeyAction::Release), "m2r"),
            (Event::delay(20), "d20"),
        ];
        for (event, token) in events {
            assert_eq!(format_event(&event).unwrap(), token);
            assert_eq!(parse_event(token).unwrap(), event);
        }
        assert!(format_event(&Event::EMPTY).is_err());
    }

    #[test]
    fn test_bad_event_tokens() {
        for bad in ["", "x4", "k", "kp", "k4x", "mwi", "mwi300", "mw1", "d-1", "k70000"] {
            assert!(parse_event(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_assign_command() {
        let line = "A 7p k224p k69 k224r";
        let command = Command::parse(line).unwrap();
        match &command {
            Command::Assign { trigger, events } => {
                assert_eq!(trigger.to_string(), "7p");
                assert_eq!(events.len(), 3);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(command.to_line().unwrap(), line);

        let clear = Command::parse("A 4r").unwrap();
        assert_eq!(
            clear,
            Command::Assign {
                trigger: "4r".parse().unwrap(),
                events: vec![]
            }
        );
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(
            Command::parse("D 64 12 64 50").unwrap(),
            Command::Display {
                x: 64,
                y: 12,
                width: 64,
                height: 50
            }
        );
        assert_eq!(
            Command::Leds(vec![0xff0000, 0x00ff00]).to_line().unwrap(),
            "L ff0000 00ff00"
        );
        assert_eq!(
            Command::parse("L ff0000 00ff00").unwrap(),
            Command::Leds(vec![0xff0000, 0x00ff00])
        );
        assert_eq!(
            Command::parse("R f").unwrap(),
            Command::Refresh(RefreshMode::Full)
        );
        assert_eq!(Command::Refresh(RefreshMode::Off).to_line().unwrap(), "R o");
        assert_eq!(Command::parse("I").unwrap(), Command::Info);

        assert_eq!(Command::parse(""), Err(ProtocolError::Empty));
        assert!(matches!(
            Command::parse("X 1"),
            Err(ProtocolError::UnknownCommand(_))
        ));
        assert!(matches!(
            Command::parse("D 1 2"),
            Err(ProtocolError::MissingArgument("width"))
        ));
        assert!(matches!(
            Command::parse("L fff"),
            Err(ProtocolError::InvalidColor(_))
        ));
        assert!(matches!(
            Command::parse("L +fffff"),
            Err(ProtocolError::InvalidColor(_))
        ));
        assert!(matches!(
            Command::parse("L ff0000 -00001"),
            Err(ProtocolError::InvalidColor(_))
        ));
        assert!(matches!(
            Command::parse("R x"),
            Err(ProtocolError::InvalidRefresh(_))
        ));
    }

    #[test]
    fn test_bitmap_len_pads_rows() {
        assert_eq!(bitmap_len(64, 10), 80);
        assert_eq!(bitmap_len(12, 3), 6);
        assert_eq!(bitmap_len(0, 3), 0);
    }

    #[test]
    fn test_reports() {
        assert_eq!(
            Report::parse("3p"),
            Some(Report::Key {
                number: 3,
                edge: Edge::Press
            })
        );
        assert_eq!(Report::parse("R-4"), Some(Report::Rotary(-4)));
        assert_eq!(Report::parse("R12"), Some(Report::Rotary(12)));
        assert_eq!(Report::parse("R+"), None);
        assert_eq!(Report::parse("ok"), None);
        assert_eq!(Report::Rotary(-2).to_line(), "R-2");
        assert_eq!(
            Report::Key {
                number: 9,
                edge: Edge::Release
            }
            .to_line(),
            "9r"
        );
    }

    #[test]
    fn test_info_block() {
        let reported = Settings {
            test_mode: true,
            n_leds: 8,
            disp_w: 200,
            disp_h: 100,
            rot_circle_steps: 24,
        };
        let lines = info_lines(&reported);
        assert_eq!(lines.first().map(String::as_str), Some(INFO_HEADER));
        assert_eq!(lines.last().map(String::as_str), Some(INFO_FOOTER));

        let mut parsed = Settings::default();
        for line in &lines[1..lines.len() - 1] {
            assert!(apply_info_line(&mut parsed, line));
        }
        assert_eq!(parsed, reported);
        assert!(!apply_info_line(&mut parsed, "VERSION 3"));
        assert!(!apply_info_line(&mut parsed, "N_LED many"));
    }
}
