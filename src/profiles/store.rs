//! Profile configuration types for serialization/deserialization
//!
//! These types are stored as `[[profiles]]` in config.toml.

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::display::Slot;
use crate::event::{keycodes, Event, KeyAction, MouseAxis, Trigger, N_EVENTS};

/// A usage code, given by number or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Number(u16),
    Name(String),
}

impl Code {
    /// Resolve a name, trying it bare and with each prefix
    fn resolve(&self, lookup: fn(&str) -> Option<u16>, prefixes: &[&str]) -> Result<u16> {
        match self {
            Code::Number(code) => Ok(*code),
            Code::Name(name) => std::iter::once("")
                .chain(prefixes.iter().copied())
                .find_map(|prefix| lookup(&format!("{}{}", prefix, name)))
                .ok_or_else(|| anyhow!("Unknown code name '{}'", name)),
        }
    }
}

/// Key action (serializable)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionConfig {
    #[default]
    Stroke,
    Press,
    Release,
}

impl From<ActionConfig> for KeyAction {
    fn from(action: ActionConfig) -> Self {
        match action {
            ActionConfig::Stroke => KeyAction::Stroke,
            ActionConfig::Press => KeyAction::Press,
            ActionConfig::Release => KeyAction::Release,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisConfig {
    X,
    Y,
    Wheel,
}

impl From<AxisConfig> for MouseAxis {
    fn from(axis: AxisConfig) -> Self {
        match axis {
            AxisConfig::X => MouseAxis::X,
            AxisConfig::Y => MouseAxis::Y,
            AxisConfig::Wheel => MouseAxis::Wheel,
        }
    }
}

/// One event of a key sequence (serializable)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventConfig {
    /// Keyboard usage, e.g. `"SPACE"` or `"KEY_F12"`
    Key {
        code: Code,
        #[serde(default)]
        action: ActionConfig,
    },
    /// Consumer control usage, e.g. `"PLAY_PAUSE"`
    Consumer {
        code: Code,
        #[serde(default)]
        action: ActionConfig,
    },
    /// Mouse buttons, a name like `"LEFT"` or a bit mask
    MouseButton {
        button: Code,
        #[serde(default)]
        action: ActionConfig,
    },
    MouseMove { axis: AxisConfig, delta: i8 },
    Delay { ms: u16 },
}

impl EventConfig {
    /// Convert to the packed event record
    pub fn to_event(&self) -> Result<Event> {
        let event = match self {
            EventConfig::Key { code, action } => {
                let code = code.resolve(keycodes::keyboard::lookup, &["KEY_", "KEYPAD_"])?;
                Event::keyboard(code, (*action).into())
            }
            EventConfig::Consumer { code, action } => {
                let code = code.resolve(
                    keycodes::consumer::lookup,
                    &["MEDIA_", "CONSUMER_", "MEDIA_VOLUME_"],
                )?;
                Event::consumer(code, (*action).into())
            }
            EventConfig::MouseButton { button, action } => {
                let mask = button.resolve(keycodes::mouse::lookup, &["MOUSE_"])?;
                let mask = u8::try_from(mask).context("Mouse button mask out of range")?;
                Event::mouse_button(mask, (*action).into())
            }
            EventConfig::MouseMove { axis, delta } => Event::mouse_move((*axis).into(), *delta),
            EventConfig::Delay { ms } => {
                if *ms == 0 {
                    bail!("Delay must be at least 1 ms");
                }
                Event::delay(*ms)
            }
        };
        Ok(event)
    }
}

/// Configuration of a single trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfigEntry {
    /// Trigger in wire form: `1p`..`9r`, `R+`, `R-`
    pub trigger: String,
    /// Events the device sends, at most 10
    #[serde(default)]
    pub events: Vec<EventConfig>,
    /// Text shown next to the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Icon shown next to the key, replaces the label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<PathBuf>,
    /// Draw white on black
    #[serde(default)]
    pub inverted: bool,
    /// Shell command run on the host when the device reports the trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl KeyConfigEntry {
    pub fn trigger(&self) -> Result<Trigger> {
        self.trigger
            .parse()
            .with_context(|| format!("Invalid trigger '{}'", self.trigger))
    }

    pub fn events(&self) -> Result<Vec<Event>> {
        if self.events.len() > N_EVENTS {
            bail!(
                "Trigger {} has {} events, at most {} fit",
                self.trigger,
                self.events.len(),
                N_EVENTS
            );
        }
        self.events
            .iter()
            .map(|event| {
                event
                    .to_event()
                    .with_context(|| format!("Invalid event for {}", self.trigger))
            })
            .collect()
    }
}

/// What to draw in a display slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoration {
    Icon { path: PathBuf, inverted: bool },
    Label { text: String, inverted: bool },
}

/// Profile configuration for an application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile name (e.g., "blender", "media")
    pub name: String,
    /// Applications this profile matches (e.g., ["Blender"], ["*"] for default)
    #[serde(default)]
    pub match_apps: Vec<String>,
    /// Regular expressions tried against the focused window title
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_windows: Vec<String>,
    /// The profile applies while one of these processes runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_processes: Vec<String>,
    /// Text of the title banner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Trigger configurations
    #[serde(default)]
    pub keys: Vec<KeyConfigEntry>,
}

/// Display slot a trigger is drawn in, encoder rotation shares key 1
pub fn slot_for(trigger: Trigger) -> Slot {
    Slot::Key(trigger.input.key_number().unwrap_or(1))
}

impl ProfileConfig {
    /// Check if this profile matches an application name
    pub fn matches_app(&self, app_name: &str) -> bool {
        self.match_apps.iter().any(|pattern| {
            if pattern == "*" {
                true
            } else {
                pattern.eq_ignore_ascii_case(app_name)
            }
        })
    }

    /// Check if one of the profile's processes is running
    pub fn matches_process(&self, processes: &[String]) -> bool {
        self.match_processes.iter().any(|wanted| {
            processes
                .iter()
                .any(|running| running.eq_ignore_ascii_case(wanted))
        })
    }

    /// Compiled `match_windows` patterns
    pub fn window_patterns(&self) -> Result<Vec<Regex>> {
        self.match_windows
            .iter()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("Invalid window pattern '{}'", pattern))
            })
            .collect()
    }

    /// Check triggers and events, and that no trigger is configured twice
    pub fn validate(&self) -> Result<()> {
        self.window_patterns()?;
        let mut seen = HashSet::new();
        for entry in &self.keys {
            let trigger = entry.trigger()?;
            if !seen.insert(trigger) {
                bail!("Trigger {} configured twice", entry.trigger);
            }
            entry.events()?;
        }
        Ok(())
    }

    pub fn entry_for(&self, trigger: Trigger) -> Option<&KeyConfigEntry> {
        self.keys
            .iter()
            .find(|entry| entry.trigger().ok() == Some(trigger))
    }

    /// Sequences for every trigger, empty where nothing is configured
    ///
    /// Sending all of them replaces whatever a previous profile assigned.
    pub fn to_assignments(&self) -> Result<Vec<(Trigger, Vec<Event>)>> {
        Trigger::all()
            .map(|trigger| {
                let events = match self.entry_for(trigger) {
                    Some(entry) => entry.events()?,
                    None => Vec::new(),
                };
                Ok((trigger, events))
            })
            .collect()
    }

    /// Shell command for a trigger, if any
    pub fn command_for(&self, trigger: Trigger) -> Option<&str> {
        self.entry_for(trigger)
            .and_then(|entry| entry.command.as_deref())
    }

    /// Title and key decorations; the first entry of a slot with an icon
    /// or label wins
    pub fn decorations(&self) -> Vec<(Slot, Decoration)> {
        let mut decorations = Vec::new();
        if let Some(title) = &self.title {
            decorations.push((
                Slot::Title,
                Decoration::Label {
                    text: title.clone(),
                    inverted: true,
                },
            ));
        }

        for entry in &self.keys {
            let Ok(trigger) = entry.trigger() else {
                continue;
            };
            let slot = slot_for(trigger);
            if decorations.iter().any(|(s, _)| *s == slot) {
                continue;
            }
            let decoration = match (&entry.icon, &entry.label) {
                (Some(path), _) => Decoration::Icon {
                    path: path.clone(),
                    inverted: entry.inverted,
                },
                (None, Some(text)) => Decoration::Label {
                    text: text.clone(),
                    inverted: entry.inverted,
                },
                (None, None) => continue,
            };
            decorations.push((slot, decoration));
        }
        decorations
    }
}

/// Parse a hex colour like `#ff8000` to 0xRRGGBB
pub fn parse_hex_color(hex: &str) -> Option<u32> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::keycodes::{consumer, keyboard, mouse};
    use crate::event::{Edge, Input};

    fn entry(trigger: &str, events: Vec<EventConfig>) -> KeyConfigEntry {
        KeyConfigEntry {
            trigger: trigger.to_string(),
            events,
            label: None,
            icon: None,
            inverted: false,
            command: None,
        }
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), Some(0xff0000));
        assert_eq!(parse_hex_color("00ff80"), Some(0x00ff80));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("invalid"), None);
        assert_eq!(parse_hex_color("+fffff"), None);
    }

    #[test]
    fn test_profile_matches_app() {
        let profile = ProfileConfig {
            name: "test".to_string(),
            match_apps: vec!["Blender".to_string(), "GIMP".to_string()],
            ..Default::default()
        };

        assert!(profile.matches_app("Blender"));
        assert!(profile.matches_app("blender")); // Case insensitive
        assert!(profile.matches_app("gimp"));
        assert!(!profile.matches_app("Terminal"));
    }

    #[test]
    fn test_profile_wildcard() {
        let profile = ProfileConfig {
            name: "default".to_string(),
            match_apps: vec!["*".to_string()],
            ..Default::default()
        };

        assert!(profile.matches_app("Blender"));
        assert!(profile.matches_app(""));
    }

    #[test]
    fn test_profile_matches_process() {
        let profile = ProfileConfig {
            name: "obs".to_string(),
            match_processes: vec!["obs".to_string()],
            ..Default::default()
        };
        let running = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();

        assert!(profile.matches_process(&running(&["bash", "OBS"])));
        assert!(!profile.matches_process(&running(&["obs-studio-helper"])));
        assert!(!profile.matches_process(&[]));
        assert!(!profile.matches_app("obs"));
    }

    #[test]
    fn test_window_patterns() {
        let mut profile = ProfileConfig {
            name: "gimp".to_string(),
            match_windows: vec!["^gimp.*".to_string(), "^Blender".to_string()],
            ..Default::default()
        };
        let patterns = profile.window_patterns().unwrap();
        assert!(patterns[0].is_match("gimp-2.10"));
        assert!(!patterns[0].is_match("[Untitled]-1.0 - GNU Image Manipulation Program"));
        assert!(patterns[1].is_match("Blender [scene.blend]"));
        profile.validate().unwrap();

        profile.match_windows = vec!["^gimp(".to_string()];
        assert!(profile.window_patterns().is_err());
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_code_names() {
        let key = EventConfig::Key {
            code: Code::Name("space".to_string()),
            action: ActionConfig::Press,
        };
        assert_eq!(
            key.to_event().unwrap(),
            Event::keyboard(keyboard::KEY_SPACE, KeyAction::Press)
        );

        let media = EventConfig::Consumer {
            code: Code::Name("PLAY_PAUSE".to_string()),
            action: ActionConfig::Stroke,
        };
        assert_eq!(
            media.to_event().unwrap(),
            Event::consumer(consumer::MEDIA_PLAY_PAUSE, KeyAction::Stroke)
        );

        let button = EventConfig::MouseButton {
            button: Code::Name("right".to_string()),
            action: ActionConfig::Stroke,
        };
        assert_eq!(
            button.to_event().unwrap(),
            Event::mouse_button(mouse::MOUSE_RIGHT as u8, KeyAction::Stroke)
        );

        let unknown = EventConfig::Key {
            code: Code::Name("NOPE".to_string()),
            action: ActionConfig::Stroke,
        };
        assert!(unknown.to_event().is_err());
        assert!(EventConfig::Delay { ms: 0 }.to_event().is_err());
    }

    #[test]
    fn test_parse_toml_profile() {
        let profile: ProfileConfig = toml::from_str(
            r#"
            name = "gimp"
            match_apps = ["GIMP"]
            title = "GIMP"

            [[keys]]
            trigger = "7p"
            icon = "icons/layers.png"
            events = [
                { type = "key", code = "LEFT_CTRL", action = "press" },
                { type = "key", code = 0x11 },
                { type = "key", code = "LEFT_CTRL", action = "release" },
            ]

            [[keys]]
            trigger = "R+"
            label = "Zoom"
            events = [{ type = "mouse_move", axis = "wheel", delta = 1 }]

            [[keys]]
            trigger = "4p"
            command = "notify-send hello"
            "#,
        )
        .unwrap();

        profile.validate().unwrap();
        let assignments = profile.to_assignments().unwrap();
        assert_eq!(assignments.len(), 20);

        let seven = Trigger::new(Input::key(7).unwrap(), Edge::Press);
        let (_, events) = assignments.iter().find(|(t, _)| *t == seven).unwrap();
        assert_eq!(
            events,
            &vec![
                Event::keyboard(keyboard::KEY_LEFT_CTRL, KeyAction::Press),
                Event::keyboard(keyboard::KEY_N, KeyAction::Stroke),
                Event::keyboard(keyboard::KEY_LEFT_CTRL, KeyAction::Release),
            ]
        );

        let four = Trigger::new(Input::key(4).unwrap(), Edge::Press);
        assert_eq!(profile.command_for(four), Some("notify-send hello"));
        assert_eq!(profile.command_for(seven), None);

        let decorations = profile.decorations();
        assert_eq!(decorations.len(), 3);
        assert_eq!(decorations[0].0, Slot::Title);
        assert_eq!(
            decorations[2],
            (
                Slot::Key(1),
                Decoration::Label {
                    text: "Zoom".to_string(),
                    inverted: false
                }
            )
        );
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let mut profile = ProfileConfig {
            name: "bad".to_string(),
            keys: vec![entry("2p", vec![]), entry("2p", vec![])],
            ..Default::default()
        };
        assert!(profile.validate().is_err());

        profile.keys = vec![entry("0p", vec![])];
        assert!(profile.validate().is_err());

        profile.keys = vec![entry("R-", vec![EventConfig::Delay { ms: 5 }; N_EVENTS + 1])];
        assert!(profile.validate().is_err());
        assert!(profile.to_assignments().is_err());
    }
}
