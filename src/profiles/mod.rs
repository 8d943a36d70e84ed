//! App profiles for context-aware key assignments

mod store;

pub use store::{
    parse_hex_color, slot_for, ActionConfig, AxisConfig, Code, Decoration, EventConfig, KeyConfigEntry,
    ProfileConfig,
};

use regex::Regex;
use tracing::warn;

use crate::state::Focus;

/// Picks the profile for the focused application
#[derive(Debug, Clone)]
pub struct ProfileManager {
    /// Valid profiles with their compiled window patterns
    profiles: Vec<(ProfileConfig, Vec<Regex>)>,
    fallback: ProfileConfig,
}

impl ProfileManager {
    /// Invalid profiles are dropped with a warning
    pub fn new(profiles: Vec<ProfileConfig>) -> Self {
        let profiles = profiles
            .into_iter()
            .filter_map(|profile| {
                match profile.validate().and_then(|()| profile.window_patterns()) {
                    Ok(windows) => Some((profile, windows)),
                    Err(e) => {
                        warn!("Ignoring profile '{}': {:#}", profile.name, e);
                        None
                    }
                }
            })
            .collect();

        Self {
            profiles,
            fallback: media_profile(),
        }
    }

    pub fn profiles(&self) -> impl Iterator<Item = &ProfileConfig> {
        self.profiles.iter().map(|(profile, _)| profile)
    }

    /// First profile matching the application, window title or a running
    /// process, else the media profile
    pub fn profile_for(&self, focus: &Focus) -> &ProfileConfig {
        self.profiles
            .iter()
            .find(|(profile, windows)| {
                profile.matches_app(&focus.app)
                    || profile.matches_process(&focus.processes)
                    || windows.iter().any(|pattern| pattern.is_match(&focus.title))
            })
            .map(|(profile, _)| profile)
            .unwrap_or(&self.fallback)
    }
}

fn key(trigger: &str, label: Option<&str>, events: Vec<EventConfig>) -> KeyConfigEntry {
    KeyConfigEntry {
        trigger: trigger.to_string(),
        events,
        label: label.map(str::to_string),
        icon: None,
        inverted: false,
        command: None,
    }
}

/// Press on the key edge, release on the release edge
fn held_consumer(number: u8, label: &str, name: &str) -> [KeyConfigEntry; 2] {
    let event = |action| EventConfig::Consumer {
        code: Code::Name(name.to_string()),
        action,
    };
    [
        key(
            &format!("{}p", number),
            Some(label),
            vec![event(ActionConfig::Press)],
        ),
        key(
            &format!("{}r", number),
            None,
            vec![event(ActionConfig::Release)],
        ),
    ]
}

/// Built-in profile: media keys, application launchers and volume on the encoder
pub fn media_profile() -> ProfileConfig {
    let mut keys = vec![
        key(
            "R+",
            Some("Volume"),
            vec![EventConfig::Consumer {
                code: Code::Name("MEDIA_VOLUME_UP".to_string()),
                action: ActionConfig::Stroke,
            }],
        ),
        key(
            "R-",
            None,
            vec![EventConfig::Consumer {
                code: Code::Name("MEDIA_VOLUME_DOWN".to_string()),
                action: ActionConfig::Stroke,
            }],
        ),
    ];
    keys.extend(held_consumer(1, "Volume", "MEDIA_VOLUME_MUTE"));
    keys.extend(held_consumer(2, "Play", "MEDIA_PLAY_PAUSE"));
    keys.extend(held_consumer(3, "Previous", "MEDIA_PREV"));
    keys.extend(held_consumer(5, "Mail", "CONSUMER_EMAIL_READER"));
    keys.extend(held_consumer(6, "Stop", "MEDIA_STOP"));
    keys.extend(held_consumer(7, "Next", "MEDIA_NEXT"));
    keys.extend(held_consumer(9, "Calculator", "CONSUMER_CALCULATOR"));

    ProfileConfig {
        name: "media".to_string(),
        match_apps: vec!["*".to_string()],
        title: Some("Default".to_string()),
        keys,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Slot;
    use crate::event::keycodes::consumer;
    use crate::event::{Edge, Event, Input, KeyAction, Trigger};

    fn profile(name: &str, apps: &[&str]) -> ProfileConfig {
        ProfileConfig {
            name: name.to_string(),
            match_apps: apps.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn app(name: &str) -> Focus {
        Focus {
            app: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_media_profile_is_valid() {
        let media = media_profile();
        media.validate().unwrap();

        let assignments = media.to_assignments().unwrap();
        let press = Trigger::new(Input::key(2).unwrap(), Edge::Press);
        let (_, events) = assignments.iter().find(|(t, _)| *t == press).unwrap();
        assert_eq!(
            events,
            &vec![Event::consumer(consumer::MEDIA_PLAY_PAUSE, KeyAction::Press)]
        );

        let unused = Trigger::new(Input::key(4).unwrap(), Edge::Press);
        let (_, events) = assignments.iter().find(|(t, _)| *t == unused).unwrap();
        assert!(events.is_empty());

        let slots: Vec<_> = media.decorations().into_iter().map(|(s, _)| s).collect();
        assert_eq!(slots[0], Slot::Title);
        assert!(slots.contains(&Slot::Key(1)));
        assert!(!slots.contains(&Slot::Key(4)));
    }

    #[test]
    fn test_first_match_wins() {
        let manager = ProfileManager::new(vec![
            profile("blender", &["Blender"]),
            profile("any", &["*"]),
            profile("gimp", &["GIMP"]),
        ]);

        assert_eq!(manager.profile_for(&app("blender")).name, "blender");
        assert_eq!(manager.profile_for(&app("GIMP")).name, "any");
    }

    #[test]
    fn test_process_and_window_matches() {
        let obs = ProfileConfig {
            name: "obs".to_string(),
            match_processes: vec!["obs".to_string()],
            ..Default::default()
        };
        let gimp = ProfileConfig {
            name: "gimp".to_string(),
            match_windows: vec!["^gimp.*".to_string()],
            ..Default::default()
        };
        let manager = ProfileManager::new(vec![obs, gimp]);

        let mut focus = Focus {
            app: "gimp-2.10".to_string(),
            title: "gimp-2.10".to_string(),
            processes: vec!["bash".to_string(), "gimp-2.10".to_string()],
        };
        assert_eq!(manager.profile_for(&focus).name, "gimp");

        // A running process wins over the focused window of a later profile
        focus.processes.push("obs".to_string());
        assert_eq!(manager.profile_for(&focus).name, "obs");

        focus.processes.clear();
        focus.title = "Terminal".to_string();
        assert_eq!(manager.profile_for(&focus).name, "media");
    }

    #[test]
    fn test_falls_back_to_media() {
        let manager = ProfileManager::new(vec![profile("blender", &["Blender"])]);
        assert_eq!(manager.profile_for(&app("Terminal")).name, "media");
        assert_eq!(
            ProfileManager::new(vec![]).profile_for(&Focus::default()).name,
            "media"
        );
    }

    #[test]
    fn test_invalid_profiles_are_dropped() {
        let mut bad = profile("bad", &["*"]);
        bad.keys.push(KeyConfigEntry {
            trigger: "X1".to_string(),
            events: vec![],
            label: None,
            icon: None,
            inverted: false,
            command: None,
        });

        let manager = ProfileManager::new(vec![bad, profile("good", &["*"])]);
        assert_eq!(manager.profiles().count(), 1);
        assert_eq!(manager.profile_for(&app("x")).name, "good");

        let broken = ProfileConfig {
            name: "broken".to_string(),
            match_windows: vec!["(".to_string()],
            ..Default::default()
        };
        assert_eq!(ProfileManager::new(vec![broken]).profiles().count(), 0);
    }
}
