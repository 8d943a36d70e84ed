use std::time::{Duration, Instant};

/// How long LEDs stay at full brightness after being set
pub const LED_HOLD: Duration = Duration::from_millis(3000);

/// Length of the fade-out that follows
pub const LED_FADE: Duration = Duration::from_millis(500);

/// What profile matching looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Focus {
    /// Name of the focused application, empty when unknown
    pub app: String,
    /// Full title of the focused window
    pub title: String,
    /// Names of running processes
    pub processes: Vec<String>,
}

/// Application state shared across components
#[derive(Debug, Clone)]
pub struct AppState {
    /// Device is connected
    pub connected: bool,
    pub focus: Focus,
    /// Name of the active profile
    pub profile: Option<String>,
    /// Last encoder position reported by the device
    pub encoder_position: i32,
    pub leds: LedState,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            connected: false,
            focus: Focus::default(),
            profile: None,
            encoder_position: 0,
            leds: LedState::new(LED_HOLD, LED_FADE),
        }
    }

    /// Reset per-connection state
    pub fn reset(&mut self) {
        self.connected = false;
        self.profile = None;
        self.encoder_position = 0;
        self.leds.clear();
    }
}

/// LED colours last sent to the device, faded out over time
#[derive(Debug, Clone)]
pub struct LedState {
    colors: Option<Vec<u32>>,
    set_at: Instant,
    hold: Duration,
    fade: Duration,
}

impl LedState {
    pub fn new(hold: Duration, fade: Duration) -> Self {
        Self {
            colors: None,
            set_at: Instant::now(),
            hold,
            fade,
        }
    }

    pub fn set(&mut self, colors: Vec<u32>, now: Instant) {
        self.colors = Some(colors);
        self.set_at = now;
    }

    pub fn clear(&mut self) {
        self.colors = None;
    }

    pub fn is_active(&self) -> bool {
        self.colors.is_some()
    }

    /// Colours to send for the current moment, if they changed
    ///
    /// Nothing while holding, dimmed colours while fading and a single
    /// all-off frame when the fade completes.
    pub fn fade(&mut self, now: Instant) -> Option<Vec<u32>> {
        let colors = self.colors.as_ref()?;
        let elapsed = now.saturating_duration_since(self.set_at);
        let remaining = (self.hold + self.fade).saturating_sub(elapsed);

        if remaining.is_zero() {
            let off = vec![0; colors.len()];
            self.colors = None;
            return Some(off);
        }
        if remaining >= self.fade {
            return None;
        }

        let p = remaining.as_secs_f32() / self.fade.as_secs_f32();
        Some(colors.iter().map(|&c| dim(c, p)).collect())
    }
}

/// Scale each channel of a 0xRRGGBB colour by `p` (0.0-1.0)
pub fn dim(color: u32, p: f32) -> u32 {
    let p = p.clamp(0.0, 1.0);
    let channel = |shift: u32| (((color >> shift) & 0xff) as f32 * p) as u32;
    (channel(16) << 16) | (channel(8) << 8) | channel(0)
}

/// One lit LED at the angle of the encoder position
pub fn position_ring(position: i32, n_leds: u8, circle_steps: u8, color: u32) -> Vec<u32> {
    let mut colors = vec![0; n_leds as usize];
    if n_leds == 0 {
        return colors;
    }
    let steps = i32::from(circle_steps.max(1));
    let index = position.rem_euclid(steps) * i32::from(n_leds) / steps;
    colors[index as usize] = color;
    colors
}
