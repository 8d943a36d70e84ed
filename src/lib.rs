pub mod config;
pub mod device;
pub mod display;
pub mod event;
pub mod input;
pub mod profiles;
pub mod state;
pub mod system;

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use config::{Config, DeviceConfig};
use device::{find_ports, DeviceManager, InputEvent, Settings};
use display::{area_for, Bitmap, Slot, TextRenderer};
use event::{Edge, Input, Trigger};
use profiles::{Decoration, ProfileConfig, ProfileManager};
use state::{position_ring, AppState, LedState};

/// Colour of the encoder position shown on the LED ring
const RING_COLOR: u32 = 0x00ff40;

/// Listing processes is slow, so it runs less often than the window check
const PROCESS_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Main application struct
pub struct App {
    config: Config,
    state: AppState,
    device: Option<DeviceManager>,
    profiles: ProfileManager,
    text: Option<TextRenderer>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        let text = config
            .display
            .font
            .as_ref()
            .and_then(|path| match TextRenderer::load(path) {
                Ok(renderer) => Some(renderer),
                Err(e) => {
                    warn!("Labels disabled: {:#}", e);
                    None
                }
            });

        let mut state = AppState::new();
        state.leds = LedState::new(config.leds.hold(), config.leds.fade());

        Self {
            profiles: ProfileManager::new(config.profiles.clone()),
            config,
            state,
            device: None,
            text,
        }
    }

    /// Use an already connected device instead of opening a port
    pub fn with_device(config: Config, device: DeviceManager) -> Self {
        let mut app = Self::new(config);
        app.device = Some(device);
        app.state.connected = true;
        app
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Connect to the configured or first detected port
    pub async fn connect(&mut self) -> Result<()> {
        let port = resolve_port(&self.config.device)?;
        let device = DeviceManager::connect(&port, self.config.device.info_timeout()).await?;

        self.state.reset();
        self.state.connected = true;
        self.device = Some(device);
        Ok(())
    }

    /// Run the main loop until an unrecoverable error
    pub async fn run(&mut self) -> Result<()> {
        info!("Running - waiting for key reports");

        let app_check_interval = Duration::from_millis(500);
        let mut last_app_check: Option<Instant> = None;
        let mut last_process_check: Option<Instant> = None;

        let led_interval = Duration::from_millis(33);
        let mut last_led_update = Instant::now();

        loop {
            if self.device.is_none() {
                if let Err(e) = self.connect().await {
                    debug!("Connection failed: {:#}", e);
                    tokio::time::sleep(self.config.device.retry_interval()).await;
                    continue;
                }
                last_app_check = None;
            }

            if last_process_check.map_or(true, |t| t.elapsed() >= PROCESS_CHECK_INTERVAL) {
                last_process_check = Some(Instant::now());
                self.state.focus.processes = system::running_processes().await;
            }

            if last_app_check.map_or(true, |t| t.elapsed() >= app_check_interval) {
                last_app_check = Some(Instant::now());
                let result = self.apply_focused_profile().await;
                self.check_device(result);
            }

            let result = self.process_events().await;
            self.check_device(result);

            if last_led_update.elapsed() >= led_interval {
                last_led_update = Instant::now();
                let result = self.fade_leds().await;
                self.check_device(result);
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Drop the device after a failed operation, it is reopened by the run loop
    fn check_device(&mut self, result: Result<()>) {
        if let Err(e) = result {
            warn!("Device error, will try to reconnect: {:#}", e);
            self.device = None;
            self.state.reset();
        }
    }

    /// Switch to the profile of the focused application if it changed
    async fn apply_focused_profile(&mut self) -> Result<()> {
        let title = system::get_focused_app().await.unwrap_or_default();
        let app = system::app_name_from_title(&title);
        if self.state.focus.app != app {
            debug!("Focused app changed: '{}' -> '{}'", self.state.focus.app, app);
            self.state.focus.app = app;
        }
        self.state.focus.title = title;

        let profile = self.profiles.profile_for(&self.state.focus);
        if self.state.profile.as_deref() == Some(profile.name.as_str()) {
            return Ok(());
        }

        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        info!(
            "Activating profile '{}' for '{}'",
            profile.name, self.state.focus.app
        );
        send_profile(
            device,
            profile,
            self.text.as_ref(),
            self.config.display.full_refresh,
            self.config.device.refresh_timeout(),
        )
        .await?;
        self.state.profile = Some(profile.name.clone());
        Ok(())
    }

    async fn process_events(&mut self) -> Result<()> {
        loop {
            let Some(device) = self.device.as_mut() else {
                return Ok(());
            };
            let Some(event) = device.poll_event()? else {
                return Ok(());
            };
            self.handle_event(event).await?;
        }
    }

    async fn handle_event(&mut self, event: InputEvent) -> Result<()> {
        debug!("Device event: {:?}", event);
        let trigger = match event {
            InputEvent::KeyDown(n) | InputEvent::KeyUp(n) => {
                let input = Input::key(n).ok_or_else(|| anyhow!("Report for unknown key {}", n))?;
                let edge = if matches!(event, InputEvent::KeyDown(_)) {
                    Edge::Press
                } else {
                    Edge::Release
                };
                Trigger::new(input, edge)
            }
            InputEvent::Rotate(position) => {
                let previous = std::mem::replace(&mut self.state.encoder_position, position);
                if position == previous {
                    return Ok(());
                }
                let edge = if position > previous {
                    Edge::INCREMENT
                } else {
                    Edge::DECREMENT
                };
                self.show_position().await?;
                Trigger::new(Input::ROTARY, edge)
            }
        };

        let profile = self.current_profile();
        if let Some(command) = profile.command_for(trigger) {
            run_command(command, trigger, self.state.encoder_position);
        }
        Ok(())
    }

    fn current_profile(&self) -> &ProfileConfig {
        self.profiles.profile_for(&self.state.focus)
    }

    async fn show_position(&mut self) -> Result<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        let settings = *device.settings();
        let colors = position_ring(
            self.state.encoder_position,
            settings.n_leds,
            settings.rot_circle_steps,
            RING_COLOR,
        );
        device.set_leds(&colors).await?;
        self.state.leds.set(colors, Instant::now());
        Ok(())
    }

    async fn fade_leds(&mut self) -> Result<()> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        if let Some(colors) = self.state.leds.fade(Instant::now()) {
            device.set_leds(&colors).await?;
        }
        Ok(())
    }

    /// Gracefully shutdown the application
    pub async fn shutdown(&mut self) {
        info!("Shutting down inkkeys...");

        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.clear_leds().await {
                warn!("Failed to switch LEDs off: {}", e);
            }
            device.disconnect().await;
        }

        info!("Shutdown complete");
    }
}

/// Port from the configuration, or the first one with the keypad's USB ids
pub fn resolve_port(config: &DeviceConfig) -> Result<PathBuf> {
    if let Some(port) = &config.port {
        return Ok(port.clone());
    }
    find_ports(config.vendor_id, config.product_id)
        .into_iter()
        .next()
        .ok_or_else(|| {
            anyhow!(
                "No device with USB id {:04x}:{:04x} found",
                config.vendor_id,
                config.product_id
            )
        })
}

/// Assign every trigger and repaint the display for a profile
pub async fn send_profile(
    device: &mut DeviceManager,
    profile: &ProfileConfig,
    text: Option<&TextRenderer>,
    full_refresh: bool,
    refresh_timeout: Duration,
) -> Result<()> {
    for (trigger, events) in profile.to_assignments()? {
        device.assign_key(trigger, &events).await?;
    }

    let settings = *device.settings();
    let decorations = profile.decorations();
    for slot in Slot::ALL {
        let decoration = decorations
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, d)| d);
        if let Some(bitmap) = render_slot(slot, decoration, text, &settings) {
            device.send_image_for(slot, bitmap).await?;
        }
    }

    device.update_display(full_refresh, refresh_timeout).await
}

fn render_slot(
    slot: Slot,
    decoration: Option<&Decoration>,
    text: Option<&TextRenderer>,
    settings: &Settings,
) -> Option<Bitmap> {
    let area = area_for(slot, settings)?;
    let blank = || Bitmap::blank(area.width, area.height, true);

    let bitmap = match decoration {
        Some(Decoration::Icon { path, inverted }) => {
            Bitmap::load_icon(path, &area, *inverted).unwrap_or_else(|e| {
                warn!("{:#}", e);
                blank()
            })
        }
        Some(Decoration::Label {
            text: label,
            inverted,
        }) => match text {
            Some(renderer) => renderer.render(label, &area, *inverted).unwrap_or_else(|e| {
                warn!("Failed to render '{}': {:#}", label, e);
                blank()
            }),
            None => Bitmap::blank(area.width, area.height, !*inverted),
        },
        None => blank(),
    };
    Some(bitmap)
}

/// Run a profile command in the background
fn run_command(command: &str, trigger: Trigger, position: i32) {
    info!("Running '{}' for {}", command, trigger);

    let child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("INKKEYS_TRIGGER", trigger.to_string())
        .env("INKKEYS_POSITION", position.to_string())
        .spawn();

    match child {
        Ok(mut child) => {
            let command = command.to_string();
            // Reap the child so it does not linger as a zombie
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) if !status.success() => {
                        warn!("'{}' exited with {}", command, status)
                    }
                    Ok(_) => {}
                    Err(e) => error!("Failed to wait for '{}': {}", command, e),
                }
            });
        }
        Err(e) => error!("Failed to run '{}': {}", command, e),
    }
}
