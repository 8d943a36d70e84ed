use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::event::{keycodes, Action, Event, KeyAction, MouseAxis};

/// Key state passed to a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

/// Something that can emit HID input: the USB stack on the keypad,
/// the host desktop, or a log
pub trait HidBackend {
    fn keyboard(&mut self, code: u16, state: KeyState) -> Result<()>;
    fn consumer(&mut self, code: u16, state: KeyState) -> Result<()>;
    fn mouse_buttons(&mut self, buttons: u8, state: KeyState) -> Result<()>;
    fn mouse_move(&mut self, axis: MouseAxis, delta: i8) -> Result<()>;
}

/// Runs assigned event sequences against a backend
pub struct Dispatcher<B> {
    backend: B,
}

impl<B: HidBackend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_inner(self) -> B {
        self.backend
    }

    /// Execute events up to the first empty slot
    ///
    /// Returns the number of events executed. Stops at the first backend
    /// error; undecodable events are skipped.
    pub async fn run<I>(&mut self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = Event>,
    {
        let mut executed = 0;
        for (position, event) in events.into_iter().enumerate() {
            if event.is_empty() {
                break;
            }
            match event.action() {
                Ok(Some(action)) => {
                    self.execute(action)
                        .await
                        .with_context(|| format!("Event {} ({}) failed", position, event))?;
                    executed += 1;
                }
                Ok(None) => break,
                Err(e) => warn!("Skipping event {} ({}): {}", position, event, e),
            }
        }
        Ok(executed)
    }

    /// Execute a single decoded action
    pub async fn execute(&mut self, action: Action) -> Result<()> {
        debug!("Dispatching {:?}", action);
        match action {
            Action::Keyboard { code, action } => {
                for state in key_states(action) {
                    self.backend.keyboard(code, *state)?;
                }
            }
            Action::Consumer { code, action } => {
                for state in key_states(action) {
                    self.backend.consumer(code, *state)?;
                }
            }
            Action::MouseButton { buttons, action } => {
                for state in key_states(action) {
                    self.backend.mouse_buttons(buttons, *state)?;
                }
            }
            Action::MouseMove { axis, delta } => self.backend.mouse_move(axis, delta)?,
            Action::Delay { .. } => {
                if let Some(duration) = action.delay() {
                    sleep(duration).await;
                }
            }
        }
        Ok(())
    }
}

fn key_states(action: KeyAction) -> &'static [KeyState] {
    match action {
        KeyAction::Stroke => &[KeyState::Down, KeyState::Up],
        KeyAction::Press => &[KeyState::Down],
        KeyAction::Release => &[KeyState::Up],
    }
}

/// Backend that only logs what it would send
#[derive(Debug, Default)]
pub struct LogBackend;

impl HidBackend for LogBackend {
    fn keyboard(&mut self, code: u16, state: KeyState) -> Result<()> {
        let name = keycodes::keyboard::name_of(code).unwrap_or("?");
        info!("Keyboard {} (0x{:02x}) {:?}", name, code, state);
        Ok(())
    }

    fn consumer(&mut self, code: u16, state: KeyState) -> Result<()> {
        let name = keycodes::consumer::name_of(code).unwrap_or("?");
        info!("Consumer {} (0x{:03x}) {:?}", name, code, state);
        Ok(())
    }

    fn mouse_buttons(&mut self, buttons: u8, state: KeyState) -> Result<()> {
        info!("Mouse buttons 0b{:05b} {:?}", buttons, state);
        Ok(())
    }

    fn mouse_move(&mut self, axis: MouseAxis, delta: i8) -> Result<()> {
        info!("Mouse {:?} {:+}", axis, delta);
        Ok(())
    }
}
