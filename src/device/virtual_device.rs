//! Firmware side of the serial protocol
//!
//! `VirtualDevice` keeps the state the keypad keeps (assignment table, LED
//! colours and framebuffer), answers host commands and runs the assigned
//! sequences when its physical inputs change.

use anyhow::{anyhow, Result};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::{self, Command, RefreshMode, Report, ACK};
use super::settings::{Settings, ROT_FACTOR};
use crate::display::Bitmap;
use crate::event::{AssignmentTable, Edge, Input, Trigger};
use crate::input::{Dispatcher, HidBackend};

/// Most encoder clicks a single simulator line may turn
const MAX_CLICKS_PER_LINE: i32 = 100;

/// Switch and encoder changes seen by the keypad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalInput {
    KeyDown(u8),
    KeyUp(u8),
    /// Raw encoder steps, `ROT_FACTOR` steps make one click
    Rotate(i32),
}

impl PhysicalInput {
    /// Parse a line of simulator input
    ///
    /// `3` taps key 3, `3p`/`3r` press or release it, `+`/`-` turn the
    /// encoder one click and `+4` four clicks (at most 100).
    pub fn parse_line(line: &str) -> Option<Vec<PhysicalInput>> {
        let line = line.trim();
        let factor = i32::from(ROT_FACTOR);

        if let Some(sign) = line.chars().next().filter(|c| *c == '+' || *c == '-') {
            let rest = &line[1..];
            let clicks: i32 = if rest.is_empty() {
                1
            } else if rest.bytes().all(|b| b.is_ascii_digit()) {
                rest.parse().ok()?
            } else {
                return None;
            };
            if clicks > MAX_CLICKS_PER_LINE {
                return None;
            }
            let steps = clicks.checked_mul(factor)?;
            return Some(vec![PhysicalInput::Rotate(if sign == '+' { steps } else { -steps })]);
        }

        let (number, edge) = match line.char_indices().last()? {
            (i, 'p') => (&line[..i], Some(Edge::Press)),
            (i, 'r') => (&line[..i], Some(Edge::Release)),
            _ => (line, None),
        };
        let number: u8 = number.parse().ok()?;
        Input::key(number)?;

        let inputs = match edge {
            Some(Edge::Press) => vec![PhysicalInput::KeyDown(number)],
            Some(Edge::Release) => vec![PhysicalInput::KeyUp(number)],
            None => vec![PhysicalInput::KeyDown(number), PhysicalInput::KeyUp(number)],
        };
        Some(inputs)
    }
}

/// A command from the host with its payload already read
#[derive(Debug)]
enum HostMessage {
    Command(Command),
    Image { x: u16, y: u16, bitmap: Bitmap },
}

/// Simulated keypad
pub struct VirtualDevice<B> {
    settings: Settings,
    table: AssignmentTable,
    leds: Vec<u32>,
    framebuffer: Bitmap,
    display_on: bool,
    /// Raw steps not yet counted as a click
    steps: i32,
    position: i32,
    dispatcher: Dispatcher<B>,
}

impl<B: HidBackend> VirtualDevice<B> {
    pub fn new(settings: Settings, backend: B) -> Self {
        Self {
            settings,
            table: AssignmentTable::new(),
            leds: vec![0; settings.n_leds as usize],
            framebuffer: Bitmap::blank(settings.disp_w, settings.disp_h, true),
            display_on: false,
            steps: 0,
            position: 0,
            dispatcher: Dispatcher::new(backend),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn table(&self) -> &AssignmentTable {
        &self.table
    }

    pub fn leds(&self) -> &[u32] {
        &self.leds
    }

    pub fn framebuffer(&self) -> &Bitmap {
        &self.framebuffer
    }

    /// Display is powered, between a refresh and `R o`
    pub fn is_display_on(&self) -> bool {
        self.display_on
    }

    /// Encoder position in clicks
    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn backend(&self) -> &B {
        self.dispatcher.backend()
    }

    /// Apply a host command, returning the reply lines
    pub fn handle_command(&mut self, command: Command) -> Vec<String> {
        match command {
            Command::Assign { trigger, events } => {
                match self.table.assign(trigger, &events) {
                    Ok(()) => debug!("Assigned {} event(s) to {}", events.len(), trigger),
                    Err(e) => warn!("Rejected assignment to {}: {}", trigger, e),
                }
                Vec::new()
            }
            Command::Leds(colors) => {
                for (led, color) in self.leds.iter_mut().zip(colors) {
                    *led = color;
                }
                Vec::new()
            }
            Command::Refresh(mode) => {
                self.display_on = mode != RefreshMode::Off;
                debug!("Display refresh: {:?}", mode);
                vec![ACK.to_string()]
            }
            Command::Info => protocol::info_lines(&self.settings),
            Command::Display { x, y, .. } => {
                warn!("Display command at {},{} arrived without payload", x, y);
                Vec::new()
            }
        }
    }

    fn draw(&mut self, x: u16, y: u16, bitmap: &Bitmap) {
        if x.saturating_add(bitmap.width()) > self.settings.disp_w
            || y.saturating_add(bitmap.height()) > self.settings.disp_h
        {
            warn!(
                "Image {}x{} at {},{} exceeds the display, clipping",
                bitmap.width(),
                bitmap.height(),
                x,
                y
            );
        }
        self.framebuffer.blit(x, y, bitmap);
    }

    /// Process a physical input: report it and run the assigned sequences
    pub async fn handle_input(&mut self, input: PhysicalInput) -> Result<Vec<Report>> {
        let mut reports = Vec::new();
        match input {
            PhysicalInput::KeyDown(number) | PhysicalInput::KeyUp(number) => {
                let key = Input::key(number).ok_or_else(|| anyhow!("No key {}", number))?;
                let edge = if matches!(input, PhysicalInput::KeyDown(_)) {
                    Edge::Press
                } else {
                    Edge::Release
                };
                reports.push(Report::Key { number, edge });
                self.fire(Trigger::new(key, edge)).await?;
            }
            PhysicalInput::Rotate(raw) => {
                self.steps += raw;
                let factor = i32::from(ROT_FACTOR);
                while self.steps.abs() >= factor {
                    let edge = if self.steps > 0 {
                        self.steps -= factor;
                        self.position += 1;
                        Edge::INCREMENT
                    } else {
                        self.steps += factor;
                        self.position -= 1;
                        Edge::DECREMENT
                    };
                    reports.push(Report::Rotary(self.position));
                    self.fire(Trigger::new(Input::ROTARY, edge)).await?;
                }
            }
        }
        Ok(reports)
    }

    async fn fire(&mut self, trigger: Trigger) -> Result<()> {
        let sequence: Vec<_> = self.table.sequence(trigger).collect();
        if sequence.is_empty() {
            return Ok(());
        }
        debug!("Running {} event(s) for {}", sequence.len(), trigger);
        self.dispatcher.run(sequence).await?;
        Ok(())
    }

    /// Serve a host connection until it closes
    ///
    /// Physical inputs are taken from `inputs` while the channel is open.
    pub async fn run<S>(
        &mut self,
        stream: S,
        mut inputs: mpsc::Receiver<PhysicalInput>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        let (tx, mut messages) = mpsc::channel(16);
        let reader = tokio::spawn(read_commands(read_half, tx));
        let mut inputs_open = true;

        info!("Virtual device ready");
        loop {
            let lines = tokio::select! {
                message = messages.recv() => match message {
                    Some(HostMessage::Command(command)) => self.handle_command(command),
                    Some(HostMessage::Image { x, y, bitmap }) => {
                        self.draw(x, y, &bitmap);
                        Vec::new()
                    }
                    None => break,
                },
                input = inputs.recv(), if inputs_open => match input {
                    Some(input) => match self.handle_input(input).await {
                        Ok(reports) => reports.iter().map(Report::to_line).collect(),
                        Err(e) => {
                            warn!("Input {:?} failed: {}", input, e);
                            Vec::new()
                        }
                    },
                    None => {
                        inputs_open = false;
                        Vec::new()
                    }
                },
            };

            for line in lines {
                debug!("Sending: {}", line);
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\r\n").await?;
            }
            writer.flush().await?;
        }

        reader.abort();
        info!("Host closed the connection");
        Ok(())
    }
}

async fn read_commands<R>(reader: R, tx: mpsc::Sender<HostMessage>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Error reading from host: {}", e);
                break;
            }
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        debug!("Received: {}", text);

        let message = match Command::parse(text) {
            Ok(Command::Display {
                x,
                y,
                width,
                height,
            }) => {
                let mut data = vec![0; protocol::bitmap_len(width, height)];
                if let Err(e) = reader.read_exact(&mut data).await {
                    warn!("Bitmap payload incomplete: {}", e);
                    break;
                }
                match Bitmap::from_raw(width, height, data) {
                    Ok(bitmap) => HostMessage::Image { x, y, bitmap },
                    Err(e) => {
                        warn!("{}", e);
                        continue;
                    }
                }
            }
            Ok(command) => HostMessage::Command(command),
            Err(e) => {
                warn!("Ignoring '{}': {}", text, e);
                continue;
            }
        };

        if tx.send(message).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::manager::{DeviceManager, InputEvent};
    use crate::event::keycodes::{consumer, keyboard};
    use crate::event::{Event, KeyAction};
    use crate::input::recording::{HidCall, RecordingBackend};
    use crate::input::KeyState;
    use std::time::Duration;

    fn device() -> VirtualDevice<RecordingBackend> {
        VirtualDevice::new(Settings::default(), RecordingBackend::default())
    }

    #[test]
    fn test_parse_simulator_lines() {
        assert_eq!(
            PhysicalInput::parse_line("3"),
            Some(vec![PhysicalInput::KeyDown(3), PhysicalInput::KeyUp(3)])
        );
        assert_eq!(
            PhysicalInput::parse_line(" 9r "),
            Some(vec![PhysicalInput::KeyUp(9)])
        );
        assert_eq!(
            PhysicalInput::parse_line("+"),
            Some(vec![PhysicalInput::Rotate(4)])
        );
        assert_eq!(
            PhysicalInput::parse_line("-3"),
            Some(vec![PhysicalInput::Rotate(-12)])
        );
        assert_eq!(
            PhysicalInput::parse_line("+100"),
            Some(vec![PhysicalInput::Rotate(400)])
        );
        assert_eq!(PhysicalInput::parse_line("+101"), None);
        assert_eq!(PhysicalInput::parse_line("+600000000"), None);
        assert_eq!(PhysicalInput::parse_line("-99999999999"), None);
        assert_eq!(PhysicalInput::parse_line("-+3"), None);
        assert_eq!(PhysicalInput::parse_line("0"), None);
        assert_eq!(PhysicalInput::parse_line("x"), None);
        assert_eq!(PhysicalInput::parse_line(""), None);
    }

    #[tokio::test]
    async fn test_key_edges_run_assigned_sequences() {
        let mut device = device();
        let trigger = Trigger::new(Input::key(4).unwrap(), Edge::Press);
        device.handle_command(Command::Assign {
            trigger,
            events: vec![Event::keyboard(keyboard::KEY_A, KeyAction::Stroke)],
        });

        let reports = device.handle_input(PhysicalInput::KeyDown(4)).await.unwrap();
        assert_eq!(
            reports,
            vec![Report::Key {
                number: 4,
                edge: Edge::Press
            }]
        );
        // Release has nothing assigned
        device.handle_input(PhysicalInput::KeyUp(4)).await.unwrap();

        assert_eq!(
            device.backend().calls(),
            vec![
                HidCall::Keyboard(keyboard::KEY_A, KeyState::Down),
                HidCall::Keyboard(keyboard::KEY_A, KeyState::Up),
            ]
        );
        assert!(device.handle_input(PhysicalInput::KeyDown(10)).await.is_err());
    }

    #[tokio::test]
    async fn test_encoder_steps_make_clicks() {
        let mut device = device();
        device.handle_command(Command::Assign {
            trigger: Trigger::new(Input::ROTARY, Edge::INCREMENT),
            events: vec![Event::consumer(consumer::MEDIA_VOLUME_UP, KeyAction::Stroke)],
        });
        device.handle_command(Command::Assign {
            trigger: Trigger::new(Input::ROTARY, Edge::DECREMENT),
            events: vec![Event::consumer(consumer::MEDIA_VOLUME_DOWN, KeyAction::Stroke)],
        });

        assert!(device
            .handle_input(PhysicalInput::Rotate(3))
            .await
            .unwrap()
            .is_empty());
        let reports = device.handle_input(PhysicalInput::Rotate(6)).await.unwrap();
        assert_eq!(reports, vec![Report::Rotary(1), Report::Rotary(2)]);

        let reports = device.handle_input(PhysicalInput::Rotate(-5)).await.unwrap();
        assert_eq!(reports, vec![Report::Rotary(1)]);
        assert_eq!(device.position(), 1);

        let calls = device.backend().calls();
        assert_eq!(calls.len(), 6);
        assert_eq!(
            calls[4],
            HidCall::Consumer(consumer::MEDIA_VOLUME_DOWN, KeyState::Down)
        );
    }

    #[test]
    fn test_commands_update_state() {
        let mut device = device();
        assert_eq!(device.leds().len(), 12);

        assert!(device
            .handle_command(Command::Leds(vec![0xff0000, 0x00ff00]))
            .is_empty());
        assert_eq!(&device.leds()[..3], &[0xff0000, 0x00ff00, 0]);

        assert_eq!(
            device.handle_command(Command::Refresh(RefreshMode::Full)),
            vec![ACK.to_string()]
        );
        assert!(device.is_display_on());
        let info = device.handle_command(Command::Info);
        assert_eq!(info.first().map(String::as_str), Some("Inkkeys"));
        assert_eq!(info.last().map(String::as_str), Some("Done"));

        // Eleven events do not fit
        device.handle_command(Command::Assign {
            trigger: Trigger::new(Input::key(2).unwrap(), Edge::Press),
            events: vec![Event::delay(1); 11],
        });
        assert_eq!(device.table().assigned_count(), 0);
    }

    #[tokio::test]
    async fn test_serves_host_connection() {
        let (host, stream) = tokio::io::duplex(8192);
        let (input_tx, input_rx) = mpsc::channel(8);
        let mut device = device();

        let host_side = async move {
            let mut manager = DeviceManager::new("virtual", host);
            let settings = manager.request_info(Duration::from_secs(2)).await.unwrap();
            assert_eq!(settings, Settings::default());

            let trigger = Trigger::new(Input::key(1).unwrap(), Edge::Press);
            manager
                .assign_key(
                    trigger,
                    &[Event::keyboard(keyboard::KEY_ENTER, KeyAction::Stroke)],
                )
                .await
                .unwrap();
            manager.set_leds(&[0x0000ff]).await.unwrap();
            manager
                .send_image(0, 0, Bitmap::blank(8, 2, false))
                .await
                .unwrap();
            manager
                .update_display(false, Duration::from_secs(2))
                .await
                .unwrap();

            input_tx.send(PhysicalInput::KeyDown(1)).await.unwrap();
            input_tx.send(PhysicalInput::Rotate(-4)).await.unwrap();

            let mut events = Vec::new();
            while events.len() < 2 {
                if let Some(event) = manager.poll_event().unwrap() {
                    events.push(event);
                } else {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
            assert_eq!(events, vec![InputEvent::KeyDown(1), InputEvent::Rotate(-1)]);
            manager.disconnect().await;
        };

        let (_, served) = tokio::join!(host_side, device.run(stream, input_rx));
        served.unwrap();

        assert_eq!(device.leds()[0], 0x0000ff);
        assert!(!device.framebuffer().get(0, 0));
        assert!(device.framebuffer().get(8, 0));
        assert_eq!(
            device.backend().calls(),
            vec![
                HidCall::Keyboard(keyboard::KEY_ENTER, KeyState::Down),
                HidCall::Keyboard(keyboard::KEY_ENTER, KeyState::Up),
            ]
        );
    }
}
