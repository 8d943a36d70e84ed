use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialPortType};
use tracing::{debug, info, warn};

use super::protocol::{self, Command, RefreshMode, Report, ACK, INFO_FOOTER, INFO_HEADER};
use super::settings::{Settings, BAUD_RATE};
use crate::display::{area_for, Bitmap, Slot};
use crate::event::{Edge, Event, Trigger};

/// Input reports from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(u8),
    KeyUp(u8),
    /// Encoder moved, cumulative position in clicks
    Rotate(i32),
}

impl From<Report> for InputEvent {
    fn from(report: Report) -> Self {
        match report {
            Report::Key {
                number,
                edge: Edge::Press,
            } => InputEvent::KeyDown(number),
            Report::Key {
                number,
                edge: Edge::Release,
            } => InputEvent::KeyUp(number),
            Report::Rotary(position) => InputEvent::Rotate(position),
        }
    }
}

/// Device information
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub port: String,
    #[serde(flatten)]
    pub settings: Settings,
}

/// List serial ports that belong to a USB device with the given ids
pub fn find_ports(vendor_id: u16, product_id: u16) -> Vec<PathBuf> {
    let ports = match tokio_serial::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Cannot enumerate serial ports: {}", e);
            return Vec::new();
        }
    };

    let mut ports: Vec<PathBuf> = ports
        .into_iter()
        .filter_map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) if usb.vid == vendor_id && usb.pid == product_id => {
                Some(PathBuf::from(port.port_name))
            }
            _ => None,
        })
        .collect();
    ports.sort();
    ports
}

/// Host side of the serial connection to an inkkeys device
pub struct DeviceManager {
    port: String,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    lines: mpsc::Receiver<String>,
    reader: JoinHandle<()>,
    settings: Settings,
    /// Images sent since the last refresh, resent after it
    image_buffer: Vec<(u16, u16, Bitmap)>,
    /// Reports that arrived while waiting for a reply
    pending: VecDeque<InputEvent>,
}

impl DeviceManager {
    /// Wrap an already open byte stream
    pub fn new<S>(port: impl Into<String>, stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(64);

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.replace('\r', "");
                        debug!("Received: {}", line);
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Serial stream closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Error reading from device: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            port: port.into(),
            writer: Box::new(write_half),
            lines: rx,
            reader,
            settings: Settings::default(),
            image_buffer: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Open a serial port
    pub fn open(path: &Path) -> Result<Self> {
        let stream = tokio_serial::new(path.to_string_lossy(), BAUD_RATE)
            .open_native_async()
            .with_context(|| format!("Failed to open {:?}", path))?;
        Ok(Self::new(path.display().to_string(), stream))
    }

    /// Open a port and verify it is an inkkeys running the regular firmware
    pub async fn connect(path: &Path, info_timeout: Duration) -> Result<Self> {
        info!("Connecting to {:?}...", path);
        let mut manager = Self::open(path)?;
        let settings = manager.request_info(info_timeout).await?;

        if settings.test_mode {
            bail!(
                "{:?} runs the hardware test firmware, flash the inkkeys firmware to use it",
                path
            );
        }

        info!("Connected to {:?}", path);
        Ok(manager)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            port: self.port.clone(),
            settings: self.settings,
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        debug!("Sending: {}", line);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn send_command(&mut self, command: &Command) -> Result<()> {
        let line = command.to_line()?;
        self.send_line(&line).await
    }

    async fn next_line(&mut self, deadline: Instant) -> Result<String> {
        match timeout_at(deadline, self.lines.recv()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(anyhow!("Device disconnected")),
            Err(_) => Err(anyhow!("Timed out waiting for device")),
        }
    }

    /// Query the info block and remember the reported settings
    pub async fn request_info(&mut self, timeout: Duration) -> Result<Settings> {
        info!("Requesting device info...");
        let deadline = Instant::now() + timeout;
        timeout_at(deadline, self.send_command(&Command::Info))
            .await
            .map_err(|_| anyhow!("Timed out sending info request"))??;

        loop {
            let line = self.next_line(deadline).await.context("No info header")?;
            if line == INFO_HEADER {
                break;
            }
            self.stash_report(&line);
        }

        let mut settings = Settings::default();
        loop {
            let line = self.next_line(deadline).await.context("Incomplete info")?;
            if line == INFO_FOOTER {
                break;
            }
            if !protocol::apply_info_line(&mut settings, &line) {
                debug!("Skipping: {}", line);
            }
        }

        info!(
            "Device info: test={} leds={} display={}x{} circle_steps={}",
            settings.test_mode,
            settings.n_leds,
            settings.disp_w,
            settings.disp_h,
            settings.rot_circle_steps
        );
        self.settings = settings;
        Ok(settings)
    }

    /// Assign an event sequence to a trigger, an empty slice clears it
    pub async fn assign_key(&mut self, trigger: Trigger, events: &[Event]) -> Result<()> {
        self.send_command(&Command::Assign {
            trigger,
            events: events.to_vec(),
        })
        .await
    }

    /// Set LED colours (0xRRGGBB)
    pub async fn set_leds(&mut self, colors: &[u32]) -> Result<()> {
        self.send_command(&Command::Leds(colors.to_vec())).await
    }

    /// Switch all LEDs off
    pub async fn clear_leds(&mut self) -> Result<()> {
        let off = vec![0; self.settings.n_leds as usize];
        self.set_leds(&off).await
    }

    async fn write_image(&mut self, x: u16, y: u16, bitmap: &Bitmap) -> Result<()> {
        self.send_command(&Command::Display {
            x,
            y,
            width: bitmap.width(),
            height: bitmap.height(),
        })
        .await?;
        debug!("Sending {} bytes of bitmap data", bitmap.data().len());
        self.writer.write_all(bitmap.data()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Write an image region; it becomes visible on the next refresh
    pub async fn send_image(&mut self, x: u16, y: u16, bitmap: Bitmap) -> Result<()> {
        self.write_image(x, y, &bitmap).await?;
        self.image_buffer.push((x, y, bitmap));
        Ok(())
    }

    /// Write an image into the region of a display slot, scaled to fit
    pub async fn send_image_for(&mut self, slot: Slot, bitmap: Bitmap) -> Result<()> {
        let area = area_for(slot, &self.settings)
            .ok_or_else(|| anyhow!("No display area for {:?}", slot))?;
        let bitmap = if (bitmap.width(), bitmap.height()) == (area.width, area.height) {
            bitmap
        } else {
            debug!(
                "Scaling {}x{} image to {}x{} for {:?}",
                bitmap.width(),
                bitmap.height(),
                area.width,
                area.height,
                slot
            );
            bitmap.resize(area.width, area.height)?
        };
        self.send_image(area.x, area.y, bitmap).await
    }

    /// Refresh the display, then power it down
    ///
    /// The e-ink controller needs the new content in both of its buffers,
    /// so every image sent since the last update is sent again between the
    /// refresh and the power-off.
    pub async fn update_display(&mut self, full: bool, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mode = if full {
            RefreshMode::Full
        } else {
            RefreshMode::Partial
        };

        self.send_command(&Command::Refresh(mode)).await?;
        self.wait_for_ack(deadline).await?;

        let images = std::mem::take(&mut self.image_buffer);
        for (x, y, bitmap) in &images {
            self.write_image(*x, *y, bitmap).await?;
        }

        self.send_command(&Command::Refresh(RefreshMode::Off)).await?;
        self.wait_for_ack(deadline).await
    }

    async fn wait_for_ack(&mut self, deadline: Instant) -> Result<()> {
        loop {
            let line = self
                .next_line(deadline)
                .await
                .context("No refresh acknowledgement")?;
            if line == ACK {
                return Ok(());
            }
            self.stash_report(&line);
        }
    }

    fn stash_report(&mut self, line: &str) {
        match Report::parse(line) {
            Some(report) => self.pending.push_back(report.into()),
            None => debug!("Skipping: {}", line),
        }
    }

    /// Next input report, without blocking
    pub fn poll_event(&mut self) -> Result<Option<InputEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        loop {
            match self.lines.try_recv() {
                Ok(line) => match Report::parse(&line) {
                    Some(report) => return Ok(Some(report.into())),
                    None => debug!("Ignoring: {}", line),
                },
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(anyhow!("Device disconnected")),
            }
        }
    }

    /// Close the connection
    pub async fn disconnect(mut self) {
        info!("Disconnecting from {}...", self.port);
        if let Err(e) = self.writer.shutdown().await {
            debug!("Shutdown failed: {}", e);
        }
        self.reader.abort();
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
