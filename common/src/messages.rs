//! Definition of Tapegauge messages

// We don't use these messages in the tapegauge_common crate itself
#![allow(dead_code)]

use crate::commands::inflate::{InflateCommand, InflateCommandResponse};
use crate::commands::measurer::{MeasurerCommand, MeasurerCommandResponse};
use crate::commands::monitor::{MonitorCommand, MonitorCommandResponse};
use crate::commands::settings::{SettingsCommand, SettingsCommandResponse};
use crate::types::{FrameImage, GaugeSettings};

// Caryatid core messages
use caryatid_module_clock::messages::ClockTickMessage;

/// Captured camera frame message
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct FrameCapturedMessage {
    /// Capture sequence number, monotonic within a process run
    pub sequence: u64,

    /// The decoded frame, RGB8
    pub frame: FrameImage,
}

/// Capture failure message, published when a frame could not be acquired
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct CaptureFailedMessage {
    /// Human-readable failure reason
    pub reason: String,
}

/// Width measurement message
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct WidthMeasurementMessage {
    /// Sequence number of the frame this was measured from
    pub sequence: u64,

    /// Length of the detected segment in pixels; 0 when no segment was found
    pub pixel_length: u32,

    /// Calibrated physical length in mm; None until a calibration exists
    pub physical_mm: Option<f64>,

    /// Row of the cropped frame the segment was found on
    pub row: u32,

    /// Failure description when the measurement is degraded
    pub status: Option<String>,

    /// Annotated frame for display
    pub overlay: FrameImage,
}

/// Current operator settings, published on load and after every update
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct SettingsMessage {
    pub settings: GaugeSettings,
}

/// Notification request kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NotifyKind {
    #[default]
    Info,
    Error,
    Recovery,
}

/// Notification channel, mapped to a webhook URL by the notifier
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NotifyChannel {
    Alerts,
    #[default]
    Operations,
}

/// Notification request message
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct NotifyMessage {
    pub kind: NotifyKind,

    /// Category key for escalation/recovery tracking, e.g. "width-low"
    pub category: String,

    pub channel: NotifyChannel,

    pub message: String,

    /// Error occurrence count at which the wording escalates; 0 disables
    pub escalate_after: u32,
}

/// Commands, addressed by topic
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Command {
    Monitor(MonitorCommand),
    Measurer(MeasurerCommand),
    Inflate(InflateCommand),
    Settings(SettingsCommand),
}

/// Command responses
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum CommandResponse {
    Monitor(MonitorCommandResponse),
    Measurer(MeasurerCommandResponse),
    Inflate(InflateCommandResponse),
    Settings(SettingsCommandResponse),
}

// === Global message enum ===
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Message {
    None(()),                                  // Just so we have a simple default

    // Generic messages, get of jail free cards
    String(String),                            // Simple string
    JSON(serde_json::Value),                   // JSON object

    // Caryatid standard messages
    Clock(ClockTickMessage),                   // Clock tick

    // Tapegauge messages
    Frame(FrameCapturedMessage),               // Camera frame available
    CaptureFailed(CaptureFailedMessage),       // Frame acquisition failed
    Measurement(WidthMeasurementMessage),      // Width measurement available
    SettingsUpdated(SettingsMessage),          // Operator settings changed
    Notify(NotifyMessage),                     // Notification request

    // Command/response pairs
    Command(Command),
    CommandResponse(CommandResponse),
}

impl Default for Message {
    fn default() -> Self {
        Self::None(())
    }
}

// Casts from specific messages
impl From<ClockTickMessage> for Message {
    fn from(msg: ClockTickMessage) -> Self {
        Message::Clock(msg)
    }
}

impl From<FrameCapturedMessage> for Message {
    fn from(msg: FrameCapturedMessage) -> Self {
        Message::Frame(msg)
    }
}

impl From<CaptureFailedMessage> for Message {
    fn from(msg: CaptureFailedMessage) -> Self {
        Message::CaptureFailed(msg)
    }
}

impl From<WidthMeasurementMessage> for Message {
    fn from(msg: WidthMeasurementMessage) -> Self {
        Message::Measurement(msg)
    }
}

impl From<SettingsMessage> for Message {
    fn from(msg: SettingsMessage) -> Self {
        Message::SettingsUpdated(msg)
    }
}

impl From<NotifyMessage> for Message {
    fn from(msg: NotifyMessage) -> Self {
        Message::Notify(msg)
    }
}
