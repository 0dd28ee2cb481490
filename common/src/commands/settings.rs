use crate::types::GaugeSettings;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum SettingsCommand {
    /// Read back the current settings
    Get,

    SetCameraHost { host: String },
    SetInflatorHost { host: String },
    SetInflateDuration { seconds: f64 },
    SetPostInflateWait { seconds: u64 },
    SetDetectionLineRatio { ratio: f64 },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum SettingsCommandResponse {
    Current(GaugeSettings),
    Updated(GaugeSettings),
    Error(String),
}
