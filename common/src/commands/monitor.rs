#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum MonitorCommand {
    /// Arm monitoring with an alert threshold in mm
    Start { threshold_mm: f64 },

    /// Disarm monitoring, clearing threshold and counters
    Stop,

    /// Query the current session state
    Status,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum MonitorCommandResponse {
    Started { threshold_mm: f64 },
    Stopped,
    Status(MonitorStatus),
    Error(String),
}

/// Snapshot of the monitoring session for status queries
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct MonitorStatus {
    pub monitoring: bool,
    pub state: String,
    pub threshold_mm: Option<f64>,
    pub trigger_count: u32,
    pub action_in_flight: bool,
}
