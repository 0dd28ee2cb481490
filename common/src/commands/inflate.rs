#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum InflateCommand {
    /// Hold the inflate pin for the given duration
    Trigger { duration_ms: u64 },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum InflateCommandResponse {
    Completed,
    Failed { reason: String },
}
