#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum MeasurerCommand {
    /// Derive the calibration rate from the latest measurement and a known
    /// physical length held in front of the camera
    Calibrate { known_length_mm: f64 },

    /// Fetch the latest measurement
    GetMeasurement,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum MeasurerCommandResponse {
    Calibrated { rate_mm_per_px: f64 },
    Measurement(LatestMeasurement),
    Error(String),
}

/// Latest measurement summary, without the overlay frame
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct LatestMeasurement {
    pub pixel_length: u32,
    pub physical_mm: Option<f64>,
}
