//! File-backed operator settings: five newline-delimited scalar fields

use std::fs;
use std::io;
use std::path::PathBuf;

use tapegauge_common::GaugeSettings;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("inflate duration must be a positive number")]
    InvalidInflateDuration,

    #[error("detection line ratio must be a number")]
    InvalidDetectionLineRatio,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The settings file: one value per line, in a fixed order.
///
///   camera host
///   inflator host
///   inflate duration (seconds, float)
///   post-inflate wait (seconds, integer)
///   detection line ratio (0..=1, float)
///
/// Missing or unparseable lines fall back to the field defaults. Every
/// successful update rewrites the whole file.
pub struct SettingsFile {
    path: PathBuf,
    settings: GaugeSettings,
}

impl SettingsFile {
    /// Load from the given path, falling back to defaults when the file is
    /// missing or partial.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(contents) => parse(&contents),
            Err(_) => GaugeSettings::default(),
        };
        Self { path, settings }
    }

    pub fn settings(&self) -> &GaugeSettings {
        &self.settings
    }

    pub fn set_camera_host(&mut self, host: &str) -> Result<(), SettingsError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(SettingsError::EmptyHost);
        }
        self.settings.camera_host = host.to_string();
        self.persist()
    }

    pub fn set_inflator_host(&mut self, host: &str) -> Result<(), SettingsError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(SettingsError::EmptyHost);
        }
        self.settings.inflator_host = host.to_string();
        self.persist()
    }

    pub fn set_inflate_duration(&mut self, seconds: f64) -> Result<(), SettingsError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(SettingsError::InvalidInflateDuration);
        }
        self.settings.inflate_duration_secs = seconds;
        self.persist()
    }

    pub fn set_post_inflate_wait(&mut self, seconds: u64) -> Result<(), SettingsError> {
        self.settings.post_inflate_wait_secs = seconds;
        self.persist()
    }

    /// Non-finite input is rejected; out-of-range input is clamped to 0..=1
    pub fn set_detection_line_ratio(&mut self, ratio: f64) -> Result<(), SettingsError> {
        if !ratio.is_finite() {
            return Err(SettingsError::InvalidDetectionLineRatio);
        }
        self.settings.detection_line_ratio = ratio.clamp(0.0, 1.0);
        self.persist()
    }

    fn persist(&self) -> Result<(), SettingsError> {
        let contents = format!(
            "{}\n{}\n{}\n{}\n{:.3}\n",
            self.settings.camera_host,
            self.settings.inflator_host,
            self.settings.inflate_duration_secs,
            self.settings.post_inflate_wait_secs,
            self.settings.detection_line_ratio,
        );
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

fn parse(contents: &str) -> GaugeSettings {
    let mut settings = GaugeSettings::default();
    let mut lines = contents.lines();

    if let Some(line) = lines.next() {
        settings.camera_host = line.trim().to_string();
    }
    if let Some(line) = lines.next() {
        settings.inflator_host = line.trim().to_string();
    }
    if let Some(line) = lines.next() {
        match line.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => {
                settings.inflate_duration_secs = value
            }
            _ => {}
        }
    }
    if let Some(line) = lines.next() {
        // Accept "5" as well as the "5.0" older builds wrote
        if let Ok(value) = line.trim().parse::<f64>() {
            if value.is_finite() && value >= 0.0 {
                settings.post_inflate_wait_secs = value as u64;
            }
        }
    }
    if let Some(line) = lines.next() {
        if let Ok(value) = line.trim().parse::<f64>() {
            if value.is_finite() {
                settings.detection_line_ratio = value.clamp(0.0, 1.0);
            }
        }
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir) -> PathBuf {
        dir.path().join("gauge-settings.txt")
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsFile::load(temp_path(&dir));

        assert_eq!(*store.settings(), GaugeSettings::default());
    }

    #[test]
    fn partial_file_falls_back_to_defaults_for_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);
        fs::write(&path, "10.39.5.132\n10.39.5.140\n").unwrap();

        let store = SettingsFile::load(&path);
        let settings = store.settings();
        assert_eq!(settings.camera_host, "10.39.5.132");
        assert_eq!(settings.inflator_host, "10.39.5.140");
        assert_eq!(settings.inflate_duration_secs, 10.0);
        assert_eq!(settings.post_inflate_wait_secs, 5);
        assert_eq!(settings.detection_line_ratio, 0.6);
    }

    #[test]
    fn garbage_numeric_fields_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);
        fs::write(&path, "cam\ninflator\nnot-a-number\n-3\n2.5\n").unwrap();

        let store = SettingsFile::load(&path);
        let settings = store.settings();
        assert_eq!(settings.inflate_duration_secs, 10.0);
        assert_eq!(settings.post_inflate_wait_secs, 5);
        // Out-of-range ratio is clamped, not rejected
        assert_eq!(settings.detection_line_ratio, 1.0);
    }

    #[test]
    fn updates_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir);

        let mut store = SettingsFile::load(&path);
        store.set_camera_host("10.39.5.132").unwrap();
        store.set_inflator_host("10.39.5.140").unwrap();
        store.set_inflate_duration(12.5).unwrap();
        store.set_post_inflate_wait(8).unwrap();
        store.set_detection_line_ratio(0.45).unwrap();

        let reloaded = SettingsFile::load(&path);
        let settings = reloaded.settings();
        assert_eq!(settings.camera_host, "10.39.5.132");
        assert_eq!(settings.inflator_host, "10.39.5.140");
        assert_eq!(settings.inflate_duration_secs, 12.5);
        assert_eq!(settings.post_inflate_wait_secs, 8);
        assert_eq!(settings.detection_line_ratio, 0.45);
    }

    #[test]
    fn invalid_input_is_rejected_without_mutation() {
        let dir = TempDir::new().unwrap();
        let mut store = SettingsFile::load(temp_path(&dir));

        assert!(store.set_camera_host("   ").is_err());
        assert!(store.set_inflate_duration(0.0).is_err());
        assert!(store.set_inflate_duration(-2.0).is_err());
        assert!(store.set_inflate_duration(f64::NAN).is_err());
        assert!(store.set_detection_line_ratio(f64::INFINITY).is_err());

        assert_eq!(*store.settings(), GaugeSettings::default());
    }

    #[test]
    fn ratio_is_clamped_on_update() {
        let dir = TempDir::new().unwrap();
        let mut store = SettingsFile::load(temp_path(&dir));

        store.set_detection_line_ratio(1.8).unwrap();
        assert_eq!(store.settings().detection_line_ratio, 1.0);
        store.set_detection_line_ratio(-0.2).unwrap();
        assert_eq!(store.settings().detection_line_ratio, 0.0);
    }
}
