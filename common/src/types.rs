//! Definition of Tapegauge shared types

/// An RGB8 image buffer passed between modules.
/// `pixels` holds `width * height * 3` bytes in row-major order.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 3) as usize],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Operator-adjustable settings, persisted by the settings store and shared
/// with the capture, measurement and monitoring modules over the bus.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GaugeSettings {
    /// Camera host, without scheme ("10.39.5.132") or with one
    pub camera_host: String,

    /// Inflator host, same format as the camera host
    pub inflator_host: String,

    /// How long the inflate pin is held, in seconds
    pub inflate_duration_secs: f64,

    /// Settle wait after a successful inflate, in seconds
    pub post_inflate_wait_secs: u64,

    /// Vertical position of the detection line within the cropped frame, 0..=1
    pub detection_line_ratio: f64,
}

impl Default for GaugeSettings {
    fn default() -> Self {
        Self {
            camera_host: String::new(),
            inflator_host: String::new(),
            inflate_duration_secs: 10.0,
            post_inflate_wait_secs: 5,
            detection_line_ratio: 0.6,
        }
    }
}

impl GaugeSettings {
    /// Camera base URL with an http scheme, or None if no host is configured
    pub fn camera_base_url(&self) -> Option<String> {
        base_url(&self.camera_host)
    }

    /// Inflator base URL with an http scheme, or None if no host is configured
    pub fn inflator_base_url(&self) -> Option<String> {
        base_url(&self.inflator_host)
    }
}

fn base_url(host: &str) -> Option<String> {
    let host = host.trim();
    if host.is_empty() {
        None
    } else {
        Some(ensure_http_prefix(host))
    }
}

/// Prefix a bare host with "http://", leaving explicit schemes alone
pub fn ensure_http_prefix(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_http_prefix() {
        assert_eq!(ensure_http_prefix("10.39.5.132"), "http://10.39.5.132");
    }

    #[test]
    fn explicit_schemes_are_kept() {
        assert_eq!(ensure_http_prefix("http://cam.local"), "http://cam.local");
        assert_eq!(ensure_http_prefix("https://cam.local"), "https://cam.local");
    }

    #[test]
    fn empty_hosts_yield_no_base_url() {
        let settings = GaugeSettings::default();
        assert_eq!(settings.camera_base_url(), None);
        assert_eq!(settings.inflator_base_url(), None);

        let settings = GaugeSettings {
            camera_host: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.camera_base_url(), None);
    }

    #[test]
    fn configured_host_is_prefixed() {
        let settings = GaugeSettings {
            inflator_host: "192.168.1.20".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.inflator_base_url(),
            Some("http://192.168.1.20".to_string())
        );
    }
}
