//! The frame measurement pipeline: crop, binarize, locate, annotate

use tapegauge_common::FrameImage;

use crate::overlay;
use crate::segment::{self, BinaryFrame};

/// Grayscale intensity at or above which a pixel counts as bright
pub const BINARIZE_THRESHOLD: u8 = 90;

/// Detection line position used when the configured ratio is unusable
pub const DEFAULT_LINE_RATIO: f64 = 0.6;

/// One measurement cycle's result. Degraded cycles carry `pixel_length == 0`
/// and a status string; the overlay is produced either way so the display
/// keeps updating.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub pixel_length: u32,
    pub row: u32,
    pub status: Option<String>,
    pub overlay: FrameImage,
}

/// Measure the dominant bright segment in a frame.
///
/// The frame is cropped to its vertical middle half (the tape is centred in
/// the camera's view), grayscaled and binarized, then scanned near the
/// detection line. Location failures degrade to a zero-length measurement
/// with an annotated reason instead of an error, so the capture loop never
/// stalls on a bad frame.
pub fn measure(frame: &FrameImage, line_ratio: f64) -> Measurement {
    let cropped = crop_middle_half(frame);
    let luma = to_luma(&cropped);
    let binary = BinaryFrame::from_luma(cropped.width, cropped.height, &luma, BINARIZE_THRESHOLD);
    let nominal_row = resolve_line_row(cropped.height, line_ratio);

    match segment::locate(&binary, nominal_row) {
        Ok(located) => {
            let overlay =
                overlay::render_success(binary.data(), cropped.width, cropped.height, &located);
            Measurement {
                pixel_length: located.pixel_length(),
                row: located.row,
                status: None,
                overlay,
            }
        }
        Err(e) => {
            let reason = e.to_string();
            let overlay = overlay::render_failure(
                binary.data(),
                cropped.width,
                cropped.height,
                nominal_row,
                &reason,
            );
            Measurement {
                pixel_length: 0,
                row: nominal_row,
                status: Some(reason),
                overlay,
            }
        }
    }
}

/// Keep the middle half of the frame vertically, where the tape sits
fn crop_middle_half(frame: &FrameImage) -> FrameImage {
    let quarter = frame.height / 4;
    let start = quarter;
    let end = 3 * quarter;

    let row_bytes = (frame.width * 3) as usize;
    let pixels =
        frame.pixels[start as usize * row_bytes..end as usize * row_bytes].to_vec();

    FrameImage {
        width: frame.width,
        height: end - start,
        pixels,
    }
}

/// Rec. 601 luma with integer coefficients: Y = (76R + 150G + 29B) >> 8
fn to_luma(frame: &FrameImage) -> Vec<u8> {
    frame
        .pixels
        .chunks_exact(3)
        .map(|rgb| {
            let y = 76 * rgb[0] as u32 + 150 * rgb[1] as u32 + 29 * rgb[2] as u32;
            (y >> 8) as u8
        })
        .collect()
}

/// Detection row within the cropped frame for a configured line ratio.
/// Unusable ratios fall back to the default, out-of-range ones are clamped.
pub fn resolve_line_row(height: u32, ratio: f64) -> u32 {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        DEFAULT_LINE_RATIO
    };
    if height <= 1 {
        return 0;
    }
    (ratio * (height - 1) as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A dark frame with a white horizontal band across the given source rows
    fn frame_with_band(
        width: u32,
        height: u32,
        band_rows: std::ops::Range<u32>,
        start_col: u32,
        end_col: u32,
    ) -> FrameImage {
        let mut frame = FrameImage::new(width, height);
        for row in band_rows {
            for col in start_col..=end_col {
                let idx = ((row * width + col) * 3) as usize;
                frame.pixels[idx..idx + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        frame
    }

    #[test]
    fn measures_a_synthetic_tape_frame() {
        // 300x100 frame, bright run on columns 140..=160 across the middle
        let frame = frame_with_band(300, 100, 25..75, 140, 160);
        let measurement = measure(&frame, 0.6);

        assert_eq!(measurement.pixel_length, 21);
        assert_eq!(measurement.status, None);
        // Cropped to the middle half
        assert_eq!(measurement.overlay.width, 300);
        assert_eq!(measurement.overlay.height, 50);

        // Physical conversion is the caller's concern; with rate 0.5 this
        // frame reads 10.5
        assert_eq!(measurement.pixel_length as f64 * 0.5, 10.5);
    }

    #[test]
    fn dark_frame_degrades_to_zero_length() {
        let frame = FrameImage::new(300, 100);
        let measurement = measure(&frame, 0.6);

        assert_eq!(measurement.pixel_length, 0);
        assert!(measurement.status.is_some());
        assert_eq!(measurement.overlay.height, 50);
    }

    #[test]
    fn band_outside_the_crop_is_invisible() {
        // Band only in the top quarter, which the crop discards
        let frame = frame_with_band(300, 100, 0..20, 140, 160);
        let measurement = measure(&frame, 0.6);
        assert_eq!(measurement.pixel_length, 0);
    }

    #[test]
    fn gray_below_threshold_is_dark() {
        let mut frame = FrameImage::new(100, 40);
        // Fill the middle with a gray just under the binarize threshold
        for row in 10..30u32 {
            for col in 20..60u32 {
                let idx = ((row * 100 + col) * 3) as usize;
                frame.pixels[idx..idx + 3].copy_from_slice(&[89, 89, 89]);
            }
        }
        let measurement = measure(&frame, 0.5);
        assert_eq!(measurement.pixel_length, 0);
    }

    #[test]
    fn resolve_line_row_defaults_and_clamps() {
        // 0.6 of a 50-row crop (49 * 0.6 = 29.4)
        assert_eq!(resolve_line_row(50, 0.6), 29);
        // Clamped into range
        assert_eq!(resolve_line_row(50, 1.7), 49);
        assert_eq!(resolve_line_row(50, -0.3), 0);
        // Non-finite falls back to the default
        assert_eq!(resolve_line_row(50, f64::NAN), 29);
        // Degenerate heights
        assert_eq!(resolve_line_row(1, 0.6), 0);
        assert_eq!(resolve_line_row(0, 0.6), 0);
    }

    #[test]
    fn crop_keeps_the_middle_half() {
        let frame = FrameImage::new(10, 100);
        let cropped = crop_middle_half(&frame);
        assert_eq!(cropped.height, 50);
        assert_eq!(cropped.pixels.len(), 10 * 50 * 3);

        // Heights not divisible by four follow integer quarter maths
        let frame = FrameImage::new(10, 102);
        let cropped = crop_middle_half(&frame);
        assert_eq!(cropped.height, 50);
    }
}
