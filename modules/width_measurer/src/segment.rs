//! Bright-segment location on a binarized frame
//!
//! A single fixed scan row is brittle against vibration of the tape, so the
//! search starts at the nominal row and spirals outward one row at a time
//! until a usable segment turns up or the frame is exhausted.

use thiserror::Error;

/// Intensity of a bright cell after binarization
pub const BRIGHT: u8 = 255;
/// Intensity of a dark cell after binarization
pub const DARK: u8 = 0;

/// Fraction of the frame width excluded at each edge, where sensor vignetting
/// and enclosure shadows produce spurious bright pixels
const EDGE_MARGIN_RATIO: f64 = 0.05;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("no usable bright segment near the scan row")]
    NoSegmentFound,

    #[error("frame is empty")]
    EmptyFrame,
}

/// A single-channel frame holding exactly two intensity levels
#[derive(Debug, Clone)]
pub struct BinaryFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryFrame {
    /// Binarize a grayscale buffer: values at or above `threshold` become
    /// BRIGHT, everything else DARK
    pub fn from_luma(width: u32, height: u32, luma: &[u8], threshold: u8) -> Self {
        let data =
            luma.iter().map(|&v| if v >= threshold { BRIGHT } else { DARK }).collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.width) as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A located bright segment: inclusive column bounds on one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub start: u32,
    pub end: u32,
    pub row: u32,
}

impl Located {
    pub fn pixel_length(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Find the widest contiguous bright run near `nominal_row`.
///
/// Rows are tried in the order nominal, +1, -1, +2, -2, ... clipped at the
/// frame edges. On each row, bright columns inside the edge margin are
/// partitioned into maximal runs of consecutive indices and the longest run
/// wins; equal lengths go to the leftmost run.
pub fn locate(frame: &BinaryFrame, nominal_row: u32) -> Result<Located, LocateError> {
    if frame.height == 0 || frame.width == 0 {
        return Err(LocateError::EmptyFrame);
    }

    let target = nominal_row.min(frame.height - 1);
    let margin = ((frame.width as f64) * EDGE_MARGIN_RATIO).ceil() as u32;

    for row in search_rows(target, frame.height) {
        if let Some((start, end)) = widest_run(frame.row(row), margin, frame.width) {
            return Ok(Located { start, end, row });
        }
    }

    Err(LocateError::NoSegmentFound)
}

/// Row search order: the target first, then alternating outward offsets,
/// stopping at the frame edges without wrapping
fn search_rows(target: u32, height: u32) -> Vec<u32> {
    let mut rows = vec![target];
    for step in 1..height {
        if target + step < height {
            rows.push(target + step);
        }
        if target >= step {
            rows.push(target - step);
        }
    }
    rows
}

/// The widest run of consecutive bright columns within [margin, width-margin],
/// or None if the row has no usable bright pixels
fn widest_run(row: &[u8], margin: u32, width: u32) -> Option<(u32, u32)> {
    let upper = width.checked_sub(margin)?;

    let mut best: Option<(u32, u32)> = None;
    let mut current: Option<(u32, u32)> = None;

    for col in margin..=upper.min(width - 1) {
        if row[col as usize] == BRIGHT {
            current = match current {
                Some((start, _)) => Some((start, col)),
                None => Some((col, col)),
            };
        } else if let Some(run) = current.take() {
            best = longer(best, run);
        }
    }
    if let Some(run) = current {
        best = longer(best, run);
    }
    best
}

/// Strictly-greater comparison keeps the first (leftmost) run on ties
fn longer(best: Option<(u32, u32)>, candidate: (u32, u32)) -> Option<(u32, u32)> {
    match best {
        Some((start, end)) if end - start >= candidate.1 - candidate.0 => Some((start, end)),
        _ => Some(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A dark frame with one bright run per listed (row, start, end)
    fn frame_with_runs(width: u32, height: u32, runs: &[(u32, u32, u32)]) -> BinaryFrame {
        let mut luma = vec![0u8; (width * height) as usize];
        for &(row, start, end) in runs {
            for col in start..=end {
                luma[(row * width + col) as usize] = 255;
            }
        }
        BinaryFrame::from_luma(width, height, &luma, 90)
    }

    #[test]
    fn finds_the_run_on_the_nominal_row() {
        let frame = frame_with_runs(300, 100, &[(60, 140, 160)]);
        let located = locate(&frame, 60).unwrap();
        assert_eq!(located, Located { start: 140, end: 160, row: 60 });
        assert_eq!(located.pixel_length(), 21);
    }

    #[test]
    fn outward_search_reaches_a_distant_row() {
        // Run far from the nominal row, on both sides
        for run_row in [5, 95] {
            let frame = frame_with_runs(300, 100, &[(run_row, 100, 120)]);
            let located = locate(&frame, 50).unwrap();
            assert_eq!(located.row, run_row);
            assert_eq!(located.pixel_length(), 21);
        }
    }

    #[test]
    fn nearer_rows_are_preferred() {
        let frame = frame_with_runs(300, 100, &[(48, 100, 110), (55, 100, 130)]);
        // 48 is two rows away, 55 is five; the closer row wins even though
        // its run is shorter
        let located = locate(&frame, 50).unwrap();
        assert_eq!(located.row, 48);
    }

    #[test]
    fn all_dark_frame_has_no_segment() {
        let frame = frame_with_runs(300, 100, &[]);
        assert_eq!(locate(&frame, 50), Err(LocateError::NoSegmentFound));
    }

    #[test]
    fn runs_inside_the_edge_margin_are_ignored() {
        // 300 wide -> margin 15; both runs live entirely inside the bands
        let frame = frame_with_runs(300, 100, &[(50, 0, 14), (50, 286, 299)]);
        assert_eq!(locate(&frame, 50), Err(LocateError::NoSegmentFound));
    }

    #[test]
    fn margin_clips_a_run_straddling_the_edge_band() {
        let frame = frame_with_runs(300, 100, &[(50, 10, 40)]);
        let located = locate(&frame, 50).unwrap();
        assert_eq!((located.start, located.end), (15, 40));
    }

    #[test]
    fn longest_run_wins_on_a_row() {
        let frame = frame_with_runs(300, 100, &[(50, 30, 40), (50, 100, 140), (50, 200, 210)]);
        let located = locate(&frame, 50).unwrap();
        assert_eq!((located.start, located.end), (100, 140));
    }

    #[test]
    fn equal_length_runs_tie_break_leftmost() {
        let frame = frame_with_runs(300, 100, &[(50, 40, 60), (50, 200, 220)]);
        let located = locate(&frame, 50).unwrap();
        assert_eq!((located.start, located.end), (40, 60));
    }

    #[test]
    fn single_pixel_gaps_split_runs() {
        // A gap of exactly one column keeps the runs separate
        let frame = frame_with_runs(300, 100, &[(50, 100, 110), (50, 112, 130)]);
        let located = locate(&frame, 50).unwrap();
        assert_eq!((located.start, located.end), (112, 130));
    }

    #[test]
    fn nominal_row_is_clamped_into_the_frame() {
        let frame = frame_with_runs(300, 100, &[(99, 100, 120)]);
        let located = locate(&frame, 5000).unwrap();
        assert_eq!(located.row, 99);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = BinaryFrame::from_luma(0, 0, &[], 90);
        assert_eq!(locate(&frame, 0), Err(LocateError::EmptyFrame));
    }

    #[test]
    fn binarization_threshold_is_inclusive() {
        let luma = vec![89u8, 90, 91];
        let frame = BinaryFrame::from_luma(3, 1, &luma, 90);
        assert_eq!(frame.row(0), &[DARK, BRIGHT, BRIGHT]);
    }
}
