//! Overlay rendering for measurement frames
//!
//! The overlay shows the binarized view with the scan line, the detected
//! segment and a pixel-length label; on failure a darkened banner carries the
//! reason instead. Labels use a built-in 5x7 glyph set so no font files are
//! needed on the device.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use tapegauge_common::FrameImage;

use crate::segment::Located;

const SCAN_LINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const SEGMENT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const BANNER_TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const BANNER_HEIGHT: u32 = 40;
const LABEL_SCALE: u32 = 2;

/// Render the overlay for a successful measurement
pub fn render_success(binary_luma: &[u8], width: u32, height: u32, located: &Located) -> FrameImage {
    let mut img = luma_to_rgb(binary_luma, width, height);

    draw_scan_line(&mut img, located.row);

    // Highlight the segment, two rows thick
    let y = located.row as f32;
    draw_line_segment_mut(
        &mut img,
        (located.start as f32, y),
        (located.end as f32, y),
        SEGMENT_COLOR,
    );
    if located.row + 1 < height {
        draw_line_segment_mut(
            &mut img,
            (located.start as f32, y + 1.0),
            (located.end as f32, y + 1.0),
            SEGMENT_COLOR,
        );
    }

    let label = format!("{}px", located.pixel_length());
    let label_width = text_width(&label, LABEL_SCALE);
    let center = (located.start + located.end) / 2;
    let label_x = (center as i32) - (label_width as i32) / 2;
    let label_y =
        (located.row as i32 - 10).max(20) - glyphs::HEIGHT as i32 * LABEL_SCALE as i32;
    draw_text(&mut img, &label, label_x, label_y, LABEL_SCALE, LABEL_COLOR);

    to_frame(img)
}

/// Render the overlay for a failed measurement: scan line at the nominal row
/// plus a status banner along the bottom edge
pub fn render_failure(
    binary_luma: &[u8],
    width: u32,
    height: u32,
    nominal_row: u32,
    reason: &str,
) -> FrameImage {
    let mut img = luma_to_rgb(binary_luma, width, height);

    draw_scan_line(&mut img, nominal_row);
    draw_banner(&mut img, reason);

    to_frame(img)
}

fn luma_to_rgb(luma: &[u8], width: u32, height: u32) -> RgbImage {
    let mut pixels = Vec::with_capacity(luma.len() * 3);
    for &v in luma {
        pixels.extend_from_slice(&[v, v, v]);
    }
    RgbImage::from_raw(width, height, pixels).unwrap_or_else(|| RgbImage::new(width, height))
}

fn to_frame(img: RgbImage) -> FrameImage {
    FrameImage {
        width: img.width(),
        height: img.height(),
        pixels: img.into_raw(),
    }
}

fn draw_scan_line(img: &mut RgbImage, row: u32) {
    let y = row.min(img.height().saturating_sub(1)) as f32;
    draw_line_segment_mut(img, (0.0, y), ((img.width() - 1) as f32, y), SCAN_LINE_COLOR);
}

/// Darken a strip along the bottom edge and write the reason into it
fn draw_banner(img: &mut RgbImage, reason: &str) {
    let height = img.height();
    let top = height.saturating_sub(BANNER_HEIGHT);

    for y in top..height {
        for x in 0..img.width() {
            let pixel = img.get_pixel_mut(x, y);
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as u32 * 2 / 5) as u8;
            }
        }
    }

    let y = height as i32 - 15 - glyphs::HEIGHT as i32;
    draw_text(img, reason, 10, y, 1, BANNER_TEXT_COLOR);
}

/// Width in pixels of a string at the given scale
fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * (glyphs::WIDTH + 1) * scale
}

/// Draw text with the built-in glyph set; characters without a glyph render
/// as blanks
fn draw_text(img: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let mut cursor_x = x;
    for c in text.chars() {
        if let Some(rows) = glyphs::glyph(c) {
            for (row_idx, bits) in rows.iter().enumerate() {
                for col_idx in 0..glyphs::WIDTH {
                    if bits & (0x10 >> col_idx) == 0 {
                        continue;
                    }
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let px = cursor_x + (col_idx * scale + dx) as i32;
                            let py = y + (row_idx as u32 * scale + dy) as i32;
                            if px >= 0
                                && py >= 0
                                && (px as u32) < img.width()
                                && (py as u32) < img.height()
                            {
                                img.put_pixel(px as u32, py as u32, color);
                            }
                        }
                    }
                }
            }
        }
        cursor_x += ((glyphs::WIDTH + 1) * scale) as i32;
    }
}

mod glyphs {
    //! Minimal 5x7 bitmap glyphs: digits, lowercase letters and punctuation
    //! used by labels and status banners. Each row is a 5-bit pattern,
    //! most significant bit leftmost.

    pub const WIDTH: u32 = 5;
    pub const HEIGHT: u32 = 7;

    pub fn glyph(c: char) -> Option<[u8; 7]> {
        let rows = match c.to_ascii_lowercase() {
            '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
            '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
            '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
            '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
            '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
            '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
            '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
            '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
            '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
            '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
            'a' => [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
            'b' => [0x10, 0x10, 0x1E, 0x11, 0x11, 0x11, 0x1E],
            'c' => [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E],
            'd' => [0x01, 0x01, 0x0F, 0x11, 0x11, 0x11, 0x0F],
            'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
            'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
            'g' => [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E],
            'h' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11],
            'i' => [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
            'j' => [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C],
            'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
            'l' => [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
            'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
            'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
            'o' => [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
            'p' => [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
            'q' => [0x00, 0x00, 0x0F, 0x11, 0x0F, 0x01, 0x01],
            'r' => [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
            's' => [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
            't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
            'u' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D],
            'v' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04],
            'w' => [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A],
            'x' => [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
            'y' => [0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E],
            'z' => [0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F],
            ' ' => [0x00; 7],
            '-' => [0x00, 0x00, 0x00, 0x0E, 0x00, 0x00, 0x00],
            '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
            ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
            _ => return None,
        };
        Some(rows)
    }
}
