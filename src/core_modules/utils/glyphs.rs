// A tiny 5x7 bitmap face for size labels like `414.50 nm`. It only covers the
// characters those labels use; anything else is drawn as a blank cell.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SPACING: u32 = 1;

/// Rows top to bottom, bit 4 is the leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c {
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
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        _ => [0x00; 7],
    }
}

/// Width in pixels of `text` drawn at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    (n * (GLYPH_WIDTH + GLYPH_SPACING) - GLYPH_SPACING) * scale
}

/// Draws `text` with its top-left corner at (x, y). Pixels outside the canvas are clipped.
pub fn draw_text(canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, scale: u32, text: &str) {
    let scale = scale.max(1);
    let (canvas_width, canvas_height) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let (x, y, step) = (i64::from(x), i64::from(y), i64::from(scale));

    let fully_outside = x >= canvas_width
        || y >= canvas_height
        || x + i64::from(text_width(text, scale)) <= 0
        || y + i64::from(GLYPH_HEIGHT * scale) <= 0;
    if fully_outside {
        return;
    }

    let advance = i64::from((GLYPH_WIDTH + GLYPH_SPACING) * scale);
    for (index, c) in text.chars().enumerate() {
        let origin_x = x + index as i64 * advance;
        if origin_x >= canvas_width {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let cell_x = origin_x + i64::from(col) * step;
                let cell_y = y + row as i64 * step;
                if cell_x + step <= 0 || cell_y + step <= 0 || cell_x >= canvas_width || cell_y >= canvas_height {
                    continue;
                }
                let cell = Rect::at(cell_x as i32, cell_y as i32).of_size(scale, scale);
                draw_filled_rect_mut(canvas, cell, color);
            }
        }
    }
}
