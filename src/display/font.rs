//! 8x8 bitmap font

use super::PixelBuffer;
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};

pub const GLYPH_WIDTH: u32 = 8;
pub const GLYPH_HEIGHT: u32 = 8;

/// Row bitmaps for `ch`, least significant bit leftmost. Unknown characters
/// render as `?`.
pub fn get_glyph(ch: char) -> Option<[u8; 8]> {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
}

pub fn draw_char_scaled(buffer: &mut PixelBuffer, x: i32, y: i32, ch: char, r: u8, g: u8, b: u8, scale: u32) {
    let Some(glyph) = get_glyph(ch) else {
        return;
    };
    let scale = scale.max(1) as i32;
    for (row, &bits) in glyph.iter().enumerate() {
        for col in 0..GLYPH_WIDTH as i32 {
            if bits & (1 << col) == 0 {
                continue;
            }
            let px = x + col * scale;
            let py = y + row as i32 * scale;
            for sy in 0..scale {
                for sx in 0..scale {
                    buffer.set_pixel(px + sx, py + sy, r, g, b);
                }
            }
        }
    }
}

pub fn draw_text_scaled(buffer: &mut PixelBuffer, x: i32, y: i32, text: &str, r: u8, g: u8, b: u8, scale: u32) {
    let advance = (GLYPH_WIDTH * scale.max(1)) as i32;
    let mut cursor_x = x;
    for ch in text.chars() {
        draw_char_scaled(buffer, cursor_x, y, ch, r, g, b, scale);
        cursor_x += advance;
    }
}

pub fn draw_text(buffer: &mut PixelBuffer, x: i32, y: i32, text: &str, r: u8, g: u8, b: u8) {
    draw_text_scaled(buffer, x, y, text, r, g, b, 1);
}

pub fn text_width_scaled(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_WIDTH * scale.max(1)
}

pub fn text_width(text: &str) -> u32 {
    text_width_scaled(text, 1)
}
