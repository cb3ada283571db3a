//! Text effects for legibility on arbitrary backgrounds

use super::font::draw_text_scaled;
use super::PixelBuffer;

/// The eight neighbours of a pixel
const OUTLINE_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Draw text with outline
pub fn draw_text_outlined(
    buffer: &mut PixelBuffer,
    x: i32,
    y: i32,
    text: &str,
    color: (u8, u8, u8),
    outline_color: (u8, u8, u8),
    scale: u32,
) {
    for (dx, dy) in OUTLINE_OFFSETS {
        draw_text_scaled(
            buffer,
            x + dx,
            y + dy,
            text,
            outline_color.0,
            outline_color.1,
            outline_color.2,
            scale,
        );
    }

    // Main text on top
    draw_text_scaled(buffer, x, y, text, color.0, color.1, color.2, scale);
}

/// Draw text with drop shadow
pub fn draw_text_shadowed(
    buffer: &mut PixelBuffer,
    x: i32,
    y: i32,
    text: &str,
    color: (u8, u8, u8),
    shadow_color: (u8, u8, u8),
    scale: u32,
) {
    let offset = scale.max(1) as i32;
    draw_text_scaled(
        buffer,
        x + offset,
        y + offset,
        text,
        shadow_color.0,
        shadow_color.1,
        shadow_color.2,
        scale,
    );
    draw_text_scaled(buffer, x, y, text, color.0, color.1, color.2, scale);
}
