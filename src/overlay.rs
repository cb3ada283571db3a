//! On-screen overlays
//!
//! Everything here draws onto the display copy of a frame. The recordable
//! frame never passes through this module.

use crate::display::{
    draw_text_outlined, draw_text_scaled, draw_text_shadowed, text_width_scaled, PixelBuffer, GLYPH_HEIGHT,
};
use crate::input::Command;
use crate::pipeline::Palette;
use crate::util::Rgb;
use image::GrayImage;
use std::time::{Duration, Instant};

pub const MESSAGE_DURATION: Duration = Duration::from_secs(2);
pub const GRADIENT_WIDTH: u32 = 20;
pub const GRADIENT_MARGIN: u32 = 10;
pub const FOOTER_TEXT: &str = "Thermal camera live view. Press [H] for help.";

const TEXT_MARGIN: i32 = 10;
const LINE_HEIGHT: i32 = GLYPH_HEIGHT as i32 + 6;
const REC_SCALE: u32 = 2;

const WHITE: (u8, u8, u8) = (255, 255, 255);
const SHADOW: (u8, u8, u8) = (0, 0, 0);
const OUTLINE: (u8, u8, u8) = (20, 20, 20);
const REC_RED: (u8, u8, u8) = (230, 30, 30);

#[derive(Debug, Clone)]
pub struct TransientMessage {
    text: String,
    shown_at: Instant,
}

impl TransientMessage {
    pub fn new(text: impl Into<String>, now: Instant) -> Self {
        Self {
            text: text.into(),
            shown_at: now,
        }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) < MESSAGE_DURATION
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// UI toggles and the current transient message
#[derive(Debug, Clone)]
pub struct OverlayState {
    pub show_help: bool,
    pub show_gradient: bool,
    message: Option<TransientMessage>,
}

impl OverlayState {
    pub fn new(show_gradient: bool) -> Self {
        Self {
            show_help: false,
            show_gradient,
            message: None,
        }
    }

    /// Replace whatever message is showing
    pub fn show_message(&mut self, text: impl Into<String>, now: Instant) {
        self.message = Some(TransientMessage::new(text, now));
    }

    pub fn active_message(&self, now: Instant) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|m| m.is_active(now))
            .map(TransientMessage::text)
    }
}

/// Per-tick inputs the overlays read
pub struct OverlayContext<'a> {
    /// Normalised intensity at sensor resolution, for the pointer readout
    pub intensity: &'a GrayImage,
    pub palette: Palette,
    /// Pointer in window coordinates
    pub pointer: Option<(i32, i32)>,
    /// Window size the pointer coordinates refer to
    pub display_size: (u32, u32),
    pub recording_indicator: bool,
    pub now: Instant,
}

/// Map a display-space point back to the source frame, clamped into bounds
pub fn map_pointer(pointer: (i32, i32), display_size: (u32, u32), source_size: (u32, u32)) -> Option<(u32, u32)> {
    let (dw, dh) = display_size;
    let (sw, sh) = source_size;
    if dw == 0 || dh == 0 || sw == 0 || sh == 0 {
        return None;
    }
    let axis = |p: i32, d: u32, s: u32| -> u32 {
        let p = u64::from(p.max(0).unsigned_abs());
        let mapped = p * u64::from(s) / u64::from(d);
        mapped.min(u64::from(s - 1)) as u32
    };
    Some((axis(pointer.0, dw, sw), axis(pointer.1, dh, sh)))
}

/// Intensity as a rounded 0..=100 percentage
pub fn readout_percent(value: u8) -> u32 {
    (u32::from(value) * 100 + 127) / 255
}

/// Legend colours, top row first: hottest at the top
pub fn gradient_strip(palette: Palette, height: u32) -> Vec<Rgb> {
    if height <= 1 {
        return (0..height).map(|_| palette.color(255)).collect();
    }
    let span = height - 1;
    (0..height)
        .map(|row| {
            let value = 255 - (row * 255 + span / 2) / span;
            palette.color(value as u8)
        })
        .collect()
}

/// Draw every enabled overlay onto `buffer`
pub fn compose(buffer: &mut PixelBuffer, state: &OverlayState, ctx: &OverlayContext) {
    if state.show_gradient {
        draw_gradient(buffer, ctx.palette);
    }
    if let Some(pointer) = ctx.pointer {
        draw_pointer_readout(buffer, ctx.intensity, pointer, ctx.display_size);
    }
    if state.show_help {
        draw_help(buffer);
    }
    if ctx.recording_indicator {
        draw_rec_indicator(buffer, state.show_gradient);
    }
    let footer_y = buffer.height() as i32 - TEXT_MARGIN - GLYPH_HEIGHT as i32;
    if let Some(message) = state.active_message(ctx.now) {
        draw_text_shadowed(buffer, TEXT_MARGIN, footer_y - LINE_HEIGHT, message, WHITE, SHADOW, 1);
    }
    draw_text_shadowed(buffer, TEXT_MARGIN, footer_y, FOOTER_TEXT, WHITE, SHADOW, 1);
}

fn draw_help(buffer: &mut PixelBuffer) {
    let lines: Vec<String> = Command::HELP
        .iter()
        .map(|(key, what)| format!("[{}] {}", key, what))
        .collect();
    let width = lines.iter().map(|l| text_width_scaled(l, 1)).max().unwrap_or(0);
    let height = lines.len() as u32 * LINE_HEIGHT as u32;

    buffer.fill_rect_blend(TEXT_MARGIN - 4, TEXT_MARGIN - 4, width + 8, height + 4, 0, 0, 0, 160);
    for (i, line) in lines.iter().enumerate() {
        let y = TEXT_MARGIN + i as i32 * LINE_HEIGHT;
        draw_text_shadowed(buffer, TEXT_MARGIN, y, line, WHITE, SHADOW, 1);
    }
}

fn draw_pointer_readout(buffer: &mut PixelBuffer, intensity: &GrayImage, pointer: (i32, i32), display_size: (u32, u32)) {
    let Some((sx, sy)) = map_pointer(pointer, display_size, intensity.dimensions()) else {
        return;
    };
    let value = intensity.get_pixel(sx, sy)[0];
    let text = format!("{}%", readout_percent(value));
    let x = pointer.0 + 5;
    let y = pointer.1 - 5 - GLYPH_HEIGHT as i32;
    draw_text_outlined(buffer, x, y, &text, WHITE, OUTLINE, 1);
}

fn draw_rec_indicator(buffer: &mut PixelBuffer, legend_shown: bool) {
    let text_w = text_width_scaled("REC", REC_SCALE) as i32;
    let dot = (GLYPH_HEIGHT * REC_SCALE) as i32 - 4;
    let mut right = buffer.width() as i32 - TEXT_MARGIN;
    if legend_shown {
        right -= (GRADIENT_WIDTH + GRADIENT_MARGIN) as i32;
    }
    let x = right - text_w;
    let y = TEXT_MARGIN;
    buffer.fill_rect(x - dot - 6, y + 2, dot as u32, dot as u32, REC_RED.0, REC_RED.1, REC_RED.2);
    draw_text_scaled(buffer, x, y, "REC", REC_RED.0, REC_RED.1, REC_RED.2, REC_SCALE);
}

fn draw_gradient(buffer: &mut PixelBuffer, palette: Palette) {
    let (w, h) = (buffer.width(), buffer.height());
    if w < GRADIENT_WIDTH + 2 * GRADIENT_MARGIN || h < 2 * GRADIENT_MARGIN + 2 {
        return;
    }
    let x = (w - GRADIENT_MARGIN - GRADIENT_WIDTH) as i32;
    let top = GRADIENT_MARGIN as i32;
    let strip = gradient_strip(palette, h - 2 * GRADIENT_MARGIN);
    for (row, [r, g, b]) in strip.into_iter().enumerate() {
        buffer.hline(x, x + GRADIENT_WIDTH as i32 - 1, top + row as i32, r, g, b);
    }
}
