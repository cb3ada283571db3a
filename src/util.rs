//! Colour helpers shared by the palette tables and the overlay

/// An RGB triple in display order
pub type Rgb = [u8; 3];

/// HSV to RGB color conversion
/// h: 0-360, s: 0-1, v: 0-1
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let c = v * s;
    let h_prime = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - ((h_prime % 2.0) - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = match h_prime as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [
        ((r1 + m) * 255.0).round() as u8,
        ((g1 + m) * 255.0).round() as u8,
        ((b1 + m) * 255.0).round() as u8,
    ]
}

/// Linear interpolation between two colors
#[inline]
pub fn lerp_color(c1: Rgb, c2: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let channel = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    [
        channel(c1[0], c2[0]),
        channel(c1[1], c2[1]),
        channel(c1[2], c2[2]),
    ]
}

/// Sample a piecewise-linear gradient through evenly spaced colour stops.
/// `t` is clamped to 0-1; a single stop yields a flat colour.
pub fn sample_stops(stops: &[Rgb], t: f32) -> Rgb {
    match stops {
        [] => [0, 0, 0],
        [only] => *only,
        _ => {
            let segments = (stops.len() - 1) as f32;
            let pos = t.clamp(0.0, 1.0) * segments;
            let idx = (pos.floor() as usize).min(stops.len() - 2);
            lerp_color(stops[idx], stops[idx + 1], pos - idx as f32)
        },
    }
}
