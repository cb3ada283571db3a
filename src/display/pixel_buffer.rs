use image::RgbImage;

// ============================================================================
// Utility Functions
// ============================================================================

/// Alpha blend a single color channel
/// Uses fast approximation: (x + 1 + (x >> 8)) >> 8 instead of x / 255
#[inline]
fn blend_channel(src: u8, dst: u8, alpha: u16) -> u8 {
    let result = src as u16 * alpha + dst as u16 * (255 - alpha);
    ((result + 1 + (result >> 8)) >> 8) as u8
}

/// Write ABGR pixel to slice (RGBA8888 little-endian byte order)
#[inline]
fn write_pixel(dest: &mut [u8], r: u8, g: u8, b: u8) {
    dest[0] = 255; // A
    dest[1] = b; // B
    dest[2] = g; // G
    dest[3] = r; // R
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// RGBA8888 pixel buffer for software rendering
/// The display frame is composed here: camera image first, overlays on top
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Create a black pixel buffer
    pub fn with_size(width: u32, height: u32) -> Self {
        let mut buffer = Self {
            pixels: vec![0; (width * height * 4) as usize],
            width,
            height,
        };
        buffer.clear(0, 0, 0);
        buffer
    }

    /// Copy an RGB image into a new buffer of the same size
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let mut buffer = Self {
            pixels: vec![0; (image.width() * image.height() * 4) as usize],
            width: image.width(),
            height: image.height(),
        };
        for (dest, src) in buffer.pixels.chunks_exact_mut(4).zip(image.pixels()) {
            write_pixel(dest, src[0], src[1], src[2]);
        }
        buffer
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Check if coordinates are within bounds
    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32
    }

    /// Calculate byte offset for pixel at (x, y)
    #[inline]
    fn pixel_index(&self, x: u32, y: u32) -> usize {
        ((y * self.width + x) * 4) as usize
    }

    /// Clear to a solid color
    pub fn clear(&mut self, r: u8, g: u8, b: u8) {
        for dest in self.pixels.chunks_exact_mut(4) {
            write_pixel(dest, r, g, b);
        }
    }

    /// Set a single pixel (bounds checked)
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            write_pixel(&mut self.pixels[idx..idx + 4], r, g, b);
        }
    }

    /// Set pixel with alpha blending
    #[inline]
    pub fn blend_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8, a: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            let alpha = a as u16;
            self.pixels[idx] = 255; // A - always opaque
            self.pixels[idx + 1] = blend_channel(b, self.pixels[idx + 1], alpha);
            self.pixels[idx + 2] = blend_channel(g, self.pixels[idx + 2], alpha);
            self.pixels[idx + 3] = blend_channel(r, self.pixels[idx + 3], alpha);
        }
    }

    /// Read a pixel from the buffer (bounds checked)
    /// Returns None if coordinates are out of bounds
    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<(u8, u8, u8)> {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            Some((
                self.pixels[idx + 3], // R
                self.pixels[idx + 2], // G
                self.pixels[idx + 1], // B
            ))
        } else {
            None
        }
    }

    /// Draw a horizontal line, clipped to the buffer
    pub fn hline(&mut self, x1: i32, x2: i32, y: i32, r: u8, g: u8, b: u8) {
        if y < 0 || y >= self.height as i32 {
            return;
        }
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let start = x1.max(0);
        let end = x2.min(self.width as i32 - 1);
        if start > end {
            return;
        }

        // Compute starting index once, then increment by 4 per pixel
        let mut idx = self.pixel_index(start as u32, y as u32);
        let count = (end - start + 1) as usize;
        for _ in 0..count {
            write_pixel(&mut self.pixels[idx..idx + 4], r, g, b);
            idx += 4;
        }
    }

    /// Fill a rectangle
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, r: u8, g: u8, b: u8) {
        for row in 0..h as i32 {
            self.hline(x, x + w as i32 - 1, y + row, r, g, b);
        }
    }

    /// Fill a rectangle with alpha blending (translucent text backdrops)
    pub fn fill_rect_blend(&mut self, x: i32, y: i32, w: u32, h: u32, r: u8, g: u8, b: u8, a: u8) {
        for row in 0..h as i32 {
            for col in 0..w as i32 {
                self.blend_pixel(x + col, y + row, r, g, b, a);
            }
        }
    }

    /// Raw bytes for SDL texture upload
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_from_rgb_image_preserves_colors() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(1, 0, Rgb([10, 20, 30]));
        let buffer = PixelBuffer::from_rgb_image(&image);
        assert_eq!(buffer.get_pixel(1, 0), Some((10, 20, 30)));
        assert_eq!(buffer.get_pixel(0, 1), Some((0, 0, 0)));
        assert_eq!(&buffer.as_bytes()[4..8], &[255, 30, 20, 10], "ABGR byte order");
    }

    #[test]
    fn test_drawing_is_clipped() {
        let mut buffer = PixelBuffer::with_size(4, 4);
        buffer.fill_rect(-2, -2, 4, 4, 255, 0, 0);
        buffer.set_pixel(10, 10, 1, 2, 3);
        assert_eq!(buffer.get_pixel(1, 1), Some((255, 0, 0)));
        assert_eq!(buffer.get_pixel(2, 2), Some((0, 0, 0)));
        assert_eq!(buffer.get_pixel(4, 0), None);
    }

    #[test]
    fn test_blend_pixel_mixes() {
        let mut buffer = PixelBuffer::with_size(1, 1);
        buffer.clear(200, 200, 200);
        buffer.blend_pixel(0, 0, 0, 0, 0, 255);
        assert_eq!(buffer.get_pixel(0, 0), Some((0, 0, 0)));

        buffer.clear(200, 200, 200);
        buffer.blend_pixel(0, 0, 0, 0, 0, 0);
        assert_eq!(buffer.get_pixel(0, 0), Some((200, 200, 200)));
    }
}
