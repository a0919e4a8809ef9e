//! Flat, row-major pixel buffer and its drawing primitives.

use crate::color::Crgb;

/// A flat, row-major array of `width * height` colors. Writes outside
/// bounds are silently ignored; reads outside bounds return black.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Crgb>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        PixelBuffer {
            width,
            height,
            pixels: vec![Crgb::BLACK; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Crgb] {
        &self.pixels
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Crgb) {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.pixels[idx] = color;
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Crgb {
        if x < self.width && y < self.height {
            self.pixels[self.index(x, y)]
        } else {
            Crgb::BLACK
        }
    }

    pub fn clear(&mut self, color: Crgb) {
        self.fill_rectangle(0, 0, self.width, self.height, color);
    }

    pub fn fill_rectangle(&mut self, x: u32, y: u32, width: u32, height: u32, color: Crgb) {
        for j in y..y.saturating_add(height) {
            for i in x..x.saturating_add(width) {
                self.set_pixel(i, j, color);
            }
        }
    }

    /// Integer Bresenham line, 8-octant form. When the endpoints coincide,
    /// sets the single pixel and exits.
    pub fn draw_line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: Crgb) {
        let dx = (x2 - x1).abs();
        let dy = (y2 - y1).abs();
        let sx: i64 = if x1 < x2 { 1 } else { -1 };
        let sy: i64 = if y1 < y2 { 1 } else { -1 };
        let mut err = dx - dy;
        let (mut x, mut y) = (x1, y1);

        loop {
            self.set_pixel_signed(x, y, color);
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x += sx;
            }
            if e2 < dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Midpoint circle, 8-way symmetric. Symmetric points that land inside
    /// the canvas still draw even when the center itself is off-canvas.
    pub fn draw_circle(&mut self, cx: i64, cy: i64, radius: i64, color: Crgb) {
        let mut x = 0i64;
        let mut y = radius;
        let mut d = 1 - radius;

        while y >= x {
            self.set_pixel_signed(cx + x, cy + y, color);
            self.set_pixel_signed(cx - x, cy + y, color);
            self.set_pixel_signed(cx + x, cy - y, color);
            self.set_pixel_signed(cx - x, cy - y, color);
            self.set_pixel_signed(cx + y, cy + x, color);
            self.set_pixel_signed(cx - y, cy + x, color);
            self.set_pixel_signed(cx + y, cy - x, color);
            self.set_pixel_signed(cx - y, cy - x, color);

            x += 1;
            if d < 0 {
                d += 2 * x + 1;
            } else {
                y -= 1;
                d += 2 * (x - y) + 1;
            }
        }
    }

    /// Fills the bounding box, keeping only pixels within `radius` of center.
    pub fn fill_circle(&mut self, cx: i64, cy: i64, radius: i64, color: Crgb) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel_signed(cx + dx, cy + dy, color);
                }
            }
        }
    }

    pub fn draw_rectangle(&mut self, x: u32, y: u32, width: u32, height: u32, color: Crgb) {
        if width == 0 || height == 0 {
            return;
        }
        let x2 = x + width - 1;
        let y2 = y + height - 1;
        self.draw_line(x as i64, y as i64, x2 as i64, y as i64, color); // top
        self.draw_line(x as i64, y as i64, x as i64, y2 as i64, color); // left
        self.draw_line(x2 as i64, y as i64, x2 as i64, y2 as i64, color); // right
        self.draw_line(x as i64, y2 as i64, x2 as i64, y2 as i64, color); // bottom
    }

    pub fn fade_frame_by(&mut self, dim_amount: u8) {
        for pixel in self.pixels.iter_mut() {
            *pixel = pixel.fade_to_black_by(dim_amount);
        }
    }

    /// Draws a real-valued run of length `count` starting at `pos` onto the
    /// buffer's flat pixel array (a 1-D projection). The first and last
    /// pixels get anti-alias fades proportional to fractional coverage at
    /// the endpoints; interior pixels get the full color. When `merge` is
    /// true, colors are added component-wise with saturation instead of
    /// overwriting.
    pub fn set_pixels_f(&mut self, pos: f64, count: f64, color: Crgb, merge: bool) {
        let array_size = self.pixels.len();
        if count <= 0.0 || pos >= array_size as f64 || pos + count <= 0.0 {
            return;
        }

        let start_idx = pos.floor().max(0.0) as usize;
        let end_idx = ((pos + count).ceil() as usize).min(array_size);
        if start_idx >= end_idx {
            return;
        }

        let frac1 = pos - pos.floor();
        let fade1 = (frac1.max(1.0 - count) * 255.0) as u8;
        let remaining = count - (1.0 - frac1);
        let last_frac = remaining - remaining.floor();
        let fade2 = ((1.0 - last_frac) * 255.0) as u8;

        let write = |pixels: &mut Vec<Crgb>, idx: usize, c: Crgb| {
            if merge {
                pixels[idx] = pixels[idx].saturating_add(c);
            } else {
                pixels[idx] = c;
            }
        };

        if start_idx < array_size {
            write(&mut self.pixels, start_idx, color.fade_to_black_by(fade1));
        }

        if end_idx > start_idx + 1 {
            for idx in (start_idx + 1)..(end_idx - 1) {
                write(&mut self.pixels, idx, color);
            }
        }

        if last_frac > 0.0 && end_idx > 0 && end_idx - 1 < array_size && end_idx - 1 > start_idx {
            write(&mut self.pixels, end_idx - 1, color.fade_to_black_by(fade2));
        }
    }

    fn set_pixel_signed(&mut self, x: i64, y: i64, color: Crgb) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_pixel_out_of_bounds_is_noop() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.set_pixel(10, 10, Crgb::new(1, 2, 3));
        assert_eq!(buf.get_pixel(10, 10), Crgb::BLACK);
        assert_eq!(buf.get_pixel(0, 0), Crgb::BLACK);
    }

    #[test]
    fn clear_fills_every_pixel() {
        let mut buf = PixelBuffer::new(3, 2);
        buf.clear(Crgb::new(9, 9, 9));
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(buf.get_pixel(x, y), Crgb::new(9, 9, 9));
            }
        }
    }

    #[test]
    fn draw_line_degenerate_sets_single_pixel() {
        let mut buf = PixelBuffer::new(5, 5);
        buf.draw_line(2, 2, 2, 2, Crgb::new(1, 1, 1));
        assert_eq!(buf.get_pixel(2, 2), Crgb::new(1, 1, 1));
    }

    #[test]
    fn fade_frame_by_darkens_channels() {
        let mut buf = PixelBuffer::new(1, 1);
        buf.set_pixel(0, 0, Crgb::new(255, 255, 255));
        buf.fade_frame_by(128);
        let p = buf.get_pixel(0, 0);
        assert!(p.r < 255 && p.r > 0);
    }

    #[test]
    fn set_pixels_f_middle_pixels_get_full_color() {
        let mut buf = PixelBuffer::new(10, 1);
        buf.set_pixels_f(2.0, 3.0, Crgb::new(10, 20, 30), false);
        assert_eq!(buf.get_pixel(3, 0), Crgb::new(10, 20, 30));
    }
}
