//! The mapping from a canvas sub-rectangle to a client endpoint and wire format.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};

use crate::color::Crgb;
use crate::pixelbuffer::PixelBuffer;

/// WIFI_COMMAND_PIXELDATA64 — the only data-frame command this core emits.
pub const COMMAND_PIXELDATA64: u16 = 3;

/// Scheduling lead used when a Feature does not specify `client_buffer_count`.
pub const DEFAULT_FRAME_LEAD_SECS: f64 = 2.0;

/// A rectangular slice of a canvas bound to one client endpoint and wire
/// format. Produced and owned by its Canvas; does not hold a back-reference
/// to the Canvas (see the design note on cyclic back-references) — callers
/// pass the canvas's pixel buffer in when sampling.
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: i64,
    pub host_name: String,
    pub friendly_name: String,
    pub port: u16,
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
    pub channel: u8,
    pub reversed: bool,
    pub red_green_swap: bool,
    /// Client-reported buffer depth in frames, used to compute the
    /// scheduling lead instead of the `DEFAULT_FRAME_LEAD_SECS` default.
    pub client_buffer_count: Option<u32>,
}

impl Feature {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        host_name: impl Into<String>,
        friendly_name: impl Into<String>,
        port: u16,
        offset_x: u32,
        offset_y: u32,
        width: u32,
        height: u32,
        channel: u8,
        reversed: bool,
        red_green_swap: bool,
    ) -> Self {
        Feature {
            id,
            host_name: host_name.into(),
            friendly_name: friendly_name.into(),
            port,
            offset_x,
            offset_y,
            width,
            height,
            channel,
            reversed,
            red_green_swap,
            client_buffer_count: None,
        }
    }

    /// Returns true if this feature's rectangle is wholly inside `width x height`.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.offset_x.saturating_add(self.width) <= width
            && self.offset_y.saturating_add(self.height) <= height
    }

    /// Samples the pixel bytes for this feature's sub-rectangle. When the
    /// rectangle equals the full canvas, the pixel buffer is streamed
    /// directly; otherwise pixels are copied one at a time, with any
    /// out-of-bounds sample (which should not occur for an attached
    /// feature, but is defended against) yielding the magenta sentinel.
    pub fn get_pixel_data(&self, canvas: &PixelBuffer) -> Vec<u8> {
        let pixels: Vec<Crgb> = if self.offset_x == 0
            && self.offset_y == 0
            && self.width == canvas.width()
            && self.height == canvas.height()
        {
            canvas.pixels().to_vec()
        } else {
            let mut out = Vec::with_capacity((self.width * self.height) as usize);
            for row in 0..self.height {
                for col in 0..self.width {
                    let cx = self.offset_x + col;
                    let cy = self.offset_y + row;
                    let pixel = if cx < canvas.width() && cy < canvas.height() {
                        canvas.get_pixel(cx, cy)
                    } else {
                        Crgb::MAGENTA
                    };
                    out.push(pixel);
                }
            }
            out
        };

        let iter: Box<dyn Iterator<Item = &Crgb>> = if self.reversed {
            Box::new(pixels.iter().rev())
        } else {
            Box::new(pixels.iter())
        };

        let mut bytes = Vec::with_capacity(pixels.len() * 3);
        for p in iter {
            if self.red_green_swap {
                bytes.extend_from_slice(&[p.g, p.r, p.b]);
            } else {
                bytes.extend_from_slice(&[p.r, p.g, p.b]);
            }
        }
        bytes
    }

    /// Builds the uncompressed data frame: header plus pixel payload.
    pub fn get_data_frame(&self, canvas: &PixelBuffer, fps: u32) -> BytesMut {
        let now_us = now_micros();
        self.build_data_frame(canvas, fps, now_us)
    }

    /// Testable core of `get_data_frame`, parameterized on the capture
    /// timestamp so tests can pin an exact epoch.
    pub fn build_data_frame(&self, canvas: &PixelBuffer, fps: u32, now_us: u64) -> BytesMut {
        let lead_secs = match self.client_buffer_count {
            Some(count) if fps > 0 => count as f64 / fps as f64,
            _ => DEFAULT_FRAME_LEAD_SECS,
        };
        let lead_us = (lead_secs * 1_000_000.0).round() as u64;
        let target_us = now_us + lead_us;
        let seconds = target_us / 1_000_000;
        let microseconds = target_us % 1_000_000;

        let pixel_data = self.get_pixel_data(canvas);
        let pixel_count = (self.width * self.height) as u32;

        let mut buf = BytesMut::with_capacity(24 + pixel_data.len());
        buf.put_u16_le(COMMAND_PIXELDATA64);
        buf.put_u16_le(self.channel as u16);
        buf.put_u32_le(pixel_count);
        buf.put_u64_le(seconds);
        buf.put_u64_le(microseconds);
        buf.put_slice(&pixel_data);
        buf
    }
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_canvas(w: u32, h: u32, color: Crgb) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        buf.clear(color);
        buf
    }

    #[test]
    fn solid_fill_frame_matches_expected_bytes() {
        let canvas = solid_canvas(4, 1, Crgb::new(255, 0, 0));
        let feature = Feature::new(1, "h", "f", 49152, 0, 0, 4, 1, 0, false, false);
        let frame = feature.build_data_frame(&canvas, 30, 1_000_000);

        // seconds = 1 + 2 (default lead), microseconds = 0
        let mut expected = BytesMut::new();
        expected.put_u16_le(3);
        expected.put_u16_le(0);
        expected.put_u32_le(4);
        expected.put_u64_le(3);
        expected.put_u64_le(0);
        for _ in 0..4 {
            expected.put_slice(&[0xFF, 0x00, 0x00]);
        }
        assert_eq!(frame, expected);
    }

    #[test]
    fn red_green_swap_swaps_first_two_bytes() {
        let canvas = solid_canvas(4, 1, Crgb::new(10, 20, 30));
        let feature = Feature::new(1, "h", "f", 49152, 0, 0, 4, 1, 0, false, true);
        let frame = feature.build_data_frame(&canvas, 30, 0);
        let payload = &frame[24..];
        assert_eq!(&payload[0..3], &[20, 10, 30]);
    }

    #[test]
    fn reversed_reverses_pixel_order() {
        let mut canvas = PixelBuffer::new(3, 1);
        canvas.set_pixel(0, 0, Crgb::new(1, 0, 0));
        canvas.set_pixel(1, 0, Crgb::new(0, 1, 0));
        canvas.set_pixel(2, 0, Crgb::new(0, 0, 1));
        let feature = Feature::new(1, "h", "f", 49152, 0, 0, 3, 1, 0, true, false);
        let frame = feature.build_data_frame(&canvas, 30, 0);
        let payload = &frame[24..];
        assert_eq!(
            payload,
            &[0, 0, 1, 0, 1, 0, 1, 0, 0][..]
        );
    }

    #[test]
    fn out_of_bounds_sample_is_magenta() {
        let canvas = PixelBuffer::new(2, 2);
        let feature = Feature::new(1, "h", "f", 49152, 1, 1, 4, 4, 0, false, false);
        let data = feature.get_pixel_data(&canvas);
        // every pixel outside the 2x2 source is magenta
        assert_eq!(&data[data.len() - 3..], &[255, 0, 255]);
    }

    #[test]
    fn client_buffer_count_overrides_default_lead() {
        let canvas = solid_canvas(1, 1, Crgb::BLACK);
        let mut feature = Feature::new(1, "h", "f", 49152, 0, 0, 1, 1, 0, false, false);
        feature.client_buffer_count = Some(60);
        let frame = feature.build_data_frame(&canvas, 30, 0);
        let seconds = u64::from_le_bytes(frame[8..16].try_into().unwrap());
        assert_eq!(seconds, 2); // 60 frames / 30 fps = 2s lead
    }
}
