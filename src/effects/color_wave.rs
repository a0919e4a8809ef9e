use std::time::Duration;

use crate::canvas::Canvas;
use crate::color::Crgb;
use crate::effect::Effect;

/// A hue wave that scrolls across the canvas width. Grounded in the
/// original source's `colorwaveeffect.h`.
pub struct ColorWave {
    name: String,
    hue: f64,
    speed: f64,
    wave_frequency: f64,
}

impl ColorWave {
    pub fn new(name: impl Into<String>, speed: f64, wave_frequency: f64) -> Self {
        ColorWave {
            name: name.into(),
            hue: 0.0,
            speed,
            wave_frequency,
        }
    }
}

impl Effect for ColorWave {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, _canvas: &mut Canvas) {
        self.hue = 0.0;
    }

    fn update(&mut self, canvas: &mut Canvas, dt: Duration) {
        self.hue += self.speed * dt.as_secs_f64();
        if self.hue >= 1.0 {
            self.hue -= self.hue.floor();
        }

        let width = canvas.width();
        let height = canvas.height();
        let graphics = canvas.graphics_mut();

        for y in 0..height {
            for x in 0..width {
                let mut local_hue = self.hue + (x as f64 / width as f64) * self.wave_frequency;
                local_hue -= local_hue.floor();
                graphics.set_pixel(x, y, Crgb::from_hsv_deg(local_hue * 360.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_resets_hue() {
        let mut canvas = Canvas::new(1, "test", 4, 4, 30);
        let mut effect = ColorWave::new("wave", 0.5, 10.0);
        effect.update(&mut canvas, Duration::from_millis(500));
        assert!(effect.hue > 0.0);
        effect.start(&mut canvas);
        assert_eq!(effect.hue, 0.0);
    }

    #[test]
    fn update_paints_every_pixel() {
        let mut canvas = Canvas::new(1, "test", 8, 2, 30);
        let mut effect = ColorWave::new("wave", 0.5, 10.0);
        effect.update(&mut canvas, Duration::from_millis(33));
        // every pixel should differ from the initial black canvas
        let graphics = canvas.graphics();
        let mut all_black = true;
        for y in 0..2 {
            for x in 0..8 {
                if graphics.get_pixel(x, y) != Crgb::BLACK {
                    all_black = false;
                }
            }
        }
        assert!(!all_black);
    }
}
