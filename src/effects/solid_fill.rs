use std::time::Duration;

use crate::canvas::Canvas;
use crate::color::Crgb;
use crate::effect::Effect;

/// Clears the canvas to a fixed color every tick. Grounded in
/// `misceffects.h`'s `SolidColorFill`.
pub struct SolidColorFill {
    name: String,
    color: Crgb,
}

impl SolidColorFill {
    pub fn new(name: impl Into<String>, color: Crgb) -> Self {
        SolidColorFill {
            name: name.into(),
            color,
        }
    }
}

impl Effect for SolidColorFill {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, _canvas: &mut Canvas) {}

    fn update(&mut self, canvas: &mut Canvas, _dt: Duration) {
        canvas.graphics_mut().clear(self.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_clears_canvas_to_color() {
        let mut canvas = Canvas::new(1, "test", 4, 4, 30);
        let mut effect = SolidColorFill::new("fill", Crgb::new(1, 2, 3));
        effect.update(&mut canvas, Duration::from_millis(33));
        assert_eq!(canvas.graphics().get_pixel(0, 0), Crgb::new(1, 2, 3));
        assert_eq!(canvas.graphics().get_pixel(3, 3), Crgb::new(1, 2, 3));
    }
}
