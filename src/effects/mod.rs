//! Concrete Effect implementations, grounded in the original source's
//! `colorwaveeffect.h` and `misceffects.h`.

mod color_wave;
mod solid_fill;

pub use color_wave::ColorWave;
pub use solid_fill::SolidColorFill;

use crate::effect::EffectRegistry;
use crate::error::Error;

/// Registers every built-in effect's `type` tag with `registry`.
pub fn register_builtin(registry: &mut EffectRegistry) {
    registry.register("SolidColorFill", |name, params| {
        let color = params
            .get("color")
            .ok_or_else(|| Error::Configuration("SolidColorFill requires a 'color' parameter".into()))?;
        let r = color.get("r").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
        let g = color.get("g").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
        let b = color.get("b").and_then(|v| v.as_u64()).unwrap_or(0) as u8;
        Ok(Box::new(SolidColorFill::new(name, crate::color::Crgb::new(r, g, b))) as Box<dyn crate::effect::Effect>)
    });

    registry.register("ColorWave", |name, params| {
        let speed = params.get("speed").and_then(|v| v.as_f64()).unwrap_or(0.5);
        let wave_frequency = params
            .get("waveFrequency")
            .and_then(|v| v.as_f64())
            .unwrap_or(10.0);
        Ok(Box::new(ColorWave::new(name, speed, wave_frequency)) as Box<dyn crate::effect::Effect>)
    });
}
