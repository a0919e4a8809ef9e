//! Owns one pixel buffer and the Features bound to sub-rectangles of it.

use std::time::Duration;

use crate::color::Crgb;
use crate::effect::Effect;
use crate::effects_manager::EffectsManager;
use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::pixelbuffer::PixelBuffer;

/// A 2-D pixel buffer that effects mutate and features sample from.
///
/// Invariants: width and height are non-zero; every attached Feature's
/// rectangle is wholly inside the canvas (enforced by `add_feature`);
/// the canvas exclusively owns its pixel buffer — nothing outside this
/// struct's own methods writes to it.
pub struct Canvas {
    pub id: i64,
    pub name: String,
    width: u32,
    height: u32,
    fps: u32,
    pixel_buffer: PixelBuffer,
    features: Vec<Feature>,
    next_feature_id: i64,
    effects: EffectsManager,
}

impl Canvas {
    pub fn new(id: i64, name: impl Into<String>, width: u32, height: u32, fps: u32) -> Self {
        Canvas {
            id,
            name: name.into(),
            width,
            height,
            fps,
            pixel_buffer: PixelBuffer::new(width, height),
            features: Vec::new(),
            next_feature_id: 0,
            effects: EffectsManager::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn graphics(&self) -> &PixelBuffer {
        &self.pixel_buffer
    }

    pub fn graphics_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixel_buffer
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn effects(&self) -> &EffectsManager {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectsManager {
        &mut self.effects
    }

    /// Attaches a feature, rejecting it if its rectangle is not wholly
    /// inside the canvas. Overlapping features are permitted. Bumps
    /// `next_feature_id` past this feature's id so a later `add_feature_auto`
    /// never collides with an explicitly assigned id (e.g. from config
    /// loading).
    pub fn add_feature(&mut self, feature: Feature) -> Result<()> {
        if !feature.fits_within(self.width, self.height) {
            return Err(Error::InvalidArgument(format!(
                "feature '{}' rectangle does not fit within canvas {}x{}",
                feature.friendly_name, self.width, self.height
            )));
        }
        if feature.id >= self.next_feature_id {
            self.next_feature_id = feature.id + 1;
        }
        self.features.push(feature);
        Ok(())
    }

    /// Assigns a fresh id to `feature` and attaches it, returning the id.
    /// Used by the REST layer, which has no id of its own to offer.
    pub fn add_feature_auto(&mut self, mut feature: Feature) -> Result<i64> {
        let id = self.next_feature_id;
        feature.id = id;
        self.add_feature(feature)?;
        Ok(id)
    }

    pub fn get_feature(&self, feature_id: i64) -> Result<&Feature> {
        self.features
            .iter()
            .find(|f| f.id == feature_id)
            .ok_or_else(|| Error::NotFound(format!("feature id {feature_id}")))
    }

    /// Replaces the feature at `feature_id` with `feature`, keeping the same
    /// id regardless of what `feature.id` was set to. Rejects the
    /// replacement if its rectangle does not fit within the canvas.
    pub fn update_feature(&mut self, feature_id: i64, mut feature: Feature) -> Result<()> {
        let index = self
            .features
            .iter()
            .position(|f| f.id == feature_id)
            .ok_or_else(|| Error::NotFound(format!("feature id {feature_id}")))?;
        if !feature.fits_within(self.width, self.height) {
            return Err(Error::InvalidArgument(format!(
                "feature '{}' rectangle does not fit within canvas {}x{}",
                feature.friendly_name, self.width, self.height
            )));
        }
        feature.id = feature_id;
        self.features[index] = feature;
        Ok(())
    }

    pub fn remove_feature(&mut self, feature_id: i64) -> Result<()> {
        let before = self.features.len();
        self.features.retain(|f| f.id != feature_id);
        if self.features.len() == before {
            return Err(Error::NotFound(format!("feature id {feature_id}")));
        }
        Ok(())
    }

    pub fn add_effect(&mut self, effect: Box<dyn Effect>) -> usize {
        self.effects.add_effect(effect)
    }

    /// Invokes `Start` on the effect at `index`, making it the active
    /// effect. The effect is removed from the manager for the duration of
    /// the call so it can receive `&mut Canvas` without a self-referential
    /// borrow, then restored at the same index.
    pub fn set_current_effect(&mut self, index: usize) -> Result<()> {
        self.effects.set_current_index(index)?;
        self.start_effect_at(index);
        Ok(())
    }

    pub fn start_current_effect(&mut self) {
        if let Some(idx) = self.effects.current_index() {
            self.start_effect_at(idx);
        }
    }

    pub fn update_current_effect(&mut self, dt: Duration) {
        if let Some(idx) = self.effects.current_index() {
            let mut effect = self.effects.take(idx);
            effect.update(self, dt);
            self.effects.restore(idx, effect);
        }
    }

    fn start_effect_at(&mut self, index: usize) {
        let mut effect = self.effects.take(index);
        effect.start(self);
        self.effects.restore(index, effect);
    }

    pub fn clear(&mut self, color: Crgb) {
        self.pixel_buffer.clear(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;

    #[test]
    fn add_feature_rejects_rectangle_outside_canvas() {
        let mut canvas = Canvas::new(1, "c", 4, 4, 30);
        let feature = Feature::new(1, "h", "f", 49152, 2, 2, 4, 4, 0, false, false);
        assert!(canvas.add_feature(feature).is_err());
    }

    #[test]
    fn add_feature_accepts_rectangle_inside_canvas() {
        let mut canvas = Canvas::new(1, "c", 4, 4, 30);
        let feature = Feature::new(1, "h", "f", 49152, 0, 0, 4, 4, 0, false, false);
        assert!(canvas.add_feature(feature).is_ok());
        assert_eq!(canvas.features().len(), 1);
    }

    #[test]
    fn pixel_clipping_property() {
        let mut canvas = Canvas::new(1, "c", 4, 4, 30);
        canvas.graphics_mut().set_pixel(100, 100, Crgb::new(1, 1, 1));
        assert_eq!(canvas.graphics().get_pixel(100, 100), Crgb::BLACK);
    }

    #[test]
    fn add_feature_auto_assigns_increasing_ids() {
        let mut canvas = Canvas::new(1, "c", 4, 4, 30);
        let a = Feature::new(0, "h", "a", 49152, 0, 0, 4, 4, 0, false, false);
        let b = Feature::new(0, "h", "b", 49153, 0, 0, 4, 4, 0, false, false);
        let id_a = canvas.add_feature_auto(a).unwrap();
        let id_b = canvas.add_feature_auto(b).unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(canvas.get_feature(id_a).unwrap().friendly_name, "a");
        assert_eq!(canvas.get_feature(id_b).unwrap().friendly_name, "b");
    }

    #[test]
    fn update_feature_replaces_in_place_preserving_id() {
        let mut canvas = Canvas::new(1, "c", 4, 4, 30);
        let feature = Feature::new(0, "h", "a", 49152, 0, 0, 4, 4, 0, false, false);
        let id = canvas.add_feature_auto(feature).unwrap();
        let replacement = Feature::new(999, "h2", "renamed", 49153, 0, 0, 4, 4, 1, true, true);
        canvas.update_feature(id, replacement).unwrap();
        let stored = canvas.get_feature(id).unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.friendly_name, "renamed");
        assert_eq!(stored.host_name, "h2");
    }

    #[test]
    fn update_feature_rejects_rectangle_outside_canvas() {
        let mut canvas = Canvas::new(1, "c", 4, 4, 30);
        let feature = Feature::new(0, "h", "a", 49152, 0, 0, 4, 4, 0, false, false);
        let id = canvas.add_feature_auto(feature).unwrap();
        let oversized = Feature::new(id, "h", "a", 49152, 2, 2, 4, 4, 0, false, false);
        assert!(canvas.update_feature(id, oversized).is_err());
    }

    #[test]
    fn get_feature_unknown_id_is_not_found() {
        let canvas = Canvas::new(1, "c", 4, 4, 30);
        assert!(canvas.get_feature(42).is_err());
    }
}
