//! The `Effect` trait and the registry that maps a configuration `type` tag
//! to a constructor, per the design note on dynamic dispatch over effects.

use std::collections::HashMap;
use std::time::Duration;

use crate::canvas::Canvas;
use crate::error::{Error, Result};

/// A stateful pixel animator advanced at a fixed rate. No cross-effect
/// shared state; each effect owns only its own animation state.
pub trait Effect: Send {
    fn name(&self) -> &str;

    /// Called once when this effect becomes the active effect, before its
    /// first `update`.
    fn start(&mut self, canvas: &mut Canvas);

    /// Called once per scheduler tick while this effect is active.
    fn update(&mut self, canvas: &mut Canvas, dt: Duration);
}

type EffectConstructor = Box<dyn Fn(&str, &serde_json::Value) -> Result<Box<dyn Effect>> + Send + Sync>;

/// Maps a configuration effect `type` string to a constructor, so the
/// configuration loader can instantiate effects without a hand-written
/// match arm at every call site.
pub struct EffectRegistry {
    constructors: HashMap<String, EffectConstructor>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        EffectRegistry {
            constructors: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, type_tag: &str, constructor: F)
    where
        F: Fn(&str, &serde_json::Value) -> Result<Box<dyn Effect>> + Send + Sync + 'static,
    {
        self.constructors.insert(type_tag.to_string(), Box::new(constructor));
    }

    pub fn construct(&self, type_tag: &str, name: &str, params: &serde_json::Value) -> Result<Box<dyn Effect>> {
        let constructor = self
            .constructors
            .get(type_tag)
            .ok_or_else(|| Error::Configuration(format!("unknown effect type '{type_tag}'")))?;
        constructor(name, params)
    }

    /// A registry pre-populated with the concrete effects shipped in
    /// `crate::effects`.
    pub fn with_builtin_effects() -> Self {
        let mut registry = EffectRegistry::new();
        crate::effects::register_builtin(&mut registry);
        registry
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
