use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// What happens to a dragged node's pin when the pointer is released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinRelease {
    /// The node rejoins the simulation.
    #[default]
    Release,
    /// The node stays where it was dropped until unpinned explicitly.
    Keep,
}

/// Tuning knobs for the network engine. Every field has a default, so an
/// empty JSON object (or no config file at all) is a valid configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub charge_strength: f32,
    pub link_distance_base: f32,
    pub link_strength: f32,
    pub collision_padding: f32,
    pub collision_iterations: usize,
    pub damping_factor: f32,
    pub centering_strength: f32,
    pub alpha_min: f32,
    pub ticks_per_second: f32,
    pub particle_density_per_value_unit: f64,
    pub max_particles_per_edge: usize,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,
    pub label_min_radius: f32,
    pub label_min_zoom: f32,
    pub node_glow: bool,
    pub pin_release: PinRelease,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            charge_strength: 300.0,
            link_distance_base: 110.0,
            link_strength: 0.7,
            collision_padding: 6.0,
            collision_iterations: 2,
            damping_factor: 0.6,
            centering_strength: 0.1,
            alpha_min: 0.001,
            ticks_per_second: 60.0,
            particle_density_per_value_unit: 1.0 / 20_000.0,
            max_particles_per_edge: 8,
            min_zoom: 0.1,
            max_zoom: 4.0,
            zoom_step: 1.2,
            label_min_radius: 14.0,
            label_min_zoom: 1.5,
            node_glow: true,
            pin_release: PinRelease::Release,
            seed: 0x5eed_f10u64,
        }
    }
}

fn clamp_field(name: &str, value: &mut f32, min: f32, max: f32, fallback: f32) {
    let next = if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    };
    if next != *value {
        warn!(field = name, value = *value, clamped = next, "engine config value out of range");
        *value = next;
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid engine config {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Clamps every knob into a range the engine stays stable in.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        clamp_field("charge_strength", &mut self.charge_strength, 0.0, 5_000.0, defaults.charge_strength);
        clamp_field(
            "link_distance_base",
            &mut self.link_distance_base,
            10.0,
            1_000.0,
            defaults.link_distance_base,
        );
        clamp_field("link_strength", &mut self.link_strength, 0.0, 1.0, defaults.link_strength);
        clamp_field(
            "collision_padding",
            &mut self.collision_padding,
            0.0,
            60.0,
            defaults.collision_padding,
        );
        clamp_field("damping_factor", &mut self.damping_factor, 0.05, 0.98, defaults.damping_factor);
        clamp_field(
            "centering_strength",
            &mut self.centering_strength,
            0.0,
            1.0,
            defaults.centering_strength,
        );
        clamp_field("alpha_min", &mut self.alpha_min, 0.000_01, 0.5, defaults.alpha_min);
        clamp_field(
            "ticks_per_second",
            &mut self.ticks_per_second,
            10.0,
            240.0,
            defaults.ticks_per_second,
        );
        clamp_field("min_zoom", &mut self.min_zoom, 0.01, 10.0, defaults.min_zoom);
        clamp_field("max_zoom", &mut self.max_zoom, 0.01, 50.0, defaults.max_zoom);
        clamp_field("zoom_step", &mut self.zoom_step, 1.01, 4.0, defaults.zoom_step);
        clamp_field("label_min_radius", &mut self.label_min_radius, 0.0, 200.0, defaults.label_min_radius);
        clamp_field("label_min_zoom", &mut self.label_min_zoom, 0.01, 50.0, defaults.label_min_zoom);

        if self.min_zoom > self.max_zoom {
            warn!(
                min_zoom = self.min_zoom,
                max_zoom = self.max_zoom,
                "min_zoom exceeds max_zoom, swapping"
            );
            std::mem::swap(&mut self.min_zoom, &mut self.max_zoom);
        }

        if !self.particle_density_per_value_unit.is_finite() || self.particle_density_per_value_unit < 0.0 {
            warn!(
                value = self.particle_density_per_value_unit,
                "particle density must be a non-negative number"
            );
            self.particle_density_per_value_unit = defaults.particle_density_per_value_unit;
        }
        self.collision_iterations = self.collision_iterations.clamp(1, 8);
        self.max_particles_per_edge = self.max_particles_per_edge.clamp(1, 64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").expect("config parses");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"charge_strength": 800, "pin_release": "keep"}"#).expect("config parses");
        assert_eq!(config.charge_strength, 800.0);
        assert_eq!(config.pin_release, PinRelease::Keep);
        assert_eq!(config.damping_factor, EngineConfig::default().damping_factor);
    }

    #[test]
    fn sanitized_clamps_and_orders_zoom_bounds() {
        let config = EngineConfig {
            damping_factor: 3.0,
            min_zoom: 8.0,
            max_zoom: 0.5,
            charge_strength: f32::NAN,
            max_particles_per_edge: 10_000,
            ..EngineConfig::default()
        }
        .sanitized();

        assert!(config.damping_factor <= 0.98);
        assert!(config.min_zoom < config.max_zoom);
        assert_eq!(config.charge_strength, EngineConfig::default().charge_strength);
        assert_eq!(config.max_particles_per_edge, 64);
    }
}
