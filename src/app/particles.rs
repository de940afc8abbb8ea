use eframe::egui::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EngineConfig;

use super::graph::{EdgeKind, GraphSnapshot, style::normalize_log};

pub const MIN_SPEED: f32 = 0.002;
pub const MAX_SPEED: f32 = 0.012;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub edge: usize,
    /// Fraction of the way from source to target, in `[0, 1)`.
    pub progress: f32,
    pub speed: f32,
}

/// Flow particles for one snapshot revision. Advancing is independent of the
/// physics clock; positions are read from the edges' current endpoints.
#[derive(Clone, Debug, Default)]
pub struct ParticleField {
    revision: Option<u64>,
    particles: Vec<Particle>,
}

pub fn particles_for_edge(value: f64, config: &EngineConfig) -> usize {
    let max = config.max_particles_per_edge.max(1);
    let scaled = (value * config.particle_density_per_value_unit).round();
    if !scaled.is_finite() || scaled < 1.0 {
        return 1;
    }
    (scaled as usize).clamp(1, max)
}

impl ParticleField {
    pub fn seed(snapshot: &GraphSnapshot, config: &EngineConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed ^ snapshot.revision);
        let mut particles = Vec::new();

        for (edge_index, edge) in snapshot.edges.iter().enumerate() {
            let count = particles_for_edge(edge.value, config);
            let magnitude = normalize_log(edge.value, snapshot.min_edge_value, snapshot.max_edge_value);
            let base_speed = MIN_SPEED + (MAX_SPEED - MIN_SPEED) * magnitude;

            for slot in 0..count {
                let jitter = 0.85 + rng.random::<f32>() * 0.3;
                particles.push(Particle {
                    edge: edge_index,
                    progress: ((slot as f32 + rng.random::<f32>()) / count as f32).min(0.999),
                    speed: (base_speed * jitter).clamp(MIN_SPEED, MAX_SPEED),
                });
            }
        }

        Self {
            revision: Some(snapshot.revision),
            particles,
        }
    }

    pub fn is_current(&self, snapshot: &GraphSnapshot) -> bool {
        self.revision == Some(snapshot.revision)
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[cfg(test)]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// `frame_scale` is 1.0 for a 60 Hz frame.
    pub fn advance(&mut self, frame_scale: f32) {
        if !frame_scale.is_finite() || frame_scale <= 0.0 {
            return;
        }

        for particle in &mut self.particles {
            particle.progress += particle.speed * frame_scale;
            if particle.progress >= 1.0 {
                particle.progress = 0.0;
            }
        }
    }

    /// Graph-space particle positions. Nothing is yielded for a snapshot the
    /// field was not seeded from.
    pub fn positions<'a>(
        &'a self,
        snapshot: &'a GraphSnapshot,
    ) -> impl Iterator<Item = (Vec2, EdgeKind)> + 'a {
        let current = self.is_current(snapshot);
        self.particles
            .iter()
            .filter(move |_| current)
            .filter_map(move |particle| {
                let edge = snapshot.edges.get(particle.edge)?;
                let source = snapshot.nodes.get(edge.source)?.position;
                let target = snapshot.nodes.get(edge.target)?.position;
                let position = source + (target - source) * particle.progress;
                (position.x.is_finite() && position.y.is_finite()).then_some((position, edge.kind))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::graph::build_snapshot;
    use crate::dataset::{Dataset, EntityRecord, TransferRecord};
    use eframe::egui::vec2;

    fn snapshot(values: &[f64]) -> GraphSnapshot {
        let ids = (0..values.len()).map(|index| format!("s{index}")).collect::<Vec<_>>();
        let dataset = Dataset {
            root: Some(EntityRecord {
                id: "hq".to_owned(),
                ..Default::default()
            }),
            counterparties: ids
                .iter()
                .map(|id| EntityRecord {
                    id: id.clone(),
                    ..Default::default()
                })
                .collect(),
            transfers: ids
                .iter()
                .zip(values)
                .map(|(id, value)| TransferRecord {
                    from: "hq".to_owned(),
                    to: id.clone(),
                    amount: *value,
                    timestamp_ms: 1,
                    kind: None,
                })
                .collect(),
            unreadable_records: 0,
        };
        build_snapshot(&dataset, 7)
    }

    #[test]
    fn count_scales_with_value_and_is_clamped() {
        let config = EngineConfig::default();
        assert_eq!(particles_for_edge(10.0, &config), 1);
        assert_eq!(particles_for_edge(60_000.0, &config), 3);
        assert_eq!(particles_for_edge(1e12, &config), config.max_particles_per_edge);
        assert_eq!(particles_for_edge(f64::NAN, &config), 1);
    }

    #[test]
    fn larger_values_flow_faster() {
        let config = EngineConfig::default();
        let graph = snapshot(&[10.0, 1_000_000.0]);
        let field = ParticleField::seed(&graph, &config, 1);

        let average = |edge: usize| {
            let speeds = field
                .particles()
                .iter()
                .filter(|particle| particle.edge == edge)
                .map(|particle| particle.speed)
                .collect::<Vec<_>>();
            speeds.iter().sum::<f32>() / speeds.len() as f32
        };
        assert!(average(1) > average(0));
        for particle in field.particles() {
            assert!((MIN_SPEED..=MAX_SPEED).contains(&particle.speed));
        }
    }

    #[test]
    fn progress_wraps_to_start() {
        let mut field = ParticleField {
            revision: Some(7),
            particles: vec![Particle {
                edge: 0,
                progress: 0.995,
                speed: 0.01,
            }],
        };
        field.advance(1.0);
        assert_eq!(field.particles()[0].progress, 0.0);
        field.advance(1.0);
        assert!((field.particles()[0].progress - 0.01).abs() < 1e-6);
    }

    #[test]
    fn particles_visit_both_ends_of_their_edge() {
        let config = EngineConfig::default();
        let mut graph = snapshot(&[500.0]);
        graph.nodes[0].position = vec2(0.0, 0.0);
        graph.nodes[1].position = vec2(100.0, 0.0);
        let mut field = ParticleField::seed(&graph, &config, 3);

        let mut nearest_source = f32::MAX;
        let mut nearest_target = f32::MAX;
        for _ in 0..2_000 {
            field.advance(1.0);
            for (position, _) in field.positions(&graph) {
                assert!(position.x >= 0.0 && position.x <= 100.0);
                nearest_source = nearest_source.min(position.x);
                nearest_target = nearest_target.min(100.0 - position.x);
            }
        }
        assert!(nearest_source < 2.0);
        assert!(nearest_target < 2.0);
    }

    #[test]
    fn stale_field_draws_nothing() {
        let config = EngineConfig::default();
        let graph = snapshot(&[500.0]);
        let field = ParticleField::seed(&graph, &config, 3);

        let mut rebuilt = graph.clone();
        rebuilt.revision += 1;
        assert!(!field.is_current(&rebuilt));
        assert_eq!(field.positions(&rebuilt).count(), 0);
        assert!(field.positions(&graph).count() > 0);
    }
}
