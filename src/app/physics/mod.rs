mod forces;
mod quadtree;

use eframe::egui::{Vec2, vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EngineConfig;

use super::graph::{GraphSnapshot, style::node_style};
use forces::{
    CollisionBodies, DISTANCE_EPSILON, RepulsionParams, accumulate_collision_pairs,
    accumulate_repulsion_for_node,
};
use quadtree::QuadNode;

const BARNES_HUT_THETA: f32 = 0.72;
const SPRING_DAMPING: f32 = 0.2;
const MAX_SPEED: f32 = 48.0;
const ALPHA_DECAY_TICKS: f32 = 300.0;
const SEED_RING_SPACING: f32 = 28.0;
const SEED_JITTER: f32 = 2.0;
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Alpha target held while the user drags a node.
pub const DRAG_ALPHA_TARGET: f32 = 0.3;

fn is_finite(value: Vec2) -> bool {
    value.x.is_finite() && value.y.is_finite()
}

fn level_tier(level: u32) -> f32 {
    1.0 / (1.0 + 0.5 * level as f32)
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ForceParams {
    charge_strength: f32,
    link_distance_base: f32,
    link_strength: f32,
    collision_padding: f32,
    collision_iterations: usize,
    damping_factor: f32,
    centering_strength: f32,
    alpha_min: f32,
}

impl From<&EngineConfig> for ForceParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            charge_strength: config.charge_strength,
            link_distance_base: config.link_distance_base,
            link_strength: config.link_strength,
            collision_padding: config.collision_padding,
            collision_iterations: config.collision_iterations.max(1),
            damping_factor: config.damping_factor,
            centering_strength: config.centering_strength,
            alpha_min: config.alpha_min,
        }
    }
}

#[derive(Default)]
struct PhysicsScratch {
    revision: Option<u64>,
    degrees: Vec<usize>,
    weights: Vec<f32>,
    forces: Vec<Vec2>,
    positions: Vec<Vec2>,
    radii: Vec<f32>,
    movable: Vec<bool>,
    corrections: Vec<Vec2>,
}

/// Iterative force solver for one snapshot. Positions live on the snapshot's
/// nodes; the simulation only owns the cooling schedule and scratch buffers.
pub struct Simulation {
    params: ForceParams,
    center: Vec2,
    alpha: f32,
    alpha_target: f32,
    alpha_decay: f32,
    seed: u64,
    ticks: u64,
    scratch: PhysicsScratch,
}

impl Simulation {
    pub fn new(config: &EngineConfig, center: Vec2) -> Self {
        let params = ForceParams::from(config);
        Self {
            alpha_decay: 1.0 - params.alpha_min.powf(1.0 / ALPHA_DECAY_TICKS),
            params,
            center,
            alpha: 1.0,
            alpha_target: 0.0,
            seed: config.seed,
            ticks: 0,
            scratch: PhysicsScratch::default(),
        }
    }

    /// Applies live tuning changes without restarting the layout.
    pub fn set_config(&mut self, config: &EngineConfig) {
        let params = ForceParams::from(config);
        if params.alpha_min != self.params.alpha_min {
            self.alpha_decay = 1.0 - params.alpha_min.powf(1.0 / ALPHA_DECAY_TICKS);
        }
        self.params = params;
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    pub fn set_alpha_target(&mut self, target: f32) {
        self.alpha_target = target.clamp(0.0, 1.0);
    }

    /// Sets alpha directly and resumes ticking if it is above `alpha_min`.
    pub fn reheat(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn is_idle(&self) -> bool {
        self.alpha < self.params.alpha_min && self.alpha_target < self.params.alpha_min
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn kinetic_energy(&self, snapshot: &GraphSnapshot) -> f32 {
        snapshot
            .nodes
            .iter()
            .map(|node| node.velocity.length_sq())
            .filter(|energy| energy.is_finite())
            .sum()
    }

    /// Places every node not marked in `placed` on a phyllotaxis ring around
    /// the center. The root goes to the center itself. Placement only depends
    /// on the configured seed and the node order.
    pub fn seed_positions(&mut self, snapshot: &mut GraphSnapshot, placed: &[bool]) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut ring_slot = 0usize;

        for (index, node) in snapshot.nodes.iter_mut().enumerate() {
            let jitter = vec2(
                rng.random_range(-SEED_JITTER..=SEED_JITTER),
                rng.random_range(-SEED_JITTER..=SEED_JITTER),
            );
            if placed.get(index).copied().unwrap_or(false) && is_finite(node.position) {
                continue;
            }

            node.velocity = Vec2::ZERO;
            if snapshot.root_index == Some(index) {
                node.position = self.center;
                continue;
            }

            let radius = SEED_RING_SPACING * ((ring_slot as f32) + 1.0).sqrt();
            let angle = (ring_slot as f32) * GOLDEN_ANGLE;
            node.position = self.center + vec2(angle.cos(), angle.sin()) * radius + jitter;
            ring_slot += 1;
        }

        for node in &mut snapshot.nodes {
            if let Some(pin) = node.pin {
                node.position = pin;
            }
        }
    }

    fn sync_topology(&mut self, snapshot: &GraphSnapshot) {
        if self.scratch.revision == Some(snapshot.revision) && self.scratch.degrees.len() == snapshot.nodes.len() {
            return;
        }

        self.scratch.degrees = snapshot.degrees();
        self.scratch.weights = snapshot
            .nodes
            .iter()
            .map(|node| node_style(node.kind).charge_weight)
            .collect();
        self.scratch.revision = Some(snapshot.revision);
    }

    /// Advances the layout by one logical tick. Returns `false` without
    /// touching anything once the simulation has cooled below `alpha_min`.
    pub fn tick(&mut self, snapshot: &mut GraphSnapshot) -> bool {
        if self.is_idle() || snapshot.nodes.is_empty() {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
        self.ticks += 1;
        self.sync_topology(snapshot);

        let node_count = snapshot.nodes.len();
        let scratch = &mut self.scratch;
        scratch.forces.clear();
        scratch.forces.resize(node_count, Vec2::ZERO);
        scratch.positions.clear();
        scratch.positions.extend(snapshot.nodes.iter().map(|node| node.position));

        let repulsion = RepulsionParams {
            charge: self.params.charge_strength,
            alpha: self.alpha,
            theta: BARNES_HUT_THETA,
        };
        if repulsion.charge > 0.0
            && let Some(tree) = QuadNode::build(&scratch.positions, &scratch.weights)
        {
            for (index, force) in scratch.forces.iter_mut().enumerate() {
                if is_finite(scratch.positions[index]) {
                    accumulate_repulsion_for_node(
                        &tree,
                        index,
                        &scratch.positions,
                        &scratch.weights,
                        repulsion,
                        force,
                    );
                }
            }
        }

        self.accumulate_link_forces(snapshot);
        self.integrate(snapshot);
        self.apply_centering(snapshot);
        self.resolve_collisions(snapshot);

        for node in &mut snapshot.nodes {
            if let Some(pin) = node.pin {
                node.position = pin;
                node.velocity = Vec2::ZERO;
            }
        }

        true
    }

    fn accumulate_link_forces(&mut self, snapshot: &GraphSnapshot) {
        let params = self.params;
        let alpha = self.alpha;
        let scratch = &mut self.scratch;
        let node_count = snapshot.nodes.len();

        for edge in &snapshot.edges {
            let (source, target) = (edge.source, edge.target);
            if source >= node_count || target >= node_count || source == target {
                continue;
            }

            let source_node = &snapshot.nodes[source];
            let target_node = &snapshot.nodes[target];
            let delta = target_node.position - source_node.position;
            if !is_finite(delta) {
                continue;
            }
            let distance = delta.length().max(DISTANCE_EPSILON);
            let direction = if delta.length_sq() > 0.0 {
                delta / distance
            } else {
                forces::jitter_direction(source, target)
            };

            let source_degree = scratch.degrees[source].max(1);
            let target_degree = scratch.degrees[target].max(1);
            let rest_length = params.link_distance_base * level_tier(source_node.level.min(target_node.level))
                + source_node.radius
                + target_node.radius;
            let stiffness = params.link_strength / source_degree.min(target_degree) as f32;

            let stretch = (distance - rest_length) * stiffness;
            let closing_speed = (target_node.velocity - source_node.velocity).dot(direction);
            let magnitude = (stretch + closing_speed * SPRING_DAMPING) * alpha;

            // The lower-degree endpoint absorbs more of the correction.
            let target_bias = source_degree as f32 / (source_degree + target_degree) as f32;
            scratch.forces[target] -= direction * magnitude * target_bias;
            scratch.forces[source] += direction * magnitude * (1.0 - target_bias);
        }
    }

    fn integrate(&mut self, snapshot: &mut GraphSnapshot) {
        let damping = self.params.damping_factor;
        for (node, force) in snapshot.nodes.iter_mut().zip(&self.scratch.forces) {
            if node.is_pinned() || !is_finite(*force) {
                continue;
            }

            let mut velocity = node.velocity + *force;
            let speed = velocity.length();
            if speed > MAX_SPEED {
                velocity *= MAX_SPEED / speed;
            }
            let position = node.position + velocity;
            if !is_finite(velocity) || !is_finite(position) {
                continue;
            }

            node.position = position;
            node.velocity = velocity * damping;
        }
    }

    fn apply_centering(&self, snapshot: &mut GraphSnapshot) {
        let strength = self.params.centering_strength;
        if strength <= 0.0 {
            return;
        }

        let mut sum = Vec2::ZERO;
        let mut count = 0usize;
        for node in snapshot.nodes.iter().filter(|node| !node.is_pinned()) {
            sum += node.position;
            count += 1;
        }
        if count == 0 {
            return;
        }

        let shift = (self.center - sum / count as f32) * strength;
        if !is_finite(shift) {
            return;
        }
        for node in snapshot.nodes.iter_mut().filter(|node| !node.is_pinned()) {
            node.position += shift;
        }
    }

    fn resolve_collisions(&mut self, snapshot: &mut GraphSnapshot) {
        let padding = self.params.collision_padding;
        let scratch = &mut self.scratch;
        scratch.radii.clear();
        scratch.radii.extend(snapshot.nodes.iter().map(|node| node.radius + padding));
        scratch.movable.clear();
        scratch.movable.extend(snapshot.nodes.iter().map(|node| !node.is_pinned()));
        let max_radius = scratch.radii.iter().copied().fold(0.0f32, f32::max);
        let max_pair_distance = max_radius * 2.0;

        for _ in 0..self.params.collision_iterations {
            scratch.positions.clear();
            scratch.positions.extend(snapshot.nodes.iter().map(|node| node.position));
            let Some(tree) = QuadNode::build(&scratch.positions, &scratch.weights) else {
                return;
            };

            scratch.corrections.clear();
            scratch.corrections.resize(snapshot.nodes.len(), Vec2::ZERO);
            let bodies = CollisionBodies {
                positions: &scratch.positions,
                radii: &scratch.radii,
                movable: &scratch.movable,
                max_pair_distance_sq: max_pair_distance * max_pair_distance,
            };
            accumulate_collision_pairs(&tree, &tree, true, &bodies, &mut scratch.corrections);

            let mut moved = false;
            for (node, correction) in snapshot.nodes.iter_mut().zip(&scratch.corrections) {
                if node.is_pinned() || *correction == Vec2::ZERO || !is_finite(*correction) {
                    continue;
                }
                node.position += *correction;
                moved = true;
            }
            if !moved {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::graph::build_snapshot;
    use crate::dataset::{Dataset, EntityRecord, TransferRecord};

    fn entity(id: &str) -> EntityRecord {
        EntityRecord {
            id: id.to_owned(),
            name: id.to_uppercase(),
            ..Default::default()
        }
    }

    fn transfer(from: &str, to: &str, amount: f64) -> TransferRecord {
        TransferRecord {
            from: from.to_owned(),
            to: to.to_owned(),
            amount,
            timestamp_ms: 1,
            kind: None,
        }
    }

    fn star(amounts: &[(&str, f64)]) -> GraphSnapshot {
        let dataset = Dataset {
            root: Some(entity("r")),
            counterparties: amounts.iter().map(|(id, _)| entity(id)).collect(),
            transfers: amounts.iter().map(|(id, amount)| transfer("r", id, *amount)).collect(),
            unreadable_records: 0,
        };
        build_snapshot(&dataset, 1)
    }

    fn wide_star(count: usize) -> GraphSnapshot {
        let ids = (0..count).map(|index| format!("s{index}")).collect::<Vec<_>>();
        let amounts = ids
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), 10.0 * (index as f64 + 1.0)))
            .collect::<Vec<_>>();
        star(&amounts)
    }

    fn settle(snapshot: &mut GraphSnapshot, config: &EngineConfig) -> Simulation {
        let mut simulation = Simulation::new(config, vec2(400.0, 300.0));
        let placed = vec![false; snapshot.nodes.len()];
        simulation.seed_positions(snapshot, &placed);
        for _ in 0..2_000 {
            if !simulation.tick(snapshot) {
                break;
            }
        }
        simulation
    }

    #[test]
    fn same_seed_gives_identical_layouts() {
        let config = EngineConfig::default();
        let mut first = wide_star(24);
        let mut second = wide_star(24);
        settle(&mut first, &config);
        settle(&mut second, &config);

        for (a, b) in first.nodes.iter().zip(&second.nodes) {
            assert_eq!(a.position, b.position);
        }
    }

    #[test]
    fn cools_to_idle_with_low_energy() {
        let config = EngineConfig::default();
        let mut snapshot = wide_star(30);
        let mut simulation = settle(&mut snapshot, &config);

        assert!(simulation.is_idle());
        assert!(!simulation.tick(&mut snapshot));
        assert!(simulation.ticks() < 1_000);
        assert!(simulation.kinetic_energy(&snapshot) < 1.0);
    }

    #[test]
    fn settled_discs_do_not_overlap() {
        let config = EngineConfig::default();
        let mut snapshot = wide_star(40);
        settle(&mut snapshot, &config);

        for (i, a) in snapshot.nodes.iter().enumerate() {
            for b in &snapshot.nodes[i + 1..] {
                let distance = (a.position - b.position).length();
                assert!(
                    distance >= a.radius + b.radius - 0.5,
                    "{} and {} overlap at distance {distance}",
                    a.id,
                    b.id
                );
            }
        }
    }

    #[test]
    fn root_centers_and_heavier_links_reach_further() {
        let config = EngineConfig::default();
        let mut snapshot = star(&[("a", 10.0), ("b", 100.0), ("c", 1_000.0)]);
        let mut simulation = Simulation::new(&config, vec2(400.0, 300.0));
        let placed = vec![false; snapshot.nodes.len()];
        simulation.seed_positions(&mut snapshot, &placed);
        for _ in 0..500 {
            simulation.tick(&mut snapshot);
        }

        let node = |id: &str| snapshot.node(id).expect("node exists");
        let (root, a, b, c) = (node("r"), node("a"), node("b"), node("c"));

        let centroid = snapshot
            .nodes
            .iter()
            .fold(Vec2::ZERO, |sum, node| sum + node.position)
            / snapshot.nodes.len() as f32;
        assert!((root.position - centroid).length() < 30.0);
        assert!(c.radius > b.radius && b.radius > a.radius);
        assert!((c.position - root.position).length() > (a.position - root.position).length());

        for (i, first) in snapshot.nodes.iter().enumerate() {
            for second in &snapshot.nodes[i + 1..] {
                let distance = (first.position - second.position).length();
                assert!(
                    distance >= first.radius + second.radius - 0.5,
                    "{} and {} overlap at distance {distance}",
                    first.id,
                    second.id
                );
            }
        }

        let (r, a, c) = (
            snapshot.index_by_id["r"],
            snapshot.index_by_id["a"],
            snapshot.index_by_id["c"],
        );
        let edge = |source: usize, target: usize| {
            snapshot
                .edges
                .iter()
                .find(|edge| edge.source == source && edge.target == target)
                .expect("edge exists")
        };
        let (to_a, to_c) = (edge(r, a), edge(r, c));
        assert!(to_c.width > to_a.width);
        assert!(to_c.opacity > to_a.opacity);
    }

    #[test]
    fn coincident_nodes_stay_finite_and_separate() {
        let config = EngineConfig::default();
        let mut snapshot = wide_star(6);
        for node in &mut snapshot.nodes {
            node.position = vec2(10.0, 10.0);
        }

        let mut simulation = Simulation::new(&config, vec2(0.0, 0.0));
        for _ in 0..50 {
            simulation.tick(&mut snapshot);
        }

        for node in &snapshot.nodes {
            assert!(is_finite(node.position));
            assert!(is_finite(node.velocity));
        }
        let spread = (snapshot.nodes[1].position - snapshot.nodes[2].position).length();
        assert!(spread > 1.0);
    }

    #[test]
    fn pinned_nodes_do_not_move() {
        let config = EngineConfig::default();
        let mut snapshot = wide_star(8);
        let mut simulation = Simulation::new(&config, vec2(400.0, 300.0));
        let placed = vec![false; snapshot.nodes.len()];
        simulation.seed_positions(&mut snapshot, &placed);

        let pinned = snapshot.index_by_id["s3"];
        let pin = vec2(-120.0, 75.0);
        snapshot.nodes[pinned].pin = Some(pin);
        for _ in 0..100 {
            simulation.tick(&mut snapshot);
            assert_eq!(snapshot.nodes[pinned].position, pin);
            assert_eq!(snapshot.nodes[pinned].velocity, Vec2::ZERO);
        }
    }

    #[test]
    fn reheat_resumes_an_idle_simulation() {
        let config = EngineConfig::default();
        let mut snapshot = wide_star(5);
        let mut simulation = settle(&mut snapshot, &config);
        assert!(!simulation.tick(&mut snapshot));

        simulation.reheat(0.5);
        assert!(!simulation.is_idle());
        assert!(simulation.tick(&mut snapshot));
    }

    #[test]
    fn drag_target_keeps_simulation_warm() {
        let config = EngineConfig::default();
        let mut snapshot = wide_star(5);
        let mut simulation = settle(&mut snapshot, &config);

        simulation.set_alpha_target(DRAG_ALPHA_TARGET);
        simulation.reheat(DRAG_ALPHA_TARGET);
        for _ in 0..1_000 {
            assert!(simulation.tick(&mut snapshot));
        }
        assert!((simulation.alpha() - DRAG_ALPHA_TARGET).abs() < 1e-3);
    }
}
