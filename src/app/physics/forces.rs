use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;

/// Distances are floored at this value before dividing.
pub(super) const DISTANCE_EPSILON: f32 = 1.0;
const DISTANCE_EPSILON_SQ: f32 = DISTANCE_EPSILON * DISTANCE_EPSILON;

/// Deterministic, antisymmetric direction used when two bodies coincide.
pub(super) fn jitter_direction(from: usize, to: usize) -> Vec2 {
    let (low, high) = if from < to { (from, to) } else { (to, from) };
    let angle = ((low as f32) * 0.618_034 + (high as f32) * 0.414_214 + 0.11) * std::f32::consts::TAU;
    let direction = vec2(angle.cos(), angle.sin());
    if from < to { direction } else { -direction }
}

#[derive(Clone, Copy)]
pub(super) struct RepulsionParams {
    pub(super) charge: f32,
    pub(super) alpha: f32,
    pub(super) theta: f32,
}

fn repulsion_from_body(point: Vec2, other: Vec2, weight: f32, fallback: Vec2, params: RepulsionParams) -> Vec2 {
    let mut delta = point - other;
    let mut distance_sq = delta.length_sq();
    if distance_sq < DISTANCE_EPSILON_SQ * 1e-6 {
        delta = fallback * DISTANCE_EPSILON;
        distance_sq = DISTANCE_EPSILON_SQ;
    }
    delta * (params.charge * weight * params.alpha / distance_sq.max(DISTANCE_EPSILON_SQ))
}

pub(super) fn accumulate_repulsion_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    weights: &[f32],
    params: RepulsionParams,
    force: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other_index in &node.indices {
            if other_index == index {
                continue;
            }
            *force += repulsion_from_body(
                point,
                positions[other_index],
                weights[other_index],
                jitter_direction(index, other_index),
                params,
            );
        }
        return;
    }

    let delta = point - node.center_of_mass;
    let distance_sq = delta.length_sq().max(DISTANCE_EPSILON_SQ);
    let can_approximate =
        !node.bounds.contains(point) && (node.bounds.side_length() / distance_sq.sqrt()) < params.theta;

    if can_approximate {
        *force += delta * (params.charge * node.mass * params.alpha / distance_sq);
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_repulsion_for_node(child, index, positions, weights, params, force);
    }
}

/// Inputs for the positional collision pass. `radii` already include the
/// collision padding; `movable` is false for pinned nodes.
pub(super) struct CollisionBodies<'a> {
    pub(super) positions: &'a [Vec2],
    pub(super) radii: &'a [f32],
    pub(super) movable: &'a [bool],
    pub(super) max_pair_distance_sq: f32,
}

fn separate_pair(bodies: &CollisionBodies<'_>, from: usize, to: usize, corrections: &mut [Vec2]) {
    let can_move_from = bodies.movable[from];
    let can_move_to = bodies.movable[to];
    if !can_move_from && !can_move_to {
        return;
    }

    let min_distance = bodies.radii[from] + bodies.radii[to];
    let delta = bodies.positions[from] - bodies.positions[to];
    let distance_sq = delta.length_sq();
    if distance_sq >= min_distance * min_distance {
        return;
    }

    let distance = distance_sq.sqrt();
    let direction = if distance > DISTANCE_EPSILON * 1e-3 {
        delta / distance
    } else {
        jitter_direction(from, to)
    };
    let overlap = min_distance - distance;

    // Larger discs give way less: each side moves by the other's share of r².
    let area_from = bodies.radii[from] * bodies.radii[from];
    let area_to = bodies.radii[to] * bodies.radii[to];
    let (share_from, share_to) = match (can_move_from, can_move_to) {
        (true, false) => (1.0, 0.0),
        (false, true) => (0.0, 1.0),
        _ => {
            let total = (area_from + area_to).max(f32::EPSILON);
            (area_to / total, area_from / total)
        }
    };

    corrections[from] += direction * overlap * share_from;
    corrections[to] -= direction * overlap * share_to;
}

pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    bodies: &CollisionBodies<'_>,
    corrections: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > bodies.max_pair_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    separate_pair(bodies, from, to, corrections);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    separate_pair(bodies, from, to, corrections);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_deref() else {
                continue;
            };

            accumulate_collision_pairs(child_a, child_a, true, bodies, corrections);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_deref() else {
                    continue;
                };
                accumulate_collision_pairs(child_a, child_b, false, bodies, corrections);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collision_pairs(child, node_b, false, bodies, corrections);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collision_pairs(node_a, child, false, bodies, corrections);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RepulsionParams {
        RepulsionParams {
            charge: 100.0,
            alpha: 1.0,
            theta: 0.72,
        }
    }

    #[test]
    fn repulsion_pushes_bodies_apart() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let weights = vec![1.0, 1.0];
        let tree = QuadNode::build(&positions, &weights).expect("tree builds");

        let mut force = Vec2::ZERO;
        accumulate_repulsion_for_node(&tree, 0, &positions, &weights, params(), &mut force);
        assert!(force.x < 0.0);
        assert!(force.y.abs() < 1e-4);
    }

    #[test]
    fn coincident_bodies_get_opposite_finite_pushes() {
        let positions = vec![vec2(5.0, 5.0), vec2(5.0, 5.0)];
        let weights = vec![1.0, 1.0];
        let tree = QuadNode::build(&positions, &weights).expect("tree builds");

        let mut first = Vec2::ZERO;
        let mut second = Vec2::ZERO;
        accumulate_repulsion_for_node(&tree, 0, &positions, &weights, params(), &mut first);
        accumulate_repulsion_for_node(&tree, 1, &positions, &weights, params(), &mut second);

        assert!(first.x.is_finite() && first.y.is_finite());
        assert!(first.length() > 0.0);
        assert!((first + second).length() < 1e-3);
    }

    #[test]
    fn collision_never_moves_pinned_bodies() {
        let positions = vec![vec2(0.0, 0.0), vec2(4.0, 0.0)];
        let weights = vec![1.0, 1.0];
        let tree = QuadNode::build(&positions, &weights).expect("tree builds");
        let bodies = CollisionBodies {
            positions: &positions,
            radii: &[10.0, 10.0],
            movable: &[false, true],
            max_pair_distance_sq: 400.0,
        };

        let mut corrections = vec![Vec2::ZERO; 2];
        accumulate_collision_pairs(&tree, &tree, true, &bodies, &mut corrections);

        assert_eq!(corrections[0], Vec2::ZERO);
        assert!((corrections[1].x - 16.0).abs() < 1e-3);
    }
}
