mod cull;
mod painter;

use eframe::egui::{Color32, Rect, Vec2};

use crate::config::EngineConfig;

use super::graph::style::{blend_color, edge_color, particle_color, with_opacity};
use super::graph::{GraphSnapshot, Viewport};
use super::particles::ParticleField;
use cull::{circle_visible, edge_visible};
pub use painter::PainterSurface;

const HIGHLIGHT_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
const HOVER_COLOR: Color32 = Color32::from_rgb(255, 164, 101);
const PIN_COLOR: Color32 = Color32::from_rgb(148, 163, 184);
const LABEL_COLOR: Color32 = Color32::from_gray(238);
const PARTICLE_RADIUS: f32 = 2.4;
const GLOW_SCALE: f32 = 2.2;

/// Host-neutral drawing target. While a transform is pushed, every position,
/// radius and width is in graph units.
pub trait Surface {
    fn fill_background(&mut self, viewport: &Viewport);
    fn push_transform(&mut self, viewport: Viewport);
    fn pop_transform(&mut self);
    fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color32);
    fn disc(&mut self, center: Vec2, radius: f32, color: Color32);
    /// Radial gradient from `color` at the center to transparent at `radius`.
    fn glow(&mut self, center: Vec2, radius: f32, color: Color32);
    fn ring(&mut self, center: Vec2, radius: f32, width: f32, color: Color32);
    /// Label placed beside a disc of `radius` at `center`.
    fn text(&mut self, center: Vec2, radius: f32, text: &str, color: Color32);
}

pub struct Scene<'a> {
    pub snapshot: &'a GraphSnapshot,
    pub particles: &'a ParticleField,
    pub viewport: Viewport,
    /// Canvas bounds in device space, used for culling.
    pub canvas: Rect,
    pub hovered: Option<usize>,
    pub selected: Option<usize>,
    pub config: &'a EngineConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub edges: usize,
    pub particles: usize,
    pub nodes: usize,
    pub labels: usize,
}

fn is_finite(value: Vec2) -> bool {
    value.x.is_finite() && value.y.is_finite()
}

/// Draws one frame: background, edges, particles, then nodes in draw order
/// with their labels.
pub fn render_frame(surface: &mut impl Surface, scene: &Scene<'_>) -> FrameStats {
    let Scene {
        snapshot,
        particles,
        viewport,
        canvas,
        hovered,
        selected,
        config,
    } = *scene;
    let mut stats = FrameStats::default();
    let node_count = snapshot.nodes.len();
    let focus = selected.or(hovered);

    surface.fill_background(&viewport);
    surface.push_transform(viewport);

    for edge in &snapshot.edges {
        if edge.source >= node_count || edge.target >= node_count {
            continue;
        }
        let from = snapshot.nodes[edge.source].position;
        let to = snapshot.nodes[edge.target].position;
        if !is_finite(from) || !is_finite(to) {
            continue;
        }
        let width = edge.width * viewport.zoom;
        if !edge_visible(canvas, viewport.to_device(from), viewport.to_device(to), width) {
            continue;
        }

        let base = edge_color(edge.kind);
        let color = if snapshot.is_incident(edge, focus) {
            with_opacity(blend_color(base, HIGHLIGHT_COLOR, 0.45), (edge.opacity * 1.8).min(1.0))
        } else if focus.is_some() {
            with_opacity(base, edge.opacity * 0.5)
        } else {
            with_opacity(base, edge.opacity)
        };
        surface.line(from, to, edge.width, color);
        stats.edges += 1;
    }

    for (position, kind) in particles.positions(snapshot) {
        if !circle_visible(canvas, viewport.to_device(position), PARTICLE_RADIUS * viewport.zoom) {
            continue;
        }
        surface.disc(position, PARTICLE_RADIUS, particle_color(kind));
        stats.particles += 1;
    }

    for &index in &snapshot.draw_order {
        let Some(node) = snapshot.nodes.get(index) else {
            continue;
        };
        if !is_finite(node.position) {
            continue;
        }

        let glow_radius = if config.node_glow { node.radius * GLOW_SCALE } else { node.radius };
        if !circle_visible(canvas, viewport.to_device(node.position), glow_radius * viewport.zoom) {
            continue;
        }

        let is_hovered = hovered == Some(index);
        let is_selected = selected == Some(index);

        if config.node_glow {
            surface.glow(node.position, glow_radius, with_opacity(node.color, 0.35));
        }
        let fill = if is_hovered {
            blend_color(node.color, HOVER_COLOR, 0.35)
        } else {
            node.color
        };
        surface.disc(node.position, node.radius, fill);

        if node.is_pinned() {
            surface.ring(node.position, node.radius + 2.0, 1.5, PIN_COLOR);
        }
        if is_selected {
            surface.ring(node.position, node.radius + 5.0, 2.0, HIGHLIGHT_COLOR);
        } else if is_hovered {
            surface.ring(node.position, node.radius + 3.0, 1.5, HOVER_COLOR);
        }
        stats.nodes += 1;

        let show_label = node.radius * viewport.zoom >= config.label_min_radius
            || viewport.zoom >= config.label_min_zoom
            || is_hovered
            || is_selected;
        if show_label {
            surface.text(node.position, node.radius, &node.label, LABEL_COLOR);
            stats.labels += 1;
        }
    }

    surface.pop_transform();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::graph::build_snapshot;
    use crate::dataset::{Dataset, EntityRecord, TransferRecord};
    use eframe::egui::{pos2, vec2};

    #[derive(Clone, Debug, PartialEq)]
    enum DrawOp {
        Background,
        Push,
        Pop,
        Line,
        Disc { center: Vec2, radius: f32 },
        Glow,
        Ring,
        Text(String),
    }

    #[derive(Default)]
    struct RecordingSurface {
        ops: Vec<DrawOp>,
    }

    impl RecordingSurface {
        fn texts(&self) -> Vec<&str> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    DrawOp::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }

        fn position_of(&self, op: impl Fn(&DrawOp) -> bool) -> Option<usize> {
            self.ops.iter().position(op)
        }
    }

    impl Surface for RecordingSurface {
        fn fill_background(&mut self, _viewport: &Viewport) {
            self.ops.push(DrawOp::Background);
        }

        fn push_transform(&mut self, _viewport: Viewport) {
            self.ops.push(DrawOp::Push);
        }

        fn pop_transform(&mut self) {
            self.ops.push(DrawOp::Pop);
        }

        fn line(&mut self, _from: Vec2, _to: Vec2, _width: f32, _color: Color32) {
            self.ops.push(DrawOp::Line);
        }

        fn disc(&mut self, center: Vec2, radius: f32, _color: Color32) {
            self.ops.push(DrawOp::Disc { center, radius });
        }

        fn glow(&mut self, _center: Vec2, _radius: f32, _color: Color32) {
            self.ops.push(DrawOp::Glow);
        }

        fn ring(&mut self, _center: Vec2, _radius: f32, _width: f32, _color: Color32) {
            self.ops.push(DrawOp::Ring);
        }

        fn text(&mut self, _center: Vec2, _radius: f32, text: &str, _color: Color32) {
            self.ops.push(DrawOp::Text(text.to_owned()));
        }
    }

    fn snapshot() -> GraphSnapshot {
        let entity = |id: &str, name: &str| EntityRecord {
            id: id.to_owned(),
            name: name.to_owned(),
            ..Default::default()
        };
        let dataset = Dataset {
            root: Some(entity("hq", "Headquarters")),
            counterparties: vec![entity("s1", "Acme"), entity("s2", "Globex")],
            transfers: vec![
                TransferRecord {
                    from: "hq".to_owned(),
                    to: "s1".to_owned(),
                    amount: 40_000.0,
                    timestamp_ms: 1,
                    kind: None,
                },
                TransferRecord {
                    from: "hq".to_owned(),
                    to: "s2".to_owned(),
                    amount: 20.0,
                    timestamp_ms: 1,
                    kind: None,
                },
            ],
            unreadable_records: 0,
        };
        let mut snapshot = build_snapshot(&dataset, 3);
        snapshot.nodes[0].position = vec2(400.0, 300.0);
        snapshot.nodes[1].position = vec2(550.0, 300.0);
        snapshot.nodes[2].position = vec2(250.0, 300.0);
        snapshot
    }

    fn canvas() -> Rect {
        Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 600.0))
    }

    fn render(
        snapshot: &GraphSnapshot,
        particles: &ParticleField,
        viewport: Viewport,
        hovered: Option<usize>,
        config: &EngineConfig,
    ) -> (RecordingSurface, FrameStats) {
        let mut surface = RecordingSurface::default();
        let stats = render_frame(
            &mut surface,
            &Scene {
                snapshot,
                particles,
                viewport,
                canvas: canvas(),
                hovered,
                selected: None,
                config,
            },
        );
        (surface, stats)
    }

    #[test]
    fn draws_edges_then_particles_then_nodes() {
        let config = EngineConfig::default();
        let graph = snapshot();
        let particles = ParticleField::seed(&graph, &config, 1);
        let (surface, stats) = render(&graph, &particles, Viewport::default(), None, &config);

        assert_eq!(surface.ops.first(), Some(&DrawOp::Background));
        assert_eq!(surface.ops[1], DrawOp::Push);
        assert_eq!(surface.ops.last(), Some(&DrawOp::Pop));
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.particles, particles.len());

        let last_line = surface.ops.iter().rposition(|op| *op == DrawOp::Line).expect("lines");
        let first_glow = surface.position_of(|op| *op == DrawOp::Glow).expect("glow");
        let first_disc = surface
            .position_of(|op| matches!(op, DrawOp::Disc { .. }))
            .expect("discs");
        assert!(last_line < first_disc);
        assert!(first_disc < first_glow);
        assert_eq!(first_disc, last_line + 1);
    }

    #[test]
    fn labels_follow_zoom_and_hover() {
        let config = EngineConfig {
            label_min_radius: 100.0,
            ..EngineConfig::default()
        };
        let graph = snapshot();
        let particles = ParticleField::default();

        let (surface, _) = render(&graph, &particles, Viewport::default(), None, &config);
        assert!(surface.texts().is_empty());

        let (surface, _) = render(&graph, &particles, Viewport::default(), Some(2), &config);
        assert_eq!(surface.texts(), vec!["Globex"]);

        let zoomed = Viewport {
            zoom: config.label_min_zoom,
            pan: vec2(-300.0, -150.0),
            ..Viewport::default()
        };
        let (_, stats) = render(&graph, &particles, zoomed, None, &config);
        assert_eq!(stats.labels, stats.nodes);
        assert!(stats.labels > 0);
    }

    #[test]
    fn off_canvas_nodes_are_culled() {
        let config = EngineConfig::default();
        let mut graph = snapshot();
        graph.nodes[2].position = vec2(-5_000.0, 300.0);
        let (_, stats) = render(&graph, &ParticleField::default(), Viewport::default(), None, &config);
        assert_eq!(stats.nodes, 2);
    }

    #[test]
    fn invalid_edges_and_stale_particles_are_skipped() {
        let config = EngineConfig::default();
        let mut graph = snapshot();
        let particles = ParticleField::seed(&graph, &config, 1);
        graph.edges[1].target = 99;
        graph.revision += 1;

        let (_, stats) = render(&graph, &particles, Viewport::default(), None, &config);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.particles, 0);
    }

    #[test]
    fn node_discs_use_current_positions() {
        let config = EngineConfig {
            node_glow: false,
            ..EngineConfig::default()
        };
        let graph = snapshot();
        let (surface, _) = render(&graph, &ParticleField::default(), Viewport::default(), None, &config);

        for node in &graph.nodes {
            assert!(surface.ops.contains(&DrawOp::Disc {
                center: node.position,
                radius: node.radius,
            }));
        }
    }
}
