use eframe::egui::{Pos2, Vec2};

use crate::config::{EngineConfig, PinRelease};

use super::super::physics::{DRAG_ALPHA_TARGET, Simulation};
use super::model::GraphSnapshot;

/// Pan and zoom reported to `on_view_changed`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub pan: Vec2,
    pub zoom: f32,
}

/// Graph-to-canvas transform. Device positions are canvas-local: the host
/// adds the canvas origin itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub pan: Vec2,
    pub zoom: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Viewport {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0_f32.max(config.min_zoom).min(config.max_zoom),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    pub fn state(&self) -> ViewState {
        ViewState {
            pan: self.pan,
            zoom: self.zoom,
        }
    }

    pub fn to_device(&self, graph: Vec2) -> Pos2 {
        (graph * self.zoom + self.pan).to_pos2()
    }

    pub fn to_graph(&self, device: Pos2) -> Vec2 {
        (device.to_vec2() - self.pan) / self.zoom
    }

    pub fn set_zoom_bounds(&mut self, min_zoom: f32, max_zoom: f32) {
        self.min_zoom = min_zoom.min(max_zoom);
        self.max_zoom = max_zoom.max(min_zoom);
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Sets the zoom while keeping the graph point under `anchor` in place.
    /// Returns whether anything changed.
    pub fn zoom_around(&mut self, anchor: Pos2, zoom: f32) -> bool {
        if !zoom.is_finite() {
            return false;
        }
        let zoom = zoom.max(self.min_zoom).min(self.max_zoom);
        if zoom == self.zoom {
            return false;
        }

        let anchored = self.to_graph(anchor);
        self.zoom = zoom;
        self.pan = anchor.to_vec2() - anchored * zoom;
        true
    }

    pub fn zoom_in(&mut self, anchor: Pos2, step: f32) -> bool {
        self.zoom_around(anchor, self.zoom * step)
    }

    pub fn zoom_out(&mut self, anchor: Pos2, step: f32) -> bool {
        self.zoom_around(anchor, self.zoom / step)
    }

    pub fn pan_by(&mut self, delta: Vec2) -> bool {
        if delta == Vec2::ZERO || !(delta.x.is_finite() && delta.y.is_finite()) {
            return false;
        }
        self.pan += delta;
        true
    }

    /// Zoom 1 with `focus` in the middle of a canvas of `canvas_size`.
    pub fn reset(&mut self, focus: Vec2, canvas_size: Vec2) {
        self.zoom = 1.0_f32.max(self.min_zoom).min(self.max_zoom);
        self.pan = canvas_size * 0.5 - focus * self.zoom;
    }
}

/// Topmost node under `device`. Scans the draw order back to front, so when
/// discs overlap the one drawn last (the largest amount) wins.
pub fn hit_test(snapshot: &GraphSnapshot, viewport: &Viewport, device: Pos2) -> Option<usize> {
    let point = viewport.to_graph(device);
    if !(point.x.is_finite() && point.y.is_finite()) {
        return None;
    }

    snapshot.draw_order.iter().rev().copied().find(|&index| {
        snapshot
            .nodes
            .get(index)
            .is_some_and(|node| (node.position - point).length() < node.radius)
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Moved(Pos2),
    Left,
    Pressed(Pos2),
    Dragged { position: Pos2, delta: Vec2 },
    Released,
    Clicked(Pos2),
    Scrolled { anchor: Pos2, delta: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Drag {
    Node(usize),
    Pan,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InteractionOutcome {
    /// `Some` when the selection changed; the inner value is the new selection.
    pub selection: Option<Option<usize>>,
    pub view_changed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct InteractionState {
    hovered: Option<usize>,
    selected: Option<usize>,
    drag: Option<Drag>,
}

impl InteractionState {
    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn dragged_node(&self) -> Option<usize> {
        match self.drag {
            Some(Drag::Node(index)) => Some(index),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Re-targets hover and selection after a rebuild changed node indices.
    pub fn remap(&mut self, hovered: Option<usize>, selected: Option<usize>) {
        self.hovered = hovered;
        self.selected = selected;
        self.drag = None;
    }

    pub fn select(&mut self, selected: Option<usize>) {
        self.selected = selected;
    }

    pub fn handle(
        &mut self,
        event: PointerEvent,
        snapshot: &mut GraphSnapshot,
        viewport: &mut Viewport,
        simulation: &mut Simulation,
        config: &EngineConfig,
    ) -> InteractionOutcome {
        let mut outcome = InteractionOutcome::default();

        match event {
            PointerEvent::Moved(position) => {
                if self.drag.is_none() {
                    self.hovered = hit_test(snapshot, viewport, position);
                }
            }
            PointerEvent::Left => {
                if self.drag.is_none() {
                    self.hovered = None;
                }
            }
            PointerEvent::Pressed(position) => match hit_test(snapshot, viewport, position) {
                Some(index) => {
                    let node = &mut snapshot.nodes[index];
                    node.pin = Some(node.position);
                    node.velocity = Vec2::ZERO;
                    simulation.set_alpha_target(DRAG_ALPHA_TARGET);
                    simulation.reheat(simulation.alpha().max(DRAG_ALPHA_TARGET));
                    self.hovered = Some(index);
                    self.drag = Some(Drag::Node(index));
                }
                None => self.drag = Some(Drag::Pan),
            },
            PointerEvent::Dragged { position, delta } => match self.drag {
                Some(Drag::Node(index)) => {
                    let target = viewport.to_graph(position);
                    if let Some(node) = snapshot.nodes.get_mut(index)
                        && target.x.is_finite()
                        && target.y.is_finite()
                    {
                        node.pin = Some(target);
                        node.position = target;
                    }
                }
                Some(Drag::Pan) => outcome.view_changed = viewport.pan_by(delta),
                None => {}
            },
            PointerEvent::Released => {
                if let Some(Drag::Node(index)) = self.drag
                    && config.pin_release == PinRelease::Release
                    && let Some(node) = snapshot.nodes.get_mut(index)
                {
                    node.pin = None;
                }
                if matches!(self.drag, Some(Drag::Node(_))) {
                    simulation.set_alpha_target(0.0);
                }
                self.drag = None;
            }
            PointerEvent::Clicked(position) => {
                let hit = hit_test(snapshot, viewport, position);
                if hit != self.selected {
                    self.selected = hit;
                    outcome.selection = Some(hit);
                }
            }
            PointerEvent::Scrolled { anchor, delta } => {
                outcome.view_changed = if delta > 0.0 {
                    viewport.zoom_in(anchor, config.zoom_step)
                } else if delta < 0.0 {
                    viewport.zoom_out(anchor, config.zoom_step)
                } else {
                    false
                };
            }
        }

        outcome
    }
}
