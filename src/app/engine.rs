use std::cell::Cell;
use std::rc::Rc;

use eframe::egui::{Rect, Vec2};
use tracing::{debug, info};

use crate::config::EngineConfig;

use super::graph::{
    GraphSnapshot, InteractionState, Node, PointerEvent, ViewState, Viewport, carry_over_positions,
};
use super::particles::ParticleField;
use super::physics::Simulation;
use super::render::{FrameStats, Scene, Surface, render_frame};

const MAX_TICKS_PER_FRAME: usize = 4;
const MAX_FRAME_SCALE: f32 = 4.0;

/// Shared stop flag between an [`Engine`] and the [`LoopHandle`]s it hands out.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Clone, Debug)]
pub struct LoopHandle {
    token: CancelToken,
}

impl LoopHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The loop was stopped; nothing was simulated or drawn.
    Stopped,
    /// Something is still moving and the host should schedule another frame.
    Animating,
    Idle,
}

/// Fixed-rate accumulator that turns frame time into whole simulation ticks.
#[derive(Clone, Debug)]
pub struct SimulationClock {
    tick_seconds: f64,
    accumulator: f64,
}

impl SimulationClock {
    pub fn new(ticks_per_second: f32) -> Self {
        Self {
            tick_seconds: 1.0 / f64::from(ticks_per_second.max(1.0)),
            accumulator: 0.0,
        }
    }

    /// Number of ticks due after `elapsed_seconds`. At most
    /// [`MAX_TICKS_PER_FRAME`]; time beyond that is dropped.
    pub fn advance(&mut self, elapsed_seconds: f64) -> usize {
        if elapsed_seconds.is_finite() && elapsed_seconds > 0.0 {
            self.accumulator += elapsed_seconds;
        }

        let mut ticks = 0;
        while self.accumulator >= self.tick_seconds && ticks < MAX_TICKS_PER_FRAME {
            self.accumulator -= self.tick_seconds;
            ticks += 1;
        }
        if ticks == MAX_TICKS_PER_FRAME {
            self.accumulator = self.accumulator.min(self.tick_seconds);
        }
        ticks
    }
}

type NodeCallback = Box<dyn FnMut(&Node)>;
type ViewCallback = Box<dyn FnMut(ViewState)>;

/// One network view: a snapshot with its simulation, particles, viewport and
/// interaction state, driven one frame at a time by the host.
pub struct Engine {
    config: EngineConfig,
    snapshot: GraphSnapshot,
    simulation: Simulation,
    particles: ParticleField,
    viewport: Viewport,
    interaction: InteractionState,
    clock: SimulationClock,
    canvas_size: Vec2,
    token: CancelToken,
    on_node_selected: Option<NodeCallback>,
    on_view_changed: Option<ViewCallback>,
    last_stats: FrameStats,
}

impl Engine {
    pub fn new(snapshot: GraphSnapshot, config: EngineConfig, canvas_size: Vec2) -> Self {
        let config = config.sanitized();
        let stopped = CancelToken::default();
        stopped.cancel();

        let mut engine = Self {
            simulation: Simulation::new(&config, canvas_size * 0.5),
            particles: ParticleField::default(),
            viewport: Viewport::new(&config),
            interaction: InteractionState::default(),
            clock: SimulationClock::new(config.ticks_per_second),
            canvas_size,
            token: stopped,
            on_node_selected: None,
            on_view_changed: None,
            last_stats: FrameStats::default(),
            snapshot: GraphSnapshot::default(),
            config,
        };
        engine.install(snapshot, None);
        engine
    }

    /// Starts (or resumes) the frame loop. Stopping any returned handle stops
    /// the engine.
    pub fn start(&mut self) -> LoopHandle {
        if self.token.is_cancelled() {
            self.token = CancelToken::default();
            debug!(revision = self.snapshot.revision, "network engine started");
        }
        LoopHandle {
            token: self.token.clone(),
        }
    }

    pub fn stop(&mut self) {
        if !self.token.is_cancelled() {
            self.token.cancel();
            debug!(revision = self.snapshot.revision, "network engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn on_node_selected(&mut self, callback: impl FnMut(&Node) + 'static) {
        self.on_node_selected = Some(Box::new(callback));
    }

    pub fn on_view_changed(&mut self, callback: impl FnMut(ViewState) + 'static) {
        self.on_view_changed = Some(Box::new(callback));
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn kinetic_energy(&self) -> f32 {
        self.simulation.kinetic_energy(&self.snapshot)
    }

    pub fn hovered_node(&self) -> Option<&Node> {
        self.interaction.hovered().and_then(|index| self.snapshot.nodes.get(index))
    }

    /// The node currently held by a drag, if the drag started on a node.
    pub fn dragged_node(&self) -> Option<&Node> {
        self.interaction
            .dragged_node()
            .and_then(|index| self.snapshot.nodes.get(index))
    }

    pub fn is_dragging(&self) -> bool {
        self.interaction.is_dragging()
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.interaction.selected().and_then(|index| self.snapshot.nodes.get(index))
    }

    pub fn set_canvas_size(&mut self, canvas_size: Vec2) {
        if canvas_size.x > 0.0 && canvas_size.y > 0.0 {
            self.canvas_size = canvas_size;
        }
    }

    /// Applies live tuning. Physics picks the new values up on the next tick.
    pub fn set_config(&mut self, config: EngineConfig) {
        let config = config.sanitized();
        if config == self.config {
            return;
        }

        self.simulation.set_config(&config);
        self.viewport.set_zoom_bounds(config.min_zoom, config.max_zoom);
        if config.ticks_per_second != self.config.ticks_per_second {
            self.clock = SimulationClock::new(config.ticks_per_second);
        }
        let reseed_particles = config.particle_density_per_value_unit
            != self.config.particle_density_per_value_unit
            || config.max_particles_per_edge != self.config.max_particles_per_edge;
        self.config = config;
        if reseed_particles {
            self.particles = ParticleField::seed(&self.snapshot, &self.config, self.config.seed);
        }
    }

    pub fn reheat(&mut self) {
        self.simulation.reheat(1.0);
    }

    /// Replaces the graph. With `carry_over`, nodes that keep their id keep
    /// their position and pin.
    pub fn rebuild(&mut self, snapshot: GraphSnapshot, carry_over: bool) {
        let previous = std::mem::take(&mut self.snapshot);
        self.install(snapshot, carry_over.then_some(&previous));
    }

    fn install(&mut self, mut snapshot: GraphSnapshot, previous: Option<&GraphSnapshot>) {
        let placed = match previous {
            Some(previous) => carry_over_positions(previous, &mut snapshot),
            None => vec![false; snapshot.nodes.len()],
        };

        let hovered = previous
            .and_then(|previous| self.interaction.hovered().and_then(|index| previous.nodes.get(index)))
            .and_then(|node| snapshot.index_by_id.get(&node.id).copied());
        let selected = previous
            .and_then(|previous| self.interaction.selected().and_then(|index| previous.nodes.get(index)))
            .and_then(|node| snapshot.index_by_id.get(&node.id).copied());
        self.interaction.remap(hovered, selected);

        let center = previous.map_or(self.canvas_size * 0.5, |_| self.simulation.center());
        self.simulation = Simulation::new(&self.config, center);
        self.simulation.seed_positions(&mut snapshot, &placed);
        if !placed.is_empty() && placed.iter().all(|&placed| placed) {
            self.simulation.reheat(0.3);
        }

        self.particles = ParticleField::seed(&snapshot, &self.config, self.config.seed);
        self.clock = SimulationClock::new(self.config.ticks_per_second);

        info!(
            revision = snapshot.revision,
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            particles = self.particles.len(),
            carried = placed.iter().filter(|&&placed| placed).count(),
            "installed network snapshot"
        );
        self.snapshot = snapshot;
    }

    /// Runs one animation frame: simulation ticks first, then particles, then
    /// drawing. Does nothing once the loop has been stopped.
    pub fn frame(&mut self, elapsed_seconds: f64, surface: &mut impl Surface, canvas: Rect) -> FrameOutcome {
        if self.token.is_cancelled() {
            return FrameOutcome::Stopped;
        }

        let mut simulating = false;
        for _ in 0..self.clock.advance(elapsed_seconds) {
            if !self.simulation.tick(&mut self.snapshot) {
                break;
            }
            simulating = true;
        }

        if !self.particles.is_current(&self.snapshot) {
            self.particles = ParticleField::seed(&self.snapshot, &self.config, self.config.seed);
        }
        let frame_scale = (elapsed_seconds as f32 * 60.0).clamp(0.0, MAX_FRAME_SCALE);
        self.particles.advance(frame_scale);

        self.last_stats = render_frame(
            surface,
            &Scene {
                snapshot: &self.snapshot,
                particles: &self.particles,
                viewport: self.viewport,
                canvas,
                hovered: self.interaction.hovered(),
                selected: self.interaction.selected(),
                config: &self.config,
            },
        );

        if simulating || !self.simulation.is_idle() || !self.particles.is_empty() {
            FrameOutcome::Animating
        } else {
            FrameOutcome::Idle
        }
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        let outcome = self.interaction.handle(
            event,
            &mut self.snapshot,
            &mut self.viewport,
            &mut self.simulation,
            &self.config,
        );

        if let Some(selection) = outcome.selection
            && let Some(node) = selection.and_then(|index| self.snapshot.nodes.get(index))
            && let Some(callback) = self.on_node_selected.as_mut()
        {
            callback(node);
        }
        if outcome.view_changed {
            self.notify_view_changed();
        }
    }

    fn notify_view_changed(&mut self) {
        let state = self.viewport.state();
        if let Some(callback) = self.on_view_changed.as_mut() {
            callback(state);
        }
    }

    pub fn select(&mut self, index: Option<usize>) {
        let index = index.filter(|&index| index < self.snapshot.nodes.len());
        self.interaction.select(index);
        if let Some(node) = index.and_then(|index| self.snapshot.nodes.get(index))
            && let Some(callback) = self.on_node_selected.as_mut()
        {
            callback(node);
        }
    }

    pub fn zoom_in(&mut self) {
        let anchor = (self.canvas_size * 0.5).to_pos2();
        if self.viewport.zoom_in(anchor, self.config.zoom_step) {
            self.notify_view_changed();
        }
    }

    pub fn zoom_out(&mut self) {
        let anchor = (self.canvas_size * 0.5).to_pos2();
        if self.viewport.zoom_out(anchor, self.config.zoom_step) {
            self.notify_view_changed();
        }
    }

    /// Zoom 1, centered on the root (or the layout center without one).
    pub fn reset_view(&mut self) {
        let focus = self
            .snapshot
            .root_index
            .and_then(|index| self.snapshot.nodes.get(index))
            .map_or(self.simulation.center(), |node| node.position);
        self.viewport.reset(focus, self.canvas_size);
        self.notify_view_changed();
    }

    pub fn unpin(&mut self, index: usize) {
        if let Some(node) = self.snapshot.nodes.get_mut(index)
            && node.pin.take().is_some()
        {
            self.simulation.reheat(self.simulation.alpha().max(0.3));
        }
    }

    pub fn unpin_all(&mut self) {
        let mut released = 0usize;
        for node in &mut self.snapshot.nodes {
            if node.pin.take().is_some() {
                released += 1;
            }
        }
        if released > 0 {
            self.simulation.reheat(self.simulation.alpha().max(0.3));
        }
    }

    pub fn pinned_count(&self) -> usize {
        self.snapshot.nodes.iter().filter(|node| node.is_pinned()).count()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
