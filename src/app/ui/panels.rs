use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

use eframe::egui::{self, Align, Context, Layout, vec2};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dataset::{Dataset, DatasetFilter};
use crate::util::format_amount;

use super::super::ViewModel;
use super::super::engine::Engine;
use super::super::graph::{build_snapshot, draw_graph};

const RECENT_SELECTION_LIMIT: usize = 6;
const INITIAL_CANVAS_SIZE: [f32; 2] = [1000.0, 700.0];

impl ViewModel {
    pub(in crate::app) fn new(dataset: Dataset, config: EngineConfig) -> Self {
        let filter = DatasetFilter::default();
        let revision = 1;
        let snapshot = build_snapshot(&filter.apply(&dataset), revision);
        let mut engine = Engine::new(snapshot, config, vec2(INITIAL_CANVAS_SIZE[0], INITIAL_CANVAS_SIZE[1]));

        let view_state = Rc::new(Cell::new(engine.viewport().state()));
        let recent_selections = Rc::new(RefCell::new(VecDeque::new()));

        let view_sink = Rc::clone(&view_state);
        engine.on_view_changed(move |state| view_sink.set(state));

        let selection_sink = Rc::clone(&recent_selections);
        engine.on_node_selected(move |node| {
            debug!(id = %node.id, kind = node.kind.label(), "node selected");
            let mut recent = selection_sink.borrow_mut();
            recent.retain(|id: &String| id != &node.id);
            recent.push_front(node.id.clone());
            recent.truncate(RECENT_SELECTION_LIMIT);
        });

        let loop_handle = engine.start();
        let config = engine.config().clone();

        Self {
            dataset,
            applied_filter: filter.clone(),
            filter,
            config,
            engine,
            loop_handle,
            revision,
            carry_over_positions: true,
            needs_view_reset: true,
            view_state,
            recent_selections,
            show_fps_bar: true,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        dataset_path: &Path,
        reload_requested: &mut bool,
        is_reloading: bool,
    ) {
        self.update_fps_counter(ctx);
        if self.filter != self.applied_filter {
            self.refresh_graph();
        }
        self.engine.set_config(self.config.clone());

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("payflow-network");
                    ui.separator();
                    if let Some(root) = &self.dataset.root {
                        ui.label(format!("root: {}", root.display_name()));
                    }
                    ui.label(format!("dataset: {}", dataset_path.display()));
                    ui.label(format!("volume: {}", format_amount(self.dataset.total_volume())));
                    let reload_button = ui.add_enabled(!is_reloading, egui::Button::new("Reload dataset"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    if is_reloading {
                        ui.spinner();
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.graph_summary_text());
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                if self.engine.snapshot().is_empty() {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("No counterparties match the current filter");
                    });
                    return;
                }

                if !self.engine.is_running() {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Animation stopped");
                        ui.add_space(8.0);
                        if ui.button("Resume").clicked() {
                            self.resume();
                        }
                    });
                    return;
                }

                draw_graph(ui, &mut self.engine);
                if self.needs_view_reset {
                    self.needs_view_reset = false;
                    self.engine.reset_view();
                    ctx.request_repaint();
                }
            });
    }

    /// Rebuilds the engine's snapshot from the dataset under the current
    /// filter.
    pub(in crate::app) fn refresh_graph(&mut self) {
        self.revision += 1;
        let filtered = self.filter.apply(&self.dataset);
        let snapshot = build_snapshot(&filtered, self.revision);
        self.engine.rebuild(snapshot, self.carry_over_positions);
        self.applied_filter = self.filter.clone();
    }

    pub(in crate::app) fn replace_dataset(&mut self, dataset: Dataset) {
        self.dataset = dataset;
        self.refresh_graph();
    }

    pub(in crate::app) fn pause(&mut self) {
        self.loop_handle.stop();
    }

    pub(in crate::app) fn resume(&mut self) {
        self.loop_handle = self.engine.start();
    }

    pub(in crate::app) fn select_by_id(&mut self, id: &str) {
        let index = self.engine.snapshot().index_by_id.get(id).copied();
        self.engine.select(index);
    }

    fn graph_summary_text(&self) -> String {
        let snapshot = self.engine.snapshot();
        let dropped = snapshot.dropped.total();
        let zoom = self.view_state.get().zoom;
        if dropped > 0 {
            format!(
                "{} nodes / {} edges ({dropped} dropped) | zoom {:.0}%",
                snapshot.nodes.len(),
                snapshot.edges.len(),
                zoom * 100.0
            )
        } else {
            format!(
                "{} nodes / {} edges | zoom {:.0}%",
                snapshot.nodes.len(),
                snapshot.edges.len(),
                zoom * 100.0
            )
        }
    }
}
