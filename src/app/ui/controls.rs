use std::ops::RangeInclusive;

use eframe::egui::{self, Color32, Key, Response, Sense, Ui, vec2};

use crate::config::PinRelease;
use crate::dataset::TimeWindow;
use crate::util::format_amount;

use super::super::ViewModel;
use super::super::graph::EdgeKind;
use super::super::graph::style::{edge_color, node_legend};

const ARROW_BASE_RATE: f32 = 10.0;
const ARROW_ACCEL_PER_SEC: f32 = 9.0;
const ARROW_ACCEL_MAX: f32 = 40.0;

#[derive(Clone, Copy, Default)]
struct ArrowHold {
    secs: f32,
    direction: i8,
}

/// Lets a focused slider keep moving while an arrow key is held, faster the
/// longer it is held.
fn nudge_with_arrow_keys(ui: &Ui, response: &Response, value: &mut f32, range: &RangeInclusive<f32>) -> bool {
    let state_id = response.id.with("arrow_hold");
    let mut hold = ui
        .ctx()
        .data(|data| data.get_temp::<ArrowHold>(state_id))
        .unwrap_or_default();

    let (dt, up, down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });
    let direction = if response.has_focus() { up as i8 - down as i8 } else { 0 };

    if direction == 0 || direction != hold.direction {
        hold = ArrowHold { secs: 0.0, direction };
    }
    hold.secs += dt;
    ui.ctx().data_mut(|data| data.insert_temp(state_id, hold));
    if direction == 0 {
        return false;
    }

    let ramp = hold.secs * ARROW_ACCEL_PER_SEC;
    let speed = ARROW_BASE_RATE * (1.0 + ramp + ramp * ramp * 0.15).min(ARROW_ACCEL_MAX);
    let step = ((range.end() - range.start()) / 200.0).max(0.0005);

    let previous = *value;
    *value = (*value + f32::from(direction) * step * speed * dt).clamp(*range.start(), *range.end());
    ui.ctx().request_repaint();
    (*value - previous).abs() > f32::EPSILON
}

fn tuning_slider(ui: &mut Ui, value: &mut f32, range: RangeInclusive<f32>, text: &str, hover: &str) -> bool {
    let response = ui
        .add(
            egui::Slider::new(value, range.clone())
                .text(text)
                .clamping(egui::SliderClamping::Always),
        )
        .on_hover_text(hover);
    if response.hovered() {
        response.request_focus();
    }
    let dragged = response.changed();
    dragged | nudge_with_arrow_keys(ui, &response, value, &range)
}

fn swatch(ui: &mut Ui, color: Color32, round: bool) {
    let (rect, _) = ui.allocate_exact_size(vec2(14.0, 14.0), Sense::hover());
    if round {
        ui.painter().circle_filled(rect.center(), 6.0, color);
    } else {
        ui.painter().line_segment(
            [rect.left_center(), rect.right_center()],
            egui::Stroke::new(3.0, color),
        );
    }
}

fn draw_legend(ui: &mut Ui) {
    ui.collapsing("Legend", |ui| {
        for (color, kinds) in node_legend() {
            let names = kinds.iter().map(|kind| kind.label()).collect::<Vec<_>>().join(" / ");
            ui.horizontal(|ui| {
                swatch(ui, color, true);
                ui.label(names);
            });
        }
        ui.small("Suppliers and approved recipients with a known category take the category color.");
        ui.add_space(4.0);
        for kind in EdgeKind::ALL {
            ui.horizontal(|ui| {
                swatch(ui, edge_color(kind), false);
                ui.label(kind.label());
            });
        }
    });
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            self.draw_filter_controls(ui);
            ui.separator();
            self.draw_view_controls(ui);
            ui.separator();
            self.draw_physics_controls(ui);
            self.draw_particle_controls(ui);
            self.draw_label_controls(ui);
            ui.separator();
            draw_legend(ui);
        });
    }

    fn draw_filter_controls(&mut self, ui: &mut Ui) {
        ui.heading("Filter");

        ui.horizontal(|ui| {
            ui.label("Search");
            ui.text_edit_singleline(&mut self.filter.search)
                .on_hover_text("Fuzzy match on counterparty name, id or category.");
            if !self.filter.search.is_empty() && ui.small_button("x").clicked() {
                self.filter.search.clear();
            }
        });

        egui::ComboBox::from_label("Time range")
            .selected_text(self.filter.window.label())
            .show_ui(ui, |ui| {
                for window in TimeWindow::PRESETS {
                    ui.selectable_value(&mut self.filter.window, window, window.label());
                }
            });

        let max_amount = self
            .dataset
            .transfers
            .iter()
            .map(|transfer| transfer.amount)
            .fold(0.0_f64, f64::max)
            .max(1.0);
        ui.add(
            egui::Slider::new(&mut self.filter.min_amount, 0.0..=max_amount)
                .logarithmic(true)
                .custom_formatter(|value, _| format_amount(value))
                .text("Min transfer"),
        )
        .on_hover_text("Hide transfers smaller than this amount.");

        ui.checkbox(&mut self.carry_over_positions, "Keep layout on filter change")
            .on_hover_text("Nodes that survive a filter change keep their position and pin.");

        if self.filter.is_active() && ui.button("Clear filter").clicked() {
            self.filter = Default::default();
        }
    }

    fn draw_view_controls(&mut self, ui: &mut Ui) {
        ui.heading("View");

        ui.horizontal(|ui| {
            if ui.button("Zoom +").clicked() {
                self.engine.zoom_in();
            }
            if ui.button("Zoom -").clicked() {
                self.engine.zoom_out();
            }
            if ui.button("Reset view").clicked() {
                self.engine.reset_view();
            }
        });

        ui.horizontal(|ui| {
            if ui
                .button("Reheat")
                .on_hover_text("Restart the layout simulation at full energy.")
                .clicked()
            {
                self.engine.reheat();
            }
            let pinned = self.engine.pinned_count();
            if ui
                .add_enabled(pinned > 0, egui::Button::new(format!("Unpin all ({pinned})")))
                .clicked()
            {
                self.engine.unpin_all();
            }
            if self.loop_handle.is_running() {
                if ui.button("Stop animation").clicked() {
                    self.pause();
                }
            } else if ui.button("Resume").clicked() {
                self.resume();
            }
        });

        ui.horizontal(|ui| {
            ui.label("On drag release");
            ui.radio_value(&mut self.config.pin_release, PinRelease::Release, "Release")
                .on_hover_text("Dropped nodes rejoin the simulation.");
            ui.radio_value(&mut self.config.pin_release, PinRelease::Keep, "Keep pinned")
                .on_hover_text("Dropped nodes stay where they were left.");
        });

        ui.checkbox(&mut self.show_fps_bar, "Status readout")
            .on_hover_text("Show FPS and simulation energy in the header.");
    }

    fn draw_physics_controls(&mut self, ui: &mut Ui) {
        ui.collapsing("Physics tuning", |ui| {
            let config = &mut self.config;
            let mut changed = false;
            changed |= tuning_slider(
                ui,
                &mut config.charge_strength,
                0.0..=2_000.0,
                "Charge",
                "How strongly nodes push away from each other.",
            );
            changed |= tuning_slider(
                ui,
                &mut config.link_distance_base,
                20.0..=400.0,
                "Link distance",
                "Rest length of transfer links before level and radius adjustments.",
            );
            changed |= tuning_slider(
                ui,
                &mut config.link_strength,
                0.0..=1.0,
                "Link strength",
                "How strongly linked nodes pull toward their rest length.",
            );
            changed |= tuning_slider(
                ui,
                &mut config.collision_padding,
                0.0..=40.0,
                "Collision padding",
                "Extra gap kept between node discs.",
            );
            changed |= tuning_slider(
                ui,
                &mut config.damping_factor,
                0.05..=0.95,
                "Damping",
                "Fraction of velocity kept after each tick.",
            );
            changed |= tuning_slider(
                ui,
                &mut config.centering_strength,
                0.0..=1.0,
                "Centering",
                "Pull of the whole layout back to the canvas center.",
            );
            if changed {
                self.engine.reheat();
            }
        });
    }

    fn draw_particle_controls(&mut self, ui: &mut Ui) {
        ui.collapsing("Flow particles", |ui| {
            let mut per_unit = (self.config.particle_density_per_value_unit * 1_000_000.0) as f32;
            if tuning_slider(
                ui,
                &mut per_unit,
                0.0..=500.0,
                "Density per 1M",
                "Particles per million units of transfer value.",
            ) {
                self.config.particle_density_per_value_unit = f64::from(per_unit) / 1_000_000.0;
            }

            let mut max_per_edge = self.config.max_particles_per_edge as f32;
            if tuning_slider(
                ui,
                &mut max_per_edge,
                1.0..=32.0,
                "Max per edge",
                "Upper bound on particles travelling along one transfer link.",
            ) {
                self.config.max_particles_per_edge = max_per_edge.round() as usize;
            }
        });
    }

    fn draw_label_controls(&mut self, ui: &mut Ui) {
        ui.collapsing("Nodes and labels", |ui| {
            ui.checkbox(&mut self.config.node_glow, "Node glow");
            tuning_slider(
                ui,
                &mut self.config.label_min_radius,
                0.0..=60.0,
                "Label radius",
                "Nodes at least this large always show their label.",
            );
            tuning_slider(
                ui,
                &mut self.config.label_min_zoom,
                0.1..=4.0,
                "Label zoom",
                "Above this zoom every node shows its label.",
            );
        });
    }
}
