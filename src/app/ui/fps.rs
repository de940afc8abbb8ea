use eframe::egui::Context;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn update_fps_counter(&mut self, ctx: &Context) {
        const FPS_SAMPLE_WINDOW: usize = 180;

        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    pub(in crate::app) fn fps_display_text(&self) -> Option<String> {
        if !self.show_fps_bar {
            return None;
        }

        let mut parts = vec![format!("FPS {:.0}", self.fps_current)];
        if !self.fps_samples.is_empty() {
            let avg = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
            parts.push(format!("avg {avg:.1}"));
        }

        let simulation = self.engine.simulation();
        if simulation.alpha_target() > 0.0 {
            parts.push(format!("alpha {:.3} -> {:.2}", simulation.alpha(), simulation.alpha_target()));
        } else {
            parts.push(format!("alpha {:.3}", simulation.alpha()));
        }
        parts.push(format!("ticks {}", simulation.ticks()));
        parts.push(format!("energy {:.1}", self.engine.kinetic_energy()));
        parts.push(format!("particles {}", self.engine.particle_count()));

        let stats = self.engine.last_stats();
        parts.push(format!("drawn {}n/{}e", stats.nodes, stats.edges));

        Some(parts.join(" | "))
    }
}
