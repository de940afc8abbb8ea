use eframe::egui::{self, Align2, Color32, FontId, PointerButton, Response, Sense, Ui, vec2};

use crate::util::format_amount;

use super::super::engine::{Engine, FrameOutcome};
use super::super::render::PainterSurface;
use super::interaction::PointerEvent;

/// Allocates the graph canvas, feeds this frame's pointer input to the
/// engine, then lets the engine simulate and draw.
pub fn draw_graph(ui: &mut Ui, engine: &mut Engine) -> Response {
    let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
    engine.set_canvas_size(rect.size());
    let local = |position: egui::Pos2| (position - rect.min).to_pos2();

    if let Some(pointer) = response.hover_pos() {
        engine.handle_pointer(PointerEvent::Moved(local(pointer)));

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() > f32::EPSILON {
            engine.handle_pointer(PointerEvent::Scrolled {
                anchor: local(pointer),
                delta: scroll,
            });
        }
    } else if !response.dragged() {
        engine.handle_pointer(PointerEvent::Left);
    }

    if response.drag_started_by(PointerButton::Primary)
        && let Some(pointer) = response.interact_pointer_pos()
    {
        let origin = ui
            .input(|input| input.pointer.press_origin())
            .unwrap_or(pointer);
        engine.handle_pointer(PointerEvent::Pressed(local(origin)));
    }
    if response.dragged_by(PointerButton::Primary)
        && let Some(pointer) = response.interact_pointer_pos()
    {
        engine.handle_pointer(PointerEvent::Dragged {
            position: local(pointer),
            delta: response.drag_delta(),
        });
    }
    if response.drag_stopped_by(PointerButton::Primary) {
        engine.handle_pointer(PointerEvent::Released);
    }
    if response.clicked_by(PointerButton::Primary)
        && let Some(pointer) = response.interact_pointer_pos()
    {
        engine.handle_pointer(PointerEvent::Clicked(local(pointer)));
    }

    let elapsed = f64::from(ui.input(|input| input.stable_dt).clamp(0.0, 0.25));
    let painter = ui.painter_at(rect);
    let mut surface = PainterSurface::new(&painter, rect);
    let outcome = engine.frame(elapsed, &mut surface, rect.translate(-rect.min.to_vec2()));

    if engine.dragged_node().is_some() {
        ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::Grabbing);
    } else if engine.is_dragging() {
        ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::Move);
    } else if engine.hovered_node().is_some() {
        ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
    }

    if let Some(node) = engine.dragged_node().or_else(|| engine.hovered_node()) {
        let text = format!(
            "{}  |  {}  |  {} transfers",
            node.label,
            format_amount(node.amount),
            node.transaction_count
        );
        painter.text(
            rect.left_top() + vec2(10.0, 10.0),
            Align2::LEFT_TOP,
            text,
            FontId::proportional(13.0),
            Color32::from_gray(240),
        );
    }

    if outcome == FrameOutcome::Animating {
        ui.ctx().request_repaint();
    }

    response
}
