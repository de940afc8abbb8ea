use eframe::egui::{
    Align2, Color32, FontId, Mesh, Painter, Pos2, Rect, Shape, Stroke, Vec2, pos2, vec2,
};

use super::Surface;
use crate::app::graph::Viewport;

const BACKGROUND: Color32 = Color32::from_rgb(15, 18, 28);
const GRID_LINE: Color32 = Color32::from_rgba_premultiplied(40, 48, 64, 70);
const GLOW_SEGMENTS: usize = 32;

/// [`Surface`] over an egui painter clipped to the graph canvas.
pub struct PainterSurface<'a> {
    painter: &'a Painter,
    rect: Rect,
    transforms: Vec<Viewport>,
}

impl<'a> PainterSurface<'a> {
    pub fn new(painter: &'a Painter, rect: Rect) -> Self {
        Self {
            painter,
            rect,
            transforms: Vec::new(),
        }
    }

    fn zoom(&self) -> f32 {
        self.transforms.last().map_or(1.0, |viewport| viewport.zoom)
    }

    fn to_screen(&self, graph: Vec2) -> Pos2 {
        let local = match self.transforms.last() {
            Some(viewport) => viewport.to_device(graph),
            None => graph.to_pos2(),
        };
        self.rect.min + local.to_vec2()
    }
}

impl Surface for PainterSurface<'_> {
    fn fill_background(&mut self, viewport: &Viewport) {
        self.painter.rect_filled(self.rect, 0.0, BACKGROUND);

        let step = (56.0 * viewport.zoom.clamp(0.6, 1.8)).max(20.0);
        let origin = self.rect.min + viewport.pan;
        let stroke = Stroke::new(1.0, GRID_LINE);

        let mut x = self.rect.left() + (origin.x - self.rect.left()).rem_euclid(step);
        while x < self.rect.right() {
            self.painter
                .line_segment([pos2(x, self.rect.top()), pos2(x, self.rect.bottom())], stroke);
            x += step;
        }

        let mut y = self.rect.top() + (origin.y - self.rect.top()).rem_euclid(step);
        while y < self.rect.bottom() {
            self.painter
                .line_segment([pos2(self.rect.left(), y), pos2(self.rect.right(), y)], stroke);
            y += step;
        }
    }

    fn push_transform(&mut self, viewport: Viewport) {
        self.transforms.push(viewport);
    }

    fn pop_transform(&mut self) {
        self.transforms.pop();
    }

    fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color32) {
        let width = (width * self.zoom()).max(0.5);
        self.painter
            .line_segment([self.to_screen(from), self.to_screen(to)], Stroke::new(width, color));
    }

    fn disc(&mut self, center: Vec2, radius: f32, color: Color32) {
        self.painter
            .circle_filled(self.to_screen(center), (radius * self.zoom()).max(1.0), color);
    }

    fn glow(&mut self, center: Vec2, radius: f32, color: Color32) {
        let center = self.to_screen(center);
        let radius = radius * self.zoom();
        if radius < 1.0 {
            return;
        }

        let mut mesh = Mesh::default();
        mesh.colored_vertex(center, color);
        for segment in 0..GLOW_SEGMENTS {
            let angle = segment as f32 / GLOW_SEGMENTS as f32 * std::f32::consts::TAU;
            mesh.colored_vertex(center + vec2(angle.cos(), angle.sin()) * radius, Color32::TRANSPARENT);
        }
        for segment in 0..GLOW_SEGMENTS as u32 {
            let next = (segment + 1) % GLOW_SEGMENTS as u32;
            mesh.add_triangle(0, segment + 1, next + 1);
        }
        self.painter.add(Shape::mesh(mesh));
    }

    fn ring(&mut self, center: Vec2, radius: f32, width: f32, color: Color32) {
        self.painter.circle_stroke(
            self.to_screen(center),
            radius * self.zoom(),
            Stroke::new(width, color),
        );
    }

    fn text(&mut self, center: Vec2, radius: f32, text: &str, color: Color32) {
        let anchor = self.to_screen(center) + vec2(radius * self.zoom() + 5.0, 0.0);
        self.painter
            .text(anchor, Align2::LEFT_CENTER, text, FontId::proportional(12.0), color);
    }
}
