use eframe::egui::{Pos2, Rect};

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let padded = rect.expand(padding);
    let bounds = Rect::from_two_pos(start, end);
    if !padded.intersects(bounds) {
        return false;
    }

    if padded.contains(start) || padded.contains(end) {
        return true;
    }

    let corners = [
        padded.left_top(),
        padded.right_top(),
        padded.right_bottom(),
        padded.left_bottom(),
    ];
    (0..4).any(|side| segments_intersect(start, end, corners[side], corners[(side + 1) % 4]))
}

fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    let c1 = cross(a1, a2, b1);
    let c2 = cross(a1, a2, b2);
    let c3 = cross(b1, b2, a1);
    let c4 = cross(b1, b2, a2);

    (c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0)
        && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}
