use eframe::egui::Color32;

use super::model::{EdgeKind, NodeKind};

pub const FALLBACK_CATEGORY_COLOR: Color32 = rgb(0x6b7280);

const EDGE_WIDTH_MIN: f32 = 0.75;
const EDGE_WIDTH_MAX: f32 = 6.0;
const EDGE_OPACITY_MIN: f32 = 0.2;
const EDGE_OPACITY_MAX: f32 = 0.85;

const fn rgb(hex: u32) -> Color32 {
    Color32::from_rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeStyle {
    pub color: Color32,
    pub radius_min: f32,
    pub radius_max: f32,
    pub radius_gain: f32,
    /// Multiplier on the global charge; hubs push their neighbourhood wider.
    pub charge_weight: f32,
}

pub fn node_style(kind: NodeKind) -> NodeStyle {
    match kind {
        NodeKind::Root => NodeStyle {
            color: rgb(0x6366f1),
            radius_min: 22.0,
            radius_max: 40.0,
            radius_gain: 6.0,
            charge_weight: 3.0,
        },
        NodeKind::Staker => NodeStyle {
            color: rgb(0x3b82f6),
            radius_min: 20.0,
            radius_max: 36.0,
            radius_gain: 6.0,
            charge_weight: 2.5,
        },
        NodeKind::Company => NodeStyle {
            color: rgb(0x8b5cf6),
            radius_min: 16.0,
            radius_max: 32.0,
            radius_gain: 5.0,
            charge_weight: 2.0,
        },
        NodeKind::Branch => NodeStyle {
            color: rgb(0xa78bfa),
            radius_min: 12.0,
            radius_max: 26.0,
            radius_gain: 5.0,
            charge_weight: 1.4,
        },
        NodeKind::Supplier | NodeKind::Approved => NodeStyle {
            color: rgb(0x10b981),
            radius_min: 8.0,
            radius_max: 25.0,
            radius_gain: 5.0,
            charge_weight: 1.0,
        },
        NodeKind::Pending => NodeStyle {
            color: rgb(0xf59e0b),
            radius_min: 6.0,
            radius_max: 12.0,
            radius_gain: 3.0,
            charge_weight: 0.8,
        },
    }
}

pub fn category_color(category: &str) -> Option<Color32> {
    let color = match category.trim() {
        "Technology" | "Technology Vendor" => rgb(0x3b82f6),
        "Marketing" => rgb(0xef4444),
        "Cloud Services" => rgb(0x8b5cf6),
        "Logistics" => rgb(0xf59e0b),
        "Design" => rgb(0xec4899),
        "Consulting" => rgb(0x10b981),
        "Manufacturing" => rgb(0x06b6d4),
        "Professional Services" => rgb(0x84cc16),
        "Legal" => rgb(0xf97316),
        "Finance" => rgb(0xa855f7),
        "Infrastructure" => rgb(0x0ea5e9),
        "Supplies" => rgb(0xeab308),
        _ => return None,
    };
    Some(color)
}

/// Counterparties take their category color, with a fixed grey for unknown
/// categories. Everything else is colored by kind.
pub fn node_color(kind: NodeKind, category: Option<&str>) -> Color32 {
    match (kind.is_counterparty(), category) {
        (true, Some(category)) => category_color(category).unwrap_or(FALLBACK_CATEGORY_COLOR),
        _ => node_style(kind).color,
    }
}

pub fn edge_color(kind: EdgeKind) -> Color32 {
    match kind {
        EdgeKind::Stake => rgb(0x3b82f6),
        EdgeKind::Payment => rgb(0x22d3ee),
        EdgeKind::SubTransfer => rgb(0xa78bfa),
    }
}

/// One swatch per distinct kind color, in `NodeKind::ALL` order. Kinds that
/// share a color share a swatch.
pub fn node_legend() -> Vec<(Color32, Vec<NodeKind>)> {
    let mut entries: Vec<(Color32, Vec<NodeKind>)> = Vec::new();
    for kind in NodeKind::ALL {
        let color = node_style(kind).color;
        match entries.iter_mut().find(|(existing, _)| *existing == color) {
            Some((_, kinds)) => kinds.push(kind),
            None => entries.push((color, vec![kind])),
        }
    }
    entries
}

pub fn particle_color(kind: EdgeKind) -> Color32 {
    match kind {
        EdgeKind::Stake => rgb(0x60a5fa),
        EdgeKind::Payment => rgb(0xfbbf24),
        EdgeKind::SubTransfer => rgb(0xf0abfc),
    }
}

fn log_magnitude(amount: f64) -> Option<f32> {
    (amount.is_finite() && amount > 0.0).then(|| (amount + 1.0).log10() as f32)
}

pub fn node_radius(kind: NodeKind, amount: f64) -> f32 {
    let style = node_style(kind);
    match log_magnitude(amount) {
        Some(magnitude) => (magnitude * style.radius_gain).clamp(style.radius_min, style.radius_max),
        None => style.radius_min,
    }
}

pub fn edge_width(value: f64) -> f32 {
    log_magnitude(value)
        .map(|magnitude| magnitude * 0.9)
        .unwrap_or(0.0)
        .clamp(EDGE_WIDTH_MIN, EDGE_WIDTH_MAX)
}

pub fn edge_opacity(value: f64) -> f32 {
    log_magnitude(value)
        .map(|magnitude| 0.15 + magnitude * 0.1)
        .unwrap_or(0.0)
        .clamp(EDGE_OPACITY_MIN, EDGE_OPACITY_MAX)
}

/// Position of `value` between `min` and `max` on a log scale, in `[0, 1]`.
pub fn normalize_log(value: f64, min: f64, max: f64) -> f32 {
    let min = min.max(1.0);
    let max = max.max(min);
    let value = if value.is_finite() { value.max(1.0) } else { min };

    let denominator = max.ln() - min.ln();
    if denominator.abs() < f64::EPSILON {
        return 0.5;
    }

    ((value.ln() - min.ln()) / denominator).clamp(0.0, 1.0) as f32
}

pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    let opacity = opacity.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), (color.a() as f32 * opacity) as u8)
}

pub fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}
