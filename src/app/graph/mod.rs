mod build;
pub mod interaction;
mod model;
pub mod style;
mod view;

pub use build::{build_snapshot, carry_over_positions};
pub use interaction::{InteractionState, PointerEvent, ViewState, Viewport};
pub use model::{EdgeKind, GraphSnapshot, Node};
pub use view::draw_graph;
