use std::collections::{HashMap, VecDeque};

use eframe::egui::Vec2;
use tracing::{debug, warn};

use crate::dataset::{Dataset, EntityRecord};

use super::model::{DropCounts, Edge, EdgeKind, GraphSnapshot, Node, NodeKind};
use super::style::{edge_opacity, edge_width, node_color, node_radius};

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn make_node(record: &EntityRecord, kind: NodeKind) -> Node {
    Node {
        id: record.id.trim().to_owned(),
        label: record.display_name().trim().to_owned(),
        kind,
        category: non_empty(record.category.as_deref()),
        address: non_empty(record.address.as_deref()),
        amount: finite_or_zero(record.amount),
        transaction_count: 0,
        level: 0,
        radius: 0.0,
        color: node_color(kind, None),
        position: Vec2::ZERO,
        velocity: Vec2::ZERO,
        pin: None,
    }
}

/// Keeps the first record for an id. Later duplicates only fill in a missing
/// name or category.
fn merge_duplicate(node: &mut Node, record: &EntityRecord) {
    if node.label.is_empty() || node.label == node.id {
        let label = record.display_name().trim();
        if !label.is_empty() {
            node.label = label.to_owned();
        }
    }
    if node.category.is_none() {
        node.category = non_empty(record.category.as_deref());
    }
}

struct NodeTable {
    nodes: Vec<Node>,
    index_by_id: HashMap<String, usize>,
    duplicates: usize,
    unreadable: usize,
}

impl NodeTable {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index_by_id: HashMap::new(),
            duplicates: 0,
            unreadable: 0,
        }
    }

    fn insert(&mut self, record: &EntityRecord, kind: NodeKind) -> Option<usize> {
        let id = record.id.trim();
        if id.is_empty() {
            self.unreadable += 1;
            return None;
        }

        if let Some(&index) = self.index_by_id.get(id) {
            self.duplicates += 1;
            merge_duplicate(&mut self.nodes[index], record);
            return Some(index);
        }

        let index = self.nodes.len();
        self.nodes.push(make_node(record, kind));
        self.index_by_id.insert(id.to_owned(), index);
        Some(index)
    }
}

/// Graph distance from the nearest root over undirected edges. The dataset's
/// root counts whatever its kind, alongside every `Root`-kind node. Nodes no
/// root can reach sit one tier past the deepest reachable node.
fn assign_levels(nodes: &mut [Node], edges: &[Edge], root_index: Option<usize>) {
    let mut adjacency = vec![Vec::new(); nodes.len()];
    for edge in edges {
        adjacency[edge.source].push(edge.target);
        adjacency[edge.target].push(edge.source);
    }

    let mut levels = vec![None; nodes.len()];
    let mut queue = VecDeque::new();
    for (index, node) in nodes.iter().enumerate() {
        if node.kind == NodeKind::Root || root_index == Some(index) {
            levels[index] = Some(0u32);
            queue.push_back(index);
        }
    }

    while let Some(index) = queue.pop_front() {
        let next_level = levels[index].unwrap_or(0) + 1;
        for &neighbor in &adjacency[index] {
            if levels[neighbor].is_none() {
                levels[neighbor] = Some(next_level);
                queue.push_back(neighbor);
            }
        }
    }

    let unreachable_level = levels.iter().flatten().copied().max().map_or(0, |max| max + 1);
    for (node, level) in nodes.iter_mut().zip(levels) {
        node.level = level.unwrap_or(unreachable_level);
    }
}

/// Builds a fresh snapshot from `dataset`. Never fails: malformed records are
/// dropped and counted in [`GraphSnapshot::dropped`].
pub fn build_snapshot(dataset: &Dataset, revision: u64) -> GraphSnapshot {
    let mut table = NodeTable::new();

    let root_index = dataset.root.as_ref().and_then(|root| {
        let kind = match NodeKind::from_tag(root.kind.as_deref()) {
            NodeKind::Supplier | NodeKind::Approved | NodeKind::Pending => NodeKind::Root,
            kind => kind,
        };
        table.insert(root, kind)
    });
    for record in &dataset.counterparties {
        table.insert(record, NodeKind::from_tag(record.kind.as_deref()));
    }

    let NodeTable {
        mut nodes,
        index_by_id,
        duplicates,
        unreadable,
    } = table;

    let mut dropped = DropCounts {
        unreadable_records: dataset.unreadable_records + unreadable,
        duplicate_nodes: duplicates,
        ..DropCounts::default()
    };

    let mut edges: Vec<Edge> = Vec::new();
    let mut edge_by_pair = HashMap::<(usize, usize), usize>::new();
    let mut inflow = vec![0.0f64; nodes.len()];
    let mut outflow = vec![0.0f64; nodes.len()];

    for transfer in &dataset.transfers {
        let (Some(&source), Some(&target)) = (
            index_by_id.get(transfer.from.trim()),
            index_by_id.get(transfer.to.trim()),
        ) else {
            dropped.dangling_transfers += 1;
            continue;
        };
        if source == target {
            dropped.self_transfers += 1;
            continue;
        }
        if !transfer.amount.is_finite() {
            dropped.unreadable_records += 1;
            continue;
        }

        let amount = transfer.amount.max(0.0);
        outflow[source] += amount;
        inflow[target] += amount;
        nodes[source].transaction_count += 1;
        nodes[target].transaction_count += 1;

        match edge_by_pair.get(&(source, target)) {
            Some(&edge_index) => {
                let edge = &mut edges[edge_index];
                edge.value += amount;
                edge.transfer_count += 1;
            }
            None => {
                edge_by_pair.insert((source, target), edges.len());
                edges.push(Edge {
                    source,
                    target,
                    value: amount,
                    transfer_count: 1,
                    kind: EdgeKind::from_tag(transfer.kind.as_deref()),
                    width: 0.0,
                    opacity: 0.0,
                });
            }
        }
    }

    let mut min_edge_value = f64::INFINITY;
    let mut max_edge_value = 0.0f64;
    for edge in &mut edges {
        edge.width = edge_width(edge.value);
        edge.opacity = edge_opacity(edge.value);
        min_edge_value = min_edge_value.min(edge.value);
        max_edge_value = max_edge_value.max(edge.value);
    }
    if !min_edge_value.is_finite() {
        min_edge_value = 0.0;
    }

    for (index, node) in nodes.iter_mut().enumerate() {
        node.amount = node.amount.max(inflow[index]).max(outflow[index]);
        node.radius = node_radius(node.kind, node.amount);
        node.color = node_color(node.kind, node.category.as_deref());
    }
    assign_levels(&mut nodes, &edges, root_index);

    let mut draw_order = (0..nodes.len()).collect::<Vec<_>>();
    draw_order.sort_by(|&a, &b| nodes[a].amount.total_cmp(&nodes[b].amount));

    if dropped.total() > 0 {
        warn!(
            unreadable = dropped.unreadable_records,
            duplicates = dropped.duplicate_nodes,
            dangling = dropped.dangling_transfers,
            self_transfers = dropped.self_transfers,
            "dropped malformed dataset elements"
        );
    }
    debug!(revision, nodes = nodes.len(), edges = edges.len(), "built graph snapshot");

    GraphSnapshot {
        nodes,
        edges,
        index_by_id,
        root_index,
        draw_order,
        revision,
        dropped,
        min_edge_value,
        max_edge_value,
    }
}

/// Copies positions and pins from `previous` into `next` for nodes that keep
/// their id. Returns a mask of the nodes that received a finite position;
/// everything else still needs seeding.
pub fn carry_over_positions(previous: &GraphSnapshot, next: &mut GraphSnapshot) -> Vec<bool> {
    let mut placed = vec![false; next.nodes.len()];
    for (index, node) in next.nodes.iter_mut().enumerate() {
        let Some(prior) = previous.node(&node.id) else {
            continue;
        };
        if !(prior.position.x.is_finite() && prior.position.y.is_finite()) {
            continue;
        }

        node.position = prior.position;
        node.pin = prior
            .pin
            .filter(|pin| pin.x.is_finite() && pin.y.is_finite());
        placed[index] = true;
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::graph::style::FALLBACK_CATEGORY_COLOR;
    use crate::dataset::TransferRecord;
    use eframe::egui::vec2;

    fn entity(id: &str, name: &str, category: Option<&str>) -> EntityRecord {
        EntityRecord {
            id: id.to_owned(),
            name: name.to_owned(),
            category: category.map(str::to_owned),
            ..Default::default()
        }
    }

    fn transfer(from: &str, to: &str, amount: f64) -> TransferRecord {
        TransferRecord {
            from: from.to_owned(),
            to: to.to_owned(),
            amount,
            timestamp_ms: 1,
            kind: None,
        }
    }

    fn dataset(counterparties: Vec<EntityRecord>, transfers: Vec<TransferRecord>) -> Dataset {
        Dataset {
            root: Some(entity("hq", "Headquarters", None)),
            counterparties,
            transfers,
            unreadable_records: 0,
        }
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let snapshot = build_snapshot(&Dataset::default(), 1);
        assert!(snapshot.is_empty());
        assert!(snapshot.edges.is_empty());
        assert_eq!(snapshot.root_index, None);
        assert_eq!(snapshot.dropped.total(), 0);
    }

    #[test]
    fn duplicate_counterparties_keep_first_record() {
        let snapshot = build_snapshot(
            &dataset(
                vec![
                    entity("s1", "First Name", None),
                    entity("s1", "Second Name", Some("Legal")),
                ],
                Vec::new(),
            ),
            1,
        );

        assert_eq!(snapshot.nodes.len(), 2);
        let node = snapshot.node("s1").expect("s1 exists");
        assert_eq!(node.label, "First Name");
        assert_eq!(node.category.as_deref(), Some("Legal"));
        assert_eq!(snapshot.dropped.duplicate_nodes, 1);
    }

    #[test]
    fn transfers_between_a_pair_aggregate_into_one_edge() {
        let snapshot = build_snapshot(
            &dataset(
                vec![entity("s1", "Supplier", None)],
                vec![
                    transfer("hq", "s1", 100.0),
                    transfer("hq", "s1", 250.0),
                    transfer("hq", "s1", 50.0),
                ],
            ),
            1,
        );

        assert_eq!(snapshot.edges.len(), 1);
        let edge = &snapshot.edges[0];
        assert_eq!(edge.value, 400.0);
        assert_eq!(edge.transfer_count, 3);

        let supplier = snapshot.node("s1").expect("s1 exists");
        assert_eq!(supplier.amount, 400.0);
        assert_eq!(supplier.transaction_count, 3);
    }

    #[test]
    fn dangling_and_self_transfers_are_dropped() {
        let snapshot = build_snapshot(
            &dataset(
                vec![entity("s1", "Supplier", None)],
                vec![
                    transfer("hq", "s1", 10.0),
                    transfer("hq", "ghost", 10.0),
                    transfer("s1", "s1", 10.0),
                ],
            ),
            1,
        );

        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.dropped.dangling_transfers, 1);
        assert_eq!(snapshot.dropped.self_transfers, 1);
        for edge in &snapshot.edges {
            assert!(edge.source < snapshot.nodes.len());
            assert!(edge.target < snapshot.nodes.len());
        }
    }

    #[test]
    fn unknown_category_gets_fallback_color() {
        let snapshot = build_snapshot(
            &dataset(vec![entity("s1", "Odd", Some("Space Mining"))], Vec::new()),
            1,
        );
        assert_eq!(snapshot.node("s1").map(|node| node.color), Some(FALLBACK_CATEGORY_COLOR));
    }

    #[test]
    fn levels_follow_distance_from_root() {
        let snapshot = build_snapshot(
            &dataset(
                vec![
                    entity("a", "A", None),
                    entity("b", "B", None),
                    entity("island", "Island", None),
                ],
                vec![transfer("hq", "a", 10.0), transfer("a", "b", 5.0)],
            ),
            1,
        );

        let level = |id: &str| snapshot.node(id).map(|node| node.level);
        assert_eq!(level("hq"), Some(0));
        assert_eq!(level("a"), Some(1));
        assert_eq!(level("b"), Some(2));
        assert_eq!(level("island"), Some(3));
    }

    #[test]
    fn company_and_staker_roots_still_anchor_levels() {
        for tag in ["company", "staker"] {
            let mut data = dataset(
                vec![entity("a", "A", None), entity("b", "B", None)],
                vec![transfer("hq", "a", 10.0), transfer("a", "b", 5.0)],
            );
            if let Some(root) = data.root.as_mut() {
                root.kind = Some(tag.to_owned());
            }

            let snapshot = build_snapshot(&data, 1);
            let root = snapshot.root_index.expect("root kept");
            assert_ne!(snapshot.nodes[root].kind, NodeKind::Root, "{tag} keeps its kind");

            let levels: Vec<u32> = ["hq", "a", "b"]
                .iter()
                .filter_map(|id| snapshot.node(id).map(|node| node.level))
                .collect();
            assert_eq!(levels, vec![0, 1, 2], "{tag} root");
        }
    }

    #[test]
    fn draw_order_puts_largest_last() {
        let snapshot = build_snapshot(
            &dataset(
                vec![entity("small", "Small", None), entity("big", "Big", None)],
                vec![transfer("hq", "small", 10.0), transfer("hq", "big", 1_000.0)],
            ),
            1,
        );

        let last = *snapshot.draw_order.last().expect("non-empty order");
        assert_eq!(snapshot.nodes[last].id, "hq");
        let first = snapshot.draw_order[0];
        assert_eq!(snapshot.nodes[first].id, "small");
    }

    #[test]
    fn carry_over_copies_finite_positions_by_id() {
        let data = dataset(
            vec![entity("s1", "One", None), entity("s2", "Two", None)],
            vec![transfer("hq", "s1", 10.0)],
        );
        let mut previous = build_snapshot(&data, 1);
        let s1 = previous.index_by_id["s1"];
        let s2 = previous.index_by_id["s2"];
        previous.nodes[s1].position = vec2(40.0, -12.0);
        previous.nodes[s2].position = vec2(f32::NAN, 3.0);

        let mut next = build_snapshot(&data, 2);
        let placed = carry_over_positions(&previous, &mut next);

        assert!(placed[next.index_by_id["s1"]]);
        assert!(!placed[next.index_by_id["s2"]]);
        assert_eq!(next.node("s1").map(|node| node.position), Some(vec2(40.0, -12.0)));
    }
}
