use std::collections::HashMap;

use eframe::egui::{Color32, Vec2};

/// Closed set of node roles. Visual tiering goes through
/// [`super::style::node_style`], never through string tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Staker,
    Company,
    Branch,
    Supplier,
    Approved,
    Pending,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        Self::Root,
        Self::Staker,
        Self::Company,
        Self::Branch,
        Self::Supplier,
        Self::Approved,
        Self::Pending,
    ];

    /// Maps a free-form record tag. Unknown tags are counterparties.
    pub fn from_tag(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return Self::Supplier;
        };

        match tag.trim().to_ascii_lowercase().as_str() {
            "root" | "headquarters" | "hq" => Self::Root,
            "staker" | "vc" | "lp" | "investor" => Self::Staker,
            "company" => Self::Company,
            "branch" | "subsidiary" | "regional" => Self::Branch,
            "approved" => Self::Approved,
            "pending" => Self::Pending,
            _ => Self::Supplier,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Staker => "staker",
            Self::Company => "company",
            Self::Branch => "branch",
            Self::Supplier => "supplier",
            Self::Approved => "approved",
            Self::Pending => "pending",
        }
    }

    pub fn is_counterparty(self) -> bool {
        matches!(self, Self::Supplier | Self::Approved)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Stake,
    Payment,
    SubTransfer,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 3] = [Self::Stake, Self::Payment, Self::SubTransfer];

    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|tag| tag.trim().to_ascii_lowercase()) {
            Some(tag) if tag == "stake" => Self::Stake,
            Some(tag) if tag == "sub-transfer" || tag == "sub_transfer" || tag == "subtransfer" => {
                Self::SubTransfer
            }
            _ => Self::Payment,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Stake => "stake",
            Self::Payment => "payment",
            Self::SubTransfer => "sub-transfer",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub category: Option<String>,
    pub address: Option<String>,
    pub amount: f64,
    pub transaction_count: u32,
    pub level: u32,
    pub radius: f32,
    pub color: Color32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub pin: Option<Vec2>,
}

impl Node {
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub transfer_count: u32,
    pub kind: EdgeKind,
    pub width: f32,
    pub opacity: f32,
}

/// Elements discarded while building a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub unreadable_records: usize,
    pub duplicate_nodes: usize,
    pub dangling_transfers: usize,
    pub self_transfers: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.unreadable_records + self.duplicate_nodes + self.dangling_transfers + self.self_transfers
    }
}

/// One immutable-structure graph. Only node positions, velocities and pins
/// change after construction.
#[derive(Clone, Debug, Default)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub index_by_id: HashMap<String, usize>,
    pub root_index: Option<usize>,
    /// Ascending by amount: the largest discs are drawn last and sit on top.
    pub draw_order: Vec<usize>,
    pub revision: u64,
    pub dropped: DropCounts,
    pub min_edge_value: f64,
    pub max_edge_value: f64,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0usize; self.nodes.len()];
        for edge in &self.edges {
            if edge.source < degrees.len() && edge.target < degrees.len() {
                degrees[edge.source] += 1;
                degrees[edge.target] += 1;
            }
        }
        degrees
    }

    pub fn is_incident(&self, edge: &Edge, node: Option<usize>) -> bool {
        node.is_some_and(|index| edge.source == index || edge.target == index)
    }

    /// Edges touching `index`, largest value first.
    pub fn incident_edges(&self, index: usize) -> Vec<&Edge> {
        let mut edges = self
            .edges
            .iter()
            .filter(|edge| edge.source == index || edge.target == index)
            .collect::<Vec<_>>();
        edges.sort_by(|a, b| b.value.total_cmp(&a.value));
        edges
    }
}
