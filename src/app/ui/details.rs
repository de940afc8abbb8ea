use eframe::egui::{self, RichText, Ui};

use crate::util::{format_amount, format_timestamp, short_address};

use super::super::ViewModel;

const RECENT_TRANSFER_ROWS: usize = 12;

struct LinkRow {
    counterparty: String,
    label: String,
    outgoing: bool,
    value: f64,
    transfers: u32,
    kind: &'static str,
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let mut select_request: Option<String> = None;
        self.draw_selected_node(ui, &mut select_request);
        self.draw_recent_selections(ui, &mut select_request);

        if let Some(id) = select_request {
            self.select_by_id(&id);
        }
    }

    fn draw_selected_node(&mut self, ui: &mut Ui, select_request: &mut Option<String>) {
        let snapshot = self.engine.snapshot();
        let Some(node) = self.engine.selected_node() else {
            ui.label("Click a node on the canvas to inspect it.");
            return;
        };
        let Some(index) = snapshot.index_by_id.get(&node.id).copied() else {
            return;
        };

        let node_id = node.id.clone();
        let is_pinned = node.is_pinned();

        ui.label(RichText::new(node.label.as_str()).strong().color(node.color));
        ui.small(node_id.as_str());
        ui.add_space(6.0);

        ui.label(format!("Kind: {}", node.kind.label()));
        if let Some(category) = &node.category {
            ui.label(format!("Category: {category}"));
        }
        if let Some(address) = &node.address {
            ui.label(format!("Address: {}", short_address(address)))
                .on_hover_text(address.as_str());
        }
        ui.label(format!("Amount: {}", format_amount(node.amount)));
        ui.label(format!("Transactions: {}", node.transaction_count));
        ui.label(format!("Level: {}", node.level));

        let mut unpin = false;
        ui.horizontal(|ui| {
            if is_pinned {
                ui.label("Pinned");
                unpin = ui.button("Unpin").clicked();
            } else {
                ui.label("Free");
            }
        });

        let links: Vec<LinkRow> = snapshot
            .incident_edges(index)
            .into_iter()
            .filter_map(|edge| {
                let outgoing = edge.source == index;
                let other = if outgoing { edge.target } else { edge.source };
                let other = snapshot.nodes.get(other)?;
                Some(LinkRow {
                    counterparty: other.id.clone(),
                    label: other.label.clone(),
                    outgoing,
                    value: edge.value,
                    transfers: edge.transfer_count,
                    kind: edge.kind.label(),
                })
            })
            .collect();

        let mut transfers: Vec<_> = self.dataset.transfers_touching(&node_id).collect();
        transfers.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        let transfer_rows: Vec<String> = transfers
            .into_iter()
            .take(RECENT_TRANSFER_ROWS)
            .map(|transfer| {
                let (arrow, other) = if transfer.from == node_id {
                    ("->", transfer.to.as_str())
                } else {
                    ("<-", transfer.from.as_str())
                };
                format!(
                    "{}  {arrow} {other}  {}",
                    format_timestamp(transfer.timestamp_ms),
                    format_amount(transfer.amount)
                )
            })
            .collect();

        ui.separator();
        ui.label(RichText::new(format!("Links ({})", links.len())).strong());
        if links.is_empty() {
            ui.label("No transfers link this node.");
        } else {
            egui::ScrollArea::vertical()
                .id_salt("incident_links_scroll")
                .max_height(240.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for link in &links {
                        let direction = if link.outgoing { "to" } else { "from" };
                        let text = format!(
                            "{direction} {}  {}  ({} x{})",
                            link.label,
                            format_amount(link.value),
                            link.kind,
                            link.transfers
                        );
                        if ui.link(text).on_hover_text(link.counterparty.as_str()).clicked() {
                            *select_request = Some(link.counterparty.clone());
                        }
                    }
                });
        }

        ui.separator();
        ui.label(RichText::new("Recent transfers").strong());
        if transfer_rows.is_empty() {
            ui.label("No transfers in the loaded dataset.");
        }
        for row in transfer_rows {
            ui.small(row);
        }

        if unpin {
            self.engine.unpin(index);
        }
    }

    fn draw_recent_selections(&self, ui: &mut Ui, select_request: &mut Option<String>) {
        let recent = self.recent_selections.borrow();
        if recent.len() < 2 {
            return;
        }

        ui.separator();
        ui.label(RichText::new("Recently selected").strong());
        ui.horizontal_wrapped(|ui| {
            for id in recent.iter().skip(1) {
                let Some(node) = self.engine.snapshot().node(id) else {
                    continue;
                };
                if ui.small_button(node.label.as_str()).clicked() {
                    *select_request = Some(id.clone());
                }
            }
        });
    }
}
