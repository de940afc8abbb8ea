#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub amount: f64,
    pub address: Option<String>,
}

impl EntityRecord {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransferRecord {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub timestamp_ms: i64,
    pub kind: Option<String>,
}

/// A paying entity, its counterparties and the transfers between them.
///
/// Records are kept in input order so graph construction stays deterministic.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub root: Option<EntityRecord>,
    pub counterparties: Vec<EntityRecord>,
    pub transfers: Vec<TransferRecord>,
    /// Records that could not be read at all while parsing.
    pub unreadable_records: usize,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.counterparties.is_empty()
    }

    pub fn newest_timestamp_ms(&self) -> Option<i64> {
        self.transfers
            .iter()
            .map(|transfer| transfer.timestamp_ms)
            .filter(|timestamp| *timestamp > 0)
            .max()
    }

    pub fn total_volume(&self) -> f64 {
        self.transfers.iter().map(|transfer| transfer.amount).sum()
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root.as_ref().map(|root| root.id.as_str())
    }

    pub fn transfers_touching<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = &'a TransferRecord> + 'a {
        self.transfers
            .iter()
            .filter(move |transfer| transfer.from == id || transfer.to == id)
    }
}
