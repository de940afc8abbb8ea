use std::collections::HashSet;

use chrono::TimeDelta;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::records::{Dataset, EntityRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeWindow {
    #[default]
    All,
    Days(u32),
}

impl TimeWindow {
    pub const PRESETS: [TimeWindow; 4] = [
        TimeWindow::All,
        TimeWindow::Days(7),
        TimeWindow::Days(30),
        TimeWindow::Days(90),
    ];

    pub fn label(self) -> String {
        match self {
            Self::All => "All time".to_owned(),
            Self::Days(days) => format!("Last {days} days"),
        }
    }

    /// Oldest timestamp still inside the window, measured back from the
    /// dataset's newest transfer rather than the wall clock.
    fn cutoff_ms(self, newest_ms: Option<i64>) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Days(days) => {
                let span = TimeDelta::try_days(i64::from(days))
                    .map(|delta| delta.num_milliseconds())
                    .unwrap_or(i64::MAX);
                Some(newest_ms.unwrap_or(0).saturating_sub(span))
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetFilter {
    pub search: String,
    pub window: TimeWindow,
    pub min_amount: f64,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

fn entity_matches(matcher: &SkimMatcherV2, entity: &EntityRecord, query: &str) -> bool {
    fuzzy_match_score(matcher, entity.display_name(), query).is_some()
        || fuzzy_match_score(matcher, &entity.id, query).is_some()
        || entity
            .category
            .as_deref()
            .is_some_and(|category| fuzzy_match_score(matcher, category, query).is_some())
}

impl DatasetFilter {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || self.window != TimeWindow::All || self.min_amount > 0.0
    }

    /// Narrows the dataset to the counterparties matching the search and the
    /// transfers inside the time window and above the minimum amount. The
    /// root entity is always kept. Transfers without a timestamp fall outside
    /// every bounded window.
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        if !self.is_active() {
            return dataset.clone();
        }

        let query = self.search.trim();
        let matcher = SkimMatcherV2::default();
        let counterparties = dataset
            .counterparties
            .iter()
            .filter(|entity| query.is_empty() || entity_matches(&matcher, entity, query))
            .cloned()
            .collect::<Vec<_>>();

        let mut kept_ids = counterparties
            .iter()
            .map(|entity| entity.id.as_str())
            .collect::<HashSet<_>>();
        if let Some(root_id) = dataset.root_id() {
            kept_ids.insert(root_id);
        }

        let cutoff = self.window.cutoff_ms(dataset.newest_timestamp_ms());
        let min_amount = if self.min_amount.is_finite() {
            self.min_amount.max(0.0)
        } else {
            0.0
        };

        let transfers = dataset
            .transfers
            .iter()
            .filter(|transfer| {
                kept_ids.contains(transfer.from.as_str()) && kept_ids.contains(transfer.to.as_str())
            })
            .filter(|transfer| transfer.amount >= min_amount)
            .filter(|transfer| {
                cutoff.is_none_or(|cutoff| transfer.timestamp_ms > 0 && transfer.timestamp_ms >= cutoff)
            })
            .cloned()
            .collect::<Vec<_>>();

        Dataset {
            root: dataset.root.clone(),
            counterparties,
            transfers,
            unreadable_records: dataset.unreadable_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{EntityRecord, TransferRecord};

    const DAY_MS: i64 = 86_400_000;

    fn entity(id: &str, name: &str, category: Option<&str>) -> EntityRecord {
        EntityRecord {
            id: id.to_owned(),
            name: name.to_owned(),
            category: category.map(str::to_owned),
            ..Default::default()
        }
    }

    fn transfer(to: &str, amount: f64, timestamp_ms: i64) -> TransferRecord {
        TransferRecord {
            from: "hq".to_owned(),
            to: to.to_owned(),
            amount,
            timestamp_ms,
            kind: None,
        }
    }

    fn sample() -> Dataset {
        Dataset {
            root: Some(entity("hq", "Headquarters", None)),
            counterparties: vec![
                entity("s1", "Cloud Systems", Some("Cloud Services")),
                entity("s2", "Apex Legal", Some("Legal")),
                entity("s3", "Nexus Logistics", Some("Logistics")),
            ],
            transfers: vec![
                transfer("s1", 500.0, 100 * DAY_MS),
                transfer("s2", 20.0, 95 * DAY_MS),
                transfer("s3", 900.0, 40 * DAY_MS),
            ],
            unreadable_records: 0,
        }
    }

    #[test]
    fn inactive_filter_is_identity() {
        let filtered = DatasetFilter::default().apply(&sample());
        assert_eq!(filtered.counterparties.len(), 3);
        assert_eq!(filtered.transfers.len(), 3);
    }

    #[test]
    fn search_keeps_root_and_matching_counterparties() {
        let filter = DatasetFilter {
            search: "cloud".to_owned(),
            ..Default::default()
        };
        let filtered = filter.apply(&sample());

        assert_eq!(filtered.root_id(), Some("hq"));
        assert_eq!(filtered.counterparties.len(), 1);
        assert_eq!(filtered.counterparties[0].id, "s1");
        assert_eq!(filtered.transfers.len(), 1);
    }

    #[test]
    fn time_window_is_relative_to_newest_transfer() {
        let filter = DatasetFilter {
            window: TimeWindow::Days(7),
            ..Default::default()
        };
        let filtered = filter.apply(&sample());

        let kept = filtered
            .transfers
            .iter()
            .map(|transfer| transfer.to.as_str())
            .collect::<Vec<_>>();
        assert_eq!(kept, vec!["s1", "s2"]);
    }

    #[test]
    fn minimum_amount_drops_small_transfers() {
        let filter = DatasetFilter {
            min_amount: 100.0,
            ..Default::default()
        };
        let filtered = filter.apply(&sample());
        assert!(filtered.transfers.iter().all(|transfer| transfer.amount >= 100.0));
        assert_eq!(filtered.transfers.len(), 2);
    }
}
