use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::parse::parse_dataset;
use super::records::Dataset;

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;

    let dataset =
        parse_dataset(&raw).with_context(|| format!("failed to parse dataset {}", path.display()))?;

    if dataset.unreadable_records > 0 {
        warn!(
            path = %path.display(),
            skipped = dataset.unreadable_records,
            "skipped unreadable dataset records"
        );
    }

    if dataset.is_empty() {
        warn!(path = %path.display(), "dataset has no root or counterparties");
    }

    info!(
        path = %path.display(),
        counterparties = dataset.counterparties.len(),
        transfers = dataset.transfers.len(),
        "loaded payment dataset"
    );

    Ok(dataset)
}
