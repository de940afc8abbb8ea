mod filter;
mod load;
mod parse;
mod records;

pub use filter::{DatasetFilter, TimeWindow};
pub use load::load_dataset;
pub use records::{Dataset, EntityRecord};
#[cfg(test)]
pub use records::TransferRecord;
