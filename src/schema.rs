use crate::record::RawRecord;
use thiserror::Error;

pub const ADDRESS: &str = "Address";
pub const FLAG: &str = "FLAG";
pub const TOTAL_ETHER_BALANCE: &str = "total ether balance";
pub const TOTAL_ETHER_SENT: &str = "total Ether sent";
pub const TOTAL_ETHER_RECEIVED: &str = "total ether received";

/// Columns every uploaded dataset must carry, in reporting order.
pub const REQUIRED_FIELDS: [&str; 16] = [
    ADDRESS,
    TOTAL_ETHER_BALANCE,
    TOTAL_ETHER_SENT,
    TOTAL_ETHER_RECEIVED,
    "Avg min between sent tnx",
    "Avg min between received tnx",
    "Time Diff between first and last (Mins)",
    "Sent tnx",
    "Received Tnx",
    "Number of Created Contracts",
    "max value received",
    "avg val received",
    "avg val sent",
    "ERC20 total Ether received",
    "ERC20 total ether sent",
    "ERC20 total Ether sent contract",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("File is empty")]
    EmptyDataset,

    #[error("Required fields missing: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },
}

/// Gate run before any row is classified.
///
/// Only the first record is inspected. Later rows with missing columns pass through and
/// their features read as 0.
pub fn validate(records: &[RawRecord], required: &[&str]) -> Result<(), SchemaError> {
    let first = records.first().ok_or(SchemaError::EmptyDataset)?;

    let fields: Vec<String> = required
        .iter()
        .filter(|f| !first.contains(f))
        .map(|f| f.to_string())
        .collect();

    if fields.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::MissingFields { fields })
    }
}
