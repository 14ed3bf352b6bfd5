use super::{ViewRow, FRAUDULENT, LEGITIMATE};
use crate::{
    record::RawRecord,
    report::{explicit_flag, HistoryEntry, ProcessedRow},
    schema,
};
use serde::{Deserialize, Serialize};

fn status_of(fraud: bool) -> &'static str {
    if fraud { FRAUDULENT } else { LEGITIMATE }
}

/// Raw dataset row as shown by the explorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerRow {
    /// 1-based position in the source file.
    pub id: usize,
    pub address: String,
    pub balance: f64,
    pub sent: f64,
    pub received: f64,
    pub status: String,
}

impl ExplorerRow {
    pub fn from_records(records: &[RawRecord]) -> Vec<ExplorerRow> {
        records
            .iter()
            .enumerate()
            .map(|(i, r)| ExplorerRow {
                id: i + 1,
                address: match r.get(schema::ADDRESS) {
                    Some(a) if !a.is_empty() => a.to_string(),
                    _ => "N/A".to_string(),
                },
                balance: r.numeric(schema::TOTAL_ETHER_BALANCE),
                sent: r.numeric(schema::TOTAL_ETHER_SENT),
                received: r.numeric(schema::TOTAL_ETHER_RECEIVED),
                status: status_of(explicit_flag(r) == Some(1)).to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExplorerField {
    Id,
    Balance,
    Sent,
    Received,
}

impl ViewRow for ExplorerRow {
    type Field = ExplorerField;

    fn status(&self) -> &str {
        &self.status
    }

    fn search_fields(&self) -> Vec<String> {
        vec![self.id.to_string(), self.address.clone()]
    }

    fn sort_value(&self, field: ExplorerField) -> f64 {
        match field {
            ExplorerField::Id => self.id as f64,
            ExplorerField::Balance => self.balance,
            ExplorerField::Sent => self.sent,
            ExplorerField::Received => self.received,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResultField {
    Balance,
    Sent,
    Received,
    Probability,
}

impl ViewRow for ProcessedRow {
    type Field = ResultField;

    fn status(&self) -> &str {
        status_of(self.flag == 1)
    }

    fn search_fields(&self) -> Vec<String> {
        vec![self.address.clone()]
    }

    fn sort_value(&self, field: ResultField) -> f64 {
        match field {
            ResultField::Balance => self.total_ether_balance,
            ResultField::Sent => self.total_ether_sent,
            ResultField::Received => self.total_ether_received,
            ResultField::Probability => self.probability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HistoryField {
    Timestamp,
    Probability,
    Balance,
    Sent,
}

impl ViewRow for HistoryEntry {
    type Field = HistoryField;

    fn status(&self) -> &str {
        status_of(self.label.flag() == 1)
    }

    fn search_fields(&self) -> Vec<String> {
        vec![self.address.clone()]
    }

    fn sort_value(&self, field: HistoryField) -> f64 {
        match field {
            HistoryField::Timestamp => self.timestamp as f64,
            HistoryField::Probability => self.probability,
            HistoryField::Balance => self.features.total_ether_balance,
            HistoryField::Sent => self.features.total_ether_sent,
        }
    }
}
