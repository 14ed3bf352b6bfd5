use crate::{
    classifier::{ClassificationRequest, ClassificationResult, Label},
    record::RawRecord,
    schema,
    util::{now_millis, round2},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reduced projection of one classified dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRow {
    pub address: String,
    pub total_ether_balance: f64,
    pub total_ether_sent: f64,
    pub total_ether_received: f64,
    pub prediction: Label,
    pub probability: f64,
    /// Resolved fraud bit: the dataset's own 0/1 label when present, else the model's.
    pub flag: u8,
}

impl ProcessedRow {
    pub fn new(row: &RawRecord, result: ClassificationResult) -> Self {
        Self {
            address: row.get(schema::ADDRESS).unwrap_or_default().to_string(),
            total_ether_balance: row.numeric(schema::TOTAL_ETHER_BALANCE),
            total_ether_sent: row.numeric(schema::TOTAL_ETHER_SENT),
            total_ether_received: row.numeric(schema::TOTAL_ETHER_RECEIVED),
            prediction: result.label,
            probability: result.probability,
            flag: resolve_flag(row, result.label),
        }
    }
}

/// Explicit `FLAG` cell of "0" or "1" wins over the model label.
pub fn resolve_flag(row: &RawRecord, label: Label) -> u8 {
    match explicit_flag(row) {
        Some(flag) => flag,
        None => label.flag(),
    }
}

pub fn explicit_flag(row: &RawRecord) -> Option<u8> {
    match row.get(schema::FLAG).map(str::trim) {
        Some("0") => Some(0),
        Some("1") => Some(1),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub total: usize,
    pub fraudulent: usize,
    pub fraud_percent: f64,
}

impl DerivedStats {
    pub fn from_flags<I: IntoIterator<Item = u8>>(flags: I) -> Self {
        let (total, fraudulent) = flags
            .into_iter()
            .fold((0usize, 0usize), |(t, f), flag| (t + 1, f + usize::from(flag == 1)));
        let fraud_percent = if total == 0 {
            0.0
        } else {
            round2(fraudulent as f64 / total as f64 * 100.0)
        };
        Self {
            total,
            fraudulent,
            fraud_percent,
        }
    }

    pub fn from_rows(rows: &[ProcessedRow]) -> Self {
        Self::from_flags(rows.iter().map(|r| r.flag))
    }

    /// Dashboard figures over a raw dataset: only an explicit `FLAG` of 1 counts.
    pub fn from_records(records: &[RawRecord]) -> Self {
        Self::from_flags(records.iter().map(|r| explicit_flag(r).unwrap_or(0)))
    }

    pub fn legitimate(&self) -> usize {
        self.total - self.fraudulent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub id: Uuid,
    pub name: String,
    /// Unix milliseconds.
    pub created_at: i64,
    pub rows: Vec<ProcessedRow>,
    pub stats: DerivedStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_digest: Option<String>,
}

impl ResultSet {
    pub fn new(name: &str, rows: Vec<ProcessedRow>) -> Self {
        let stats = DerivedStats::from_rows(&rows);
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now_millis(),
            rows,
            stats,
            source_digest: None,
        }
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
            stats: self.stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: i64,
    pub stats: DerivedStats,
}

/// One manually submitted prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub address: String,
    #[serde(flatten)]
    pub features: ClassificationRequest,
    pub label: Label,
    pub probability: f64,
    /// Unix milliseconds; also the removal key.
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(address: &str, features: ClassificationRequest, result: ClassificationResult) -> Self {
        Self {
            address: address.to_string(),
            features,
            label: result.label,
            probability: result.probability,
            timestamp: now_millis(),
        }
    }
}
