use crate::record::RawRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request key and the dataset column it is read from.
pub const FEATURE_COLUMNS: [(&str, &str); 14] = [
    ("avg_min_between_sent_tnx", "Avg min between sent tnx"),
    ("avg_min_between_received_tnx", "Avg min between received tnx"),
    (
        "time_diff_between_first_and_last",
        "Time Diff between first and last (Mins)",
    ),
    ("sent_tnx", "Sent tnx"),
    ("received_tnx", "Received Tnx"),
    ("number_of_created_contracts", "Number of Created Contracts"),
    ("max_value_received", "max value received"),
    ("avg_val_received", "avg val received"),
    ("avg_val_sent", "avg val sent"),
    ("total_ether_sent", "total Ether sent"),
    ("total_ether_balance", "total ether balance"),
    ("erc20_total_ether_received", "ERC20 total Ether received"),
    ("erc20_total_ether_sent", "ERC20 total ether sent"),
    (
        "erc20_total_ether_sent_contract",
        "ERC20 total Ether sent contract",
    ),
];

/// Body of `POST /predict`. Field names are the service's wire keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub avg_min_between_sent_tnx: f64,
    pub avg_min_between_received_tnx: f64,
    pub time_diff_between_first_and_last: f64,
    pub sent_tnx: f64,
    pub received_tnx: f64,
    pub number_of_created_contracts: f64,
    pub max_value_received: f64,
    pub avg_val_received: f64,
    pub avg_val_sent: f64,
    pub total_ether_sent: f64,
    pub total_ether_balance: f64,
    pub erc20_total_ether_received: f64,
    pub erc20_total_ether_sent: f64,
    pub erc20_total_ether_sent_contract: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feature: {0}")]
pub struct UnknownFeature(pub String);

impl ClassificationRequest {
    pub fn from_record(row: &RawRecord) -> Self {
        let mut req = Self::default();
        for (key, column) in FEATURE_COLUMNS {
            // Keys come from the same table `set` matches on.
            let _ = req.set(key, row.numeric(column));
        }
        req
    }

    pub fn set(&mut self, key: &str, value: f64) -> Result<(), UnknownFeature> {
        let slot = match key {
            "avg_min_between_sent_tnx" => &mut self.avg_min_between_sent_tnx,
            "avg_min_between_received_tnx" => &mut self.avg_min_between_received_tnx,
            "time_diff_between_first_and_last" => &mut self.time_diff_between_first_and_last,
            "sent_tnx" => &mut self.sent_tnx,
            "received_tnx" => &mut self.received_tnx,
            "number_of_created_contracts" => &mut self.number_of_created_contracts,
            "max_value_received" => &mut self.max_value_received,
            "avg_val_received" => &mut self.avg_val_received,
            "avg_val_sent" => &mut self.avg_val_sent,
            "total_ether_sent" => &mut self.total_ether_sent,
            "total_ether_balance" => &mut self.total_ether_balance,
            "erc20_total_ether_received" => &mut self.erc20_total_ether_received,
            "erc20_total_ether_sent" => &mut self.erc20_total_ether_sent,
            "erc20_total_ether_sent_contract" => &mut self.erc20_total_ether_sent_contract,
            other => return Err(UnknownFeature(other.to_string())),
        };
        *slot = if value.is_finite() { value } else { 0.0 };
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Fraud,
    Legitimate,
}

impl Label {
    /// The service answers with a free-form string; "fraud" (or a numeric 1) is the positive
    /// class, anything else is legitimate.
    pub fn from_prediction(raw: &serde_json::Value) -> Self {
        let fraud = match raw {
            serde_json::Value::String(s) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("fraud")
                    || s.eq_ignore_ascii_case("fraudulent")
                    || s == "1"
            }
            serde_json::Value::Number(n) => n.as_f64() == Some(1.0),
            serde_json::Value::Bool(b) => *b,
            _ => false,
        };
        if fraud { Label::Fraud } else { Label::Legitimate }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Fraud => "fraud",
            Label::Legitimate => "legitimate",
        }
    }

    pub fn flag(&self) -> u8 {
        match self {
            Label::Fraud => 1,
            Label::Legitimate => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: serde_json::Value,
    #[serde(default)]
    pub probability: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Percentage in [0, 100].
    pub probability: f64,
}

impl From<PredictResponse> for ClassificationResult {
    fn from(resp: PredictResponse) -> Self {
        let probability = if resp.probability.is_finite() {
            resp.probability.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            label: Label::from_prediction(&resp.prediction),
            probability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Prediction failed: {message}")]
    Transport { status: Option<u16>, message: String },

    #[error("Processing cancelled")]
    Cancelled,
}

impl ClassifyError {
    pub fn transport(message: impl Into<String>) -> Self {
        ClassifyError::Transport {
            status: None,
            message: message.into(),
        }
    }
}
