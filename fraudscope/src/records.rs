// fraudscope/src/records.rs
//
// Shared record types and all domain types flowing through fraudscope.
// A Transaction is immutable once loaded; Derived is attached exactly once
// by the scoring pipeline when a snapshot is built.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

// ── Raw transaction ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    Payment,
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer" => Ok(Self::Transfer),
            "payment" => Ok(Self::Payment),
            other => Err(format!("unknown transaction type '{other}'")),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Withdrawal => write!(f, "withdrawal"),
            Self::Transfer => write!(f, "transfer"),
            Self::Payment => write!(f, "payment"),
        }
    }
}

/// Behavioral signals after the fill policy: never NaN, never infinite.
/// The three scores are nominally in [0,1] but are not trusted to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub velocity_score: f64,
    pub geo_anomaly_score: f64,
    pub spending_deviation_score: f64,
    /// Seconds since the sender's previous transaction.
    pub time_since_last_transaction: f64,
}

impl Signals {
    /// Missing and non-finite values become 0.
    pub fn filled(
        velocity: Option<f64>,
        geo_anomaly: Option<f64>,
        spending_deviation: Option<f64>,
        time_since_last: Option<f64>,
    ) -> Self {
        Self {
            velocity_score: fill(velocity),
            geo_anomaly_score: fill(geo_anomaly),
            spending_deviation_score: fill(spending_deviation),
            time_since_last_transaction: fill(time_since_last),
        }
    }
}

fn fill(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id:    String,
    pub timestamp:         DateTime<Utc>,
    pub sender_account:    String,
    pub receiver_account:  String,
    pub amount:            f64,
    pub transaction_type:  TransactionType,
    pub merchant_category: String,
    pub location:          String,
    pub device_used:       String,
    pub payment_channel:   String,
    pub is_fraud:          bool,
    pub fraud_type:        Option<String>,
    pub ip_address:        Option<String>,
    pub device_hash:       Option<String>,
    #[serde(flatten)]
    pub signals:           Signals,
}

// ── Derived fields ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub fraud_probability: f64,
    pub risk_category:     RiskCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    pub hour:        u32,
    /// Monday = 0 … Sunday = 6.
    pub day_of_week: u32,
    pub is_weekend:  bool,
    /// Hours 00 through 06 inclusive.
    pub is_night:    bool,
    #[serde(flatten)]
    pub score:       Score,
}

impl Derived {
    pub fn new(timestamp: DateTime<Utc>, score: Score) -> Self {
        let hour = timestamp.hour();
        let day_of_week = timestamp.weekday().num_days_from_monday();
        Self {
            hour,
            day_of_week,
            is_weekend: day_of_week >= 5,
            is_night: hour <= 6,
            score,
        }
    }
}

/// A transaction plus its derived fields; one row of the canonical table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTransaction {
    #[serde(flatten)]
    pub txn:     Transaction,
    #[serde(flatten)]
    pub derived: Derived,
}

impl ScoredTransaction {
    pub fn fraud_probability(&self) -> f64 { self.derived.score.fraud_probability }
    pub fn risk_category(&self) -> RiskCategory { self.derived.score.risk_category }
    pub fn sender(&self) -> &str { &self.txn.sender_account }
    pub fn receiver(&self) -> &str { &self.txn.receiver_account }
    pub fn amount(&self) -> f64 { self.txn.amount }
}

// ── Network types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Sender,
    Receiver,
    Both,
}

impl NodeRole {
    pub fn from_counts(sent: usize, received: usize) -> Self {
        match (sent > 0, received > 0) {
            (true, true) => Self::Both,
            (true, false) => Self::Sender,
            _ => Self::Receiver,
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Receiver => write!(f, "receiver"),
            Self::Both => write!(f, "both"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub account_id:        String,
    pub transaction_count: usize,
    pub total_volume:      f64,
    pub fraud_probability: f64,
    pub node_type:         NodeRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source:                String,
    pub target:                String,
    pub transaction_count:     usize,
    pub total_amount:          f64,
    pub avg_fraud_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRing {
    pub ring_id:               String,
    pub account_count:         usize,
    pub transaction_count:     usize,
    pub total_volume:          f64,
    pub avg_fraud_probability: f64,
    /// Display list; capped, does not affect the counts above.
    pub accounts:              Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuleCandidate {
    pub account:              String,
    pub unique_senders:       usize,
    pub amount_received:      f64,
    pub avg_fraud_prob:       f64,
    pub unique_receivers:     usize,
    pub amount_sent:          f64,
    pub redistribution_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub account_id:            String,
    pub transaction_count:     usize,
    pub total_volume:          f64,
    pub avg_fraud_probability: f64,
    pub node_type:             NodeRole,
    pub unique_senders:        usize,
    pub unique_receivers:      usize,
    pub amount_sent:           f64,
    pub amount_received:       f64,
    pub redistribution_ratio:  f64,
}

/// amount_sent / amount_received, 0 when nothing was received.
pub fn redistribution_ratio(amount_sent: f64, amount_received: f64) -> f64 {
    if amount_received > 0.0 {
        amount_sent / amount_received
    } else {
        0.0
    }
}

/// Round half away from zero to `dp` decimal places.
pub fn round_dp(v: f64, dp: i32) -> f64 {
    let f = 10f64.powi(dp);
    (v * f).round() / f
}
