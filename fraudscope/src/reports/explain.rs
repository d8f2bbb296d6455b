// fraudscope/src/reports/explain.rs
//
// Why was this transaction scored the way it was.
//
// Contributions (points, same weights as the scorer):
//   Velocity            velocity × 34
//   Geo Anomaly         geo × 28
//   Spending Deviation  spending × 19
//   Time Pattern        11 at night, else 5
//   Device              8
//
// Recommended action: > 0.90 BLOCK, > 0.75 HOLD, else MONITOR.

use serde::Serialize;

use crate::engine::scoring::Scorer;
use crate::error::{Error, Result};
use crate::records::{round_dp, RiskCategory, Score};
use crate::state::Dataset;

#[derive(Debug, Clone, Serialize)]
pub struct FeatureContribution {
    pub feature:     &'static str,
    pub importance:  f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendedAction {
    Block,
    Hold,
    Monitor,
}

impl RecommendedAction {
    pub fn for_probability(p: f64) -> Self {
        if p > 0.9 {
            Self::Block
        } else if p > 0.75 {
            Self::Hold
        } else {
            Self::Monitor
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block => write!(f, "BLOCK and request verification"),
            Self::Hold => write!(f, "HOLD for manual review"),
            Self::Monitor => write!(f, "MONITOR for additional signals"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionExplanation {
    pub transaction_id:      String,
    pub fraud_probability:   f64,
    pub risk_category:       RiskCategory,
    /// Signal-only score, without the noise term.
    pub heuristic_score:     Score,
    pub feature_importances: Vec<FeatureContribution>,
    pub explanation:         String,
    pub action:              RecommendedAction,
    pub recommended_action:  String,
}

pub fn explain_transaction(ds: &Dataset, scorer: &Scorer, transaction_id: &str) -> Result<TransactionExplanation> {
    let row = ds
        .transaction(transaction_id)
        .ok_or_else(|| Error::not_found("transaction", transaction_id))?;
    let s = &row.txn.signals;
    let night = row.derived.is_night;

    let mut contributions = vec![
        FeatureContribution {
            feature:     "Velocity Score",
            importance:  round_dp(s.velocity_score * 34.0, 2),
            description: format!("{:.0}s since previous transaction", s.time_since_last_transaction),
        },
        FeatureContribution {
            feature:     "Geo Anomaly",
            importance:  round_dp(s.geo_anomaly_score * 28.0, 2),
            description: format!("Location pattern score {:.2}", s.geo_anomaly_score),
        },
        FeatureContribution {
            feature:     "Spending Deviation",
            importance:  round_dp(s.spending_deviation_score * 19.0, 2),
            description: format!("Amount deviation score {:.2}", s.spending_deviation_score),
        },
        FeatureContribution {
            feature:     "Time Pattern",
            importance:  if night { 11.0 } else { 5.0 },
            description: format!(
                "At {:02}:00 ({} time)",
                row.derived.hour,
                if night { "unusual" } else { "normal" }
            ),
        },
        FeatureContribution {
            feature:     "Device",
            importance:  8.0,
            description: format!("Device: {}", row.txn.device_used),
        },
    ];
    // Stable: equal contributions keep the table order above
    contributions.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    let top: Vec<&str> = contributions.iter().take(2).map(|c| c.feature).collect();
    let explanation = format!(
        "Transaction flagged due to: {}. Occurred at {} via {} for ${:.2}.",
        top.join(", "),
        row.txn.location,
        row.txn.device_used,
        row.txn.amount
    );
    let action = RecommendedAction::for_probability(row.fraud_probability());

    Ok(TransactionExplanation {
        transaction_id:      row.txn.transaction_id.clone(),
        fraud_probability:   row.fraud_probability(),
        risk_category:       row.risk_category(),
        heuristic_score:     scorer.score_deterministic(s),
        feature_importances: contributions,
        explanation,
        action,
        recommended_action:  action.to_string(),
    })
}
