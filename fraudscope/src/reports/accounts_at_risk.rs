// fraudscope/src/reports/accounts_at_risk.rs
//
// Predictive risk per sending account over the last 7 days.
//
//   risk = 0.5·max(prob) + 0.2·mean(velocity) + 0.15·mean(geo) + 0.15·mean(spending)
//
// clamped to [0,1], since the signal means are not trusted to stay in range.
// Accounts are ranked by risk (ties by id), the top `limit` are counted and
// bucketed, and the top 20 get a detailed card.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::eval::auc_roc;
use crate::records::{round_dp, ScoredTransaction};
use crate::state::Dataset;

pub const WINDOW_HOURS: i64 = 7 * 24;
pub const DISPLAY_LIMIT: usize = 20;
const FACTOR_THRESHOLD: f64 = 0.7;
const NEW_DEVICE_COUNT: usize = 2;
const ENABLE_2FA_RISK: f64 = 0.8;

#[derive(Debug, Clone, Serialize)]
pub struct AccountAtRisk {
    pub account_id:            String,
    pub fraud_risk:            f64,
    pub risk_factors:          Vec<String>,
    pub recent_anomalies:      Vec<String>,
    pub recommended_action:    &'static str,
    pub last_transaction_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RiskDistribution {
    /// >= 0.85
    pub critical: usize,
    /// [0.7, 0.85)
    pub high:     usize,
    /// [0.5, 0.7)
    pub medium:   usize,
    pub low:      usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictiveRiskScores {
    pub high_probability_targets: Vec<AccountAtRisk>,
    pub total_at_risk:            usize,
    pub risk_distribution:        RiskDistribution,
    /// AUC-ROC of the fraud probability over the same window.
    pub prediction_confidence:    f64,
}

struct SenderAgg<'a> {
    rows:      usize,
    velocity:  f64,
    geo:       f64,
    spending:  f64,
    max_prob:  f64,
    last:      DateTime<Utc>,
    devices:   HashSet<&'a str>,
    locations: HashSet<&'a str>,
}

impl<'a> SenderAgg<'a> {
    fn new(r: &'a ScoredTransaction) -> Self {
        Self {
            rows:      0,
            velocity:  0.0,
            geo:       0.0,
            spending:  0.0,
            max_prob:  f64::MIN,
            last:      r.txn.timestamp,
            devices:   HashSet::new(),
            locations: HashSet::new(),
        }
    }

    fn add(&mut self, r: &'a ScoredTransaction) {
        let s = &r.txn.signals;
        self.rows += 1;
        self.velocity += s.velocity_score;
        self.geo += s.geo_anomaly_score;
        self.spending += s.spending_deviation_score;
        self.max_prob = self.max_prob.max(r.fraud_probability());
        self.last = self.last.max(r.txn.timestamp);
        self.devices.insert(&r.txn.device_used);
        self.locations.insert(&r.txn.location);
    }

    fn mean(&self, sum: f64) -> f64 {
        sum / self.rows as f64
    }

    fn risk(&self) -> f64 {
        let raw = 0.5 * self.max_prob
            + 0.2 * self.mean(self.velocity)
            + 0.15 * self.mean(self.geo)
            + 0.15 * self.mean(self.spending);
        raw.clamp(0.0, 1.0)
    }

    fn factors(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.mean(self.velocity) > FACTOR_THRESHOLD {
            out.push("Unusual velocity spike".to_string());
        }
        if self.devices.len() > NEW_DEVICE_COUNT {
            out.push("New device detected".to_string());
        }
        let geo = self.mean(self.geo);
        if geo > FACTOR_THRESHOLD {
            out.push(format!("Geo-anomaly score: {geo:.2}"));
        }
        let spending = self.mean(self.spending);
        if spending > FACTOR_THRESHOLD {
            out.push(format!("Spending deviation: +{:.0}%", spending * 100.0));
        }
        out
    }
}

pub fn predictive_risk_scores(ds: &Arc<Dataset>, limit: usize) -> PredictiveRiskScores {
    let recent = ds.recent(WINDOW_HOURS);

    let mut senders: BTreeMap<&str, SenderAgg<'_>> = BTreeMap::new();
    for r in recent.iter() {
        senders.entry(r.sender()).or_insert_with(|| SenderAgg::new(r)).add(r);
    }

    let mut ranked: Vec<(&str, f64, &SenderAgg<'_>)> =
        senders.iter().map(|(&id, agg)| (id, agg.risk(), agg)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(limit);

    let mut risk_distribution = RiskDistribution::default();
    for &(_, risk, _) in &ranked {
        match risk {
            r if r >= 0.85 => risk_distribution.critical += 1,
            r if r >= 0.7 => risk_distribution.high += 1,
            r if r >= 0.5 => risk_distribution.medium += 1,
            _ => risk_distribution.low += 1,
        }
    }

    let high_probability_targets = ranked
        .iter()
        .take(DISPLAY_LIMIT)
        .map(|&(id, risk, agg)| AccountAtRisk {
            account_id:            id.to_string(),
            fraud_risk:            round_dp(risk, 4),
            risk_factors:          agg.factors(),
            recent_anomalies:      vec![format!("Location changes: {}", agg.locations.len())],
            recommended_action:    if risk > ENABLE_2FA_RISK { "Enable 2FA" } else { "Monitor closely" },
            last_transaction_time: agg.last,
        })
        .collect();

    let window: Vec<&ScoredTransaction> = recent.iter().collect();
    PredictiveRiskScores {
        high_probability_targets,
        total_at_risk: ranked.len(),
        risk_distribution,
        prediction_confidence: round_dp(auc_roc(&window), 4),
    }
}
