// fraudscope/src/eval/mod.rs
//
// Model monitoring: how well the heuristic score tracks the fraud label.
//
// Provides:
//   1. Confusion counts of `fraud_probability >= decision_threshold` vs is_fraud
//   2. Precision / recall / F1 / accuracy, plus rank-based AUC-ROC
//   3. Last-7-days vs earlier comparison and a mean/std data-drift check
//   4. Global feature importance: |Pearson r| of each signal with the label
//
// "Last 7 days" is measured back from the newest row, not the wall clock.
//
// Run:
//   fraudscope --mode eval
//   fraudscope --mode eval --data labeled.csv

pub mod report;

use chrono::Duration;
use serde::Serialize;

use crate::config::ModelSettings;
use crate::records::{round_dp, ScoredTransaction};
use crate::state::Dataset;

pub const RECENT_DAYS: i64 = 7;
/// Cost of one false alarm (customer contact, manual review).
pub const FALSE_POSITIVE_COST: f64 = 50.0;

// ── Confusion counters ────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub tp:  u64,  // flagged, fraud
    pub fp:  u64,  // flagged, legitimate
    pub tn:  u64,  // passed, legitimate
    pub fn_: u64,  // passed, fraud
}

impl ConfusionCounts {
    pub fn tally<'a>(rows: impl IntoIterator<Item = &'a ScoredTransaction>, threshold: f64) -> Self {
        let mut m = Self::default();
        for r in rows {
            match (r.fraud_probability() >= threshold, r.txn.is_fraud) {
                (true,  true)  => m.tp  += 1,
                (true,  false) => m.fp  += 1,
                (false, true)  => m.fn_ += 1,
                (false, false) => m.tn  += 1,
            }
        }
        m
    }

    pub fn total(&self) -> u64 { self.tp + self.fp + self.tn + self.fn_ }

    pub fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 { 0.0 } else { self.tp as f64 / denom as f64 }
    }

    pub fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 { 0.0 } else { self.tp as f64 / denom as f64 }
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    pub fn accuracy(&self) -> f64 {
        let n = self.total();
        if n == 0 { 0.0 } else { (self.tp + self.tn) as f64 / n as f64 }
    }

    pub fn fpr(&self) -> f64 {
        let denom = self.fp + self.tn;
        if denom == 0 { 0.0 } else { self.fp as f64 / denom as f64 }
    }

    pub fn fnr(&self) -> f64 {
        let denom = self.fn_ + self.tp;
        if denom == 0 { 0.0 } else { self.fn_ as f64 / denom as f64 }
    }
}

// ── Result types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelMetrics {
    pub precision: f64,
    pub recall:    f64,
    pub f1_score:  f64,
    pub accuracy:  f64,
    pub auc_roc:   f64,
}

impl ModelMetrics {
    pub fn of(rows: &[&ScoredTransaction], threshold: f64) -> Self {
        let c = ConfusionCounts::tally(rows.iter().copied(), threshold);
        Self {
            precision: round_dp(c.precision(), 4),
            recall:    round_dp(c.recall(), 4),
            f1_score:  round_dp(c.f1(), 4),
            accuracy:  round_dp(c.accuracy(), 4),
            auc_roc:   round_dp(auc_roc(rows), 4),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfusionMatrix {
    pub true_positive:       u64,
    pub true_negative:       u64,
    pub false_positive:      u64,
    pub false_negative:      u64,
    pub false_positive_rate: f64,
    pub false_negative_rate: f64,
    /// FP × 50 + amount of fraud that slipped through.
    pub cost_impact:         f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriftLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for DriftLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsChange {
    /// Percentage points, recent minus previous.
    pub precision: f64,
    pub recall:    f64,
    pub f1_score:  f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelHealth {
    pub current_metrics:      ModelMetrics,
    pub previous_metrics:     ModelMetrics,
    pub metrics_change:       MetricsChange,
    pub data_drift_status:    DriftLevel,
    pub feature_drift_alerts: Vec<String>,
    pub recommendation:       String,
    pub model_version:        String,
    pub recent_rows:          usize,
    pub previous_rows:        usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub feature:     &'static str,
    pub importance:  f64,
    pub correlation: f64,
}

// ── Operations ────────────────────────────────────────────────────────────────

/// Rows in the last RECENT_DAYS, and everything before.
pub fn split_recent(ds: &Dataset) -> (Vec<&ScoredTransaction>, Vec<&ScoredTransaction>) {
    let Some(latest) = ds.latest() else {
        return (Vec::new(), Vec::new());
    };
    let cutoff = latest - Duration::days(RECENT_DAYS);
    ds.rows().iter().partition(|r| r.txn.timestamp >= cutoff)
}

pub fn confusion_matrix(ds: &Dataset, threshold: f64) -> ConfusionMatrix {
    let (recent, _) = split_recent(ds);
    let c = ConfusionCounts::tally(recent.iter().copied(), threshold);
    let missed: f64 = recent
        .iter()
        .filter(|r| r.txn.is_fraud && r.fraud_probability() < threshold)
        .map(|r| r.amount())
        .sum();

    ConfusionMatrix {
        true_positive:       c.tp,
        true_negative:       c.tn,
        false_positive:      c.fp,
        false_negative:      c.fn_,
        false_positive_rate: round_dp(c.fpr(), 4),
        false_negative_rate: round_dp(c.fnr(), 4),
        cost_impact:         round_dp(c.fp as f64 * FALSE_POSITIVE_COST + missed, 2),
    }
}

pub fn model_health(ds: &Dataset, model: &ModelSettings) -> ModelHealth {
    let (recent, previous) = split_recent(ds);
    let current_metrics = ModelMetrics::of(&recent, model.decision_threshold);
    let previous_metrics = ModelMetrics::of(&previous, model.decision_threshold);

    let metrics_change = MetricsChange {
        precision: round_dp((current_metrics.precision - previous_metrics.precision) * 100.0, 2),
        recall:    round_dp((current_metrics.recall - previous_metrics.recall) * 100.0, 2),
        f1_score:  round_dp((current_metrics.f1_score - previous_metrics.f1_score) * 100.0, 2),
    };

    let data_drift_status = data_drift(&recent, &previous);
    let feature_drift_alerts = feature_drift(&recent, &previous);
    let recommendation = recommend(&metrics_change, data_drift_status, &feature_drift_alerts);

    ModelHealth {
        current_metrics,
        previous_metrics,
        metrics_change,
        data_drift_status,
        feature_drift_alerts,
        recommendation,
        model_version: model.version.clone(),
        recent_rows:   recent.len(),
        previous_rows: previous.len(),
    }
}

pub fn feature_importance(ds: &Dataset) -> Vec<FeatureImportance> {
    let label: Vec<f64> = ds.rows().iter().map(|r| if r.txn.is_fraud { 1.0 } else { 0.0 }).collect();
    let mut out: Vec<FeatureImportance> = FEATURES
        .iter()
        .map(|&(feature, get)| {
            let xs: Vec<f64> = ds.rows().iter().map(get).collect();
            let corr = pearson(&xs, &label);
            FeatureImportance {
                feature,
                importance:  round_dp(corr.abs() * 100.0, 2),
                correlation: round_dp(corr, 3),
            }
        })
        .collect();
    out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    out
}

// ── Internals ─────────────────────────────────────────────────────────────────

type Feature = (&'static str, fn(&ScoredTransaction) -> f64);

const FEATURES: &[Feature] = &[
    ("velocity_score",              |r: &ScoredTransaction| r.txn.signals.velocity_score),
    ("geo_anomaly_score",           |r: &ScoredTransaction| r.txn.signals.geo_anomaly_score),
    ("spending_deviation_score",    |r: &ScoredTransaction| r.txn.signals.spending_deviation_score),
    ("time_since_last_transaction", |r: &ScoredTransaction| r.txn.signals.time_since_last_transaction),
    ("amount",                      |r: &ScoredTransaction| r.txn.amount),
];

/// Columns compared for drift; order matters for the alert list.
const DRIFT_FEATURES: &[Feature] = &[
    ("velocity_score",           |r: &ScoredTransaction| r.txn.signals.velocity_score),
    ("spending_deviation_score", |r: &ScoredTransaction| r.txn.signals.spending_deviation_score),
    ("geo_anomaly_score",        |r: &ScoredTransaction| r.txn.signals.geo_anomaly_score),
    ("amount",                   |r: &ScoredTransaction| r.txn.amount),
];

const EPS: f64 = 1e-10;

/// Probability that a random fraud row outscores a random legitimate one.
/// Ties count half (average ranks). 0.5 when either class is absent.
pub fn auc_roc(rows: &[&ScoredTransaction]) -> f64 {
    let mut scored: Vec<(f64, bool)> = rows.iter().map(|r| (r.fraud_probability(), r.txn.is_fraud)).collect();
    let n_pos = scored.iter().filter(|(_, y)| *y).count();
    let n_neg = scored.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < scored.len() {
        let mut j = i;
        while j + 1 < scored.len() && scored[j + 1].0 == scored[i].0 {
            j += 1;
        }
        // 1-based average rank of the tie group [i, j]
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        let pos_in_group = scored[i..=j].iter().filter(|(_, y)| *y).count();
        rank_sum_pos += avg_rank * pos_in_group as f64;
        i = j + 1;
    }

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos as f64 * n_neg as f64)
}

/// 0 when either side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    if r.is_finite() { r } else { 0.0 }
}

fn mean_std(rows: &[&ScoredTransaction], get: fn(&ScoredTransaction) -> f64) -> (f64, f64) {
    let n = rows.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = rows.iter().map(|r| get(r)).sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = rows.iter().map(|r| (get(r) - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}

fn data_drift(recent: &[&ScoredTransaction], previous: &[&ScoredTransaction]) -> DriftLevel {
    if recent.len() < 2 || previous.len() < 2 {
        return DriftLevel::Low;
    }
    let scores: Vec<f64> = DRIFT_FEATURES
        .iter()
        .map(|&(_, get)| {
            let (rm, rs) = mean_std(recent, get);
            let (pm, ps) = mean_std(previous, get);
            let mean_change = (rm - pm).abs() / (pm + EPS);
            let std_change = (rs - ps).abs() / (ps + EPS);
            (mean_change + std_change) / 2.0
        })
        .collect();
    let avg = scores.iter().sum::<f64>() / scores.len() as f64;

    if avg > 0.15 {
        DriftLevel::High
    } else if avg > 0.08 {
        DriftLevel::Medium
    } else {
        DriftLevel::Low
    }
}

fn feature_drift(recent: &[&ScoredTransaction], previous: &[&ScoredTransaction]) -> Vec<String> {
    if recent.is_empty() || previous.is_empty() {
        return Vec::new();
    }
    DRIFT_FEATURES
        .iter()
        .filter_map(|&(name, get)| {
            let (rm, _) = mean_std(recent, get);
            let (pm, _) = mean_std(previous, get);
            let change = (rm - pm).abs() / (pm + EPS);
            (change > 0.12).then(|| format!("{name}: {:.1}% drift detected", change * 100.0))
        })
        .collect()
}

fn recommend(change: &MetricsChange, drift: DriftLevel, feature_alerts: &[String]) -> String {
    let mut recs: Vec<String> = Vec::new();
    if change.recall < -2.0 {
        recs.push("Recall dropped significantly. Retrain with recent data.".into());
    }
    if change.precision < -2.0 {
        recs.push("Precision decreased. Review false positive patterns.".into());
    }
    match drift {
        DriftLevel::High => recs.push("High data drift detected. Immediate retraining recommended.".into()),
        DriftLevel::Medium => recs.push("Moderate drift detected. Schedule retraining within 48 hours.".into()),
        DriftLevel::Low => {}
    }
    if feature_alerts.len() > 2 {
        recs.push(format!("{} features showing drift. Review feature engineering.", feature_alerts.len()));
    }
    if recs.is_empty() {
        "Model performing well. Continue monitoring.".into()
    } else {
        recs.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Derived, RiskCategory, Score, Signals, Transaction, TransactionType};
    use crate::state::DataSource;
    use chrono::{TimeZone, Utc};

    fn row(day: u32, prob: f64, is_fraud: bool, amount: f64, velocity: f64) -> ScoredTransaction {
        let ts = Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap();
        let txn = Transaction {
            transaction_id:    format!("T{day}-{prob}-{amount}"),
            timestamp:         ts,
            sender_account:    "A".into(),
            receiver_account:  "B".into(),
            amount,
            transaction_type:  TransactionType::Payment,
            merchant_category: "retail".into(),
            location:          "Berlin".into(),
            device_used:       "pos".into(),
            payment_channel:   "card".into(),
            is_fraud,
            fraud_type:        None,
            ip_address:        None,
            device_hash:       None,
            signals: Signals { velocity_score: velocity, ..Default::default() },
        };
        let score = Score { fraud_probability: prob, risk_category: RiskCategory::Low };
        ScoredTransaction { derived: Derived::new(ts, score), txn }
    }

    fn dataset(rows: Vec<ScoredTransaction>) -> Dataset {
        Dataset::from_scored(rows, DataSource::Fixture, 1)
    }

    #[test]
    fn confusion_counts_and_rates() {
        let ds = dataset(vec![
            row(30, 0.9, true, 100.0, 0.0),   // tp
            row(30, 0.8, false, 10.0, 0.0),   // fp
            row(29, 0.2, true, 250.0, 0.0),   // fn
            row(29, 0.1, false, 10.0, 0.0),   // tn
            row(28, 0.1, false, 10.0, 0.0),   // tn
            row(1, 0.1, true, 9_999.0, 0.0),  // outside the 7-day window
        ]);
        let cm = confusion_matrix(&ds, 0.5);
        assert_eq!((cm.true_positive, cm.false_positive, cm.false_negative, cm.true_negative), (1, 1, 1, 2));
        assert_eq!(cm.false_positive_rate, 0.3333);
        assert_eq!(cm.false_negative_rate, 0.5);
        assert_eq!(cm.cost_impact, 300.0);
    }

    #[test]
    fn counter_ratios_guard_empty_denominators() {
        let c = ConfusionCounts::default();
        assert_eq!(c.precision(), 0.0);
        assert_eq!(c.recall(), 0.0);
        assert_eq!(c.f1(), 0.0);
        assert_eq!(c.accuracy(), 0.0);
        assert_eq!(c.fpr(), 0.0);
    }

    #[test]
    fn auc_perfect_random_and_degenerate() {
        let perfect = [row(1, 0.9, true, 1.0, 0.0), row(1, 0.8, true, 1.0, 0.0), row(1, 0.1, false, 1.0, 0.0)];
        let refs: Vec<_> = perfect.iter().collect();
        assert_eq!(auc_roc(&refs), 1.0);

        let inverted = [row(1, 0.1, true, 1.0, 0.0), row(1, 0.9, false, 1.0, 0.0)];
        let refs: Vec<_> = inverted.iter().collect();
        assert_eq!(auc_roc(&refs), 0.0);

        let tied = [row(1, 0.5, true, 1.0, 0.0), row(1, 0.5, false, 1.0, 0.0)];
        let refs: Vec<_> = tied.iter().collect();
        assert_eq!(auc_roc(&refs), 0.5);

        let one_class = [row(1, 0.5, true, 1.0, 0.0)];
        let refs: Vec<_> = one_class.iter().collect();
        assert_eq!(auc_roc(&refs), 0.5);
    }

    #[test]
    fn pearson_basics() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[0.0, 1.0, 0.0]), 0.0);
        assert_eq!(pearson(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn feature_importance_ranks_the_informative_signal_first() {
        let ds = dataset(vec![
            row(1, 0.9, true, 100.0, 0.95),
            row(2, 0.8, true, 120.0, 0.90),
            row(3, 0.1, false, 110.0, 0.05),
            row(4, 0.2, false, 105.0, 0.10),
        ]);
        let fi = feature_importance(&ds);
        assert_eq!(fi.len(), 5);
        assert_eq!(fi[0].feature, "velocity_score");
        assert!(fi[0].importance > 90.0);
        assert!(fi.windows(2).all(|w| w[0].importance >= w[1].importance));
    }

    #[test]
    fn health_compares_windows_and_flags_drift() {
        let mut rows = Vec::new();
        for d in 1..=10 {
            rows.push(row(d, 0.9, true, 100.0, 0.2));
            rows.push(row(d, 0.1, false, 100.0, 0.2));
        }
        for d in 25..=30 {
            // Recent: recall collapses, velocity jumps
            rows.push(row(d, 0.1, true, 400.0, 0.9));
            rows.push(row(d, 0.1, false, 400.0, 0.9));
        }
        let ds = dataset(rows);
        let h = model_health(&ds, &ModelSettings::default());
        assert_eq!(h.previous_metrics.recall, 1.0);
        assert_eq!(h.current_metrics.recall, 0.0);
        assert_eq!(h.metrics_change.recall, -100.0);
        assert_eq!(h.data_drift_status, DriftLevel::High);
        assert!(h.feature_drift_alerts.iter().any(|a| a.starts_with("velocity_score")));
        assert!(h.recommendation.contains("Recall dropped"));
        assert_eq!(h.model_version, "v2.3.1");
        assert_eq!(h.recent_rows + h.previous_rows, ds.len());
    }

    #[test]
    fn health_on_empty_dataset_is_calm() {
        let ds = dataset(Vec::new());
        let h = model_health(&ds, &ModelSettings::default());
        assert_eq!(h.data_drift_status, DriftLevel::Low);
        assert_eq!(h.recommendation, "Model performing well. Continue monitoring.");
        assert!(feature_importance(&ds).iter().all(|f| f.importance == 0.0));
    }
}
