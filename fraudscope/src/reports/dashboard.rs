// fraudscope/src/reports/dashboard.rs
//
// Dashboard aggregations over the scored snapshot. Every window is measured
// back from the newest row in the data.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::records::{round_dp, RiskCategory, ScoredTransaction};
use crate::state::Dataset;

/// Probability at which a high-risk alert is escalated to CRITICAL.
pub const CRITICAL_ALERT_PROB: f64 = 0.9;
pub const FEED_DISPLAY_LIMIT: usize = 20;
const SPIKE_FACTOR: f64 = 1.5;
const EMERGING_CHANGE_PCT: f64 = 20.0;

// ── Executive overview ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveOverview {
    pub window_hours:       i64,
    pub fraud_amount:       f64,
    /// Percent of transactions in the window labelled fraud.
    pub fraud_rate:         f64,
    /// Percentage points vs the previous window of the same length.
    pub fraud_rate_change:  f64,
    pub blocked_amount:     f64,
    /// Seconds; mean velocity × 2.
    pub avg_detection_time: f64,
    pub alerts_pending:     usize,
    pub transaction_count:  usize,
    pub as_of:              Option<DateTime<Utc>>,
}

pub fn executive_overview(ds: &Arc<Dataset>, hours: i64, high_risk_threshold: f64) -> ExecutiveOverview {
    let current = ds.recent(hours);
    let n = current.len();

    let fraud_rate = pct(current.iter().filter(|r| r.txn.is_fraud).count(), n);
    let prev_rate = match ds.latest() {
        Some(latest) => {
            let cutoff = latest - Duration::hours(hours);
            let previous: Vec<&ScoredTransaction> = ds.between(cutoff - Duration::hours(hours), cutoff).collect();
            if previous.is_empty() {
                fraud_rate
            } else {
                pct(previous.iter().filter(|r| r.txn.is_fraud).count(), previous.len())
            }
        }
        None => fraud_rate,
    };

    let fraud_amount: f64 = current.iter().filter(|r| r.txn.is_fraud).map(|r| r.amount()).sum();
    let blocked: Vec<&ScoredTransaction> = current
        .iter()
        .filter(|r| r.fraud_probability() >= high_risk_threshold)
        .collect();
    let avg_velocity = if n == 0 {
        0.0
    } else {
        current.iter().map(|r| r.txn.signals.velocity_score).sum::<f64>() / n as f64
    };

    ExecutiveOverview {
        window_hours:       hours,
        fraud_amount:       round_dp(fraud_amount, 2),
        fraud_rate:         round_dp(fraud_rate, 2),
        fraud_rate_change:  round_dp(fraud_rate - prev_rate, 2),
        blocked_amount:     round_dp(blocked.iter().map(|r| r.amount()).sum(), 2),
        avg_detection_time: round_dp(avg_velocity * 2.0, 2),
        alerts_pending:     blocked.len(),
        transaction_count:  n,
        as_of:              ds.latest(),
    }
}

// ── High-risk feed ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct HighRiskTransaction {
    pub transaction_id:   String,
    pub amount:           f64,
    pub fraud_type:       String,
    pub location:         String,
    pub device_used:      String,
    pub confidence:       f64,
    pub time_since_last:  f64,
    pub timestamp:        DateTime<Utc>,
    pub risk_level:       RiskCategory,
    pub sender_account:   String,
    pub receiver_account: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HighRiskFeed {
    pub critical_alerts:       Vec<HighRiskTransaction>,
    pub high_priority_count:   usize,
    pub medium_priority_count: usize,
    pub total_alerts:          usize,
}

/// Last 24h. Alerts are rows at or above `high_risk_threshold`, highest
/// first, at most `limit` of them counted and the top 20 returned.
pub fn high_risk_feed(ds: &Arc<Dataset>, limit: usize, high_risk_threshold: f64) -> HighRiskFeed {
    let recent = ds.recent(24);

    let mut alerts: Vec<&ScoredTransaction> = recent
        .iter()
        .filter(|r| r.fraud_probability() >= high_risk_threshold)
        .collect();
    alerts.sort_by(|a, b| b.fraud_probability().total_cmp(&a.fraud_probability()));
    alerts.truncate(limit);

    let in_band = |lo: f64, hi: f64| {
        recent
            .iter()
            .filter(|r| (lo..=hi).contains(&r.fraud_probability()))
            .count()
    };
    let high_priority_count = in_band(0.6, 0.75);
    let medium_priority_count = in_band(0.4, 0.6);

    let critical_alerts = alerts
        .iter()
        .take(FEED_DISPLAY_LIMIT)
        .map(|r| HighRiskTransaction {
            transaction_id:   r.txn.transaction_id.clone(),
            amount:           r.amount(),
            fraud_type:       r.txn.fraud_type.clone().unwrap_or_else(|| "Unknown".into()),
            location:         r.txn.location.clone(),
            device_used:      r.txn.device_used.clone(),
            confidence:       r.fraud_probability(),
            time_since_last:  r.txn.signals.time_since_last_transaction,
            timestamp:        r.txn.timestamp,
            risk_level:       if r.fraud_probability() >= CRITICAL_ALERT_PROB {
                RiskCategory::Critical
            } else {
                RiskCategory::High
            },
            sender_account:   r.txn.sender_account.clone(),
            receiver_account: r.txn.receiver_account.clone(),
        })
        .collect();

    HighRiskFeed {
        critical_alerts,
        high_priority_count,
        medium_priority_count,
        total_alerts: alerts.len() + high_priority_count + medium_priority_count,
    }
}

// ── Velocity heatmap ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct HourlyRate {
    pub hour:              u32,
    pub fraud_rate:        f64,
    pub transaction_count: usize,
    pub fraud_count:       usize,
    pub is_spike:          bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VelocityHeatmap {
    pub hourly_rates:       Vec<HourlyRate>,
    /// `HH:00-HH+1:00` of the hour with the highest fraud rate.
    pub peak_attack_window: Option<String>,
    pub current_rate:       f64,
    pub avg_rate:           f64,
}

pub fn velocity_heatmap(ds: &Arc<Dataset>, hours: i64) -> VelocityHeatmap {
    let recent = ds.recent(hours);
    let mut by_hour: BTreeMap<u32, (usize, usize)> = BTreeMap::new();
    for r in recent.iter() {
        let e = by_hour.entry(r.derived.hour).or_default();
        e.0 += 1;
        if r.txn.is_fraud {
            e.1 += 1;
        }
    }

    // Fractions; percent only on output
    let rates: Vec<(u32, usize, usize, f64)> = by_hour
        .into_iter()
        .map(|(h, (n, f))| (h, n, f, f as f64 / n as f64))
        .collect();
    let avg = if rates.is_empty() {
        0.0
    } else {
        rates.iter().map(|r| r.3).sum::<f64>() / rates.len() as f64
    };
    let spike = avg * SPIKE_FACTOR;

    // First hour wins a tie
    let peak = rates
        .iter()
        .fold(None::<&(u32, usize, usize, f64)>, |best, r| match best {
            Some(b) if b.3 >= r.3 => Some(b),
            _ => Some(r),
        })
        .map(|&(h, ..)| format!("{:02}:00-{:02}:00", h, h + 1));

    VelocityHeatmap {
        hourly_rates: rates
            .iter()
            .map(|&(hour, n, f, rate)| HourlyRate {
                hour,
                fraud_rate:        round_dp(rate * 100.0, 2),
                transaction_count: n,
                fraud_count:       f,
                is_spike:          rate > spike,
            })
            .collect(),
        peak_attack_window: peak,
        current_rate: rates.last().map(|r| round_dp(r.3 * 100.0, 2)).unwrap_or(0.0),
        avg_rate:     round_dp(avg * 100.0, 2),
    }
}

// ── Fraud-type breakdown ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FraudTypeStats {
    pub fraud_type:          String,
    pub percentage:          f64,
    pub count:               usize,
    pub change_vs_last_week: f64,
    pub avg_amount:          f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FraudTypeBreakdown {
    pub fraud_types:       Vec<FraudTypeStats>,
    pub total_fraud_count: usize,
    pub dominant_type:     Option<String>,
    pub emerging_threats:  Vec<String>,
}

#[derive(Default)]
struct TypeAgg {
    count:     usize,
    amount:    f64,
    this_week: usize,
    last_week: usize,
}

pub fn fraud_type_breakdown(ds: &Arc<Dataset>) -> FraudTypeBreakdown {
    let fraud = ds.fraud_only();
    let total = fraud.len();
    let Some(latest) = ds.latest() else {
        return FraudTypeBreakdown {
            fraud_types: Vec::new(),
            total_fraud_count: 0,
            dominant_type: None,
            emerging_threats: Vec::new(),
        };
    };
    let week = latest - Duration::days(7);
    let prev_week = week - Duration::days(7);

    let mut types: HashMap<&str, TypeAgg> = HashMap::new();
    for r in fraud.iter() {
        // Untagged fraud counts toward the total but gets no row
        let Some(t) = r.txn.fraud_type.as_deref() else { continue };
        let agg = types.entry(t).or_default();
        agg.count += 1;
        agg.amount += r.amount();
        if r.txn.timestamp >= week {
            agg.this_week += 1;
        } else if r.txn.timestamp >= prev_week {
            agg.last_week += 1;
        }
    }

    let mut fraud_types: Vec<FraudTypeStats> = types
        .into_iter()
        .map(|(t, a)| {
            let change = if a.last_week > 0 {
                (a.this_week as f64 - a.last_week as f64) / a.last_week as f64 * 100.0
            } else {
                0.0
            };
            FraudTypeStats {
                fraud_type:          t.to_string(),
                percentage:          round_dp(pct(a.count, total), 1),
                count:               a.count,
                change_vs_last_week: round_dp(change, 1),
                avg_amount:          round_dp(a.amount / a.count as f64, 2),
            }
        })
        .collect();
    fraud_types.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.fraud_type.cmp(&b.fraud_type)));

    let emerging_threats = fraud_types
        .iter()
        .filter(|t| t.change_vs_last_week > EMERGING_CHANGE_PCT)
        .map(|t| t.fraud_type.clone())
        .collect();

    FraudTypeBreakdown {
        dominant_type: fraud_types.first().map(|t| t.fraud_type.clone()),
        fraud_types,
        total_fraud_count: total,
        emerging_threats,
    }
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 * 100.0 }
}
