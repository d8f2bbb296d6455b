// fraudscope/src/reports/alerts.rs
//
// Alert feed and behavioral anomaly counts.
//
// Smart alerts, each raised at most once per call:
//   001  CRITICAL  window fraud rate above 2× the overall rate
//   002  CRITICAL  fraud rings among the window's suspicious transfers
//   003  MEDIUM    recall fell by RECALL_DROP_PP or more, recent week vs earlier
//   004  LOW       window volume above 1.2× the mean daily volume
//
// Behavioral anomalies, over senders:
//   testing_phase         last 7 days; two small payments then a large one
//   device_switching      last 7 days; more than two devices
//   dormant_reactivation  whole history; a gap of 90+ days between payments
//
// Alert timestamps are the newest row in the data so a feed is reproducible
// for a given snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::config::{ModelSettings, NetworkSettings};
use crate::engine::{detect_fraud_rings, GraphParams, RelationshipGraph, RingParams};
use crate::eval;
use crate::records::{RiskCategory, ScoredTransaction};
use crate::state::Dataset;

const SPIKE_FACTOR: f64 = 2.0;
const VOLUME_FACTOR: f64 = 1.2;
/// Percentage points of recall lost before a retrain warning.
pub const RECALL_DROP_PP: f64 = 2.0;
const RING_ALERT_ACCOUNTS: usize = 20;

const ANOMALY_WINDOW_HOURS: i64 = 7 * 24;
const TESTING_SMALL: f64 = 50.0;
const TESTING_LARGE: f64 = 500.0;
const MAX_DEVICES: usize = 2;
const DORMANT_DAYS: i64 = 90;
const SAMPLE_ACCOUNTS: usize = 10;

// ── Smart alerts ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub alert_id:         String,
    pub severity:         RiskCategory,
    pub title:            String,
    pub description:      String,
    pub timestamp:        Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_accounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartAlertFeed {
    pub critical_alerts: Vec<Alert>,
    pub warning_alerts:  Vec<Alert>,
    pub info_alerts:     Vec<Alert>,
    pub total_unread:    usize,
    pub window_hours:    i64,
    pub last_updated:    Option<DateTime<Utc>>,
}

pub fn smart_alerts(
    ds: &Arc<Dataset>,
    hours: i64,
    network: &NetworkSettings,
    model: &ModelSettings,
) -> SmartAlertFeed {
    let latest = ds.latest();
    let stamp = latest.map(|t| t.format("%Y%m%d%H%M%S").to_string()).unwrap_or_default();
    let alert = |seq: u32, severity: RiskCategory, title: String, description: String, related: Vec<String>| {
        Alert {
            alert_id: format!("ALERT_{stamp}_{seq:03}"),
            severity,
            title,
            description,
            timestamp: latest,
            related_accounts: related,
        }
    };

    let recent = ds.recent(hours);
    let mut feed = SmartAlertFeed {
        critical_alerts: Vec::new(),
        warning_alerts:  Vec::new(),
        info_alerts:     Vec::new(),
        total_unread:    0,
        window_hours:    hours,
        last_updated:    latest,
    };

    let current_rate = fraud_rate(recent.iter(), recent.len());
    let overall_rate = fraud_rate(ds.rows().iter(), ds.len());
    if current_rate > overall_rate * SPIKE_FACTOR {
        feed.critical_alerts.push(alert(
            1,
            RiskCategory::Critical,
            "Fraud Rate Spike Detected".into(),
            format!(
                "Fraud rate increased to {:.1}% (+{:.1}%)",
                current_rate * 100.0,
                (current_rate - overall_rate) * 100.0
            ),
            Vec::new(),
        ));
    }

    // Ring detection wants a contiguous slice
    let window: Vec<ScoredTransaction> = recent.iter().cloned().collect();
    let graph = RelationshipGraph::build(&window, GraphParams::from(network));
    let rings = detect_fraud_rings(&graph, RingParams::from(network));
    if !rings.is_empty() {
        let accounts: Vec<String> = rings
            .iter()
            .flat_map(|r| r.accounts.iter().cloned())
            .take(RING_ALERT_ACCOUNTS)
            .collect();
        let members: usize = rings.iter().map(|r| r.account_count).sum();
        feed.critical_alerts.push(alert(
            2,
            RiskCategory::Critical,
            format!("{} Fraud Ring(s) Detected", rings.len()),
            format!("Circular transaction patterns involving {members} accounts"),
            accounts,
        ));
    }

    let health = eval::model_health(ds, model);
    let recall_change = health.metrics_change.recall;
    if recall_change <= -RECALL_DROP_PP {
        feed.warning_alerts.push(alert(
            3,
            RiskCategory::Medium,
            "Model Performance Degradation".into(),
            format!("Recall dropped {:.1}% in the last week. Retrain recommended.", -recall_change),
            Vec::new(),
        ));
    }

    let daily = mean_daily_volume(ds.rows());
    if daily > 0.0 && recent.len() as f64 > daily * VOLUME_FACTOR {
        feed.info_alerts.push(alert(
            4,
            RiskCategory::Low,
            "High Transaction Volume".into(),
            format!(
                "Transaction volume {:.0}% above the daily average: {} transactions",
                (recent.len() as f64 / daily - 1.0) * 100.0,
                recent.len()
            ),
            Vec::new(),
        ));
    }

    feed.total_unread = feed.critical_alerts.len() + feed.warning_alerts.len() + feed.info_alerts.len();
    feed
}

fn fraud_rate<'a>(rows: impl Iterator<Item = &'a ScoredTransaction>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    rows.filter(|r| r.txn.is_fraud).count() as f64 / n as f64
}

/// Rows per calendar day, averaged over the days that have any.
fn mean_daily_volume(rows: &[ScoredTransaction]) -> f64 {
    let mut days: HashMap<NaiveDate, usize> = HashMap::new();
    for r in rows {
        *days.entry(r.txn.timestamp.date_naive()).or_default() += 1;
    }
    if days.is_empty() {
        0.0
    } else {
        rows.len() as f64 / days.len() as f64
    }
}

// ── Behavioral anomalies ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    TestingPhase,
    DeviceSwitching,
    DormantReactivation,
}

#[derive(Debug, Clone, Serialize)]
pub struct BehavioralAnomaly {
    pub anomaly_type:      AnomalyKind,
    pub affected_accounts: usize,
    pub description:       &'static str,
    pub severity:          RiskCategory,
    /// First few affected senders, alphabetical.
    pub sample_accounts:   Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BehavioralAnomalies {
    pub anomalies:       Vec<BehavioralAnomaly>,
    pub total_anomalies: usize,
    pub last_updated:    Option<DateTime<Utc>>,
}

pub fn behavioral_anomalies(ds: &Arc<Dataset>) -> BehavioralAnomalies {
    let recent = ds.recent(ANOMALY_WINDOW_HOURS);
    let week = by_sender(recent.iter());
    let history = by_sender(ds.rows().iter());

    let testing: Vec<&str> = week
        .iter()
        .filter(|(_, rows)| is_testing_phase(rows))
        .map(|(&s, _)| s)
        .collect();
    let switching: Vec<&str> = week
        .iter()
        .filter(|(_, rows)| {
            let devices: HashSet<&str> = rows.iter().map(|r| r.txn.device_used.as_str()).collect();
            devices.len() > MAX_DEVICES
        })
        .map(|(&s, _)| s)
        .collect();
    let dormant: Vec<&str> = history
        .iter()
        .filter(|(_, rows)| {
            rows.windows(2)
                .any(|w| w[1].txn.timestamp - w[0].txn.timestamp >= Duration::days(DORMANT_DAYS))
        })
        .map(|(&s, _)| s)
        .collect();

    let anomalies: Vec<BehavioralAnomaly> = [
        (
            AnomalyKind::TestingPhase,
            testing,
            "Small transactions followed by large transactions pattern",
            RiskCategory::High,
        ),
        (
            AnomalyKind::DeviceSwitching,
            switching,
            "Multiple devices used in short time window",
            RiskCategory::Medium,
        ),
        (
            AnomalyKind::DormantReactivation,
            dormant,
            "Inactive accounts (90+ days) suddenly active",
            RiskCategory::Critical,
        ),
    ]
    .into_iter()
    .filter(|(_, accounts, ..)| !accounts.is_empty())
    .map(|(anomaly_type, accounts, description, severity)| BehavioralAnomaly {
        anomaly_type,
        affected_accounts: accounts.len(),
        description,
        severity,
        sample_accounts: accounts.iter().take(SAMPLE_ACCOUNTS).map(|s| s.to_string()).collect(),
    })
    .collect();

    BehavioralAnomalies {
        total_anomalies: anomalies.len(),
        anomalies,
        last_updated: ds.latest(),
    }
}

/// Rows per sender, oldest first; senders in alphabetical order.
fn by_sender<'a>(
    rows: impl Iterator<Item = &'a ScoredTransaction>,
) -> BTreeMap<&'a str, Vec<&'a ScoredTransaction>> {
    let mut out: BTreeMap<&str, Vec<&ScoredTransaction>> = BTreeMap::new();
    for r in rows {
        out.entry(r.sender()).or_default().push(r);
    }
    for rows in out.values_mut() {
        rows.sort_by_key(|r| r.txn.timestamp);
    }
    out
}

/// At least three payments, the first two under TESTING_SMALL and one of
/// the last two over TESTING_LARGE.
fn is_testing_phase(rows: &[&ScoredTransaction]) -> bool {
    rows.len() >= 3
        && rows[..2].iter().all(|r| r.amount() < TESTING_SMALL)
        && rows[rows.len() - 2..].iter().any(|r| r.amount() > TESTING_LARGE)
}
