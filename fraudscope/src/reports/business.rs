// fraudscope/src/reports/business.rs
//
// Business tiles: what the model saved over a period, and which
// payment-channel × merchant-category cells carry the most fraud.
//
// Financial impact uses the model's decision threshold:
//   prevented   fraud at or above the threshold
//   losses      fraud below it
//   costs       PREVENTION_COST per transaction screened
//   false pos.  legitimate rows at or above it × FALSE_POSITIVE_COST
//   net         prevented − losses − costs − false pos.
//   ROI         net / (costs + false pos.) in percent

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::eval::FALSE_POSITIVE_COST;
use crate::records::{round_dp, RiskCategory};
use crate::state::Dataset;

/// Screening cost per transaction.
pub const PREVENTION_COST: f64 = 0.10;
const MAX_RECOMMENDATIONS: usize = 3;

// ── Financial impact ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FinancialImpact {
    pub fraud_prevented:       f64,
    pub fraud_losses:          f64,
    pub prevention_costs:      f64,
    pub false_positive_impact: f64,
    pub net_savings:           f64,
    pub roi_percentage:        f64,
    pub period_days:           i64,
    pub transaction_count:     usize,
}

pub fn financial_impact(ds: &Arc<Dataset>, period_days: i64, threshold: f64) -> FinancialImpact {
    let period = ds.recent(period_days * 24);

    let mut prevented = 0.0;
    let mut losses = 0.0;
    let mut false_positives = 0usize;
    for r in period.iter() {
        let flagged = r.fraud_probability() >= threshold;
        match (r.txn.is_fraud, flagged) {
            (true, true) => prevented += r.amount(),
            (true, false) => losses += r.amount(),
            (false, true) => false_positives += 1,
            (false, false) => {}
        }
    }

    let costs = period.len() as f64 * PREVENTION_COST;
    let fp_impact = false_positives as f64 * FALSE_POSITIVE_COST;
    let net = prevented - losses - costs - fp_impact;
    let spend = costs + fp_impact;

    FinancialImpact {
        fraud_prevented:       round_dp(prevented, 2),
        fraud_losses:          round_dp(losses, 2),
        prevention_costs:      round_dp(costs, 2),
        false_positive_impact: round_dp(fp_impact, 2),
        net_savings:           round_dp(net, 2),
        roi_percentage:        if spend > 0.0 { round_dp(net / spend * 100.0, 1) } else { 0.0 },
        period_days,
        transaction_count:     period.len(),
    }
}

// ── Merchant × channel risk ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RiskMatrixCell {
    pub channel:           String,
    pub category:          String,
    /// Percent.
    pub fraud_rate:        f64,
    pub transaction_count: usize,
    pub risk_level:        RiskCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantChannelRisk {
    /// Channel, then category, alphabetical.
    pub risk_matrix:              Vec<RiskMatrixCell>,
    pub highest_risk_combination: Option<RiskMatrixCell>,
    pub recommendations:          Vec<String>,
}

/// Cell level from its fraud fraction: >8% critical, >5% high, >3% medium.
pub fn cell_risk(rate: f64) -> RiskCategory {
    match rate {
        r if r > 0.08 => RiskCategory::Critical,
        r if r > 0.05 => RiskCategory::High,
        r if r > 0.03 => RiskCategory::Medium,
        _ => RiskCategory::Low,
    }
}

pub fn merchant_channel_risk(ds: &Arc<Dataset>) -> MerchantChannelRisk {
    let mut cells: BTreeMap<(&str, &str), (usize, usize)> = BTreeMap::new();
    for r in ds.rows() {
        let e = cells.entry((r.txn.payment_channel.as_str(), r.txn.merchant_category.as_str())).or_default();
        e.0 += 1;
        if r.txn.is_fraud {
            e.1 += 1;
        }
    }

    let risk_matrix: Vec<RiskMatrixCell> = cells
        .into_iter()
        .map(|((channel, category), (n, fraud))| {
            let rate = fraud as f64 / n as f64;
            RiskMatrixCell {
                channel:           channel.to_string(),
                category:          category.to_string(),
                fraud_rate:        round_dp(rate * 100.0, 2),
                transaction_count: n,
                risk_level:        cell_risk(rate),
            }
        })
        .collect();

    // First cell in matrix order wins a tie
    let highest_risk_combination = risk_matrix
        .iter()
        .fold(None::<&RiskMatrixCell>, |best, c| match best {
            Some(b) if b.fraud_rate >= c.fraud_rate => Some(b),
            _ => Some(c),
        })
        .cloned();

    let mut flagged: Vec<&RiskMatrixCell> = risk_matrix
        .iter()
        .filter(|c| c.risk_level >= RiskCategory::High)
        .collect();
    flagged.sort_by(|a, b| b.fraud_rate.total_cmp(&a.fraud_rate));
    let recommendations = if flagged.is_empty() {
        vec!["No channel and category combination above 5% fraud".to_string()]
    } else {
        flagged
            .iter()
            .take(MAX_RECOMMENDATIONS)
            .map(|c| format!("Implement 2FA for {} + {} transactions ({:.2}% fraud)", c.channel, c.category, c.fraud_rate))
            .collect()
    };

    MerchantChannelRisk { risk_matrix, highest_risk_combination, recommendations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Derived, Score, ScoredTransaction, Signals, Transaction, TransactionType};
    use crate::state::DataSource;
    use chrono::{TimeZone, Utc};

    fn row(i: usize, day: u32, channel: &str, category: &str, amount: f64, prob: f64, fraud: bool) -> ScoredTransaction {
        let ts = Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap();
        let txn = Transaction {
            transaction_id:    format!("T{i:04}"),
            timestamp:         ts,
            sender_account:    "S".into(),
            receiver_account:  "R".into(),
            amount,
            transaction_type:  TransactionType::Payment,
            merchant_category: category.into(),
            location:          "Berlin".into(),
            device_used:       "web".into(),
            payment_channel:   channel.into(),
            is_fraud:          fraud,
            fraud_type:        None,
            ip_address:        None,
            device_hash:       None,
            signals:           Signals::default(),
        };
        let score = Score { fraud_probability: prob, risk_category: RiskCategory::Low };
        ScoredTransaction { derived: Derived::new(ts, score), txn }
    }

    fn dataset(rows: Vec<ScoredTransaction>) -> Arc<Dataset> {
        Arc::new(Dataset::from_scored(rows, DataSource::Fixture, 1))
    }

    #[test]
    fn impact_splits_on_the_decision_threshold() {
        let ds = dataset(vec![
            row(1, 30, "card", "retail", 1000.0, 0.9, true),   // prevented
            row(2, 30, "card", "retail", 250.0, 0.2, true),    // lost
            row(3, 30, "card", "retail", 80.0, 0.7, false),    // false positive
            row(4, 30, "card", "retail", 40.0, 0.1, false),
            row(5, 1, "card", "retail", 9999.0, 0.9, true),    // outside 7 days
        ]);
        let f = financial_impact(&ds, 7, 0.5);
        assert_eq!(f.transaction_count, 4);
        assert_eq!(f.fraud_prevented, 1000.0);
        assert_eq!(f.fraud_losses, 250.0);
        assert_eq!(f.prevention_costs, 0.4);
        assert_eq!(f.false_positive_impact, 50.0);
        assert_eq!(f.net_savings, 699.6);
        // 699.6 / 50.4
        assert_eq!(f.roi_percentage, 1388.1);
    }

    #[test]
    fn impact_on_empty_dataset() {
        let f = financial_impact(&dataset(Vec::new()), 30, 0.5);
        assert_eq!(f.transaction_count, 0);
        assert_eq!(f.roi_percentage, 0.0);
    }

    #[test]
    fn cell_levels() {
        assert_eq!(cell_risk(0.09), RiskCategory::Critical);
        assert_eq!(cell_risk(0.08), RiskCategory::High);
        assert_eq!(cell_risk(0.05), RiskCategory::Medium);
        assert_eq!(cell_risk(0.03), RiskCategory::Low);
    }

    #[test]
    fn matrix_ranks_channel_category_cells() {
        let mut rows = Vec::new();
        let mut i = 0;
        let mut push = |channel: &str, category: &str, n: usize, fraud: usize| {
            for k in 0..n {
                rows.push(row(i, 20, channel, category, 10.0, 0.1, k < fraud));
                i += 1;
            }
        };
        push("card", "travel", 10, 1);   // 10%
        push("card", "grocery", 100, 2); // 2%
        push("upi", "online", 20, 4);    // 20%
        let m = merchant_channel_risk(&dataset(rows));

        assert_eq!(m.risk_matrix.len(), 3);
        assert_eq!((m.risk_matrix[0].channel.as_str(), m.risk_matrix[0].category.as_str()), ("card", "grocery"));
        assert_eq!(m.risk_matrix[0].risk_level, RiskCategory::Low);
        let top = m.highest_risk_combination.unwrap();
        assert_eq!((top.channel.as_str(), top.fraud_rate), ("upi", 20.0));
        assert_eq!(m.recommendations.len(), 2);
        assert!(m.recommendations[0].starts_with("Implement 2FA for upi + online"));
    }

    #[test]
    fn quiet_matrix_says_so() {
        let m = merchant_channel_risk(&dataset(vec![row(1, 20, "card", "retail", 5.0, 0.1, false)]));
        assert_eq!(m.recommendations.len(), 1);
        assert!(m.highest_risk_combination.is_some());
        assert!(merchant_channel_risk(&dataset(Vec::new())).highest_risk_combination.is_none());
    }
}
