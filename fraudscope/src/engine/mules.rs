// fraudscope/src/engine/mules.rs
//
// Money-mule detection over the full, unfiltered dataset.
//
// A mule receives from many distinct senders and pushes most of it back out:
//   unique_senders       >= min_senders
//   redistribution_ratio >= redistribution_threshold   (sent / received)
//
// Only accounts seen on both sides qualify. Output is sorted by ratio desc,
// then unique senders desc, then account id, and capped at `limit`. Amounts
// are reported in cents; the ratio is taken before rounding.

use std::collections::{BTreeMap, HashSet};

use crate::records::{redistribution_ratio, round_dp, MuleCandidate, ScoredTransaction};

#[derive(Debug, Clone, Copy)]
pub struct MuleParams {
    pub min_senders:              usize,
    pub redistribution_threshold: f64,
    pub limit:                    usize,
}

impl From<&crate::config::MuleSettings> for MuleParams {
    fn from(m: &crate::config::MuleSettings) -> Self {
        Self {
            min_senders:              m.min_senders,
            redistribution_threshold: m.redistribution_threshold,
            limit:                    m.limit,
        }
    }
}

/// Per-account money flow, both directions.
#[derive(Debug, Default)]
pub struct AccountFlow<'a> {
    pub senders:            HashSet<&'a str>,
    pub receivers:          HashSet<&'a str>,
    pub amount_received:    f64,
    pub amount_sent:        f64,
    pub received_count:     usize,
    pub sent_count:         usize,
    pub received_prob_sum:  f64,
    pub sent_prob_sum:      f64,
}

impl AccountFlow<'_> {
    pub fn ratio(&self) -> f64 {
        redistribution_ratio(self.amount_sent, self.amount_received)
    }

    pub fn avg_received_prob(&self) -> f64 {
        if self.received_count > 0 { self.received_prob_sum / self.received_count as f64 } else { 0.0 }
    }
}

pub fn account_flows(rows: &[ScoredTransaction]) -> BTreeMap<&str, AccountFlow<'_>> {
    let mut flows: BTreeMap<&str, AccountFlow<'_>> = BTreeMap::new();
    for r in rows {
        let out = flows.entry(r.sender()).or_default();
        out.receivers.insert(r.receiver());
        out.amount_sent += r.amount();
        out.sent_count += 1;
        out.sent_prob_sum += r.fraud_probability();

        let inc = flows.entry(r.receiver()).or_default();
        inc.senders.insert(r.sender());
        inc.amount_received += r.amount();
        inc.received_count += 1;
        inc.received_prob_sum += r.fraud_probability();
    }
    flows
}

pub fn detect_mule_accounts(rows: &[ScoredTransaction], params: MuleParams) -> Vec<MuleCandidate> {
    let mut out: Vec<MuleCandidate> = account_flows(rows)
        .into_iter()
        .filter(|(_, f)| f.received_count > 0 && f.sent_count > 0)
        .filter(|(_, f)| f.senders.len() >= params.min_senders)
        .filter(|(_, f)| f.ratio() >= params.redistribution_threshold)
        .map(|(account, f)| MuleCandidate {
            account:              account.to_string(),
            unique_senders:       f.senders.len(),
            amount_received:      round_dp(f.amount_received, 2),
            avg_fraud_prob:       f.avg_received_prob(),
            unique_receivers:     f.receivers.len(),
            amount_sent:          round_dp(f.amount_sent, 2),
            redistribution_ratio: f.ratio(),
        })
        .collect();

    out.sort_by(|a, b| {
        b.redistribution_ratio
            .total_cmp(&a.redistribution_ratio)
            .then(b.unique_senders.cmp(&a.unique_senders))
            .then_with(|| a.account.cmp(&b.account))
    });
    out.truncate(params.limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::scored;

    const P: MuleParams = MuleParams { min_senders: 5, redistribution_threshold: 0.8, limit: 20 };

    fn fan_in(mule: &str, senders: usize, each: f64) -> Vec<ScoredTransaction> {
        (0..senders)
            .flat_map(|i| scored(&format!("{mule}_S{i}"), mule, each, 0.4, 1))
            .collect()
    }

    #[test]
    fn six_senders_ninety_percent_is_flagged() {
        let mut rows = fan_in("M", 6, 100.0);
        rows.extend(scored("M", "OUT", 540.0, 0.9, 1));
        let mules = detect_mule_accounts(&rows, P);
        assert_eq!(mules.len(), 1);
        let m = &mules[0];
        assert_eq!(m.account, "M");
        assert_eq!(m.unique_senders, 6);
        assert_eq!(m.unique_receivers, 1);
        assert!((m.redistribution_ratio - 0.9).abs() < 1e-12);
        assert!((m.avg_fraud_prob - 0.4).abs() < 1e-12);
    }

    #[test]
    fn two_senders_never_flagged() {
        let mut rows = fan_in("M", 2, 100.0);
        rows.extend(scored("M", "OUT", 10_000.0, 0.9, 1));
        assert!(detect_mule_accounts(&rows, P).is_empty());
    }

    #[test]
    fn repeat_sender_counts_once() {
        let mut rows = scored("S", "M", 100.0, 0.5, 6);
        rows.extend(scored("M", "OUT", 600.0, 0.5, 1));
        assert!(detect_mule_accounts(&rows, P).is_empty());
    }

    #[test]
    fn low_ratio_and_receive_only_are_not_flagged() {
        let mut rows = fan_in("KEEP", 8, 100.0);
        rows.extend(scored("KEEP", "OUT", 100.0, 0.5, 1));
        rows.extend(fan_in("SINK", 8, 100.0));
        assert!(detect_mule_accounts(&rows, P).is_empty());
    }

    #[test]
    fn zero_received_ratio_is_zero() {
        let rows = scored("ONLY_SENDS", "X", 500.0, 0.5, 3);
        let flows = account_flows(&rows);
        assert_eq!(flows["ONLY_SENDS"].ratio(), 0.0);
    }

    #[test]
    fn ordering_and_limit() {
        let mut rows = Vec::new();
        for (name, senders, out) in [("M1", 6, 480.0), ("M2", 7, 700.0), ("M3", 9, 900.0), ("M4", 6, 600.0)] {
            rows.extend(fan_in(name, senders, 100.0));
            rows.extend(scored(name, "OUT", out, 0.5, 1));
        }
        let mules = detect_mule_accounts(&rows, MuleParams { limit: 3, ..P });
        let order: Vec<_> = mules.iter().map(|m| m.account.as_str()).collect();
        // M3 and M2 and M4 all at 1.0; ties broken by unique senders then id
        assert_eq!(order, vec!["M3", "M2", "M4"]);
    }

    #[test]
    fn amounts_in_cents_ratio_unrounded() {
        let mut rows = fan_in("M", 5, 33.334);
        rows.extend(scored("M", "OUT", 150.0, 0.5, 1));
        let m = &detect_mule_accounts(&rows, P)[0];
        assert_eq!(m.amount_received, 166.67);
        assert_eq!(m.amount_sent, 150.0);
        assert!((m.redistribution_ratio - 150.0 / (5.0 * 33.334)).abs() < 1e-12);
    }

    #[test]
    fn empty_dataset() {
        assert!(detect_mule_accounts(&[], P).is_empty());
    }
}
