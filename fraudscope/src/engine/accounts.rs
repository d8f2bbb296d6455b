// fraudscope/src/engine/accounts.rs
//
// On-demand per-account aggregate over the full dataset.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::records::{redistribution_ratio, round_dp, AccountProfile, NodeRole, ScoredTransaction};

pub fn account_profile(rows: &[ScoredTransaction], account_id: &str) -> Result<AccountProfile> {
    let mut senders: HashSet<&str> = HashSet::new();
    let mut receivers: HashSet<&str> = HashSet::new();
    let (mut sent_count, mut received_count, mut involved) = (0usize, 0usize, 0usize);
    let (mut amount_sent, mut amount_received) = (0.0f64, 0.0f64);
    let (mut volume, mut prob_sum) = (0.0f64, 0.0f64);

    for r in rows {
        let is_sender = r.sender() == account_id;
        let is_receiver = r.receiver() == account_id;
        if !is_sender && !is_receiver {
            continue;
        }
        involved += 1;
        volume += r.amount();
        prob_sum += r.fraud_probability();
        if is_sender {
            sent_count += 1;
            amount_sent += r.amount();
            receivers.insert(r.receiver());
        }
        if is_receiver {
            received_count += 1;
            amount_received += r.amount();
            senders.insert(r.sender());
        }
    }

    if involved == 0 {
        return Err(Error::not_found("account", account_id));
    }

    Ok(AccountProfile {
        account_id:            account_id.to_string(),
        transaction_count:     involved,
        total_volume:          round_dp(volume, 2),
        avg_fraud_probability: prob_sum / involved as f64,
        node_type:             NodeRole::from_counts(sent_count, received_count),
        unique_senders:        senders.len(),
        unique_receivers:      receivers.len(),
        amount_sent:           round_dp(amount_sent, 2),
        amount_received:       round_dp(amount_received, 2),
        redistribution_ratio:  redistribution_ratio(amount_sent, amount_received),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::scored;

    #[test]
    fn profile_covers_both_directions() {
        let mut rows = scored("X", "A", 100.0, 0.2, 2);
        rows.extend(scored("Y", "A", 50.0, 0.4, 1));
        rows.extend(scored("A", "Z", 125.0, 0.6, 1));
        rows.extend(scored("Q", "R", 999.0, 0.9, 5));

        let p = account_profile(&rows, "A").unwrap();
        assert_eq!(p.transaction_count, 4);
        assert_eq!(p.total_volume, 375.0);
        assert_eq!(p.unique_senders, 2);
        assert_eq!(p.unique_receivers, 1);
        assert_eq!(p.amount_received, 250.0);
        assert_eq!(p.amount_sent, 125.0);
        assert_eq!(p.redistribution_ratio, 0.5);
        assert_eq!(p.node_type, NodeRole::Both);
        assert!((p.avg_fraud_probability - 0.35).abs() < 1e-12);
    }

    #[test]
    fn send_only_account_and_unknown_id() {
        let rows = scored("X", "A", 10.0, 0.1, 1);
        let p = account_profile(&rows, "X").unwrap();
        assert_eq!(p.node_type, NodeRole::Sender);
        assert_eq!(p.redistribution_ratio, 0.0);

        let err = account_profile(&rows, "nobody").unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "account", .. }));
    }
}
