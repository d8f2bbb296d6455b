// fraudscope/src/engine/testing.rs
//
// Fixture rows with a fixed fraud probability, for engine unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};

use crate::records::{Derived, RiskCategory, Score, ScoredTransaction, Signals, Transaction, TransactionType};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// `n` identical sender→receiver rows scored at exactly `prob`.
pub fn scored(sender: &str, receiver: &str, amount: f64, prob: f64, n: usize) -> Vec<ScoredTransaction> {
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    (0..n)
        .map(|_| {
            let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
            let txn = Transaction {
                transaction_id:    format!("FIX{id:06}"),
                timestamp:         ts,
                sender_account:    sender.into(),
                receiver_account:  receiver.into(),
                amount,
                transaction_type:  TransactionType::Transfer,
                merchant_category: "other".into(),
                location:          "London".into(),
                device_used:       "web".into(),
                payment_channel:   "wire_transfer".into(),
                is_fraud:          prob >= 0.5,
                fraud_type:        None,
                ip_address:        None,
                device_hash:       None,
                signals:           Signals::default(),
            };
            let score = Score { fraud_probability: prob, risk_category: RiskCategory::Low };
            ScoredTransaction { derived: Derived::new(ts, score), txn }
        })
        .collect()
}
