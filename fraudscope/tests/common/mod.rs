// Fixture datasets with fixed probabilities, shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use fraudscope::config::{DataSettings, ScoringSettings, Settings};
use fraudscope::engine::Scorer;
use fraudscope::records::{Derived, Score, ScoredTransaction, Signals, Transaction, TransactionType};
use fraudscope::state::{DataSource, Dataset, DatasetProvider};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub struct Fixture {
    rows:   Vec<ScoredTransaction>,
    scorer: Scorer,
}

impl Fixture {
    pub fn new() -> Self {
        Self { rows: Vec::new(), scorer: Scorer::default() }
    }

    /// `n` sender→receiver transfers of `amount`, all scored at `prob`.
    pub fn transfers(mut self, sender: &str, receiver: &str, amount: f64, prob: f64, n: usize) -> Self {
        for _ in 0..n {
            let i = self.rows.len();
            let ts = base_time() - Duration::minutes(i as i64);
            let txn = Transaction {
                transaction_id:    format!("T{i:05}"),
                timestamp:         ts,
                sender_account:    sender.into(),
                receiver_account:  receiver.into(),
                amount,
                transaction_type:  TransactionType::Transfer,
                merchant_category: "other".into(),
                location:          "Berlin".into(),
                device_used:       "mobile".into(),
                payment_channel:   "ACH".into(),
                is_fraud:          prob >= 0.5,
                fraud_type:        (prob >= 0.5).then(|| "money_laundering".to_string()),
                ip_address:        None,
                device_hash:       None,
                signals:           Signals::default(),
            };
            let score = Score { fraud_probability: prob, risk_category: self.scorer.category(prob) };
            self.rows.push(ScoredTransaction { derived: Derived::new(ts, score), txn });
        }
        self
    }

    pub fn rows(self) -> Vec<ScoredTransaction> {
        self.rows
    }

    pub fn dataset(self) -> Dataset {
        Dataset::from_scored(self.rows, DataSource::Fixture, 1)
    }
}

/// A->B, B->C, C->A, four transfers each at 0.8.
pub fn triangle(back_edge_prob: f64) -> Fixture {
    Fixture::new()
        .transfers("A", "B", 500.0, 0.8, 4)
        .transfers("B", "C", 480.0, 0.8, 4)
        .transfers("C", "A", 460.0, back_edge_prob, 4)
}

pub fn provider_with(ds: Dataset) -> Arc<DatasetProvider> {
    Arc::new(DatasetProvider::with_dataset(DataSettings::default(), ScoringSettings::default(), ds))
}

/// Provider that will fall back to a small synthetic dataset.
pub fn synthetic_provider(rows: usize) -> Arc<DatasetProvider> {
    let data = DataSettings {
        path: "/nonexistent/fraudscope-test.csv".into(),
        synthetic_rows: rows,
        ..Default::default()
    };
    Arc::new(DatasetProvider::new(data, ScoringSettings::default()))
}

pub fn settings() -> Arc<Settings> {
    Arc::new(Settings::default())
}
