// fraudscope/src/state/synthetic.rs
//
// Reproducible synthetic transaction set, used when the source file is
// missing or unreadable so the API stays demoable.
//
// Composition:
//   - ordinary traffic between a pool of ~rows/8 accounts, low signals
//   - a `fraud_rate` share of ordinary rows flagged as fraud, elevated signals
//   - planted fraud rings: 3–5 accounts passing money around a cycle,
//     4–6 high-signal transfers per hop
//   - planted mule accounts: 6–9 distinct senders in, ~90% forwarded out
//
// Same (rows, fraud_rate, seed) → same output, byte for byte.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::records::{Signals, Transaction, TransactionType};

const SPAN_SECS: i64 = 30 * 24 * 60 * 60;
/// Below this many rows nothing is planted; the pool would be too small.
const MIN_ROWS_FOR_PLANTING: usize = 200;

const MERCHANTS: &[&str] = &["retail", "grocery", "travel", "entertainment", "utilities", "online", "restaurant", "other"];
const LOCATIONS: &[&str] = &["New York", "London", "Tokyo", "Sydney", "Berlin", "Toronto", "Dubai", "Singapore"];
const DEVICES:   &[&str] = &["mobile", "web", "atm", "pos"];
const CHANNELS:  &[&str] = &["card", "ACH", "wire_transfer", "UPI"];
const FRAUD_TYPES: &[&str] = &["account_takeover", "card_not_present", "identity_theft", "phishing", "money_laundering"];
const TYPES: &[TransactionType] = &[
    TransactionType::Deposit,
    TransactionType::Withdrawal,
    TransactionType::Transfer,
    TransactionType::Payment,
];

/// Newest timestamp in every synthetic set.
pub fn synthetic_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).single().unwrap_or_else(Utc::now)
}

pub fn generate(rows: usize, fraud_rate: f64, seed: u64) -> Vec<Transaction> {
    let mut gen = Generator {
        rng: StdRng::seed_from_u64(seed),
        end: synthetic_end(),
        out: Vec::with_capacity(rows),
        fraud_rate: fraud_rate.clamp(0.0, 1.0),
    };

    let n_accounts = (rows / 8).max(10);
    let pool: Vec<String> = (0..n_accounts).map(|i| format!("ACC{:06}", i)).collect();

    if rows >= MIN_ROWS_FOR_PLANTING {
        let n_rings = (rows / 5_000).clamp(1, 6);
        for r in 0..n_rings {
            gen.plant_ring(r, rows);
        }
        let n_mules = (rows / 10_000).clamp(1, 4);
        for m in 0..n_mules {
            gen.plant_mule(m, &pool, rows);
        }
    }

    while gen.out.len() < rows {
        gen.ordinary(&pool);
    }

    let mut out = gen.out;
    out.sort_by_key(|t| t.timestamp);
    for (i, t) in out.iter_mut().enumerate() {
        t.transaction_id = format!("TXN{:08}", i + 1);
    }
    out
}

struct Generator {
    rng:        StdRng,
    end:        DateTime<Utc>,
    out:        Vec<Transaction>,
    fraud_rate: f64,
}

impl Generator {
    fn ordinary(&mut self, pool: &[String]) {
        let sender = pick(&mut self.rng, pool).to_string();
        let mut receiver = pick(&mut self.rng, pool).to_string();
        while receiver == sender {
            receiver = pick(&mut self.rng, pool).to_string();
        }

        let is_fraud = self.rng.gen_bool(self.fraud_rate);
        let signals = if is_fraud {
            Signals {
                velocity_score:              self.rng.gen_range(0.5..1.0),
                geo_anomaly_score:           self.rng.gen_range(0.4..1.0),
                spending_deviation_score:    self.rng.gen_range(0.4..1.0),
                time_since_last_transaction: self.rng.gen_range(1.0..180.0),
            }
        } else {
            Signals {
                velocity_score:              self.rng.gen_range(0.0..0.5),
                geo_anomaly_score:           self.rng.gen_range(0.0..0.4),
                spending_deviation_score:    self.rng.gen_range(0.0..0.5),
                time_since_last_transaction: self.rng.gen_range(30.0..86_400.0),
            }
        };
        let amount = round_cents(self.rng.gen_range(2.0f64..7.5).exp());
        let fraud_type = is_fraud.then(|| pick(&mut self.rng, FRAUD_TYPES).to_string());
        let tx_type = *pick(&mut self.rng, TYPES);
        let ts = self.random_time();
        self.push(sender, receiver, amount, tx_type, ts, is_fraud, fraud_type, signals);
    }

    fn plant_ring(&mut self, ring: usize, rows: usize) {
        let size = self.rng.gen_range(3..=5);
        let members: Vec<String> = (0..size).map(|m| format!("ACC9{:02}{:03}", ring, m)).collect();
        let start = self.random_time();

        for (i, sender) in members.iter().enumerate() {
            let receiver = &members[(i + 1) % size];
            let hops = self.rng.gen_range(4..=6);
            for h in 0..hops {
                if self.out.len() >= rows { return; }
                let signals = self.hot_signals();
                let amount = round_cents(self.rng.gen_range(900.0..5_000.0));
                let ts = start + Duration::minutes((i * 60 + h * 7) as i64);
                self.push(
                    sender.clone(), receiver.clone(), amount, TransactionType::Transfer,
                    ts.min(self.end), true, Some("money_laundering".into()), signals,
                );
            }
        }
    }

    fn plant_mule(&mut self, mule: usize, pool: &[String], rows: usize) {
        let account = format!("ACC8{:05}", mule);
        let n_senders = self.rng.gen_range(6..=9);
        let senders: Vec<String> = pool
            .choose_multiple(&mut self.rng, n_senders)
            .cloned()
            .collect();
        let start = self.random_time();

        let mut received = 0.0;
        for (i, s) in senders.iter().enumerate() {
            if self.out.len() >= rows { return; }
            let amount = round_cents(self.rng.gen_range(200.0..2_000.0));
            received += amount;
            let signals = self.warm_signals();
            let ts = (start + Duration::minutes(i as i64 * 11)).min(self.end);
            self.push(s.clone(), account.clone(), amount, TransactionType::Transfer, ts, false, None, signals);
        }

        // Forward ~90% onward, split across a few receivers
        let n_out = self.rng.gen_range(2..=3);
        let forward = received * self.rng.gen_range(0.88..0.95);
        for j in 0..n_out {
            if self.out.len() >= rows { return; }
            let receiver = pick(&mut self.rng, pool).to_string();
            let signals = self.hot_signals();
            let ts = (start + Duration::hours(2) + Duration::minutes(j as i64 * 5)).min(self.end);
            self.push(
                account.clone(), receiver, round_cents(forward / n_out as f64),
                TransactionType::Transfer, ts, true, Some("money_laundering".into()), signals,
            );
        }
    }

    fn hot_signals(&mut self) -> Signals {
        Signals {
            velocity_score:              self.rng.gen_range(0.85..1.0),
            geo_anomaly_score:           self.rng.gen_range(0.8..1.0),
            spending_deviation_score:    self.rng.gen_range(0.7..1.0),
            time_since_last_transaction: self.rng.gen_range(1.0..59.0),
        }
    }

    fn warm_signals(&mut self) -> Signals {
        Signals {
            velocity_score:              self.rng.gen_range(0.3..0.7),
            geo_anomaly_score:           self.rng.gen_range(0.2..0.6),
            spending_deviation_score:    self.rng.gen_range(0.2..0.6),
            time_since_last_transaction: self.rng.gen_range(60.0..3_600.0),
        }
    }

    fn random_time(&mut self) -> DateTime<Utc> {
        self.end - Duration::seconds(self.rng.gen_range(0..SPAN_SECS))
    }

    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        sender: String,
        receiver: String,
        amount: f64,
        transaction_type: TransactionType,
        timestamp: DateTime<Utc>,
        is_fraud: bool,
        fraud_type: Option<String>,
        signals: Signals,
    ) {
        let device = pick(&mut self.rng, DEVICES).to_string();
        let device_hash = device_fingerprint(&sender, &device);
        let ip = format!(
            "10.{}.{}.{}",
            self.rng.gen_range(0..=255u8),
            self.rng.gen_range(0..=255u8),
            self.rng.gen_range(1..=254u8)
        );
        let merchant = pick(&mut self.rng, MERCHANTS).to_string();
        let location = pick(&mut self.rng, LOCATIONS).to_string();
        let channel = pick(&mut self.rng, CHANNELS).to_string();

        self.out.push(Transaction {
            transaction_id: String::new(),
            timestamp,
            sender_account: sender,
            receiver_account: receiver,
            amount,
            transaction_type,
            merchant_category: merchant,
            location,
            device_used: device,
            payment_channel: channel,
            is_fraud,
            fraud_type,
            ip_address: Some(ip),
            device_hash: Some(device_hash),
            signals,
        });
    }
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// SHA256[:8] of account + device class, stable per (account, device).
fn device_fingerprint(account: &str, device: &str) -> String {
    let mut h = Sha256::new();
    h.update(account.as_bytes());
    h.update(b":");
    h.update(device.as_bytes());
    hex::encode(&h.finalize()[..8])
}
