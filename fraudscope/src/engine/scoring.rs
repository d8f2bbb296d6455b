// fraudscope/src/engine/scoring.rs
//
// Weighted signal fusion into a fraud probability + risk category.
//
// Weight distribution (defaults, sum = 0.92; noise supplies up to 0.08):
//   Velocity            0.34  burst / rate behaviour
//   GeoAnomaly          0.28  unusual location pattern
//   SpendingDeviation   0.19  amount vs the account's typical spend
//   RapidRepeat         0.11  indicator, < 60s since previous transaction
//   Noise            U(0, 0.08)
//
// The result is clipped to [0,1]. The category is a pure function of the
// probability: LOW < 0.30 ≤ MEDIUM < 0.60 ≤ HIGH < 0.75 ≤ CRITICAL.

use rand::Rng;

use crate::config::ScoringSettings;
use crate::records::{Derived, RiskCategory, Score, ScoredTransaction, Signals, Transaction};

#[derive(Debug, Clone)]
pub struct Scorer {
    settings: ScoringSettings,
}

impl Scorer {
    pub fn new(settings: ScoringSettings) -> Self {
        Self { settings }
    }

    /// Weighted signal sum without the noise term. Not clipped.
    pub fn weighted(&self, s: &Signals) -> f64 {
        let w = &self.settings;
        let rapid = if s.time_since_last_transaction < w.rapid_repeat_secs { 1.0 } else { 0.0 };
        s.velocity_score * w.velocity_weight
            + s.geo_anomaly_score * w.geo_anomaly_weight
            + s.spending_deviation_score * w.spending_weight
            + rapid * w.rapid_repeat_weight
    }

    pub fn score<R: Rng + ?Sized>(&self, signals: &Signals, rng: &mut R) -> Score {
        let noise = if self.settings.noise > 0.0 {
            rng.gen_range(0.0..self.settings.noise)
        } else {
            0.0
        };
        self.finish(self.weighted(signals) + noise)
    }

    pub fn score_deterministic(&self, signals: &Signals) -> Score {
        self.finish(self.weighted(signals))
    }

    pub fn category(&self, p: f64) -> RiskCategory {
        let w = &self.settings;
        if p >= w.critical_threshold {
            RiskCategory::Critical
        } else if p >= w.high_threshold {
            RiskCategory::High
        } else if p >= w.medium_threshold {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }

    /// Attach derived fields to a batch. One rng stream for the whole batch,
    /// in input order, so a seeded rng reproduces the snapshot exactly.
    pub fn enrich<R: Rng + ?Sized>(&self, batch: Vec<Transaction>, rng: &mut R) -> Vec<ScoredTransaction> {
        batch
            .into_iter()
            .map(|txn| {
                let score = self.score(&txn.signals, rng);
                let derived = Derived::new(txn.timestamp, score);
                ScoredTransaction { txn, derived }
            })
            .collect()
    }

    fn finish(&self, raw: f64) -> Score {
        let p = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
        Score { fraud_probability: p, risk_category: self.category(p) }
    }
}

impl Default for Scorer {
    fn default() -> Self { Self::new(ScoringSettings::default()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn signals(v: f64, g: f64, s: f64, t: f64) -> Signals {
        Signals {
            velocity_score: v,
            geo_anomaly_score: g,
            spending_deviation_score: s,
            time_since_last_transaction: t,
        }
    }

    #[test]
    fn probability_is_clipped_for_out_of_range_signals() {
        let scorer = Scorer::default();
        let mut rng = StdRng::seed_from_u64(7);

        let high = scorer.score(&signals(25.0, 9.0, 4.0, 1.0), &mut rng);
        assert_eq!(high.fraud_probability, 1.0);
        assert_eq!(high.risk_category, RiskCategory::Critical);

        let low = scorer.score(&signals(-30.0, -2.0, -1.0, 9999.0), &mut rng);
        assert_eq!(low.fraud_probability, 0.0);
        assert_eq!(low.risk_category, RiskCategory::Low);
    }

    #[test]
    fn exact_weights_without_noise() {
        let scorer = Scorer::default();
        let s = scorer.score_deterministic(&signals(1.0, 0.5, 0.0, 30.0));
        assert!((s.fraud_probability - (0.34 + 0.14 + 0.11)).abs() < 1e-12);
        assert_eq!(s.risk_category, RiskCategory::Medium);
    }

    #[test]
    fn rapid_repeat_boundary_is_exclusive() {
        let scorer = Scorer::default();
        let at = scorer.score_deterministic(&signals(0.0, 0.0, 0.0, 60.0));
        let under = scorer.score_deterministic(&signals(0.0, 0.0, 0.0, 59.9));
        assert_eq!(at.fraud_probability, 0.0);
        assert!((under.fraud_probability - 0.11).abs() < 1e-12);
    }

    #[test]
    fn noise_is_bounded_and_seed_reproducible() {
        let scorer = Scorer::default();
        let s = signals(0.5, 0.5, 0.5, 120.0);
        let base = scorer.weighted(&s);

        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let x = scorer.score(&s, &mut a).fraud_probability;
            let y = scorer.score(&s, &mut b).fraud_probability;
            assert_eq!(x, y);
            assert!(x >= base && x <= base + 0.08);
        }
    }

    #[test]
    fn zero_noise_setting_is_deterministic() {
        let scorer = Scorer::new(ScoringSettings { noise: 0.0, ..Default::default() });
        let mut rng = StdRng::seed_from_u64(1);
        let s = signals(0.9, 0.9, 0.9, 5.0);
        let first = scorer.score(&s, &mut rng);
        let second = scorer.score(&s, &mut rng);
        assert_eq!(first, second);
        assert_eq!(first, scorer.score_deterministic(&s));
    }

    #[test]
    fn category_thresholds_are_exact_and_monotonic() {
        let scorer = Scorer::default();
        assert_eq!(scorer.category(0.0), RiskCategory::Low);
        assert_eq!(scorer.category(0.2999), RiskCategory::Low);
        assert_eq!(scorer.category(0.30), RiskCategory::Medium);
        assert_eq!(scorer.category(0.5999), RiskCategory::Medium);
        assert_eq!(scorer.category(0.60), RiskCategory::High);
        assert_eq!(scorer.category(0.7499), RiskCategory::High);
        assert_eq!(scorer.category(0.75), RiskCategory::Critical);
        assert_eq!(scorer.category(1.0), RiskCategory::Critical);

        let mut prev = RiskCategory::Low;
        for i in 0..=1000 {
            let c = scorer.category(i as f64 / 1000.0);
            assert!(c >= prev);
            prev = c;
        }
    }

    #[test]
    fn nan_weighted_sum_scores_zero() {
        let scorer = Scorer::default();
        // Signals bypassing the fill policy
        let s = signals(f64::NAN, 0.0, 0.0, 120.0);
        let score = scorer.score_deterministic(&s);
        assert_eq!(score.fraud_probability, 0.0);
    }
}
