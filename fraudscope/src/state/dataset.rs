// fraudscope/src/state/dataset.rs
//
// Scored dataset snapshot + the provider that owns it.
//
// Design:
//   - A Dataset is immutable once built; every row carries its Derived fields
//   - Readers hold an Arc<Dataset>; a reload builds the new snapshot fully and
//     only then swaps the pointer, so in-flight readers keep the old one
//   - Reloads are serialized by a dedicated mutex; reads never take it
//   - A missing or unreadable source degrades to synthetic data (logged, flagged)

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{DataSettings, ScoringSettings};
use crate::engine::scoring::Scorer;
use crate::loader;
use crate::records::{ScoredTransaction, Transaction};
use crate::state::synthetic;

// ── Source ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DataSource {
    File { path: String, rows_skipped: usize },
    /// Fallback; `reason` is why the file could not be used.
    Synthetic { reason: String },
    Fixture,
}

impl DataSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Synthetic { .. } => "synthetic",
            Self::Fixture => "fixture",
        }
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Dataset {
    rows:      Vec<ScoredTransaction>,
    by_id:     HashMap<String, usize>,
    source:    DataSource,
    loaded_at: DateTime<Utc>,
    version:   u64,
}

impl Dataset {
    pub fn from_scored(rows: Vec<ScoredTransaction>, source: DataSource, version: u64) -> Self {
        let mut by_id = HashMap::with_capacity(rows.len());
        for (i, r) in rows.iter().enumerate() {
            // First occurrence wins on duplicate ids
            by_id.entry(r.txn.transaction_id.clone()).or_insert(i);
        }
        Self { rows, by_id, source, loaded_at: Utc::now(), version }
    }

    /// Score a raw batch with one seeded noise stream, in input order.
    pub fn from_transactions(
        txns: Vec<Transaction>,
        scorer: &Scorer,
        seed: u64,
        source: DataSource,
        version: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::from_scored(scorer.enrich(txns, &mut rng), source, version)
    }

    pub fn rows(&self) -> &[ScoredTransaction] { &self.rows }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
    pub fn source(&self) -> &DataSource { &self.source }
    pub fn loaded_at(&self) -> DateTime<Utc> { self.loaded_at }
    pub fn version(&self) -> u64 { self.version }

    pub fn is_degraded(&self) -> bool {
        matches!(self.source, DataSource::Synthetic { .. })
    }

    pub fn transaction(&self, id: &str) -> Option<&ScoredTransaction> {
        self.by_id.get(id).map(|&i| &self.rows[i])
    }

    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.rows.iter().map(|r| r.txn.timestamp).min()?;
        let last = self.rows.iter().map(|r| r.txn.timestamp).max()?;
        Some((first, last))
    }

    /// Newest timestamp in the data; the reference "now" for windowed views.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.rows.iter().map(|r| r.txn.timestamp).max()
    }

    pub fn fraud_count(&self) -> usize {
        self.rows.iter().filter(|r| r.txn.is_fraud).count()
    }

    /// Rows with `start <= timestamp < end`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> impl Iterator<Item = &ScoredTransaction> {
        self.rows
            .iter()
            .filter(move |r| r.txn.timestamp >= start && r.txn.timestamp < end)
    }

    // ── Owned views ───────────────────────────────────────────────────────────

    /// Rows within `hours` of the newest timestamp (inclusive on both ends).
    pub fn recent(self: &Arc<Self>, hours: i64) -> Subset {
        let Some(latest) = self.latest() else {
            return Subset::empty(self);
        };
        let cutoff = latest - Duration::hours(hours);
        self.select(|r| r.txn.timestamp >= cutoff)
    }

    /// Rows with probability >= `threshold`, highest first, at most `limit`.
    pub fn high_risk(self: &Arc<Self>, threshold: f64, limit: usize) -> Subset {
        let mut sub = self.select(|r| r.fraud_probability() >= threshold);
        sub.rows.sort_by(|&a, &b| {
            self.rows[b].fraud_probability()
                .total_cmp(&self.rows[a].fraud_probability())
                .then(a.cmp(&b))
        });
        sub.rows.truncate(limit);
        sub
    }

    pub fn fraud_only(self: &Arc<Self>) -> Subset {
        self.select(|r| r.txn.is_fraud)
    }

    fn select(self: &Arc<Self>, keep: impl Fn(&ScoredTransaction) -> bool) -> Subset {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| keep(r))
            .map(|(i, _)| i)
            .collect();
        Subset { snapshot: Arc::clone(self), rows }
    }
}

/// Row indices into a pinned snapshot; survives a concurrent reload.
#[derive(Debug, Clone)]
pub struct Subset {
    snapshot: Arc<Dataset>,
    rows:     Vec<usize>,
}

impl Subset {
    fn empty(snapshot: &Arc<Dataset>) -> Self {
        Self { snapshot: Arc::clone(snapshot), rows: Vec::new() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredTransaction> {
        self.rows.iter().map(move |&i| &self.snapshot.rows[i])
    }

    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
    pub fn snapshot(&self) -> &Arc<Dataset> { &self.snapshot }
}

// ── Info ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end:   DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub loaded:          bool,
    pub row_count:       usize,
    pub date_range:      Option<DateRange>,
    pub fraud_count:     usize,
    pub fraud_rate:      f64,
    pub source:          Option<DataSource>,
    pub degraded:        bool,
    pub loaded_at:       Option<DateTime<Utc>>,
    pub version:         u64,
}

impl DatasetInfo {
    fn of(ds: &Dataset) -> Self {
        let fraud_count = ds.fraud_count();
        Self {
            loaded:      true,
            row_count:   ds.len(),
            date_range:  ds.date_range().map(|(start, end)| DateRange { start, end }),
            fraud_count,
            fraud_rate:  if ds.is_empty() { 0.0 } else { fraud_count as f64 / ds.len() as f64 },
            source:      Some(ds.source().clone()),
            degraded:    ds.is_degraded(),
            loaded_at:   Some(ds.loaded_at()),
            version:     ds.version(),
        }
    }

    fn unloaded() -> Self {
        Self {
            loaded:      false,
            row_count:   0,
            date_range:  None,
            fraud_count: 0,
            fraud_rate:  0.0,
            source:      None,
            degraded:    false,
            loaded_at:   None,
            version:     0,
        }
    }
}

// ── Provider ──────────────────────────────────────────────────────────────────

pub struct DatasetProvider {
    settings:     DataSettings,
    scorer:       Scorer,
    snapshot:     RwLock<Option<Arc<Dataset>>>,
    reload_lock:  Mutex<()>,
    next_version: AtomicU64,
}

impl DatasetProvider {
    pub fn new(settings: DataSettings, scoring: ScoringSettings) -> Self {
        Self {
            settings,
            scorer:       Scorer::new(scoring),
            snapshot:     RwLock::new(None),
            reload_lock:  Mutex::new(()),
            next_version: AtomicU64::new(0),
        }
    }

    /// Provider pre-seeded with a fixture snapshot. A forced reload still
    /// goes to the configured source.
    pub fn with_dataset(settings: DataSettings, scoring: ScoringSettings, dataset: Dataset) -> Self {
        let provider = Self::new(settings, scoring);
        provider.next_version.store(dataset.version(), Ordering::SeqCst);
        *provider.snapshot.write() = Some(Arc::new(dataset));
        provider
    }

    pub fn scorer(&self) -> &Scorer { &self.scorer }

    /// Returns the cached snapshot unless `force` or nothing is loaded yet.
    pub fn load(&self, force: bool) -> Arc<Dataset> {
        if !force {
            if let Some(current) = self.snapshot.read().clone() {
                return current;
            }
        }

        let _guard = self.reload_lock.lock();
        if !force {
            // Another caller may have finished the first load while we waited
            if let Some(current) = self.snapshot.read().clone() {
                return current;
            }
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let fresh = Arc::new(self.build(version));
        *self.snapshot.write() = Some(Arc::clone(&fresh));
        fresh
    }

    pub fn get(&self) -> Arc<Dataset> { self.load(false) }
    pub fn reload(&self) -> Arc<Dataset> { self.load(true) }

    /// Does not trigger a load.
    pub fn info(&self) -> DatasetInfo {
        match self.snapshot.read().as_deref() {
            Some(ds) => DatasetInfo::of(ds),
            None => DatasetInfo::unloaded(),
        }
    }

    pub fn recent(&self, hours: i64) -> Subset { self.get().recent(hours) }
    pub fn high_risk(&self, threshold: f64, limit: usize) -> Subset { self.get().high_risk(threshold, limit) }
    pub fn fraud_only(&self) -> Subset { self.get().fraud_only() }

    fn build(&self, version: u64) -> Dataset {
        let started = Instant::now();
        let path = &self.settings.path;

        let (txns, source) = match loader::read_csv(path) {
            Ok(load) => (
                load.transactions,
                DataSource::File { path: path.display().to_string(), rows_skipped: load.rows_skipped },
            ),
            Err(e) => {
                warn!(
                    "Dataset source {} unusable ({}); falling back to {} synthetic rows",
                    path.display(), e, self.settings.synthetic_rows
                );
                let txns = synthetic::generate(
                    self.settings.synthetic_rows,
                    self.settings.synthetic_fraud_rate,
                    self.settings.seed,
                );
                (txns, DataSource::Synthetic { reason: e.to_string() })
            }
        };

        let ds = Dataset::from_transactions(txns, &self.scorer, self.settings.seed, source, version);
        info!(
            "Dataset v{} ready: {} rows, {} fraud, source={} ({:.0}ms)",
            version,
            ds.len(),
            ds.fraud_count(),
            ds.source().label(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        ds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Signals, TransactionType};
    use chrono::TimeZone;
    use std::io::Write;

    fn txn(id: &str, hour: u32, velocity: f64, is_fraud: bool) -> Transaction {
        Transaction {
            transaction_id:    id.into(),
            timestamp:         Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            sender_account:    "A".into(),
            receiver_account:  "B".into(),
            amount:            100.0,
            transaction_type:  TransactionType::Transfer,
            merchant_category: "retail".into(),
            location:          "Tokyo".into(),
            device_used:       "mobile".into(),
            payment_channel:   "card".into(),
            is_fraud,
            fraud_type:        None,
            ip_address:        None,
            device_hash:       None,
            signals: Signals {
                velocity_score: velocity,
                geo_anomaly_score: 0.0,
                spending_deviation_score: 0.0,
                time_since_last_transaction: 600.0,
            },
        }
    }

    fn fixture() -> Arc<Dataset> {
        let scorer = Scorer::new(ScoringSettings { noise: 0.0, ..Default::default() });
        let rows = vec![
            txn("T1", 0, 0.1, false),
            txn("T2", 10, 2.0, true),
            txn("T3", 20, 1.0, false),
            txn("T4", 23, 3.0, true),
        ];
        Arc::new(Dataset::from_transactions(rows, &scorer, 1, DataSource::Fixture, 1))
    }

    fn missing_file_settings(rows: usize) -> DataSettings {
        DataSettings {
            path: "/nonexistent/fraudscope.csv".into(),
            synthetic_rows: rows,
            ..Default::default()
        }
    }

    #[test]
    fn recent_is_relative_to_newest_row() {
        let ds = fixture();
        let ids: Vec<_> = ds.recent(3).iter().map(|r| r.txn.transaction_id.clone()).collect();
        assert_eq!(ids, vec!["T3", "T4"]);
        assert_eq!(ds.recent(100).len(), 4);
    }

    #[test]
    fn high_risk_sorted_and_limited() {
        let ds = fixture();
        let sub = ds.high_risk(0.3, 2);
        let probs: Vec<f64> = sub.iter().map(|r| r.fraud_probability()).collect();
        assert_eq!(probs.len(), 2);
        assert!(probs[0] >= probs[1]);
        assert!(probs.iter().all(|&p| p >= 0.3));
    }

    #[test]
    fn fraud_only_and_lookup() {
        let ds = fixture();
        assert_eq!(ds.fraud_only().len(), 2);
        assert!(ds.transaction("T2").is_some());
        assert!(ds.transaction("nope").is_none());
    }

    #[test]
    fn subset_outlives_provider_reload() {
        let provider = DatasetProvider::new(missing_file_settings(300), ScoringSettings::default());
        let first = provider.get();
        let sub = first.fraud_only();
        drop(first);
        let second = provider.reload();
        assert_eq!(second.version(), 2);
        assert_eq!(sub.snapshot().version(), 1);
        assert!(sub.iter().all(|r| r.txn.is_fraud));
    }

    #[test]
    fn missing_source_falls_back_to_synthetic_and_flags_it() {
        let provider = DatasetProvider::new(missing_file_settings(500), ScoringSettings::default());
        assert!(!provider.info().loaded);

        let ds = provider.get();
        assert_eq!(ds.len(), 500);
        assert!(ds.is_degraded());

        let info = provider.info();
        assert!(info.loaded);
        assert!(info.degraded);
        assert_eq!(info.row_count, 500);
        assert!(matches!(info.source, Some(DataSource::Synthetic { .. })));
    }

    #[test]
    fn get_is_cached_and_reload_bumps_version() {
        let provider = DatasetProvider::new(missing_file_settings(200), ScoringSettings::default());
        let a = provider.get();
        let b = provider.get();
        assert!(Arc::ptr_eq(&a, &b));
        let c = provider.reload();
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(c.version() > a.version());
    }

    #[test]
    fn same_seed_same_scores() {
        let a = DatasetProvider::new(missing_file_settings(300), ScoringSettings::default()).get();
        let b = DatasetProvider::new(missing_file_settings(300), ScoringSettings::default()).get();
        for (x, y) in a.rows().iter().zip(b.rows()) {
            assert_eq!(x.fraud_probability(), y.fraud_probability());
        }
    }

    #[test]
    fn loads_from_csv_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "transaction_id,timestamp,sender_account,receiver_account,amount,transaction_type,is_fraud,velocity_score").unwrap();
        writeln!(f, "T1,2024-01-01T00:00:00,A,B,10,transfer,True,0.9").unwrap();
        writeln!(f, "T2,2024-01-02T00:00:00,B,C,20,payment,False,0.1").unwrap();

        let settings = DataSettings { path: f.path().to_path_buf(), ..Default::default() };
        let provider = DatasetProvider::new(settings, ScoringSettings::default());
        let ds = provider.get();
        assert_eq!(ds.len(), 2);
        assert!(!ds.is_degraded());
        assert_eq!(ds.source().label(), "file");
        let info = provider.info();
        assert_eq!(info.fraud_count, 1);
        assert_eq!(info.fraud_rate, 0.5);
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let provider = Arc::new(DatasetProvider::new(missing_file_settings(400), ScoringSettings::default()));
        provider.get();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let p = Arc::clone(&provider);
                std::thread::spawn(move || {
                    for _ in 0..3 {
                        let ds = if i == 0 { p.reload() } else { p.get() };
                        assert_eq!(ds.len(), 400);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
