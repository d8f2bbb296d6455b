// fraudscope/src/loader.rs
//
// CSV source reader: turns the raw transaction export into typed records.
//
// Row policy:
//   - malformed rows (bad id, timestamp or transaction type) are skipped
//   - missing / unparsable / NaN signal values are filled with 0
//   - missing or negative amounts are clamped to 0
// Whole-file failures (missing file, bad header, zero usable rows) are returned
// as errors; the dataset provider decides to fall back.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::records::{Signals, Transaction, TransactionType};

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Per-row warnings beyond this are logged at debug.
const LOUD_SKIPS: usize = 5;

#[derive(Debug, Deserialize)]
struct CsvRow {
    transaction_id:   String,
    timestamp:        String,
    sender_account:   String,
    receiver_account: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount:           Option<f64>,
    transaction_type: String,
    #[serde(default)]
    merchant_category: Option<String>,
    #[serde(default)]
    location:         Option<String>,
    #[serde(default)]
    device_used:      Option<String>,
    #[serde(default)]
    is_fraud:         Option<String>,
    #[serde(default)]
    fraud_type:       Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    time_since_last_transaction: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    spending_deviation_score: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    velocity_score:   Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    geo_anomaly_score: Option<f64>,
    #[serde(default)]
    payment_channel:  Option<String>,
    #[serde(default)]
    ip_address:       Option<String>,
    #[serde(default)]
    device_hash:      Option<String>,
}

#[derive(Debug)]
pub struct CsvLoad {
    pub transactions: Vec<Transaction>,
    pub rows_skipped: usize,
}

pub fn read_csv(path: &Path) -> Result<CsvLoad> {
    let file = std::fs::File::open(path)?;
    read_csv_from(file, &path.display().to_string())
}

pub fn read_csv_from<R: std::io::Read>(reader: R, source_name: &str) -> Result<CsvLoad> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    // A missing required column fails every row; surface it as a file error.
    let headers = rdr.headers()?.clone();
    for col in ["transaction_id", "timestamp", "sender_account", "receiver_account", "transaction_type"] {
        if !headers.iter().any(|h| h == col) {
            return Err(Error::EmptySource(format!("{source_name}: missing column '{col}'")));
        }
    }

    let mut transactions = Vec::new();
    let mut rows_skipped = 0usize;

    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let parsed = result
            .map_err(|e| e.to_string())
            .and_then(CsvRow::into_transaction);
        match parsed {
            Ok(txn) => transactions.push(txn),
            Err(reason) => {
                rows_skipped += 1;
                if rows_skipped <= LOUD_SKIPS {
                    warn!("Skipping row {} of {}: {}", line + 2, source_name, reason);
                } else {
                    debug!("Skipping row {} of {}: {}", line + 2, source_name, reason);
                }
            }
        }
    }

    if transactions.is_empty() {
        return Err(Error::EmptySource(format!(
            "{source_name}: no valid rows ({rows_skipped} skipped)"
        )));
    }

    info!(
        "Read {} transactions from {} ({} rows skipped)",
        transactions.len(), source_name, rows_skipped
    );
    Ok(CsvLoad { transactions, rows_skipped })
}

impl CsvRow {
    fn into_transaction(self) -> std::result::Result<Transaction, String> {
        if self.transaction_id.is_empty() {
            return Err("empty transaction_id".into());
        }
        if self.sender_account.is_empty() || self.receiver_account.is_empty() {
            return Err("empty account id".into());
        }
        let timestamp = parse_timestamp(&self.timestamp)
            .ok_or_else(|| format!("unparsable timestamp '{}'", self.timestamp))?;
        let transaction_type: TransactionType = self.transaction_type.parse()?;

        let amount = self.amount.filter(|a| a.is_finite()).unwrap_or(0.0).max(0.0);

        Ok(Transaction {
            transaction_id: self.transaction_id,
            timestamp,
            sender_account: self.sender_account,
            receiver_account: self.receiver_account,
            amount,
            transaction_type,
            merchant_category: self.merchant_category.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            device_used: self.device_used.unwrap_or_default(),
            payment_channel: self.payment_channel.unwrap_or_default(),
            is_fraud: self.is_fraud.as_deref().map(parse_flag).unwrap_or(false),
            fraud_type: non_empty(self.fraud_type),
            ip_address: non_empty(self.ip_address),
            device_hash: non_empty(self.device_hash),
            signals: Signals::filled(
                self.velocity_score,
                self.geo_anomaly_score,
                self.spending_deviation_score,
                self.time_since_last_transaction,
            ),
        })
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "t")
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "transaction_id,timestamp,sender_account,receiver_account,amount,\
transaction_type,merchant_category,location,device_used,is_fraud,fraud_type,\
time_since_last_transaction,spending_deviation_score,velocity_score,geo_anomaly_score,\
payment_channel,ip_address,device_hash";

    #[test]
    fn parses_rows_and_applies_fill_policy() {
        let csv = format!(
            "{HEADER}\n\
             T1,2023-08-22T09:22:43.516168,ACC1,ACC2,120.5,transfer,retail,Tokyo,mobile,True,money_laundering,30,0.4,0.9,0.7,card,10.0.0.1,abc\n\
             T2,2023-08-22 10:00:00,ACC2,ACC3,,payment,travel,Paris,atm,False,,,NaN,garbage,,ACH,,\n"
        );
        let load = read_csv_from(csv.as_bytes(), "inline").unwrap();
        assert_eq!(load.transactions.len(), 2);
        assert_eq!(load.rows_skipped, 0);

        let t1 = &load.transactions[0];
        assert!(t1.is_fraud);
        assert_eq!(t1.fraud_type.as_deref(), Some("money_laundering"));
        assert_eq!(t1.signals.velocity_score, 0.9);
        assert_eq!(t1.transaction_type, TransactionType::Transfer);

        let t2 = &load.transactions[1];
        assert!(!t2.is_fraud);
        assert_eq!(t2.amount, 0.0);
        assert_eq!(t2.fraud_type, None);
        assert_eq!(t2.signals, Signals::default());
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let csv = format!(
            "{HEADER}\n\
             T1,not-a-date,ACC1,ACC2,10,transfer,,,,False,,1,0,0,0,,,\n\
             T2,2023-08-22T09:00:00,ACC1,ACC2,10,refund,,,,False,,1,0,0,0,,,\n\
             T3,2023-08-22T09:00:00Z,ACC1,ACC2,-5,deposit,,,,1,,1,0,0,0,,,\n"
        );
        let load = read_csv_from(csv.as_bytes(), "inline").unwrap();
        assert_eq!(load.transactions.len(), 1);
        assert_eq!(load.rows_skipped, 2);
        assert_eq!(load.transactions[0].amount, 0.0);
        assert!(load.transactions[0].is_fraud);
    }

    #[test]
    fn zero_valid_rows_is_an_error() {
        let csv = format!("{HEADER}\nT1,bad,ACC1,ACC2,1,transfer,,,,False,,1,0,0,0,,,\n");
        let err = read_csv_from(csv.as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, Error::EmptySource(_)));
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let csv = "transaction_id,amount\nT1,10\n";
        let err = read_csv_from(csv.as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, Error::EmptySource(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_csv(Path::new("/nonexistent/fraudscope/tx.csv")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn reads_from_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "{HEADER}").unwrap();
        writeln!(f, "T9,2024-01-01T00:00:00,A,B,50,withdrawal,,,,false,,100,0.1,0.2,0.3,,,").unwrap();
        let load = read_csv(f.path()).unwrap();
        assert_eq!(load.transactions[0].transaction_id, "T9");
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2023-08-22T09:22:43.516168").is_some());
        assert!(parse_timestamp("2023-08-22 09:22:43").is_some());
        assert!(parse_timestamp("2023-08-22T09:22:43+02:00").is_some());
        assert!(parse_timestamp("22/08/2023").is_none());
    }
}
