// fraudscope/src/config.rs
//
// Runtime settings. Layering, lowest to highest precedence:
//   built-in defaults → TOML file (--config) → FRAUDSCOPE_* env → CLI flags
//
// Every threshold the algorithms use lives here; the engine modules take
// their parameters as arguments and hardcode none of them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data:    DataSettings,
    pub scoring: ScoringSettings,
    pub network: NetworkSettings,
    pub mules:   MuleSettings,
    pub server:  ServerSettings,
    pub model:   ModelSettings,
    pub alerts:  AlertSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub path:                 PathBuf,
    pub synthetic_rows:       usize,
    pub synthetic_fraud_rate: f64,
    /// Seeds both synthetic generation and the scoring noise term.
    pub seed:                 u64,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            path:                 PathBuf::from("financial_fraud_detection_dataset.csv"),
            synthetic_rows:       20_000,
            synthetic_fraud_rate: 0.035,
            seed:                 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub velocity_weight:     f64,
    pub geo_anomaly_weight:  f64,
    pub spending_weight:     f64,
    pub rapid_repeat_weight: f64,
    /// A transaction this soon after the previous one counts as a rapid repeat.
    pub rapid_repeat_secs:   f64,
    /// Upper bound of the uniform noise term; 0 disables it.
    pub noise:               f64,
    pub medium_threshold:    f64,
    pub high_threshold:      f64,
    pub critical_threshold:  f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            velocity_weight:     0.34,
            geo_anomaly_weight:  0.28,
            spending_weight:     0.19,
            rapid_repeat_weight: 0.11,
            rapid_repeat_secs:   60.0,
            noise:               0.08,
            medium_threshold:    0.30,
            high_threshold:      0.60,
            critical_threshold:  0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub min_fraud_prob:       f64,
    pub min_transactions:     usize,
    pub max_rings:            usize,
    pub ring_display_members: usize,
    /// Cap on edges returned to the dashboard; detection sees all of them.
    pub max_edges:            usize,
    pub allow_self_loops:     bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            min_fraud_prob:       0.6,
            min_transactions:     3,
            max_rings:            10,
            ring_display_members: 10,
            max_edges:            200,
            allow_self_loops:     false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MuleSettings {
    pub min_senders:              usize,
    pub redistribution_threshold: f64,
    pub limit:                    usize,
}

impl Default for MuleSettings {
    fn default() -> Self {
        Self { min_senders: 5, redistribution_threshold: 0.8, limit: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind:         String,
    /// Empty list = any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8000".into(), cors_origins: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub version:            String,
    pub decision_threshold: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self { version: "v2.3.1".into(), decision_threshold: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub high_risk_threshold: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self { high_risk_threshold: 0.75 }
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_toml(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        settings.apply_env(|k| std::env::var(k).ok());
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// `lookup` is injected so tests do not have to touch the process env.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(p) = lookup("FRAUDSCOPE_DATA_PATH") {
            self.data.path = PathBuf::from(p);
        }
        if let Some(b) = lookup("FRAUDSCOPE_BIND") {
            self.server.bind = b;
        }
        if let Some(s) = lookup("FRAUDSCOPE_SEED") {
            match s.parse() {
                Ok(seed) => self.data.seed = seed,
                Err(_) => warn!("Ignoring FRAUDSCOPE_SEED={s:?}: not an unsigned integer"),
            }
        }
        if let Some(n) = lookup("FRAUDSCOPE_SYNTHETIC_ROWS") {
            match n.parse() {
                Ok(rows) => self.data.synthetic_rows = rows,
                Err(_) => warn!("Ignoring FRAUDSCOPE_SYNTHETIC_ROWS={n:?}: not an unsigned integer"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_thresholds() {
        let s = Settings::default();
        assert_eq!(s.scoring.medium_threshold, 0.30);
        assert_eq!(s.scoring.high_threshold, 0.60);
        assert_eq!(s.scoring.critical_threshold, 0.75);
        assert_eq!(s.network.min_transactions, 3);
        assert_eq!(s.mules.limit, 20);
        assert_eq!(s.data.synthetic_fraud_rate, 0.035);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let s = Settings::from_toml(
            r#"
            [network]
            min_fraud_prob = 0.7

            [mules]
            min_senders = 8
            "#,
        )
        .unwrap();
        assert_eq!(s.network.min_fraud_prob, 0.7);
        assert_eq!(s.network.min_transactions, 3);
        assert_eq!(s.mules.min_senders, 8);
        assert_eq!(s.mules.redistribution_threshold, 0.8);
        assert_eq!(s.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = Settings::from_toml("[network\nmin_fraud_prob = ").unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }

    #[test]
    fn env_overrides_apply_and_bad_numbers_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("FRAUDSCOPE_DATA_PATH", "/data/tx.csv"),
            ("FRAUDSCOPE_SEED", "not-a-number"),
            ("FRAUDSCOPE_SYNTHETIC_ROWS", "500"),
        ]
        .into_iter()
        .collect();

        let mut s = Settings::default();
        s.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.data.path, PathBuf::from("/data/tx.csv"));
        assert_eq!(s.data.seed, 42);
        assert_eq!(s.data.synthetic_rows, 500);
    }
}
