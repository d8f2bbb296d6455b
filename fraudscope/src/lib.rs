// fraudscope/src/lib.rs
//
// fraudscope: analytics over a snapshot of scored payment transactions.
//
//   loader / state   CSV ingest, synthetic fallback, copy-on-write snapshot
//   engine           risk scoring, relationship graph, fraud rings, mules
//   reports          dashboard aggregates, alerts, account risk, business
//                    tiles, per-transaction explanations
//   eval             model quality: confusion matrix, drift, importances
//   api              axum HTTP surface over all of the above

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod loader;
pub mod records;
pub mod reports;
pub mod state;

pub use error::{Error, Result};
