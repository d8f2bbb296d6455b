pub mod accounts;
pub mod graph;
pub mod mules;
pub mod rings;
pub mod scoring;

#[cfg(test)]
pub(crate) mod testing;

pub use accounts::account_profile;
pub use graph::{GraphParams, RelationshipGraph};
pub use mules::{detect_mule_accounts, MuleParams};
pub use rings::{detect_fraud_rings, RingParams};
pub use scoring::Scorer;
