pub mod accounts_at_risk;
pub mod alerts;
pub mod business;
pub mod dashboard;
pub mod explain;

pub use accounts_at_risk::predictive_risk_scores;
pub use alerts::{behavioral_anomalies, smart_alerts};
pub use business::{financial_impact, merchant_channel_risk};
pub use dashboard::{executive_overview, fraud_type_breakdown, high_risk_feed, velocity_heatmap};
pub use explain::explain_transaction;
