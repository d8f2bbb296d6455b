// fraudscope/src/api.rs
//
// HTTP API (axum). JSON in, JSON out.
//
//   GET  /health                                         healthy | degraded
//   GET  /                                               service index
//   GET  /api/v1/dataset/info
//   POST /api/v1/dataset/reload
//   GET  /api/v1/dashboard/executive-overview            ?hours=1..168
//   GET  /api/v1/dashboard/high-risk-transactions        ?limit=1..200
//   GET  /api/v1/dashboard/fraud-velocity-heatmap        ?hours=1..168
//   GET  /api/v1/dashboard/fraud-type-breakdown
//   GET  /api/v1/dashboard/smart-alerts                  ?hours=1..168
//   GET  /api/v1/dashboard/predictive-risk-scores        ?limit=1..500
//   GET  /api/v1/dashboard/behavioral-anomalies
//   GET  /api/v1/network/fraud-network-graph             ?min_transactions=1..10&min_fraud_prob=0..1
//   GET  /api/v1/network/mule-accounts                   ?min_senders=3..20&redistribution_threshold=0.5..1
//   GET  /api/v1/network/accounts/:account_id
//   GET  /api/v1/analytics/transaction-explanation/:transaction_id
//   GET  /api/v1/analytics/financial-impact              ?period_days=1..365
//   GET  /api/v1/analytics/merchant-channel-risk
//   GET  /api/v1/model/health
//   GET  /api/v1/model/confusion-matrix
//   GET  /api/v1/model/feature-importance
//
// Analytics run on the blocking pool against a pinned snapshot Arc. A
// failure (or panic) there fails that one request; the shared snapshot is
// never written by a request except through the reload endpoint.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::engine::{
    account_profile, detect_fraud_rings, detect_mule_accounts, GraphParams, MuleParams, RelationshipGraph, RingParams,
};
use crate::error::{Error, Result};
use crate::eval;
use crate::records::{AccountProfile, FraudRing, MuleCandidate, NetworkEdge, NetworkNode};
use crate::reports;
use crate::state::{Dataset, DatasetInfo, DatasetProvider};

// ── State ─────────────────────────────────────────────────────────────────────

pub struct AppState {
    pub provider: Arc<DatasetProvider>,
    pub settings: Arc<Settings>,
    started:      Instant,
}

impl AppState {
    pub fn new(provider: Arc<DatasetProvider>, settings: Arc<Settings>) -> Arc<Self> {
        Arc::new(Self { provider, settings, started: Instant::now() })
    }
}

type Shared = State<Arc<AppState>>;

// ── Errors ────────────────────────────────────────────────────────────────────

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::Task(_) => "computation_failed",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_client_error() {
            warn!("{} → {}", status, self);
        } else {
            error!("{} → {}", status, self);
        }
        let body = Json(json!({
            "error":     self.kind(),
            "detail":    self.to_string(),
            "timestamp": Utc::now(),
        }));
        (status, body).into_response()
    }
}

/// Run `f` against the current snapshot on the blocking pool.
async fn with_snapshot<T, F>(state: &AppState, f: F) -> Result<Json<T>>
where
    T: Send + 'static,
    F: FnOnce(Arc<Dataset>) -> Result<T> + Send + 'static,
{
    let provider = Arc::clone(&state.provider);
    tokio::task::spawn_blocking(move || f(provider.get()))
        .await
        .map_err(|e| Error::Task(e.to_string()))?
        .map(Json)
}

/// `Query` whose rejection is an `InvalidParameter`, so a malformed value
/// gets the same JSON error body as an out-of-range one.
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(v)| Self(v))
            .map_err(|rejection: QueryRejection| Error::invalid("query", rejection.body_text()))
    }
}

fn in_range<T: PartialOrd + Display + Copy>(name: &'static str, v: T, lo: T, hi: T) -> Result<T> {
    if v >= lo && v <= hi {
        Ok(v)
    } else {
        Err(Error::invalid(name, format!("{v} not in [{lo}, {hi}]")))
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.settings.server.cors_origins);

    let api = Router::new()
        .route("/dataset/info", get(dataset_info))
        .route("/dataset/reload", post(dataset_reload))
        .route("/dashboard/executive-overview", get(executive_overview))
        .route("/dashboard/high-risk-transactions", get(high_risk_transactions))
        .route("/dashboard/fraud-velocity-heatmap", get(velocity_heatmap))
        .route("/dashboard/fraud-type-breakdown", get(fraud_type_breakdown))
        .route("/dashboard/smart-alerts", get(smart_alerts))
        .route("/dashboard/predictive-risk-scores", get(predictive_risk_scores))
        .route("/dashboard/behavioral-anomalies", get(behavioral_anomalies))
        .route("/network/fraud-network-graph", get(fraud_network_graph))
        .route("/network/mule-accounts", get(mule_accounts))
        .route("/network/accounts/:account_id", get(account))
        .route("/analytics/transaction-explanation/:transaction_id", get(transaction_explanation))
        .route("/analytics/financial-impact", get(financial_impact))
        .route("/analytics/merchant-channel-risk", get(merchant_channel_risk))
        .route("/model/health", get(model_health))
        .route("/model/confusion-matrix", get(confusion_matrix))
        .route("/model/feature-importance", get(feature_importance));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {o:?}");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let bind = state.settings.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Health {
    status:      &'static str,
    version:     &'static str,
    uptime_secs: u64,
    dataset:     DatasetInfo,
}

async fn health(State(state): Shared) -> Json<Health> {
    let dataset = state.provider.info();
    Json(Health {
        status:      if dataset.degraded { "degraded" } else { "healthy" },
        version:     env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        dataset,
    })
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "fraudscope",
        "version": env!("CARGO_PKG_VERSION"),
        "health":  "/health",
        "api":     "/api/v1",
    }))
}

async fn dataset_info(State(state): Shared) -> Json<DatasetInfo> {
    Json(state.provider.info())
}

async fn dataset_reload(State(state): Shared) -> Result<Json<DatasetInfo>> {
    let provider = Arc::clone(&state.provider);
    let info = tokio::task::spawn_blocking(move || {
        provider.reload();
        provider.info()
    })
    .await
    .map_err(|e| Error::Task(e.to_string()))?;
    info!("Dataset reloaded via API: v{} ({} rows)", info.version, info.row_count);
    Ok(Json(info))
}

// ── Dashboard ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HoursQuery {
    hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn executive_overview(
    State(state): Shared,
    ApiQuery(q): ApiQuery<HoursQuery>,
) -> Result<Json<reports::dashboard::ExecutiveOverview>> {
    let hours = in_range("hours", q.hours.unwrap_or(24), 1, 168)?;
    let threshold = state.settings.alerts.high_risk_threshold;
    with_snapshot(&state, move |ds| Ok(reports::executive_overview(&ds, hours, threshold))).await
}

async fn high_risk_transactions(
    State(state): Shared,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> Result<Json<reports::dashboard::HighRiskFeed>> {
    let limit = in_range("limit", q.limit.unwrap_or(50), 1, 200)?;
    let threshold = state.settings.alerts.high_risk_threshold;
    with_snapshot(&state, move |ds| Ok(reports::high_risk_feed(&ds, limit, threshold))).await
}

async fn velocity_heatmap(
    State(state): Shared,
    ApiQuery(q): ApiQuery<HoursQuery>,
) -> Result<Json<reports::dashboard::VelocityHeatmap>> {
    let hours = in_range("hours", q.hours.unwrap_or(24), 1, 168)?;
    with_snapshot(&state, move |ds| Ok(reports::velocity_heatmap(&ds, hours))).await
}

async fn fraud_type_breakdown(State(state): Shared) -> Result<Json<reports::dashboard::FraudTypeBreakdown>> {
    with_snapshot(&state, |ds| Ok(reports::fraud_type_breakdown(&ds))).await
}

async fn smart_alerts(
    State(state): Shared,
    ApiQuery(q): ApiQuery<HoursQuery>,
) -> Result<Json<reports::alerts::SmartAlertFeed>> {
    let hours = in_range("hours", q.hours.unwrap_or(24), 1, 168)?;
    let network = state.settings.network.clone();
    let model = state.settings.model.clone();
    with_snapshot(&state, move |ds| Ok(reports::smart_alerts(&ds, hours, &network, &model))).await
}

async fn predictive_risk_scores(
    State(state): Shared,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> Result<Json<reports::accounts_at_risk::PredictiveRiskScores>> {
    let limit = in_range("limit", q.limit.unwrap_or(100), 1, 500)?;
    with_snapshot(&state, move |ds| Ok(reports::predictive_risk_scores(&ds, limit))).await
}

async fn behavioral_anomalies(State(state): Shared) -> Result<Json<reports::alerts::BehavioralAnomalies>> {
    with_snapshot(&state, |ds| Ok(reports::behavioral_anomalies(&ds))).await
}

// ── Network ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GraphQuery {
    min_transactions: Option<usize>,
    min_fraud_prob:   Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct NetworkGraphResponse {
    pub nodes:            Vec<NetworkNode>,
    pub edges:            Vec<NetworkEdge>,
    pub fraud_rings:      Vec<FraudRing>,
    pub rings_detected:   usize,
    pub total_accounts:   usize,
    pub total_edges:      usize,
    pub total_volume:     f64,
    pub min_transactions: usize,
    pub min_fraud_prob:   f64,
}

async fn fraud_network_graph(
    State(state): Shared,
    ApiQuery(q): ApiQuery<GraphQuery>,
) -> Result<Json<NetworkGraphResponse>> {
    let net = &state.settings.network;
    let mut params = GraphParams::from(net);
    params.min_transactions = in_range("min_transactions", q.min_transactions.unwrap_or(net.min_transactions), 1, 10)?;
    params.min_fraud_prob = in_range("min_fraud_prob", q.min_fraud_prob.unwrap_or(net.min_fraud_prob), 0.0, 1.0)?;
    let ring_params = RingParams::from(net);
    let max_edges = net.max_edges;

    with_snapshot(&state, move |ds| {
        let graph = RelationshipGraph::build(ds.rows(), params);
        let fraud_rings = detect_fraud_rings(&graph, ring_params);
        let mut edges = graph.edges().to_vec();
        let total_edges = edges.len();
        edges.truncate(max_edges);
        Ok(NetworkGraphResponse {
            total_accounts:   graph.nodes().len(),
            total_volume:     graph.total_volume(),
            nodes:            graph.nodes().to_vec(),
            edges,
            rings_detected:   fraud_rings.len(),
            fraud_rings,
            total_edges,
            min_transactions: params.min_transactions,
            min_fraud_prob:   params.min_fraud_prob,
        })
    })
    .await
}

#[derive(Debug, Deserialize)]
struct MuleQuery {
    min_senders:              Option<usize>,
    redistribution_threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct MuleResponse {
    pub mule_accounts:            Vec<MuleCandidate>,
    pub total_detected:           usize,
    pub min_senders:              usize,
    pub redistribution_threshold: f64,
}

async fn mule_accounts(State(state): Shared, ApiQuery(q): ApiQuery<MuleQuery>) -> Result<Json<MuleResponse>> {
    let m = &state.settings.mules;
    let mut params = MuleParams::from(m);
    params.min_senders = in_range("min_senders", q.min_senders.unwrap_or(m.min_senders), 3, 20)?;
    params.redistribution_threshold = in_range(
        "redistribution_threshold",
        q.redistribution_threshold.unwrap_or(m.redistribution_threshold),
        0.5,
        1.0,
    )?;

    with_snapshot(&state, move |ds| {
        let mule_accounts = detect_mule_accounts(ds.rows(), params);
        Ok(MuleResponse {
            total_detected: mule_accounts.len(),
            mule_accounts,
            min_senders: params.min_senders,
            redistribution_threshold: params.redistribution_threshold,
        })
    })
    .await
}

async fn account(State(state): Shared, Path(account_id): Path<String>) -> Result<Json<AccountProfile>> {
    with_snapshot(&state, move |ds| account_profile(ds.rows(), &account_id)).await
}

// ── Analytics ─────────────────────────────────────────────────────────────────

async fn transaction_explanation(
    State(state): Shared,
    Path(transaction_id): Path<String>,
) -> Result<Json<reports::explain::TransactionExplanation>> {
    let app = Arc::clone(&state);
    with_snapshot(&state, move |ds| {
        reports::explain_transaction(&ds, app.provider.scorer(), &transaction_id)
    })
    .await
}

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    period_days: Option<i64>,
}

async fn financial_impact(
    State(state): Shared,
    ApiQuery(q): ApiQuery<PeriodQuery>,
) -> Result<Json<reports::business::FinancialImpact>> {
    let days = in_range("period_days", q.period_days.unwrap_or(30), 1, 365)?;
    let threshold = state.settings.model.decision_threshold;
    with_snapshot(&state, move |ds| Ok(reports::financial_impact(&ds, days, threshold))).await
}

async fn merchant_channel_risk(State(state): Shared) -> Result<Json<reports::business::MerchantChannelRisk>> {
    with_snapshot(&state, |ds| Ok(reports::merchant_channel_risk(&ds))).await
}

// ── Model ─────────────────────────────────────────────────────────────────────

async fn model_health(State(state): Shared) -> Result<Json<eval::ModelHealth>> {
    let model = state.settings.model.clone();
    with_snapshot(&state, move |ds| Ok(eval::model_health(&ds, &model))).await
}

async fn confusion_matrix(State(state): Shared) -> Result<Json<eval::ConfusionMatrix>> {
    let threshold = state.settings.model.decision_threshold;
    with_snapshot(&state, move |ds| Ok(eval::confusion_matrix(&ds, threshold))).await
}

async fn feature_importance(State(state): Shared) -> Result<Json<Vec<eval::FeatureImportance>>> {
    with_snapshot(&state, |ds| Ok(eval::feature_importance(&ds))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_is_inclusive() {
        assert_eq!(in_range("hours", 1, 1, 168).unwrap(), 1);
        assert_eq!(in_range("hours", 168, 1, 168).unwrap(), 168);
        let err = in_range("hours", 169, 1, 168).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "hours", .. }));
        assert!(in_range("min_fraud_prob", 1.01, 0.0, 1.0).is_err());
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(Error::not_found("transaction", "x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::invalid("limit", "0").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Task("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cors_accepts_explicit_origins() {
        // Invalid header values are dropped, not fatal
        let _ = cors_layer(&["http://localhost:3000".into(), "bad\norigin".into()]);
        let _ = cors_layer(&[]);
    }
}
