use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::hedge::{
    HedgeCalculator, HedgeError, HedgeRequest, HedgeResult, HistogramBin, ReturnSummary,
    SimulationConfig, SimulationReport,
};
use crate::models::{GroupsMeta, HedgeGroup, HedgeGroupView};
use crate::store::GroupStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GroupStore>,
    pub calculator: Arc<HedgeCalculator>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/hedge-groups", get(list_groups))
        .route("/api/hedge-groups/:group_id/calculate", get(calculate_hedge))
        .route("/api/hedge-groups/:group_id/simulate", get(simulate_hedge))
        .route("/api/hedge-groups/:group_id/recompute", post(recompute_hedge))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// All groups in the current snapshot with their derived aggregates
async fn list_groups(State(state): State<AppState>) -> Json<GroupsResponse> {
    let catalog = state.store.catalog();
    let groups: Vec<HedgeGroupView> = catalog.groups.iter().map(HedgeGroupView::from).collect();

    Json(GroupsResponse {
        meta: GroupsMeta {
            timestamp: catalog.loaded_at.to_rfc3339(),
            count: groups.len(),
            total_markets: catalog.total_markets,
            price_source: catalog.price_source.clone(),
        },
        groups,
    })
}

/// Allocate a budget across a group, optionally with a return simulation
async fn calculate_hedge(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(params): Query<CalculateQuery>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let group = find_group(&state, &group_id)?;
    let request = params.hedge_request(&state.calculator)?;
    request.validate()?;

    let allocation = state.calculator.calculate(&group, &request);
    let simulation = if parse_flag("simulate", params.simulate.as_deref())? {
        let (report, _) = run_simulation(&state.calculator, &allocation, &params)?;
        Some(report)
    } else {
        None
    };

    debug!(
        group = %group.group_id,
        budget = request.budget,
        quality = allocation.quality.as_str(),
        "calculated hedge"
    );

    Ok(Json(CalculateResponse {
        allocation,
        group: HedgeGroupView::from(&group),
        simulation,
    }))
}

/// Return distribution of the hedge `calculate` would produce
async fn simulate_hedge(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(params): Query<CalculateQuery>,
) -> Result<Json<SimulateResponse>, ApiError> {
    let group = find_group(&state, &group_id)?;
    let request = params.hedge_request(&state.calculator)?;
    request.validate()?;

    let allocation = state.calculator.calculate(&group, &request);
    let (report, seed) = run_simulation(&state.calculator, &allocation, &params)?;

    Ok(Json(SimulateResponse {
        group_id: group.group_id,
        total_outlay: allocation.total_outlay,
        seed,
        histogram: report.histogram,
        summary: report.summary,
    }))
}

/// Rebuild a hedge from hand-edited contract counts
async fn recompute_hedge(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(body): Json<RecomputeBody>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let group = find_group(&state, &group_id)?;

    let request = HedgeRequest {
        budget: body.budget.unwrap_or(0.0),
        fee_per_contract: body
            .fee
            .unwrap_or(state.calculator.config().default_fee_per_contract),
        selected_tickers: body.selected.map(|s| s.into_iter().collect()),
        exit_threshold: body.exit_threshold,
    };
    match body.budget {
        Some(_) => request.validate()?,
        None => request.validate_terms()?,
    }

    let mut allocation = state.calculator.recompute(&group, &request, &body.contracts)?;
    if body.budget.is_none() {
        allocation.budget = allocation.total_outlay;
    }

    Ok(Json(CalculateResponse {
        allocation,
        group: HedgeGroupView::from(&group),
        simulation: None,
    }))
}

fn find_group(state: &AppState, group_id: &str) -> Result<HedgeGroup, ApiError> {
    state
        .store
        .find_group(group_id)
        .ok_or_else(|| HedgeError::UnknownGroup(group_id.to_string()).into())
}

/// Seeded so a client can replay the exact histogram
fn run_simulation(
    calculator: &HedgeCalculator,
    result: &HedgeResult,
    params: &CalculateQuery,
) -> Result<(SimulationReport, u64), ApiError> {
    let mut config: SimulationConfig = calculator.config().simulation.clone();
    if let Some(n) = parse_param::<usize>("numSimulations", params.num_simulations.as_deref())? {
        if n == 0 {
            return Err(ApiError::BadRequest("numSimulations must be positive".to_string()));
        }
        config.num_simulations = n;
    }
    if let Some(bin) = parse_param::<f64>("binSizePct", params.bin_size_pct.as_deref())? {
        config.bin_size_pct = bin;
    }
    let seed = parse_param::<u64>("seed", params.seed.as_deref())?.unwrap_or_else(rand::random::<u64>);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let report = calculator.simulate(result, Some(&config), &mut rng)?;
    Ok((report, seed))
}

fn parse_param<T: FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} must be a number (got {:?})", name, v))),
    }
}

/// Query flags accept true/false, 1/0, yes/no and on/off; absent is false
fn parse_flag(name: &str, raw: Option<&str>) -> Result<bool, ApiError> {
    let Some(v) = raw.map(str::trim) else {
        return Ok(false);
    };
    match v.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        _ => Err(ApiError::BadRequest(format!(
            "{} must be true or false (got {:?})",
            name, v
        ))),
    }
}

// ===== Request/Response Types =====

/// Numbers and flags arrive as strings so malformed values get a JSON error body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculateQuery {
    budget: Option<String>,
    fee: Option<String>,
    /// Comma-separated tickers
    selected: Option<String>,
    exit_threshold: Option<String>,
    simulate: Option<String>,
    seed: Option<String>,
    num_simulations: Option<String>,
    bin_size_pct: Option<String>,
}

impl CalculateQuery {
    fn hedge_request(&self, calculator: &HedgeCalculator) -> Result<HedgeRequest, ApiError> {
        let budget = parse_param::<f64>("budget", self.budget.as_deref())?
            .ok_or_else(|| ApiError::BadRequest("budget is required".to_string()))?;
        let fee = parse_param::<f64>("fee", self.fee.as_deref())?
            .unwrap_or(calculator.config().default_fee_per_contract);

        let mut request = HedgeRequest::new(budget, fee);
        request.exit_threshold = parse_param("exitThreshold", self.exit_threshold.as_deref())?;
        request.selected_tickers = self.selected.as_deref().and_then(|raw| {
            let tickers: HashSet<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            (!tickers.is_empty()).then_some(tickers)
        });
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecomputeBody {
    budget: Option<f64>,
    fee: Option<f64>,
    #[serde(default)]
    contracts: HashMap<String, u32>,
    exit_threshold: Option<f64>,
    selected: Option<Vec<String>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct GroupsResponse {
    groups: Vec<HedgeGroupView>,
    meta: GroupsMeta,
}

#[derive(Serialize)]
struct CalculateResponse {
    allocation: HedgeResult,
    group: HedgeGroupView,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation: Option<SimulationReport>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    group_id: String,
    total_outlay: f64,
    seed: u64,
    histogram: Vec<HistogramBin>,
    summary: ReturnSummary,
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<HedgeError> for ApiError {
    fn from(err: HedgeError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::BadRequest(err.to_string())
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
