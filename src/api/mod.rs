mod error;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Local, Months, NaiveDate};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    ContributionPlan, DrawdownOutcome, PriceSample, SimulationConfig, SimulationResult,
    SimulationRow, Totals, render_report, simulate,
};
use crate::data::{
    CachedPriceSource, DataError, Granularity, JsonFileSource, PriceQuery, PriceSource,
    YahooSource,
};

pub use error::ApiError;

const DEFAULT_INSTRUMENT: &str = "^GSPC";
const INLINE_INSTRUMENT: &str = "inline";
const DEFAULT_LOOKBACK_YEARS: u32 = 10;
const MAX_CONTRIBUTION: f64 = 1_000_000.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGranularity {
    Daily,
    Weekly,
    Monthly,
}

impl From<CliGranularity> for Granularity {
    fn from(value: CliGranularity) -> Self {
        match value {
            CliGranularity::Daily => Granularity::Daily,
            CliGranularity::Weekly => Granularity::Weekly,
            CliGranularity::Monthly => Granularity::Monthly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliPlan {
    Annual,
    LumpSum,
}

impl From<CliPlan> for ContributionPlan {
    fn from(value: CliPlan) -> Self {
        match value {
            CliPlan::Annual => ContributionPlan::Annual,
            CliPlan::LumpSum => ContributionPlan::LumpSum,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGranularity {
    #[serde(alias = "1d", alias = "day")]
    Daily,
    #[serde(alias = "1wk", alias = "week")]
    Weekly,
    #[serde(alias = "1mo", alias = "month")]
    Monthly,
}

impl From<ApiGranularity> for CliGranularity {
    fn from(value: ApiGranularity) -> Self {
        match value {
            ApiGranularity::Daily => CliGranularity::Daily,
            ApiGranularity::Weekly => CliGranularity::Weekly,
            ApiGranularity::Monthly => CliGranularity::Monthly,
        }
    }
}

impl From<Granularity> for ApiGranularity {
    fn from(value: Granularity) -> Self {
        match value {
            Granularity::Daily => ApiGranularity::Daily,
            Granularity::Weekly => ApiGranularity::Weekly,
            Granularity::Monthly => ApiGranularity::Monthly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiPlan {
    #[serde(alias = "yearly")]
    Annual,
    #[serde(alias = "lumpSum", alias = "lump_sum")]
    LumpSum,
}

impl From<ApiPlan> for CliPlan {
    fn from(value: ApiPlan) -> Self {
        match value {
            ApiPlan::Annual => CliPlan::Annual,
            ApiPlan::LumpSum => CliPlan::LumpSum,
        }
    }
}

impl From<ContributionPlan> for ApiPlan {
    fn from(value: ContributionPlan) -> Self {
        match value {
            ContributionPlan::Annual => ApiPlan::Annual,
            ContributionPlan::LumpSum => ApiPlan::LumpSum,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    #[serde(alias = "ticker")]
    instrument: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    #[serde(alias = "amount")]
    contribution_amount: Option<f64>,
    granularity: Option<ApiGranularity>,
    plan: Option<ApiPlan>,
    prices: Option<Vec<PriceSample>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "maxdd",
    about = "Wealth and maximum drawdown of a yearly investment into one instrument"
)]
pub struct Cli {
    #[arg(long, default_value = DEFAULT_INSTRUMENT, help = "Ticker symbol, e.g. ^GSPC")]
    instrument: String,
    #[arg(long, help = "First date of the window (YYYY-MM-DD); defaults to 10 years before the end date")]
    start_date: Option<NaiveDate>,
    #[arg(long, help = "Last date of the window (YYYY-MM-DD), inclusive; defaults to today")]
    end_date: Option<NaiveDate>,
    #[arg(long, default_value_t = 1000.0, help = "Amount invested at each contribution")]
    amount: f64,
    #[arg(long, value_enum, default_value_t = CliGranularity::Weekly)]
    granularity: CliGranularity,
    #[arg(
        long,
        value_enum,
        default_value_t = CliPlan::Annual,
        help = "Annual contributions in the first sampled month, or one lump sum"
    )]
    plan: CliPlan,
    #[arg(
        long,
        help = "Read <instrument>.json price files from this directory instead of Yahoo Finance"
    )]
    data_dir: Option<PathBuf>,
    #[arg(long, help = "Print the full JSON response instead of the text report")]
    json: bool,
}

#[derive(Debug)]
struct ApiRequest {
    query: PriceQuery,
    config: SimulationConfig,
    prices: Option<Vec<PriceSample>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub instrument: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contribution_amount: f64,
    granularity: ApiGranularity,
    plan: ApiPlan,
    pub anchor_month: u32,
    pub rows: Vec<SimulationRow>,
    pub summary: DrawdownOutcome,
    pub totals: Totals,
    pub report: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
struct AppState {
    source: Arc<CachedPriceSource<Box<dyn PriceSource>>>,
}

fn default_start(end_date: NaiveDate) -> NaiveDate {
    end_date
        .checked_sub_months(Months::new(12 * DEFAULT_LOOKBACK_YEARS))
        .unwrap_or(NaiveDate::MIN)
}

fn build_request(cli: Cli, today: NaiveDate) -> Result<ApiRequest, ApiError> {
    let instrument = cli.instrument.trim().to_string();
    if instrument.is_empty() {
        return Err(ApiError::InvalidConfiguration(
            "--instrument must not be empty".to_string(),
        ));
    }

    if !cli.amount.is_finite() || cli.amount <= 0.0 || cli.amount > MAX_CONTRIBUTION {
        return Err(ApiError::InvalidConfiguration(format!(
            "--amount must be > 0 and <= {MAX_CONTRIBUTION}"
        )));
    }

    let end_date = cli.end_date.unwrap_or(today);
    let start_date = cli.start_date.unwrap_or_else(|| default_start(end_date));
    if start_date > end_date {
        return Err(ApiError::InvalidConfiguration(
            "--start-date must be <= --end-date".to_string(),
        ));
    }

    Ok(ApiRequest {
        query: PriceQuery {
            instrument,
            start: start_date,
            end: end_date,
            granularity: cli.granularity.into(),
        },
        config: SimulationConfig {
            contribution_amount: cli.amount,
            start_date,
            end_date,
            plan: cli.plan.into(),
        },
        prices: None,
    })
}

/// Yahoo Finance unless a directory of JSON price files is given.
pub fn build_source(data_dir: Option<PathBuf>) -> Result<Box<dyn PriceSource>, DataError> {
    match data_dir {
        Some(dir) => Ok(Box::new(JsonFileSource::new(dir))),
        None => Ok(Box::new(YahooSource::new()?)),
    }
}

/// One-shot command line run; returns the text to print.
pub async fn run_cli(mut cli: Cli) -> Result<String, ApiError> {
    let json = cli.json;
    let source = build_source(cli.data_dir.take())?;
    let request = build_request(cli, Local::now().date_naive())?;
    let response = run_simulation(source.as_ref(), request).await?;

    if json {
        Ok(format!("{}\n", serde_json::to_string_pretty(&response)?))
    } else {
        Ok(response.report)
    }
}

async fn run_simulation<S: PriceSource + ?Sized>(
    source: &S,
    request: ApiRequest,
) -> Result<SimulateResponse, ApiError> {
    let prices = match request.prices {
        Some(ref prices) => prices.clone(),
        None => source.fetch(&request.query).await?,
    };
    let result = simulate(&prices, &request.config)?;

    info!(
        instrument = %request.query.instrument,
        rows = result.rows.len(),
        max_drawdown = result.outcome.max_drawdown(),
        "simulated"
    );
    Ok(build_simulate_response(&request, result))
}

pub fn router(source: Box<dyn PriceSource>) -> Router {
    let state = AppState {
        source: Arc::new(CachedPriceSource::new(source)),
    };
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, source: Box<dyn PriceSource>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(source);

    let listener = TcpListener::bind(addr).await?;
    info!("maxdd HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_handler_impl(state: AppState, payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload, Local::now().date_naive()) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected simulate request");
            return e.into_response();
        }
    };

    match run_simulation(state.source.as_ref(), request).await {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => {
            warn!(error = %e, status = %e.status(), "simulation failed");
            e.into_response()
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str, today: NaiveDate) -> Result<ApiRequest, ApiError> {
    let payload = serde_json::from_str::<SimulatePayload>(json)?;
    api_request_from_payload(payload, today)
}

fn api_request_from_payload(
    payload: SimulatePayload,
    today: NaiveDate,
) -> Result<ApiRequest, ApiError> {
    let mut cli = default_cli_for_api();

    match payload.instrument {
        Some(v) => cli.instrument = v,
        // Inline series are not the default index.
        None if payload.prices.is_some() => cli.instrument = INLINE_INSTRUMENT.to_string(),
        None => {}
    }
    if let Some(v) = payload.start_date {
        cli.start_date = Some(v);
    }
    if let Some(v) = payload.end_date {
        cli.end_date = Some(v);
    }
    if let Some(v) = payload.contribution_amount {
        cli.amount = v;
    }
    if let Some(v) = payload.granularity {
        cli.granularity = v.into();
    }
    if let Some(v) = payload.plan {
        cli.plan = v.into();
    }

    let mut request = build_request(cli, today)?;
    request.prices = payload.prices;
    Ok(request)
}

fn default_cli_for_api() -> Cli {
    Cli {
        instrument: DEFAULT_INSTRUMENT.to_string(),
        start_date: None,
        end_date: None,
        amount: 1_000.0,
        granularity: CliGranularity::Weekly,
        plan: CliPlan::Annual,
        data_dir: None,
        json: false,
    }
}

fn build_simulate_response(request: &ApiRequest, result: SimulationResult) -> SimulateResponse {
    let report = render_report(&request.query.instrument, &request.config, &result);
    SimulateResponse {
        instrument: request.query.instrument.clone(),
        start_date: request.config.start_date,
        end_date: request.config.end_date,
        contribution_amount: request.config.contribution_amount,
        granularity: request.query.granularity.into(),
        plan: request.config.plan.into(),
        anchor_month: result.anchor_month,
        rows: result.rows,
        summary: result.outcome,
        totals: result.totals,
        report,
    }
}
