use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    AllocationComponents, AllocationError, AllocationResult, AlphaVariant, StrategyRow,
    WealthPolicy, compare, format_percent, recommend,
};
use crate::io::{LoadOptions, LoadedProfile, load_profile, profile_from_value};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliVariant {
    Merton,
    LogReturn,
}

impl From<CliVariant> for AlphaVariant {
    fn from(value: CliVariant) -> Self {
        match value {
            CliVariant::Merton => AlphaVariant::Merton,
            CliVariant::LogReturn => AlphaVariant::LogReturn,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "lifecycle-alloc",
    about = "Lifecycle stock/bond allocation from wealth, human capital and risk aversion"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a recommendation and write allocation.json and summary.md.
    Alloc {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long, default_value = "out")]
        out: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the recommendation next to the rule-of-thumb strategies.
    Compare {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long, help = "N in the N-minus-age rule")]
        n: Option<u32>,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// Command-line values that replace what the profile document says.
#[derive(Args, Debug, Default, Clone)]
struct Overrides {
    #[arg(long, help = "Expected equity return, e.g. 0.05")]
    mu: Option<f64>,
    #[arg(long, help = "Risk-free rate, e.g. 0.02")]
    r: Option<f64>,
    #[arg(long, help = "Equity volatility, e.g. 0.18")]
    sigma: Option<f64>,
    #[arg(long)]
    borrowing_spread: Option<f64>,
    #[arg(long, help = "Last age included in the human-capital sum")]
    tmax: Option<u32>,
    #[arg(long)]
    allow_leverage: bool,
    #[arg(long)]
    max_leverage: Option<f64>,
    #[arg(long, conflicts_with = "nominal")]
    real: bool,
    #[arg(long)]
    nominal: bool,
    #[arg(long, value_enum)]
    variant: Option<CliVariant>,
    #[arg(
        long,
        help = "Treat non-positive investable wealth as full allocation instead of an error"
    )]
    wealth_fallback: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Server(std::io::Error),
}

type CliResult<T> = std::result::Result<T, CliError>;

/// `allocation.json`: the result without its explanation text.
#[derive(Debug, Serialize)]
struct AllocationReport<'a> {
    alpha_star: f64,
    alpha_unconstrained: f64,
    alpha_recommended: f64,
    human_capital: f64,
    leverage_applied: bool,
    borrowing_cost_drag: f64,
    components: &'a AllocationComponents,
    warnings: &'a [String],
}

impl<'a> From<&'a AllocationResult> for AllocationReport<'a> {
    fn from(result: &'a AllocationResult) -> Self {
        Self {
            alpha_star: result.alpha_star,
            alpha_unconstrained: result.alpha_unconstrained,
            alpha_recommended: result.alpha_recommended,
            human_capital: result.human_capital,
            leverage_applied: result.leverage_applied,
            borrowing_cost_drag: result.borrowing_cost_drag,
            components: &result.components,
            warnings: &result.warnings,
        }
    }
}

#[derive(Debug, Serialize)]
struct AllocateResponse {
    result: AllocationResult,
    comparison: Vec<StrategyRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

pub async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Alloc {
            profile,
            out,
            overrides,
        } => {
            let result = run_alloc(&profile, &out, &overrides)?;
            println!(
                "Recommended stock allocation: {}",
                format_percent(result.alpha_recommended)
            );
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }
            println!("Wrote {}", out.join("allocation.json").display());
            println!("Wrote {}", out.join("summary.md").display());
        }
        Command::Compare {
            profile,
            n,
            overrides,
        } => {
            let mut loaded = load_with_overrides(&profile, &overrides)?;
            if let Some(n) = n {
                loaded.options.n_minus_age = n;
            }
            let rows = comparison_rows(&loaded)?;
            print!("{}", strategy_table(&rows));
        }
        Command::Serve { port } => run_http_server(port).await.map_err(CliError::Server)?,
    }
    Ok(())
}

fn load_with_overrides(path: &Path, overrides: &Overrides) -> crate::core::Result<LoadedProfile> {
    let mut loaded = load_profile(path)?;
    apply_overrides(&mut loaded, overrides)?;
    Ok(loaded)
}

fn apply_overrides(loaded: &mut LoadedProfile, overrides: &Overrides) -> crate::core::Result<()> {
    let market = &mut loaded.market;
    if let Some(mu) = overrides.mu {
        market.mu = mu;
    }
    if let Some(r) = overrides.r {
        market.r = r;
    }
    if let Some(sigma) = overrides.sigma {
        market.sigma = sigma;
    }
    if let Some(spread) = overrides.borrowing_spread {
        market.borrowing_spread = spread;
    }
    if overrides.real {
        market.real = true;
    }
    if overrides.nominal {
        market.real = false;
    }

    let constraints = &mut loaded.constraints;
    if overrides.allow_leverage {
        constraints.allow_leverage = true;
    }
    if let Some(max_leverage) = overrides.max_leverage {
        constraints.max_leverage = max_leverage;
    }

    let options = &mut loaded.options.recommend;
    if let Some(t_max) = overrides.tmax {
        options.t_max = t_max;
    }
    if let Some(variant) = overrides.variant {
        options.variant = variant.into();
    }
    if overrides.wealth_fallback {
        options.wealth_policy = WealthPolicy::FullAllocation;
    }

    loaded.market.validate()?;
    loaded.constraints.validate()
}

fn recommend_loaded(loaded: &LoadedProfile) -> crate::core::Result<AllocationResult> {
    recommend(
        &loaded.profile,
        &loaded.market,
        &loaded.curve,
        &loaded.constraints,
        &loaded.options.recommend,
    )
}

fn comparison_rows(loaded: &LoadedProfile) -> crate::core::Result<Vec<StrategyRow>> {
    compare(
        &loaded.profile,
        &loaded.market,
        &loaded.curve,
        &loaded.constraints,
        &loaded.strategies,
        &loaded.options,
    )
}

fn run_alloc(profile: &Path, out: &Path, overrides: &Overrides) -> CliResult<AllocationResult> {
    let loaded = load_with_overrides(profile, overrides)?;
    let result = recommend_loaded(&loaded)?;
    let rows = comparison_rows(&loaded)?;

    fs::create_dir_all(out).map_err(|source| CliError::Io {
        path: out.display().to_string(),
        source,
    })?;

    let json = serde_json::to_string_pretty(&AllocationReport::from(&result))?;
    write_output(&out.join("allocation.json"), &json)?;
    write_output(&out.join("summary.md"), &summary_markdown(&result, &rows))?;

    info!(
        alpha = result.alpha_recommended,
        out = %out.display(),
        "allocation written"
    );
    Ok(result)
}

fn write_output(path: &Path, contents: &str) -> CliResult<()> {
    fs::write(path, contents).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn summary_markdown(result: &AllocationResult, rows: &[StrategyRow]) -> String {
    let mut md = String::from("# Lifecycle Allocation Summary\n\n");
    md.push_str("```\n");
    md.push_str(&result.explain);
    md.push_str("\n```\n\n");

    if !result.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for warning in &result.warnings {
            md.push_str(&format!("- {warning}\n"));
        }
        md.push('\n');
    }

    md.push_str("## Strategy Comparison\n\n");
    md.push_str(&strategy_table(rows));
    md
}

fn strategy_table(rows: &[StrategyRow]) -> String {
    let mut table = String::from("| Strategy | Allocation | Description |\n|---|---:|---|\n");
    for row in rows {
        table.push_str(&format!(
            "| {} | {} | {} |\n",
            row.name,
            format_percent(row.allocation),
            row.description
        ));
    }
    table
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/allocate", post(allocate_handler))
        .route("/healthz", get(health_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "lifecycle allocation API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", "not_found")
}

async fn allocate_handler(Json(payload): Json<Value>) -> Response {
    match allocate_response(payload) {
        Ok(body) => {
            info!(
                alpha = body.result.alpha_recommended,
                leverage = body.result.leverage_applied,
                "allocate request served"
            );
            json_response(StatusCode::OK, body)
        }
        Err(err) => {
            warn!(kind = err.kind(), error = %err, "allocate request rejected");
            error_response(status_for(&err), &err.to_string(), err.kind())
        }
    }
}

/// Requests never read files named inside the document.
fn allocate_response(payload: Value) -> crate::core::Result<AllocateResponse> {
    let options = LoadOptions {
        base_dir: None,
        allow_external_files: false,
    };
    let loaded = profile_from_value(payload, &options)?;
    let result = recommend_loaded(&loaded)?;
    let comparison = comparison_rows(&loaded)?;
    Ok(AllocateResponse { result, comparison })
}

fn status_for(err: &AllocationError) -> StatusCode {
    match err {
        AllocationError::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AllocationError::Configuration(_) | AllocationError::DataSource(_) => {
            StatusCode::BAD_REQUEST
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str, kind: &'static str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            kind,
        },
    )
}
