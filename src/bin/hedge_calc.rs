//! Hedge Calculator CLI
//!
//! One-shot hedge calculation against a market snapshot file.
//!
//! Usage:
//!   hedge_calc --markets data/markets_snapshot.json --group KXHIGHNY-26FEB24 --budget 500
//!
//! Environment:
//!   HEDGE_MARKETS_PATH - Snapshot file (default for --markets)
//!   HEDGE_CONFIG_PATH - Optional TOML engine config
//!
//! Exits with status 2 when the inputs are rejected.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use hedgebot_backend::config::{load_env, load_hedge_config};
use hedgebot_backend::hedge::{HedgeCalculator, HedgeError, HedgeRequest, HedgeResult, SimulationReport};
use hedgebot_backend::models::{HedgeGroup, HedgeGroupView};
use hedgebot_backend::store::GroupStore;

#[derive(Parser, Debug)]
#[command(name = "hedge_calc")]
#[command(about = "Allocate a budget across a temperature bucket group")]
struct Args {
    /// Market snapshot JSON
    #[arg(long, env = "HEDGE_MARKETS_PATH")]
    markets: PathBuf,

    /// Group id, e.g. KXHIGHNY-26FEB24
    #[arg(long)]
    group: String,

    /// Dollars to deploy
    #[arg(long)]
    budget: f64,

    /// Fee per contract in dollars (defaults to the configured fee)
    #[arg(long)]
    fee: Option<f64>,

    /// Only hedge these tickers (comma-separated)
    #[arg(long, value_delimiter = ',')]
    selected: Vec<String>,

    /// YES probability at which a losing leg is exited
    #[arg(long)]
    exit_threshold: Option<f64>,

    /// Monte Carlo trials; 0 skips the simulation
    #[arg(long, default_value = "2000")]
    simulations: usize,

    /// Histogram bin width in percentage points
    #[arg(long, default_value = "5.0")]
    bin_size: f64,

    /// RNG seed for the simulation
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Print the JSON response instead of tables
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    load_env();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::WARN.into())
                .add_directive("hedge_calc=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let calculator = HedgeCalculator::new(load_hedge_config()?);
    let store = GroupStore::open(&args.markets)
        .with_context(|| format!("Failed to load {}", args.markets.display()))?;

    match run(&args, &calculator, &store) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e);
            Ok(ExitCode::from(2))
        }
    }
}

fn run(args: &Args, calculator: &HedgeCalculator, store: &GroupStore) -> Result<(), HedgeError> {
    let group = store
        .find_group(&args.group)
        .ok_or_else(|| HedgeError::UnknownGroup(args.group.clone()))?;

    let mut request = HedgeRequest::new(
        args.budget,
        args.fee.unwrap_or(calculator.config().default_fee_per_contract),
    );
    request.exit_threshold = args.exit_threshold;
    if !args.selected.is_empty() {
        request.selected_tickers = Some(args.selected.iter().cloned().collect::<HashSet<_>>());
    }
    request.validate()?;

    let result = calculator.calculate(&group, &request);
    let simulation = if args.simulations > 0 {
        let mut config = calculator.config().simulation.clone();
        config.num_simulations = args.simulations;
        config.bin_size_pct = args.bin_size;
        let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
        Some(calculator.simulate(&result, Some(&config), &mut rng)?)
    } else {
        None
    };
    debug!(group = %group.group_id, quality = result.quality.as_str(), "calculation done");

    if args.json {
        let body = json!({
            "allocation": result,
            "group": HedgeGroupView::from(&group),
            "simulation": simulation,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        print_report(&group, &result, simulation.as_ref());
    }
    Ok(())
}

fn print_report(group: &HedgeGroup, result: &HedgeResult, simulation: Option<&SimulationReport>) {
    println!(
        "{} | {} {} | {} buckets | sum YES {}¢ (overround {:+})",
        group.group_id,
        group.city,
        group.market_type.as_str(),
        group.num_buckets(),
        group.sum_yes_prices(),
        group.overround()
    );
    println!();

    println!("{:<28} {:<16} {:>4} {:>9} {:>9} {:>10} {:>10}", "TICKER", "RANGE", "NO", "CONTRACTS", "OUTLAY", "IF NO WINS", "IF YES WINS");
    for a in &result.allocations {
        let marker = if !a.included {
            " (excluded)"
        } else if !a.viable {
            " (not viable)"
        } else {
            ""
        };
        println!(
            "{:<28} {:<16} {:>3}¢ {:>9} {:>9.2} {:>10.2} {:>10.2}{}",
            a.ticker, a.range_label, a.no_price, a.contracts, a.total_outlay, a.profit_if_no_wins, a.loss_if_yes_wins, marker
        );
    }
    println!();

    println!("{:<16} {:>8} {:>10}", "IF WINNER IS", "PROB", "NET P&L");
    for s in &result.scenarios {
        println!("{:<16} {:>7.1}% {:>10.2}", s.winning_label, s.probability * 100.0, s.net_pnl);
    }
    println!();

    println!("Total outlay:     ${:.2} ({} contracts, fees ${:.2})", result.total_outlay, result.total_contracts, result.total_fees);
    println!("Expected profit:  ${:.2}", result.expected_profit);
    println!("Worst / best:     ${:.2} / ${:.2}", result.worst_case_pnl, result.best_case_pnl);
    println!("Win probability:  {:.1}%", result.win_probability * 100.0);
    if let Some(adjusted) = result.adjusted_expected_profit {
        println!("Exit-adjusted EV: ${:.2}", adjusted);
    }
    if result.quality_reason.is_empty() {
        println!("Quality:          {}", result.quality.as_str());
    } else {
        println!("Quality:          {} ({})", result.quality.as_str(), result.quality_reason);
    }

    if !result.exit_analysis.is_empty() {
        println!();
        println!("{:<16} {:>6} {:>10} {:>10} {:>10}", "EXIT LEG", "AT NO", "HELD", "EXITED", "SAVED");
        for e in &result.exit_analysis {
            println!(
                "{:<16} {:>5}¢ {:>10.2} {:>10.2} {:>10.2}",
                e.range_label, e.exit_no_price, e.loss_if_held, e.loss_if_exit, e.improvement
            );
        }
    }

    if let Some(report) = simulation {
        println!();
        let peak = report.histogram.iter().map(|b| b.count).max().unwrap_or(0).max(1);
        for bin in report.histogram.iter().filter(|b| b.count > 0) {
            let bar = "#".repeat((bin.count * 40).div_ceil(peak));
            println!("{:>7.1}% {:>6} {}", bin.bin, bin.count, bar);
        }
        let s = &report.summary;
        println!(
            "mean {:.2}% | sd {:.2}% | p5 {:.2}% | median {:.2}% | p95 {:.2}% | P(loss) {:.1}%",
            s.mean_return_pct,
            s.std_dev_pct,
            s.p5_return_pct,
            s.median_return_pct,
            s.p95_return_pct,
            s.loss_probability * 100.0
        );
    }
}
