//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvBarAdapter, load_positions};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::file_counter_store::FileCounterStore;
use crate::adapters::paper_execution::PaperExecution;
use crate::domain::config::EngineConfig;
use crate::domain::config_validation::validate_engine_config;
use crate::domain::dispatch::standard_registry;
use crate::domain::engine::{Engine, Evaluation, run_bar};
use crate::domain::error::PhasetraderError;
use crate::domain::position::AccountSnapshot;

#[derive(Parser, Debug)]
#[command(name = "phasetrader", about = "Trend phase classification and signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate the latest bar and print the resulting requests
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding primary.csv, daily.csv, ...
        #[arg(short, long)]
        bars: PathBuf,
        #[arg(short, long)]
        positions: Option<PathBuf>,
        /// Counter store directory (defaults to the bar directory)
        #[arg(long)]
        counters: Option<PathBuf>,
        #[arg(long, default_value_t = 10_000.0)]
        equity: f64,
        /// Defaults to the equity
        #[arg(long)]
        balance: Option<f64>,
        /// Open trade risk in percent of equity, negative when at risk
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        open_risk: f64,
        /// Defaults to the latest primary close
        #[arg(long)]
        bid: Option<f64>,
        #[arg(long)]
        ask: Option<f64>,
    },
    /// Validate an instance configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Evaluate {
            config,
            bars,
            positions,
            counters,
            equity,
            balance,
            open_risk,
            bid,
            ask,
        } => {
            let account = AccountSnapshot {
                equity,
                balance: balance.unwrap_or(equity),
                open_trade_risk_percent: open_risk,
            };
            let counters = counters.unwrap_or_else(|| bars.clone());
            run_evaluate(
                &config,
                &bars,
                positions.as_deref(),
                &counters,
                account,
                bid.zip(ask),
            )
        }
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Validate and build the typed configuration.
pub fn build_config(adapter: &FileConfigAdapter) -> Result<EngineConfig, PhasetraderError> {
    validate_engine_config(adapter, &standard_registry().modes())?;
    EngineConfig::from_port(adapter)
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match build_config(&adapter) {
        Ok(config) => {
            println!(
                "configuration valid: instance {} trading {} in mode {}",
                config.instance_id, config.symbol, config.mode
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_evaluate(
    config_path: &Path,
    bars_dir: &Path,
    positions_path: Option<&Path>,
    counters_dir: &Path,
    account: AccountSnapshot,
    quote: Option<(f64, f64)>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 2: Load bars and positions
    eprintln!("Loading bars from {}", bars_dir.display());
    let bars = match CsvBarAdapter::new(bars_dir).load(config.capacity) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let positions = match positions_path.map(load_positions).transpose() {
        Ok(p) => p.unwrap_or_default(),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Evaluate against the paper backend
    let mut execution = PaperExecution::new(account, positions);
    if let Some((bid, ask)) = quote {
        execution = execution.with_quote(bid, ask);
    }
    let store = FileCounterStore::new(counters_dir);
    let engine = Engine::new(config);
    match run_bar(&engine, &bars, &mut execution, &store) {
        Ok(evaluation) => {
            print_evaluation(&evaluation);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn print_evaluation(evaluation: &Evaluation) {
    if evaluation.skipped {
        println!("bar skipped: series not aligned");
        return;
    }
    for close in &evaluation.closes {
        println!("CLOSE  {:?}  ({})", close.selector, close.reason);
    }
    for modify in &evaluation.modifies {
        println!(
            "MODIFY ticket {}  sl {:.5}  tp {:.5}",
            modify.ticket, modify.stop_loss_price, modify.take_profit_price
        );
    }
    for order in &evaluation.orders {
        println!(
            "{}  {} {:.2} lots @ {:.5}  sl {:.5}  tp {:.5}",
            if order.is_pending { "LIMIT " } else { "MARKET" },
            order.side,
            order.lots,
            order.entry_price,
            order.stop_loss_price,
            order.take_profit_price
        );
    }
    print!("{}", evaluation.report);
}
