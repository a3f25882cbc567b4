//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::config_validation::{parse_setting, parse_tickers, validate_analysis_config};
use crate::domain::delta::{infer_deltas, DeltaConfig, LabelPolicy, Lookback, PositionDelta};
use crate::domain::error::HoldflowError;
use crate::domain::holding::QuantitySource;
use crate::domain::pipeline::{run_analysis, AnalysisConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_OUTPUT_DIR: &str = "reports";

#[derive(Parser, Debug)]
#[command(
    name = "holdflow",
    about = "Infer institutional position changes and test them against next-quarter returns"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full analysis and write every report
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Write per-filer position change files only
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Load holdings and prices from CSV into the SQLite store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        holdings: Option<PathBuf>,
        #[arg(long)]
        prices: Option<PathBuf>,
    },
    /// Show holdings count and price range per ticker
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
    /// Validate an analysis configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            ticker,
            output_dir,
        } => run_analyze(&config, ticker.as_deref(), output_dir.as_deref()),
        Command::Trades {
            config,
            ticker,
            output_dir,
        } => run_trades(&config, ticker.as_deref(), output_dir.as_deref()),
        Command::Import {
            config,
            holdings,
            prices,
        } => run_import(&config, holdings, prices),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn describe_tickers(tickers: &[String]) -> String {
    if tickers.is_empty() {
        "any ticker".to_string()
    } else {
        tickers.join(", ")
    }
}

fn fail(err: HoldflowError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Build the run configuration from `[analysis]`, falling back to defaults
/// for absent keys.
pub fn build_analysis_config(config: &dyn ConfigPort) -> Result<AnalysisConfig, HoldflowError> {
    validate_analysis_config(config)?;

    let defaults = DeltaConfig::default();
    let delta = DeltaConfig {
        lookback: parse_setting::<Lookback>(config, "lookback_depth")?.unwrap_or(defaults.lookback),
        label_policy: parse_setting::<LabelPolicy>(config, "label_policy")?
            .unwrap_or(defaults.label_policy),
        quantity_source: parse_setting::<QuantitySource>(config, "quantity_source")?
            .unwrap_or(defaults.quantity_source),
    };

    Ok(AnalysisConfig {
        tickers: resolve_tickers(None, config)?,
        delta,
    })
}

/// A `--ticker` override wins over `[analysis] tickers`; empty means all.
pub fn resolve_tickers(
    ticker_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, HoldflowError> {
    if let Some(t) = ticker_override.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(vec![t.to_uppercase()]);
    }

    match config.get_string("analysis", "tickers") {
        Some(s) if !s.trim().is_empty() => {
            parse_tickers(&s).map_err(|e| HoldflowError::ConfigInvalid {
                section: "analysis".into(),
                key: "tickers".into(),
                reason: e.to_string(),
            })
        }
        _ => Ok(Vec::new()),
    }
}

pub fn resolve_output_dir(output_override: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    output_override
        .map(Path::to_path_buf)
        .or_else(|| config.get_path("report", "output_dir"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

fn prepare_run(
    config_path: &Path,
    ticker_override: Option<&str>,
    output_override: Option<&Path>,
) -> Result<(FileConfigAdapter, AnalysisConfig, PathBuf), ExitCode> {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;

    // Stage 2: Validate and build the run configuration
    let mut analysis = build_analysis_config(&adapter).map_err(fail)?;
    if ticker_override.is_some() {
        analysis.tickers = resolve_tickers(ticker_override, &adapter).map_err(fail)?;
    }
    let output_dir = resolve_output_dir(output_override, &adapter);

    eprintln!(
        "Quantity: {}, lookback: {}, labels: {}",
        analysis.delta.quantity_source, analysis.delta.lookback, analysis.delta.label_policy
    );
    if analysis.tickers.is_empty() {
        eprintln!("Tickers: all in store");
    } else {
        eprintln!("Tickers: {}", analysis.tickers.join(", "));
    }

    Ok((adapter, analysis, output_dir))
}

fn run_analyze(
    config_path: &Path,
    ticker_override: Option<&str>,
    output_override: Option<&Path>,
) -> ExitCode {
    let (adapter, analysis, output_dir) =
        match prepare_run(config_path, ticker_override, output_override) {
            Ok(prepared) => prepared,
            Err(code) => return code,
        };

    #[cfg(feature = "sqlite")]
    {
        let store = match open_store(&adapter) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let report = TextReportAdapter::new(&output_dir);
        run_analysis_pipeline(&store, &store, &analysis, &report)
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, analysis, output_dir);
        eprintln!("error: sqlite feature is required for analyze");
        ExitCode::from(1)
    }
}

/// Stages 3 onward of `analyze`, over any stores and report sink.
pub fn run_analysis_pipeline(
    holdings: &dyn HoldingsPort,
    prices: &dyn PricePort,
    analysis: &AnalysisConfig,
    report: &dyn ReportPort,
) -> ExitCode {
    // Stage 3: Deltas, exposure, quarter closes, alignment, statistics
    let output = match run_analysis(holdings, prices, analysis) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    for skipped in &output.skipped {
        eprintln!("warning: skipping {} ({})", skipped.ticker, skipped.reason);
    }
    if output.deltas.is_empty() {
        return fail(HoldflowError::NoData {
            reason: format!("no position changes for {}", describe_tickers(&analysis.tickers)),
        });
    }

    // Stage 4: Reports
    if let Err(e) = report.write_all(&output) {
        return fail(e);
    }

    eprintln!("\n=== Summary ===");
    eprintln!("Tickers:          {}", output.tickers.len());
    eprintln!("Position changes: {}", output.deltas.len());
    eprintln!("Exposure rows:    {}", output.exposure.len());
    eprintln!("Matched rows:     {}", output.observations.len());
    match &output.stats {
        Ok(stats) => {
            match &stats.pearson {
                Ok(c) => eprintln!("Pearson r:        {:.3} (p = {:.4})", c.r, c.p_value),
                Err(e) => eprintln!("Pearson r:        not enough data ({e})"),
            }
            match &stats.spearman {
                Ok(c) => eprintln!("Spearman rho:     {:.3} (p = {:.4})", c.r, c.p_value),
                Err(e) => eprintln!("Spearman rho:     not enough data ({e})"),
            }
            match &stats.regression {
                Ok(r) => eprintln!("Beta:             {:.10} (t = {:.2})", r.beta, r.t_stat),
                Err(e) => eprintln!("Beta:             not enough data ({e})"),
            }
            match &stats.directional {
                Ok(d) => eprintln!(
                    "Hit rate:         {:.2}% ({} / {})",
                    d.hit_rate * 100.0,
                    d.hits,
                    d.n
                ),
                Err(e) => eprintln!("Hit rate:         not enough data ({e})"),
            }
        }
        Err(e) => eprintln!("Statistics:       not enough data ({e})"),
    }

    ExitCode::SUCCESS
}

fn run_trades(
    config_path: &Path,
    ticker_override: Option<&str>,
    output_override: Option<&Path>,
) -> ExitCode {
    let (adapter, analysis, output_dir) =
        match prepare_run(config_path, ticker_override, output_override) {
            Ok(prepared) => prepared,
            Err(code) => return code,
        };

    #[cfg(feature = "sqlite")]
    {
        let store = match open_store(&adapter) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let report = TextReportAdapter::new(&output_dir);
        run_trades_pipeline(&store, &analysis, &report)
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, analysis, output_dir);
        eprintln!("error: sqlite feature is required for trades");
        ExitCode::from(1)
    }
}

/// Infer position changes and write one trades file per ticker.
pub fn run_trades_pipeline(
    holdings: &dyn HoldingsPort,
    analysis: &AnalysisConfig,
    report: &dyn ReportPort,
) -> ExitCode {
    let (tickers, records) = if analysis.tickers.is_empty() {
        match holdings
            .list_tickers()
            .and_then(|t| holdings.read_holdings(None).map(|r| (t, r)))
        {
            Ok(loaded) => loaded,
            Err(e) => return fail(e),
        }
    } else {
        match holdings.read_holdings(Some(analysis.tickers.as_slice())) {
            Ok(r) => (analysis.tickers.clone(), r),
            Err(e) => return fail(e),
        }
    };

    if records.is_empty() {
        return fail(HoldflowError::NoData {
            reason: format!("no holdings for {}", describe_tickers(&analysis.tickers)),
        });
    }

    let deltas = infer_deltas(&records, &analysis.delta);
    for ticker in &tickers {
        let subset: Vec<PositionDelta> = deltas
            .iter()
            .filter(|d| &d.ticker == ticker)
            .cloned()
            .collect();
        if let Err(e) = report.write_trades(ticker, &subset) {
            return fail(e);
        }
        eprintln!("  {}: {} position changes", ticker, subset.len());
    }

    ExitCode::SUCCESS
}

#[cfg(feature = "sqlite")]
fn open_store(
    config: &dyn ConfigPort,
) -> Result<crate::adapters::sqlite_adapter::SqliteStore, HoldflowError> {
    let store = crate::adapters::sqlite_adapter::SqliteStore::from_config(config)?;
    store.initialize_schema()?;
    Ok(store)
}

fn run_import(config_path: &Path, holdings: Option<PathBuf>, prices: Option<PathBuf>) -> ExitCode {
    if holdings.is_none() && prices.is_none() {
        eprintln!("error: nothing to import (use --holdings and/or --prices)");
        return ExitCode::from(1);
    }

    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::CsvStore;

        let store = match open_store(&adapter) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let source = CsvStore::from_files(holdings, prices);

        let records = match source.read_holdings(None) {
            Ok(r) => r,
            Err(e) => return fail(e),
        };
        if !records.is_empty() {
            match store.insert_holdings(&records) {
                Ok(inserted) => eprintln!(
                    "Holdings: {} inserted, {} already present",
                    inserted,
                    records.len() - inserted
                ),
                Err(e) => return fail(e),
            }
        }

        let bars = match source.all_prices() {
            Ok(b) => b,
            Err(e) => return fail(e),
        };
        if !bars.is_empty() {
            match store.upsert_prices(&bars) {
                Ok(n) => eprintln!("Prices: {} rows upserted", n),
                Err(e) => return fail(e),
            }
        }

        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, holdings, prices);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

fn run_info(config_path: &Path, ticker_override: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let requested = match resolve_tickers(ticker_override, &config) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    #[cfg(feature = "sqlite")]
    {
        let store = match open_store(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };

        let tickers = if requested.is_empty() {
            match store.list_tickers() {
                Ok(t) => t,
                Err(e) => return fail(e),
            }
        } else {
            requested
        };

        if tickers.is_empty() {
            eprintln!("No holdings found");
            return ExitCode::SUCCESS;
        }

        for t in &tickers {
            let holdings = match store.count_holdings(t) {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("error querying {}: {}", t, e);
                    continue;
                }
            };
            match store.get_price_range(t) {
                Ok(Some((min_date, max_date, count))) => {
                    println!(
                        "{}: {} holdings, {} prices, {} to {}",
                        t, holdings, count, min_date, max_date
                    );
                }
                Ok(None) => println!("{}: {} holdings, no prices", t, holdings),
                Err(e) => eprintln!("error querying {}: {}", t, e),
            }
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = requested;
        eprintln!("error: sqlite feature is required for info");
        ExitCode::from(1)
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let analysis = match build_analysis_config(&config) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };

    eprintln!("\nAnalysis settings:");
    if analysis.tickers.is_empty() {
        eprintln!("  tickers:         (all in store)");
    } else {
        eprintln!("  tickers:         {}", analysis.tickers.join(", "));
    }
    eprintln!("  lookback_depth:  {}", analysis.delta.lookback);
    eprintln!("  quantity_source: {}", analysis.delta.quantity_source);
    eprintln!("  label_policy:    {}", analysis.delta.label_policy);
    eprintln!(
        "  output_dir:      {}",
        resolve_output_dir(None, &config).display()
    );

    if config.get_path("sqlite", "path").is_none() {
        eprintln!("\nwarning: [sqlite] path is not set; analyze, trades, import and info need it");
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
