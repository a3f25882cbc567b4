//! One analysis run: holdings and prices in, aligned series and statistics out.
//!
//! Every derived series is recomputed from the stores on each call; nothing is
//! cached between runs, so two runs over unchanged stores agree exactly.

use crate::domain::alignment::{align_returns, AlignedObservation};
use crate::domain::delta::{infer_deltas, DeltaConfig, PositionDelta};
use crate::domain::error::{HoldflowError, StatsError};
use crate::domain::exposure::{aggregate_exposure, exposure_timeseries, ExposurePoint, NetExposureChange};
use crate::domain::quarter_close::{resolve_quarter_closes, QuarterClose};
use crate::domain::stats::{evaluate_observations, StatsReport};
use crate::ports::holdings_port::HoldingsPort;
use crate::ports::price_port::PricePort;
use std::collections::BTreeSet;
use std::fmt;

/// Everything a run needs, passed in explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    /// Tickers to analyse; empty means every ticker in the holdings store.
    pub tickers: Vec<String>,
    pub delta: DeltaConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoExposure,
    NoPrices,
    PriceReadFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoExposure => write!(f, "no position changes"),
            SkipReason::NoPrices => write!(f, "no prices"),
            SkipReason::PriceReadFailed(reason) => write!(f, "price read failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub tickers: Vec<String>,
    pub deltas: Vec<PositionDelta>,
    pub exposure: Vec<NetExposureChange>,
    /// Matched exposure and mean forward return across tickers per period.
    pub timeseries: Vec<ExposurePoint>,
    pub quarter_closes: Vec<QuarterClose>,
    pub observations: Vec<AlignedObservation>,
    /// Kept as a result so callers choose how to report a thin sample.
    pub stats: Result<StatsReport, StatsError>,
    pub skipped: Vec<SkippedTicker>,
}

fn normalize_tickers(tickers: &[String]) -> Vec<String> {
    tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn run_analysis(
    holdings: &dyn HoldingsPort,
    prices: &dyn PricePort,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, HoldflowError> {
    let requested = normalize_tickers(&config.tickers);
    let (tickers, records) = if requested.is_empty() {
        (holdings.list_tickers()?, holdings.read_holdings(None)?)
    } else {
        let records = holdings.read_holdings(Some(requested.as_slice()))?;
        (requested, records)
    };
    tracing::info!(
        tickers = tickers.len(),
        records = records.len(),
        "loaded holdings"
    );

    let deltas = infer_deltas(&records, &config.delta);
    let exposure = aggregate_exposure(&deltas);

    let mut quarter_closes = Vec::new();
    let mut skipped = Vec::new();

    for ticker in &tickers {
        if !exposure.iter().any(|e| &e.ticker == ticker) {
            tracing::warn!(%ticker, "skipping: no position changes");
            skipped.push(SkippedTicker {
                ticker: ticker.clone(),
                reason: SkipReason::NoExposure,
            });
            continue;
        }

        let bars = match prices.read_prices(ticker) {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!(%ticker, error = %e, "skipping: price read failed");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::PriceReadFailed(e.to_string()),
                });
                continue;
            }
        };

        if bars.is_empty() {
            tracing::warn!(%ticker, "skipping: no prices");
            skipped.push(SkippedTicker {
                ticker: ticker.clone(),
                reason: SkipReason::NoPrices,
            });
            continue;
        }

        let closes = resolve_quarter_closes(&bars);
        tracing::debug!(%ticker, bars = bars.len(), quarters = closes.len(), "resolved quarter closes");
        quarter_closes.extend(closes);
    }

    let observations = align_returns(&exposure, &quarter_closes)?;
    let timeseries = exposure_timeseries(&observations);
    let stats = evaluate_observations(&observations);
    match &stats {
        Ok(report) => tracing::info!(
            observations = report.n,
            pearson_r = ?report.pearson.as_ref().map(|c| c.r).ok(),
            hit_rate = ?report.directional.as_ref().map(|d| d.hit_rate).ok(),
            "analysis complete"
        ),
        Err(e) => tracing::warn!(
            observations = observations.len(),
            error = %e,
            "statistics unavailable"
        ),
    }

    Ok(AnalysisOutput {
        tickers,
        deltas,
        exposure,
        timeseries,
        quarter_closes,
        observations,
        stats,
        skipped,
    })
}
