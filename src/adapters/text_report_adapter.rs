//! Plain-text and CSV report adapter implementing ReportPort.
//!
//! Files written under the output directory:
//! - `<TICKER>_trades.txt`: per-filer position changes
//! - `exposure_vs_next_q_return.csv`: aligned observations, one row each
//! - `exposure_vs_next_q_return.txt`: per-ticker table with MATCH/MISMATCH/NEUTRAL
//! - `exposure_timeseries.csv`: matched exposure per period with z-scores and mean returns
//! - `stats_summary.txt`: significance tests

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::alignment::AlignedObservation;
use crate::domain::delta::PositionDelta;
use crate::domain::error::{HoldflowError, StatsError};
use crate::domain::exposure::ExposurePoint;
use crate::domain::quarter::Quarter;
use crate::domain::stats::StatsReport;
use crate::ports::report_port::ReportPort;

pub const OBSERVATIONS_CSV: &str = "exposure_vs_next_q_return.csv";
pub const EXPOSURE_SUMMARY_TXT: &str = "exposure_vs_next_q_return.txt";
pub const EXPOSURE_TIMESERIES_CSV: &str = "exposure_timeseries.csv";
pub const STATS_SUMMARY_TXT: &str = "stats_summary.txt";

const OBSERVATION_HEADER: [&str; 8] = [
    "ticker",
    "quarter",
    "period",
    "net_exposure_change",
    "close",
    "close_next",
    "forward_return",
    "signal",
];
const TIMESERIES_HEADER: [&str; 6] = [
    "quarter",
    "period",
    "net_exposure",
    "zscore",
    "mean_forward_return",
    "observations",
];

#[derive(Serialize)]
struct ObservationRow<'a> {
    ticker: &'a str,
    quarter: String,
    period: String,
    net_exposure_change: f64,
    close: f64,
    close_next: f64,
    forward_return: f64,
    signal: String,
}

impl<'a> From<&'a AlignedObservation> for ObservationRow<'a> {
    fn from(obs: &'a AlignedObservation) -> Self {
        Self {
            ticker: &obs.ticker,
            quarter: Quarter::containing(obs.period).to_string(),
            period: obs.period.format("%Y-%m-%d").to_string(),
            net_exposure_change: obs.net_exposure_change,
            close: obs.close,
            close_next: obs.close_next,
            forward_return: obs.forward_return,
            signal: obs.signal().to_string(),
        }
    }
}

#[derive(Serialize)]
struct TimeseriesRow {
    quarter: String,
    period: String,
    net_exposure: f64,
    zscore: Option<f64>,
    mean_forward_return: f64,
    observations: usize,
}

impl From<&ExposurePoint> for TimeseriesRow {
    fn from(point: &ExposurePoint) -> Self {
        Self {
            quarter: Quarter::containing(point.period).to_string(),
            period: point.period.format("%Y-%m-%d").to_string(),
            net_exposure: point.net_exposure,
            zscore: point.zscore,
            mean_forward_return: point.mean_forward_return,
            observations: point.observations,
        }
    }
}

/// Format a whole number with comma thousands separators, e.g. `-1,234,567`.
fn group_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 && rounded.chars().any(|c| c != '0') {
        grouped.insert(0, '-');
    }
    grouped
}

fn percent(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value * 100.0)
}

pub struct TextReportAdapter {
    output_dir: PathBuf,
}

impl TextReportAdapter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn trades_path(&self, ticker: &str) -> PathBuf {
        self.output_dir.join(format!("{ticker}_trades.txt"))
    }

    fn save(&self, name: &str, contents: &str) -> Result<(), HoldflowError> {
        fs::create_dir_all(&self.output_dir).map_err(HoldflowError::Io)?;
        let path = self.output_dir.join(name);
        fs::write(&path, contents).map_err(HoldflowError::Io)?;
        tracing::info!(path = %path.display(), "saved report");
        Ok(())
    }

    fn save_csv<R: Serialize>(
        &self,
        name: &str,
        header: &[&str],
        rows: &[R],
    ) -> Result<(), HoldflowError> {
        fs::create_dir_all(&self.output_dir).map_err(HoldflowError::Io)?;
        let path = self.output_dir.join(name);
        let csv_err = |e: csv::Error| HoldflowError::Csv {
            reason: format!("{}: {}", path.display(), e),
        };

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(csv_err)?;
        wtr.write_record(header).map_err(csv_err)?;
        for row in rows {
            wtr.serialize(row).map_err(csv_err)?;
        }
        wtr.flush().map_err(HoldflowError::Io)?;

        tracing::info!(path = %path.display(), rows = rows.len(), "saved report");
        Ok(())
    }
}

fn render_trades(ticker: &str, deltas: &[PositionDelta]) -> String {
    let source = deltas
        .first()
        .map(|d| d.quantity_source.to_string())
        .unwrap_or_else(|| "shares".to_string());

    let mut by_filer: BTreeMap<&str, Vec<&PositionDelta>> = BTreeMap::new();
    for d in deltas {
        by_filer.entry(&d.filer).or_default().push(d);
    }

    let mut out = format!("=== {ticker} (per-filer position changes; quantity={source}) ===\n\n");
    if by_filer.is_empty() {
        out.push_str("No position changes.\n");
        return out;
    }

    for (filer, mut rows) in by_filer {
        rows.sort_by_key(|d| d.period);
        out.push_str(&format!("FILER: {filer}\n"));
        out.push_str(&"-".repeat(7 + filer.chars().count()));
        out.push('\n');
        out.push_str("quarter | filed_date | action | prev_qty | qty | delta\n");
        for d in rows {
            let filed = d
                .filed_date
                .map(|f| f.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "{} | {} | {} | {:.0} | {:.0} | {:.0}\n",
                Quarter::containing(d.period),
                filed,
                d.action,
                d.prev_quantity,
                d.quantity,
                d.delta
            ));
        }
        out.push('\n');
    }
    out
}

fn render_exposure_summary(observations: &[AlignedObservation]) -> String {
    if observations.is_empty() {
        return "No matched rows. Likely: missing next-quarter close in prices.\n".to_string();
    }

    let mut by_ticker: BTreeMap<&str, Vec<&AlignedObservation>> = BTreeMap::new();
    for obs in observations {
        by_ticker.entry(&obs.ticker).or_default().push(obs);
    }

    let mut out = String::new();
    for (ticker, mut rows) in by_ticker {
        rows.sort_by_key(|o| o.period);
        out.push_str(&format!(
            "=== {ticker}: Net 13F Exposure vs Next-Quarter Return ===\n\n"
        ));
        out.push_str("quarter | net_exposure | next_q_return | signal\n");
        out.push_str(&"-".repeat(56));
        out.push('\n');
        for obs in rows {
            out.push_str(&format!(
                "{} | {:>12} | {:>8} | {}\n",
                Quarter::containing(obs.period),
                group_thousands(obs.net_exposure_change),
                percent(obs.forward_return, 2),
                obs.signal()
            ));
        }
        out.push_str("\n\n");
    }
    out
}

/// One titled block, or a "not enough data" line when that test failed.
fn stats_section<T>(
    title: &str,
    result: &Result<T, StatsError>,
    lines: impl FnOnce(&T) -> Vec<String>,
) -> String {
    let mut out = format!("{title}:\n");
    match result {
        Ok(value) => {
            for line in lines(value) {
                out.push_str(&format!("  {line}\n"));
            }
        }
        Err(e) => out.push_str(&format!("  not enough data: {e}\n")),
    }
    out
}

fn render_stats(stats: &Result<StatsReport, StatsError>) -> String {
    let mut out =
        String::from("=== Statistical Tests: Net Exposure vs Next-Quarter Returns ===\n\n");

    let report = match stats {
        Ok(report) => report,
        Err(e) => {
            out.push_str(&format!("Not enough data for statistical tests: {e}\n"));
            return out;
        }
    };

    out.push_str(&format!("Observations: {}\n\n", report.n));
    out.push_str(&stats_section("Pearson correlation", &report.pearson, |c| {
        vec![format!("r = {:.3}", c.r), format!("p-value = {:.4}", c.p_value)]
    }));
    out.push('\n');
    out.push_str(&stats_section("Spearman rank correlation", &report.spearman, |c| {
        vec![format!("rho = {:.3}", c.r), format!("p-value = {:.4}", c.p_value)]
    }));
    out.push('\n');
    out.push_str(&stats_section(
        "Regression: return = alpha + beta * exposure",
        &report.regression,
        |r| {
            vec![
                format!("alpha = {:.6}", r.alpha),
                format!("beta = {:.10}", r.beta),
                format!("t-stat = {:.2}", r.t_stat),
                format!("p-value = {:.4}", r.p_value),
                format!("R^2 = {:.4}", r.r_squared),
                format!("N = {}", r.n),
            ]
        },
    ));
    out.push('\n');
    out.push_str(&stats_section("Directional accuracy", &report.directional, |d| {
        vec![
            format!("hit rate = {}", percent(d.hit_rate, 2)),
            format!("hits = {} / {}", d.hits, d.n),
            format!("binomial p-value = {:.4}", d.p_value),
        ]
    }));
    out
}

impl ReportPort for TextReportAdapter {
    fn write_trades(&self, ticker: &str, deltas: &[PositionDelta]) -> Result<(), HoldflowError> {
        self.save(&format!("{ticker}_trades.txt"), &render_trades(ticker, deltas))
    }

    fn write_observations(
        &self,
        observations: &[AlignedObservation],
    ) -> Result<(), HoldflowError> {
        let rows: Vec<ObservationRow> = observations.iter().map(ObservationRow::from).collect();
        self.save_csv(OBSERVATIONS_CSV, &OBSERVATION_HEADER, &rows)
    }

    fn write_exposure_summary(
        &self,
        observations: &[AlignedObservation],
    ) -> Result<(), HoldflowError> {
        self.save(EXPOSURE_SUMMARY_TXT, &render_exposure_summary(observations))
    }

    fn write_exposure_timeseries(&self, points: &[ExposurePoint]) -> Result<(), HoldflowError> {
        let rows: Vec<TimeseriesRow> = points.iter().map(TimeseriesRow::from).collect();
        self.save_csv(EXPOSURE_TIMESERIES_CSV, &TIMESERIES_HEADER, &rows)
    }

    fn write_stats(&self, stats: &Result<StatsReport, StatsError>) -> Result<(), HoldflowError> {
        self.save(STATS_SUMMARY_TXT, &render_stats(stats))
    }
}
