//! Report generation port trait.

use crate::domain::alignment::AlignedObservation;
use crate::domain::delta::PositionDelta;
use crate::domain::error::{HoldflowError, StatsError};
use crate::domain::exposure::ExposurePoint;
use crate::domain::pipeline::AnalysisOutput;
use crate::domain::stats::StatsReport;

/// Port for writing analysis outputs.
pub trait ReportPort {
    /// Per-filer position changes for one ticker.
    fn write_trades(&self, ticker: &str, deltas: &[PositionDelta]) -> Result<(), HoldflowError>;

    /// Machine-readable aligned observations.
    fn write_observations(&self, observations: &[AlignedObservation])
    -> Result<(), HoldflowError>;

    /// Human-readable per-quarter exposure versus next-quarter return.
    fn write_exposure_summary(
        &self,
        observations: &[AlignedObservation],
    ) -> Result<(), HoldflowError>;

    /// Cross-ticker net exposure per period.
    fn write_exposure_timeseries(&self, points: &[ExposurePoint]) -> Result<(), HoldflowError>;

    fn write_stats(&self, stats: &Result<StatsReport, StatsError>) -> Result<(), HoldflowError>;

    /// Default implementation: every output of one run.
    fn write_all(&self, output: &AnalysisOutput) -> Result<(), HoldflowError> {
        for ticker in &output.tickers {
            let subset: Vec<PositionDelta> = output
                .deltas
                .iter()
                .filter(|d| &d.ticker == ticker)
                .cloned()
                .collect();
            self.write_trades(ticker, &subset)?;
        }
        self.write_observations(&output.observations)?;
        self.write_exposure_summary(&output.observations)?;
        self.write_exposure_timeseries(&output.timeseries)?;
        self.write_stats(&output.stats)
    }
}
