//! Net exposure aggregation across filers.

use crate::domain::alignment::AlignedObservation;
use crate::domain::delta::PositionDelta;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct NetExposureChange {
    pub ticker: String,
    pub period: NaiveDate,
    pub net_change: f64,
    /// Number of filer deltas summed into `net_change`.
    pub contributors: usize,
}

/// Sum deltas per (ticker, period). Keys with no delta never appear.
pub fn aggregate_exposure(deltas: &[PositionDelta]) -> Vec<NetExposureChange> {
    let mut sums: BTreeMap<(&str, NaiveDate), (f64, usize)> = BTreeMap::new();
    for d in deltas {
        let entry = sums.entry((d.ticker.as_str(), d.period)).or_insert((0.0, 0));
        entry.0 += d.delta;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|((ticker, period), (net_change, contributors))| NetExposureChange {
            ticker: ticker.to_string(),
            period,
            net_change,
            contributors,
        })
        .collect()
}

/// One period of matched exposure across every ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposurePoint {
    pub period: NaiveDate,
    pub net_exposure: f64,
    /// `None` when the series is too short or constant to standardise.
    pub zscore: Option<f64>,
    /// Mean next-quarter return of the tickers matched in this period.
    pub mean_forward_return: f64,
    pub observations: usize,
}

/// Aligned observations grouped by period, ascending.
///
/// Only rows that found a next-quarter close contribute, so the series lines
/// up with the returns it is compared against.
pub fn exposure_timeseries(observations: &[AlignedObservation]) -> Vec<ExposurePoint> {
    let mut totals: BTreeMap<NaiveDate, (f64, f64, usize)> = BTreeMap::new();
    for obs in observations {
        let entry = totals.entry(obs.period).or_insert((0.0, 0.0, 0));
        entry.0 += obs.net_exposure_change;
        entry.1 += obs.forward_return;
        entry.2 += 1;
    }

    let values: Vec<f64> = totals.values().map(|&(net, _, _)| net).collect();
    let scores = zscore(&values);
    totals
        .into_iter()
        .enumerate()
        .map(|(i, (period, (net_exposure, return_sum, count)))| ExposurePoint {
            period,
            net_exposure,
            zscore: scores.as_ref().map(|z| z[i]),
            mean_forward_return: return_sum / count as f64,
            observations: count,
        })
        .collect()
}

/// Standardise with the sample standard deviation.
///
/// Returns `None` for fewer than two values or a constant series.
pub fn zscore(values: &[f64]) -> Option<Vec<f64>> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std <= 0.0 || !std.is_finite() {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / std).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::delta::Action;
    use crate::domain::holding::QuantitySource;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn delta(filer: &str, ticker: &str, period: NaiveDate, delta: f64) -> PositionDelta {
        PositionDelta {
            filer: filer.into(),
            ticker: ticker.into(),
            period,
            filed_date: None,
            accession: None,
            prev_quantity: 0.0,
            quantity: delta,
            delta,
            action: Action::classify(0.0, delta, Default::default()),
            quantity_source: QuantitySource::Shares,
        }
    }

    #[test]
    fn sums_across_filers() {
        let q2 = date(2024, 6, 30);
        let deltas = vec![
            delta("A", "ORCL", q2, 300.0),
            delta("B", "ORCL", q2, 250.0),
            delta("C", "ORCL", q2, -50.0),
        ];
        let out = aggregate_exposure(&deltas);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].net_change, 500.0);
        assert_eq!(out[0].contributors, 3);
    }

    #[test]
    fn groups_strictly_by_ticker_and_period() {
        let q1 = date(2024, 3, 31);
        let q2 = date(2024, 6, 30);
        let deltas = vec![
            delta("A", "UNH", q2, 1.0),
            delta("A", "ORCL", q1, 2.0),
            delta("B", "ORCL", q2, 3.0),
            delta("C", "ORCL", q1, 4.0),
        ];
        let out = aggregate_exposure(&deltas);
        let keys: Vec<_> = out
            .iter()
            .map(|e| (e.ticker.as_str(), e.period, e.net_change))
            .collect();
        assert_eq!(
            keys,
            vec![("ORCL", q1, 6.0), ("ORCL", q2, 3.0), ("UNH", q2, 1.0)]
        );
    }

    #[test]
    fn zero_sum_is_present_but_absence_is_absent() {
        let q1 = date(2024, 3, 31);
        let deltas = vec![delta("A", "FDS", q1, 10.0), delta("B", "FDS", q1, -10.0)];
        let out = aggregate_exposure(&deltas);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].net_change, 0.0);

        assert!(aggregate_exposure(&[]).is_empty());
    }

    fn observation(ticker: &str, period: NaiveDate, exposure: f64, ret: f64) -> AlignedObservation {
        AlignedObservation {
            ticker: ticker.into(),
            period,
            net_exposure_change: exposure,
            close: 10.0,
            close_next: 10.0 * (1.0 + ret),
            forward_return: ret,
        }
    }

    #[test]
    fn timeseries_sums_exposure_and_averages_returns() {
        let q1 = date(2024, 3, 31);
        let q2 = date(2024, 6, 30);
        let series = exposure_timeseries(&[
            observation("UNH", q2, -2.0, 0.04),
            observation("ORCL", q1, 5.0, 0.10),
            observation("UNH", q1, 7.0, -0.02),
        ]);

        let totals: Vec<_> = series
            .iter()
            .map(|p| (p.period, p.net_exposure, p.observations))
            .collect();
        assert_eq!(totals, vec![(q1, 12.0, 2), (q2, -2.0, 1)]);
        assert!((series[0].mean_forward_return - 0.04).abs() < 1e-12);
        assert!((series[1].mean_forward_return - 0.04).abs() < 1e-12);

        // Two points standardise to +/- 1/sqrt(2) with the sample deviation.
        let z = std::f64::consts::FRAC_1_SQRT_2;
        assert!((series[0].zscore.unwrap() - z).abs() < 1e-12);
        assert!((series[1].zscore.unwrap() + z).abs() < 1e-12);
    }

    #[test]
    fn timeseries_single_period_has_no_zscore() {
        let q1 = date(2024, 3, 31);
        let series = exposure_timeseries(&[observation("ORCL", q1, 5.0, 0.01)]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].zscore, None);
        assert!(exposure_timeseries(&[]).is_empty());
    }

    #[test]
    fn zscore_standardizes() {
        let z = zscore(&[1.0, 2.0, 3.0]).unwrap();
        assert!((z[0] + 1.0).abs() < 1e-12);
        assert!(z[1].abs() < 1e-12);
        assert!((z[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zscore_degenerate_inputs() {
        assert!(zscore(&[]).is_none());
        assert!(zscore(&[4.0]).is_none());
        assert!(zscore(&[4.0, 4.0, 4.0]).is_none());
    }
}
