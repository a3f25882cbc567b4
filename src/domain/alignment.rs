//! Alignment of net exposure with next-quarter price returns.

use crate::domain::error::HoldflowError;
use crate::domain::exposure::NetExposureChange;
use crate::domain::quarter::Quarter;
use crate::domain::quarter_close::QuarterClose;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardReturn {
    pub ticker: String,
    pub period: NaiveDate,
    pub close: f64,
    pub close_next: f64,
    pub forward_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedObservation {
    pub ticker: String,
    pub period: NaiveDate,
    pub net_exposure_change: f64,
    pub close: f64,
    pub close_next: f64,
    pub forward_return: f64,
}

/// Whether exposure and forward return pointed the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Match,
    Mismatch,
    Neutral,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Match => write!(f, "MATCH"),
            Signal::Mismatch => write!(f, "MISMATCH"),
            Signal::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

impl AlignedObservation {
    pub fn signal(&self) -> Signal {
        let (e, r) = (self.net_exposure_change, self.forward_return);
        if e == 0.0 || r == 0.0 {
            Signal::Neutral
        } else if (e > 0.0) == (r > 0.0) {
            Signal::Match
        } else {
            Signal::Mismatch
        }
    }
}

fn checked_close(ticker: &str, period: NaiveDate, close: f64) -> Result<f64, HoldflowError> {
    if close > 0.0 && close.is_finite() {
        Ok(close)
    } else {
        Err(HoldflowError::DomainArithmetic {
            ticker: ticker.to_string(),
            period,
            close,
        })
    }
}

/// Pair each quarter close with the close of the immediately following quarter.
///
/// The last quarter of a series and any quarter followed by a missing quarter
/// produce no row. A non-positive or non-finite close in a pair is an error.
pub fn forward_returns(closes: &[QuarterClose]) -> Result<Vec<ForwardReturn>, HoldflowError> {
    let mut by_ticker: BTreeMap<&str, BTreeMap<Quarter, &QuarterClose>> = BTreeMap::new();
    for c in closes {
        by_ticker
            .entry(c.ticker.as_str())
            .or_default()
            .insert(Quarter::containing(c.period), c);
    }

    let mut out = Vec::new();
    for (ticker, series) in &by_ticker {
        for (quarter, current) in series {
            let Some(next) = series.get(&quarter.next()) else {
                continue;
            };
            let close = checked_close(ticker, current.period, current.close)?;
            let close_next = checked_close(ticker, next.period, next.close)?;
            out.push(ForwardReturn {
                ticker: ticker.to_string(),
                period: quarter.end_date(),
                close,
                close_next,
                forward_return: close_next / close - 1.0,
            });
        }
    }
    Ok(out)
}

/// Inner-join net exposure with forward returns on (ticker, quarter).
pub fn align_returns(
    exposure: &[NetExposureChange],
    closes: &[QuarterClose],
) -> Result<Vec<AlignedObservation>, HoldflowError> {
    let returns = forward_returns(closes)?;
    let by_key: BTreeMap<(&str, NaiveDate), &ForwardReturn> = returns
        .iter()
        .map(|r| ((r.ticker.as_str(), r.period), r))
        .collect();

    let mut observations: Vec<AlignedObservation> = exposure
        .iter()
        .filter_map(|e| {
            let period = Quarter::containing(e.period).end_date();
            by_key
                .get(&(e.ticker.as_str(), period))
                .map(|r| AlignedObservation {
                    ticker: e.ticker.clone(),
                    period,
                    net_exposure_change: e.net_change,
                    close: r.close,
                    close_next: r.close_next,
                    forward_return: r.forward_return,
                })
        })
        .collect();

    observations.sort_by(|a, b| (&a.ticker, a.period).cmp(&(&b.ticker, b.period)));
    tracing::debug!(
        exposure = exposure.len(),
        forward_returns = returns.len(),
        observations = observations.len(),
        "aligned exposure with forward returns"
    );
    Ok(observations)
}
