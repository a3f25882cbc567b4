//! Position delta inference.
//!
//! Turns irregular per-filing holdings into an ordered per-(filer, ticker)
//! series and emits one labelled quantity change per adjacent pair of periods.

use crate::domain::holding::{HoldingRecord, QuantitySource};
use crate::domain::quarter::quarter_end;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_LOOKBACK_DEPTH: usize = 12;

/// How many deltas to keep per (filer, ticker).
///
/// `Capped(n)` retains the n + 1 most recent periods, the oldest of which
/// only serves as the baseline for the first delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Capped(usize),
    Unlimited,
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback::Capped(DEFAULT_LOOKBACK_DEPTH)
    }
}

impl Lookback {
    fn retained_periods(&self) -> Option<usize> {
        match self {
            Lookback::Capped(n) => Some(n.saturating_add(1)),
            Lookback::Unlimited => None,
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Capped(n) => write!(f, "{n}"),
            Lookback::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl FromStr for Lookback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "unlimited" | "none" => Ok(Lookback::Unlimited),
            _ => s
                .parse::<usize>()
                .map(Lookback::Capped)
                .map_err(|_| format!("invalid lookback depth '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelPolicy {
    #[default]
    BuySellHold,
    BuySellHoldEntryExit,
}

impl fmt::Display for LabelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelPolicy::BuySellHold => write!(f, "buy_sell_hold"),
            LabelPolicy::BuySellHoldEntryExit => write!(f, "buy_sell_hold_entry_exit"),
        }
    }
}

impl FromStr for LabelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy_sell_hold" => Ok(LabelPolicy::BuySellHold),
            "buy_sell_hold_entry_exit" => Ok(LabelPolicy::BuySellHoldEntryExit),
            other => Err(format!(
                "unknown label policy '{other}' (expected buy_sell_hold or buy_sell_hold_entry_exit)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Hold,
    Entry,
    Exit,
}

impl Action {
    pub fn classify(prev: f64, curr: f64, policy: LabelPolicy) -> Action {
        if policy == LabelPolicy::BuySellHoldEntryExit {
            if prev == 0.0 && curr > 0.0 {
                return Action::Entry;
            }
            if prev > 0.0 && curr == 0.0 {
                return Action::Exit;
            }
        }
        let delta = curr - prev;
        if delta > 0.0 {
            Action::Buy
        } else if delta < 0.0 {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
            Action::Entry => "ENTRY",
            Action::Exit => "EXIT",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaConfig {
    pub lookback: Lookback,
    pub label_policy: LabelPolicy,
    pub quantity_source: QuantitySource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Quarter-end date of the reporting period.
    pub period: NaiveDate,
    pub quantity: f64,
    pub filed_date: Option<NaiveDate>,
    pub accession: Option<String>,
}

/// One (filer, ticker) history, one point per quarter, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSeries {
    pub filer: String,
    pub ticker: String,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionDelta {
    pub filer: String,
    pub ticker: String,
    pub period: NaiveDate,
    pub filed_date: Option<NaiveDate>,
    pub accession: Option<String>,
    pub prev_quantity: f64,
    pub quantity: f64,
    pub delta: f64,
    pub action: Action,
    pub quantity_source: QuantitySource,
}

impl PositionSeries {
    pub fn deltas(&self, config: &DeltaConfig) -> Vec<PositionDelta> {
        self.points
            .windows(2)
            .map(|w| {
                let (prev, curr) = (&w[0], &w[1]);
                PositionDelta {
                    filer: self.filer.clone(),
                    ticker: self.ticker.clone(),
                    period: curr.period,
                    filed_date: curr.filed_date,
                    accession: curr.accession.clone(),
                    prev_quantity: prev.quantity,
                    quantity: curr.quantity,
                    delta: curr.quantity - prev.quantity,
                    action: Action::classify(prev.quantity, curr.quantity, config.label_policy),
                    quantity_source: config.quantity_source,
                }
            })
            .collect()
    }
}

/// Group records into capped, ascending per-(filer, ticker) series.
///
/// When several records land on the same quarter, the latest `filed_date`
/// wins, a dated record beats an undated one, and on an exact tie the record
/// appearing later in `records` wins.
pub fn build_series(records: &[HoldingRecord], config: &DeltaConfig) -> Vec<PositionSeries> {
    let mut groups: BTreeMap<(String, String), BTreeMap<NaiveDate, SeriesPoint>> = BTreeMap::new();
    let mut missing_quantity = 0usize;

    for record in records {
        let Some(quantity) = record.quantity(config.quantity_source) else {
            missing_quantity += 1;
            continue;
        };

        let point = SeriesPoint {
            period: quarter_end(record.period),
            quantity,
            filed_date: record.filed_date,
            accession: record.accession.clone(),
        };

        let periods = groups
            .entry((record.ticker.clone(), record.filer.clone()))
            .or_default();
        let superseded = periods
            .get(&point.period)
            .is_some_and(|existing| point.filed_date < existing.filed_date);
        if !superseded {
            periods.insert(point.period, point);
        }
    }

    if missing_quantity > 0 {
        tracing::debug!(
            missing_quantity,
            source = %config.quantity_source,
            "skipped holdings without a usable quantity"
        );
    }

    let retained = config.lookback.retained_periods();

    groups
        .into_iter()
        .map(|((ticker, filer), periods)| {
            let mut points: Vec<SeriesPoint> = periods.into_values().collect();
            if let Some(keep) = retained {
                let excess = points.len().saturating_sub(keep);
                points.drain(..excess);
            }
            PositionSeries {
                filer,
                ticker,
                points,
            }
        })
        .collect()
}

/// Per-filer position changes, ordered by ticker, filer, period.
pub fn infer_deltas(records: &[HoldingRecord], config: &DeltaConfig) -> Vec<PositionDelta> {
    let series = build_series(records, config);
    let deltas: Vec<PositionDelta> = series.iter().flat_map(|s| s.deltas(config)).collect();
    tracing::debug!(
        records = records.len(),
        series = series.len(),
        deltas = deltas.len(),
        "inferred position deltas"
    );
    deltas
}
