//! Quarter-end close resolution from daily bars.

use crate::domain::holding::PriceBar;
use crate::domain::quarter::Quarter;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct QuarterClose {
    pub ticker: String,
    /// Quarter-end date.
    pub period: NaiveDate,
    /// Last trading day present in the quarter.
    pub trade_date: NaiveDate,
    pub close: f64,
}

/// One close per (ticker, quarter): the chronologically latest bar in it.
///
/// Bars may be unordered and may mix tickers. Quarters without bars are
/// absent; no interpolation is done across gaps.
pub fn resolve_quarter_closes(bars: &[PriceBar]) -> Vec<QuarterClose> {
    let mut latest: BTreeMap<(&str, Quarter), &PriceBar> = BTreeMap::new();

    for bar in bars {
        let key = (bar.ticker.as_str(), Quarter::containing(bar.date));
        let replace = latest.get(&key).is_none_or(|cur| bar.date >= cur.date);
        if replace {
            latest.insert(key, bar);
        }
    }

    latest
        .into_iter()
        .map(|((ticker, quarter), bar)| QuarterClose {
            ticker: ticker.to_string(),
            period: quarter.end_date(),
            trade_date: bar.date,
            close: bar.close,
        })
        .collect()
}
