//! CSV holdings and price store.
//!
//! Holdings columns: `accession,filer,ticker,period,shares,value,filed_date`
//! (blank cells are missing values). Price columns: `ticker,date,close`.

use crate::domain::error::HoldflowError;
use crate::domain::holding::{HoldingRecord, PriceBar};
use crate::domain::quarter::Quarter;
use crate::ports::holdings_port::HoldingsPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const HOLDINGS_FILE: &str = "holdings.csv";
pub const PRICES_FILE: &str = "prices.csv";

#[derive(Debug, Deserialize)]
struct HoldingRow {
    accession: Option<String>,
    filer: String,
    ticker: String,
    period: String,
    shares: Option<f64>,
    value: Option<f64>,
    filed_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    ticker: String,
    date: String,
    close: f64,
}

pub struct CsvStore {
    holdings_path: Option<PathBuf>,
    prices_path: Option<PathBuf>,
}

fn csv_err(path: &Path, e: impl std::fmt::Display) -> HoldflowError {
    HoldflowError::Csv {
        reason: format!("{}: {}", path.display(), e),
    }
}

fn parse_date(path: &Path, line: usize, raw: &str) -> Result<NaiveDate, HoldflowError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| csv_err(path, format!("line {line}: invalid date '{raw}': {e}")))
}

/// A period cell may be a date or a quarter label such as `2024Q1`.
fn parse_period(path: &Path, line: usize, raw: &str) -> Result<NaiveDate, HoldflowError> {
    raw.trim()
        .parse::<Quarter>()
        .map(|q| q.end_date())
        .map_err(|e| csv_err(path, format!("line {line}: invalid period '{raw}': {}", e.0)))
}

impl CsvStore {
    /// A store over `holdings.csv` and `prices.csv` inside `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            holdings_path: Some(dir.join(HOLDINGS_FILE)),
            prices_path: Some(dir.join(PRICES_FILE)),
        }
    }

    /// A store over explicit files; an absent file reads as empty.
    pub fn from_files(holdings: Option<PathBuf>, prices: Option<PathBuf>) -> Self {
        Self {
            holdings_path: holdings,
            prices_path: prices,
        }
    }

    fn load_holdings(&self) -> Result<Vec<HoldingRecord>, HoldflowError> {
        let Some(path) = &self.holdings_path else {
            return Ok(Vec::new());
        };
        let mut rdr = csv::Reader::from_path(path).map_err(|e| csv_err(path, e))?;

        let mut records = Vec::new();
        for (i, result) in rdr.deserialize::<HoldingRow>().enumerate() {
            let line = i + 2;
            let row = result.map_err(|e| csv_err(path, e))?;
            let mut record = HoldingRecord::new(
                &row.filer,
                &row.ticker,
                parse_period(path, line, &row.period)?,
            );
            record.accession = row.accession.filter(|a| !a.trim().is_empty());
            record.shares = row.shares;
            record.value = row.value;
            record.filed_date = match row.filed_date.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => Some(parse_date(path, line, raw)?),
                _ => None,
            };
            records.push(record);
        }

        tracing::debug!(path = %path.display(), records = records.len(), "read holdings csv");
        Ok(records)
    }

    fn load_prices(&self) -> Result<Vec<PriceBar>, HoldflowError> {
        let Some(path) = &self.prices_path else {
            return Ok(Vec::new());
        };
        let mut rdr = csv::Reader::from_path(path).map_err(|e| csv_err(path, e))?;

        let mut bars = Vec::new();
        for (i, result) in rdr.deserialize::<PriceRow>().enumerate() {
            let row = result.map_err(|e| csv_err(path, e))?;
            let date = parse_date(path, i + 2, &row.date)?;
            bars.push(PriceBar::new(&row.ticker, date, row.close));
        }

        tracing::debug!(path = %path.display(), bars = bars.len(), "read prices csv");
        Ok(bars)
    }

    /// Every price bar in the file, in file order.
    pub fn all_prices(&self) -> Result<Vec<PriceBar>, HoldflowError> {
        self.load_prices()
    }
}

impl HoldingsPort for CsvStore {
    fn read_holdings(
        &self,
        tickers: Option<&[String]>,
    ) -> Result<Vec<HoldingRecord>, HoldflowError> {
        let records = self.load_holdings()?;
        Ok(match tickers {
            Some(wanted) => records
                .into_iter()
                .filter(|r| wanted.iter().any(|t| t.eq_ignore_ascii_case(&r.ticker)))
                .collect(),
            None => records,
        })
    }

    fn list_tickers(&self) -> Result<Vec<String>, HoldflowError> {
        let tickers: BTreeSet<String> = self
            .load_holdings()?
            .into_iter()
            .map(|r| r.ticker)
            .collect();
        Ok(tickers.into_iter().collect())
    }
}

impl PricePort for CsvStore {
    fn read_prices(&self, ticker: &str) -> Result<Vec<PriceBar>, HoldflowError> {
        let mut bars: Vec<PriceBar> = self
            .load_prices()?
            .into_iter()
            .filter(|b| b.ticker.eq_ignore_ascii_case(ticker))
            .collect();
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn get_price_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, HoldflowError> {
        let bars = self.read_prices(ticker)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
