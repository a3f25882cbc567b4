#![allow(dead_code)]

use chrono::NaiveDate;
use holdflow::domain::error::HoldflowError;
pub use holdflow::domain::holding::{HoldingRecord, PriceBar};
use holdflow::ports::holdings_port::HoldingsPort;
use holdflow::ports::price_port::PricePort;
use std::collections::{BTreeSet, HashMap};

/// In-memory holdings and price store.
pub struct MockStore {
    pub holdings: Vec<HoldingRecord>,
    pub prices: HashMap<String, Vec<PriceBar>>,
    pub price_errors: HashMap<String, String>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            holdings: Vec::new(),
            prices: HashMap::new(),
            price_errors: HashMap::new(),
        }
    }

    pub fn with_holding(mut self, record: HoldingRecord) -> Self {
        self.holdings.push(record);
        self
    }

    pub fn with_holdings(mut self, records: Vec<HoldingRecord>) -> Self {
        self.holdings.extend(records);
        self
    }

    pub fn with_prices(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.prices.entry(ticker.to_string()).or_default().extend(bars);
        self
    }

    pub fn with_price_error(mut self, ticker: &str, reason: &str) -> Self {
        self.price_errors
            .insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl HoldingsPort for MockStore {
    fn read_holdings(
        &self,
        tickers: Option<&[String]>,
    ) -> Result<Vec<HoldingRecord>, HoldflowError> {
        Ok(self
            .holdings
            .iter()
            .filter(|r| tickers.is_none_or(|t| t.contains(&r.ticker)))
            .cloned()
            .collect())
    }

    fn list_tickers(&self) -> Result<Vec<String>, HoldflowError> {
        let tickers: BTreeSet<String> = self.holdings.iter().map(|r| r.ticker.clone()).collect();
        Ok(tickers.into_iter().collect())
    }
}

impl PricePort for MockStore {
    fn read_prices(&self, ticker: &str) -> Result<Vec<PriceBar>, HoldflowError> {
        if let Some(reason) = self.price_errors.get(ticker) {
            return Err(HoldflowError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.prices.get(ticker).cloned().unwrap_or_default())
    }

    fn get_price_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, HoldflowError> {
        let bars = self.read_prices(ticker)?;
        let min = bars.iter().map(|b| b.date).min();
        let max = bars.iter().map(|b| b.date).max();
        Ok(min.zip(max).map(|(min, max)| (min, max, bars.len())))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A share-count disclosure with an accession derived from its fields.
pub fn make_holding(filer: &str, ticker: &str, period: &str, shares: f64) -> HoldingRecord {
    HoldingRecord::new(filer, ticker, parse_date(period))
        .with_accession(&format!("{filer}-{ticker}-{period}"))
        .with_shares(shares)
}

pub fn make_bar(ticker: &str, date: &str, close: f64) -> PriceBar {
    PriceBar::new(ticker, parse_date(date), close)
}

/// Scenario A holdings: 100, 150, 150, 0 across 2024.
pub fn scenario_a_holdings(filer: &str, ticker: &str) -> Vec<HoldingRecord> {
    vec![
        make_holding(filer, ticker, "2024-03-31", 100.0),
        make_holding(filer, ticker, "2024-06-30", 150.0),
        make_holding(filer, ticker, "2024-09-30", 150.0),
        make_holding(filer, ticker, "2024-12-31", 0.0),
    ]
}

/// Two daily closes per quarter; the later one is the quarter close.
pub fn quarterly_bars(ticker: &str, closes: &[(&str, f64)]) -> Vec<PriceBar> {
    closes
        .iter()
        .flat_map(|&(day, close)| {
            let d = parse_date(day);
            vec![
                PriceBar::new(ticker, d - chrono::Duration::days(1), close * 0.5),
                PriceBar::new(ticker, d, close),
            ]
        })
        .collect()
}
