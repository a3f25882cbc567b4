//! Disclosed positions and price bars as read from the stores.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Which reported figure stands in for position size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantitySource {
    #[default]
    Shares,
    ReportedValue,
}

impl fmt::Display for QuantitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantitySource::Shares => write!(f, "shares"),
            QuantitySource::ReportedValue => write!(f, "reported_value"),
        }
    }
}

impl FromStr for QuantitySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shares" => Ok(QuantitySource::Shares),
            "reported_value" | "value" => Ok(QuantitySource::ReportedValue),
            other => Err(format!(
                "unknown quantity source '{other}' (expected shares or reported_value)"
            )),
        }
    }
}

/// One disclosed position from one filing.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingRecord {
    /// Source document id (e.g. an accession number).
    pub accession: Option<String>,
    pub filer: String,
    pub ticker: String,
    pub period: NaiveDate,
    pub shares: Option<f64>,
    /// Reported market value, in the units of the source (USD thousands for 13F).
    pub value: Option<f64>,
    pub filed_date: Option<NaiveDate>,
}

impl HoldingRecord {
    pub fn new(filer: &str, ticker: &str, period: NaiveDate) -> Self {
        Self {
            accession: None,
            filer: filer.trim().to_string(),
            ticker: ticker.trim().to_uppercase(),
            period,
            shares: None,
            value: None,
            filed_date: None,
        }
    }

    pub fn with_shares(mut self, shares: f64) -> Self {
        self.shares = Some(shares);
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_filed_date(mut self, filed_date: NaiveDate) -> Self {
        self.filed_date = Some(filed_date);
        self
    }

    pub fn with_accession(mut self, accession: &str) -> Self {
        self.accession = Some(accession.to_string());
        self
    }

    /// The quantity proxy for `source`, or `None` when it is missing or not finite.
    pub fn quantity(&self, source: QuantitySource) -> Option<f64> {
        let raw = match source {
            QuantitySource::Shares => self.shares,
            QuantitySource::ReportedValue => self.value,
        };
        raw.filter(|q| q.is_finite())
    }
}

/// A single end-of-day close.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: f64,
}

impl PriceBar {
    pub fn new(ticker: &str, date: NaiveDate, close: f64) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            date,
            close,
        }
    }
}
