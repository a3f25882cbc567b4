//! Holdings store port trait.

use crate::domain::error::HoldflowError;
use crate::domain::holding::HoldingRecord;

pub trait HoldingsPort {
    /// Disclosed positions, optionally restricted to `tickers`, in store
    /// insertion order.
    fn read_holdings(
        &self,
        tickers: Option<&[String]>,
    ) -> Result<Vec<HoldingRecord>, HoldflowError>;

    /// Distinct tickers with at least one holding, sorted.
    fn list_tickers(&self) -> Result<Vec<String>, HoldflowError>;
}
