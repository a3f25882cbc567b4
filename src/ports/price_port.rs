//! Price store port trait.

use crate::domain::error::HoldflowError;
use crate::domain::holding::PriceBar;
use chrono::NaiveDate;

pub trait PricePort {
    /// Daily closes for one ticker, in no guaranteed order.
    fn read_prices(&self, ticker: &str) -> Result<Vec<PriceBar>, HoldflowError>;

    fn get_price_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, HoldflowError>;
}
