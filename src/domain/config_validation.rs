//! Configuration validation.
//!
//! Validates the `[analysis]` section before a run starts.

use crate::domain::delta::{LabelPolicy, Lookback};
use crate::domain::error::HoldflowError;
use crate::domain::holding::QuantitySource;
use crate::ports::config_port::ConfigPort;
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickerListError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parse a comma-separated ticker list, upper-casing each entry.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, TickerListError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(TickerListError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(TickerListError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), HoldflowError> {
    validate_tickers(config)?;
    parse_setting::<Lookback>(config, "lookback_depth")?;
    parse_setting::<QuantitySource>(config, "quantity_source")?;
    parse_setting::<LabelPolicy>(config, "label_policy")?;
    Ok(())
}

fn validate_tickers(config: &dyn ConfigPort) -> Result<(), HoldflowError> {
    match config.get_string("analysis", "tickers") {
        Some(s) if !s.trim().is_empty() => {
            parse_tickers(&s).map_err(|e| HoldflowError::ConfigInvalid {
                section: "analysis".to_string(),
                key: "tickers".to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Parse an optional `[analysis]` setting; `None` when the key is absent.
pub fn parse_setting<T>(config: &dyn ConfigPort, key: &str) -> Result<Option<T>, HoldflowError>
where
    T: FromStr<Err = String>,
{
    match config.get_string("analysis", key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.parse::<T>()
                .map(Some)
                .map_err(|reason| HoldflowError::ConfigInvalid {
                    section: "analysis".to_string(),
                    key: key.to_string(),
                    reason,
                })
        }
        _ => Ok(None),
    }
}
