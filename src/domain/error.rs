//! Domain error types.

/// Why a statistical test could not produce a number.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatsError {
    #[error("insufficient sample: have {got} observations, need {needed}")]
    InsufficientSample { needed: usize, got: usize },

    #[error("series length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("{series} series has zero variance")]
    ZeroVariance { series: &'static str },
}

/// Top-level error type for holdflow.
#[derive(Debug, thiserror::Error)]
pub enum HoldflowError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data: {reason}")]
    NoData { reason: String },

    #[error("invalid close for {ticker} in {period}: {close}")]
    DomainArithmetic {
        ticker: String,
        period: chrono::NaiveDate,
        close: f64,
    },

    #[error("csv error: {reason}")]
    Csv { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&HoldflowError> for std::process::ExitCode {
    fn from(err: &HoldflowError) -> Self {
        let code: u8 = match err {
            HoldflowError::Io(_) | HoldflowError::Csv { .. } => 1,
            HoldflowError::ConfigParse { .. }
            | HoldflowError::ConfigMissing { .. }
            | HoldflowError::ConfigInvalid { .. } => 2,
            HoldflowError::Database { .. } | HoldflowError::DatabaseQuery { .. } => 3,
            HoldflowError::NoData { .. } => 5,
            HoldflowError::DomainArithmetic { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn no_data_exits_with_five() {
        let err = HoldflowError::NoData {
            reason: "no holdings for ORCL".into(),
        };
        assert_eq!(err.to_string(), "no data: no holdings for ORCL");
        let code: std::process::ExitCode = (&err).into();
        assert_eq!(format!("{code:?}"), format!("{:?}", std::process::ExitCode::from(5)));
    }

    #[test]
    fn domain_arithmetic_message_names_ticker_and_period() {
        let err = HoldflowError::DomainArithmetic {
            ticker: "ORCL".into(),
            period: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            close: 0.0,
        };
        assert_eq!(err.to_string(), "invalid close for ORCL in 2024-03-31: 0");
    }
}
