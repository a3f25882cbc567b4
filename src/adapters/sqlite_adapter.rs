//! SQLite holdings and price store.

use crate::domain::error::HoldflowError;
use crate::domain::holding::{HoldingRecord, PriceBar};
use crate::ports::config_port::ConfigPort;
use crate::ports::holdings_port::HoldingsPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter};

const DATE_FMT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> HoldflowError {
    HoldflowError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date_column(idx: usize, raw: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&raw, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn non_empty(raw: String) -> Option<String> {
    (!raw.is_empty()).then_some(raw)
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, HoldflowError> {
        let db_path =
            config
                .get_path("sqlite", "path")
                .ok_or_else(|| HoldflowError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| HoldflowError::Database {
                    reason: e.to_string(),
                })?;

        tracing::debug!(path = %db_path.display(), pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, HoldflowError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| HoldflowError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, HoldflowError> {
        self.pool.get().map_err(|e: r2d2::Error| HoldflowError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), HoldflowError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                accession TEXT NOT NULL DEFAULT '',
                filer TEXT NOT NULL,
                ticker TEXT NOT NULL,
                period TEXT NOT NULL,
                shares REAL,
                value REAL,
                filed_date TEXT NOT NULL DEFAULT '',
                UNIQUE (accession, filer, ticker, period, filed_date)
            );
            CREATE INDEX IF NOT EXISTS idx_holdings_ticker ON holdings(ticker);
            CREATE TABLE IF NOT EXISTS prices (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL NOT NULL,
                PRIMARY KEY (ticker, date)
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    /// Insert disclosures, ignoring any already stored. Returns the number of
    /// rows actually inserted.
    ///
    /// A missing accession or filed date is stored as `''` so it still takes
    /// part in the uniqueness key.
    pub fn insert_holdings(&self, records: &[HoldingRecord]) -> Result<usize, HoldflowError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut inserted = 0;
        for rec in records {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO holdings
                        (accession, filer, ticker, period, shares, value, filed_date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        rec.accession.as_deref().unwrap_or(""),
                        rec.filer,
                        rec.ticker,
                        rec.period.format(DATE_FMT).to_string(),
                        rec.shares,
                        rec.value,
                        rec.filed_date
                            .map(|d| d.format(DATE_FMT).to_string())
                            .unwrap_or_default(),
                    ],
                )
                .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        tracing::debug!(
            offered = records.len(),
            inserted,
            "inserted holdings"
        );
        Ok(inserted)
    }

    /// Insert or overwrite closes keyed by (ticker, date).
    pub fn upsert_prices(&self, bars: &[PriceBar]) -> Result<usize, HoldflowError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO prices (ticker, date, close) VALUES (?1, ?2, ?3)",
                params![bar.ticker, bar.date.format(DATE_FMT).to_string(), bar.close],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(bars.len())
    }

    pub fn count_holdings(&self, ticker: &str) -> Result<usize, HoldflowError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM holdings WHERE ticker = ?1",
                params![ticker],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        Ok(count as usize)
    }
}

impl HoldingsPort for SqliteStore {
    fn read_holdings(
        &self,
        tickers: Option<&[String]>,
    ) -> Result<Vec<HoldingRecord>, HoldflowError> {
        let conn = self.conn()?;

        let base = "SELECT accession, filer, ticker, period, shares, value, filed_date
                    FROM holdings";
        let filter: Vec<String> = tickers.map(|t| t.to_vec()).unwrap_or_default();
        let query = if tickers.is_some() {
            if filter.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; filter.len()].join(", ");
            format!("{base} WHERE ticker IN ({placeholders}) ORDER BY id ASC")
        } else {
            format!("{base} ORDER BY id ASC")
        };

        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(filter.iter()), |row| {
                let period = parse_date_column(3, row.get(3)?)?;
                let filed_date = non_empty(row.get(6)?)
                    .map(|raw| parse_date_column(6, raw))
                    .transpose()?;
                Ok(HoldingRecord {
                    accession: non_empty(row.get(0)?),
                    filer: row.get(1)?,
                    ticker: row.get(2)?,
                    period,
                    shares: row.get(4)?,
                    value: row.get(5)?,
                    filed_date,
                })
            })
            .map_err(query_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_err)?);
        }

        tracing::debug!(records = records.len(), "read holdings from sqlite");
        Ok(records)
    }

    fn list_tickers(&self) -> Result<Vec<String>, HoldflowError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM holdings ORDER BY ticker")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;

        let mut tickers = Vec::new();
        for row in rows {
            tickers.push(row.map_err(query_err)?);
        }

        Ok(tickers)
    }
}

impl PricePort for SqliteStore {
    fn read_prices(&self, ticker: &str) -> Result<Vec<PriceBar>, HoldflowError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT ticker, date, close FROM prices
                 WHERE ticker = ?1
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![ticker], |row| {
                Ok(PriceBar {
                    ticker: row.get(0)?,
                    date: parse_date_column(1, row.get(1)?)?,
                    close: row.get(2)?,
                })
            })
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(query_err)?);
        }

        Ok(bars)
    }

    fn get_price_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, HoldflowError> {
        let conn = self.conn()?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM prices WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let parse = |s: &str| {
                    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| HoldflowError::Database {
                        reason: e.to_string(),
                    })
                };
                Ok(Some((parse(&min_str)?, parse(&max_str)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
