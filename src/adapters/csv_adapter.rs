//! CSV close price adapter. One `<SYMBOL>.csv` file per symbol with a
//! `date,close` header; extra columns are ignored.

use crate::domain::error::PlannerError;
use crate::ports::price_history_port::{PriceHistoryPort, PricePoint};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn history_error(symbol: &str, reason: String) -> PlannerError {
    PlannerError::PriceHistory {
        symbol: symbol.to_string(),
        reason,
    }
}

impl PriceHistoryPort for CsvPriceAdapter {
    fn fetch_closes(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, PlannerError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            history_error(symbol, format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| history_error(symbol, format!("CSV header error: {}", e)))?;
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| history_error(symbol, format!("missing {} column", name)))
        };
        let date_idx = column("date")?;
        let close_idx = column("close")?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record =
                result.map_err(|e| history_error(symbol, format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(date_idx)
                .ok_or_else(|| history_error(symbol, "missing date value".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| history_error(symbol, format!("invalid date format: {}", e)))?;

            if start.is_some_and(|s| date < s) || end.is_some_and(|e| date > e) {
                continue;
            }

            let close: f64 = record
                .get(close_idx)
                .ok_or_else(|| history_error(symbol, "missing close value".into()))?
                .trim()
                .parse()
                .map_err(|e| history_error(symbol, format!("invalid close value: {}", e)))?;

            points.push(PricePoint { date, close });
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PlannerError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            history_error(
                "*",
                format!(
                    "failed to read directory {}: {}",
                    self.base_path.display(),
                    e
                ),
            )
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| history_error("*", format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
