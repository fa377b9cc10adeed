//! Historical close price port.

use chrono::NaiveDate;

use crate::domain::error::PlannerError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

pub trait PriceHistoryPort {
    /// Close prices for `symbol`, oldest first, restricted to the inclusive
    /// date range when bounds are given.
    fn fetch_closes(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, PlannerError>;

    fn list_symbols(&self) -> Result<Vec<String>, PlannerError>;

    /// Default implementation: `fetch_closes` without the dates.
    fn close_series(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<f64>, PlannerError> {
        Ok(self
            .fetch_closes(symbol, start, end)?
            .into_iter()
            .map(|p| p.close)
            .collect())
    }
}
