//! Returns, volatility and growth rates.

use super::TRADING_DAYS_PER_YEAR;

const DAYS_PER_YEAR: f64 = 365.25;
/// Spans shorter than this fall back to a simple, non-compounded return.
const MIN_CAGR_DAYS: f64 = 90.0;

/// Period-over-period simple returns. A zero price at either end yields 0.0.
pub fn calculate_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| {
            let prev = w[0];
            let curr = w[1];
            if prev == 0.0 || curr == 0.0 {
                0.0
            } else {
                (curr - prev) / prev
            }
        })
        .collect()
}

/// Rebuild a price path from a starting price and simple returns.
pub fn reconstruct_prices(start_price: f64, returns: &[f64]) -> Vec<f64> {
    let mut prices = Vec::with_capacity(returns.len() + 1);
    let mut price = start_price;
    prices.push(price);
    for r in returns {
        price *= 1.0 + r;
        prices.push(price);
    }
    prices
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// The last `n` observations of an oldest-first series. Series of unequal
/// length line up on their most recent values.
pub fn most_recent(series: &[f64], n: usize) -> &[f64] {
    &series[series.len().saturating_sub(n)..]
}

/// Sample standard deviation (N-1 denominator). Fewer than two values yields 0.0.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Standard deviation of daily returns scaled by sqrt(252).
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    sample_std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Compound annual growth rate between two values `days` apart.
pub fn annualized_return(start_value: f64, end_value: f64, days: f64) -> f64 {
    if start_value <= 0.0 || end_value < 0.0 || days <= 0.0 {
        return 0.0;
    }
    let total = end_value / start_value;
    if days < MIN_CAGR_DAYS {
        return total - 1.0;
    }
    let years = days / DAYS_PER_YEAR;
    total.powf(1.0 / years) - 1.0
}

/// Weighted sum of per-symbol return series over their most recent common
/// window.
///
/// Series and weights pair up by position; extra weights or series are ignored.
pub fn combine_portfolio_returns(weights: &[f64], returns_by_symbol: &[Vec<f64>]) -> Vec<f64> {
    let count = weights.len().min(returns_by_symbol.len());
    if count == 0 {
        return Vec::new();
    }
    let len = returns_by_symbol[..count]
        .iter()
        .map(Vec::len)
        .min()
        .unwrap_or(0);

    let aligned: Vec<&[f64]> = returns_by_symbol[..count]
        .iter()
        .map(|r| most_recent(r, len))
        .collect();
    (0..len)
        .map(|t| (0..count).map(|i| weights[i] * aligned[i][t]).sum())
        .collect()
}
