//! Risk metrics over return and price series.
//!
//! Every function here is pure and returns a neutral value (usually 0.0)
//! for empty or single-element input instead of failing.

pub mod correlation;
pub mod drawdown;
pub mod ratios;
pub mod report;
pub mod returns;
pub mod var;

pub use correlation::{
    correlation, correlation_distance, correlation_matrix, covariance_matrix,
    inverse_variance_weights, ledoit_wolf_shrinkage, ShrinkageResult,
};
pub use drawdown::{drawdown_metrics, DrawdownMetrics};
pub use ratios::{sharpe_ratio, sortino_ratio};
pub use report::{
    build_risk_report, CvarContribution, PortfolioRisk, PriceSeries, RiskParameters, RiskReport,
    SymbolRisk,
};
pub use returns::{
    annualized_return, annualized_volatility, calculate_returns, combine_portfolio_returns,
    mean, most_recent, reconstruct_prices, sample_std_dev,
};
pub use var::{conditional_value_at_risk, monte_carlo_cvar, portfolio_cvar, value_at_risk};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
