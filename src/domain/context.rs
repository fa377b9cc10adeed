//! Portfolio snapshots consumed by generation and evaluation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::action::ActionCandidate;

fn default_true() -> bool {
    true
}

/// Classification of a trade idea produced upstream of the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityCategory {
    ProfitTaking,
    AveragingDown,
    OpportunityBuys,
    RebalanceSells,
    RebalanceBuys,
    WeightBased,
}

/// Candidates grouped by category. Ordered so iteration is deterministic.
pub type OpportunitiesByCategory = BTreeMap<OpportunityCategory, Vec<ActionCandidate>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub isin: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub quality_score: Option<f64>,
    /// Minimum tradable lot; zero or negative disables rounding.
    #[serde(default)]
    pub lot_size: i64,
    #[serde(default = "default_true")]
    pub allow_buy: bool,
    #[serde(default = "default_true")]
    pub allow_sell: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde(default)]
    pub isin: String,
    pub quantity: f64,
    #[serde(default)]
    pub avg_price: f64,
    pub current_price: f64,
}

impl Position {
    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }
}

/// Fixed plus proportional transaction cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionCostModel {
    #[serde(rename = "transaction_cost_fixed", default = "default_cost_fixed")]
    pub fixed: f64,
    #[serde(rename = "transaction_cost_percent", default = "default_cost_percent")]
    pub percent: f64,
}

fn default_cost_fixed() -> f64 {
    2.0
}

fn default_cost_percent() -> f64 {
    0.002
}

impl Default for TransactionCostModel {
    fn default() -> Self {
        TransactionCostModel {
            fixed: default_cost_fixed(),
            percent: default_cost_percent(),
        }
    }
}

impl TransactionCostModel {
    /// cost = fixed + percent * trade_value
    pub fn cost(&self, trade_value: f64) -> f64 {
        self.fixed + self.percent * trade_value
    }
}

/// Snapshot used for per-candidate feasibility checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityContext {
    pub available_cash_eur: f64,
    #[serde(default)]
    pub recently_sold: BTreeSet<String>,
    #[serde(default)]
    pub recently_bought: BTreeSet<String>,
    #[serde(default)]
    pub ineligible_isins: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub allow_buy: bool,
    #[serde(default = "default_true")]
    pub allow_sell: bool,
    #[serde(flatten)]
    pub transaction_costs: TransactionCostModel,
    /// Securities keyed by ISIN.
    #[serde(default)]
    pub securities: BTreeMap<String, Security>,
}

impl OpportunityContext {
    pub fn new(available_cash_eur: f64) -> Self {
        OpportunityContext {
            available_cash_eur,
            recently_sold: BTreeSet::new(),
            recently_bought: BTreeSet::new(),
            ineligible_isins: BTreeSet::new(),
            allow_buy: true,
            allow_sell: true,
            transaction_costs: TransactionCostModel::default(),
            securities: BTreeMap::new(),
        }
    }

    pub fn security(&self, isin: &str) -> Option<&Security> {
        self.securities.get(isin)
    }
}

/// Portfolio state that scoring is computed over.
///
/// Position values are in EUR keyed by symbol. Country and industry
/// membership is looked up per symbol; weights are derived on demand over
/// invested value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioContext {
    #[serde(default)]
    pub positions: BTreeMap<String, f64>,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub cash: f64,
    #[serde(default)]
    pub country_targets: BTreeMap<String, f64>,
    #[serde(default)]
    pub industry_targets: BTreeMap<String, f64>,
    #[serde(default)]
    pub optimizer_targets: BTreeMap<String, f64>,
    #[serde(default)]
    pub security_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub security_countries: BTreeMap<String, String>,
    #[serde(default)]
    pub security_industries: BTreeMap<String, String>,
}

impl PortfolioContext {
    pub fn invested_value(&self) -> f64 {
        self.positions.values().filter(|v| **v > 0.0).sum()
    }

    pub fn symbol_weights(&self) -> BTreeMap<String, f64> {
        let invested = self.invested_value();
        if invested <= 0.0 {
            return BTreeMap::new();
        }
        self.positions
            .iter()
            .filter(|(_, v)| **v > 0.0)
            .map(|(s, v)| (s.clone(), v / invested))
            .collect()
    }

    pub fn country_weights(&self) -> BTreeMap<String, f64> {
        self.group_weights(&self.security_countries)
    }

    pub fn industry_weights(&self) -> BTreeMap<String, f64> {
        self.group_weights(&self.security_industries)
    }

    fn group_weights(&self, membership: &BTreeMap<String, String>) -> BTreeMap<String, f64> {
        let mut weights = BTreeMap::new();
        for (symbol, weight) in self.symbol_weights() {
            if let Some(group) = membership.get(&symbol) {
                *weights.entry(group.clone()).or_insert(0.0) += weight;
            }
        }
        weights
    }

    /// Adjust the EUR value held in `symbol`, dropping positions that reach zero.
    pub fn adjust_position(&mut self, symbol: &str, delta: f64) {
        let entry = self.positions.entry(symbol.to_string()).or_insert(0.0);
        *entry = (*entry + delta).max(0.0);
        if *entry <= 1e-9 {
            self.positions.remove(symbol);
        }
    }

    pub fn recompute_total(&mut self) {
        self.total_value = self.invested_value() + self.cash.max(0.0);
    }
}

/// Snapshot used only during scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    #[serde(default)]
    pub positions: Vec<Position>,
    /// Securities keyed by symbol.
    #[serde(default)]
    pub securities: BTreeMap<String, Security>,
    pub available_cash_eur: f64,
    #[serde(default)]
    pub current_prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub portfolio: PortfolioContext,
    #[serde(flatten)]
    pub transaction_costs: TransactionCostModel,
    #[serde(default)]
    pub cost_penalty_factor: Option<f64>,
}

impl EvaluationContext {
    pub fn new(available_cash_eur: f64) -> Self {
        EvaluationContext {
            positions: Vec::new(),
            securities: BTreeMap::new(),
            available_cash_eur,
            current_prices: BTreeMap::new(),
            portfolio: PortfolioContext::default(),
            transaction_costs: TransactionCostModel::default(),
            cost_penalty_factor: None,
        }
    }

    /// Price for `candidate`: the current quote when known, otherwise its own price.
    pub fn price_for(&self, candidate: &ActionCandidate) -> f64 {
        self.current_prices
            .get(&candidate.symbol)
            .copied()
            .unwrap_or(candidate.price)
    }

    /// Starting portfolio with positions and security membership filled in
    /// from the raw position and security lists where the snapshot omits them.
    pub fn start_portfolio(&self) -> PortfolioContext {
        let mut portfolio = self.portfolio.clone();
        for position in &self.positions {
            portfolio
                .positions
                .entry(position.symbol.clone())
                .or_insert_with(|| position.market_value());
        }
        for (symbol, security) in &self.securities {
            if !security.country.is_empty() {
                portfolio
                    .security_countries
                    .entry(symbol.clone())
                    .or_insert_with(|| security.country.clone());
            }
            if !security.industry.is_empty() {
                portfolio
                    .security_industries
                    .entry(symbol.clone())
                    .or_insert_with(|| security.industry.clone());
            }
            if let Some(score) = security.quality_score {
                portfolio
                    .security_scores
                    .entry(symbol.clone())
                    .or_insert(score);
            }
        }
        portfolio.cash = self.available_cash_eur;
        if portfolio.total_value <= 0.0 {
            portfolio.recompute_total();
        }
        portfolio
    }
}
