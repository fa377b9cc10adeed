#![allow(dead_code)]

use seqplanner::domain::action::{ActionCandidate, TradeSide};
use seqplanner::domain::context::{EvaluationContext, OpportunityContext, Security};
use seqplanner::ports::feasibility_port::FeasibilityPort;
use std::collections::HashMap;

/// Feasibility port that accepts everything except configured ISINs.
pub struct MockFeasibilityPort {
    pub rejections: HashMap<String, String>,
}

impl MockFeasibilityPort {
    pub fn new() -> Self {
        Self {
            rejections: HashMap::new(),
        }
    }

    pub fn with_rejection(mut self, isin: &str, reason: &str) -> Self {
        self.rejections.insert(isin.to_string(), reason.to_string());
        self
    }
}

impl FeasibilityPort for MockFeasibilityPort {
    fn is_action_feasible(
        &self,
        candidate: &ActionCandidate,
        _ctx: &OpportunityContext,
    ) -> (bool, String) {
        match self.rejections.get(&candidate.isin) {
            Some(reason) => (false, reason.clone()),
            None => (true, String::new()),
        }
    }
}

pub fn isin_for(symbol: &str) -> String {
    format!("XX{symbol:0>10}")
}

pub fn make_candidate(
    side: TradeSide,
    symbol: &str,
    quantity: i64,
    value_eur: f64,
    priority: f64,
) -> ActionCandidate {
    ActionCandidate {
        side,
        isin: isin_for(symbol),
        symbol: symbol.to_string(),
        name: format!("{symbol} Corp"),
        quantity,
        price: value_eur / quantity as f64,
        value_eur,
        currency: "EUR".to_string(),
        reason: "test".to_string(),
        priority,
        tags: vec![],
    }
}

pub fn sell(symbol: &str, quantity: i64, value_eur: f64, priority: f64) -> ActionCandidate {
    make_candidate(TradeSide::Sell, symbol, quantity, value_eur, priority)
}

pub fn buy(symbol: &str, quantity: i64, value_eur: f64, priority: f64) -> ActionCandidate {
    make_candidate(TradeSide::Buy, symbol, quantity, value_eur, priority)
}

pub fn make_security(symbol: &str, country: &str, industry: &str) -> Security {
    Security {
        isin: isin_for(symbol),
        symbol: symbol.to_string(),
        name: format!("{symbol} Corp"),
        country: country.to_string(),
        industry: industry.to_string(),
        quality_score: None,
        lot_size: 1,
        allow_buy: true,
        allow_sell: true,
    }
}

/// Opportunity context knowing every given security by ISIN.
pub fn opportunity_context(cash: f64, securities: &[Security]) -> OpportunityContext {
    let mut ctx = OpportunityContext::new(cash);
    for security in securities {
        ctx.securities.insert(security.isin.clone(), security.clone());
    }
    ctx
}

/// Evaluation context holding `positions` (symbol, EUR value) with even
/// optimizer targets over `targets`.
pub fn evaluation_context(
    cash: f64,
    positions: &[(&str, f64)],
    targets: &[&str],
    securities: &[Security],
) -> EvaluationContext {
    let mut ctx = EvaluationContext::new(cash);
    for (symbol, value) in positions {
        ctx.portfolio.positions.insert(symbol.to_string(), *value);
    }
    for symbol in targets {
        ctx.portfolio
            .optimizer_targets
            .insert(symbol.to_string(), 1.0 / targets.len() as f64);
    }
    for security in securities {
        ctx.securities.insert(security.symbol.clone(), security.clone());
    }
    ctx
}
