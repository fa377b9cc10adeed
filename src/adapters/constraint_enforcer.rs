//! Trading-constraint adapter backing [`FeasibilityPort`].
//!
//! Rules are checked in a fixed order and the first failing rule supplies
//! the rejection reason. `enforce` additionally rounds quantities to the
//! security's lot size.

use tracing::debug;

use crate::domain::action::{ActionCandidate, TradeSide};
use crate::domain::context::OpportunityContext;
use crate::domain::planner::PreFilteredSecurity;
use crate::ports::feasibility_port::FeasibilityPort;

pub const REASON_ALLOW_SELL: &str = "allow_sell=false";
pub const REASON_ALLOW_BUY: &str = "allow_buy=false";
pub const REASON_INELIGIBLE: &str = "ineligible";
pub const REASON_RECENTLY_SOLD: &str = "recently sold (cooloff)";
pub const REASON_RECENTLY_BOUGHT: &str = "recently bought (cooloff)";
pub const REASON_SECURITY_NOT_FOUND: &str = "security not found";

#[derive(Debug, Default, Clone, Copy)]
pub struct ConstraintEnforcer;

impl ConstraintEnforcer {
    pub fn new() -> Self {
        ConstraintEnforcer
    }

    fn check(candidate: &ActionCandidate, ctx: &OpportunityContext) -> Result<(), &'static str> {
        match candidate.side {
            TradeSide::Sell if !ctx.allow_sell => return Err(REASON_ALLOW_SELL),
            TradeSide::Buy if !ctx.allow_buy => return Err(REASON_ALLOW_BUY),
            _ => {}
        }
        if ctx.ineligible_isins.contains(&candidate.isin) {
            return Err(REASON_INELIGIBLE);
        }
        match candidate.side {
            TradeSide::Sell if ctx.recently_sold.contains(&candidate.isin) => {
                return Err(REASON_RECENTLY_SOLD)
            }
            TradeSide::Buy if ctx.recently_bought.contains(&candidate.isin) => {
                return Err(REASON_RECENTLY_BOUGHT)
            }
            _ => {}
        }
        if let Some(security) = ctx.security(&candidate.isin) {
            match candidate.side {
                TradeSide::Sell if !security.allow_sell => return Err(REASON_ALLOW_SELL),
                TradeSide::Buy if !security.allow_buy => return Err(REASON_ALLOW_BUY),
                _ => {}
            }
        }
        Ok(())
    }
}

/// Round down to a whole number of lots, but never below one lot.
pub fn round_to_lot(quantity: i64, lot_size: i64) -> i64 {
    if lot_size <= 0 {
        return quantity;
    }
    let rounded = (quantity / lot_size) * lot_size;
    if rounded == 0 { lot_size } else { rounded }
}

impl FeasibilityPort for ConstraintEnforcer {
    fn is_action_feasible(
        &self,
        candidate: &ActionCandidate,
        ctx: &OpportunityContext,
    ) -> (bool, String) {
        match Self::check(candidate, ctx) {
            Ok(()) => (true, String::new()),
            Err(reason) => (false, reason.to_string()),
        }
    }

    fn enforce(
        &self,
        candidates: &[ActionCandidate],
        ctx: &OpportunityContext,
    ) -> (Vec<ActionCandidate>, Vec<PreFilteredSecurity>) {
        let mut kept = Vec::with_capacity(candidates.len());
        let mut dropped = Vec::new();
        for candidate in candidates {
            let outcome = match ctx.security(&candidate.isin) {
                None => Err(REASON_SECURITY_NOT_FOUND),
                Some(security) => Self::check(candidate, ctx).map(|()| security.lot_size),
            };
            match outcome {
                Ok(lot_size) => {
                    let mut adjusted = candidate.clone();
                    let quantity = round_to_lot(candidate.quantity, lot_size);
                    if quantity != candidate.quantity {
                        debug!(
                            symbol = %candidate.symbol,
                            from = candidate.quantity,
                            to = quantity,
                            lot_size,
                            "quantity rounded to lot size"
                        );
                        adjusted.quantity = quantity;
                        adjusted.value_eur = quantity as f64 * candidate.price;
                    }
                    kept.push(adjusted);
                }
                Err(reason) => {
                    debug!(
                        symbol = %candidate.symbol,
                        side = %candidate.side,
                        reason,
                        "candidate pre-filtered"
                    );
                    dropped.push(PreFilteredSecurity {
                        isin: candidate.isin.clone(),
                        symbol: candidate.symbol.clone(),
                        side: candidate.side,
                        reasons: vec![reason.to_string()],
                    });
                }
            }
        }
        (kept, dropped)
    }
}
