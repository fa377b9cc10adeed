//! Trade action and sequence value types.
//!
//! Sequences are always stored in canonical form: every SELL precedes every
//! BUY, and within each side legs are ordered by ISIN (symbol breaks ties).
//! The sequence hash is computed over that canonical form, so two sequences
//! holding the same legs collapse to one hash regardless of input order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const TAG_WINDFALL: &str = "windfall";
pub const TAG_AVERAGING_DOWN: &str = "averaging_down";

/// Trade direction. `Sell` orders before `Buy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Sell,
    Buy,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Sell => write!(f, "SELL"),
            TradeSide::Buy => write!(f, "BUY"),
        }
    }
}

/// A single proposed trade produced by the opportunity layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub side: TradeSide,
    pub isin: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    pub value_eur: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ActionCandidate {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_windfall(&self) -> bool {
        self.has_tag(TAG_WINDFALL)
    }

    pub fn is_averaging_down(&self) -> bool {
        self.has_tag(TAG_AVERAGING_DOWN)
    }

    /// Key used to track an opportunity across generation and selection.
    pub fn opportunity_key(&self) -> String {
        format!("{}|{}", self.symbol, self.side)
    }
}

/// An ordered, normalized set of actions considered as one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSequence {
    pub actions: Vec<ActionCandidate>,
    pub priority: f64,
    pub depth: usize,
    pub pattern_type: String,
    pub sequence_hash: String,
}

impl ActionSequence {
    /// Normalize `actions` and derive priority, depth and hash.
    pub fn new(actions: Vec<ActionCandidate>, pattern_type: &str) -> Self {
        let actions = normalize_actions(actions);
        let priority = mean_priority(&actions);
        let sequence_hash = sequence_hash(&actions);
        ActionSequence {
            depth: actions.len(),
            actions,
            priority,
            pattern_type: pattern_type.to_string(),
            sequence_hash,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn buys(&self) -> impl Iterator<Item = &ActionCandidate> {
        self.actions.iter().filter(|a| a.side == TradeSide::Buy)
    }

    pub fn sells(&self) -> impl Iterator<Item = &ActionCandidate> {
        self.actions.iter().filter(|a| a.side == TradeSide::Sell)
    }

    /// True when no BUY appears before a SELL.
    pub fn is_canonical(&self) -> bool {
        is_canonical_order(&self.actions)
    }
}

/// Sort actions SELL first, then BUY; ISIN ascending within a side.
pub fn normalize_actions(mut actions: Vec<ActionCandidate>) -> Vec<ActionCandidate> {
    actions.sort_by(|a, b| {
        a.side
            .cmp(&b.side)
            .then_with(|| a.isin.cmp(&b.isin))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    actions
}

pub fn is_canonical_order(actions: &[ActionCandidate]) -> bool {
    let mut seen_buy = false;
    for action in actions {
        match action.side {
            TradeSide::Buy => seen_buy = true,
            TradeSide::Sell if seen_buy => return false,
            TradeSide::Sell => {}
        }
    }
    true
}

/// SHA-256 over the (symbol, side, quantity) tuples of already-normalized actions.
pub fn sequence_hash(actions: &[ActionCandidate]) -> String {
    let mut hasher = Sha256::new();
    for action in actions {
        hasher.update(action.symbol.len().to_le_bytes());
        hasher.update(action.symbol.as_bytes());
        hasher.update(action.side.to_string().as_bytes());
        hasher.update(action.quantity.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

fn mean_priority(actions: &[ActionCandidate]) -> f64 {
    if actions.is_empty() {
        return 0.0;
    }
    actions.iter().map(|a| a.priority).sum::<f64>() / actions.len() as f64
}
