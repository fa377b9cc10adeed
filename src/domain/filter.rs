//! Post-generation filters applied across whole sequences.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::action::ActionSequence;
use super::context::Security;
use super::error::PlannerError;
use super::risk::{calculate_returns, correlation};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub correlation_aware: bool,
    pub diversity: bool,
    pub max_correlation: f64,
    /// Zero means unlimited.
    pub max_same_country_buys: usize,
    /// Zero means unlimited.
    pub max_same_industry_buys: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        FilterSettings {
            correlation_aware: true,
            diversity: true,
            max_correlation: 0.8,
            max_same_country_buys: 0,
            max_same_industry_buys: 0,
        }
    }
}

/// Data the filters consult. Correlations are keyed by an ordered symbol pair.
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    correlations: HashMap<(String, String), f64>,
    /// Securities keyed by symbol.
    pub securities: BTreeMap<String, Security>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl FilterContext {
    pub fn new(securities: BTreeMap<String, Security>) -> Self {
        FilterContext {
            correlations: HashMap::new(),
            securities,
        }
    }

    pub fn set_correlation(&mut self, a: &str, b: &str, rho: f64) {
        self.correlations.insert(pair_key(a, b), rho);
    }

    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        self.correlations.get(&pair_key(a, b)).copied()
    }

    /// Fill pairwise correlations from daily closing prices per symbol.
    pub fn with_price_history(mut self, prices: &BTreeMap<String, Vec<f64>>) -> Self {
        let returns: Vec<(&String, Vec<f64>)> = prices
            .iter()
            .map(|(symbol, series)| (symbol, calculate_returns(series)))
            .collect();
        for (i, (a, ra)) in returns.iter().enumerate() {
            for (b, rb) in returns.iter().skip(i + 1) {
                self.set_correlation(a, b, correlation(ra, rb));
            }
        }
        self
    }
}

pub trait SequenceFilter {
    fn name(&self) -> &str;

    fn filter(
        &self,
        sequences: Vec<ActionSequence>,
        ctx: &FilterContext,
    ) -> Result<Vec<ActionSequence>, PlannerError>;
}

/// Drops sequences that buy two securities that move too closely together.
pub struct CorrelationAwareFilter {
    pub max_correlation: f64,
}

impl CorrelationAwareFilter {
    fn violates(
        &self,
        sequence: &ActionSequence,
        ctx: &FilterContext,
    ) -> Result<bool, PlannerError> {
        let buys: Vec<&str> = sequence.buys().map(|a| a.symbol.as_str()).collect();
        for (i, a) in buys.iter().enumerate() {
            for b in buys.iter().skip(i + 1) {
                let Some(rho) = ctx.correlation(a, b) else {
                    continue;
                };
                if !rho.is_finite() {
                    return Err(PlannerError::invalid_input(format!(
                        "non-finite correlation between {a} and {b}"
                    )));
                }
                if rho.abs() > self.max_correlation {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl SequenceFilter for CorrelationAwareFilter {
    fn name(&self) -> &str {
        "correlation_aware"
    }

    fn filter(
        &self,
        sequences: Vec<ActionSequence>,
        ctx: &FilterContext,
    ) -> Result<Vec<ActionSequence>, PlannerError> {
        let mut kept = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            if !self.violates(&sequence, ctx)? {
                kept.push(sequence);
            }
        }
        Ok(kept)
    }
}

/// Limits how many buys a sequence may concentrate in one country or industry.
pub struct DiversityFilter {
    pub max_same_country_buys: usize,
    pub max_same_industry_buys: usize,
}

impl DiversityFilter {
    fn exceeds(limit: usize, groups: impl Iterator<Item = String>) -> bool {
        if limit == 0 {
            return false;
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for group in groups {
            let count = counts.entry(group).or_insert(0);
            *count += 1;
            if *count > limit {
                return true;
            }
        }
        false
    }
}

impl SequenceFilter for DiversityFilter {
    fn name(&self) -> &str {
        "diversity"
    }

    fn filter(
        &self,
        sequences: Vec<ActionSequence>,
        ctx: &FilterContext,
    ) -> Result<Vec<ActionSequence>, PlannerError> {
        Ok(sequences
            .into_iter()
            .filter(|sequence| {
                let securities: Vec<&Security> = sequence
                    .buys()
                    .filter_map(|a| ctx.securities.get(&a.symbol))
                    .collect();
                let countries = securities
                    .iter()
                    .filter(|s| !s.country.is_empty())
                    .map(|s| s.country.clone());
                let industries = securities
                    .iter()
                    .filter(|s| !s.industry.is_empty())
                    .map(|s| s.industry.clone());
                !Self::exceeds(self.max_same_country_buys, countries)
                    && !Self::exceeds(self.max_same_industry_buys, industries)
            })
            .collect())
    }
}

/// Ordered filter chain. A failing filter never blocks planning: the
/// failure is logged and the unfiltered input is returned.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn SequenceFilter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &FilterSettings) -> Self {
        let mut pipeline = FilterPipeline::new();
        if settings.correlation_aware {
            pipeline.push(Box::new(CorrelationAwareFilter {
                max_correlation: settings.max_correlation,
            }));
        }
        if settings.diversity {
            pipeline.push(Box::new(DiversityFilter {
                max_same_country_buys: settings.max_same_country_buys,
                max_same_industry_buys: settings.max_same_industry_buys,
            }));
        }
        pipeline
    }

    pub fn push(&mut self, filter: Box<dyn SequenceFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(
        &self,
        sequences: Vec<ActionSequence>,
        ctx: &FilterContext,
    ) -> Vec<ActionSequence> {
        if self.filters.is_empty() {
            return sequences;
        }
        let mut current = sequences.clone();
        for filter in &self.filters {
            let before = current.len();
            match filter.filter(current, ctx) {
                Ok(next) => {
                    debug!(filter = filter.name(), before, after = next.len(), "filter applied");
                    current = next;
                }
                Err(e) => {
                    warn!(
                        filter = filter.name(),
                        error = %e,
                        "filter failed, returning sequences unfiltered"
                    );
                    return sequences;
                }
            }
        }
        current
    }
}
