//! Value at Risk and Conditional Value at Risk.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use super::correlation::covariance_matrix;
use super::returns::{mean, most_recent};

/// Guards percentile indexing against values like 20 * (1 - 0.95) = 1.0000000000000009.
const INDEX_EPSILON: f64 = 1e-9;
const CHOLESKY_JITTER: [f64; 4] = [0.0, 1e-10, 1e-8, 1e-6];

fn sorted_ascending(returns: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Return at the `(1 - confidence)` percentile of the ascending series.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    let sorted = sorted_ascending(returns);
    if sorted.is_empty() {
        return 0.0;
    }
    let raw = sorted.len() as f64 * (1.0 - confidence) + INDEX_EPSILON;
    let index = (raw.max(0.0).floor() as usize).min(sorted.len() - 1);
    sorted[index]
}

/// Mean of the worst `ceil(n * (1 - confidence))` returns, at least one.
pub fn conditional_value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    let sorted = sorted_ascending(returns);
    if sorted.is_empty() {
        return 0.0;
    }
    let raw = sorted.len() as f64 * (1.0 - confidence) - INDEX_EPSILON;
    let tail = (raw.max(0.0).ceil() as usize).clamp(1, sorted.len());
    mean(&sorted[..tail])
}

/// Weighted sum of per-security CVaRs.
pub fn portfolio_cvar(weights: &[f64], returns_by_symbol: &[Vec<f64>], confidence: f64) -> f64 {
    weights
        .iter()
        .zip(returns_by_symbol.iter())
        .map(|(w, r)| w * conditional_value_at_risk(r, confidence))
        .sum()
}

/// Portfolio CVaR from correlated normal draws.
///
/// Means and the sample covariance are estimated over the most recent common
/// window of the input series; each simulation draws a return vector through the
/// Cholesky factor of the covariance and records the weighted portfolio return.
pub fn monte_carlo_cvar(
    weights: &[f64],
    returns_by_symbol: &[Vec<f64>],
    confidence: f64,
    simulations: usize,
    seed: u64,
) -> f64 {
    let count = weights.len().min(returns_by_symbol.len());
    if count == 0 || simulations == 0 {
        return 0.0;
    }
    let len = returns_by_symbol[..count]
        .iter()
        .map(Vec::len)
        .min()
        .unwrap_or(0);
    if len < 2 {
        return 0.0;
    }

    let series: Vec<Vec<f64>> = returns_by_symbol[..count]
        .iter()
        .map(|r| most_recent(r, len).to_vec())
        .collect();
    let means: Vec<f64> = series.iter().map(|r| mean(r)).collect();
    let cov = covariance_matrix(&series);
    let factor = CHOLESKY_JITTER
        .iter()
        .find_map(|jitter| cholesky(&with_jitter(&cov, *jitter)))
        .unwrap_or_else(|| diagonal_factor(&cov));

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut draws = vec![0.0; count];
    let simulated: Vec<f64> = (0..simulations)
        .map(|_| {
            for z in draws.iter_mut() {
                *z = StandardNormal.sample(&mut rng);
            }
            (0..count)
                .map(|i| {
                    let shock: f64 = (0..=i).map(|j| factor[i][j] * draws[j]).sum();
                    weights[i] * (means[i] + shock)
                })
                .sum()
        })
        .collect();

    conditional_value_at_risk(&simulated, confidence)
}

fn with_jitter(matrix: &[Vec<f64>], jitter: f64) -> Vec<Vec<f64>> {
    let mut out = matrix.to_vec();
    for (i, row) in out.iter_mut().enumerate() {
        row[i] += jitter;
    }
    out
}

/// Lower-triangular Cholesky factor, or None if the matrix is not positive definite.
pub(crate) fn cholesky(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diag = matrix[i][i] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[i][j] = diag.sqrt();
            } else {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }
    Some(l)
}

fn diagonal_factor(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        l[i][i] = matrix[i][i].max(0.0).sqrt();
    }
    l
}
