//! Covariance, correlation and diversification weights.

use super::returns::{mean, most_recent, sample_std_dev};

const DEFAULT_SHRINKAGE: f64 = 0.2;
const MAX_SHRINKAGE: f64 = 0.5;

fn common_length(series: &[Vec<f64>]) -> usize {
    series.iter().map(Vec::len).min().unwrap_or(0)
}

fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (most_recent(a, n), most_recent(b, n));
    let (ma, mb) = (mean(a), mean(b));
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Sample covariance matrix (N-1 denominator) over the most recent common
/// window of the series.
pub fn covariance_matrix(series: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let len = common_length(series);
    let trimmed: Vec<&[f64]> = series.iter().map(|s| most_recent(s, len)).collect();
    let n = trimmed.len();
    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let c = sample_covariance(trimmed[i], trimmed[j]);
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }
    cov
}

/// Pearson correlation over the most recent common window. Zero variance on
/// either side yields 0.0.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (most_recent(a, n), most_recent(b, n));
    let (sa, sb) = (sample_std_dev(a), sample_std_dev(b));
    if sa == 0.0 || sb == 0.0 {
        return 0.0;
    }
    (sample_covariance(a, b) / (sa * sb)).clamp(-1.0, 1.0)
}

pub fn correlation_matrix(series: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = series.len();
    let mut corr = vec![vec![0.0; n]; n];
    for i in 0..n {
        corr[i][i] = 1.0;
        for j in (i + 1)..n {
            let c = correlation(&series[i], &series[j]);
            corr[i][j] = c;
            corr[j][i] = c;
        }
    }
    corr
}

/// Distance metric sqrt(2 * (1 - rho)): 0 for identical, 2 for opposite series.
pub fn correlation_distance(rho: f64) -> f64 {
    (2.0 * (1.0 - rho.clamp(-1.0, 1.0))).sqrt()
}

/// Weights proportional to 1 / variance, normalized to sum to one.
///
/// If any series has zero variance the inverse is undefined, so every
/// series gets an equal weight instead.
pub fn inverse_variance_weights(series: &[Vec<f64>]) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }
    let equal = vec![1.0 / series.len() as f64; series.len()];
    let variances: Vec<f64> = series.iter().map(|s| sample_std_dev(s).powi(2)).collect();
    if variances.iter().any(|v| *v <= 0.0 || !v.is_finite()) {
        return equal;
    }
    let inverse: Vec<f64> = variances.iter().map(|v| 1.0 / v).collect();
    let total: f64 = inverse.iter().sum();
    inverse.iter().map(|v| v / total).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShrinkageResult {
    pub matrix: Vec<Vec<f64>>,
    pub intensity: f64,
}

/// Shrink a sample covariance matrix toward a constant-covariance target.
///
/// The target keeps the average variance on the diagonal and the average
/// off-diagonal covariance elsewhere. Intensity is estimated from the spread
/// of the sample elements against their distance to the target, capped at
/// 0.5, and falls back to 0.2 when it cannot be estimated.
pub fn ledoit_wolf_shrinkage(sample: &[Vec<f64>]) -> ShrinkageResult {
    let n = sample.len();
    if n < 2 {
        return ShrinkageResult {
            matrix: sample.to_vec(),
            intensity: 0.0,
        };
    }

    let avg_var = (0..n).map(|i| sample[i][i]).sum::<f64>() / n as f64;
    let off_diag: f64 = (0..n)
        .flat_map(|i| (0..n).filter(move |j| *j != i).map(move |j| (i, j)))
        .map(|(i, j)| sample[i][j])
        .sum();
    let avg_cov = off_diag / (n * (n - 1)) as f64;

    let target = |i: usize, j: usize| -> f64 {
        if i == j {
            avg_var
        } else if avg_var > 0.0 {
            avg_cov
        } else {
            0.0
        }
    };

    let mut intensity = DEFAULT_SHRINKAGE;
    if n > 2 && avg_var > 0.0 {
        let cells = (n * n) as f64;
        let mut sum_sq_diff = 0.0;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for i in 0..n {
            for j in 0..n {
                let v = sample[i][j];
                sum_sq_diff += (v - target(i, j)).powi(2);
                sum += v;
                sum_sq += v * v;
            }
        }
        let mean_sq_diff = sum_sq_diff / cells;
        let mean_sample = sum / cells;
        let var_sample = sum_sq / cells - mean_sample * mean_sample;
        if var_sample > 0.0 && mean_sq_diff > 0.0 {
            intensity = (var_sample / (var_sample + mean_sq_diff)).clamp(0.0, MAX_SHRINKAGE);
        }
    }

    let matrix = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| (1.0 - intensity) * sample[i][j] + intensity * target(i, j))
                .collect()
        })
        .collect();

    ShrinkageResult { matrix, intensity }
}
