//! Running-peak drawdown statistics.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawdownMetrics {
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    /// Consecutive trailing periods spent below the running peak.
    pub days_in_drawdown: usize,
    pub peak_value: f64,
    pub current_value: f64,
}

pub fn drawdown_metrics(values: &[f64]) -> DrawdownMetrics {
    let Some(&first) = values.first() else {
        return DrawdownMetrics::default();
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut days_in_drawdown = 0usize;

    for &value in values {
        if value >= peak {
            peak = value;
            days_in_drawdown = 0;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            days_in_drawdown += 1;
        }
    }

    let current_value = values[values.len() - 1];
    let current_drawdown = if peak > 0.0 {
        ((peak - current_value) / peak).max(0.0)
    } else {
        0.0
    };

    DrawdownMetrics {
        max_drawdown: max_dd,
        current_drawdown,
        days_in_drawdown,
        peak_value: peak,
        current_value,
    }
}
