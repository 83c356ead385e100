// src/domain/trends.rs
//
// Pure trend math, kept free of any database access so it can be tested
// directly. The db::trends module feeds it windows of periods and price rows.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Counts positive vs negative deltas; a direction needs a clear 1.5× majority,
/// anything tighter is `Stable`. Empty input is `Stable`.
pub fn price_trend_direction(deltas: &[f64]) -> TrendDirection {
    if deltas.is_empty() {
        return TrendDirection::Stable;
    }

    let positives = deltas.iter().filter(|d| **d > 0.0).count() as f64;
    let negatives = deltas.iter().filter(|d| **d < 0.0).count() as f64;

    if positives > negatives * 1.5 {
        TrendDirection::Increasing
    } else if negatives > positives * 1.5 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation; 0 with fewer than 2 data points.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Closed-period count normalized to a 30-day month.
pub fn turnover_rate(closed_periods: usize, window_days: i64) -> f64 {
    if window_days <= 0 {
        return 0.0;
    }
    closed_periods as f64 * 30.0 / window_days as f64
}

/// Income stability is the inverse of turnover, clamped to 0–1: a property
/// whose rooms churn once a month or more scores 0.
pub fn income_stability(turnover: f64) -> f64 {
    (1.0 - turnover).clamp(0.0, 1.0)
}

/// Estimated fraction of a month the property sits vacant: expected vacancy
/// spells per month times the mean spell length, as a share of 30 days.
pub fn estimated_vacancy_rate(turnover: f64, avg_duration_days: Option<f64>) -> f64 {
    let avg = match avg_duration_days {
        Some(d) if d > 0.0 => d,
        _ => return 0.0,
    };
    (turnover * avg / 30.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_boundaries() {
        // 3 positives vs 1 negative: 3 > 1.5 × 1.
        assert_eq!(
            price_trend_direction(&[10.0, 10.0, 10.0, -1.0]),
            TrendDirection::Increasing
        );
        assert_eq!(price_trend_direction(&[10.0, -10.0]), TrendDirection::Stable);
        assert_eq!(price_trend_direction(&[]), TrendDirection::Stable);
    }

    #[test]
    fn direction_decreasing() {
        assert_eq!(
            price_trend_direction(&[-5.0, -5.0, 2.0]),
            TrendDirection::Decreasing
        );
    }

    #[test]
    fn zero_deltas_are_neither() {
        assert_eq!(
            price_trend_direction(&[0.0, 0.0, 0.0]),
            TrendDirection::Stable
        );
    }

    #[test]
    fn std_dev_needs_two_points() {
        assert_eq!(population_std_dev(&[]), 0.0);
        assert_eq!(population_std_dev(&[42.0]), 0.0);
    }

    #[test]
    fn std_dev_population_form() {
        // Population stdev of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2.
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&vals) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn turnover_normalizes_to_month() {
        assert!((turnover_rate(3, 90) - 1.0).abs() < 1e-9);
        assert!((turnover_rate(2, 30) - 2.0).abs() < 1e-9);
        assert_eq!(turnover_rate(5, 0), 0.0);
    }

    #[test]
    fn stability_clamps() {
        assert_eq!(income_stability(0.0), 1.0);
        assert_eq!(income_stability(2.5), 0.0);
        assert!((income_stability(0.25) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn vacancy_rate_bounds() {
        assert_eq!(estimated_vacancy_rate(1.0, None), 0.0);
        assert_eq!(estimated_vacancy_rate(10.0, Some(90.0)), 1.0);
        assert!((estimated_vacancy_rate(1.0, Some(15.0)) - 0.5).abs() < 1e-9);
    }
}
