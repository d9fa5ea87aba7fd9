use crate::models::{Correlation, FitPoint, NormalizedComparison, SummaryStatistics};

/// Variances at or below this are treated as zero
const VARIANCE_EPSILON: f64 = 1e-12;

/// How well the AI judgments track the human ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Strong,
    Moderate,
    NeedsRefinement,
    Undetermined,
}

impl Alignment {
    pub fn describe(self) -> &'static str {
        match self {
            Alignment::Strong => "Strong alignment (correlation >= 0.7)",
            Alignment::Moderate => "Moderate alignment (correlation 0.5-0.7)",
            Alignment::NeedsRefinement => "Needs refinement (correlation < 0.5)",
            Alignment::Undetermined => "Not enough variation to judge alignment",
        }
    }
}

/// Descriptive statistics comparing the human and AI judgment series
pub struct CorrelationAnalyzer;

impl CorrelationAnalyzer {
    /// Compute summary statistics, or `None` when there is nothing to compare.
    ///
    /// Results keep full precision; use [`round_for_display`] before showing them.
    pub fn analyze(&self, comparisons: &[NormalizedComparison]) -> Option<SummaryStatistics> {
        if comparisons.is_empty() {
            return None;
        }

        let human: Vec<f64> = comparisons.iter().map(|c| c.human_judgement).collect();
        let ai: Vec<f64> = comparisons.iter().map(|c| c.ai_judgement).collect();

        let differences: Vec<f64> = comparisons
            .iter()
            .map(|c| (c.human_judgement - c.ai_judgement).abs())
            .collect();

        let human_mean = self.calculate_mean(&human);
        let ai_mean = self.calculate_mean(&ai);
        let (regression_slope, regression_intercept) = self.calculate_regression(&human, &ai);

        Some(SummaryStatistics {
            count: comparisons.len(),
            mean_absolute_difference: self.calculate_mean(&differences),
            human_mean,
            ai_mean,
            correlation: self.calculate_correlation(&human, human_mean, &ai, ai_mean),
            regression_slope,
            regression_intercept,
        })
    }

    fn calculate_mean(&self, values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Population Pearson correlation
    fn calculate_correlation(&self, xs: &[f64], x_mean: f64, ys: &[f64], y_mean: f64) -> Correlation {
        let n = xs.len() as f64;
        let x_variance = xs.iter().map(|x| (x - x_mean).powi(2)).sum::<f64>() / n;
        let y_variance = ys.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n;
        if x_variance <= VARIANCE_EPSILON || y_variance <= VARIANCE_EPSILON {
            return Correlation::Undefined;
        }

        let covariance = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (x - x_mean) * (y - y_mean))
            .sum::<f64>()
            / n;

        let r = covariance / (x_variance * y_variance).sqrt();
        if r.is_finite() {
            Correlation::Value(r.clamp(-1.0, 1.0))
        } else {
            Correlation::Undefined
        }
    }

    /// Least squares fit of `ys` on `xs`; `(0, 0)` when all `xs` coincide
    fn calculate_regression(&self, xs: &[f64], ys: &[f64]) -> (f64, f64) {
        let n = xs.len() as f64;
        let sum_x: f64 = xs.iter().sum();
        let sum_y: f64 = ys.iter().sum();
        let sum_xy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
        let sum_xx: f64 = xs.iter().map(|x| x * x).sum();

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() <= VARIANCE_EPSILON {
            return (0.0, 0.0);
        }

        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;
        (slope, intercept)
    }
}

/// Round a value to three decimals
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Copy of the statistics with every float rounded to three decimals
pub fn round_for_display(stats: &SummaryStatistics) -> SummaryStatistics {
    SummaryStatistics {
        count: stats.count,
        mean_absolute_difference: round3(stats.mean_absolute_difference),
        human_mean: round3(stats.human_mean),
        ai_mean: round3(stats.ai_mean),
        correlation: match stats.correlation {
            Correlation::Value(r) => Correlation::Value(round3(r)),
            Correlation::Undefined => Correlation::Undefined,
        },
        regression_slope: round3(stats.regression_slope),
        regression_intercept: round3(stats.regression_intercept),
    }
}

/// Endpoints of the best-fit line across the human axis `[-1, 1]`.
///
/// Empty for a flat (zero slope) fit.
pub fn best_fit_line(stats: &SummaryStatistics) -> Vec<FitPoint> {
    if stats.regression_slope == 0.0 {
        return Vec::new();
    }
    [-1.0, 1.0]
        .into_iter()
        .map(|x| FitPoint {
            human_judgement: x,
            ai_judgement: stats.regression_slope * x + stats.regression_intercept,
        })
        .collect()
}

pub fn interpret(correlation: Correlation) -> Alignment {
    match correlation {
        Correlation::Value(r) if r >= 0.7 => Alignment::Strong,
        Correlation::Value(r) if r >= 0.5 => Alignment::Moderate,
        Correlation::Value(_) => Alignment::NeedsRefinement,
        Correlation::Undefined => Alignment::Undetermined,
    }
}
