use serde::Serialize;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the sample standard deviation (n - 1) given a pre-computed mean.
/// Returns 0.0 for fewer than two values.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;

    variance.sqrt()
}

/// Median of an already sorted slice. Returns 0.0 for empty input.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2],
        n => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericSummary {
    /// Summarizes `values`; `None` when there is nothing to summarize.
    pub fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let avg = mean(&values);
        Some(Self {
            count: values.len(),
            mean: avg,
            median: median(&values),
            std: stddev(&values, avg),
            min: values[0],
            max: values[values.len() - 1],
        })
    }
}

/// Min, max and mean of one coordinate axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl AxisRange {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(Self {
            min,
            max,
            mean: mean(values),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoRange {
    pub latitude: AxisRange,
    pub longitude: AxisRange,
}
