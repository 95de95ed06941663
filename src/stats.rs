//! Elementary statistics on series
use itertools::Itertools;

/// Median absolute deviation to standard deviation, normal distribution
const MAD_TO_SIGMA: f64 = 1.4826;

/// Arithmetic mean, None on empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Standard deviation (population), None on empty input.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Median, None on empty input. NaNs are sorted last.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let sorted = values
        .iter()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect::<Vec<_>>();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Standard deviation estimated from the median absolute deviation
/// (normal distribution scaling), None on empty input.
pub fn mad_std(values: &[f64]) -> Option<f64> {
    let center = median(values)?;
    let deviations = values
        .iter()
        .map(|v| (v - center).abs())
        .collect::<Vec<_>>();
    Some(MAD_TO_SIGMA * median(&deviations)?)
}

/// Centered window bounds [start, end) around index `i`,
/// clipped to the series length.
pub(crate) fn window_bounds(i: usize, window: usize, len: usize) -> (usize, usize) {
    let half = window / 2;
    let start = i.saturating_sub(half);
    let end = (i + window - half).min(len);
    (start, end)
}

/// Moving median over a centered window of `window` samples.
pub fn moving_median(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let (start, end) = window_bounds(i, window, values.len());
            median(&values[start..end]).unwrap_or(0.0)
        })
        .collect()
}

/// Moving [mad_std] over a centered window of `window` samples.
/// Windows are clipped at both ends of the series.
pub fn moving_mad_std(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let (start, end) = window_bounds(i, window, values.len());
            mad_std(&values[start..end]).unwrap_or(0.0)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic_statistics() {
        assert!(mean(&[]).is_none());
        assert!(median(&[]).is_none());
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(std_dev(&[2.0, 2.0, 2.0]), Some(0.0));
        assert_eq!(std_dev(&[1.0, 3.0]), Some(1.0));
    }

    #[test]
    fn windows() {
        assert_eq!(window_bounds(0, 5, 10), (0, 3));
        assert_eq!(window_bounds(5, 5, 10), (3, 8));
        assert_eq!(window_bounds(9, 5, 10), (7, 10));
        assert_eq!(window_bounds(1, 4, 3), (0, 3));

        let values = [0.0, 0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0];
        let med = moving_median(&values, 3);
        assert!(med.iter().all(|m| *m == 0.0));

        // a single spike does not inflate the robust noise level
        let mad = moving_mad_std(&values, 5);
        assert_eq!(mad.len(), values.len());
        assert!(mad.iter().all(|m| *m == 0.0));
    }

    #[test]
    fn robust_deviation() {
        assert!(mad_std(&[]).is_none());
        assert_eq!(mad_std(&[5.0]), Some(0.0));

        let values = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, 50.0];
        let sigma = mad_std(&values).unwrap();
        assert!((sigma - 1.4826).abs() < 1.0E-9);
        assert!(std_dev(&values).unwrap() > 10.0);
    }
}
