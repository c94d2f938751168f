//! NaN-aware reductions used by cube collapses and spectrum extraction.

/// Sum of the finite-or-infinite samples, skipping NaN.
///
/// Returns NaN when every sample is NaN or the input is empty, so an empty
/// aperture reads as "no data" rather than zero flux.
#[must_use]
pub fn nansum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut sum = 0.0;
    let mut seen = false;
    for v in values {
        if !v.is_nan() {
            sum += v;
            seen = true;
        }
    }
    if seen {
        sum
    } else {
        f64::NAN
    }
}

/// Median of the non-NaN samples; NaN when there are none.
#[must_use]
pub fn nanmedian<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut valid: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    valid.sort_by(f64::total_cmp);
    let mid = valid.len() / 2;
    if valid.len() % 2 == 0 {
        (valid[mid - 1] + valid[mid]) / 2.0
    } else {
        valid[mid]
    }
}

/// Mean and population standard deviation of the finite samples.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn finite_mean_std(values: &[f64]) -> Option<(f64, f64)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Largest finite sample.
#[must_use]
pub fn finite_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .reduce(f64::max)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_nansum_skips_nan() {
        assert_eq!(nansum([1.0, f64::NAN, 2.5]), 3.5);
    }

    #[test]
    fn test_nansum_all_nan_is_nan() {
        assert!(nansum([f64::NAN, f64::NAN]).is_nan());
        assert!(nansum(std::iter::empty()).is_nan());
    }

    #[test]
    fn test_nanmedian() {
        assert_eq!(nanmedian([1.0, 3.0, 2.0, 5.0, 4.0]), 3.0);
        assert_eq!(nanmedian([1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(nanmedian([1.0, f64::NAN, 3.0, 2.0, f64::NAN]), 2.0);
        assert!(nanmedian([f64::NAN]).is_nan());
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = finite_mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
        assert!(finite_mean_std(&[f64::NAN]).is_none());
    }
}
