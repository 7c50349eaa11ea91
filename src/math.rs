/// Pearson correlation over paired observations, skipping any pair with a
/// non-finite member (missing-data rows under the keep-NA policy).
///
/// Returns NaN when fewer than two finite pairs remain or either column has
/// zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        cov / denom
    }
}

/// Sign-only fold change: +1 for positive, -1 for negative, NaN for zero or
/// missing values (zero direction is no evidence either way).
pub fn sign_fold(logfc: f64) -> f64 {
    if !logfc.is_finite() || logfc == 0.0 {
        f64::NAN
    } else {
        logfc.signum()
    }
}
