//! Pearson correlation between two numeric sequences.

/// Pearson correlation coefficient of `x` and `y`, in `[-1, 1]`.
///
/// Degenerate inputs yield `0.0` rather than an error: sequences of
/// different length, fewer than two points, or a constant sequence.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 || is_constant(x) || is_constant(y) {
        return 0.0;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    // Sums of deviations from the mean.
    let (mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denominator = (sum_x2 * sum_y2).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (sum_xy / denominator).clamp(-1.0, 1.0)
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}
