//! Median-absolute-deviation outlier rejection over price samples.

/// Median of a sample; the mean of the two middle values for even lengths.
/// `None` for an empty sample.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// `|a - b| <= 1e-8 + 1e-5 * |b|`
pub(crate) fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Indices of the statistically extreme values in `values`, ascending.
///
/// With `d[i] = |values[i] - median|` and `mad = median(d)`, an item is an
/// outlier when `d[i] / mad >= m`. A degenerate spread (`mad` close to 0)
/// compares the raw deviation instead: `d[i] >= m`.
pub fn reject_outliers(values: &[f64], m: f64) -> Vec<usize> {
    let Some(center) = median(values) else {
        tracing::debug!("reject_outliers received no data");
        return Vec::new();
    };

    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0);

    if is_close(mad, 0.0) {
        return deviations
            .iter()
            .enumerate()
            .filter(|(_, d)| **d >= m)
            .map(|(i, _)| i)
            .collect();
    }

    deviations
        .iter()
        .enumerate()
        .filter(|(_, d)| **d / mad >= m)
        .map(|(i, _)| i)
        .collect()
}

/// Drop the positions listed in `indices` (ascending) from `items`
pub fn remove_indices<T>(items: Vec<T>, indices: &[usize]) -> Vec<T> {
    if indices.is_empty() {
        return items;
    }

    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| indices.binary_search(i).is_err())
        .map(|(_, item)| item)
        .collect()
}
