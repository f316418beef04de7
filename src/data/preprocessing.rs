//! Numeric preprocessing of feature columns

use ndarray::{Array2, ArrayView1, Axis};
use statrs::statistics::Statistics;

/// Normalize every column to zero mean and unit variance.
///
/// Columns with zero spread are only centered.
pub fn whiten(points: &Array2<f64>) -> Array2<f64> {
    let mut whitened = points.clone();
    if points.nrows() == 0 {
        return whitened;
    }

    for mut column in whitened.axis_iter_mut(Axis(1)) {
        let mean = column.iter().mean();
        let std_dev = column.iter().population_std_dev();
        let scale = if std_dev.is_finite() && std_dev > 0.0 { std_dev } else { 1.0 };
        column.mapv_inplace(|v| (v - mean) / scale);
    }

    whitened
}

/// Map values onto [0, 1] using their global min and max.
///
/// A constant block maps to all zeros.
pub fn min_max_scale<'a, I>(values: I)
where
    I: IntoIterator<Item = &'a mut f64>,
{
    let values: Vec<&mut f64> = values.into_iter().collect();
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(**v), hi.max(**v)));

    let span = max - min;
    for v in values {
        *v = if span > 0.0 { (*v - min) / span } else { 0.0 };
    }
}

/// Euclidean distance between two equally sized rows
pub fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

pub fn squared_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn whitening_centers_and_scales() {
        let points = array![[0.0, 10.0], [2.0, 10.0], [4.0, 10.0]];
        let whitened = whiten(&points);

        let first = whitened.column(0);
        assert!(first.iter().sum::<f64>().abs() < 1e-12);
        let variance = first.iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert!((variance - 1.0).abs() < 1e-12);

        // constant column is centered only
        assert!(whitened.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn min_max_maps_to_unit_interval() {
        let mut values = vec![2.0, 4.0, 6.0];
        min_max_scale(values.iter_mut());
        assert_eq!(values, vec![0.0, 0.5, 1.0]);

        let mut flat = vec![3.0, 3.0];
        min_max_scale(flat.iter_mut());
        assert_eq!(flat, vec![0.0, 0.0]);
    }

    #[test]
    fn euclidean_distance() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(euclidean(a.view(), b.view()), 5.0);
    }
}
