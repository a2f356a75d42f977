use std::collections::HashMap;
use ordered_float::OrderedFloat;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

pub fn histogram(values: impl Iterator<Item = f64>) -> (HashMap<OrderedFloat<f64>, usize>, usize) {
	let mut histogram = HashMap::new();
	let mut len = 0;

	for value in values {
		*histogram.entry(OrderedFloat(value)).or_default() += 1;
		len += 1;
	}

	(histogram, len)
}

/// Softmax of `scores`, stable against large magnitudes.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
	let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
	let exp = scores.iter().map(|&s| (s - max).exp()).collect::<Vec<_>>();
	let sum = exp.iter().sum::<f64>();

	exp.into_iter().map(|e| e / sum).collect()
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
	a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Fraction of positions where `predicted` equals `truth`.
///
/// Undefined without any truth values, so an empty `truth` gives NaN.
pub fn accuracy(predicted: &[f64], truth: &[f64]) -> f64 {
	if truth.is_empty() {
		return f64::NAN;
	}

	predicted
		.iter()
		.zip(truth)
		.collect::<Vec<_>>()
		.into_par_iter()
		.filter(|(p, y)| p == y)
		.count() as f64 / truth.len() as f64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn histogram_counts_values() {
		let (histogram, len) = histogram(vec![2.0, 1.0, 2.0].into_iter());

		assert_eq!(len, 3);
		assert_eq!(histogram[&OrderedFloat(2.0)], 2);
		assert_eq!(histogram[&OrderedFloat(1.0)], 1);
	}

	#[test]
	fn softmax_sums_to_one() {
		let p = softmax(&[1000.0, 1000.0, 999.0]);

		assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
		assert!((p[0] - p[1]).abs() < 1e-12);
		assert!(p[2] < p[0]);
	}

	#[test]
	fn accuracy_counts_matches() {
		assert_eq!(accuracy(&[1.0, 0.0, 1.0, 1.0], &[1.0, 1.0, 1.0, 0.0]), 0.5);
		assert!(accuracy(&[], &[]).is_nan());
	}
}
