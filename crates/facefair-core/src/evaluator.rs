//! Verification evaluator: distance-threshold sweep over labeled pairs.
//!
//! A pair is predicted "same person" when its distance is strictly below the
//! threshold. Rates with an empty denominator (no positive or no negative
//! pairs) are reported as `0.0`.

use ndarray::{Array1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_THRESHOLD_START: f64 = 0.0;
pub const DEFAULT_THRESHOLD_STOP: f64 = 4.0;
pub const DEFAULT_THRESHOLD_STEP: f64 = 0.1;

#[derive(Error, Debug, PartialEq)]
pub enum EvaluationError {
    #[error("{distances} distances but {matches} match labels")]
    LengthMismatch { distances: usize, matches: usize },
    #[error("threshold sweep is empty")]
    NoThresholds,
    #[error("embedding shapes differ: {a:?} vs {b:?}")]
    ShapeMismatch { a: (usize, usize), b: (usize, usize) },
}

/// Metrics at one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f32,
    pub tpr: f32,
    pub fpr: f32,
    pub accuracy: f32,
}

/// Full sweep result plus the selected operating point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocReport {
    pub points: Vec<RocPoint>,
    pub best_threshold: f32,
    pub best_accuracy: f32,
}

impl RocReport {
    pub fn tpr(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.tpr).collect()
    }

    pub fn fpr(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.fpr).collect()
    }

    pub fn accuracy(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.accuracy).collect()
    }

    pub fn best(&self) -> Option<&RocPoint> {
        self.points.iter().find(|p| p.threshold == self.best_threshold)
    }
}

/// Sweep `thresholds` over `distances` labeled by `matches`.
///
/// The best threshold maximises accuracy; ties go to the smallest threshold.
pub fn evaluate(distances: &[f32], matches: &[bool], thresholds: &[f32]) -> Result<RocReport, EvaluationError> {
    if distances.len() != matches.len() {
        return Err(EvaluationError::LengthMismatch {
            distances: distances.len(),
            matches: matches.len(),
        });
    }
    if thresholds.is_empty() {
        return Err(EvaluationError::NoThresholds);
    }

    let positives = matches.iter().filter(|&&m| m).count();
    let negatives = matches.len() - positives;

    let points: Vec<RocPoint> = thresholds
        .iter()
        .map(|&threshold| {
            let mut true_pos = 0usize;
            let mut false_pos = 0usize;
            let mut correct = 0usize;
            for (&distance, &is_match) in distances.iter().zip(matches) {
                let predicted = distance < threshold;
                match (predicted, is_match) {
                    (true, true) => true_pos += 1,
                    (true, false) => false_pos += 1,
                    _ => {}
                }
                if predicted == is_match {
                    correct += 1;
                }
            }
            RocPoint {
                threshold,
                tpr: rate(true_pos, positives),
                fpr: rate(false_pos, negatives),
                accuracy: rate(correct, matches.len()),
            }
        })
        .collect();

    let mut best = points[0];
    for point in &points[1..] {
        let better = point.accuracy > best.accuracy
            || (point.accuracy == best.accuracy && point.threshold < best.threshold);
        if better {
            best = *point;
        }
    }

    tracing::info!(
        pairs = distances.len(),
        positives,
        negatives,
        thresholds = thresholds.len(),
        best_threshold = best.threshold,
        best_accuracy = best.accuracy,
        "verification sweep finished"
    );

    Ok(RocReport {
        points,
        best_threshold: best.threshold,
        best_accuracy: best.accuracy,
    })
}

/// Half-open sweep `start, start + step, ...` below `stop`.
///
/// Empty when `step` is not positive or the range is empty.
pub fn threshold_range(start: f64, stop: f64, step: f64) -> Vec<f32> {
    let span = (stop - start) / step;
    if !span.is_finite() || span <= 0.0 || step <= 0.0 {
        return Vec::new();
    }
    let count = span.ceil() as usize;
    (0..count).map(|i| (start + i as f64 * step) as f32).collect()
}

/// Default sweep `[0.0, 4.0)` in steps of `0.1`.
pub fn default_thresholds() -> Vec<f32> {
    threshold_range(DEFAULT_THRESHOLD_START, DEFAULT_THRESHOLD_STOP, DEFAULT_THRESHOLD_STEP)
}

/// Row-wise squared Euclidean distance between two embedding matrices.
pub fn pairwise_squared_distances(a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<Array1<f32>, EvaluationError> {
    if a.dim() != b.dim() {
        return Err(EvaluationError::ShapeMismatch { a: a.dim(), b: b.dim() });
    }
    let diff = &a - &b;
    Ok(diff.mapv(|x| x * x).sum_axis(Axis(1)))
}

fn rate(count: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        count as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;

    const DISTANCES: [f32; 4] = [0.1, 0.2, 3.0, 3.5];
    const MATCHES: [bool; 4] = [true, true, false, false];

    #[test]
    fn test_separable_pairs() {
        let report = evaluate(&DISTANCES, &MATCHES, &[1.0]).unwrap();
        let point = report.points[0];
        assert_eq!(point.tpr, 1.0);
        assert_eq!(point.fpr, 0.0);
        assert_eq!(point.accuracy, 1.0);
        assert_eq!(report.best_threshold, 1.0);
    }

    #[rstest]
    #[case::below_all(0.05, 0.0, 0.0, 0.5)]
    #[case::between_positives(0.15, 0.5, 0.0, 0.75)]
    #[case::strict_inequality(0.2, 0.5, 0.0, 0.75)]
    #[case::one_negative(3.2, 1.0, 0.5, 0.75)]
    #[case::above_all(10.0, 1.0, 1.0, 0.5)]
    fn test_rates_per_threshold(
        #[case] threshold: f32,
        #[case] tpr: f32,
        #[case] fpr: f32,
        #[case] accuracy: f32,
    ) {
        let report = evaluate(&DISTANCES, &MATCHES, &[threshold]).unwrap();
        let point = report.points[0];
        assert_relative_eq!(point.tpr, tpr);
        assert_relative_eq!(point.fpr, fpr);
        assert_relative_eq!(point.accuracy, accuracy);
    }

    #[test]
    fn test_best_threshold_ties_go_to_smallest() {
        // 1.0, 2.0 and 2.5 all separate the pairs perfectly.
        let report = evaluate(&DISTANCES, &MATCHES, &[2.5, 0.05, 2.0, 1.0, 3.2]).unwrap();
        assert_eq!(report.best_threshold, 1.0);
        assert_eq!(report.best_accuracy, 1.0);
        assert_eq!(report.best().unwrap().threshold, 1.0);
    }

    #[test]
    fn test_points_follow_threshold_order() {
        let thresholds = [3.2, 0.05, 1.0];
        let report = evaluate(&DISTANCES, &MATCHES, &thresholds).unwrap();
        let got: Vec<f32> = report.points.iter().map(|p| p.threshold).collect();
        assert_eq!(got, thresholds);
        assert_eq!(report.tpr(), vec![1.0, 0.0, 1.0]);
        assert_eq!(report.fpr(), vec![0.5, 0.0, 0.0]);
        assert_eq!(report.accuracy(), vec![0.75, 0.5, 1.0]);
    }

    #[test]
    fn test_all_matches_fpr_sentinel() {
        let report = evaluate(&[0.1, 2.0], &[true, true], &[1.0]).unwrap();
        assert_eq!(report.points[0].fpr, 0.0);
        assert_relative_eq!(report.points[0].tpr, 0.5);
    }

    #[test]
    fn test_no_matches_tpr_sentinel() {
        let report = evaluate(&[0.1, 2.0], &[false, false], &[1.0]).unwrap();
        assert_eq!(report.points[0].tpr, 0.0);
        assert_relative_eq!(report.points[0].fpr, 0.5);
    }

    #[test]
    fn test_empty_pairs_sentinel() {
        let report = evaluate(&[], &[], &[1.0]).unwrap();
        assert_eq!(report.points[0].accuracy, 0.0);
        assert_eq!(report.points[0].tpr, 0.0);
        assert_eq!(report.points[0].fpr, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let err = evaluate(&DISTANCES, &MATCHES[..3], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::LengthMismatch {
                distances: 4,
                matches: 3
            }
        );
    }

    #[test]
    fn test_no_thresholds() {
        assert_eq!(
            evaluate(&DISTANCES, &MATCHES, &[]).unwrap_err(),
            EvaluationError::NoThresholds
        );
    }

    #[test]
    fn test_default_thresholds() {
        let thresholds = default_thresholds();
        assert_eq!(thresholds.len(), 40);
        assert_eq!(thresholds[0], 0.0);
        assert_relative_eq!(thresholds[39], 3.9, epsilon = 1e-6);
        assert!(thresholds.windows(2).all(|w| w[0] < w[1]));
    }

    #[rstest]
    #[case::zero_step(0.0, 1.0, 0.0)]
    #[case::negative_step(0.0, 1.0, -0.1)]
    #[case::empty_range(1.0, 1.0, 0.1)]
    fn test_threshold_range_empty(#[case] start: f64, #[case] stop: f64, #[case] step: f64) {
        assert!(threshold_range(start, stop, step).is_empty());
    }

    #[test]
    fn test_pairwise_squared_distances() {
        let a = array![[1.0f32, 2.0], [0.0, 0.0]];
        let b = array![[1.0f32, 0.0], [3.0, 4.0]];
        let d = pairwise_squared_distances(a.view(), b.view()).unwrap();
        assert_eq!(d.to_vec(), vec![4.0, 25.0]);
    }

    #[test]
    fn test_pairwise_shape_mismatch() {
        let a = Array1::<f32>::zeros(6).into_shape_with_order((2, 3)).unwrap();
        let b = Array1::<f32>::zeros(6).into_shape_with_order((3, 2)).unwrap();
        assert!(matches!(
            pairwise_squared_distances(a.view(), b.view()),
            Err(EvaluationError::ShapeMismatch { .. })
        ));
    }
}
