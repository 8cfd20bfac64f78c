use serde::Serialize;

/// Test-set quality summary. F1, precision and recall are support-weighted
/// averages over classes, so class imbalance is reflected in the aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Compute accuracy and support-weighted precision/recall/F1.
///
/// A class with no predicted positives contributes precision 0, and a class
/// with no true members contributes recall 0 (and weight 0, so it drops out
/// of the averages entirely). Classes absent from `y_true` therefore never
/// poison the aggregate with NaN.
pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    num_classes: usize,
) -> ClassificationReport {
    assert_eq!(y_true.len(), y_pred.len(), "label/prediction length mismatch");

    let total = y_true.len();
    if total == 0 {
        return ClassificationReport {
            accuracy: 0.0,
            f1: 0.0,
            precision: 0.0,
            recall: 0.0,
        };
    }

    let mut tp = vec![0usize; num_classes];
    let mut fp = vec![0usize; num_classes];
    let mut fn_ = vec![0usize; num_classes];
    let mut correct = 0usize;

    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t == p {
            correct += 1;
            tp[t] += 1;
        } else {
            fp[p] += 1;
            fn_[t] += 1;
        }
    }

    let mut precision = 0.0f64;
    let mut recall = 0.0f64;
    let mut f1 = 0.0f64;
    for c in 0..num_classes {
        let support = tp[c] + fn_[c];
        if support == 0 {
            continue;
        }
        let weight = support as f64 / total as f64;
        let predicted = tp[c] + fp[c];
        let p = if predicted == 0 {
            0.0
        } else {
            tp[c] as f64 / predicted as f64
        };
        let r = tp[c] as f64 / support as f64;
        let f = if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        };
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    ClassificationReport {
        accuracy: correct as f64 / total as f64,
        f1,
        precision,
        recall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let labels = [0, 1, 2, 1, 0];
        let report = classification_report(&labels, &labels, 3);
        assert!((report.accuracy - 1.0).abs() < 1e-12);
        assert!((report.f1 - 1.0).abs() < 1e-12);
        assert!((report.precision - 1.0).abs() < 1e-12);
        assert!((report.recall - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weighted_binary_example() {
        // true:  [0, 0, 0, 1]   pred: [0, 0, 1, 1]
        // class 0: tp=2 fp=0 fn=1 -> p=1, r=2/3, f1=0.8, weight 3/4
        // class 1: tp=1 fp=1 fn=0 -> p=1/2, r=1, f1=2/3, weight 1/4
        let report = classification_report(&[0, 0, 0, 1], &[0, 0, 1, 1], 2);
        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert!((report.precision - (0.75 * 1.0 + 0.25 * 0.5)).abs() < 1e-12);
        assert!((report.recall - (0.75 * (2.0 / 3.0) + 0.25 * 1.0)).abs() < 1e-12);
        assert!((report.f1 - (0.75 * 0.8 + 0.25 * (2.0 / 3.0))).abs() < 1e-12);
    }

    #[test]
    fn never_predicted_class_scores_zero_precision() {
        // Class 1 exists in the labels but is never predicted.
        let report = classification_report(&[0, 1], &[0, 0], 2);
        assert!((report.accuracy - 0.5).abs() < 1e-12);
        // class 0: p=1/2 r=1 weight 1/2; class 1: p=0 r=0 weight 1/2
        assert!((report.precision - 0.25).abs() < 1e-12);
        assert!((report.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn absent_class_carries_no_weight() {
        // num_classes = 10 but only classes 0 and 1 appear; the other eight
        // must not drag the averages down.
        let report = classification_report(&[0, 1, 0, 1], &[0, 1, 0, 1], 10);
        assert!((report.f1 - 1.0).abs() < 1e-12);
    }
}
