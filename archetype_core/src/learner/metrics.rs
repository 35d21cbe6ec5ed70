//! Held-out evaluation metrics

use serde::Serialize;

/// Fraction of predictions equal to the true label
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth
        .iter()
        .zip(predicted)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / truth.len() as f64
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision, recall and F1 with macro and weighted averages
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    /// Build a report for classes `0..names.len()`; rows are labelled with
    /// `names` in id order. Undefined ratios count as zero.
    pub fn new(truth: &[usize], predicted: &[usize], names: &[&str]) -> Self {
        let k = names.len();
        let mut true_pos = vec![0usize; k];
        let mut predicted_count = vec![0usize; k];
        let mut support = vec![0usize; k];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < k {
                support[t] += 1;
            }
            if p < k {
                predicted_count[p] += 1;
            }
            if t == p && t < k {
                true_pos[t] += 1;
            }
        }

        let classes: Vec<ClassMetrics> = names
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let precision = ratio(true_pos[c], predicted_count[c]);
                let recall = ratio(true_pos[c], support[c]);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: name.to_string(),
                    precision,
                    recall,
                    f1,
                    support: support[c],
                }
            })
            .collect();

        let total: usize = support.iter().sum();
        let average = |label: &str, weight: &dyn Fn(&ClassMetrics) -> f64, norm: f64| {
            let norm = if norm > 0.0 { norm } else { 1.0 };
            ClassMetrics {
                label: label.to_string(),
                precision: classes.iter().map(|m| m.precision * weight(m)).sum::<f64>() / norm,
                recall: classes.iter().map(|m| m.recall * weight(m)).sum::<f64>() / norm,
                f1: classes.iter().map(|m| m.f1 * weight(m)).sum::<f64>() / norm,
                support: total,
            }
        };
        let macro_avg = average("macro avg", &|_| 1.0, k as f64);
        let weighted_avg = average("weighted avg", &|m| m.support as f64, total as f64);

        Self {
            accuracy: accuracy(truth, predicted),
            classes,
            macro_avg,
            weighted_avg,
        }
    }

    /// Fixed-width text rendering with two decimals
    pub fn to_text(&self) -> String {
        let width = self
            .classes
            .iter()
            .map(|m| m.label.chars().count())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        let mut out = format!(
            "{:>width$} {:>9} {:>9} {:>9} {:>9}\n\n",
            "", "precision", "recall", "f1-score", "support"
        );
        let row = |m: &ClassMetrics| {
            format!(
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                m.label, m.precision, m.recall, m.f1, m.support
            )
        };
        for m in &self.classes {
            out.push_str(&row(m));
        }
        out.push('\n');
        out.push_str(&format!(
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}\n",
            "accuracy", "", "", self.accuracy, self.weighted_avg.support
        ));
        out.push_str(&row(&self.macro_avg));
        out.push_str(&row(&self.weighted_avg));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 2, 2], &[0, 1, 1, 2]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_per_class_metrics() {
        let truth = [0, 0, 1, 1, 1, 2];
        let predicted = [0, 1, 1, 1, 0, 2];
        let report = ClassificationReport::new(&truth, &predicted, &["a", "b", "c"]);

        let a = &report.classes[0];
        assert!((a.precision - 0.5).abs() < 1e-12);
        assert!((a.recall - 0.5).abs() < 1e-12);
        assert_eq!(a.support, 2);

        let b = &report.classes[1];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((b.recall - 2.0 / 3.0).abs() < 1e-12);

        let c = &report.classes[2];
        assert_eq!(c.f1, 1.0);
        assert_eq!(report.weighted_avg.support, 6);
        assert!((report.accuracy - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_unpredicted_class_scores_zero() {
        let report = ClassificationReport::new(&[0, 1], &[0, 0], &["a", "b"]);
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].recall, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
    }

    #[test]
    fn test_text_lists_classes_in_id_order() {
        let report = ClassificationReport::new(
            &[0, 1, 2],
            &[0, 1, 2],
            &["Analytical Thinker", "Social Leader", "Creative Adventurer"],
        );
        let text = report.to_text();
        let first = text.find("Analytical Thinker").unwrap();
        let second = text.find("Social Leader").unwrap();
        let third = text.find("Creative Adventurer").unwrap();
        assert!(first < second && second < third);
        assert!(text.contains("precision"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1.00"));
    }
}
