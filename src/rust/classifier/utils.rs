use std::cmp::Ordering;

use super::error::ClassifierError;
use super::types::{ClassifierInput, DistributionEntry, ImportanceEntry, LabelSet};

/// Fails unless the label set and the classifier agree on the number of classes.
pub(crate) fn verify_compatibility(
    label_count: usize,
    output_size: usize,
) -> Result<(), ClassifierError> {
    if label_count != output_size {
        return Err(ClassifierError::StartupInvariant { label_count, output_size });
    }
    Ok(())
}

/// Index of the highest score; the first one wins on ties.
///
/// NaN never wins against a number; an all-NaN vector picks the first label.
pub(crate) fn argmax_first(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    match best {
        Some((i, _)) => Some(i),
        None if scores.is_empty() => None,
        None => Some(0),
    }
}

/// Pairs every label with its score and sorts by descending score.
///
/// The sort is stable, so equal scores keep label order.
pub(crate) fn rank_distribution(labels: &LabelSet, scores: &[f32]) -> Vec<DistributionEntry> {
    let mut distribution: Vec<DistributionEntry> = labels
        .iter()
        .zip(scores.iter())
        .map(|(label, &score)| DistributionEntry { class_name: label.to_string(), score })
        .collect();
    distribution.sort_by(|a, b| descending(a.score, b.score));
    distribution
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Zips the forms of each sentence with the importance scores of that sentence.
pub(crate) fn align_importance(
    input: &ClassifierInput,
    scores: Vec<Vec<f32>>,
) -> Result<Vec<Vec<ImportanceEntry>>, ClassifierError> {
    if scores.len() != input.len() {
        return Err(ClassifierError::InternalConsistency(format!(
            "Classifier returned importance scores for {} sentences, input has {}",
            scores.len(),
            input.len()
        )));
    }

    input
        .sentences()
        .iter()
        .zip(scores)
        .enumerate()
        .map(|(i, (forms, sentence_scores))| {
            if forms.len() != sentence_scores.len() {
                return Err(ClassifierError::InternalConsistency(format!(
                    "Sentence {} has {} tokens but {} importance scores",
                    i,
                    forms.len(),
                    sentence_scores.len()
                )));
            }
            Ok(forms
                .iter()
                .zip(sentence_scores)
                .map(|(form, score)| ImportanceEntry { token: form.clone(), score })
                .collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard() {
        assert!(verify_compatibility(3, 3).is_ok());
        assert!(matches!(
            verify_compatibility(3, 4),
            Err(ClassifierError::StartupInvariant { label_count: 3, output_size: 4 })
        ));
    }

    #[test]
    fn test_argmax_first_wins_on_ties() {
        assert_eq!(argmax_first(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax_first(&[0.4, 0.4, 0.2]), Some(0));
        assert_eq!(argmax_first(&[0.2, 0.5, 0.5]), Some(1));
        assert_eq!(argmax_first(&[]), None);
    }

    #[test]
    fn test_argmax_skips_nan() {
        assert_eq!(argmax_first(&[f32::NAN, 0.1, 0.3]), Some(2));
        assert_eq!(argmax_first(&[0.3, f32::NAN, 0.1]), Some(0));
    }

    #[test]
    fn test_rank_distribution_is_stable() {
        let labels = LabelSet::new(vec!["A", "B", "C", "D"]).unwrap();
        let ranked = rank_distribution(&labels, &[0.2, 0.4, 0.2, 0.1]);
        let names: Vec<&str> = ranked.iter().map(|e| e.class_name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn test_align_importance() {
        let input = ClassifierInput::from(vec![
            vec!["a".to_string(), "rose".to_string()],
            vec![],
        ]);
        let aligned = align_importance(&input, vec![vec![0.25, 0.75], vec![]]).unwrap();
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0][1], ImportanceEntry { token: "rose".into(), score: 0.75 });
        assert!(aligned[1].is_empty());
    }

    #[test]
    fn test_align_importance_mismatch() {
        let input = ClassifierInput::from(vec![vec!["a".to_string(), "rose".to_string()]]);
        assert!(matches!(
            align_importance(&input, vec![vec![0.5]]),
            Err(ClassifierError::InternalConsistency(_))
        ));
        assert!(matches!(
            align_importance(&input, vec![vec![0.5, 0.5], vec![]]),
            Err(ClassifierError::InternalConsistency(_))
        ));
    }
}
