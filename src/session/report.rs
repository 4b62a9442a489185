//! Running analysis over a session's frame history

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::scoring::{Aspect, FeedbackKind};

use super::FrameResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn from_severity(severity: f32) -> Self {
        if severity > 7.0 {
            Priority::High
        } else if severity > 4.0 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub message: String,
    pub body_part: String,
    pub severity: f32,
    pub priority: Priority,
}

/// Mean sub-score and distinct issues for one aspect
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AspectAnalysis {
    pub score: f32,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RepetitionAnalysis {
    pub total_reps: u32,
    pub quality_reps: u32,
    pub consistency_score: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameAnalysisResponse {
    pub overall_score: f32,
    pub recommendations: Vec<String>,
    pub corrections: Vec<Correction>,
    pub safety_warnings: Vec<String>,
    pub analysis: BTreeMap<Aspect, AspectAnalysis>,
    pub repetition_analysis: RepetitionAnalysis,
}

/// Severity above which an error item is also a safety warning
const SAFETY_SEVERITY: f32 = 7.0;

/// `max(0, 100 - 2 * stddev)` of the scores; 0 when there are none
pub fn consistency_score(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }
    let n = scores.len() as f32;
    let mean = scores.iter().sum::<f32>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    (100.0 - 2.0 * variance.sqrt()).clamp(0.0, 100.0)
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Builds the running analysis from the retained history
///
/// `rep_scores` holds one mean score per completed rep; when empty, quality
/// is judged per frame instead.
pub fn aggregate(
    history: &[FrameResult],
    rep_scores: &[f32],
    total_reps: u32,
    quality_threshold: f32,
) -> FrameAnalysisResponse {
    let frame_scores: Vec<f32> = history.iter().map(|r| r.form_score).collect();
    let overall_score = mean(frame_scores.iter().copied());

    let mut recommendations = Vec::new();
    let mut seen_suggestions = HashSet::new();
    let mut safety_warnings = Vec::new();
    let mut seen_warnings = HashSet::new();
    // message -> index into corrections
    let mut correction_index: HashMap<String, usize> = HashMap::new();
    let mut corrections: Vec<Correction> = Vec::new();
    let mut aspect_messages: BTreeMap<Aspect, Vec<String>> = BTreeMap::new();

    for item in history.iter().flat_map(|r| r.feedback.iter()) {
        if let Some(suggestion) = &item.suggestion {
            if seen_suggestions.insert(suggestion.as_str()) {
                recommendations.push(suggestion.clone());
            }
        }
        if item.kind == FeedbackKind::Success {
            continue;
        }

        match correction_index.get(&item.message) {
            Some(&i) => {
                let existing = &mut corrections[i];
                if item.severity > existing.severity {
                    existing.severity = item.severity;
                    existing.priority = Priority::from_severity(item.severity);
                }
            }
            None => {
                correction_index.insert(item.message.clone(), corrections.len());
                corrections.push(Correction {
                    message: item.message.clone(),
                    body_part: item.body_part.clone(),
                    severity: item.severity,
                    priority: Priority::from_severity(item.severity),
                });
                aspect_messages.entry(item.aspect).or_default().push(item.message.clone());
            }
        }

        if item.kind == FeedbackKind::Error
            && item.severity > SAFETY_SEVERITY
            && seen_warnings.insert(item.message.as_str())
        {
            safety_warnings.push(item.message.clone());
        }
    }
    // stable: equal severities keep first-seen order
    corrections.sort_by(|a, b| b.severity.total_cmp(&a.severity));

    let analysis = Aspect::ALL
        .iter()
        .map(|&aspect| {
            let entry = AspectAnalysis {
                score: mean(history.iter().map(|r| r.aspects.get(aspect))),
                messages: aspect_messages.remove(&aspect).unwrap_or_default(),
            };
            (aspect, entry)
        })
        .collect();

    let quality_reps = if rep_scores.is_empty() {
        frame_scores.iter().filter(|&&s| s >= quality_threshold).count()
    } else {
        rep_scores.iter().filter(|&&s| s >= quality_threshold).count()
    };

    FrameAnalysisResponse {
        overall_score,
        recommendations,
        corrections,
        safety_warnings,
        analysis,
        repetition_analysis: RepetitionAnalysis {
            total_reps,
            quality_reps: quality_reps as u32,
            consistency_score: consistency_score(&frame_scores),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Phase;
    use crate::pose::Pose;
    use crate::scoring::{AspectScores, FeedbackItem};

    fn approx_eq_f32(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    fn frame(score: f32, feedback: Vec<FeedbackItem>) -> FrameResult {
        FrameResult {
            pose: Pose::default(),
            confidence: 90.0,
            timestamp_ms: 0,
            exercise_type: "squat".to_string(),
            form_score: score,
            aspects: AspectScores::ZERO,
            feedback,
            rep_count: 0,
            phase: Phase::Preparation,
            from_cache: false,
        }
    }

    fn issue(aspect: Aspect, part: &str, message: &str, severity: f32) -> FeedbackItem {
        FeedbackItem::graded(aspect, part, message, severity, Some(format!("fix {part}")))
    }

    #[test]
    fn test_consistency_equal_scores() {
        assert_eq!(consistency_score(&[80.0; 6]), 100.0);
        assert_eq!(consistency_score(&[]), 0.0);
    }

    #[test]
    fn test_consistency_lower_for_variance() {
        let tight = consistency_score(&[78.0, 80.0, 82.0]);
        let loose = consistency_score(&[50.0, 80.0, 100.0]);
        assert!(tight < 100.0);
        assert!(loose < tight);
        assert_eq!(consistency_score(&[0.0, 100.0]), 0.0);
    }

    #[test]
    fn test_empty_history() {
        let report = aggregate(&[], &[], 0, 75.0);
        assert_eq!(report.overall_score, 0.0);
        assert_eq!(report.repetition_analysis.quality_reps, 0);
        assert_eq!(report.analysis.len(), Aspect::ALL.len());
    }

    #[test]
    fn test_overall_is_mean() {
        let history = vec![frame(60.0, vec![]), frame(80.0, vec![]), frame(100.0, vec![])];
        let report = aggregate(&history, &[], 0, 75.0);
        assert!(approx_eq_f32(report.overall_score, 80.0, 1e-4));
        assert_eq!(report.repetition_analysis.quality_reps, 2);
    }

    #[test]
    fn test_rep_scores_take_precedence() {
        let history = vec![frame(90.0, vec![]), frame(90.0, vec![])];
        let report = aggregate(&history, &[60.0, 80.0, 40.0], 3, 75.0);
        assert_eq!(report.repetition_analysis.quality_reps, 1);
        assert_eq!(report.repetition_analysis.total_reps, 3);
    }

    #[test]
    fn test_corrections_deduplicated_and_sorted() {
        let history = vec![
            frame(50.0, vec![issue(Aspect::Posture, "hips", "hips low", 3.0)]),
            frame(
                40.0,
                vec![
                    issue(Aspect::RangeOfMotion, "knees", "knees deep", 9.0),
                    issue(Aspect::Posture, "hips", "hips low", 5.0),
                ],
            ),
        ];
        let report = aggregate(&history, &[], 0, 75.0);
        assert_eq!(report.corrections.len(), 2);
        assert_eq!(report.corrections[0].message, "knees deep");
        assert_eq!(report.corrections[0].priority, Priority::High);
        // duplicate keeps its highest severity
        assert_eq!(report.corrections[1].severity, 5.0);
        assert_eq!(report.corrections[1].priority, Priority::Medium);
        assert_eq!(report.recommendations, vec!["fix hips", "fix knees"]);
        assert_eq!(report.safety_warnings, vec!["knees deep"]);
        assert_eq!(report.analysis[&Aspect::Posture].messages, vec!["hips low"]);
    }

    #[test]
    fn test_success_items_are_not_corrections() {
        let history = vec![frame(95.0, vec![FeedbackItem::success("nice")])];
        let report = aggregate(&history, &[], 0, 75.0);
        assert!(report.corrections.is_empty());
        assert!(report.safety_warnings.is_empty());
    }
}
