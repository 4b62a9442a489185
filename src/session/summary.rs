use serde::{Deserialize, Serialize};

use super::SessionId;

/// End-of-session report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub user_id: String,
    pub exercise_type: String,
    pub duration_ms: u64,
    pub total_reps: u32,
    pub average_score: f32,
    pub consistency_score: f32,
    pub improvement_areas: Vec<String>,
    pub achievements: Vec<String>,
    pub next_session_recommendations: Vec<String>,
}

const MAX_IMPROVEMENT_AREAS: usize = 3;

/// Badges and the thresholds that earn them
const SCORE_BADGES: [(f32, &str); 3] = [
    (90.0, "Excellent form"),
    (80.0, "Great technique"),
    (70.0, "Good effort"),
];
const REP_BADGES: [(u32, &str); 3] = [(50, "Fifty reps"), (20, "Twenty reps"), (10, "Ten reps")];
const CONSISTENCY_BADGE: (f32, &str) = (90.0, "Consistent performer");

const GENERIC_RECOMMENDATION: &str = "Keep practicing at a comfortable pace and focus on controlled movement";

/// Most frequently flagged body parts; ties keep first-seen order
///
/// `counts` is in first-seen order.
pub fn improvement_areas(counts: &[(String, u32)]) -> Vec<String> {
    let mut ranked: Vec<&(String, u32)> = counts.iter().filter(|(_, n)| *n > 0).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(MAX_IMPROVEMENT_AREAS)
        .map(|(part, _)| part.clone())
        .collect()
}

pub fn achievements(average_score: f32, total_reps: u32, consistency: f32, frames: usize) -> Vec<String> {
    let mut earned = Vec::new();
    if frames == 0 {
        return earned;
    }
    if let Some((_, badge)) = SCORE_BADGES.iter().find(|(min, _)| average_score >= *min) {
        earned.push(badge.to_string());
    }
    if let Some((_, badge)) = REP_BADGES.iter().find(|(min, _)| total_reps >= *min) {
        earned.push(badge.to_string());
    }
    if total_reps > 0 && consistency >= CONSISTENCY_BADGE.0 {
        earned.push(CONSISTENCY_BADGE.1.to_string());
    }
    earned
}

fn recommendation_for(body_part: &str) -> Option<&'static str> {
    let text = match body_part {
        "knees" => "Add bodyweight squats with a band above the knees to train knee tracking",
        "hips" => "Practice hip hinges against a wall to groove hip position",
        "back" => "Strengthen your upper back and keep your chest up through the movement",
        "core" => "Add planks and dead bugs to build core stability",
        "elbows" => "Work with lighter weight and keep elbows tucked at about 45 degrees",
        "shoulders" => "Include shoulder mobility drills in your warm-up",
        "balance" => "Add single-side work such as split squats to even out left and right",
        "tempo" => "Use a 2-second lowering count to control tempo",
        "camera" => "Set up the camera so your whole body stays in frame",
        _ => return None,
    };
    Some(text)
}

/// Canned advice for each improvement area, falling back to a generic tip
pub fn next_session_recommendations(areas: &[String]) -> Vec<String> {
    let mut out: Vec<String> = areas
        .iter()
        .filter_map(|area| recommendation_for(area))
        .map(str::to_string)
        .collect();
    if out.is_empty() {
        out.push(GENERIC_RECOMMENDATION.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(items: &[(&str, u32)]) -> Vec<(String, u32)> {
        items.iter().map(|(p, n)| (p.to_string(), *n)).collect()
    }

    #[test]
    fn test_top_three_areas() {
        let areas = improvement_areas(&counts(&[("hips", 2), ("knees", 5), ("core", 2), ("back", 1), ("elbows", 3)]));
        assert_eq!(areas, vec!["knees", "elbows", "hips"]);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let areas = improvement_areas(&counts(&[("core", 1), ("back", 1), ("hips", 1), ("knees", 1)]));
        assert_eq!(areas, vec!["core", "back", "hips"]);
    }

    #[test]
    fn test_achievement_thresholds() {
        let earned = achievements(92.0, 12, 95.0, 40);
        assert_eq!(earned, vec!["Excellent form", "Ten reps", "Consistent performer"]);
        assert!(achievements(50.0, 0, 100.0, 5).is_empty());
        assert!(achievements(0.0, 0, 0.0, 0).is_empty());
    }

    #[test]
    fn test_recommendations_fallback() {
        let recs = next_session_recommendations(&["unknown".to_string()]);
        assert_eq!(recs, vec![GENERIC_RECOMMENDATION.to_string()]);
        let recs = next_session_recommendations(&["knees".to_string(), "core".to_string()]);
        assert_eq!(recs.len(), 2);
    }
}
