use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Error,
    Warning,
    Success,
    Improvement,
}

impl FeedbackKind {
    /// error above 7, warning above 4, improvement otherwise
    pub fn from_severity(severity: f32) -> Self {
        if severity > 7.0 {
            Self::Error
        } else if severity > 4.0 {
            Self::Warning
        } else {
            Self::Improvement
        }
    }
}

/// Quality dimension a score or feedback item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
    Posture,
    Alignment,
    RangeOfMotion,
    Timing,
    Stability,
}

impl Aspect {
    pub const ALL: [Aspect; 5] = [
        Aspect::Posture,
        Aspect::Alignment,
        Aspect::RangeOfMotion,
        Aspect::Timing,
        Aspect::Stability,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub kind: FeedbackKind,
    pub message: String,
    pub body_part: String,
    /// 0..=10
    pub severity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub aspect: Aspect,
}

impl FeedbackItem {
    /// Item whose kind follows from its severity
    pub fn graded(
        aspect: Aspect,
        body_part: impl Into<String>,
        message: impl Into<String>,
        severity: f32,
        suggestion: Option<String>,
    ) -> Self {
        let severity = severity.clamp(0.0, 10.0);
        Self {
            kind: FeedbackKind::from_severity(severity),
            message: message.into(),
            body_part: body_part.into(),
            severity,
            suggestion,
            aspect,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FeedbackKind::Success,
            message: message.into(),
            body_part: "overall".to_string(),
            severity: 0.0,
            suggestion: None,
            aspect: Aspect::Posture,
        }
    }

    pub fn is_issue(&self) -> bool {
        self.kind != FeedbackKind::Success
    }
}

/// Per-aspect sub-scores for one frame, each 0..=100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectScores {
    pub posture: f32,
    pub alignment: f32,
    pub range_of_motion: f32,
    pub timing: f32,
    pub stability: f32,
}

impl AspectScores {
    pub const ZERO: AspectScores = AspectScores {
        posture: 0.0,
        alignment: 0.0,
        range_of_motion: 0.0,
        timing: 0.0,
        stability: 0.0,
    };

    pub fn get(&self, aspect: Aspect) -> f32 {
        match aspect {
            Aspect::Posture => self.posture,
            Aspect::Alignment => self.alignment,
            Aspect::RangeOfMotion => self.range_of_motion,
            Aspect::Timing => self.timing,
            Aspect::Stability => self.stability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_thresholds() {
        assert_eq!(FeedbackKind::from_severity(7.5), FeedbackKind::Error);
        assert_eq!(FeedbackKind::from_severity(7.0), FeedbackKind::Warning);
        assert_eq!(FeedbackKind::from_severity(4.5), FeedbackKind::Warning);
        assert_eq!(FeedbackKind::from_severity(4.0), FeedbackKind::Improvement);
        assert_eq!(FeedbackKind::from_severity(0.0), FeedbackKind::Improvement);
    }

    #[test]
    fn test_graded_clamps_severity() {
        let item = FeedbackItem::graded(Aspect::Posture, "back", "Leaning", 14.0, None);
        assert_eq!(item.severity, 10.0);
        assert_eq!(item.kind, FeedbackKind::Error);
        assert!(item.is_issue());
        assert!(!FeedbackItem::success("Great form").is_issue());
    }

    #[test]
    fn test_feedback_serializes_snake_case() {
        let item = FeedbackItem::graded(Aspect::RangeOfMotion, "knees", "Go deeper", 2.0, None);
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"kind\":\"improvement\""));
        assert!(json.contains("\"aspect\":\"range_of_motion\""));
        assert!(!json.contains("suggestion"));
    }
}
