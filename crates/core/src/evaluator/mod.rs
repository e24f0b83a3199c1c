pub mod bespoke;
pub mod error;

use crate::evaluator::error::EvaluatorError;
use serde::Serialize;

#[async_trait::async_trait]
pub trait AccuracyEvaluator: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Provider-defined score, roughly 0..=100, higher is more accurate.
    async fn evaluate(&self, text: &str) -> Result<f64, EvaluatorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyLabel {
    High,
    Moderate,
    Low,
}

impl AccuracyLabel {
    pub const HIGH_THRESHOLD: f64 = 90.0;
    pub const MODERATE_THRESHOLD: f64 = 70.0;

    /// Thresholds are exclusive: exactly 90 is moderate, exactly 70 is low.
    pub fn from_score(score: f64) -> Self {
        if score > Self::HIGH_THRESHOLD {
            Self::High
        } else if score > Self::MODERATE_THRESHOLD {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::High => "The newsletter is highly accurate and reliable!",
            Self::Moderate => "The newsletter is moderately accurate. Verify critical details.",
            Self::Low => "The newsletter has a low accuracy score. Consider reviewing the content.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccuracyOutcome {
    Scored { score: f64, label: AccuracyLabel },
    Unavailable { reason: String },
}

impl AccuracyOutcome {
    pub fn from_result(result: &Result<f64, EvaluatorError>) -> Self {
        match result {
            Ok(score) => Self::Scored {
                score: *score,
                label: AccuracyLabel::from_score(*score),
            },
            Err(err) => Self::Unavailable {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_strict_thresholds() {
        assert_eq!(AccuracyLabel::from_score(95.0), AccuracyLabel::High);
        assert_eq!(AccuracyLabel::from_score(80.0), AccuracyLabel::Moderate);
        assert_eq!(AccuracyLabel::from_score(50.0), AccuracyLabel::Low);
        assert_eq!(AccuracyLabel::from_score(90.0), AccuracyLabel::Moderate);
        assert_eq!(AccuracyLabel::from_score(70.0), AccuracyLabel::Low);
        assert_eq!(AccuracyLabel::from_score(90.01), AccuracyLabel::High);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let scored = AccuracyOutcome::from_result(&Ok(95.0));
        let v = serde_json::to_value(&scored).unwrap();
        assert_eq!(v["status"], "scored");
        assert_eq!(v["label"], "high");

        let unavailable =
            AccuracyOutcome::from_result(&Err(EvaluatorError::Parse("missing".to_string())));
        let v = serde_json::to_value(&unavailable).unwrap();
        assert_eq!(v["status"], "unavailable");
    }
}
