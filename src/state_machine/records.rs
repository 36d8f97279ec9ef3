use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tone of a stage status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusKind {
    /// The stage is running.
    Info,
    Success,
    /// Precondition not met, or a validation check failed.
    Error,
}

/// The status line a stage shows after its last invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Metadata registered for a dataset snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVersion {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Placeholder for the dataset location; nothing is stored there.
    pub reference: String,
    pub description: String,
}

/// Fabricated evaluation scores, each rounded to three decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub roc_auc: f64,
}

/// Registry entry for an evaluated model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// `v1`, `v2`, …
    pub version: String,
    pub model_id: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: EvaluationMetrics,
    pub trained_on_data_version: String,
    pub artifact_uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionClass {
    Positive,
    Negative,
}

impl fmt::Display for PredictionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionClass::Positive => write!(f, "Positive"),
            PredictionClass::Negative => write!(f, "Negative"),
        }
    }
}

/// Result returned by the simulated endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub score: f64,
    pub class: PredictionClass,
}

impl Prediction {
    /// Scores above 0.5 are positive.
    pub fn from_score(score: f64) -> Self {
        let class = if score > 0.5 {
            PredictionClass::Positive
        } else {
            PredictionClass::Negative
        };
        Self { score, class }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Prediction: {{ \"score\": {:.2}, \"class\": \"{}\" }}",
            self.score, self.class
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_class_threshold() {
        assert_eq!(Prediction::from_score(0.51).class, PredictionClass::Positive);
        assert_eq!(Prediction::from_score(0.5).class, PredictionClass::Negative);
        assert_eq!(Prediction::from_score(0.12).class, PredictionClass::Negative);
    }

    #[test]
    fn prediction_display() {
        let p = Prediction::from_score(0.8);
        assert_eq!(
            p.to_string(),
            "Prediction: { \"score\": 0.80, \"class\": \"Positive\" }"
        );
    }

    #[test]
    fn status_constructors_set_kind() {
        assert_eq!(StatusMessage::info("x").kind, StatusKind::Info);
        assert_eq!(StatusMessage::success("x").kind, StatusKind::Success);
        let err = StatusMessage::error("Please ingest data first.");
        assert_eq!(err.kind, StatusKind::Error);
        assert_eq!(err.to_string(), "Please ingest data first.");
    }
}
