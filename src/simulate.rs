//! Stand-ins for the external services each stage pretends to call.
//!
//! Nothing here touches storage, a warehouse, a registry or a network. Every
//! function fabricates the artifact a real service would have produced, so
//! the pipeline has something plausible to pass to the next stage.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::state_machine::{DataVersion, EvaluationMetrics, Prediction};

/// Prefix required by the schema rules for data that is not comma-separated.
const HEADERLESS_PREFIX: &str = "HDR_";

const ENDPOINT_BASE: &str =
    "https://us-central1-aiplatform.googleapis.com/v1/projects/my-project/locations/us-central1/endpoints";

/// How the validation stage decides pass or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRules {
    /// Pass iff the data contains the marker token.
    Marker,
    /// Empty data fails. Comma-separated data without the marker only warns.
    /// Data without commas must start with `HDR_`.
    Schema,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    /// Errors and warnings, in the order the rules ran.
    pub findings: Vec<String>,
}

impl Verdict {
    /// Status line for this verdict under the given rules.
    pub fn message(&self, rules: ValidationRules, marker: &str) -> String {
        match (rules, self.passed) {
            (ValidationRules::Marker, true) => "Data validation successful.".to_string(),
            (ValidationRules::Marker, false) => {
                format!("Data validation failed (missing \"{marker}\").")
            }
            (ValidationRules::Schema, true) => {
                "Data validation successful. Data is ready for transformation.".to_string()
            }
            (ValidationRules::Schema, false) => {
                format!("Data validation failed: {}", self.findings.join(" "))
            }
        }
    }
}

pub fn validate(rules: ValidationRules, data: &str, marker: &str) -> Verdict {
    match rules {
        ValidationRules::Marker => {
            let passed = data.contains(marker);
            let findings = if passed {
                Vec::new()
            } else {
                vec![format!("Validation Error: '{marker}' not found.")]
            };
            Verdict { passed, findings }
        }
        ValidationRules::Schema => {
            let mut findings = Vec::new();
            let mut passed = true;
            let is_csv = data.contains(',');

            if data.is_empty() {
                findings.push("Validation Error: Data is empty.".to_string());
                passed = false;
            }
            if is_csv && !data.contains(marker) {
                findings.push(format!(
                    "Validation Warning: '{marker}' column not found (expected for CSV)."
                ));
            }
            if !is_csv && !data.starts_with(HEADERLESS_PREFIX) {
                findings.push(format!(
                    "Validation Error: Data does not start with '{HEADERLESS_PREFIX}' (required for headerless data)."
                ));
                passed = false;
            }
            Verdict { passed, findings }
        }
    }
}

/// How the transformation stage rewrites its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStyle {
    /// Uppercase and append a processing timestamp.
    Suffix,
    /// Uppercase and stamp each CSV row; non-CSV payloads are wrapped.
    Csv,
}

pub fn transform(style: TransformStyle, data: &str, marker: &str, now: DateTime<Utc>) -> String {
    let ts = now.to_rfc3339();
    let upper = data.to_uppercase();
    match style {
        TransformStyle::Suffix => format!("{upper}|PROCESSED_TS:{ts}"),
        TransformStyle::Csv if upper.contains(',') => {
            let header_marker = marker.to_uppercase();
            upper
                .split('\n')
                .enumerate()
                .map(|(idx, line)| {
                    if idx == 0 && line.contains(&header_marker) {
                        format!("{line},PROCESSED_TIMESTAMP")
                    } else if !line.trim().is_empty() {
                        format!("{line},{ts}")
                    } else {
                        line.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        TransformStyle::Csv => format!("PROCESSED_DATA: {upper} | TS:{ts}"),
    }
}

/// Id, reference and description format for data versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataVersionScheme {
    /// `v{n}-{millis}`, raw ingested snapshot.
    RawSnapshot,
    /// `v{n}-{millis}`, snapshot after validation and transformation.
    PreparedSnapshot,
    /// `data-v{n}-{millis}`, stored under a bucket-style reference.
    Warehouse,
}

/// Builds the `number`th data version record (1-based).
pub fn data_version(scheme: DataVersionScheme, number: usize, now: DateTime<Utc>) -> DataVersion {
    let millis = now.timestamp_millis();
    let date = now.format("%Y-%m-%d");
    let (id, reference, description) = match scheme {
        DataVersionScheme::RawSnapshot => {
            let id = format!("v{number}-{millis}");
            let reference = format!("Simulated data snapshot for {id}");
            (id, reference, format!("Data version created on {date}"))
        }
        DataVersionScheme::PreparedSnapshot => {
            let id = format!("v{number}-{millis}");
            let reference = format!("Simulated snapshot of transformed data for {id}");
            let description = format!(
                "Data version created on {date} after ingestion, validation, and transformation."
            );
            (id, reference, description)
        }
        DataVersionScheme::Warehouse => {
            let id = format!("data-v{number}-{millis}");
            let reference = format!("gs://my-datasets/processed_data_{id}.csv");
            (id, reference, "Transformed data snapshot.".to_string())
        }
    };
    DataVersion {
        id,
        timestamp: now,
        reference,
        description,
    }
}

/// `model-` followed by four random digits.
pub fn model_id(rng: &mut impl Rng) -> String {
    format!("model-{:04}", rng.gen_range(0..10_000u32))
}

pub fn evaluation_metrics(rng: &mut impl Rng) -> EvaluationMetrics {
    EvaluationMetrics {
        accuracy: round_to(rng.gen_range(0.85..0.95), 3),
        precision: round_to(rng.gen_range(0.78..0.93), 3),
        recall: round_to(rng.gen_range(0.80..0.90), 3),
        f1_score: round_to(rng.gen_range(0.82..0.92), 3),
        roc_auc: round_to(rng.gen_range(0.90..0.95), 3),
    }
}

pub fn artifact_uri(model_id: &str) -> String {
    format!("gs://my-model-repo/{model_id}/model_artifact.tf")
}

pub fn endpoint_uri(model_id: &str, now: DateTime<Utc>) -> String {
    let digits = model_id.strip_prefix("model-").unwrap_or(model_id);
    let millis = now.timestamp_millis().to_string();
    let suffix = &millis[millis.len().saturating_sub(4)..];
    format!("{ENDPOINT_BASE}/predict-{digits}-{suffix}:predict")
}

/// Keyword-driven fake inference. Positive keywords win over negative ones.
pub fn prediction(input: &str, rng: &mut impl Rng) -> Prediction {
    let lower = input.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let score = if has_any(&["good", "positive", "happy"]) {
        rng.gen_range(0.70..1.00)
    } else if has_any(&["bad", "negative", "unhappy"]) {
        rng.gen_range(0.10..0.30)
    } else {
        rng.gen_range(0.40..0.60)
    };
    Prediction::from_score(round_to(score, 2))
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
