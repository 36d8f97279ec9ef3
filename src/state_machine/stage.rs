use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::simulate::{DataVersionScheme, TransformStyle, ValidationRules};

/// One step of the simulated pipeline, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Validate,
    Transform,
    VersionData,
    Train,
    Evaluate,
    VersionModel,
    Deploy,
    Predict,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Ingest,
        Stage::Validate,
        Stage::Transform,
        Stage::VersionData,
        Stage::Train,
        Stage::Evaluate,
        Stage::VersionModel,
        Stage::Deploy,
        Stage::Predict,
    ];

    /// The state the pipeline reaches when this stage completes.
    pub fn completes(self) -> State {
        match self {
            Stage::Ingest => State::Ingested,
            Stage::Validate => State::Validated,
            Stage::Transform => State::Transformed,
            Stage::VersionData => State::Versioned,
            Stage::Train => State::Trained,
            Stage::Evaluate => State::Evaluated,
            Stage::VersionModel => State::ModelVersioned,
            Stage::Deploy => State::Deployed,
            Stage::Predict => State::Predicted,
        }
    }

    /// Command word used by the shell and the CLI.
    pub fn command(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Validate => "validate",
            Stage::Transform => "transform",
            Stage::VersionData => "version-data",
            Stage::Train => "train",
            Stage::Evaluate => "evaluate",
            Stage::VersionModel => "version-model",
            Stage::Deploy => "deploy",
            Stage::Predict => "predict",
        }
    }

    /// Human-readable title shown in tables and summaries.
    pub fn title(self) -> &'static str {
        match self {
            Stage::Ingest => "Ingest Raw Data",
            Stage::Validate => "Validate Data",
            Stage::Transform => "Transform Data",
            Stage::VersionData => "Version Data",
            Stage::Train => "Train Model",
            Stage::Evaluate => "Evaluate Model",
            Stage::VersionModel => "Version Model",
            Stage::Deploy => "Deploy Model",
            Stage::Predict => "Predict",
        }
    }

    /// Only prediction can run again once complete; every other stage
    /// waits for a reset (or a variant cycle).
    pub fn is_repeatable(self) -> bool {
        matches!(self, Stage::Predict)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

impl FromStr for Stage {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.command() == normalized)
            .ok_or_else(|| SimError::UnknownStage(s.to_string()))
    }
}

/// Linear pipeline states: IDLE → INGESTED → … → PREDICTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum State {
    Idle,
    Ingested,
    Validated,
    Transformed,
    Versioned,
    Trained,
    Evaluated,
    ModelVersioned,
    Deployed,
    Predicted,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "IDLE"),
            State::Ingested => write!(f, "INGESTED"),
            State::Validated => write!(f, "VALIDATED"),
            State::Transformed => write!(f, "TRANSFORMED"),
            State::Versioned => write!(f, "VERSIONED"),
            State::Trained => write!(f, "TRAINED"),
            State::Evaluated => write!(f, "EVALUATED"),
            State::ModelVersioned => write!(f, "MODEL_VERSIONED"),
            State::Deployed => write!(f, "DEPLOYED"),
            State::Predicted => write!(f, "PREDICTED"),
        }
    }
}

/// Which flavour of the demo pipeline to run.
///
/// The shorter variants cycle: once their last stage completes, stage state
/// is cleared (version lists are kept) so a new run can start. `Full` never
/// cycles and is only cleared by an explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Ingest, then version.
    Ingestion,
    /// Ingest, validate, transform, version.
    DataPrep,
    /// Data preparation followed by training, evaluation and model versioning.
    ModelRegistry,
    /// Every stage through deployment and prediction.
    #[default]
    Full,
}

impl Variant {
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Variant::Ingestion => &[Stage::Ingest, Stage::VersionData],
            Variant::DataPrep => &Stage::ALL[..4],
            Variant::ModelRegistry => &Stage::ALL[..7],
            Variant::Full => &Stage::ALL,
        }
    }

    pub fn contains(self, stage: Stage) -> bool {
        self.stages().contains(&stage)
    }

    /// The stage that must be complete before `stage` may run.
    pub fn predecessor(self, stage: Stage) -> Option<Stage> {
        let stages = self.stages();
        let idx = stages.iter().position(|s| *s == stage)?;
        idx.checked_sub(1).map(|i| stages[i])
    }

    pub fn last_stage(self) -> Stage {
        let stages = self.stages();
        stages[stages.len() - 1]
    }

    pub fn cycles(self) -> bool {
        !matches!(self, Variant::Full)
    }

    pub fn validation_rules(self) -> ValidationRules {
        match self {
            Variant::DataPrep => ValidationRules::Schema,
            _ => ValidationRules::Marker,
        }
    }

    pub fn transform_style(self) -> TransformStyle {
        match self {
            Variant::DataPrep => TransformStyle::Csv,
            _ => TransformStyle::Suffix,
        }
    }

    pub fn data_version_scheme(self) -> DataVersionScheme {
        match self {
            Variant::Ingestion => DataVersionScheme::RawSnapshot,
            Variant::DataPrep => DataVersionScheme::PreparedSnapshot,
            Variant::ModelRegistry | Variant::Full => DataVersionScheme::Warehouse,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Ingestion => write!(f, "ingestion"),
            Variant::DataPrep => write!(f, "data-prep"),
            Variant::ModelRegistry => write!(f, "model-registry"),
            Variant::Full => write!(f, "full"),
        }
    }
}
