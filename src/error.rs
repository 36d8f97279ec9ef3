use thiserror::Error;

use crate::state_machine::{Stage, Variant};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Why a stage invocation or completion was refused.
///
/// `PreconditionNotMet` is the only kind a user normally sees; its message is
/// also written to the stage's status line. The other variants guard the
/// single-flight and reset rules of the runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("{message}")]
    PreconditionNotMet { stage: Stage, message: String },

    #[error("'{stage}' has already completed.")]
    AlreadyCompleted { stage: Stage },

    #[error("'{active}' is still running; '{requested}' must wait.")]
    StageInFlight { requested: Stage, active: Stage },

    #[error("Completion for '{stage}' predates the last reset and was discarded.")]
    StaleTicket { stage: Stage },

    #[error("'{stage}' is not part of the {variant} pipeline.")]
    StageNotInVariant { stage: Stage, variant: Variant },

    #[error("'{stage}' was cancelled by a pipeline reset.")]
    Cancelled { stage: Stage },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::PreconditionNotMet { stage, .. }
            | PipelineError::AlreadyCompleted { stage }
            | PipelineError::StaleTicket { stage }
            | PipelineError::StageNotInVariant { stage, .. }
            | PipelineError::Cancelled { stage } => *stage,
            PipelineError::StageInFlight { requested, .. } => *requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_error_displays_plain_message() {
        let err = PipelineError::PreconditionNotMet {
            stage: Stage::Train,
            message: "Please version data first to train a model.".into(),
        };
        assert_eq!(err.to_string(), "Please version data first to train a model.");
        assert_eq!(err.stage(), Stage::Train);
    }

    #[test]
    fn guard_errors_name_their_stages() {
        let err = PipelineError::StageInFlight {
            requested: Stage::Validate,
            active: Stage::Ingest,
        };
        assert_eq!(err.to_string(), "'ingest' is still running; 'validate' must wait.");
        assert_eq!(err.stage(), Stage::Validate);

        let err = PipelineError::StageNotInVariant {
            stage: Stage::Deploy,
            variant: Variant::DataPrep,
        };
        assert_eq!(err.to_string(), "'deploy' is not part of the data-prep pipeline.");
    }

    #[test]
    fn sim_error_wraps_toml() {
        let err: SimError = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(err.to_string().starts_with("TOML parse error"));
    }
}
