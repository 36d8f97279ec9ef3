use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::records::{DataVersion, EvaluationMetrics, ModelVersion, Prediction, StatusMessage};
use super::stage::{Stage, State, Variant};
use crate::error::PipelineError;
use crate::simulate;

/// Default token the marker validation rule looks for.
pub const DEFAULT_MARKER: &str = "customer_id";

/// Completion flag and last status line of one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageSlot {
    pub completed: bool,
    pub status: Option<StatusMessage>,
}

/// Proof that a stage passed its precondition check.
///
/// A ticket is only honoured by the pipeline epoch that issued it, so a
/// completion that arrives after a reset is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    stage: Stage,
    epoch: u64,
}

impl Ticket {
    /// Epoch of the pipeline that issued this ticket.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// The result of completing a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The stage completed and the pipeline moved to `state`.
    Advanced { stage: Stage, state: State },
    /// The stage ran but its check failed; the pipeline stays where it was.
    Stalled { stage: Stage, reason: String },
    /// The last stage of a cycling variant completed. Stage state was
    /// cleared for the next run; version lists were kept.
    Cycled { stage: Stage },
}

/// Single authoritative state of a simulated pipeline run.
///
/// All mutation goes through [`begin`](Pipeline::begin) /
/// [`complete`](Pipeline::complete), the two input setters and
/// [`reset`](Pipeline::reset).
#[derive(Debug, Clone, Serialize)]
pub struct Pipeline {
    run_id: String,
    variant: Variant,
    marker: String,
    state: State,
    epoch: u64,
    in_flight: Option<Stage>,
    stages: BTreeMap<Stage, StageSlot>,

    raw_data: String,
    ingested: String,
    validated: String,
    transformed: String,
    data_reference: Option<String>,
    data_versions: Vec<DataVersion>,

    model_id: Option<String>,
    metrics: Option<EvaluationMetrics>,
    current_model: Option<ModelVersion>,
    model_versions: Vec<ModelVersion>,

    endpoint: Option<String>,
    prediction_input: String,
    prediction: Option<Prediction>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Variant::default(), DEFAULT_MARKER)
    }
}

impl Pipeline {
    pub fn new(variant: Variant, marker: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            variant,
            marker: marker.into(),
            state: State::Idle,
            epoch: 0,
            in_flight: None,
            stages: empty_slots(variant),
            raw_data: String::new(),
            ingested: String::new(),
            validated: String::new(),
            transformed: String::new(),
            data_reference: None,
            data_versions: Vec::new(),
            model_id: None,
            metrics: None,
            current_model: None,
            model_versions: Vec::new(),
            endpoint: None,
            prediction_input: String::new(),
            prediction: None,
        }
    }

    /// Replaces the raw data waiting to be ingested.
    ///
    /// Rejected once ingestion has completed; the data is frozen until the
    /// next reset or cycle.
    pub fn set_raw_data(&mut self, data: impl Into<String>) -> Result<(), PipelineError> {
        if self.is_complete(Stage::Ingest) || self.in_flight == Some(Stage::Ingest) {
            return Err(PipelineError::AlreadyCompleted {
                stage: Stage::Ingest,
            });
        }
        self.raw_data = data.into();
        Ok(())
    }

    pub fn set_prediction_input(&mut self, input: impl Into<String>) {
        self.prediction_input = input.into();
    }

    /// Checks `stage`'s precondition and marks it in flight.
    ///
    /// On a failed precondition the stage's status becomes an error message
    /// and nothing else changes.
    pub fn begin(&mut self, stage: Stage) -> Result<Ticket, PipelineError> {
        if !self.variant.contains(stage) {
            return Err(PipelineError::StageNotInVariant {
                stage,
                variant: self.variant,
            });
        }
        if let Some(active) = self.in_flight {
            warn!(%stage, %active, "stage invoked while another is running");
            return Err(PipelineError::StageInFlight {
                requested: stage,
                active,
            });
        }
        if let Err(message) = self.precondition(stage) {
            warn!(%stage, reason = %message, "precondition not met");
            self.set_status(stage, StatusMessage::error(message.clone()));
            return Err(PipelineError::PreconditionNotMet { stage, message });
        }
        if self.is_complete(stage) && !stage.is_repeatable() {
            let err = PipelineError::AlreadyCompleted { stage };
            self.set_status(stage, StatusMessage::error(err.to_string()));
            return Err(err);
        }

        let message = self.progress_message(stage);
        self.set_status(stage, StatusMessage::info(message));
        self.in_flight = Some(stage);
        Ok(Ticket {
            stage,
            epoch: self.epoch,
        })
    }

    /// Applies the effect of a stage whose simulated delay has elapsed.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<Transition, PipelineError> {
        let stage = ticket.stage;
        if ticket.epoch != self.epoch || self.in_flight != Some(stage) {
            warn!(%stage, "discarding stale completion");
            return Err(PipelineError::StaleTicket { stage });
        }
        self.in_flight = None;

        let message = match stage {
            Stage::Ingest => {
                self.ingested = self.raw_data.clone();
                if self.variant == Variant::Ingestion {
                    "Successfully ingested data. Ready for versioning.".to_string()
                } else {
                    "Successfully ingested raw data.".to_string()
                }
            }
            Stage::Validate => {
                let rules = self.variant.validation_rules();
                let verdict = simulate::validate(rules, &self.ingested, &self.marker);
                let message = verdict.message(rules, &self.marker);
                for finding in &verdict.findings {
                    warn!(%stage, "{finding}");
                }
                if !verdict.passed {
                    self.set_status(stage, StatusMessage::error(message.clone()));
                    return Ok(Transition::Stalled {
                        stage,
                        reason: message,
                    });
                }
                self.validated = self.ingested.clone();
                message
            }
            Stage::Transform => {
                self.transformed = simulate::transform(
                    self.variant.transform_style(),
                    &self.validated,
                    &self.marker,
                    now,
                );
                if self.variant == Variant::DataPrep {
                    "Data transformation successful. Data is ready for versioning.".to_string()
                } else {
                    "Data transformation successful.".to_string()
                }
            }
            Stage::VersionData => {
                let version = simulate::data_version(
                    self.variant.data_version_scheme(),
                    self.data_versions.len() + 1,
                    now,
                );
                let message = if self.variant.contains(Stage::Train) {
                    format!("Data version '{}' created.", version.id)
                } else {
                    format!("Data version '{}' created and registered.", version.id)
                };
                self.data_reference = Some(version.reference.clone());
                self.data_versions.push(version);
                message
            }
            Stage::Train => {
                let model_id = simulate::model_id(rng);
                let message = format!("Model '{model_id}' trained successfully.");
                self.model_id = Some(model_id);
                message
            }
            Stage::Evaluate => {
                self.metrics = Some(simulate::evaluation_metrics(rng));
                format!(
                    "Model '{}' evaluated. View metrics below.",
                    self.model_id.as_deref().unwrap_or_default()
                )
            }
            Stage::VersionModel => {
                let model_id = self.model_id.clone().unwrap_or_default();
                let version = ModelVersion {
                    version: format!("v{}", self.model_versions.len() + 1),
                    artifact_uri: simulate::artifact_uri(&model_id),
                    model_id,
                    timestamp: now,
                    metrics: self.metrics.unwrap_or_default(),
                    trained_on_data_version: self.data_reference.clone().unwrap_or_default(),
                };
                let message = format!(
                    "Model '{}' registered as version {}.",
                    version.model_id, version.version
                );
                self.current_model = Some(version.clone());
                self.model_versions.push(version);
                message
            }
            Stage::Deploy => {
                let model_id = self
                    .current_model
                    .as_ref()
                    .map(|m| m.model_id.clone())
                    .unwrap_or_default();
                let endpoint = simulate::endpoint_uri(&model_id, now);
                let message =
                    format!("Model '{model_id}' deployed successfully to endpoint: {endpoint}");
                self.endpoint = Some(endpoint);
                message
            }
            Stage::Predict => {
                self.prediction = Some(simulate::prediction(&self.prediction_input, rng));
                "Prediction received successfully.".to_string()
            }
        };

        info!(run_id = %self.run_id, %stage, "{message}");
        self.set_status(stage, StatusMessage::success(message));
        if let Some(slot) = self.stages.get_mut(&stage) {
            slot.completed = true;
        }
        self.state = stage.completes();

        if self.variant.cycles() && stage == self.variant.last_stage() {
            self.start_next_cycle();
            return Ok(Transition::Cycled { stage });
        }
        Ok(Transition::Advanced {
            stage,
            state: self.state,
        })
    }

    /// Drops a ticket whose stage will never complete.
    ///
    /// Only releases the single-flight slot when the ticket is still
    /// current; the stage's status line is left as it was.
    pub fn abandon(&mut self, ticket: &Ticket) {
        if ticket.epoch == self.epoch && self.in_flight == Some(ticket.stage) {
            warn!(stage = %ticket.stage, "stage abandoned while in flight");
            self.in_flight = None;
        }
    }

    /// Clears every stage, input, artifact and version list.
    ///
    /// Any ticket issued before the reset becomes stale.
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self::new(self.variant, std::mem::take(&mut self.marker));
        self.epoch = epoch;
        info!(run_id = %self.run_id, "Pipeline reset. Ready for a new run.");
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn in_flight(&self) -> Option<Stage> {
        self.in_flight
    }

    pub fn is_complete(&self, stage: Stage) -> bool {
        self.stages.get(&stage).is_some_and(|slot| slot.completed)
    }

    pub fn status(&self, stage: Stage) -> Option<&StatusMessage> {
        self.stages.get(&stage).and_then(|slot| slot.status.as_ref())
    }

    pub fn raw_data(&self) -> &str {
        &self.raw_data
    }

    pub fn transformed(&self) -> &str {
        &self.transformed
    }

    pub fn data_reference(&self) -> Option<&str> {
        self.data_reference.as_deref()
    }

    pub fn data_versions(&self) -> &[DataVersion] {
        &self.data_versions
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    pub fn metrics(&self) -> Option<&EvaluationMetrics> {
        self.metrics.as_ref()
    }

    pub fn current_model(&self) -> Option<&ModelVersion> {
        self.current_model.as_ref()
    }

    pub fn model_versions(&self) -> &[ModelVersion] {
        &self.model_versions
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn prediction_input(&self) -> &str {
        &self.prediction_input
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    /// The predecessor must be complete and the stage's input non-empty.
    fn precondition(&self, stage: Stage) -> Result<(), String> {
        let predecessor_done = self
            .variant
            .predecessor(stage)
            .is_none_or(|prev| self.is_complete(prev));

        let (has_input, message) = match stage {
            Stage::Ingest => (
                !self.raw_data.trim().is_empty(),
                "Please enter some data to ingest.",
            ),
            Stage::Validate => (
                !self.ingested.trim().is_empty(),
                "Please ingest data first.",
            ),
            Stage::Transform => (
                !self.validated.trim().is_empty(),
                "Please validate data first.",
            ),
            Stage::VersionData if self.variant == Variant::Ingestion => (
                !self.ingested.trim().is_empty(),
                "Please ingest data first before versioning.",
            ),
            Stage::VersionData => (
                !self.transformed.trim().is_empty(),
                "Please transform data first before versioning.",
            ),
            Stage::Train => (
                self.data_reference.is_some(),
                "Please version data first to train a model.",
            ),
            Stage::Evaluate => (self.model_id.is_some(), "Please train a model first."),
            Stage::VersionModel => (
                self.metrics.is_some(),
                "Please evaluate the model first.",
            ),
            Stage::Deploy => (
                self.current_model.is_some(),
                "Please version a model first before deployment.",
            ),
            Stage::Predict => (
                self.endpoint.is_some(),
                "Please deploy a model first to make predictions.",
            ),
        };

        if !predecessor_done || !has_input {
            return Err(message.to_string());
        }
        if stage == Stage::Predict && self.prediction_input.trim().is_empty() {
            return Err("Please enter some input data for prediction.".to_string());
        }
        Ok(())
    }

    fn progress_message(&self, stage: Stage) -> String {
        let model_id = self.model_id.as_deref().unwrap_or_default();
        match stage {
            Stage::Ingest => "Simulating data ingestion...".to_string(),
            Stage::Validate => "Performing data validation...".to_string(),
            Stage::Transform => "Performing data transformation...".to_string(),
            Stage::VersionData => "Creating new data version...".to_string(),
            Stage::Train => format!(
                "Initiating model training using data: {}...",
                self.data_reference.as_deref().unwrap_or_default()
            ),
            Stage::Evaluate => format!("Evaluating model '{model_id}'..."),
            Stage::VersionModel => format!("Registering model '{model_id}' as a new version..."),
            Stage::Deploy => format!(
                "Deploying model version '{}' to an endpoint...",
                self.current_model
                    .as_ref()
                    .map(|m| m.version.as_str())
                    .unwrap_or_default()
            ),
            Stage::Predict => format!(
                "Requesting prediction from endpoint: {}...",
                self.endpoint.as_deref().unwrap_or_default()
            ),
        }
    }

    fn set_status(&mut self, stage: Stage, status: StatusMessage) {
        if let Some(slot) = self.stages.get_mut(&stage) {
            slot.status = Some(status);
        }
    }

    /// Keeps version lists and the last stage's status line; clears the rest.
    fn start_next_cycle(&mut self) {
        let last = self.variant.last_stage();
        let last_status = self.status(last).cloned();
        let data_versions = std::mem::take(&mut self.data_versions);
        let model_versions = std::mem::take(&mut self.model_versions);

        let epoch = self.epoch;
        let run_id = std::mem::take(&mut self.run_id);
        *self = Self::new(self.variant, std::mem::take(&mut self.marker));
        self.epoch = epoch;
        self.run_id = run_id;
        self.data_versions = data_versions;
        self.model_versions = model_versions;
        if let Some(status) = last_status {
            self.set_status(last, status);
        }
        info!(run_id = %self.run_id, variant = %self.variant, "cycle finished, ready for the next run");
    }
}

fn empty_slots(variant: Variant) -> BTreeMap<Stage, StageSlot> {
    variant
        .stages()
        .iter()
        .map(|stage| (*stage, StageSlot::default()))
        .collect()
}
