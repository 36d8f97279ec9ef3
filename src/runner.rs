use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, watch};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{SimConfig, StageDelays};
use crate::error::PipelineError;
use crate::state_machine::{Pipeline, Stage, Transition};

/// Hooks called around each stage the runner drives.
pub trait StageObserver {
    /// The stage passed its precondition and is now waiting its delay.
    fn started(&mut self, stage: Stage, pipeline: &Pipeline, delay: Duration);
    /// The stage was rejected, cancelled or completed.
    fn finished(
        &mut self,
        stage: Stage,
        result: &Result<Transition, PipelineError>,
        pipeline: &Pipeline,
    );
}

impl StageObserver for () {
    fn started(&mut self, _: Stage, _: &Pipeline, _: Duration) {}
    fn finished(&mut self, _: Stage, _: &Result<Transition, PipelineError>, _: &Pipeline) {}
}

/// What a multi-stage run did before it stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub transitions: Vec<Transition>,
    /// The rejection that ended the run early, if any.
    pub halted: Option<PipelineError>,
}

impl RunReport {
    /// True when the run ended on a failed check or a rejected stage.
    pub fn stopped_early(&self) -> bool {
        self.halted.is_some()
            || matches!(self.transitions.last(), Some(Transition::Stalled { .. }))
    }
}

struct Shared {
    pipeline: Pipeline,
    rng: StdRng,
}

/// Drives a [`Pipeline`] through its stages with simulated delays.
///
/// The pipeline lock is never held while a delay elapses. A reset wakes
/// every waiting stage, which then reports [`PipelineError::Cancelled`].
#[derive(Clone)]
pub struct StageRunner {
    shared: Arc<Mutex<Shared>>,
    delays: StageDelays,
    resets: Arc<watch::Sender<u64>>,
}

impl StageRunner {
    pub fn new(pipeline: Pipeline, delays: StageDelays, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (resets, _) = watch::channel(pipeline.epoch());
        Self {
            shared: Arc::new(Mutex::new(Shared { pipeline, rng })),
            delays,
            resets: Arc::new(resets),
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            Pipeline::new(config.variant, config.marker_token.clone()),
            config.effective_delays(),
            config.seed,
        )
    }

    pub fn delays(&self) -> &StageDelays {
        &self.delays
    }

    pub async fn snapshot(&self) -> Pipeline {
        self.shared.lock().await.pipeline.clone()
    }

    pub async fn set_raw_data(&self, data: impl Into<String>) -> Result<(), PipelineError> {
        self.shared.lock().await.pipeline.set_raw_data(data)
    }

    pub async fn set_prediction_input(&self, input: impl Into<String>) {
        self.shared.lock().await.pipeline.set_prediction_input(input);
    }

    /// Clears the pipeline and cancels any stage still waiting.
    ///
    /// The new epoch is published while the lock is held, so no stage can
    /// begin on the fresh pipeline before the signal goes out.
    pub async fn reset(&self) {
        let mut shared = self.shared.lock().await;
        shared.pipeline.reset();
        self.resets.send_replace(shared.pipeline.epoch());
    }

    /// Runs one stage: precondition check, simulated delay, completion.
    pub async fn run_stage(
        &self,
        stage: Stage,
        observer: &mut impl StageObserver,
    ) -> Result<Transition, PipelineError> {
        let mut reset_signal = self.resets.subscribe();
        let delay = self.delays.for_stage(stage);

        let ticket = {
            let mut shared = self.shared.lock().await;
            match shared.pipeline.begin(stage) {
                Ok(ticket) => {
                    observer.started(stage, &shared.pipeline, delay);
                    ticket
                }
                Err(err) => {
                    let result = Err(err);
                    observer.finished(stage, &result, &shared.pipeline);
                    return result;
                }
            }
        };

        // Only a reset past the ticket's epoch cancels; a signal for the
        // reset this stage already began after is ignored.
        let epoch = ticket.epoch();
        debug!(%stage, epoch, delay_ms = delay.as_millis() as u64, "waiting simulated delay");
        tokio::select! {
            _ = sleep(delay) => {}
            // Drop the watch borrow before touching the pipeline lock.
            _ = async { reset_signal.wait_for(|current| *current > epoch).await.is_ok() } => {
                debug!(%stage, "stage cancelled by reset");
                let result = Err(PipelineError::Cancelled { stage });
                let mut shared = self.shared.lock().await;
                shared.pipeline.abandon(&ticket);
                observer.finished(stage, &result, &shared.pipeline);
                return result;
            }
        }

        let mut guard = self.shared.lock().await;
        let Shared { pipeline, rng } = &mut *guard;
        let result = pipeline.complete(ticket, rng, Utc::now());
        observer.finished(stage, &result, pipeline);
        result
    }

    /// Runs the variant's stages in order until one is rejected or stalls,
    /// or until `until` completes.
    pub async fn run_until(
        &self,
        until: Option<Stage>,
        observer: &mut impl StageObserver,
    ) -> RunReport {
        let variant = self.shared.lock().await.pipeline.variant();
        let mut report = RunReport::default();

        if let Some(stage) = until
            && !variant.contains(stage)
        {
            report.halted = Some(PipelineError::StageNotInVariant { stage, variant });
            return report;
        }

        for &stage in variant.stages() {
            match self.run_stage(stage, observer).await {
                Ok(transition) => {
                    let stalled = matches!(transition, Transition::Stalled { .. });
                    report.transitions.push(transition);
                    if stalled {
                        break;
                    }
                }
                Err(err) => {
                    report.halted = Some(err);
                    break;
                }
            }
            if until == Some(stage) {
                break;
            }
        }

        info!(
            %variant,
            completed = report.transitions.len(),
            stopped_early = report.stopped_early(),
            "pipeline run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{DEFAULT_MARKER, State, Variant};

    fn runner(variant: Variant, delays: StageDelays) -> StageRunner {
        StageRunner::new(Pipeline::new(variant, DEFAULT_MARKER), delays, Some(5))
    }

    /// Delays long enough that a test always observes the stage in flight.
    fn slow() -> StageDelays {
        let mut delays = StageDelays::zero();
        delays.ingest = 60_000;
        delays
    }

    async fn wait_until_in_flight(runner: &StageRunner) {
        while runner.snapshot().await.in_flight().is_none() {
            tokio::task::yield_now().await;
        }
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<Stage>,
        finished: Vec<(Stage, bool)>,
    }

    impl StageObserver for Recorder {
        fn started(&mut self, stage: Stage, pipeline: &Pipeline, _: Duration) {
            assert_eq!(pipeline.in_flight(), Some(stage));
            self.started.push(stage);
        }

        fn finished(
            &mut self,
            stage: Stage,
            result: &Result<Transition, PipelineError>,
            _: &Pipeline,
        ) {
            self.finished.push((stage, result.is_ok()));
        }
    }

    #[tokio::test]
    async fn full_run_reaches_predicted() {
        let runner = runner(Variant::Full, StageDelays::zero());
        runner.set_raw_data("customer_id,name").await.unwrap();
        runner.set_prediction_input("good").await;

        let mut recorder = Recorder::default();
        let report = runner.run_until(None, &mut recorder).await;

        assert!(!report.stopped_early());
        assert_eq!(report.transitions.len(), 9);
        assert_eq!(recorder.started, Stage::ALL.to_vec());
        assert!(recorder.finished.iter().all(|(_, ok)| *ok));
        assert_eq!(runner.snapshot().await.state(), State::Predicted);
    }

    #[tokio::test]
    async fn run_stops_after_requested_stage() {
        let runner = runner(Variant::Full, StageDelays::zero());
        runner.set_raw_data("customer_id").await.unwrap();

        let report = runner.run_until(Some(Stage::Train), &mut ()).await;
        assert_eq!(report.transitions.len(), 5);
        assert_eq!(
            report.transitions.last(),
            Some(&Transition::Advanced {
                stage: Stage::Train,
                state: State::Trained
            })
        );
        assert!(runner.snapshot().await.model_id().is_some());
    }

    #[tokio::test]
    async fn run_stops_when_validation_fails() {
        let runner = runner(Variant::Full, StageDelays::zero());
        runner.set_raw_data("order_id,total").await.unwrap();

        let report = runner.run_until(None, &mut ()).await;
        assert!(report.stopped_early());
        assert!(report.halted.is_none());
        assert!(matches!(
            report.transitions.last(),
            Some(Transition::Stalled { stage: Stage::Validate, .. })
        ));
        assert_eq!(runner.snapshot().await.state(), State::Ingested);
    }

    #[tokio::test]
    async fn run_halts_on_unmet_precondition() {
        let runner = runner(Variant::Full, StageDelays::zero());
        let mut recorder = Recorder::default();
        let report = runner.run_until(None, &mut recorder).await;

        assert!(report.transitions.is_empty());
        assert!(matches!(
            report.halted,
            Some(PipelineError::PreconditionNotMet { stage: Stage::Ingest, .. })
        ));
        assert!(recorder.started.is_empty());
        assert_eq!(recorder.finished, vec![(Stage::Ingest, false)]);
    }

    #[tokio::test]
    async fn until_outside_variant_is_rejected() {
        let runner = runner(Variant::Ingestion, StageDelays::zero());
        let report = runner.run_until(Some(Stage::Deploy), &mut ()).await;
        assert!(matches!(
            report.halted,
            Some(PipelineError::StageNotInVariant { stage: Stage::Deploy, .. })
        ));
    }

    #[tokio::test]
    async fn reset_cancels_waiting_stage() {
        let runner = runner(Variant::Full, slow());
        runner.set_raw_data("customer_id").await.unwrap();

        let background = runner.clone();
        let handle = tokio::spawn(async move { background.run_stage(Stage::Ingest, &mut ()).await });
        wait_until_in_flight(&runner).await;

        runner.reset().await;
        let result = handle.await.unwrap();
        assert_eq!(result, Err(PipelineError::Cancelled { stage: Stage::Ingest }));

        let snapshot = runner.snapshot().await;
        assert_eq!(snapshot.state(), State::Idle);
        assert!(snapshot.in_flight().is_none());
        assert!(!snapshot.is_complete(Stage::Ingest));
    }

    #[tokio::test]
    async fn stage_begun_after_reset_ignores_that_reset_signal() {
        let mut delays = StageDelays::zero();
        delays.ingest = 300;
        let runner = runner(Variant::Full, delays);
        runner.set_raw_data("customer_id").await.unwrap();

        // Hold the lock so the stage subscribes, then queues behind a reset.
        let mut guard = runner.shared.lock().await;
        let background = runner.clone();
        let handle =
            tokio::spawn(async move { background.run_stage(Stage::Ingest, &mut ()).await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        guard.pipeline.reset();
        guard.pipeline.set_raw_data("customer_id").unwrap();
        let epoch = guard.pipeline.epoch();
        drop(guard);

        // The signal for that reset arrives after the stage has begun.
        wait_until_in_flight(&runner).await;
        runner.resets.send_replace(epoch);

        let result = handle.await.unwrap();
        assert_eq!(
            result,
            Ok(Transition::Advanced {
                stage: Stage::Ingest,
                state: State::Ingested
            })
        );
        let snapshot = runner.snapshot().await;
        assert!(snapshot.in_flight().is_none());
        assert!(snapshot.is_complete(Stage::Ingest));
    }

    #[tokio::test]
    async fn stage_can_run_again_after_cancellation() {
        let runner = runner(Variant::Full, slow());
        runner.set_raw_data("customer_id").await.unwrap();

        let background = runner.clone();
        let handle =
            tokio::spawn(async move { background.run_stage(Stage::Ingest, &mut ()).await });
        wait_until_in_flight(&runner).await;
        runner.reset().await;
        assert!(handle.await.unwrap().is_err());

        // The slot is free: the next invocation fails on its precondition,
        // not on a stage stuck in flight.
        let err = runner.run_stage(Stage::Ingest, &mut ()).await.unwrap_err();
        assert!(matches!(err, PipelineError::PreconditionNotMet { .. }));
    }

    #[tokio::test]
    async fn reentrant_invocation_is_rejected() {
        let runner = runner(Variant::Full, slow());
        runner.set_raw_data("customer_id").await.unwrap();

        let background = runner.clone();
        let handle = tokio::spawn(async move { background.run_stage(Stage::Ingest, &mut ()).await });
        wait_until_in_flight(&runner).await;

        let err = runner.run_stage(Stage::Ingest, &mut ()).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::StageInFlight {
                requested: Stage::Ingest,
                active: Stage::Ingest
            }
        );

        runner.reset().await;
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn same_seed_same_artifacts() {
        let mut ids = Vec::new();
        for _ in 0..2 {
            let runner = runner(Variant::ModelRegistry, StageDelays::zero());
            runner.set_raw_data("customer_id").await.unwrap();
            runner.run_until(Some(Stage::Evaluate), &mut ()).await;
            let snapshot = runner.snapshot().await;
            ids.push((
                snapshot.model_id().map(str::to_string),
                snapshot.metrics().copied(),
            ));
        }
        assert_eq!(ids[0], ids[1]);
    }
}
