//! Workflow engine for executing step workflows.

use crate::definition::{Route, StepDefinition, Target};
use crate::workflow::WorkflowDefinition;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tadori_core::{
    CancellationToken, Context, Outcome, OutcomeSink, OutcomeSource, StepFailure, StepName,
    StepRecord, WorkflowError,
};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Outcome substituted when a step returns an error, unless configured otherwise.
pub const DEFAULT_FAILURE_OUTCOME: &str = "engine_error";

/// Engine-wide settings.
///
/// # Examples
///
/// ```
/// use tadori::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_max_steps(50)
///     .with_step_delay(Duration::from_millis(100));
///
/// assert_eq!(config.max_steps, Some(50));
/// assert_eq!(config.failure_outcome, "engine_error");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of step invocations per run. `None` disables the limit.
    pub max_steps: Option<usize>,
    /// Outcome substituted when a step returns an error.
    pub failure_outcome: String,
    /// Pause between two steps, in milliseconds.
    pub step_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            failure_outcome: DEFAULT_FAILURE_OUTCOME.to_string(),
            step_delay_ms: 0,
        }
    }
}

impl EngineConfig {
    /// Limits the number of step invocations per run.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Sets the outcome substituted when a step returns an error.
    pub fn with_failure_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.failure_outcome = outcome.into();
        self
    }

    /// Sets the pause between two steps.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay_ms = millis(delay);
        self
    }

    /// Returns the pause between two steps.
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

/// The result of a run that reached a terminal state.
#[derive(Debug)]
pub struct RunResult {
    /// The step whose outcome ended the run.
    pub final_step: StepName,
    /// Every `(step, outcome)` transition taken, in order.
    pub history: Vec<StepRecord>,
    /// The context as the last step left it.
    pub context: Context,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunResult {
    /// Returns the history as `(step, outcome)` pairs.
    pub fn outcome_pairs(&self) -> Vec<(&str, &str)> {
        self.history.iter().map(StepRecord::as_pair).collect()
    }

    /// Returns the outcome that ended the run.
    pub fn final_outcome(&self) -> Option<&Outcome> {
        self.history.last().map(|record| &record.outcome)
    }

    /// Returns the number of steps invoked.
    pub fn steps_taken(&self) -> usize {
        self.history.len()
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// What one step invocation produced.
enum Invocation {
    /// An outcome to route, emitted by the step or substituted on timeout.
    Resolved { outcome: Outcome, source: OutcomeSource },
    /// The step returned an error.
    Failed { outcome: Outcome, failure: StepFailure },
    /// The step finished without emitting anything.
    Silent,
}

/// Drives workflow runs.
///
/// The engine holds no per-run state, so one engine can drive any number
/// of concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `workflow` from its start step until a terminal state.
    ///
    /// Steps run strictly one after another against `ctx`. The run ends
    /// successfully when an outcome resolves to [`Target::End`] or a
    /// terminal step finishes; it fails on a missing step, an unmapped
    /// outcome, an unmapped failure, a silent step, or when the step limit
    /// is hit.
    pub async fn run(
        &self,
        workflow: &WorkflowDefinition,
        mut ctx: Context,
    ) -> Result<RunResult, WorkflowError> {
        let started = Instant::now();
        let mut history: Vec<StepRecord> = Vec::new();
        let mut current = workflow.start_step().clone();
        let mut invoked = 0usize;

        info!(
            workflow = %workflow.title(),
            start_step = %current,
            "workflow_started"
        );

        loop {
            if let Some(limit) = self.config.max_steps {
                if invoked >= limit {
                    warn!(workflow = %workflow.title(), limit, "step limit reached, stopping workflow");
                    return Err(WorkflowError::StepLimitExceeded { limit, history });
                }
            }

            let step = match workflow.step(current.as_str()) {
                Some(step) => step,
                None => {
                    warn!(step = %current, "step not found");
                    return Err(WorkflowError::UnknownStep {
                        step: current,
                        history,
                    });
                }
            };
            invoked += 1;

            let (outcome, source, failure) = match self.invoke(step, &mut ctx).await {
                Invocation::Resolved { outcome, source } => (outcome, source, None),
                Invocation::Failed { outcome, failure } => {
                    (outcome, OutcomeSource::Failed, Some(failure))
                }
                Invocation::Silent => {
                    warn!(step = %current, "step finished without emitting an outcome");
                    return Err(WorkflowError::NoOutcome {
                        step: current,
                        history,
                    });
                }
            };

            // Failures only follow explicit transitions, never the catch-all.
            let route = if failure.is_some() {
                match step.transitions().get(&outcome) {
                    Some(target) => Route::Mapped(target),
                    None => Route::Unmapped,
                }
            } else {
                step.route(&outcome)
            };

            let next = match route {
                Route::Mapped(target) | Route::CatchAll(target) => target.clone(),
                Route::Terminal => Target::End,
                Route::Unmapped => {
                    warn!(step = %current, outcome = %outcome, "no transition found for outcome");
                    return Err(match failure {
                        Some(source) => WorkflowError::StepExecution {
                            step: current,
                            outcome,
                            source,
                            history,
                        },
                        None => WorkflowError::UnmappedOutcome {
                            step: current,
                            outcome,
                            history,
                        },
                    });
                }
            };

            let record = StepRecord::new(current.clone(), outcome, source);
            match next {
                Target::Step(name) => {
                    info!(
                        from = %current,
                        to = %name,
                        outcome = %record.outcome,
                        "transitioning"
                    );
                    history.push(record);
                    current = name;
                }
                Target::End => {
                    history.push(record);
                    let elapsed = started.elapsed();
                    info!(
                        workflow = %workflow.title(),
                        final_step = %current,
                        steps = history.len(),
                        elapsed_ms = millis(elapsed),
                        "workflow_completed"
                    );
                    return Ok(RunResult {
                        final_step: current,
                        history,
                        context: ctx,
                        elapsed,
                    });
                }
            }

            let delay = self.config.step_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Invokes one step under its deadline and decides which outcome governs.
    ///
    /// Outcomes are drained while the action runs. On the deadline the
    /// action future is dropped and its cancellation token cancelled;
    /// outcomes it would have emitted later are lost.
    async fn invoke(&self, step: &StepDefinition, ctx: &mut Context) -> Invocation {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let sink = OutcomeSink::new(sender, cancel.clone());
        let mut last: Option<Outcome> = None;

        let span = info_span!("step", step = %step.name(), action = %step.action().name());
        debug!(parent: &span, timeout_ms = millis(step.timeout()), "step_started");

        let finished = {
            let action = step.action().execute(ctx, &sink).instrument(span);
            tokio::pin!(action);
            let deadline = tokio::time::sleep(step.timeout());
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    biased;
                    Some(outcome) = receiver.recv() => {
                        self.observe(step, &outcome);
                        last = Some(outcome);
                    }
                    result = &mut action => break Some(result),
                    () = &mut deadline => {
                        cancel.cancel();
                        break None;
                    }
                }
            }
        };

        // Outcomes emitted during the final poll of the action.
        while let Ok(outcome) = receiver.try_recv() {
            self.observe(step, &outcome);
            last = Some(outcome);
        }

        match finished {
            Some(Ok(())) => match last {
                Some(outcome) => Invocation::Resolved {
                    outcome,
                    source: OutcomeSource::Emitted,
                },
                None => Invocation::Silent,
            },
            Some(Err(failure)) => {
                warn!(step = %step.name(), error = %failure, "step failed");
                Invocation::Failed {
                    outcome: Outcome::new(self.config.failure_outcome.as_str()),
                    failure,
                }
            }
            None => match last {
                Some(outcome) => {
                    warn!(
                        step = %step.name(),
                        outcome = %outcome,
                        "step timed out, using its last outcome"
                    );
                    Invocation::Resolved {
                        outcome,
                        source: OutcomeSource::Emitted,
                    }
                }
                None => {
                    warn!(
                        step = %step.name(),
                        outcome = %step.timeout_outcome(),
                        "step timed out"
                    );
                    Invocation::Resolved {
                        outcome: step.timeout_outcome().clone(),
                        source: OutcomeSource::TimedOut,
                    }
                }
            },
        }
    }

    fn observe(&self, step: &StepDefinition, outcome: &Outcome) {
        match step.route(outcome) {
            Route::Unmapped => warn!(
                step = %step.name(),
                outcome = %outcome,
                "step emitted an outcome without a transition"
            ),
            _ => debug!(step = %step.name(), outcome = %outcome, "step emitted outcome"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Emit(&'static [&'static str]);

    #[async_trait]
    impl tadori_core::Step for Emit {
        async fn execute(
            &self,
            ctx: &mut Context,
            outcomes: &OutcomeSink,
        ) -> Result<(), StepFailure> {
            *ctx.get_or_insert_with("invocations", || 0u32) += 1;
            for outcome in self.0 {
                outcomes.emit(*outcome);
            }
            Ok(())
        }

        fn name(&self) -> StepName {
            StepName::new("Emit")
        }
    }

    #[derive(Debug)]
    struct Fail;

    #[async_trait]
    impl tadori_core::Step for Fail {
        async fn execute(
            &self,
            _ctx: &mut Context,
            _outcomes: &OutcomeSink,
        ) -> Result<(), StepFailure> {
            Err(StepFailure::new("apply button missing"))
        }

        fn name(&self) -> StepName {
            StepName::new("Fail")
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_steps, None);
        assert_eq!(config.failure_outcome, DEFAULT_FAILURE_OUTCOME);
        assert_eq!(config.step_delay(), Duration::ZERO);

        let config = config.with_step_delay(Duration::from_millis(100));
        assert_eq!(config.step_delay_ms, 100);

        let config = config.with_step_delay(Duration::MAX);
        assert_eq!(config.step_delay_ms, u64::MAX);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_two_step_workflow() {
        let workflow = WorkflowDefinition::builder()
            .step(
                StepDefinition::new("A", Emit(&["ok"]))
                    .on("ok", "B"),
            )
            .step(StepDefinition::new("B", Emit(&["done"])))
            .start_with("A")
            .build()
            .expect("valid workflow");

        let result = Engine::default()
            .run(&workflow, Context::new())
            .await
            .expect("run succeeds");

        assert_eq!(result.outcome_pairs(), vec![("A", "ok"), ("B", "done")]);
        assert_eq!(result.final_step, "B");
        assert_eq!(result.context.get::<u32>("invocations"), Some(&2));
    }

    #[tokio::test]
    async fn test_last_outcome_governs() {
        let workflow = WorkflowDefinition::builder()
            .step(
                StepDefinition::new("A", Emit(&["searching", "still searching", "found"]))
                    .on("found", "B"),
            )
            .step(StepDefinition::new("B", Emit(&["done"])))
            .start_with("A")
            .build()
            .expect("valid workflow");

        let result = workflow.run(Context::new()).await.expect("run succeeds");
        assert_eq!(result.outcome_pairs(), vec![("A", "found"), ("B", "done")]);
    }

    #[tokio::test]
    async fn test_failure_outcome_can_be_mapped() {
        let workflow = WorkflowDefinition::builder()
            .step(
                StepDefinition::new("apply", Fail)
                    .on("apply_failed", "recover"),
            )
            .step(StepDefinition::new("recover", Emit(&["recovered"])))
            .start_with("apply")
            .build()
            .expect("valid workflow");

        let engine = Engine::new(EngineConfig::default().with_failure_outcome("apply_failed"));
        let result = engine
            .run(&workflow, Context::new())
            .await
            .expect("run succeeds");

        assert_eq!(
            result.history[0],
            StepRecord::new(
                StepName::new("apply"),
                Outcome::new("apply_failed"),
                OutcomeSource::Failed
            )
        );
        assert_eq!(result.final_outcome(), Some(&Outcome::new("recovered")));
    }

    #[tokio::test]
    async fn test_silent_step_fails_run() {
        let workflow = WorkflowDefinition::builder()
            .step(StepDefinition::new("A", Emit(&[])))
            .start_with("A")
            .build()
            .expect("valid workflow");

        let error = workflow.run(Context::new()).await.unwrap_err();
        assert!(matches!(&error, WorkflowError::NoOutcome { step, .. } if step == "A"));
    }

    #[tokio::test]
    async fn test_step_limit() {
        let workflow = WorkflowDefinition::builder()
            .step(
                StepDefinition::new("loop", Emit(&["again"]))
                    .on("again", "loop"),
            )
            .start_with("loop")
            .build()
            .expect("valid workflow");

        let engine = Engine::new(EngineConfig::default().with_max_steps(5));
        let error = engine.run(&workflow, Context::new()).await.unwrap_err();

        match error {
            WorkflowError::StepLimitExceeded { limit, history } => {
                assert_eq!(limit, 5);
                assert_eq!(history.len(), 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
