//! Workflow definitions, the builder, and load-time validation.

use crate::definition::{StepDefinition, TERMINAL_MARKER};
use crate::engine::{Engine, RunResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tadori_core::{Context, InvalidWorkflowError, StepName, Violation, WorkflowError};
use tracing::warn;

/// Descriptive metadata of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkflowMeta {
    /// Short title, e.g. the site the workflow automates.
    pub title: String,
    /// What the workflow does.
    #[serde(default)]
    pub description: String,
    /// Name of the first step.
    pub start_step: String,
}

/// A validated, immutable workflow: named steps plus a start step.
///
/// Built with [`WorkflowDefinition::builder`] or loaded from a
/// [`WorkflowDeclaration`](crate::WorkflowDeclaration). A definition can be
/// shared across concurrent runs; each run owns its own [`Context`].
#[derive(Clone)]
pub struct WorkflowDefinition {
    meta: WorkflowMeta,
    start_step: StepName,
    steps: BTreeMap<StepName, StepDefinition>,
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("title", &self.meta.title)
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .field("start_step", &self.start_step)
            .finish()
    }
}

impl WorkflowDefinition {
    /// Creates a new workflow builder.
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// Validates `steps` and assembles a workflow.
    ///
    /// `violations` carries problems the caller already found (e.g.
    /// unregistered actions), so a single error lists everything.
    pub(crate) fn assemble(
        meta: WorkflowMeta,
        steps: BTreeMap<StepName, StepDefinition>,
        mut violations: Vec<Violation>,
    ) -> Result<Self, InvalidWorkflowError> {
        let start_step = StepName::new(meta.start_step.as_str());
        violations.extend(validate(&start_step, &steps));
        if !violations.is_empty() {
            return Err(InvalidWorkflowError { violations });
        }
        Ok(Self {
            meta,
            start_step,
            steps,
        })
    }

    /// Returns the workflow metadata.
    pub fn meta(&self) -> &WorkflowMeta {
        &self.meta
    }

    /// Returns the workflow title.
    pub fn title(&self) -> &str {
        &self.meta.title
    }

    /// Returns the name of the start step.
    pub fn start_step(&self) -> &StepName {
        &self.start_step
    }

    /// Returns the step with the given name.
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.get(name)
    }

    /// Returns `true` if a step with the given name exists.
    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Returns an iterator over all step names, in name order.
    pub fn step_names(&self) -> impl Iterator<Item = &StepName> {
        self.steps.keys()
    }

    /// Returns the number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the steps in display order: by ordinal, then by name.
    ///
    /// Steps without an ordinal come last.
    pub fn steps_in_order(&self) -> Vec<&StepDefinition> {
        let mut steps: Vec<_> = self.steps.values().collect();
        steps.sort_by(|a, b| match (a.order(), b.order()) {
            (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.name().cmp(b.name())),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name().cmp(b.name()),
        });
        steps
    }

    /// Runs the workflow with the default [`Engine`] configuration.
    pub async fn run(&self, ctx: Context) -> Result<RunResult, WorkflowError> {
        Engine::default().run(self, ctx).await
    }
}

/// Checks a step map against a start step, collecting every violation.
fn validate(start_step: &StepName, steps: &BTreeMap<StepName, StepDefinition>) -> Vec<Violation> {
    let mut violations = Vec::new();

    if start_step.as_str().is_empty() {
        violations.push(Violation::MissingStartStep);
    } else if !steps.contains_key(start_step) {
        violations.push(Violation::UnknownStartStep(start_step.clone()));
    }

    for (name, step) in steps {
        if name.as_str() == TERMINAL_MARKER {
            violations.push(Violation::ReservedStepName(name.clone()));
        }

        if step.timeout().is_zero() {
            violations.push(Violation::NonPositiveTimeout(name.clone()));
        }

        for (outcome, target) in step.targets() {
            if !steps.contains_key(target) {
                violations.push(Violation::DanglingTransition {
                    step: name.clone(),
                    outcome,
                    target: target.clone(),
                });
            }
        }

        if step.is_terminal() || step.catch_all().is_some() {
            continue;
        }

        // An unmapped timeout outcome only halts the run if the deadline is hit.
        if !step.transitions().contains_key(step.timeout_outcome()) {
            warn!(
                step = %name,
                outcome = %step.timeout_outcome(),
                "timeout outcome has no transition"
            );
        }

        let declared = step.declared_outcomes().into_iter().flatten();
        for outcome in declared {
            if !step.transitions().contains_key(outcome) {
                violations.push(Violation::UnmappedDeclaredOutcome {
                    step: name.clone(),
                    outcome: outcome.clone(),
                });
            }
        }
    }

    violations
}

/// Builder for constructing [`WorkflowDefinition`] instances.
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    meta: WorkflowMeta,
    start_step: Option<StepName>,
    steps: BTreeMap<StepName, StepDefinition>,
    duplicates: Vec<StepName>,
}

impl WorkflowBuilder {
    /// Creates a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the workflow title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = title.into();
        self
    }

    /// Sets the workflow description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = description.into();
        self
    }

    /// Adds a step.
    ///
    /// Adding two steps with the same name is reported when building.
    pub fn step(mut self, step: StepDefinition) -> Self {
        let name = step.name().clone();
        if self.steps.insert(name.clone(), step).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    /// Sets the start step by name.
    pub fn start_with(mut self, step_name: impl Into<StepName>) -> Self {
        self.start_step = Some(step_name.into());
        self
    }

    /// Validates and builds the workflow.
    ///
    /// Without an explicit start step, the step with the lowest ordinal is used.
    pub fn build(self) -> Result<WorkflowDefinition, InvalidWorkflowError> {
        let start_step = self
            .start_step
            .or_else(|| first_by_ordinal(&self.steps))
            .unwrap_or_else(|| StepName::new(""));

        let meta = WorkflowMeta {
            start_step: start_step.as_str().to_string(),
            ..self.meta
        };
        let violations = self
            .duplicates
            .into_iter()
            .map(Violation::DuplicateStep)
            .collect();

        WorkflowDefinition::assemble(meta, self.steps, violations)
    }
}

fn first_by_ordinal(steps: &BTreeMap<StepName, StepDefinition>) -> Option<StepName> {
    steps
        .values()
        .filter_map(|step| step.order().map(|order| (order, step.name())))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, name)| name.clone())
}
