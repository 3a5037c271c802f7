//! Declarative workflows: serde-friendly step tables bound to named actions.
//!
//! Site workflows are usually written as data, a table of steps that name
//! their action function, with the functions registered separately. This
//! module turns such a declaration into a validated [`WorkflowDefinition`].
//! Field names of the older bot configs (`workflow_meta`, `steps_config`,
//! `func`, `timeout`, `on_timeout_event`, `step`) are accepted as aliases.

use crate::definition::{StepDefinition, Target, CATCH_ALL, DEFAULT_TIMEOUT, DEFAULT_TIMEOUT_OUTCOME};
use crate::workflow::{WorkflowDefinition, WorkflowMeta};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tadori_core::{
    Context, InvalidWorkflowError, OutcomeSink, Step, StepFailure, StepName, Violation,
};

/// A workflow written as data.
///
/// # Examples
///
/// ```
/// use tadori::{ActionRegistry, WorkflowDeclaration};
/// # use tadori::prelude::*;
/// # use async_trait::async_trait;
/// # #[derive(Debug)]
/// # struct Noop;
/// # #[async_trait]
/// # impl Step for Noop {
/// #     async fn execute(&self, _ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
/// #         outcomes.emit("ctx_ready");
/// #         Ok(())
/// #     }
/// #     fn name(&self) -> StepName { StepName::new("Noop") }
/// # }
///
/// let declaration: WorkflowDeclaration = serde_json::from_str(r#"{
///     "workflow_meta": {
///         "title": "Seek",
///         "description": "Search and apply on seek.com.au Jobs",
///         "start_step": "init_context"
///     },
///     "steps_config": {
///         "init_context": {
///             "step": 0,
///             "func": "step0",
///             "transitions": {"ctx_ready": "done"},
///             "timeout": 30,
///             "on_timeout_event": "ctx_ready"
///         }
///     }
/// }"#)?;
///
/// let registry = ActionRegistry::new().with("step0", Noop);
/// let workflow = declaration.load(&registry)?;
/// assert_eq!(workflow.start_step(), "init_context");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDeclaration {
    /// Title, description and start step.
    #[serde(alias = "workflow_meta")]
    pub meta: WorkflowMeta,
    /// Steps keyed by step name.
    #[serde(alias = "steps_config")]
    pub steps: BTreeMap<String, StepDeclaration>,
}

/// One step of a [`WorkflowDeclaration`].
///
/// Transition targets are step names; `null` or `"done"` end the run, and
/// the key `"*"` declares the catch-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDeclaration {
    /// Display order.
    #[serde(default, alias = "step")]
    pub ordinal: Option<f64>,
    /// Name of the registered action.
    #[serde(alias = "func")]
    pub action: String,
    /// Outcome to target step name.
    #[serde(default)]
    pub transitions: BTreeMap<String, Option<String>>,
    /// Deadline in seconds.
    #[serde(default = "default_timeout_secs", alias = "timeout")]
    pub timeout_secs: f64,
    /// Outcome substituted when the deadline passes silently.
    #[serde(default = "default_timeout_outcome", alias = "on_timeout_event")]
    pub timeout_outcome: String,
    /// Outcomes the action may emit.
    #[serde(default)]
    pub emits: Option<Vec<String>>,
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_timeout_outcome() -> String {
    DEFAULT_TIMEOUT_OUTCOME.to_string()
}

impl WorkflowDeclaration {
    /// Binds every step to its registered action and validates the result.
    ///
    /// All problems are reported together, including unregistered actions.
    pub fn load(&self, registry: &ActionRegistry) -> Result<WorkflowDefinition, InvalidWorkflowError> {
        let mut violations = Vec::new();
        let mut steps = BTreeMap::new();

        for (name, declaration) in &self.steps {
            let step_name = StepName::new(name.as_str());
            let action: Arc<dyn Step> = match registry.get(&declaration.action) {
                Some(action) => action,
                None => {
                    violations.push(Violation::UnregisteredAction {
                        step: step_name.clone(),
                        action: declaration.action.clone(),
                    });
                    Arc::new(MissingAction(declaration.action.clone()))
                }
            };
            steps.insert(step_name.clone(), declaration.to_definition(step_name, action));
        }

        WorkflowDefinition::assemble(self.meta.clone(), steps, violations)
    }
}

impl StepDeclaration {
    /// Converts `timeout_secs` into a deadline.
    ///
    /// Zero, negative and non-finite values become zero and are reported by
    /// validation. Positive values saturate to the representable range.
    pub fn timeout(&self) -> Duration {
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or(Duration::MAX)
            .max(Duration::from_nanos(1))
    }

    fn to_definition(&self, name: StepName, action: Arc<dyn Step>) -> StepDefinition {
        let mut step = StepDefinition::shared(name, action)
            .with_timeout(self.timeout(), self.timeout_outcome.as_str());

        for (outcome, target) in &self.transitions {
            let target = target.as_deref().map_or(Target::End, Target::parse);
            step = if outcome == CATCH_ALL {
                step.otherwise(target)
            } else {
                step.transition(outcome.as_str(), target)
            };
        }
        if let Some(ordinal) = self.ordinal {
            step = step.ordinal(ordinal);
        }
        if let Some(emits) = &self.emits {
            step = step.emits(emits.iter().map(String::as_str));
        }
        step
    }
}

/// Stand-in for an action name that is not registered. Never runs: the
/// workflow is rejected before it could.
#[derive(Debug)]
struct MissingAction(String);

#[async_trait]
impl Step for MissingAction {
    async fn execute(&self, _ctx: &mut Context, _outcomes: &OutcomeSink) -> Result<(), StepFailure> {
        Err(StepFailure::new(format!("action '{}' is not registered", self.0)))
    }

    fn name(&self) -> StepName {
        StepName::new(self.0.as_str())
    }
}

/// Step actions registered under the names declarations refer to.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Step>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.actions.keys().collect();
        names.sort();
        f.debug_struct("ActionRegistry").field("actions", &names).finish()
    }
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action, replacing any action previously registered under `name`.
    pub fn register<S: Step + 'static>(&mut self, name: impl Into<String>, action: S) {
        self.actions.insert(name.into(), Arc::new(action));
    }

    /// Registers an action that is already shared.
    pub fn register_shared(&mut self, name: impl Into<String>, action: Arc<dyn Step>) {
        self.actions.insert(name.into(), action);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<S: Step + 'static>(mut self, name: impl Into<String>, action: S) -> Self {
        self.register(name, action);
        self
    }

    /// Returns the action registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.actions.get(name).cloned()
    }

    /// Returns `true` if an action is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Returns the number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if no action is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
