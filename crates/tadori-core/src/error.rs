//! Workflow error types.

use crate::outcome::{Outcome, StepRecord};
use crate::step::StepName;
use std::fmt;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Diagnostic returned by a step that could not complete.
///
/// Steps are expected to turn problems they understand (a selector that
/// did not match, a page that did not load) into outcomes. A `StepFailure`
/// is for everything else; the engine converts it into its failure outcome
/// and only fails the run when the workflow does not map that outcome.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StepFailure {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StepFailure {
    /// Creates a failure with a message and no underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error, using its display text as the message.
    pub fn from_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// Wraps an underlying error with a message describing what was attempted.
    pub fn with_source(
        message: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that end a workflow run.
///
/// Every variant carries the `(step, outcome)` history recorded before the
/// run halted so that failures can be diagnosed without re-running.
/// Step timeouts never appear here: they are resolved through the step's
/// timeout outcome like any other outcome.
///
/// This enum is `#[non_exhaustive]`; include a wildcard arm when matching.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The run reached a step name that is not part of the workflow.
    #[error("Step not found: {step}")]
    UnknownStep {
        /// The missing step.
        step: StepName,
        /// Records up to the halt.
        history: Vec<StepRecord>,
    },

    /// A step produced an outcome its transition table does not map.
    #[error("No transition for outcome '{outcome}' in step '{step}'")]
    UnmappedOutcome {
        /// The step that produced the outcome.
        step: StepName,
        /// The unmapped outcome.
        outcome: Outcome,
        /// Records up to the halt.
        history: Vec<StepRecord>,
    },

    /// A step failed and the workflow does not map the failure outcome.
    #[error("Step '{step}' failed: {source}")]
    StepExecution {
        /// The step that failed.
        step: StepName,
        /// The failure outcome that found no transition.
        outcome: Outcome,
        /// The step's diagnostic.
        source: StepFailure,
        /// Records up to the halt.
        history: Vec<StepRecord>,
    },

    /// A step finished without emitting any outcome.
    #[error("Step '{step}' finished without emitting an outcome")]
    NoOutcome {
        /// The silent step.
        step: StepName,
        /// Records up to the halt.
        history: Vec<StepRecord>,
    },

    /// The run invoked more steps than the configured limit allows.
    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded {
        /// The configured limit.
        limit: usize,
        /// Records up to the halt.
        history: Vec<StepRecord>,
    },
}

impl WorkflowError {
    /// Returns the history recorded before the run halted.
    pub fn history(&self) -> &[StepRecord] {
        match self {
            WorkflowError::UnknownStep { history, .. }
            | WorkflowError::UnmappedOutcome { history, .. }
            | WorkflowError::StepExecution { history, .. }
            | WorkflowError::NoOutcome { history, .. }
            | WorkflowError::StepLimitExceeded { history, .. } => history,
        }
    }

    /// Returns the step the run halted at, if the error is tied to one.
    pub fn step(&self) -> Option<&StepName> {
        match self {
            WorkflowError::UnknownStep { step, .. }
            | WorkflowError::UnmappedOutcome { step, .. }
            | WorkflowError::StepExecution { step, .. }
            | WorkflowError::NoOutcome { step, .. } => Some(step),
            WorkflowError::StepLimitExceeded { .. } => None,
        }
    }
}

/// A single problem found while validating a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Violation {
    /// No start step was given and none could be inferred.
    MissingStartStep,
    /// The declared start step is not among the workflow's steps.
    UnknownStartStep(StepName),
    /// A transition points at a step that does not exist.
    DanglingTransition {
        /// The step owning the transition.
        step: StepName,
        /// The outcome key, or `*` for the catch-all.
        outcome: Outcome,
        /// The missing target.
        target: StepName,
    },
    /// A step's timeout is zero, negative or not a number.
    NonPositiveTimeout(StepName),
    /// A step names an action that is not registered.
    UnregisteredAction {
        /// The step referencing the action.
        step: StepName,
        /// The unknown action name.
        action: String,
    },
    /// A step uses the name reserved for the terminal marker.
    ReservedStepName(StepName),
    /// Two steps share a name.
    DuplicateStep(StepName),
    /// A step declares an outcome that has no transition.
    UnmappedDeclaredOutcome {
        /// The step.
        step: StepName,
        /// The declared outcome.
        outcome: Outcome,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingStartStep => write!(f, "no start step given"),
            Violation::UnknownStartStep(step) => {
                write!(f, "start step '{step}' is not defined")
            }
            Violation::DanglingTransition {
                step,
                outcome,
                target,
            } => write!(
                f,
                "step '{step}' maps outcome '{outcome}' to undefined step '{target}'"
            ),
            Violation::NonPositiveTimeout(step) => {
                write!(f, "step '{step}' must have a positive timeout")
            }
            Violation::UnregisteredAction { step, action } => {
                write!(f, "step '{step}' uses unregistered action '{action}'")
            }
            Violation::ReservedStepName(step) => {
                write!(f, "step name '{step}' is reserved for the terminal marker")
            }
            Violation::DuplicateStep(step) => write!(f, "step '{step}' is defined twice"),
            Violation::UnmappedDeclaredOutcome { step, outcome } => write!(
                f,
                "step '{step}' has no transition for declared outcome '{outcome}'"
            ),
        }
    }
}

/// A workflow was rejected at load time.
///
/// Lists every violation found, not only the first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid workflow: {}", join_violations(.violations))]
pub struct InvalidWorkflowError {
    /// Every problem found, in a deterministic order.
    pub violations: Vec<Violation>,
}

impl InvalidWorkflowError {
    /// Returns `true` if `violation` is among the reported violations.
    pub fn contains(&self, violation: &Violation) -> bool {
        self.violations.contains(violation)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeSource;
    use std::error::Error as _;

    #[derive(Error, Debug)]
    #[error("selector '#apply-button' not found")]
    struct SelectorMissing;

    #[test]
    fn test_error_display() {
        let error = WorkflowError::UnmappedOutcome {
            step: StepName::new("A"),
            outcome: Outcome::new("fail"),
            history: Vec::new(),
        };
        assert_eq!(error.to_string(), "No transition for outcome 'fail' in step 'A'");

        let error = WorkflowError::UnknownStep {
            step: StepName::new("Z"),
            history: Vec::new(),
        };
        assert_eq!(error.to_string(), "Step not found: Z");
    }

    #[test]
    fn test_step_execution_keeps_source() {
        let error = WorkflowError::StepExecution {
            step: StepName::new("click_quick_apply"),
            outcome: Outcome::new("engine_error"),
            source: StepFailure::from_error(SelectorMissing),
            history: vec![StepRecord::new(
                StepName::new("open_homepage"),
                Outcome::new("homepage_opened"),
                OutcomeSource::Emitted,
            )],
        };

        assert_eq!(
            error.to_string(),
            "Step 'click_quick_apply' failed: selector '#apply-button' not found"
        );
        assert_eq!(error.step(), Some(&StepName::new("click_quick_apply")));
        assert_eq!(error.history().len(), 1);

        let failure = error.source().and_then(|e| e.source());
        assert_eq!(
            failure.map(|e| e.to_string()),
            Some("selector '#apply-button' not found".to_string())
        );
    }

    #[test]
    fn test_step_failure_with_source() {
        let failure = StepFailure::with_source("could not submit application", SelectorMissing);
        assert_eq!(failure.message(), "could not submit application");
        assert!(failure.source().is_some());

        let failure = StepFailure::new("browser closed");
        assert_eq!(failure.to_string(), "browser closed");
        assert!(failure.source().is_none());
    }

    #[test]
    fn test_invalid_workflow_lists_every_violation() {
        let error = InvalidWorkflowError {
            violations: vec![
                Violation::UnknownStartStep(StepName::new("Z")),
                Violation::DanglingTransition {
                    step: StepName::new("A"),
                    outcome: Outcome::new("ok"),
                    target: StepName::new("missing"),
                },
            ],
        };

        assert_eq!(
            error.to_string(),
            "Invalid workflow: start step 'Z' is not defined; \
             step 'A' maps outcome 'ok' to undefined step 'missing'"
        );
        assert!(error.contains(&Violation::UnknownStartStep(StepName::new("Z"))));
    }

    #[test]
    fn test_step_limit_has_no_step() {
        let error = WorkflowError::StepLimitExceeded {
            limit: 20,
            history: Vec::new(),
        };
        assert_eq!(error.step(), None);
        assert_eq!(error.to_string(), "Step limit of 20 exceeded");
    }
}
