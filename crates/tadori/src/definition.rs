//! Step definitions: a step action bound to its transition table and deadline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tadori_core::{DeclaredOutcomes, Outcome, Step, StepName, WithTimeout};

/// Name reserved for the explicit terminal marker in declarations.
pub const TERMINAL_MARKER: &str = "done";

/// Transition key that declares a catch-all in declarations.
pub const CATCH_ALL: &str = "*";

/// Timeout applied to steps that do not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout outcome applied to steps that do not configure one.
pub const DEFAULT_TIMEOUT_OUTCOME: &str = "timeout";

/// Where a transition leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Continue with the named step.
    Step(StepName),
    /// End the run successfully.
    End,
}

impl Target {
    /// Parses a declared target, treating the terminal marker as [`Target::End`].
    pub fn parse(target: &str) -> Self {
        if target == TERMINAL_MARKER {
            Target::End
        } else {
            Target::Step(StepName::new(target))
        }
    }
}

impl From<StepName> for Target {
    fn from(name: StepName) -> Self {
        Target::Step(name)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Step(StepName::new(name))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Step(name) => write!(f, "{name}"),
            Target::End => write!(f, "<end>"),
        }
    }
}

/// How a step definition routes a given outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// The outcome has an explicit entry in the transition table.
    Mapped(&'a Target),
    /// The outcome is covered by the catch-all.
    CatchAll(&'a Target),
    /// The step is terminal; any outcome ends the run.
    Terminal,
    /// Nothing handles the outcome.
    Unmapped,
}

/// A step of a workflow: an action plus the rules for leaving it.
///
/// # Examples
///
/// ```rust,ignore
/// let step = StepDefinition::new("wait_for_load", WaitForPageLoad)
///     .on("page_loaded", "detect_page_state")
///     .on("page_load_retry", "refresh_page")
///     .with_timeout(Duration::from_secs(20), "page_load_retry");
/// ```
#[derive(Clone)]
pub struct StepDefinition {
    name: StepName,
    action: Arc<dyn Step>,
    transitions: BTreeMap<Outcome, Target>,
    otherwise: Option<Target>,
    timeout: Duration,
    timeout_outcome: Outcome,
    ordinal: Option<f64>,
    emits: Option<BTreeSet<Outcome>>,
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("action", &self.action.name())
            .field("transitions", &self.transitions)
            .field("otherwise", &self.otherwise)
            .field("timeout", &self.timeout)
            .field("timeout_outcome", &self.timeout_outcome)
            .finish()
    }
}

impl StepDefinition {
    /// Creates a terminal step with the default timeout.
    pub fn new<S: Step + 'static>(name: impl Into<StepName>, action: S) -> Self {
        Self::shared(name, Arc::new(action))
    }

    /// Creates a step from an action that may be shared with other steps or workflows.
    pub fn shared(name: impl Into<StepName>, action: Arc<dyn Step>) -> Self {
        Self {
            name: name.into(),
            action,
            transitions: BTreeMap::new(),
            otherwise: None,
            timeout: DEFAULT_TIMEOUT,
            timeout_outcome: Outcome::new(DEFAULT_TIMEOUT_OUTCOME),
            ordinal: None,
            emits: None,
        }
    }

    /// Creates a step whose timeout and timeout outcome come from the action.
    pub fn timed<S: WithTimeout + 'static>(name: impl Into<StepName>, action: S) -> Self {
        let timeout = action.timeout();
        let timeout_outcome = action.timeout_outcome();
        Self::new(name, action).with_timeout(timeout, timeout_outcome)
    }

    /// Creates a step whose outcome vocabulary comes from the action.
    pub fn declared<S: DeclaredOutcomes + 'static>(name: impl Into<StepName>, action: S) -> Self {
        let outcomes = action.outcomes();
        Self::new(name, action).emits(outcomes)
    }

    /// Maps `outcome` to the step named `target`.
    pub fn on(mut self, outcome: impl Into<Outcome>, target: impl Into<StepName>) -> Self {
        self.transitions
            .insert(outcome.into(), Target::Step(target.into()));
        self
    }

    /// Makes `outcome` end the run.
    pub fn end_on(mut self, outcome: impl Into<Outcome>) -> Self {
        self.transitions.insert(outcome.into(), Target::End);
        self
    }

    /// Maps `outcome` to an arbitrary target.
    pub fn transition(mut self, outcome: impl Into<Outcome>, target: Target) -> Self {
        self.transitions.insert(outcome.into(), target);
        self
    }

    /// Routes every emitted or timeout outcome without an entry to `target`.
    ///
    /// Failure outcomes are not covered; they must be mapped explicitly.
    pub fn otherwise(mut self, target: Target) -> Self {
        self.otherwise = Some(target);
        self
    }

    /// Sets the deadline and the outcome substituted when it passes silently.
    pub fn with_timeout(mut self, timeout: Duration, outcome: impl Into<Outcome>) -> Self {
        self.timeout = timeout;
        self.timeout_outcome = outcome.into();
        self
    }

    /// Sets the display order of the step.
    pub fn ordinal(mut self, ordinal: f64) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    /// Declares the outcomes the action may emit, checked during validation.
    pub fn emits<I, O>(mut self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Outcome>,
    {
        self.emits = Some(outcomes.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the step name.
    pub fn name(&self) -> &StepName {
        &self.name
    }

    /// Returns the action.
    pub fn action(&self) -> &dyn Step {
        self.action.as_ref()
    }

    /// Returns the explicit transition table.
    pub fn transitions(&self) -> &BTreeMap<Outcome, Target> {
        &self.transitions
    }

    /// Returns the catch-all target, if any.
    pub fn catch_all(&self) -> Option<&Target> {
        self.otherwise.as_ref()
    }

    /// Returns the deadline of one invocation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the outcome substituted on a silent timeout.
    pub fn timeout_outcome(&self) -> &Outcome {
        &self.timeout_outcome
    }

    /// Returns the display order, if set.
    pub fn order(&self) -> Option<f64> {
        self.ordinal
    }

    /// Returns the declared outcome vocabulary, if any.
    pub fn declared_outcomes(&self) -> Option<&BTreeSet<Outcome>> {
        self.emits.as_ref()
    }

    /// Returns `true` if the step has no transitions at all, so any outcome ends the run.
    pub fn is_terminal(&self) -> bool {
        self.transitions.is_empty() && self.otherwise.is_none()
    }

    /// Decides how `outcome` leaves this step.
    pub fn route(&self, outcome: &Outcome) -> Route<'_> {
        if let Some(target) = self.transitions.get(outcome) {
            return Route::Mapped(target);
        }
        if let Some(target) = &self.otherwise {
            return Route::CatchAll(target);
        }
        if self.is_terminal() {
            return Route::Terminal;
        }
        Route::Unmapped
    }

    /// Iterates over every step name this step can lead to, with the outcome key.
    pub(crate) fn targets(&self) -> impl Iterator<Item = (Outcome, &StepName)> {
        let explicit = self
            .transitions
            .iter()
            .filter_map(|(outcome, target)| match target {
                Target::Step(name) => Some((outcome.clone(), name)),
                Target::End => None,
            });
        let fallback = match &self.otherwise {
            Some(Target::Step(name)) => Some((Outcome::new(CATCH_ALL), name)),
            _ => None,
        };
        explicit.chain(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tadori_core::{Context, OutcomeSink, StepFailure};

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl Step for Noop {
        async fn execute(
            &self,
            _ctx: &mut Context,
            outcomes: &OutcomeSink,
        ) -> Result<(), StepFailure> {
            outcomes.emit("ok");
            Ok(())
        }

        fn name(&self) -> StepName {
            StepName::new("Noop")
        }
    }

    impl WithTimeout for Noop {
        fn timeout(&self) -> Duration {
            Duration::from_secs(20)
        }

        fn timeout_outcome(&self) -> Outcome {
            Outcome::new("page_load_retry")
        }
    }

    #[test]
    fn test_defaults() {
        let step = StepDefinition::new("A", Noop);
        assert_eq!(step.name(), "A");
        assert_eq!(step.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(step.timeout_outcome(), "timeout");
        assert!(step.is_terminal());
        assert_eq!(step.order(), None);
    }

    #[test]
    fn test_routing() {
        let step = StepDefinition::new("A", Noop)
            .on("ok", "B")
            .end_on("finished");

        assert_eq!(
            step.route(&Outcome::new("ok")),
            Route::Mapped(&Target::Step(StepName::new("B")))
        );
        assert_eq!(step.route(&Outcome::new("finished")), Route::Mapped(&Target::End));
        assert_eq!(step.route(&Outcome::new("fail")), Route::Unmapped);

        let terminal = StepDefinition::new("B", Noop);
        assert_eq!(terminal.route(&Outcome::new("anything")), Route::Terminal);
    }

    #[test]
    fn test_catch_all() {
        let step = StepDefinition::new("click_job_card", Noop)
            .on("job_card_clicked", "wait_for_details_panel")
            .otherwise(Target::from("collect_job_cards"));

        assert!(!step.is_terminal());
        assert_eq!(
            step.route(&Outcome::new("unexpected")),
            Route::CatchAll(&Target::Step(StepName::new("collect_job_cards")))
        );

        let targets: Vec<_> = step
            .targets()
            .map(|(outcome, name)| (outcome.to_string(), name.to_string()))
            .collect();
        assert_eq!(
            targets,
            vec![
                (
                    "job_card_clicked".to_string(),
                    "wait_for_details_panel".to_string()
                ),
                ("*".to_string(), "collect_job_cards".to_string()),
            ]
        );
    }

    #[test]
    fn test_timed_reads_action_defaults() {
        let step = StepDefinition::timed("wait_for_load", Noop);
        assert_eq!(step.timeout(), Duration::from_secs(20));
        assert_eq!(step.timeout_outcome(), "page_load_retry");
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(Target::parse("done"), Target::End);
        assert_eq!(Target::parse("open_homepage"), Target::from("open_homepage"));
        assert_eq!(Target::End.to_string(), "<end>");
    }
}
