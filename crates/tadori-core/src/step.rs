//! Step trait and step identifiers.

use crate::context::Context;
use crate::error::StepFailure;
use crate::outcome::OutcomeSink;
use async_trait::async_trait;
use std::fmt::Debug;

name_type!(
    /// Name identifying a step within a workflow.
    StepName
);

/// An action a workflow step performs.
///
/// A step reads and writes the run's [`Context`] and reports what it
/// observed by emitting one or more outcomes on the [`OutcomeSink`]. The
/// last outcome emitted before the step returns (or is abandoned at its
/// deadline) decides which step runs next; earlier outcomes are progress
/// reports. Returning `Err` makes the engine substitute its failure outcome.
///
/// Steps are shared between runs, so per-run state belongs in the context
/// rather than in the step itself.
///
/// # Examples
///
/// ```
/// use tadori_core::{Context, OutcomeSink, Step, StepFailure, StepName};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct DetectPageState;
///
/// #[async_trait]
/// impl Step for DetectPageState {
///     async fn execute(&self, ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
///         let cards = ctx.get::<Vec<String>>("job_cards").map_or(0, Vec::len);
///         if cards > 0 {
///             outcomes.emit("cards_present");
///         } else {
///             outcomes.emit("no_cards_found");
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> StepName {
///         StepName::new("DetectPageState")
///     }
/// }
/// ```
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Runs the step.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - The step finished; its last emitted outcome governs the transition
    /// - `Err(failure)` - The step failed; the engine's failure outcome governs the transition
    async fn execute(&self, ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure>;

    /// Returns the step's own name, used in logs.
    fn name(&self) -> StepName;
}
