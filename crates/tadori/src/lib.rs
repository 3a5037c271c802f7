//! # Tadori (辿り)
//!
//! A step-workflow engine for browser automation bots.
//!
//! "Tadori" means "following a path" in Japanese: a run follows the path
//! its steps' outcomes lay out, one step at a time. Each step is an action
//! paired with a transition table that maps the outcomes the action emits
//! to the next step. Site-specific work (navigating, scraping, filling forms)
//! lives in the actions; the engine only sequences them, enforces their
//! deadlines, and records what happened.
//!
//! ## Features
//!
//! - **Outcome-driven transitions**: steps emit outcome strings or
//!   [`define_outcomes!`] enums; the last one emitted picks the next step
//! - **Deadlines without failures**: a step that stays silent past its
//!   timeout is abandoned and its timeout outcome routed like any other
//! - **Load-time validation**: dangling transitions, unknown start steps and
//!   unmapped outcomes are reported together before anything runs
//! - **Declarative workflows**: load step tables with serde and bind them to
//!   actions registered by name
//! - **Structured logging** through `tracing`
//!
//! ## Example
//!
//! ```rust
//! use tadori::prelude::*;
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct OpenHomepage;
//!
//! #[async_trait]
//! impl Step for OpenHomepage {
//!     async fn execute(&self, ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
//!         ctx.insert("url", "https://www.seek.com.au".to_string());
//!         outcomes.emit("homepage_opened");
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> StepName {
//!         StepName::new("OpenHomepage")
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct FinishRun;
//!
//! #[async_trait]
//! impl Step for FinishRun {
//!     async fn execute(&self, _ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
//!         outcomes.emit("run_finished");
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> StepName {
//!         StepName::new("FinishRun")
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let workflow = WorkflowDefinition::builder()
//!     .title("Seek")
//!     .step(
//!         StepDefinition::new("open_homepage", OpenHomepage)
//!             .on("homepage_opened", "finish")
//!             .on("timeout", "open_homepage"),
//!     )
//!     .step(StepDefinition::new("finish", FinishRun))
//!     .start_with("open_homepage")
//!     .build()
//!     .expect("valid workflow");
//!
//! let result = workflow.run(Context::new()).await.expect("workflow failed");
//! assert_eq!(
//!     result.outcome_pairs(),
//!     vec![("open_homepage", "homepage_opened"), ("finish", "run_finished")]
//! );
//! # }
//! ```

mod declaration;
mod definition;
mod engine;
mod workflow;

// Re-export core types
pub use tadori_core::*;

pub use declaration::{ActionRegistry, StepDeclaration, WorkflowDeclaration};
pub use definition::{
    Route, StepDefinition, Target, CATCH_ALL, DEFAULT_TIMEOUT, DEFAULT_TIMEOUT_OUTCOME,
    TERMINAL_MARKER,
};
pub use engine::{Engine, EngineConfig, RunResult, DEFAULT_FAILURE_OUTCOME};
pub use workflow::{WorkflowBuilder, WorkflowDefinition, WorkflowMeta};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        define_outcomes, ActionRegistry, Context, DeclaredOutcomes, Engine, EngineConfig,
        Outcome, OutcomeSink, RunResult, Step, StepDefinition, StepFailure, StepName, Target,
        WithTimeout, WorkflowDeclaration, WorkflowDefinition, WorkflowError,
    };
}
