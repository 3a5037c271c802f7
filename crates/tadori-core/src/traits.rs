//! Optional step traits for declaring step behavior up front.

use crate::outcome::Outcome;
use crate::step::Step;
use std::time::Duration;

/// Optional trait for steps that know their own deadline.
///
/// Workflow builders read these values when the step is registered, so the
/// step author rather than the workflow author picks the defaults.
///
/// # Examples
///
/// ```
/// use tadori_core::{Context, Outcome, OutcomeSink, Step, StepFailure, StepName, WithTimeout};
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct WaitForPageLoad;
///
/// #[async_trait]
/// impl Step for WaitForPageLoad {
///     async fn execute(&self, _ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
///         outcomes.emit("page_loaded");
///         Ok(())
///     }
///
///     fn name(&self) -> StepName {
///         StepName::new("WaitForPageLoad")
///     }
/// }
///
/// impl WithTimeout for WaitForPageLoad {
///     fn timeout(&self) -> Duration {
///         Duration::from_secs(20)
///     }
///
///     fn timeout_outcome(&self) -> Outcome {
///         Outcome::new("page_load_retry")
///     }
/// }
/// ```
pub trait WithTimeout: Step {
    /// Returns the maximum duration of one invocation.
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Returns the outcome substituted when nothing was emitted in time.
    fn timeout_outcome(&self) -> Outcome;
}

/// Optional trait for steps with a closed set of outcomes.
///
/// When a step declares its outcomes, workflow validation rejects
/// transition tables that leave one of them unmapped, catching at load time
/// what would otherwise halt a run halfway through. Pairs naturally with
/// [`define_outcomes!`](crate::define_outcomes).
///
/// # Examples
///
/// ```
/// use tadori_core::{define_outcomes, Context, DeclaredOutcomes, Outcome, OutcomeSink, Step, StepFailure, StepName};
/// use async_trait::async_trait;
///
/// define_outcomes! {
///     pub enum RefreshOutcome {
///         Refreshed => "page_refreshed",
///         NoPage => "no_page_to_refresh",
///     }
/// }
///
/// #[derive(Debug)]
/// struct RefreshPage;
///
/// #[async_trait]
/// impl Step for RefreshPage {
///     async fn execute(&self, ctx: &mut Context, outcomes: &OutcomeSink) -> Result<(), StepFailure> {
///         if ctx.contains_key("page") {
///             outcomes.emit(RefreshOutcome::Refreshed);
///         } else {
///             outcomes.emit(RefreshOutcome::NoPage);
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> StepName {
///         StepName::new("RefreshPage")
///     }
/// }
///
/// impl DeclaredOutcomes for RefreshPage {
///     fn outcomes(&self) -> Vec<Outcome> {
///         RefreshOutcome::all()
///     }
/// }
/// ```
pub trait DeclaredOutcomes: Step {
    /// Returns every outcome the step may emit.
    fn outcomes(&self) -> Vec<Outcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::StepFailure;
    use crate::outcome::OutcomeSink;
    use crate::step::StepName;
    use async_trait::async_trait;

    crate::define_outcomes! {
        enum SignInOutcome {
            BannerShown => "signin_banner_shown",
            Retry => "signin_banner_retry",
        }
    }

    #[derive(Debug)]
    struct ShowSignInBanner;

    #[async_trait]
    impl Step for ShowSignInBanner {
        async fn execute(
            &self,
            _ctx: &mut Context,
            outcomes: &OutcomeSink,
        ) -> Result<(), StepFailure> {
            outcomes.emit(SignInOutcome::BannerShown);
            Ok(())
        }

        fn name(&self) -> StepName {
            StepName::new("ShowSignInBanner")
        }
    }

    impl WithTimeout for ShowSignInBanner {
        fn timeout_outcome(&self) -> Outcome {
            SignInOutcome::Retry.into()
        }
    }

    impl DeclaredOutcomes for ShowSignInBanner {
        fn outcomes(&self) -> Vec<Outcome> {
            SignInOutcome::all()
        }
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(ShowSignInBanner.timeout(), Duration::from_secs(30));
        assert_eq!(ShowSignInBanner.timeout_outcome(), "signin_banner_retry");
    }

    #[test]
    fn test_declared_outcomes() {
        assert_eq!(
            ShowSignInBanner.outcomes(),
            vec![
                Outcome::new("signin_banner_shown"),
                Outcome::new("signin_banner_retry"),
            ]
        );
        assert_eq!(SignInOutcome::BannerShown.as_str(), "signin_banner_shown");
    }
}
