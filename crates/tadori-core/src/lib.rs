//! Core traits and types for the tadori step-workflow engine.
//!
//! This crate has no engine logic. Step authors (site automation glue)
//! depend on it to implement [`Step`] without pulling in the engine.
//!
//! # Core Types
//!
//! - [`Step`] - The trait every step action implements
//! - [`OutcomeSink`] - Where a running step emits its outcomes
//! - [`Outcome`] - A signal describing what a step observed
//! - [`Context`] - Heterogeneous storage shared by all steps of one run
//! - [`WorkflowError`] / [`InvalidWorkflowError`] - Run-time and load-time errors
//!
//! # Optional Traits
//!
//! - [`WithTimeout`] - Declare a step's own deadline and timeout outcome
//! - [`DeclaredOutcomes`] - Declare the closed set of outcomes a step emits

/// Defines a `String` newtype with the conversions shared by all identifier types.
macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", stringify!($name), ".")]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&$name> for $name {
            fn from(value: &$name) -> Self {
                value.clone()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

mod context;
mod error;
mod outcome;
mod step;
mod traits;

pub use context::{Context, ContextKey};
pub use error::{InvalidWorkflowError, StepFailure, Violation, WorkflowError};
pub use outcome::{Outcome, OutcomeSink, OutcomeSource, StepRecord};
pub use step::{Step, StepName};
pub use traits::{DeclaredOutcomes, WithTimeout};

/// Re-exported so steps can hold and observe their cancellation token.
pub use tokio_util::sync::CancellationToken;

/// Defines a closed set of outcomes for a step or workflow.
///
/// Generates a `Copy` enum with `as_str`, `all()` and a `From` conversion into
/// [`Outcome`], so the outcome vocabulary can be checked at load time through
/// [`DeclaredOutcomes`] while the engine keeps working with open strings.
///
/// # Example
///
/// ```
/// use tadori_core::{define_outcomes, Outcome};
///
/// define_outcomes! {
///     pub enum Homepage {
///         Opened => "homepage_opened",
///         NavigationFailed => "page_navigation_failed",
///     }
/// }
///
/// assert_eq!(Homepage::Opened.as_str(), "homepage_opened");
/// assert_eq!(Homepage::all().len(), 2);
/// assert_eq!(Outcome::from(Homepage::NavigationFailed), "page_navigation_failed");
/// ```
#[macro_export]
macro_rules! define_outcomes {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            /// Returns the outcome string for this variant.
            #[allow(dead_code)]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }

            /// Returns every outcome in declaration order.
            #[allow(dead_code)]
            pub fn all() -> ::std::vec::Vec<$crate::Outcome> {
                ::std::vec![$($crate::Outcome::new($value)),+]
            }
        }

        impl ::std::convert::From<$name> for $crate::Outcome {
            fn from(value: $name) -> Self {
                $crate::Outcome::new(value.as_str())
            }
        }
    };
}
