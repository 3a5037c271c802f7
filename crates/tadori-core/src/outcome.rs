//! Outcomes emitted by steps and the records the engine keeps of them.

use crate::step::StepName;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

name_type!(
    /// A signal emitted by a step describing what happened.
    ///
    /// Outcomes are keys into a step's transition table, e.g.
    /// `"homepage_opened"` or `"no_cards_found"`.
    Outcome
);

/// Where the outcome of a step invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeSource {
    /// The step emitted it.
    Emitted,
    /// The step emitted nothing before its deadline; the timeout outcome was substituted.
    TimedOut,
    /// The step returned an error; the failure outcome was substituted.
    Failed,
}

impl fmt::Display for OutcomeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeSource::Emitted => write!(f, "emitted"),
            OutcomeSource::TimedOut => write!(f, "timed_out"),
            OutcomeSource::Failed => write!(f, "failed"),
        }
    }
}

/// One entry of a run's history: a step and the outcome that moved the run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// The step that was invoked.
    pub step: StepName,
    /// The outcome that governed the transition out of the step.
    pub outcome: Outcome,
    /// How the outcome was produced.
    pub source: OutcomeSource,
}

impl StepRecord {
    /// Creates a record.
    pub fn new(step: StepName, outcome: Outcome, source: OutcomeSource) -> Self {
        Self {
            step,
            outcome,
            source,
        }
    }

    /// Returns the record as a `(step, outcome)` pair of string slices.
    pub fn as_pair(&self) -> (&str, &str) {
        (self.step.as_str(), self.outcome.as_str())
    }
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            OutcomeSource::Emitted => write!(f, "{} -> {}", self.step, self.outcome),
            source => write!(f, "{} -> {} ({})", self.step, self.outcome, source),
        }
    }
}

/// Receives the outcomes a step emits while it runs.
///
/// The engine hands one sink to each step invocation and drains it
/// concurrently, so outcomes are observed in emission order even while the
/// step is still working. The sink also carries the invocation's
/// cancellation token, which is cancelled when the engine abandons the step
/// at its deadline.
#[derive(Debug)]
pub struct OutcomeSink {
    sender: UnboundedSender<Outcome>,
    cancel: CancellationToken,
}

impl OutcomeSink {
    /// Creates a sink that forwards outcomes to `sender`.
    pub fn new(sender: UnboundedSender<Outcome>, cancel: CancellationToken) -> Self {
        Self { sender, cancel }
    }

    /// Emits an outcome.
    ///
    /// Emitting after the engine has moved on is a no-op.
    pub fn emit(&self, outcome: impl Into<Outcome>) {
        // The receiver is gone only once the engine abandoned this invocation.
        let _ = self.sender.send(outcome.into());
    }

    /// Returns the cancellation token of this invocation.
    ///
    /// Clone it into any work the step spawns so that work can stop when
    /// the engine abandons the step.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `true` once the engine has abandoned this invocation.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_sink_preserves_emission_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = OutcomeSink::new(tx, CancellationToken::new());

        sink.emit("searching");
        sink.emit(String::from("cards_present"));
        sink.emit(Outcome::new("cards_collected"));

        let received: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            received,
            vec![
                Outcome::new("searching"),
                Outcome::new("cards_present"),
                Outcome::new("cards_collected"),
            ]
        );
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = OutcomeSink::new(tx, CancellationToken::new());
        drop(rx);
        sink.emit("late");
        assert!(!sink.is_cancelled());
    }

    #[test]
    fn test_cancellation_is_shared() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let sink = OutcomeSink::new(tx, token.clone());

        let spawned_work = sink.cancellation().clone();
        token.cancel();

        assert!(sink.is_cancelled());
        assert!(spawned_work.is_cancelled());
    }

    #[test]
    fn test_record_display() {
        let record = StepRecord::new(
            StepName::new("wait_for_load"),
            Outcome::new("page_load_retry"),
            OutcomeSource::TimedOut,
        );
        assert_eq!(
            record.to_string(),
            "wait_for_load -> page_load_retry (timed_out)"
        );
        assert_eq!(record.as_pair(), ("wait_for_load", "page_load_retry"));

        let record = StepRecord::new(
            StepName::new("open_homepage"),
            Outcome::new("homepage_opened"),
            OutcomeSource::Emitted,
        );
        assert_eq!(record.to_string(), "open_homepage -> homepage_opened");
    }
}
