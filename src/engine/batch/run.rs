use serde::Serialize;
use tracing::info;

/// Lifecycle of one export-style run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    ValidatingPreflight,
    AwaitingConfirmation,
    Processing,
    Writing,
    Reporting,
    Done,
    Cancelled,
}

impl RunState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ValidatingPreflight => "validating preflight",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::Processing => "processing",
            Self::Writing => "writing",
            Self::Reporting => "reporting",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    fn allows(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Init, ValidatingPreflight)
                | (ValidatingPreflight, AwaitingConfirmation)
                | (ValidatingPreflight, Processing)
                | (AwaitingConfirmation, Processing)
                | (AwaitingConfirmation, Cancelled)
                | (Processing, Writing)
                | (Writing, Reporting)
                | (Reporting, Done)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid run transition from {} to {}", from.label(), to.label())]
pub struct TransitionError {
    pub from: RunState,
    pub to: RunState,
}

/// Enforces the run state machine and keeps the visited states.
#[derive(Debug, Clone)]
pub struct RunTracker {
    state: RunState,
    history: Vec<RunState>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self {
            state: RunState::Init,
            history: vec![RunState::Init],
        }
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn advance(&mut self, next: RunState) -> Result<(), TransitionError> {
        if !self.state.allows(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        info!(from = self.state.label(), to = next.label(), "run state changed");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_without_confirmation() {
        let mut tracker = RunTracker::new();
        for state in [
            RunState::ValidatingPreflight,
            RunState::Processing,
            RunState::Writing,
            RunState::Reporting,
            RunState::Done,
        ] {
            tracker.advance(state).expect("allowed transition");
        }
        assert!(tracker.state().is_terminal());
        assert_eq!(tracker.history().len(), 6);
    }

    #[test]
    fn declined_confirmation_cancels() {
        let mut tracker = RunTracker::new();
        tracker.advance(RunState::ValidatingPreflight).expect("allowed");
        tracker.advance(RunState::AwaitingConfirmation).expect("allowed");
        tracker.advance(RunState::Cancelled).expect("allowed");

        let err = tracker.advance(RunState::Processing).expect_err("terminal state");
        assert_eq!(err.from, RunState::Cancelled);
        assert_eq!(err.to_string(), "invalid run transition from cancelled to processing");
    }

    #[test]
    fn cannot_skip_preflight() {
        let mut tracker = RunTracker::new();
        assert!(tracker.advance(RunState::Writing).is_err());
        assert_eq!(tracker.state(), RunState::Init);
    }
}
