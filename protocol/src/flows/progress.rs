//! Step-by-step progress of a running flow.
//!
//! Steps are reported in order and logged at debug level. Once a flow
//! reaches `Done` or `Failed` the tracker ignores further updates.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressStep {
    Starting,
    Locating,
    Building,
    Verifying,
    Signing,
    CollectingSignatures,
    Notarising,
    Broadcasting,
    Done,
    Failed,
}

impl ProgressStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for ProgressStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Starting => "starting",
            Self::Locating => "locating request in vault",
            Self::Building => "building transaction",
            Self::Verifying => "verifying contract",
            Self::Signing => "signing transaction",
            Self::CollectingSignatures => "collecting counterparty signature",
            Self::Notarising => "obtaining notary signature",
            Self::Broadcasting => "recording and broadcasting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    flow: &'static str,
    run_id: Uuid,
    history: Mutex<Vec<ProgressStep>>,
}

impl ProgressTracker {
    pub fn new(flow: &'static str) -> Self {
        Self {
            flow,
            run_id: Uuid::new_v4(),
            history: Mutex::new(vec![ProgressStep::Starting]),
        }
    }

    pub fn flow(&self) -> &'static str {
        self.flow
    }

    /// Identifies this flow run in logs.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Moves to `step`. Returns `false` if the tracker was already terminal.
    pub fn set(&self, step: ProgressStep) -> bool {
        let mut history = self.history.lock();
        if history.last().is_some_and(ProgressStep::is_terminal) {
            return false;
        }
        history.push(step);
        debug!(flow = self.flow, run = %self.run_id, step = %step, "progress");
        true
    }

    pub fn current(&self) -> ProgressStep {
        self.history
            .lock()
            .last()
            .copied()
            .unwrap_or(ProgressStep::Starting)
    }

    pub fn history(&self) -> Vec<ProgressStep> {
        self.history.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_recorded_in_order() {
        let tracker = ProgressTracker::new("request");
        assert_eq!(tracker.current(), ProgressStep::Starting);
        tracker.set(ProgressStep::Building);
        tracker.set(ProgressStep::Verifying);
        assert_eq!(
            tracker.history(),
            vec![
                ProgressStep::Starting,
                ProgressStep::Building,
                ProgressStep::Verifying
            ]
        );
    }

    #[test]
    fn terminal_step_is_final() {
        let tracker = ProgressTracker::new("decline");
        assert!(tracker.set(ProgressStep::Failed));
        assert!(!tracker.set(ProgressStep::Done));
        assert!(!tracker.set(ProgressStep::Building));
        assert_eq!(tracker.current(), ProgressStep::Failed);
    }
}
