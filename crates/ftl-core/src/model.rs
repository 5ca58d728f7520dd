use serde::{Deserialize, Serialize};

/// Lifecycle notification kinds emitted by the test runner.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    TestRunStarted,
    TestStarted,
    TestFinished,
    TestFailure,
    TestAssumptionFailure,
    TestIgnored,
    TestRunFinished,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TestRunStarted => "TEST_RUN_STARTED",
            EventKind::TestStarted => "TEST_STARTED",
            EventKind::TestFinished => "TEST_FINISHED",
            EventKind::TestFailure => "TEST_FAILURE",
            EventKind::TestAssumptionFailure => "TEST_ASSUMPTION_FAILURE",
            EventKind::TestIgnored => "TEST_IGNORED",
            EventKind::TestRunFinished => "TEST_RUN_FINISHED",
        }
    }

    /// Only the finished notification waits on a decision.
    pub fn is_gated(&self) -> bool {
        matches!(self, EventKind::TestFinished)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the rendezvous slot.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum GateState {
    Empty,
    EventWaiting,
    DecisionWaiting,
    Resolved,
}

/// Per-test state tracked by the cycle coordinator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CycleState {
    Started,
    Skipped { reason: String },
    Analyzing,
    Finished,
}
