use crate::{Failure, RunSummary, TestDescription};

/// Inbound lifecycle callbacks from the test runner. Every method defaults to
/// a no-op so implementors only override what they track.
pub trait RunListener: Send + Sync {
    fn test_run_started(&self, _description: &TestDescription) {}
    fn test_started(&self, _description: &TestDescription) {}
    fn test_finished(&self, _description: &TestDescription) {}
    fn test_failure(&self, _failure: &Failure) {}
    fn test_assumption_failure(&self, _failure: &Failure) {}
    fn test_ignored(&self, _description: &TestDescription) {}
    fn test_run_finished(&self, _summary: &RunSummary) {}
}
