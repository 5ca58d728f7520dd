//! Per-test leak detection cycle.
//!
//! ```text
//! Started ──► Skipped ───────────────► Finished
//!    └──────► Analyzing ─(decision)──► Finished
//! ```
//!
//! Every call to [`CycleCoordinator::finish_cycle`] delivers exactly one
//! decision, whichever path is taken. The gate relies on this: a finished
//! event parked on it is only released by that decision.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use ftl_core::{CycleId, CycleState, Decision, Event, Failure, RunListener, RunSummary, TestDescription};
use ftl_gate::CompletionGate;
use ftl_relay::EventSink;

use crate::config::Config;
use crate::detector::{AnalysisPolicy, DetectionResult, FailOnApplicationLeaks, LeakDetector};
use crate::skip::{NeverSkip, SkipPredicate};
use crate::util::panic_message;

/// Where decisions go.
#[derive(Clone)]
pub enum Delivery {
    /// Through the completion gate, releasing the parked finished event.
    Gated(Arc<CompletionGate>),
    /// No gate is installed: replacement failures go straight to the sink
    /// and clean cycles produce nothing.
    Direct(Arc<dyn EventSink>),
}

impl Delivery {
    fn deliver(&self, decision: Decision) -> Result<()> {
        match self {
            Delivery::Gated(gate) => gate.submit_decision(decision).context("submit decision to gate"),
            Delivery::Direct(sink) => match decision {
                Decision::NoReplacement => Ok(()),
                Decision::Replacement(failure) => sink.send_test_notification(Event::failure(&failure)?),
            },
        }
    }
}

#[derive(Default)]
struct Tracker {
    cycle_id: Option<CycleId>,
    current: Option<TestDescription>,
    state: Option<CycleState>,
}

/// Returned by [`CycleCoordinator::finish_cycle`].
pub struct CycleHandle {
    pub cycle_id: CycleId,
    supervisor: Option<JoinHandle<()>>,
}

impl CycleHandle {
    /// True when the decision was delivered before `finish_cycle` returned.
    pub fn is_resolved_inline(&self) -> bool {
        self.supervisor.is_none()
    }

    /// Blocks until the cycle's decision has been delivered.
    pub fn wait(self) {
        if let Some(supervisor) = self.supervisor {
            if let Err(payload) = supervisor.join() {
                tracing::error!(cycle = %self.cycle_id, panic = %panic_message(payload.as_ref()), "cycle supervisor panicked");
            }
        }
    }
}

pub struct CycleCoordinator {
    detector: Arc<dyn LeakDetector>,
    skip: Arc<dyn SkipPredicate>,
    policy: Arc<dyn AnalysisPolicy>,
    delivery: Delivery,
    timeout: Duration,
    tracker: Arc<Mutex<Tracker>>,
}

impl CycleCoordinator {
    pub fn new(detector: Arc<dyn LeakDetector>, delivery: Delivery) -> Self {
        Self {
            detector,
            skip: Arc::new(NeverSkip),
            policy: Arc::new(FailOnApplicationLeaks),
            delivery,
            timeout: Duration::from_millis(Config::default_config().analysis.timeout_ms),
            tracker: Arc::new(Mutex::new(Tracker::default())),
        }
    }

    pub fn from_config(cfg: &Config, detector: Arc<dyn LeakDetector>, delivery: Delivery) -> Self {
        Self::new(detector, delivery)
            .with_skip(Arc::new(cfg.skip_rules()))
            .with_timeout(cfg.analysis_timeout())
    }

    pub fn with_skip(mut self, skip: Arc<dyn SkipPredicate>) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn AnalysisPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> Option<CycleState> {
        self.lock().state.clone()
    }

    pub fn current_test(&self) -> Option<TestDescription> {
        self.lock().current.clone()
    }

    pub fn begin_cycle(&self, description: &TestDescription) {
        let state = match self.skip.skip_reason(description) {
            Some(reason) => CycleState::Skipped { reason },
            None => CycleState::Started,
        };
        let mut t = self.lock();
        t.cycle_id = Some(CycleId::new());
        t.current = Some(description.clone());
        t.state = Some(state);
    }

    /// Leak detection only runs for tests that passed.
    pub fn mark_skipped(&self, reason: &str) {
        self.lock().state = Some(CycleState::Skipped {
            reason: reason.to_string(),
        });
    }

    /// Ends the current cycle: delivers `NoReplacement` right away for a
    /// skipped test, otherwise starts the analysis in the background.
    pub fn finish_cycle(&self, description: &TestDescription) -> Result<CycleHandle> {
        let (cycle_id, skipped) = {
            let mut t = self.lock();
            let cycle_id = t.cycle_id.get_or_insert_with(CycleId::new).clone();
            let skipped = match t.state.take() {
                Some(CycleState::Skipped { reason }) => Some(reason),
                _ => None,
            };
            t.current = None;
            t.state = Some(if skipped.is_some() {
                CycleState::Finished
            } else {
                CycleState::Analyzing
            });
            (cycle_id, skipped)
        };

        if let Some(reason) = skipped {
            tracing::info!(test = %description, cycle = %cycle_id, "Skipping leak detection because the test {}", reason);
            self.delivery.deliver(Decision::NoReplacement)?;
            return Ok(CycleHandle { cycle_id, supervisor: None });
        }

        let detector = Arc::clone(&self.detector);
        let policy = Arc::clone(&self.policy);
        let delivery = self.delivery.clone();
        let tracker = Arc::clone(&self.tracker);
        let timeout = self.timeout;
        let test = description.clone();
        let id = cycle_id.clone();

        let spawned = thread::Builder::new()
            .name("ftl-cycle".to_string())
            .spawn(move || {
                let decision = run_analysis(detector, policy.as_ref(), &test, timeout);
                if let Err(e) = delivery.deliver(decision) {
                    tracing::error!(test = %test, cycle = %id, error = %format!("{e:#}"), "could not deliver decision");
                }
                let mut t = tracker.lock().unwrap_or_else(PoisonError::into_inner);
                if t.cycle_id.as_ref() == Some(&id) {
                    t.state = Some(CycleState::Finished);
                }
            });

        match spawned {
            Ok(supervisor) => Ok(CycleHandle {
                cycle_id,
                supervisor: Some(supervisor),
            }),
            Err(e) => {
                // still owe the gate a decision
                tracing::warn!(test = %description, error = %e, "could not start leak analysis");
                self.delivery
                    .deliver(crash_decision(description, &format!("could not start analysis: {e}")))?;
                self.lock().state = Some(CycleState::Finished);
                Ok(CycleHandle { cycle_id, supervisor: None })
            }
        }
    }
}

fn crash_decision(test: &TestDescription, detail: &str) -> Decision {
    Decision::Replacement(Failure::new(test.clone(), format!("Leak analysis crashed: {}", detail)))
}

fn run_analysis(
    detector: Arc<dyn LeakDetector>,
    policy: &dyn AnalysisPolicy,
    test: &TestDescription,
    timeout: Duration,
) -> Decision {
    let (tx, rx) = mpsc::channel();
    let worker = {
        let test = test.clone();
        thread::Builder::new()
            .name("ftl-analysis".to_string())
            .spawn(move || {
                let _ = tx.send(detector.detect_leaks(&test));
            })
    };
    let worker = match worker {
        Ok(w) => w,
        Err(e) => return crash_decision(test, &format!("could not start analysis thread: {e}")),
    };

    tracing::debug!(test = %test, "detecting leaks");
    match rx.recv_timeout(timeout) {
        Ok(Ok(DetectionResult::AnalysisPerformed(analysis))) => {
            tracing::debug!(test = %test, "done detecting leaks: {}", analysis);
            policy.classify(test, &analysis)
        }
        Ok(Ok(DetectionResult::NoAnalysis { reason })) => {
            tracing::debug!(test = %test, reason = %reason, "no analysis performed");
            Decision::NoReplacement
        }
        Ok(Err(e)) => {
            tracing::warn!(test = %test, error = %format!("{e:#}"), "leak detector failed");
            crash_decision(test, &format!("{e:#}"))
        }
        Err(RecvTimeoutError::Timeout) => {
            // the worker is left running detached; its late result is dropped
            tracing::warn!(test = %test, timeout_ms = timeout.as_millis() as u64, "leak analysis timed out");
            Decision::Replacement(Failure::new(
                test.clone(),
                format!("Leak analysis did not complete within {} ms", timeout.as_millis()),
            ))
        }
        Err(RecvTimeoutError::Disconnected) => {
            let detail = match worker.join() {
                Err(payload) => panic_message(payload.as_ref()),
                Ok(()) => "analysis thread exited without a result".to_string(),
            };
            tracing::warn!(test = %test, detail = %detail, "leak detector panicked");
            crash_decision(test, &detail)
        }
    }
}

impl RunListener for CycleCoordinator {
    fn test_run_started(&self, description: &TestDescription) {
        *self.lock() = Tracker::default();
        tracing::info!(run = %description, "test run started");
    }

    fn test_started(&self, description: &TestDescription) {
        self.begin_cycle(description);
    }

    fn test_finished(&self, description: &TestDescription) {
        // The handle is dropped: the supervisor thread keeps running detached.
        if let Err(e) = self.finish_cycle(description) {
            tracing::error!(test = %description, error = %format!("{e:#}"), "leak detection cycle failed");
        }
    }

    fn test_failure(&self, _failure: &Failure) {
        self.mark_skipped("failed");
    }

    fn test_assumption_failure(&self, _failure: &Failure) {
        self.mark_skipped("had an assumption failure");
    }

    fn test_ignored(&self, _description: &TestDescription) {
        self.mark_skipped("was ignored");
    }

    fn test_run_finished(&self, summary: &RunSummary) {
        tracing::info!(run_count = summary.run_count, failures = summary.failures.len(), "test run finished");
    }
}
