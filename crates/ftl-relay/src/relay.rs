use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use ftl_core::{Decision, Event, EventKind, Failure, TestDescription, KEY_FAILURE, KEY_RESULT};
use ftl_gate::CompletionGate;

use crate::sink::EventSink;
use crate::trace::rewrite_failure;

/// Sits between the test runner and the real sink.
///
/// Every notification is forwarded synchronously, in arrival order. The one
/// exception is `TEST_FINISHED`, which is parked on the [`CompletionGate`]
/// until the cycle's decision is known and may be preceded by a synthetic
/// failure.
pub struct EventRelay<S: EventSink> {
    sink: S,
    gate: Arc<CompletionGate>,
    failures: Mutex<Vec<Failure>>,
}

impl<S: EventSink> EventRelay<S> {
    pub fn new(sink: S, gate: Arc<CompletionGate>) -> Self {
        Self {
            sink,
            gate,
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn gate(&self) -> &Arc<CompletionGate> {
        &self.gate
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Synthetic failures resolved so far and not yet merged into a run summary.
    pub fn accumulated_failures(&self) -> Vec<Failure> {
        self.lock_failures().clone()
    }

    fn lock_failures(&self) -> MutexGuard<'_, Vec<Failure>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handle(&self, event: Event) -> Result<()> {
        match event.kind {
            EventKind::TestFinished => self.handle_finished(event),
            EventKind::TestFailure => self.handle_failure(event),
            EventKind::TestRunFinished => self.handle_run_finished(event),
            _ => self.forward(event),
        }
    }

    fn handle_finished(&self, event: Event) -> Result<()> {
        tracing::debug!(test = ?event.description(), "received finished");
        match self.gate.submit_event(&event)? {
            Decision::NoReplacement => {
                tracing::debug!("forwarding finished");
                self.forward(event)
            }
            Decision::Replacement(failure) => {
                tracing::debug!(test = %failure.description, "sending replacement before finished");
                let replacement = Event::failure(&failure)?;
                self.lock_failures().push(failure);
                self.forward(replacement)?;
                self.forward(event)
            }
        }
    }

    fn handle_failure(&self, mut event: Event) -> Result<()> {
        let failure = rewrite_failure(event.decode_failure()?);
        event.set_field(KEY_FAILURE, &failure)?;
        self.forward(event)
    }

    fn handle_run_finished(&self, mut event: Event) -> Result<()> {
        let mut failures = self.lock_failures();
        if failures.is_empty() {
            drop(failures);
            return self.forward(event);
        }
        // decode before draining so a malformed summary loses nothing
        let mut summary = event.decode_summary()?;
        tracing::debug!(count = failures.len(), "merging synthetic failures into run summary");
        summary.failures.append(&mut failures);
        drop(failures);
        event.set_field(KEY_RESULT, &summary)?;
        self.forward(event)
    }

    fn forward(&self, event: Event) -> Result<()> {
        tracing::debug!(kind = %event.kind, "forwarded");
        self.sink.send_test_notification(event)
    }
}

impl<S: EventSink> EventSink for EventRelay<S> {
    fn send_test_notification(&self, event: Event) -> Result<()> {
        self.handle(event)
    }

    fn add_test(&self, description: &TestDescription) -> Result<()> {
        self.sink.add_test(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingSink;
    use ftl_core::{EventError, GateError, RunSummary};

    fn relay() -> EventRelay<Arc<RecordingSink>> {
        EventRelay::new(Arc::new(RecordingSink::new()), Arc::new(CompletionGate::new()))
    }

    fn desc() -> TestDescription {
        TestDescription::new("LeakTest", "leaks")
    }

    #[test]
    fn passes_other_kinds_through() {
        let r = relay();
        let started = Event::for_test(EventKind::TestStarted, &desc());
        r.handle(started.clone()).unwrap();
        assert_eq!(r.sink().events(), vec![started]);
    }

    #[test]
    fn finished_waits_for_stored_decision() {
        let r = relay();
        r.gate().submit_decision(Decision::NoReplacement).unwrap();
        let finished = Event::for_test(EventKind::TestFinished, &desc());
        r.handle(finished.clone()).unwrap();
        assert_eq!(r.sink().events(), vec![finished]);
        assert!(r.accumulated_failures().is_empty());
    }

    #[test]
    fn replacement_precedes_finished() {
        let r = relay();
        let leak = Failure::new(desc(), "2 leaks found");
        r.gate().submit_decision(Decision::Replacement(leak.clone())).unwrap();
        let finished = Event::for_test(EventKind::TestFinished, &desc());
        r.handle(finished.clone()).unwrap();

        let events = r.sink().events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::TestFailure);
        assert_eq!(events[0].decode_failure().unwrap(), leak);
        assert_eq!(events[1], finished);
        assert_eq!(r.accumulated_failures(), vec![leak]);
    }

    #[test]
    fn failure_trace_is_rewritten() {
        let r = relay();
        let original = Failure::new(desc(), "assertion failed");
        r.handle(Event::failure(&original).unwrap()).unwrap();
        let got = r.sink().events()[0].decode_failure().unwrap();
        assert_eq!(got.description, original.description);
        assert_eq!(got.message, original.message);
        assert!(got.trace.starts_with("RelayedFailure: assertion failed"));
    }

    #[test]
    fn failure_without_payload_is_an_error() {
        let r = relay();
        let err = r.handle(Event::new(EventKind::TestFailure)).unwrap_err();
        assert!(matches!(err.downcast_ref::<EventError>(), Some(EventError::MissingField { .. })));
        assert!(r.sink().events().is_empty());
    }

    #[test]
    fn run_finished_unchanged_without_failures() {
        let r = relay();
        let ev = Event::run_finished(&RunSummary { run_count: 2, ..Default::default() }).unwrap();
        r.handle(ev.clone()).unwrap();
        assert_eq!(r.sink().events(), vec![ev]);
    }

    #[test]
    fn malformed_summary_keeps_accumulated_failures() {
        let r = relay();
        let leak = Failure::new(desc(), "leak");
        r.gate().submit_decision(Decision::Replacement(leak.clone())).unwrap();
        r.handle(Event::for_test(EventKind::TestFinished, &desc())).unwrap();

        let bad = Event::new(EventKind::TestRunFinished).with_field(KEY_RESULT, serde_json::json!(7));
        assert!(r.handle(bad).is_err());
        assert_eq!(r.accumulated_failures(), vec![leak]);
    }

    #[test]
    fn second_waiter_error_propagates() {
        let r = Arc::new(relay());
        let waiter = {
            let r = Arc::clone(&r);
            std::thread::spawn(move || r.handle(Event::for_test(EventKind::TestFinished, &desc())))
        };
        while r.gate().state() != ftl_core::GateState::EventWaiting {
            std::thread::yield_now();
        }
        let err = r.handle(Event::for_test(EventKind::TestFinished, &desc())).unwrap_err();
        assert_eq!(err.downcast_ref::<GateError>(), Some(&GateError::EventAlreadyWaiting));
        r.gate().submit_decision(Decision::NoReplacement).unwrap();
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn add_test_delegates() {
        let r = relay();
        r.add_test(&desc()).unwrap();
        assert_eq!(r.sink().tests(), vec![desc()]);
    }
}
