//! Single-slot rendezvous between the finished event and its decision.
//!
//! Exactly two parties touch a gate per test cycle: the event consumer,
//! which calls [`CompletionGate::submit_event`] once, and the decision
//! producer, which calls [`CompletionGate::submit_decision`] once. Whichever
//! arrives second resolves the cycle, and the slot returns to `Empty`.
//!
//! ```text
//!            submit_event                 submit_decision
//! Empty ───────────────────► EventWaiting ───────────────► Resolved ──► Empty
//!   │                                                         ▲  (waiter takes it)
//!   │ submit_decision                      submit_event       │
//!   └──────────────────► DecisionWaiting ─────────────────────┘──► Empty
//! ```
//!
//! There is no timeout and no cancellation here: a caller that enters
//! `submit_event` blocks until somebody supplies a decision.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use ftl_core::{Decision, Event, GateError, GateState};

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    EventWaiting,
    DecisionWaiting(Decision),
    Resolved(Decision),
}

impl Slot {
    fn state(&self) -> GateState {
        match self {
            Slot::Empty => GateState::Empty,
            Slot::EventWaiting => GateState::EventWaiting,
            Slot::DecisionWaiting(_) => GateState::DecisionWaiting,
            Slot::Resolved(_) => GateState::Resolved,
        }
    }
}

#[derive(Debug, Default)]
pub struct CompletionGate {
    slot: Mutex<Slot>,
    resolved: Condvar,
}

impl CompletionGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_unpoisoned(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands the finished event to the gate and blocks until the cycle's
    /// decision is available.
    ///
    /// Returns immediately when the decision was posted first. The gate is
    /// `Empty` again when this returns `Ok`.
    ///
    /// Precondition: at most one caller waits per cycle; a second concurrent
    /// call fails with [`GateError::EventAlreadyWaiting`].
    pub fn submit_event(&self, event: &Event) -> Result<Decision, GateError> {
        let mut slot = self.lock_unpoisoned();
        match std::mem::take(&mut *slot) {
            Slot::DecisionWaiting(decision) => {
                tracing::debug!(kind = %event.kind, "decision already posted, not blocking");
                return Ok(decision);
            }
            Slot::Empty => {
                *slot = Slot::EventWaiting;
            }
            other @ (Slot::EventWaiting | Slot::Resolved(_)) => {
                *slot = other;
                return Err(GateError::EventAlreadyWaiting);
            }
        }

        tracing::debug!(kind = %event.kind, "blocking on finished event until a decision arrives");
        loop {
            slot = self.resolved.wait(slot).unwrap_or_else(PoisonError::into_inner);
            // spurious wakeups leave the slot in EventWaiting
            if matches!(*slot, Slot::Resolved(_)) {
                if let Slot::Resolved(decision) = std::mem::take(&mut *slot) {
                    tracing::debug!("unblocked with decision");
                    return Ok(decision);
                }
            }
        }
    }

    /// Posts the cycle's decision. Never blocks.
    ///
    /// If a finished event is waiting it is woken with `decision`; otherwise
    /// the decision is stored for the next `submit_event`.
    ///
    /// Precondition: one decision per cycle; posting while an earlier one is
    /// still unconsumed fails with [`GateError::DecisionAlreadyPending`].
    pub fn submit_decision(&self, decision: Decision) -> Result<(), GateError> {
        let mut slot = self.lock_unpoisoned();
        match &*slot {
            Slot::Empty => {
                tracing::debug!(replacement = decision.is_replacement(), "no waiter yet, storing decision");
                *slot = Slot::DecisionWaiting(decision);
                Ok(())
            }
            Slot::EventWaiting => {
                tracing::debug!(replacement = decision.is_replacement(), "waking finished event");
                *slot = Slot::Resolved(decision);
                drop(slot);
                self.resolved.notify_one();
                Ok(())
            }
            Slot::DecisionWaiting(_) | Slot::Resolved(_) => Err(GateError::DecisionAlreadyPending),
        }
    }

    pub fn state(&self) -> GateState {
        self.lock_unpoisoned().state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftl_core::{EventKind, Failure, TestDescription};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn finished() -> Event {
        Event::for_test(EventKind::TestFinished, &TestDescription::new("A", "b"))
    }

    fn leak() -> Decision {
        Decision::Replacement(Failure::new(TestDescription::new("A", "b"), "1 leak"))
    }

    fn wait_for_state(gate: &CompletionGate, want: GateState) {
        for _ in 0..500 {
            if gate.state() == want {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("gate never reached {want:?}, stuck at {:?}", gate.state());
    }

    #[test]
    fn decision_first_returns_without_blocking() {
        let gate = CompletionGate::new();
        gate.submit_decision(Decision::NoReplacement).unwrap();
        assert_eq!(gate.state(), GateState::DecisionWaiting);
        assert_eq!(gate.submit_event(&finished()).unwrap(), Decision::NoReplacement);
        assert_eq!(gate.state(), GateState::Empty);
    }

    #[test]
    fn event_first_blocks_until_decision() {
        let gate = Arc::new(CompletionGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.submit_event(&finished()))
        };
        wait_for_state(&gate, GateState::EventWaiting);
        gate.submit_decision(leak()).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), leak());
        assert_eq!(gate.state(), GateState::Empty);
    }

    #[test]
    fn second_decision_is_rejected() {
        let gate = CompletionGate::new();
        gate.submit_decision(Decision::NoReplacement).unwrap();
        assert_eq!(gate.submit_decision(leak()), Err(GateError::DecisionAlreadyPending));
        // the first decision survives
        assert_eq!(gate.submit_event(&finished()).unwrap(), Decision::NoReplacement);
    }

    #[test]
    fn second_waiter_is_rejected() {
        let gate = Arc::new(CompletionGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.submit_event(&finished()))
        };
        wait_for_state(&gate, GateState::EventWaiting);
        assert_eq!(gate.submit_event(&finished()), Err(GateError::EventAlreadyWaiting));
        gate.submit_decision(Decision::NoReplacement).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), Decision::NoReplacement);
    }

    #[test]
    fn gate_resets_between_cycles() {
        let gate = CompletionGate::new();
        gate.submit_decision(leak()).unwrap();
        assert_eq!(gate.submit_event(&finished()).unwrap(), leak());
        gate.submit_decision(Decision::NoReplacement).unwrap();
        assert_eq!(gate.submit_event(&finished()).unwrap(), Decision::NoReplacement);
        assert_eq!(gate.state(), GateState::Empty);
    }
}
