use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ftl_core::{Decision, Event, EventKind, Failure, GateState, TestDescription};
use ftl_gate::CompletionGate;

fn finished(i: usize) -> Event {
    Event::for_test(EventKind::TestFinished, &TestDescription::new("RaceTest", format!("cycle{i}")))
}

fn decision_for(i: usize) -> Decision {
    if i % 2 == 0 {
        Decision::NoReplacement
    } else {
        Decision::Replacement(Failure::new(TestDescription::new("RaceTest", format!("cycle{i}")), "leak"))
    }
}

#[test]
fn both_orders_yield_the_same_decision() {
    for i in 0..8 {
        let event_first = {
            let gate = Arc::new(CompletionGate::new());
            let waiter = {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.submit_event(&finished(i)))
            };
            thread::sleep(Duration::from_millis(5));
            gate.submit_decision(decision_for(i)).unwrap();
            waiter.join().unwrap().unwrap()
        };

        let decision_first = {
            let gate = CompletionGate::new();
            gate.submit_decision(decision_for(i)).unwrap();
            gate.submit_event(&finished(i)).unwrap()
        };

        assert_eq!(event_first, decision_first);
        assert_eq!(event_first, decision_for(i));
    }
}

#[test]
fn many_cycles_with_unsynchronized_producer() {
    let gate = Arc::new(CompletionGate::new());
    let cycles = 200;

    // The producer posts one decision per cycle, but only after the consumer
    // has finished the previous cycle, mirroring one analysis per test.
    let (next_tx, next_rx) = std::sync::mpsc::channel::<usize>();
    let producer = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            for i in next_rx {
                if i % 3 == 0 {
                    thread::yield_now();
                }
                gate.submit_decision(decision_for(i)).unwrap();
            }
        })
    };

    for i in 0..cycles {
        next_tx.send(i).unwrap();
        if i % 5 == 0 {
            thread::sleep(Duration::from_micros(200));
        }
        let got = gate.submit_event(&finished(i)).unwrap();
        assert_eq!(got, decision_for(i), "cycle {i}");
    }
    drop(next_tx);
    producer.join().unwrap();
    assert_eq!(gate.state(), GateState::Empty);
}
