use std::sync::Mutex;

use ftl_core::{Event, EventKind, TestDescription};

use crate::sink::EventSink;

/// In-memory sink for tests and scenario replay. Records everything it is sent.
#[derive(Default)]
pub struct RecordingSink {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    events: Vec<Event>,
    tests: Vec<TestDescription>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).events.clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }

    pub fn tests(&self) -> Vec<TestDescription> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).tests.clone()
    }
}

impl EventSink for RecordingSink {
    fn send_test_notification(&self, event: Event) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.events.push(event);
        Ok(())
    }

    fn add_test(&self, description: &TestDescription) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.tests.push(description.clone());
        Ok(())
    }
}
