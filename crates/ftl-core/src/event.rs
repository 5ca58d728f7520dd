use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EventError, EventKind, Failure, RunSummary, TestDescription};

pub const KEY_DESCRIPTION: &str = "description";
pub const KEY_FAILURE: &str = "failure";
pub const KEY_RESULT: &str = "result";

/// A single test notification: a kind tag plus opaque keyed fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(rename = "event")]
    pub kind: EventKind,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Event for a single test (started, finished, ignored).
    pub fn for_test(kind: EventKind, description: &TestDescription) -> Self {
        let mut ev = Self::new(kind);
        // TestDescription only holds strings, encoding cannot fail.
        if let Ok(v) = serde_json::to_value(description) {
            ev.fields.insert(KEY_DESCRIPTION.to_string(), v);
        }
        ev
    }

    pub fn failure(failure: &Failure) -> Result<Self, EventError> {
        let mut ev = Self::for_test(EventKind::TestFailure, &failure.description);
        ev.set_field(KEY_FAILURE, failure)?;
        Ok(ev)
    }

    pub fn run_finished(summary: &RunSummary) -> Result<Self, EventError> {
        let mut ev = Self::new(EventKind::TestRunFinished);
        ev.set_field(KEY_RESULT, summary)?;
        Ok(ev)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn decode_field<T: DeserializeOwned>(&self, key: &str) -> Result<T, EventError> {
        let raw = self.fields.get(key).ok_or_else(|| EventError::MissingField {
            kind: self.kind,
            key: key.to_string(),
        })?;
        serde_json::from_value(raw.clone()).map_err(|source| EventError::MalformedField {
            kind: self.kind,
            key: key.to_string(),
            source,
        })
    }

    pub fn set_field<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), EventError> {
        let v = serde_json::to_value(value).map_err(|source| EventError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.fields.insert(key.to_string(), v);
        Ok(())
    }

    pub fn description(&self) -> Option<TestDescription> {
        self.decode_field(KEY_DESCRIPTION).ok()
    }

    pub fn decode_failure(&self) -> Result<Failure, EventError> {
        self.decode_field(KEY_FAILURE)
    }

    pub fn decode_summary(&self) -> Result<RunSummary, EventError> {
        self.decode_field(KEY_RESULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn for_test_carries_description() {
        let d = TestDescription::new("A", "b");
        let ev = Event::for_test(EventKind::TestFinished, &d);
        assert_eq!(ev.description(), Some(d));
    }

    #[test]
    fn decode_missing_field_names_kind_and_key() {
        let ev = Event::new(EventKind::TestFailure);
        let err = ev.decode_failure().unwrap_err();
        assert!(matches!(err, EventError::MissingField { kind: EventKind::TestFailure, ref key } if key == "failure"));
        assert_eq!(err.to_string(), "TEST_FAILURE event is missing field `failure`");
    }

    #[test]
    fn decode_malformed_field() {
        let ev = Event::new(EventKind::TestRunFinished).with_field(KEY_RESULT, json!("not a summary"));
        assert!(matches!(ev.decode_summary(), Err(EventError::MalformedField { .. })));
    }

    #[test]
    fn serializes_kind_under_event_key() {
        let ev = Event::new(EventKind::TestStarted).with_field("extra", json!(1));
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v, json!({"event": "TEST_STARTED", "extra": 1}));
        let back: Event = serde_json::from_value(v).unwrap();
        assert_eq!(back, ev);
    }
}
