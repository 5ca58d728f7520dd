use serde::{Deserialize, Serialize};

/// Identifies a single test method.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TestDescription {
    pub class_name: String,
    pub method_name: String,
}

impl TestDescription {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }

    /// `Class#method`
    pub fn display_name(&self) -> String {
        format!("{}#{}", self.class_name, self.method_name)
    }
}

impl std::fmt::Display for TestDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)
    }
}

/// Failure descriptor carried by failure events and run summaries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Failure {
    pub description: TestDescription,
    pub message: String,
    #[serde(default)]
    pub trace: String,
}

impl Failure {
    pub fn new(description: TestDescription, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            trace: message.clone(),
            description,
            message,
        }
    }
}

/// Result payload attached to the run-finished notification.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub run_count: u32,
    #[serde(default)]
    pub ignore_count: u32,
    #[serde(default)]
    pub run_time_ms: u64,
    #[serde(default)]
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn was_successful(&self) -> bool {
        self.failures.is_empty()
    }
}
