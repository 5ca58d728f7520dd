use std::fmt;

use ftl_core::{Decision, Failure, TestDescription};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationLeak {
    pub short_description: String,
    pub retained_heap_bytes: Option<u64>,
}

/// Outcome of one heap analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapAnalysis {
    Success {
        application_leaks: Vec<ApplicationLeak>,
        library_leak_count: usize,
        analysis_duration_ms: u64,
    },
    Failure {
        error: String,
    },
}

impl fmt::Display for HeapAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapAnalysis::Success {
                application_leaks,
                library_leak_count,
                analysis_duration_ms,
            } => {
                writeln!(f, "====================================")?;
                writeln!(f, "HEAP ANALYSIS RESULT")?;
                writeln!(f, "====================================")?;
                writeln!(f, "{} APPLICATION LEAKS", application_leaks.len())?;
                for leak in application_leaks {
                    match leak.retained_heap_bytes {
                        Some(bytes) => writeln!(f, "- {} ({} bytes retained)", leak.short_description, bytes)?,
                        None => writeln!(f, "- {}", leak.short_description)?,
                    }
                }
                writeln!(f, "{} LIBRARY LEAKS", library_leak_count)?;
                write!(f, "Analysis duration: {} ms", analysis_duration_ms)
            }
            HeapAnalysis::Failure { error } => write!(f, "HEAP ANALYSIS FAILED: {}", error),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetectionResult {
    AnalysisPerformed(HeapAnalysis),
    /// Nothing was retained, or a heap dump was not possible.
    NoAnalysis { reason: String },
}

/// The heap-analysis collaborator. Runs on a background thread, may be slow.
pub trait LeakDetector: Send + Sync {
    fn detect_leaks(&self, test: &TestDescription) -> anyhow::Result<DetectionResult>;
}

/// Turns a finished analysis into a decision for the gate.
pub trait AnalysisPolicy: Send + Sync {
    fn classify(&self, test: &TestDescription, analysis: &HeapAnalysis) -> Decision;
}

/// Fails the test when the analysis failed or found application leaks.
/// Library leaks alone never fail a test.
pub struct FailOnApplicationLeaks;

impl AnalysisPolicy for FailOnApplicationLeaks {
    fn classify(&self, test: &TestDescription, analysis: &HeapAnalysis) -> Decision {
        match analysis {
            HeapAnalysis::Failure { error } => Decision::Replacement(Failure::new(test.clone(), error.clone())),
            HeapAnalysis::Success { application_leaks, .. } if !application_leaks.is_empty() => {
                Decision::Replacement(Failure::new(
                    test.clone(),
                    format!("Test failed because application memory leaks were detected:\n{}", analysis),
                ))
            }
            HeapAnalysis::Success { .. } => Decision::NoReplacement,
        }
    }
}
