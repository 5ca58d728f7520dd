use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use ftl_core::{Event, EventKind, Failure, RunListener, RunSummary, TestDescription};
use ftl_gate::CompletionGate;
use ftl_relay::{EventRelay, EventSink, RecordingSink};

use crate::config::{Config, SkipConfig};
use crate::coordinator::{CycleCoordinator, Delivery};
use crate::detector::{ApplicationLeak, DetectionResult, HeapAnalysis, LeakDetector};

#[derive(Debug, Deserialize)]
pub struct ScenarioScript {
    #[serde(default = "default_run_name")]
    pub run: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub skip: SkipConfig,
    pub tests: Vec<ScriptedTest>,
}

fn default_run_name() -> String {
    "ScriptedRun".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScriptedTest {
    pub class: String,
    pub method: String,
    #[serde(default)]
    pub outcome: ScriptedOutcome,
    #[serde(default)]
    pub analysis: ScriptedAnalysis,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub order: FinishOrder,
}

impl ScriptedTest {
    pub fn description(&self) -> TestDescription {
        TestDescription::new(self.class.clone(), self.method.clone())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedOutcome {
    #[default]
    Pass,
    Fail,
    Ignored,
    AssumptionFailure,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedAnalysis {
    /// Nothing retained, no heap dump taken.
    None,
    #[default]
    Clean,
    Leaks { leaks: Vec<String> },
    Failure { error: String },
    Error { error: String },
    Panic,
    Hang,
}

/// Which side of the rendezvous reaches the gate first.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishOrder {
    #[default]
    EventFirst,
    DecisionFirst,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioExpected {
    pub scenario_id: String,
    pub kinds: Vec<EventKind>,
    pub summary_failures: usize,
    #[serde(default)]
    pub failure_messages_contain: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScenarioResult {
    pub forwarded: Vec<Event>,
    pub summary: RunSummary,
    /// Failures injected by leak decisions, in resolution order.
    pub synthetic_failures: Vec<Failure>,
}

impl ScenarioResult {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.forwarded.iter().map(|e| e.kind).collect()
    }
}

pub fn load_script(dir: &Path) -> Result<ScenarioScript> {
    let p = dir.join("script.yaml");
    let s = std::fs::read_to_string(&p).with_context(|| format!("read script.yaml: {}", p.display()))?;
    let script: ScenarioScript = serde_yaml::from_str(&s).with_context(|| "parse script.yaml")?;
    if script.tests.is_empty() {
        return Err(anyhow!("scenario {} has no tests", dir.display()));
    }
    Ok(script)
}

pub fn load_expected(dir: &Path) -> Result<ScenarioExpected> {
    let p = dir.join("expected.yaml");
    let s = std::fs::read_to_string(&p).with_context(|| format!("read expected.yaml: {}", p.display()))?;
    let exp: ScenarioExpected = serde_yaml::from_str(&s).with_context(|| "parse expected.yaml")?;
    Ok(exp)
}

/// Detector that answers from the script instead of a heap dump.
pub struct ScriptedDetector {
    by_test: HashMap<TestDescription, (ScriptedAnalysis, Duration)>,
}

impl ScriptedDetector {
    pub fn new(tests: &[ScriptedTest]) -> Self {
        let by_test = tests
            .iter()
            .map(|t| (t.description(), (t.analysis.clone(), Duration::from_millis(t.delay_ms))))
            .collect();
        Self { by_test }
    }
}

impl LeakDetector for ScriptedDetector {
    fn detect_leaks(&self, test: &TestDescription) -> Result<DetectionResult> {
        let (analysis, delay) = self
            .by_test
            .get(test)
            .cloned()
            .unwrap_or((ScriptedAnalysis::Clean, Duration::ZERO));
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        match analysis {
            ScriptedAnalysis::None => Ok(DetectionResult::NoAnalysis {
                reason: "no retained objects".to_string(),
            }),
            ScriptedAnalysis::Clean => Ok(DetectionResult::AnalysisPerformed(HeapAnalysis::Success {
                application_leaks: vec![],
                library_leak_count: 0,
                analysis_duration_ms: delay.as_millis() as u64,
            })),
            ScriptedAnalysis::Leaks { leaks } => Ok(DetectionResult::AnalysisPerformed(HeapAnalysis::Success {
                application_leaks: leaks
                    .into_iter()
                    .map(|short_description| ApplicationLeak {
                        short_description,
                        retained_heap_bytes: None,
                    })
                    .collect(),
                library_leak_count: 0,
                analysis_duration_ms: delay.as_millis() as u64,
            })),
            ScriptedAnalysis::Failure { error } => {
                Ok(DetectionResult::AnalysisPerformed(HeapAnalysis::Failure { error }))
            }
            ScriptedAnalysis::Error { error } => Err(anyhow!(error)),
            ScriptedAnalysis::Panic => panic!("scripted analysis panic for {}", test),
            ScriptedAnalysis::Hang => loop {
                thread::park();
            },
        }
    }
}

/// Replays a scripted run through the coordinator and the relay, the way a
/// test runner with the relay installed would drive them:
/// - the runner's notifications go through `EventRelay` into a recording sink
/// - the listener callbacks go to `CycleCoordinator`
/// - each test's finished notification is gated on its leak decision
pub fn simulate(dir: &Path) -> Result<ScenarioResult> {
    let script = load_script(dir)?;

    let mut cfg = Config::default_config();
    cfg.skip = script.skip.clone();
    if let Some(ms) = script.timeout_ms {
        cfg.analysis.timeout_ms = ms;
    }

    let sink = Arc::new(RecordingSink::new());
    let gate = Arc::new(CompletionGate::new());
    let relay = EventRelay::new(Arc::clone(&sink), Arc::clone(&gate));
    let coordinator = CycleCoordinator::from_config(
        &cfg,
        Arc::new(ScriptedDetector::new(&script.tests)),
        Delivery::Gated(gate),
    );

    let started = Instant::now();
    let run = TestDescription::new(script.run.clone(), "");
    relay.handle(Event::for_test(EventKind::TestRunStarted, &run))?;
    coordinator.test_run_started(&run);

    let mut summary = RunSummary::default();
    for test in &script.tests {
        let d = test.description();
        relay.add_test(&d)?;
        coordinator.test_started(&d);
        relay.handle(Event::for_test(EventKind::TestStarted, &d))?;

        match test.outcome {
            ScriptedOutcome::Pass => {}
            ScriptedOutcome::Fail => {
                let f = Failure::new(d.clone(), format!("scripted failure in {}", d));
                coordinator.test_failure(&f);
                relay.handle(Event::failure(&f)?)?;
                summary.failures.push(f);
            }
            ScriptedOutcome::Ignored => {
                coordinator.test_ignored(&d);
                relay.handle(Event::for_test(EventKind::TestIgnored, &d))?;
                summary.ignore_count += 1;
            }
            ScriptedOutcome::AssumptionFailure => {
                let f = Failure::new(d.clone(), "scripted assumption failure");
                coordinator.test_assumption_failure(&f);
                let mut ev = Event::for_test(EventKind::TestAssumptionFailure, &d);
                ev.set_field(ftl_core::KEY_FAILURE, &f)?;
                relay.handle(ev)?;
            }
        }

        let finished = Event::for_test(EventKind::TestFinished, &d);
        let handle = coordinator.finish_cycle(&d)?;
        match test.order {
            FinishOrder::DecisionFirst => {
                handle.wait();
                relay.handle(finished)?;
            }
            FinishOrder::EventFirst => {
                relay.handle(finished)?;
                handle.wait();
            }
        }
        summary.run_count += 1;
    }

    summary.run_time_ms = started.elapsed().as_millis() as u64;
    coordinator.test_run_finished(&summary);
    let synthetic_failures = relay.accumulated_failures();
    relay.handle(Event::run_finished(&summary)?)?;

    let forwarded = sink.events();
    let merged = forwarded
        .last()
        .ok_or_else(|| anyhow!("nothing was forwarded"))?
        .decode_summary()?;

    Ok(ScenarioResult {
        forwarded,
        summary: merged,
        synthetic_failures,
    })
}

/// Compares a replay against `expected.yaml`. Returns a list of mismatches.
pub fn check_expected(result: &ScenarioResult, exp: &ScenarioExpected) -> Vec<String> {
    let mut problems = Vec::new();
    if result.kinds() != exp.kinds {
        problems.push(format!("forwarded kinds {:?}, expected {:?}", result.kinds(), exp.kinds));
    }
    if result.summary.failures.len() != exp.summary_failures {
        problems.push(format!(
            "summary has {} failures, expected {}",
            result.summary.failures.len(),
            exp.summary_failures
        ));
    }
    for needle in &exp.failure_messages_contain {
        if !result.summary.failures.iter().any(|f| f.message.contains(needle.as_str())) {
            problems.push(format!("no summary failure mentions `{}`", needle));
        }
    }
    problems
}
