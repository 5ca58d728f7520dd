pub mod config;
pub mod coordinator;
pub mod detector;
pub mod report;
pub mod scenario;
pub mod skip;
pub mod util;

pub use config::*;
pub use coordinator::*;
pub use detector::*;
pub use report::*;
pub use skip::*;
pub use util::*;


#[cfg(test)]
mod scenario_tests {
    use super::scenario::*;
    use ftl_core::{EventKind, TestDescription};
    use std::path::{Path, PathBuf};

    fn dir(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/scenarios").join(name)
    }

    fn run(name: &str) -> ScenarioResult {
        let p = dir(name);
        let exp = load_expected(&p).unwrap();
        assert_eq!(exp.scenario_id, name);
        let res = simulate(&p).unwrap();
        let problems = check_expected(&res, &exp);
        assert!(problems.is_empty(), "{name}: {problems:#?}");
        res
    }

    #[test]
    fn scenario_sc01_clean_run_passes_finished_through() {
        let res = run("SC-01-clean-run");
        assert!(res.synthetic_failures.is_empty());
        assert!(res.summary.was_successful());
        assert_eq!(res.summary.run_count, 2);
    }

    #[test]
    fn scenario_sc02_late_leak_decision_injects_failure_before_finished() {
        let res = run("SC-02-leak-event-first");
        let failure = res.forwarded[2].decode_failure().unwrap();
        assert_eq!(failure.description, TestDescription::new("com.example.LeakTest", "leaksActivity"));
        assert_eq!(res.forwarded[3].kind, EventKind::TestFinished);
        assert_eq!(res.forwarded[3].description(), Some(failure.description.clone()));
        assert_eq!(res.synthetic_failures, vec![failure]);
    }

    #[test]
    fn scenario_sc03_early_leak_decision_same_outcome() {
        let late = run("SC-02-leak-event-first");
        let early = run("SC-03-leak-decision-first");
        assert_eq!(late.kinds(), early.kinds());
    }

    #[test]
    fn scenario_sc04_failed_ignored_and_assumption_tests_skip_analysis() {
        let res = run("SC-04-failed-test-skipped");
        assert!(res.synthetic_failures.is_empty());
        assert_eq!(res.summary.ignore_count, 1);
        // the real failure had its trace rewritten on the way through
        let relayed = res.forwarded[2].decode_failure().unwrap();
        assert!(relayed.trace.starts_with("RelayedFailure: scripted failure"));
    }

    #[test]
    fn scenario_sc05_analysis_crashes_fail_the_test() {
        let res = run("SC-05-analysis-crash");
        assert_eq!(res.synthetic_failures.len(), 3);
    }

    #[test]
    fn scenario_sc06_hung_analysis_times_out_and_run_continues() {
        let res = run("SC-06-analysis-timeout");
        assert_eq!(res.summary.run_count, 2);
    }

    #[test]
    fn scenario_sc07_skip_rules_suppress_analysis() {
        let res = run("SC-07-skip-rules");
        assert!(res.synthetic_failures.is_empty());
    }

    #[test]
    fn scenario_sc08_summary_keeps_resolution_order() {
        let res = run("SC-08-mixed-run");
        let messages: Vec<_> = res.summary.failures.iter().map(|f| f.description.method_name.as_str()).collect();
        assert_eq!(messages, vec!["third", "first", "fourth"]);
    }

    #[test]
    fn missing_script_is_an_error() {
        let err = simulate(&dir("does-not-exist")).unwrap_err();
        assert!(format!("{err:#}").contains("script.yaml"));
    }
}
