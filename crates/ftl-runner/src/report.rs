use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ftl_core::RunId;
use serde::Serialize;

use crate::scenario::ScenarioResult;
use crate::util::now_unix;

#[derive(Serialize)]
struct Report<'a> {
    run_id: &'a str,
    scenario: &'a str,
    written_at_unix: i64,
    #[serde(flatten)]
    result: &'a ScenarioResult,
}

/// Writes a replay result as pretty JSON under `dir`, returning the file path.
pub fn write_report(dir: &Path, scenario: &str, result: &ScenarioResult) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create report dir {}", dir.display()))?;
    let run_id = RunId::new();
    let path = dir.join(format!("{}-{}.json", scenario, run_id.as_str()));
    let report = Report {
        run_id: run_id.as_str(),
        scenario,
        written_at_unix: now_unix(),
        result,
    };
    let s = serde_json::to_string_pretty(&report).with_context(|| "serialize report")?;
    std::fs::write(&path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
