use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::skip::SkipRules;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub skip: SkipConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Upper bound on one leak analysis before the test is failed anyway.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    60_000
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SkipConfig {
    /// Fully qualified class names.
    #[serde(default)]
    pub classes: Vec<String>,
    /// `Class#method` entries.
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub method_prefixes: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    pub dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: "~/.ftl/reports".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// env-filter syntax
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            analysis: AnalysisConfig {
                timeout_ms: default_timeout_ms(),
            },
            skip: SkipConfig::default(),
            report: ReportConfig::default(),
            log: LogConfig::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Loads `path` when it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis.timeout_ms)
    }

    pub fn skip_rules(&self) -> SkipRules {
        SkipRules::from_config(&self.skip)
    }

    pub fn report_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.report.dir).to_string())
    }

    pub fn config_path(root: &Path) -> PathBuf {
        root.join(".ftl").join("ftl.toml")
    }
}
