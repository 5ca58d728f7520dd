use ftl_core::TestDescription;

use crate::config::SkipConfig;

/// Decides, at test start, whether leak detection is skipped for a test.
/// `Some(reason)` skips; the reason is only used for logging.
pub trait SkipPredicate: Send + Sync {
    fn skip_reason(&self, description: &TestDescription) -> Option<String>;
}

impl<F> SkipPredicate for F
where
    F: Fn(&TestDescription) -> Option<String> + Send + Sync,
{
    fn skip_reason(&self, description: &TestDescription) -> Option<String> {
        self(description)
    }
}

pub struct NeverSkip;

impl SkipPredicate for NeverSkip {
    fn skip_reason(&self, _description: &TestDescription) -> Option<String> {
        None
    }
}

/// Config-driven skip list.
#[derive(Clone, Debug, Default)]
pub struct SkipRules {
    classes: Vec<String>,
    tests: Vec<String>,
    method_prefixes: Vec<String>,
}

impl SkipRules {
    pub fn from_config(cfg: &SkipConfig) -> Self {
        Self {
            classes: cfg.classes.clone(),
            tests: cfg.tests.clone(),
            method_prefixes: cfg.method_prefixes.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.tests.is_empty() && self.method_prefixes.is_empty()
    }
}

impl SkipPredicate for SkipRules {
    fn skip_reason(&self, description: &TestDescription) -> Option<String> {
        if self.classes.iter().any(|c| c == &description.class_name) {
            return Some(format!("is in skipped class {}", description.class_name));
        }
        let name = description.display_name();
        if self.tests.iter().any(|t| t == &name) {
            return Some(format!("{} is listed in skip.tests", name));
        }
        self.method_prefixes
            .iter()
            .find(|p| description.method_name.starts_with(p.as_str()))
            .map(|p| format!("method name starts with `{}`", p))
    }
}
