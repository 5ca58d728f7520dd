use serde::{Deserialize, Serialize};

use crate::Failure;

/// Verdict for one test cycle. Produced exactly once by the decision side.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Decision {
    NoReplacement,
    Replacement(Failure),
}

impl Decision {
    pub fn is_replacement(&self) -> bool {
        matches!(self, Decision::Replacement(_))
    }
}
