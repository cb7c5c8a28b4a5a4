use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

use super::{ActiveCategories, SensitiveDataType};

/// A distinct sensitive value surfaced for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub category: SensitiveDataType,
    pub value: String,
}

impl Finding {
    pub fn new(category: SensitiveDataType, value: impl Into<String>) -> Self {
        Self { category, value: value.into() }
    }
}

/// Scans `text` for every active category and returns each distinct matched
/// value once.
///
/// Results are grouped by category in scan order, then by first appearance.
/// A literal already claimed by an earlier category (or an earlier position)
/// is skipped, so a string that satisfies two rules is only reported under
/// the first one.
pub fn detect(text: &str, active: &ActiveCategories) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for category in active.iter() {
        let before = findings.len();
        for m in category.rule().regex().find_iter(text) {
            let value = m.as_str();
            if seen.insert(value) {
                trace!("New {} finding at offset {}", category, m.start());
                findings.push(Finding::new(category, value));
            }
        }
        debug!("Detected {} distinct {} value(s)", findings.len() - before, category);
    }

    findings
}
