use regex::Captures;
use std::collections::HashSet;
use tracing::trace;

use super::RedactionCounters;
use crate::data_classifier::ActiveCategories;

/// Literal values a reviewer chose to keep.
///
/// Membership is exact string equality and ignores category: an exempt value
/// survives every rule that would otherwise match it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExemptionSet {
    values: HashSet<String>,
}

impl ExemptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        self.values.insert(value.into())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExemptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Replaces every non-exempt match of the active categories with the
/// category's fixed token.
///
/// Categories run one after another over the text produced by the previous
/// one, in scan order. Each replacement bumps `counters`; exempt matches are
/// left in place and not counted.
pub fn redact(
    text: &str,
    active: &ActiveCategories,
    exemptions: &ExemptionSet,
    counters: &mut RedactionCounters,
) -> String {
    let mut masked = text.to_string();

    for category in active.iter() {
        let rule = category.rule();
        let replaced = rule.regex().replace_all(&masked, |caps: &Captures| {
            let value = &caps[0];
            if exemptions.contains(value) {
                trace!("Keeping exempt {} value", category);
                return value.to_string();
            }
            counters.record(category);
            rule.replacement.to_string()
        });
        masked = replaced.into_owned();
    }

    masked
}
