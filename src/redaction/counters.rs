use serde::{Deserialize, Serialize};

use crate::data_classifier::SensitiveDataType;

/// Running redaction tally for one top-level masking operation.
///
/// Callers own the instance and pass it to every `redact` call that belongs
/// to the same operation, so a multi-node document ends up with one
/// document-wide total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionCounters {
    pub email: usize,
    pub phone: usize,
    pub credit_card: usize,
    pub national_id: usize,
    pub total: usize,
}

impl RedactionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: SensitiveDataType) -> usize {
        match category {
            SensitiveDataType::Email => self.email,
            SensitiveDataType::Phone => self.phone,
            SensitiveDataType::CreditCard => self.credit_card,
            SensitiveDataType::NationalId => self.national_id,
        }
    }

    /// Records one redaction; `total` moves in lockstep with the category.
    pub fn record(&mut self, category: SensitiveDataType) {
        let slot = match category {
            SensitiveDataType::Email => &mut self.email,
            SensitiveDataType::Phone => &mut self.phone,
            SensitiveDataType::CreditCard => &mut self.credit_card,
            SensitiveDataType::NationalId => &mut self.national_id,
        };
        *slot += 1;
        self.total += 1;
    }

    pub fn category_sum(&self) -> usize {
        SensitiveDataType::ALL.iter().map(|c| self.get(*c)).sum()
    }
}
