pub mod patterns;
pub mod classifier;

pub use classifier::{detect, Finding};

use serde::{Deserialize, Serialize};
use std::fmt;

use self::patterns::MatchRule;

/// Category of sensitive data the masker knows how to find.
///
/// The declaration order is the scan order used by both the detector and the
/// redactor, and it is observable: a value claimed by an earlier category is
/// never reported again, and later categories run on text already rewritten
/// by earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveDataType {
    Email,
    Phone,
    CreditCard,
    NationalId,
}

impl SensitiveDataType {
    /// Every category, in scan order.
    pub const ALL: [SensitiveDataType; 4] = [
        SensitiveDataType::Email,
        SensitiveDataType::Phone,
        SensitiveDataType::CreditCard,
        SensitiveDataType::NationalId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensitiveDataType::Email => "email",
            SensitiveDataType::Phone => "phone",
            SensitiveDataType::CreditCard => "credit_card",
            SensitiveDataType::NationalId => "national_id",
        }
    }

    /// The match rule registered for this category.
    pub fn rule(&self) -> &'static MatchRule {
        patterns::rule_for(*self)
    }
}

impl fmt::Display for SensitiveDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enabled() -> bool {
    true
}

/// User-facing category switches, one per category.
///
/// Missing flags deserialize as enabled so a first request without any
/// options scans for everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskOptions {
    #[serde(default = "enabled")]
    pub mask_email: bool,
    #[serde(default = "enabled")]
    pub mask_phone: bool,
    #[serde(default = "enabled")]
    pub mask_credit_card: bool,
    #[serde(default = "enabled", alias = "mask_ssn")]
    pub mask_national_id: bool,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            mask_email: true,
            mask_phone: true,
            mask_credit_card: true,
            mask_national_id: true,
        }
    }
}

impl MaskOptions {
    pub fn is_enabled(&self, category: SensitiveDataType) -> bool {
        match category {
            SensitiveDataType::Email => self.mask_email,
            SensitiveDataType::Phone => self.mask_phone,
            SensitiveDataType::CreditCard => self.mask_credit_card,
            SensitiveDataType::NationalId => self.mask_national_id,
        }
    }

    pub fn active_categories(&self) -> ActiveCategories {
        ActiveCategories::from_options(self)
    }
}

/// The categories enabled for one operation, always iterated in scan order
/// regardless of how they were selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCategories {
    enabled: [bool; 4],
}

impl ActiveCategories {
    pub fn all() -> Self {
        Self { enabled: [true; 4] }
    }

    pub fn none() -> Self {
        Self { enabled: [false; 4] }
    }

    pub fn from_options(options: &MaskOptions) -> Self {
        let mut active = Self::none();
        for category in SensitiveDataType::ALL {
            if options.is_enabled(category) {
                active = active.with(category);
            }
        }
        active
    }

    pub fn with(mut self, category: SensitiveDataType) -> Self {
        self.enabled[category as usize] = true;
        self
    }

    pub fn contains(&self, category: SensitiveDataType) -> bool {
        self.enabled[category as usize]
    }

    pub fn is_empty(&self) -> bool {
        !self.enabled.iter().any(|on| *on)
    }

    pub fn iter(&self) -> impl Iterator<Item = SensitiveDataType> + '_ {
        SensitiveDataType::ALL
            .into_iter()
            .filter(move |category| self.contains(*category))
    }
}

impl Default for ActiveCategories {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<SensitiveDataType> for ActiveCategories {
    fn from_iter<I: IntoIterator<Item = SensitiveDataType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), |active, category| active.with(category))
    }
}
