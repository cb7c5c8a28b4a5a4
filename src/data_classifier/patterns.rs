use once_cell::sync::Lazy;
use regex::Regex;

use super::SensitiveDataType;

pub static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b")
        .unwrap()
});

// North American numbering: area code and exchange never start with 0 or 1.
pub static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(?\b[2-9][0-9]{2}\)?[-. ]?[2-9][0-9]{2}[-. ]?[0-9]{4}\b").unwrap()
});

// Lexical only, no Luhn check.
pub static CREDIT_CARD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d[ -]*?){13,16}\b").unwrap()
});

pub static NATIONAL_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap()
});

/// A lexical pattern paired with the fixed token that replaces every match.
pub struct MatchRule {
    pub category: SensitiveDataType,
    regex: &'static Lazy<Regex>,
    pub replacement: &'static str,
}

impl MatchRule {
    pub fn regex(&self) -> &'static Regex {
        self.regex
    }
}

impl std::fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchRule")
            .field("category", &self.category)
            .field("pattern", &self.regex.as_str())
            .field("replacement", &self.replacement)
            .finish()
    }
}

static RULES: [MatchRule; 4] = [
    MatchRule {
        category: SensitiveDataType::Email,
        regex: &EMAIL_REGEX,
        replacement: "******@***.**",
    },
    MatchRule {
        category: SensitiveDataType::Phone,
        regex: &PHONE_REGEX,
        replacement: "[PHONE-REDACTED]",
    },
    MatchRule {
        category: SensitiveDataType::CreditCard,
        regex: &CREDIT_CARD_REGEX,
        replacement: "[CC-REDACTED]",
    },
    MatchRule {
        category: SensitiveDataType::NationalId,
        regex: &NATIONAL_ID_REGEX,
        replacement: "***-**-****",
    },
];

pub fn rule_for(category: SensitiveDataType) -> &'static MatchRule {
    &RULES[category as usize]
}
