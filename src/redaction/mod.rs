pub mod counters;
pub mod redactor;

pub use counters::RedactionCounters;
pub use redactor::{redact, ExemptionSet};
