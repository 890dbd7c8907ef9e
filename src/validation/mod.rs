//! Cross-file validation of a candidate configuration.
//!
//! # Responsibilities
//! - Parse the scraper, collector and trace-backend documents independently
//! - Report parse failures per file and stop before cross-file checks
//! - Run every rule in [`rules::RULES`] over the parsed documents
//!
//! # Design Decisions
//! - Pure: no I/O, no clock; identical input gives identical output
//! - Rules are independent functions so each can be tested alone
//! - `valid` is always exactly `errors.is_empty()`

pub mod rules;

use serde::{Deserialize, Serialize};

use crate::config::TopologyConfig;
use crate::yaml;

pub use rules::ParsedDocuments;

pub const SCRAPER_FILE: &str = "prometheus.yml";
pub const COLLECTOR_FILE: &str = "collector.yaml";
pub const TRACE_BACKEND_FILE: &str = "tempo config";

/// Outcome of validating a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Non-fatal advisories. No rule emits one yet.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// A rejection carrying a single error, for failures raised while building the candidate.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self::from_parts(vec![error.into()], Vec::new())
    }
}

/// Validate against the default stack topology.
pub fn validate(scraper: &str, collector: &str, trace_backend: &str) -> ValidationResult {
    validate_with(&TopologyConfig::default(), scraper, collector, trace_backend)
}

/// Validate against an explicit topology.
pub fn validate_with(
    topology: &TopologyConfig,
    scraper: &str,
    collector: &str,
    trace_backend: &str,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut parse = |raw: &str, file: &str| match yaml::parse_document(raw) {
        Ok(doc) => Some(doc),
        Err(e) => {
            errors.push(format!("{}: {}", file, e));
            None
        }
    };

    let scraper = parse(scraper, SCRAPER_FILE);
    let collector = parse(collector, COLLECTOR_FILE);
    let trace_backend = parse(trace_backend, TRACE_BACKEND_FILE);

    let (Some(scraper), Some(collector), Some(trace_backend)) = (scraper, collector, trace_backend)
    else {
        return ValidationResult::from_parts(errors, Vec::new());
    };

    let docs = ParsedDocuments {
        scraper,
        collector,
        trace_backend,
    };
    errors.extend(rules::RULES.iter().filter_map(|rule| rule(&docs, topology)));

    ValidationResult::from_parts(errors, Vec::new())
}
