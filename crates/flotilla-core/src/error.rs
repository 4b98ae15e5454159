//! Error taxonomy for descriptor resolution.
//!
//! Four classes, all value-returned and all carrying the offending
//! identifier: [`ValidationError`] for malformed label keys/values,
//! [`ContentError`] for descriptor-plan failures, [`ConflictError`] for
//! ambiguous or duplicate configuration entries, and [`IllegalStateError`]
//! for unsupported lifecycle targets. Components return the narrowest class
//! that can occur; the resolution pipeline returns the aggregate [`Error`].

use thiserror::Error;

/// Rule violated by a label key, prefix, or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelRule {
    Empty,
    TooLong,
    EdgeNotAlphanumeric,
    InvalidCharacter,
}

impl LabelRule {
    pub fn describe(&self) -> &'static str {
        match self {
            LabelRule::Empty => "must not be empty",
            LabelRule::TooLong => "must be 63 characters or less",
            LabelRule::EdgeNotAlphanumeric => {
                "must start and end with an alphanumeric character"
            }
            LabelRule::InvalidCharacter => {
                "may contain only alphanumeric characters, '-', '_' and '.'"
            }
        }
    }
}

/// Malformed label key or value in a metadata criteria expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {subject} '{value}': {}", rule.describe())]
pub struct ValidationError {
    /// What was being validated ("label key", "label prefix", "label value").
    pub subject: &'static str,
    pub rule: LabelRule,
    pub value: String,
}

impl ValidationError {
    pub fn new(subject: &'static str, rule: LabelRule, value: impl Into<String>) -> Self {
        Self {
            subject,
            rule,
            value: value.into(),
        }
    }
}

/// Descriptor content that cannot be resolved into a deployment plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("unable to resolve '{dependency}' required by {container}")]
    UnresolvedReference {
        dependency: String,
        container: String,
    },

    #[error("unable to resolve property '{key}' of '{dependency}'")]
    UnresolvedProperty { dependency: String, key: String },

    #[error("cyclic reference detected: {}", chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },

    #[error("cyclic dependencies between services: {}", resources.join(", "))]
    ServiceDependencyCycle { resources: Vec<String> },

    #[error("no configuration entries were found matching the filter of dependency '{dependency}'")]
    NoMatchingEntries { dependency: String },

    #[error("invalid version requirement '{requirement}'")]
    InvalidVersionRequirement { requirement: String },

    #[error("content of configuration entry {entry_id} is not a JSON object")]
    MalformedEntryContent { entry_id: i64 },

    #[error("unable to parse target space '{value}': expected '<org> <space>'")]
    MalformedTargetSpace { value: String },

    #[error("unsupported schema version '{version}'")]
    UnsupportedSchemaVersion { version: String },

    #[error("invalid MTA version '{value}'")]
    InvalidMtaVersion { value: String },

    #[error("deployment descriptor has no ID")]
    MissingMtaId,

    #[error("duplicate {kind} name '{name}' in deployment descriptor")]
    DuplicateName { kind: &'static str, name: String },

    #[error("malformed deployment descriptor: {0}")]
    MalformedDescriptor(String),
}

/// Ambiguity the engine refuses to resolve on the operator's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error(
        "multiple configuration entries ({}) match dependency '{dependency}'; refine the filter",
        format_ids(entry_ids)
    )]
    AmbiguousMatch {
        dependency: String,
        entry_ids: Vec<i64>,
    },

    #[error("configuration entry for provider ({provider_nid}, {provider_id}, {provider_version}) already exists in target '{target}'")]
    DuplicateEntry {
        provider_nid: String,
        provider_id: String,
        provider_version: String,
        target: String,
    },
}

fn format_ids(ids: &[i64]) -> String {
    let rendered: Vec<String> = ids.iter().map(i64::to_string).collect();
    rendered.join(", ")
}

/// A lifecycle target outside the supported state set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal desired application state '{state}': must be STARTED or STOPPED")]
pub struct IllegalStateError {
    pub state: String,
}

/// Aggregate error for the resolution pipeline and command layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    IllegalState(#[from] IllegalStateError),

    /// Transport failure talking to the configuration registry. Retry policy
    /// belongs to the collaborator, not to this engine.
    #[error("configuration registry query failed: {0}")]
    Registry(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_rule_and_value() {
        let err = ValidationError::new("label key", LabelRule::TooLong, "x".repeat(64));
        let message = err.to_string();
        assert!(message.contains("label key"));
        assert!(message.contains("63 characters or less"));
    }

    #[test]
    fn test_reference_cycle_lists_chain() {
        let err = ContentError::ReferenceCycle {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic reference detected: a -> b -> a");
    }

    #[test]
    fn test_ambiguous_match_lists_entry_ids() {
        let err = ConflictError::AmbiguousMatch {
            dependency: "central-logger".into(),
            entry_ids: vec![4, 9],
        };
        assert!(err.to_string().contains("(4, 9)"));
        assert!(err.to_string().contains("central-logger"));
    }
}
