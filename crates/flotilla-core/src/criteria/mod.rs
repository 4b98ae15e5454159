//! Label-selector criteria over configuration entry metadata.
//!
//! A criteria expression is a comma-joined list of clauses over label keys
//! (`mta_id=demo,app_name`), percent-encoded for transport once assembled.
//! Keys and values follow Kubernetes label rules; violations surface as
//! [`ValidationError`] naming the rule and the offending value.
//!
//! Builders are immutable values: every clause consumes the builder and
//! returns a new one, so partially built criteria can be cloned and branched
//! safely.

use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::error::{LabelRule, ValidationError};

/// RFC 3986 query-component escaping. The selector's structural characters
/// (`=`, `!`, `,`, parentheses) are legal in a query and survive unescaped.
const QUERY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>');

pub const MAX_LABEL_LENGTH: usize = 63;

/// A compiled, URL-encoded filter expression. Immutable once built; opaque
/// to callers except for equality and length checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MtaMetadataCriteria {
    query: String,
}

impl MtaMetadataCriteria {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn len(&self) -> usize {
        self.query.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }
}

impl fmt::Display for MtaMetadataCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

/// Combinable builder holding the clauses accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct MtaMetadataCriteriaBuilder {
    queries: Vec<String>,
}

impl MtaMetadataCriteriaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a clause over `key`. The key is validated eagerly.
    pub fn label(self, key: &str) -> Result<LabelCriteriaBuilder, ValidationError> {
        validate_label_key(key)?;
        Ok(LabelCriteriaBuilder {
            queries: self.queries,
            key: key.to_string(),
        })
    }

    /// Open a clause over `prefix/key`. Prefix and key are validated
    /// separately, under the same rules.
    pub fn namespaced_label(
        self,
        prefix: &str,
        key: &str,
    ) -> Result<LabelCriteriaBuilder, ValidationError> {
        validate_label_prefix(prefix)?;
        validate_label_key(key)?;
        Ok(LabelCriteriaBuilder {
            queries: self.queries,
            key: format!("{prefix}/{key}"),
        })
    }

    /// Join the accumulated clauses and percent-encode the result.
    pub fn build(self) -> MtaMetadataCriteria {
        let joined = self.queries.join(",");
        MtaMetadataCriteria {
            query: utf8_percent_encode(&joined, QUERY_ENCODE_SET).to_string(),
        }
    }
}

/// A clause under construction for one label key. Each finishing method
/// returns the combinable builder with the clause appended.
#[derive(Debug, Clone)]
pub struct LabelCriteriaBuilder {
    queries: Vec<String>,
    key: String,
}

impl LabelCriteriaBuilder {
    pub fn exists(self) -> MtaMetadataCriteriaBuilder {
        let clause = self.key.clone();
        self.close(clause)
    }

    pub fn not_exists(self) -> MtaMetadataCriteriaBuilder {
        let clause = format!("!{}", self.key);
        self.close(clause)
    }

    pub fn have_value(self, value: &str) -> Result<MtaMetadataCriteriaBuilder, ValidationError> {
        validate_label_value(value)?;
        let clause = format!("{}={}", self.key, value);
        Ok(self.close(clause))
    }

    pub fn not_have_value(
        self,
        value: &str,
    ) -> Result<MtaMetadataCriteriaBuilder, ValidationError> {
        validate_label_value(value)?;
        let clause = format!("{}!={}", self.key, value);
        Ok(self.close(clause))
    }

    pub fn value_in<S: AsRef<str>>(
        self,
        values: &[S],
    ) -> Result<MtaMetadataCriteriaBuilder, ValidationError> {
        let rendered = render_value_set(values)?;
        let clause = format!("{} in ({rendered})", self.key);
        Ok(self.close(clause))
    }

    pub fn value_not_in<S: AsRef<str>>(
        self,
        values: &[S],
    ) -> Result<MtaMetadataCriteriaBuilder, ValidationError> {
        let rendered = render_value_set(values)?;
        let clause = format!("{} notin ({rendered})", self.key);
        Ok(self.close(clause))
    }

    fn close(mut self, clause: String) -> MtaMetadataCriteriaBuilder {
        self.queries.push(clause);
        MtaMetadataCriteriaBuilder {
            queries: self.queries,
        }
    }
}

fn render_value_set<S: AsRef<str>>(values: &[S]) -> Result<String, ValidationError> {
    let mut rendered = Vec::with_capacity(values.len());
    for value in values {
        validate_label_value(value.as_ref())?;
        rendered.push(value.as_ref().to_string());
    }
    Ok(rendered.join(","))
}

pub fn validate_label_key(key: &str) -> Result<(), ValidationError> {
    validate("label key", key)
}

fn validate_label_prefix(prefix: &str) -> Result<(), ValidationError> {
    validate("label prefix", prefix)
}

/// Blank values are legal in selectors and skip validation entirely.
pub fn validate_label_value(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    validate("label value", value)
}

fn validate(subject: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(subject, LabelRule::Empty, value));
    }
    if value.len() > MAX_LABEL_LENGTH {
        return Err(ValidationError::new(subject, LabelRule::TooLong, value));
    }
    let first = value.chars().next();
    let last = value.chars().last();
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edge_ok(first) || !edge_ok(last) {
        return Err(ValidationError::new(
            subject,
            LabelRule::EdgeNotAlphanumeric,
            value,
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::new(
            subject,
            LabelRule::InvalidCharacter,
            value,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_two_clauses() {
        let criteria = MtaMetadataCriteriaBuilder::new()
            .label("mta_id")
            .unwrap()
            .have_value("demo")
            .unwrap()
            .label("app_name")
            .unwrap()
            .exists()
            .build();
        assert_eq!(criteria.query(), "mta_id=demo,app_name");
    }

    #[test]
    fn test_all_clause_forms() {
        let criteria = MtaMetadataCriteriaBuilder::new()
            .label("a")
            .unwrap()
            .not_exists()
            .label("b")
            .unwrap()
            .not_have_value("x")
            .unwrap()
            .label("c")
            .unwrap()
            .value_in(&["1", "2"])
            .unwrap()
            .label("d")
            .unwrap()
            .value_not_in(&["3"])
            .unwrap()
            .build();
        assert_eq!(criteria.query(), "!a,b!=x,c%20in%20(1,2),d%20notin%20(3)");
    }

    #[test]
    fn test_namespaced_label() {
        let criteria = MtaMetadataCriteriaBuilder::new()
            .namespaced_label("deploy.example.com", "mta_id")
            .unwrap()
            .exists()
            .build();
        assert_eq!(criteria.query(), "deploy.example.com/mta_id");
    }

    #[test]
    fn test_builder_branching_is_safe() {
        let base = MtaMetadataCriteriaBuilder::new()
            .label("mta_id")
            .unwrap()
            .have_value("demo")
            .unwrap();

        let narrowed = base
            .clone()
            .label("namespace")
            .unwrap()
            .have_value("prod")
            .unwrap()
            .build();
        let broad = base.build();

        assert_eq!(broad.query(), "mta_id=demo");
        assert_eq!(narrowed.query(), "mta_id=demo,namespace=prod");
    }

    #[test]
    fn test_empty_value_is_legal() {
        let criteria = MtaMetadataCriteriaBuilder::new()
            .label("flag")
            .unwrap()
            .have_value("")
            .unwrap()
            .build();
        assert_eq!(criteria.query(), "flag=");
    }

    #[test]
    fn test_key_validation_rules() {
        let empty = MtaMetadataCriteriaBuilder::new().label("").unwrap_err();
        assert_eq!(empty.rule, LabelRule::Empty);

        let long = MtaMetadataCriteriaBuilder::new()
            .label(&"x".repeat(64))
            .unwrap_err();
        assert_eq!(long.rule, LabelRule::TooLong);

        let edge = MtaMetadataCriteriaBuilder::new().label("-abc").unwrap_err();
        assert_eq!(edge.rule, LabelRule::EdgeNotAlphanumeric);

        let charset = MtaMetadataCriteriaBuilder::new().label("a b").unwrap_err();
        assert_eq!(charset.rule, LabelRule::InvalidCharacter);
        assert_eq!(charset.subject, "label key");
        assert_eq!(charset.value, "a b");
    }

    #[test]
    fn test_value_validation_rules() {
        let err = MtaMetadataCriteriaBuilder::new()
            .label("key")
            .unwrap()
            .have_value("bad:value")
            .unwrap_err();
        assert_eq!(err.rule, LabelRule::InvalidCharacter);
        assert_eq!(err.subject, "label value");

        let err = MtaMetadataCriteriaBuilder::new()
            .label("key")
            .unwrap()
            .value_in(&["ok", "also ok"])
            .unwrap_err();
        assert_eq!(err.rule, LabelRule::InvalidCharacter);
    }

    #[test]
    fn test_sixty_three_char_key_is_accepted() {
        let key = "k".repeat(63);
        assert!(validate_label_key(&key).is_ok());
    }
}
