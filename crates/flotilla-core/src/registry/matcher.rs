//! Selection policy on top of a configuration registry.
//!
//! The registry answers coordinate queries; the matcher turns those raw
//! candidate lists into the entries a dependency is allowed to consume:
//! it applies the version requirement, prefers active entries, prefers an
//! exactly pinned version, falls back to the global configuration space
//! for non-strict filters and enforces the declared cardinality.

use crate::criteria::{MtaMetadataCriteria, MtaMetadataCriteriaBuilder};
use crate::error::{ConflictError, ContentError, Error, ValidationError};
use crate::registry::ConfigurationRegistry;
use crate::registry::entry::{CloudTarget, ConfigurationEntry, PROVIDER_ID_DELIMITER};
use crate::registry::filter::{ConfigurationFilter, VersionRequirement};

/// How many entries a dependency tolerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCardinality {
    /// Exactly one entry; more than one is a conflict.
    Single,
    /// Any number of entries, returned as a set.
    Multiple,
}

pub struct ConfigurationEntryMatcher<'a> {
    registry: &'a dyn ConfigurationRegistry,
    global_config_target: Option<CloudTarget>,
}

impl<'a> ConfigurationEntryMatcher<'a> {
    pub fn new(registry: &'a dyn ConfigurationRegistry) -> Self {
        Self {
            registry,
            global_config_target: None,
        }
    }

    pub fn with_global_target(mut self, target: CloudTarget) -> Self {
        self.global_config_target = Some(target);
        self
    }

    /// Match the entries one required dependency may consume.
    ///
    /// `dependency` names the consumer in errors. An empty result is only
    /// valid for optional dependencies.
    pub fn match_entries(
        &self,
        dependency: &str,
        filter: &ConfigurationFilter,
        consumer_target: &CloudTarget,
        cardinality: MatchCardinality,
        optional: bool,
    ) -> Result<Vec<ConfigurationEntry>, Error> {
        let requirement = filter.version_requirement()?;
        if let Ok(criteria) = metadata_criteria(filter) {
            tracing::debug!(
                dependency,
                query = criteria.query(),
                "matching configuration entries"
            );
        }

        let mut candidates = self.query(filter, consumer_target, &requirement)?;
        if candidates.is_empty()
            && let Some(global) = self.fallback_target(filter)
        {
            tracing::debug!(
                dependency,
                target = %global,
                "no entries in requested space, retrying in global configuration space"
            );
            let mut fallback = filter.clone();
            fallback.target_space = Some(global);
            candidates = self.query(&fallback, consumer_target, &requirement)?;
        }

        let selected = select(candidates, &requirement);
        match cardinality {
            MatchCardinality::Multiple => Ok(selected),
            MatchCardinality::Single if selected.len() > 1 => {
                Err(ConflictError::AmbiguousMatch {
                    dependency: dependency.to_string(),
                    entry_ids: selected.iter().map(|entry| entry.id).collect(),
                }
                .into())
            }
            MatchCardinality::Single if selected.is_empty() && !optional => {
                Err(ContentError::NoMatchingEntries {
                    dependency: dependency.to_string(),
                }
                .into())
            }
            MatchCardinality::Single => Ok(selected),
        }
    }

    fn query(
        &self,
        filter: &ConfigurationFilter,
        consumer_target: &CloudTarget,
        requirement: &VersionRequirement,
    ) -> Result<Vec<ConfigurationEntry>, Error> {
        let mut entries = self
            .registry
            .find(filter, consumer_target)
            .map_err(Error::Registry)?;
        entries.retain(|entry| requirement.matches(entry.provider_version.as_ref()));
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    fn fallback_target(&self, filter: &ConfigurationFilter) -> Option<CloudTarget> {
        if filter.strict_target_space {
            return None;
        }
        let global = self.global_config_target.clone()?;
        (filter.target_space.as_ref() != Some(&global)).then_some(global)
    }
}

/// Narrow the candidate list per the declared selection policy.
fn select(
    mut candidates: Vec<ConfigurationEntry>,
    requirement: &VersionRequirement,
) -> Vec<ConfigurationEntry> {
    if candidates.len() > 1 && candidates.iter().any(|entry| entry.active) {
        candidates.retain(|entry| entry.active);
    }
    if candidates.len() > 1
        && let Some(pinned) = requirement.as_exact()
    {
        let exact: Vec<_> = candidates
            .iter()
            .filter(|entry| entry.provider_version.as_ref() == Some(pinned))
            .cloned()
            .collect();
        if !exact.is_empty() {
            return exact;
        }
    }
    candidates
}

/// Render a filter as a label-selector query over published MTA metadata.
pub fn metadata_criteria(
    filter: &ConfigurationFilter,
) -> Result<MtaMetadataCriteria, ValidationError> {
    let mut builder = MtaMetadataCriteriaBuilder::new();
    let (mta_id, provided) = match filter.provider_id.split_once(PROVIDER_ID_DELIMITER) {
        Some((mta_id, provided)) => (mta_id, Some(provided)),
        None => (filter.provider_id.as_str(), None),
    };
    builder = builder.label("mta_id")?.have_value(mta_id)?;
    if let Some(provided) = provided {
        builder = builder.label("provided_dependency")?.have_value(provided)?;
    }
    if let Some(namespace) = &filter.provider_namespace {
        builder = builder.label("mta_namespace")?.have_value(namespace)?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::snapshot::RegistrySnapshot;
    use semver::Version;

    fn entry(id: i64, version: &str, org: &str, space: &str) -> ConfigurationEntry {
        ConfigurationEntry::new(
            id,
            "demo:api",
            Some(Version::parse(version).unwrap()),
            CloudTarget::new(org, space),
            r#"{"url": "https://api.test"}"#,
        )
    }

    fn filter_for(org: &str, space: &str) -> ConfigurationFilter {
        ConfigurationFilter::for_provider("demo:api", CloudTarget::new(org, space))
    }

    #[test]
    fn test_single_match() {
        let snapshot = RegistrySnapshot::from_entries([entry(1, "1.0.0", "org", "dev")]).unwrap();
        let matcher = ConfigurationEntryMatcher::new(&snapshot);
        let matched = matcher
            .match_entries(
                "api",
                &filter_for("org", "dev"),
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Single,
                false,
            )
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);
    }

    #[test]
    fn test_ambiguous_match_conflicts() {
        let snapshot = RegistrySnapshot::from_entries([
            entry(1, "1.0.0", "org", "dev"),
            entry(2, "1.1.0", "org", "dev"),
        ])
        .unwrap();
        let matcher = ConfigurationEntryMatcher::new(&snapshot);
        let err = matcher
            .match_entries(
                "api",
                &filter_for("org", "dev"),
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Single,
                false,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Conflict(ConflictError::AmbiguousMatch { ref entry_ids, .. })
                if *entry_ids == vec![1, 2]
        ));
    }

    #[test]
    fn test_multiple_cardinality_returns_all() {
        let snapshot = RegistrySnapshot::from_entries([
            entry(2, "1.1.0", "org", "dev"),
            entry(1, "1.0.0", "org", "dev"),
        ])
        .unwrap();
        let matcher = ConfigurationEntryMatcher::new(&snapshot);
        let matched = matcher
            .match_entries(
                "api",
                &filter_for("org", "dev"),
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Multiple,
                false,
            )
            .unwrap();
        let ids: Vec<_> = matched.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_active_entries_preferred() {
        let mut inactive = entry(1, "1.0.0", "org", "dev");
        inactive.active = false;
        let snapshot =
            RegistrySnapshot::from_entries([inactive, entry(2, "1.1.0", "org", "dev")]).unwrap();
        let matcher = ConfigurationEntryMatcher::new(&snapshot);
        let matched = matcher
            .match_entries(
                "api",
                &filter_for("org", "dev"),
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Single,
                false,
            )
            .unwrap();
        assert_eq!(matched[0].id, 2);
    }

    #[test]
    fn test_exact_version_requirement_narrows() {
        let snapshot = RegistrySnapshot::from_entries([
            entry(1, "1.0.0", "org", "dev"),
            entry(2, "1.1.0", "org", "dev"),
        ])
        .unwrap();
        let matcher = ConfigurationEntryMatcher::new(&snapshot);
        let mut filter = filter_for("org", "dev");
        filter.version = Some("1.1.0".into());
        let matched = matcher
            .match_entries(
                "api",
                &filter,
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Single,
                false,
            )
            .unwrap();
        assert_eq!(matched[0].id, 2);
    }

    #[test]
    fn test_missing_match_is_content_error_unless_optional() {
        let snapshot = RegistrySnapshot::new();
        let matcher = ConfigurationEntryMatcher::new(&snapshot);
        let err = matcher
            .match_entries(
                "api",
                &filter_for("org", "dev"),
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Single,
                false,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::NoMatchingEntries { .. })
        ));

        let matched = matcher
            .match_entries(
                "api",
                &filter_for("org", "dev"),
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Single,
                true,
            )
            .unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn test_global_space_fallback() {
        let global = CloudTarget::new("system", "config");
        let mut shared = entry(1, "1.0.0", "system", "config");
        shared.visibility = vec![CloudTarget::new("*", "*")];
        let snapshot = RegistrySnapshot::from_entries([shared]).unwrap();
        let matcher = ConfigurationEntryMatcher::new(&snapshot).with_global_target(global.clone());

        let matched = matcher
            .match_entries(
                "api",
                &filter_for("org", "dev"),
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Single,
                false,
            )
            .unwrap();
        assert_eq!(matched[0].id, 1);

        // Strict filters never leave their declared target.
        let mut strict = filter_for("org", "dev");
        strict.strict_target_space = true;
        let err = matcher
            .match_entries(
                "api",
                &strict,
                &CloudTarget::new("org", "dev"),
                MatchCardinality::Single,
                false,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::NoMatchingEntries { .. })
        ));
    }

    #[test]
    fn test_metadata_criteria_from_filter() {
        let mut filter = filter_for("org", "dev");
        filter.provider_namespace = Some("default".into());
        let criteria = metadata_criteria(&filter).unwrap();
        assert_eq!(
            criteria.query(),
            "mta_id=demo,provided_dependency=api,mta_namespace=default"
        );
    }
}
