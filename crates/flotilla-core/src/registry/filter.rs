//! Selection filters for configuration entries.
//!
//! A [`ConfigurationFilter`] is parsed from a configuration resource's
//! parameters (current `configuration` syntax or the legacy
//! `mta-provides-dependency` syntax) and carries everything the matcher
//! needs: provider coordinates, a version requirement, the target space,
//! and required content pairs.

use std::collections::BTreeMap;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ContentError;
use crate::model::{Properties, Resource};
use crate::registry::entry::{
    CloudTarget, ConfigurationEntry, PROVIDER_NID, compute_provider_id,
};

/// Resource type marking an external configuration reference.
pub const CONFIGURATION_TYPE: &str = "configuration";
/// Legacy resource type with the same meaning, `mta-id`/`mta-version` based.
pub const LEGACY_CONFIGURATION_TYPE: &str = "mta-provides-dependency";

const PROVIDER_NID_PARAM: &str = "provider-nid";
const PROVIDER_ID_PARAM: &str = "provider-id";
const PROVIDER_NAMESPACE_PARAM: &str = "provider-namespace";
const VERSION_PARAM: &str = "version";
const TARGET_PARAM: &str = "target";
const CONTENT_FILTER_PARAM: &str = "filter";
const LEGACY_MTA_ID_PARAM: &str = "mta-id";
const LEGACY_MTA_VERSION_PARAM: &str = "mta-version";
const LEGACY_PROVIDES_PARAM: &str = "mta-provides-dependency";

/// How a dependency constrains the provider version.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionRequirement {
    Any,
    Exact(Version),
    Range(VersionReq),
}

impl VersionRequirement {
    /// Parse a raw requirement: empty/`*` is any version, a full semver is
    /// an exact pin, anything else must parse as a range.
    pub fn parse(raw: &str) -> Result<Self, ContentError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Any);
        }
        if let Ok(version) = Version::parse(trimmed) {
            return Ok(Self::Exact(version));
        }
        VersionReq::parse(trimmed)
            .map(Self::Range)
            .map_err(|_| ContentError::InvalidVersionRequirement {
                requirement: raw.to_string(),
            })
    }

    pub fn matches(&self, version: Option<&Version>) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => version.is_some_and(|v| v == expected),
            Self::Range(req) => version.is_some_and(|v| req.matches(v)),
        }
    }

    /// The pinned version, when the requirement is an exact one.
    pub fn as_exact(&self) -> Option<&Version> {
        match self {
            Self::Exact(version) => Some(version),
            _ => None,
        }
    }
}

/// Declared selection filter of one external configuration reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigurationFilter {
    pub provider_nid: String,
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_namespace: Option<String>,
    /// Raw version requirement; parsed on use so the durable (subscription)
    /// form stays a plain string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_space: Option<CloudTarget>,
    /// Key/value pairs the entry content must contain.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub required_content: BTreeMap<String, String>,
    /// A strict filter never falls back to the global configuration space.
    #[serde(default)]
    pub strict_target_space: bool,
}

impl ConfigurationFilter {
    pub fn for_provider(provider_id: impl Into<String>, target_space: CloudTarget) -> Self {
        Self {
            provider_nid: PROVIDER_NID.to_string(),
            provider_id: provider_id.into(),
            target_space: Some(target_space),
            ..Self::default()
        }
    }

    pub fn version_requirement(&self) -> Result<VersionRequirement, ContentError> {
        match &self.version {
            Some(raw) => VersionRequirement::parse(raw),
            None => Ok(VersionRequirement::Any),
        }
    }

    /// Coordinate match, ignoring the version requirement and visibility —
    /// those belong to the matcher's selection policy.
    pub fn matches_coordinates(&self, entry: &ConfigurationEntry) -> bool {
        if entry.provider_nid != self.provider_nid || entry.provider_id != self.provider_id {
            return false;
        }
        if let Some(namespace) = &self.provider_namespace
            && entry.provider_namespace != *namespace
        {
            return false;
        }
        if let Some(target) = &self.target_space
            && entry.target_space != *target
        {
            return false;
        }
        self.matches_content(entry)
    }

    fn matches_content(&self, entry: &ConfigurationEntry) -> bool {
        if self.required_content.is_empty() {
            return true;
        }
        let Ok(content) = entry.parsed_content() else {
            tracing::warn!(
                entry_id = entry.id,
                "skipping entry with unparseable content during content filtering"
            );
            return false;
        };
        self.required_content.iter().all(|(key, expected)| {
            content
                .get(key)
                .is_some_and(|value| value_as_text(value) == *expected)
        })
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Parse the filter declared by a configuration resource, if it is one.
///
/// Returns `Ok(None)` for resources that are not external configuration
/// references. The target defaults to the consumer's own target; an explicit
/// `target` parameter makes the filter strict.
pub fn parse_resource_filter(
    resource: &Resource,
    consumer_target: &CloudTarget,
) -> Result<Option<ConfigurationFilter>, ContentError> {
    match resource.resource_type.as_deref() {
        Some(CONFIGURATION_TYPE) => parse_configuration_filter(resource, consumer_target).map(Some),
        Some(LEGACY_CONFIGURATION_TYPE) => parse_legacy_filter(resource, consumer_target).map(Some),
        _ => Ok(None),
    }
}

fn parse_configuration_filter(
    resource: &Resource,
    consumer_target: &CloudTarget,
) -> Result<ConfigurationFilter, ContentError> {
    let params = &resource.parameters;
    let provider_id = str_param(params, PROVIDER_ID_PARAM)
        .map(str::to_string)
        .unwrap_or_else(|| resource.name.clone());
    let (target_space, strict) = match params.get(TARGET_PARAM) {
        Some(value) => (parse_target_param(value)?, true),
        None => (consumer_target.clone(), false),
    };
    Ok(ConfigurationFilter {
        provider_nid: str_param(params, PROVIDER_NID_PARAM)
            .unwrap_or(PROVIDER_NID)
            .to_string(),
        provider_id,
        provider_namespace: str_param(params, PROVIDER_NAMESPACE_PARAM).map(str::to_string),
        version: str_param(params, VERSION_PARAM).map(str::to_string),
        target_space: Some(target_space),
        required_content: parse_content_filter(params.get(CONTENT_FILTER_PARAM)),
        strict_target_space: strict,
    })
}

fn parse_legacy_filter(
    resource: &Resource,
    consumer_target: &CloudTarget,
) -> Result<ConfigurationFilter, ContentError> {
    let params = &resource.parameters;
    let mta_id = str_param(params, LEGACY_MTA_ID_PARAM).ok_or_else(|| {
        ContentError::UnresolvedReference {
            dependency: LEGACY_MTA_ID_PARAM.to_string(),
            container: format!("resource '{}'", resource.name),
        }
    })?;
    let provides = str_param(params, LEGACY_PROVIDES_PARAM).ok_or_else(|| {
        ContentError::UnresolvedReference {
            dependency: LEGACY_PROVIDES_PARAM.to_string(),
            container: format!("resource '{}'", resource.name),
        }
    })?;
    Ok(ConfigurationFilter {
        provider_nid: PROVIDER_NID.to_string(),
        provider_id: compute_provider_id(mta_id, provides),
        provider_namespace: None,
        version: str_param(params, LEGACY_MTA_VERSION_PARAM).map(str::to_string),
        target_space: Some(consumer_target.clone()),
        required_content: BTreeMap::new(),
        strict_target_space: false,
    })
}

fn parse_target_param(value: &Value) -> Result<CloudTarget, ContentError> {
    match value {
        Value::String(text) => CloudTarget::parse_implicit(text),
        Value::Object(map) => {
            let org = map.get("org").and_then(Value::as_str);
            let space = map.get("space").and_then(Value::as_str);
            match (org, space) {
                (Some(org), Some(space)) => Ok(CloudTarget::new(org, space)),
                _ => Err(ContentError::MalformedTargetSpace {
                    value: Value::Object(map.clone()).to_string(),
                }),
            }
        }
        other => Err(ContentError::MalformedTargetSpace {
            value: other.to_string(),
        }),
    }
}

fn parse_content_filter(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(key, value)| (key.clone(), value_as_text(value)))
        .collect()
}

fn str_param<'a>(params: &'a Properties, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

const CONFIGURATION_PARAMETERS: [&str; 9] = [
    PROVIDER_NID_PARAM,
    PROVIDER_ID_PARAM,
    PROVIDER_NAMESPACE_PARAM,
    VERSION_PARAM,
    TARGET_PARAM,
    CONTENT_FILTER_PARAM,
    LEGACY_MTA_ID_PARAM,
    LEGACY_MTA_VERSION_PARAM,
    LEGACY_PROVIDES_PARAM,
];

/// Drop the filter-declaration parameters from a resource's parameter map,
/// keeping everything else for the materialized resource.
pub fn strip_configuration_parameters(parameters: &Properties) -> Properties {
    parameters
        .iter()
        .filter(|(key, _)| !CONFIGURATION_PARAMETERS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
