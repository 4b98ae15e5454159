//! Shared configuration entries and the targets they are published under.

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::model::Properties;

/// Namespace id for entries published by MTA deployments.
pub const PROVIDER_NID: &str = "mta";
/// Default provider namespace for entries published without one.
pub const PROVIDER_NAMESPACE_DEFAULT: &str = "default";
/// Separator in the `<org> <space>` string form of a target.
pub const TARGET_DELIMITER: &str = " ";
/// Separator in the `<mta-id>:<provided-dependency-name>` provider id.
pub const PROVIDER_ID_DELIMITER: &str = ":";

/// Provider id under which an MTA publishes one provided dependency.
pub fn compute_provider_id(mta_id: &str, provided_dependency_name: &str) -> String {
    format!("{mta_id}{PROVIDER_ID_DELIMITER}{provided_dependency_name}")
}

/// An org+space pair. Renders as `<org> <space>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CloudTarget {
    pub org: String,
    pub space: String,
}

impl CloudTarget {
    pub fn new(org: impl Into<String>, space: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            space: space.into(),
        }
    }

    /// Parse the implicit one-string form used by filters: `<org> <space>`.
    pub fn parse_implicit(value: &str) -> Result<Self, ContentError> {
        let mut tokens = value.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(org), Some(space), None) => Ok(Self::new(org, space)),
            _ => Err(ContentError::MalformedTargetSpace {
                value: value.to_string(),
            }),
        }
    }

    /// Whether this target, possibly containing `*` wildcards, admits the
    /// given concrete target. Used for entry visibility lists.
    pub fn admits(&self, concrete: &CloudTarget) -> bool {
        (self.org == "*" || self.org == concrete.org)
            && (self.space == "*" || self.space == concrete.space)
    }
}

impl fmt::Display for CloudTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.org, TARGET_DELIMITER, self.space)
    }
}

/// A registered, shareable piece of configuration published by some MTA.
///
/// Uniqueness holds on (providerNid, providerId, providerVersion,
/// targetSpace). Entries are queried read-only by the resolution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    pub id: i64,
    #[serde(default = "default_provider_nid")]
    pub provider_nid: String,
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_version: Option<Version>,
    #[serde(default = "default_provider_namespace")]
    pub provider_namespace: String,
    pub target_space: CloudTarget,
    /// JSON text; parsed on demand when merged into resource properties.
    #[serde(default)]
    pub content: String,
    /// Targets allowed to see this entry; `*` acts as a wildcard. An empty
    /// list defaults to the entry's own org with any space.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visibility: Vec<CloudTarget>,
    #[serde(default)]
    pub space_id: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_provider_nid() -> String {
    PROVIDER_NID.to_string()
}

fn default_provider_namespace() -> String {
    PROVIDER_NAMESPACE_DEFAULT.to_string()
}

fn default_true() -> bool {
    true
}

impl ConfigurationEntry {
    pub fn new(
        id: i64,
        provider_id: impl Into<String>,
        provider_version: Option<Version>,
        target_space: CloudTarget,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            provider_nid: default_provider_nid(),
            provider_id: provider_id.into(),
            provider_version,
            provider_namespace: default_provider_namespace(),
            target_space,
            content: content.into(),
            visibility: Vec::new(),
            space_id: String::new(),
            active: true,
        }
    }

    /// Parse the entry content into a property map. Empty content is an
    /// empty map; anything but a JSON object is a [`ContentError`].
    pub fn parsed_content(&self) -> Result<Properties, ContentError> {
        if self.content.trim().is_empty() {
            return Ok(Properties::new());
        }
        match serde_json::from_str(&self.content) {
            Ok(serde_json::Value::Object(map)) => Ok(map.into_iter().collect()),
            _ => Err(ContentError::MalformedEntryContent { entry_id: self.id }),
        }
    }

    /// Whether a consumer deploying into `target` may see this entry.
    pub fn visible_to(&self, target: &CloudTarget) -> bool {
        if self.visibility.is_empty() {
            let default = CloudTarget::new(&self.target_space.org, "*");
            return default.admits(target);
        }
        self.visibility.iter().any(|allowed| allowed.admits(target))
    }

    /// The uniqueness key of this entry within a registry.
    pub fn provider_key(&self) -> (String, String, String, String) {
        (
            self.provider_nid.clone(),
            self.provider_id.clone(),
            self.provider_version
                .as_ref()
                .map(Version::to_string)
                .unwrap_or_default(),
            self.target_space.to_string(),
        )
    }
}
