//! Generalized deployment descriptor model.
//!
//! One model covers every supported schema generation; the boundary parser
//! (`model::parser`) normalizes version differences away so resolution logic
//! is written once. Parameter and property maps are ordered (`BTreeMap`) so
//! resolution and serialization stay deterministic.

use std::collections::BTreeMap;
use std::fmt;

use semver::Version;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Ordered parameter/property map. Values are arbitrary JSON-like trees.
pub type Properties = BTreeMap<String, Value>;

/// Schema generation of a descriptor, e.g. `3.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const SUPPORTED_MAJORS: std::ops::RangeInclusive<u32> = 1..=3;

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED_MAJORS.contains(&self.major)
    }

    /// Parse `"3"`, `"3.1"` or `"3.1.0"` forms; extra segments are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut segments = raw.trim().split('.');
        let major = segments.next()?.parse().ok()?;
        let minor = match segments.next() {
            Some(segment) => segment.parse().ok()?,
            None => 0,
        };
        Some(Self { major, minor })
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self { major: 3, minor: 1 }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVersionVisitor;

        impl Visitor<'_> for SchemaVersionVisitor {
            type Value = SchemaVersion;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a schema version such as \"3.1\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<SchemaVersion, E> {
                SchemaVersion::parse(value)
                    .ok_or_else(|| E::custom(format!("invalid schema version '{value}'")))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<SchemaVersion, E> {
                Ok(SchemaVersion::new(value as u32, 0))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<SchemaVersion, E> {
                self.visit_str(&value.to_string())
            }
        }

        deserializer.deserialize_any(SchemaVersionVisitor)
    }
}

/// One MTA's declared desired state: modules, resources, global parameters.
///
/// Immutable input to resolution; resolvers mutate it in place to store
/// resolved parameter values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    pub schema_version: SchemaVersion,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: Properties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<Module>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
}

impl DeploymentDescriptor {
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|module| module.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.name == name)
    }

    /// Look up a provided dependency by name across all modules.
    pub fn provided_dependency(&self, name: &str) -> Option<(&Module, &ProvidedDependency)> {
        self.modules.iter().find_map(|module| {
            module
                .provided_dependency(name)
                .map(|provided| (module, provided))
        })
    }
}

/// A deployable unit (application) within the descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: Properties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provided: Vec<ProvidedDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<RequiredDependency>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn provided_dependency(&self, name: &str) -> Option<&ProvidedDependency> {
        self.provided.iter().find(|provided| provided.name == name)
    }

    pub fn required_dependency(&self, name: &str) -> Option<&RequiredDependency> {
        self.required.iter().find(|required| required.name == name)
    }
}

/// A bindable service/configuration unit declared in the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: Properties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<RequiredDependency>,
    /// An optional resource tolerates matching nothing.
    #[serde(default)]
    pub optional: bool,
    /// An inactive resource is excluded from matching and resolves empty.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Cloud Foundry service type tags; resources carrying one participate in
/// service dependency ordering.
pub const SERVICE_RESOURCE_TYPES: &[&str] = &[
    "org.cloudfoundry.managed-service",
    "org.cloudfoundry.existing-service",
    "org.cloudfoundry.user-provided-service",
];

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_service(&self) -> bool {
        self.resource_type
            .as_deref()
            .is_some_and(|tag| SERVICE_RESOURCE_TYPES.contains(&tag))
    }
}

impl Default for Resource {
    fn default() -> Self {
        Self {
            name: String::new(),
            resource_type: None,
            parameters: Properties::new(),
            properties: Properties::new(),
            required: Vec::new(),
            optional: false,
            active: true,
        }
    }
}

/// Named export of a module, referenced by name from required dependencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidedDependency {
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
}

impl ProvidedDependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A named reference from a module (or resource) to a provided dependency,
/// a resource, or an externally published configuration set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredDependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: Properties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
}

impl RequiredDependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A dependency with a `list` target tolerates any number of matches.
    pub fn permits_multiple(&self) -> bool {
        self.list.is_some()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version_parse_forms() {
        assert_eq!(SchemaVersion::parse("3.1"), Some(SchemaVersion::new(3, 1)));
        assert_eq!(SchemaVersion::parse("2"), Some(SchemaVersion::new(2, 0)));
        assert_eq!(
            SchemaVersion::parse("3.1.0"),
            Some(SchemaVersion::new(3, 1))
        );
        assert_eq!(SchemaVersion::parse("abc"), None);
    }

    #[test]
    fn test_schema_version_display_drops_zero_minor() {
        assert_eq!(SchemaVersion::new(2, 0).to_string(), "2");
        assert_eq!(SchemaVersion::new(3, 1).to_string(), "3.1");
    }

    #[test]
    fn test_provided_dependency_lookup_spans_modules() {
        let mut descriptor = DeploymentDescriptor::default();
        let mut module = Module::new("backend");
        module.provided.push(ProvidedDependency::new("backend-api"));
        descriptor.modules.push(module);

        let (owner, provided) = descriptor
            .provided_dependency("backend-api")
            .expect("dependency should be found");
        assert_eq!(owner.name, "backend");
        assert_eq!(provided.name, "backend-api");
        assert!(descriptor.provided_dependency("missing").is_none());
    }

    #[test]
    fn test_resource_defaults_to_active() {
        let resource = Resource::new("db");
        assert!(resource.active);
        assert!(!resource.optional);
    }

    #[test]
    fn test_service_detection_by_type_tag() {
        let mut resource = Resource::new("db");
        assert!(!resource.is_service());
        resource.resource_type = Some("org.cloudfoundry.managed-service".into());
        assert!(resource.is_service());
    }

    #[test]
    fn test_required_dependency_list_semantics() {
        let mut dependency = RequiredDependency::new("loggers");
        assert!(!dependency.permits_multiple());
        dependency.list = Some("logger_configs".into());
        assert!(dependency.permits_multiple());
    }
}
