//! YAML boundary parser and normalizer for deployment descriptors.
//!
//! Accepts any supported schema generation (majors 1 through 3) and produces
//! the one generalized [`DeploymentDescriptor`] model. Unknown keys are
//! tolerated for forward compatibility; structural rules (unique names, a
//! non-empty MTA id, a parseable version) are enforced after parsing.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use semver::Version;
use serde::Deserialize;

use crate::error::ContentError;
use crate::model::descriptor::{
    DeploymentDescriptor, Module, Properties, ProvidedDependency, RequiredDependency, Resource,
    SchemaVersion,
};

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(rename = "_schema-version")]
    schema_version: serde_yaml::Value,
    #[serde(rename = "ID")]
    id: String,
    version: Option<String>,
    #[serde(default)]
    parameters: Properties,
    #[serde(default)]
    modules: Vec<RawModule>,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    name: String,
    #[serde(rename = "type")]
    module_type: Option<String>,
    #[serde(default)]
    parameters: Properties,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    provides: Vec<RawProvided>,
    #[serde(default)]
    requires: Vec<RawRequired>,
}

#[derive(Debug, Deserialize)]
struct RawProvided {
    name: String,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct RawRequired {
    name: String,
    group: Option<String>,
    list: Option<String>,
    #[serde(default)]
    parameters: Properties,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    name: String,
    #[serde(rename = "type")]
    resource_type: Option<String>,
    #[serde(default)]
    parameters: Properties,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    requires: Vec<RawRequired>,
    #[serde(default)]
    optional: bool,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

/// Parse descriptor YAML text into the generalized model.
pub fn parse_str(text: &str) -> Result<DeploymentDescriptor, ContentError> {
    let raw: RawDescriptor = serde_yaml::from_str(text)
        .map_err(|err| ContentError::MalformedDescriptor(err.to_string()))?;
    normalize(raw)
}

/// Read and parse a descriptor file.
pub fn parse_path(path: &Path) -> anyhow::Result<DeploymentDescriptor> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor file {}", path.display()))?;
    Ok(parse_str(&text)?)
}

fn normalize(raw: RawDescriptor) -> Result<DeploymentDescriptor, ContentError> {
    let schema_version = parse_schema_version(&raw.schema_version)?;
    if raw.id.trim().is_empty() {
        return Err(ContentError::MissingMtaId);
    }
    let version = raw.version.as_deref().map(parse_mta_version).transpose()?;

    let descriptor = DeploymentDescriptor {
        schema_version,
        id: raw.id,
        version,
        parameters: raw.parameters,
        modules: raw.modules.into_iter().map(module_from_raw).collect(),
        resources: raw.resources.into_iter().map(resource_from_raw).collect(),
    };
    validate_names(&descriptor)?;
    Ok(descriptor)
}

fn parse_schema_version(raw: &serde_yaml::Value) -> Result<SchemaVersion, ContentError> {
    let text = match raw {
        serde_yaml::Value::String(text) => text.clone(),
        serde_yaml::Value::Number(number) => number.to_string(),
        other => {
            return Err(ContentError::UnsupportedSchemaVersion {
                version: format!("{other:?}"),
            });
        }
    };
    let version =
        SchemaVersion::parse(&text).ok_or_else(|| ContentError::UnsupportedSchemaVersion {
            version: text.clone(),
        })?;
    if !version.is_supported() {
        return Err(ContentError::UnsupportedSchemaVersion { version: text });
    }
    Ok(version)
}

/// MTA versions may omit minor/patch segments; pad them to a full semver.
fn parse_mta_version(raw: &str) -> Result<Version, ContentError> {
    let trimmed = raw.trim();
    let segments = trimmed.split('.').count();
    let padded = match segments {
        1 => format!("{trimmed}.0.0"),
        2 => format!("{trimmed}.0"),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded).map_err(|_| ContentError::InvalidMtaVersion {
        value: raw.to_string(),
    })
}

fn module_from_raw(raw: RawModule) -> Module {
    Module {
        name: raw.name,
        module_type: raw.module_type,
        parameters: raw.parameters,
        properties: raw.properties,
        provided: raw.provides.into_iter().map(provided_from_raw).collect(),
        required: raw.requires.into_iter().map(required_from_raw).collect(),
    }
}

fn provided_from_raw(raw: RawProvided) -> ProvidedDependency {
    ProvidedDependency {
        name: raw.name,
        public: raw.public,
        properties: raw.properties,
    }
}

fn required_from_raw(raw: RawRequired) -> RequiredDependency {
    RequiredDependency {
        name: raw.name,
        group: raw.group,
        list: raw.list,
        parameters: raw.parameters,
        properties: raw.properties,
    }
}

fn resource_from_raw(raw: RawResource) -> Resource {
    Resource {
        name: raw.name,
        resource_type: raw.resource_type,
        parameters: raw.parameters,
        properties: raw.properties,
        required: raw.requires.into_iter().map(required_from_raw).collect(),
        optional: raw.optional,
        active: raw.active,
    }
}

/// Modules, resources, and provided dependencies each need unique names;
/// provided dependencies and resources share one referenceable namespace.
fn validate_names(descriptor: &DeploymentDescriptor) -> Result<(), ContentError> {
    let mut module_names = BTreeSet::new();
    for module in &descriptor.modules {
        if !module_names.insert(module.name.as_str()) {
            return Err(ContentError::DuplicateName {
                kind: "module",
                name: module.name.clone(),
            });
        }
    }

    let mut referenceable = BTreeSet::new();
    for resource in &descriptor.resources {
        if !referenceable.insert(resource.name.as_str()) {
            return Err(ContentError::DuplicateName {
                kind: "resource",
                name: resource.name.clone(),
            });
        }
    }
    for module in &descriptor.modules {
        for provided in &module.provided {
            if !referenceable.insert(provided.name.as_str()) {
                return Err(ContentError::DuplicateName {
                    kind: "provided dependency",
                    name: provided.name.clone(),
                });
            }
        }
    }
    Ok(())
}
