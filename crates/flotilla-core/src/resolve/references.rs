//! Resolution of configuration-reference resources.
//!
//! Every resource whose parameters declare a selection filter is replaced
//! by the configuration it matched: one entry keeps the resource's name,
//! several entries become indexed clones (`name.0`, `name.1`, ...). Module
//! and resource dependencies on the original name are enforced against the
//! declared cardinality and rewritten to the clones, and property values
//! referencing the original name expand into lists over the clone names.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ConflictError, ContentError, Error};
use crate::model::{DeploymentDescriptor, Properties, RequiredDependency, Resource};
use crate::registry::entry::{CloudTarget, ConfigurationEntry};
use crate::registry::filter::{ConfigurationFilter, parse_resource_filter, strip_configuration_parameters};
use crate::registry::matcher::{ConfigurationEntryMatcher, MatchCardinality};
use crate::resolve::expander::PropertiesExpander;

const CLONE_NAME_DELIMITER: &str = ".";

/// What one configuration resource resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedConfigurationReference {
    pub filter: ConfigurationFilter,
    /// The resource as declared, before replacement.
    pub source: Resource,
    /// Materialized resources, one per matched entry.
    pub resolved: Vec<Resource>,
    /// Matched entry ids, aligned with `resolved`.
    pub entry_ids: Vec<i64>,
}

impl ResolvedConfigurationReference {
    pub fn resource_name(&self) -> &str {
        &self.source.name
    }

    pub fn is_active(&self) -> bool {
        self.source.active
    }

    pub fn resolved_names(&self) -> Vec<String> {
        self.resolved
            .iter()
            .map(|resource| resource.name.clone())
            .collect()
    }
}

pub struct ConfigurationReferencesResolver<'m> {
    matcher: &'m ConfigurationEntryMatcher<'m>,
    consumer_target: CloudTarget,
    resolved: BTreeMap<String, ResolvedConfigurationReference>,
    expanded_properties: Vec<String>,
}

impl<'m> ConfigurationReferencesResolver<'m> {
    pub fn new(matcher: &'m ConfigurationEntryMatcher<'m>, consumer_target: CloudTarget) -> Self {
        Self {
            matcher,
            consumer_target,
            resolved: BTreeMap::new(),
            expanded_properties: Vec::new(),
        }
    }

    /// Resolve all configuration references in place.
    pub fn resolve(&mut self, descriptor: &mut DeploymentDescriptor) -> Result<(), Error> {
        self.collect_references(descriptor)?;
        if self.resolved.is_empty() {
            return Ok(());
        }
        self.replace_resources(descriptor);
        self.rewrite_consumers(descriptor)?;
        Ok(())
    }

    /// References by source resource name, for subscription building.
    pub fn resolved_references(&self) -> &BTreeMap<String, ResolvedConfigurationReference> {
        &self.resolved
    }

    pub fn into_resolved_references(self) -> BTreeMap<String, ResolvedConfigurationReference> {
        self.resolved
    }

    /// Property keys whose values were expanded into lists.
    pub fn expanded_properties(&self) -> &[String] {
        &self.expanded_properties
    }

    fn collect_references(&mut self, descriptor: &DeploymentDescriptor) -> Result<(), Error> {
        for resource in &descriptor.resources {
            let Some(filter) = parse_resource_filter(resource, &self.consumer_target)? else {
                continue;
            };
            if !resource.active {
                tracing::debug!(
                    resource = %resource.name,
                    "configuration resource is inactive, resolving to no entries"
                );
                self.resolved.insert(
                    resource.name.clone(),
                    ResolvedConfigurationReference {
                        filter,
                        source: resource.clone(),
                        resolved: Vec::new(),
                        entry_ids: Vec::new(),
                    },
                );
                continue;
            }
            let entries = self.matcher.match_entries(
                &resource.name,
                &filter,
                &self.consumer_target,
                MatchCardinality::Multiple,
                resource.optional,
            )?;
            tracing::debug!(
                resource = %resource.name,
                entries = entries.len(),
                "resolved configuration reference"
            );
            let resolved = materialize_resources(resource, &entries)?;
            self.resolved.insert(
                resource.name.clone(),
                ResolvedConfigurationReference {
                    filter,
                    source: resource.clone(),
                    entry_ids: entries.iter().map(|entry| entry.id).collect(),
                    resolved,
                },
            );
        }
        Ok(())
    }

    fn replace_resources(&self, descriptor: &mut DeploymentDescriptor) {
        let resources = std::mem::take(&mut descriptor.resources);
        descriptor.resources = resources
            .into_iter()
            .flat_map(|resource| match self.resolved.get(&resource.name) {
                Some(reference) => reference.resolved.clone(),
                None => vec![resource],
            })
            .collect();
    }

    fn rewrite_consumers(&mut self, descriptor: &mut DeploymentDescriptor) -> Result<(), Error> {
        let mut expansions: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for module in &mut descriptor.modules {
            let required = std::mem::take(&mut module.required);
            module.required = self.rewrite_dependencies(
                required,
                &mut module.properties,
                &mut expansions,
            )?;
        }
        for resource in &mut descriptor.resources {
            let required = std::mem::take(&mut resource.required);
            resource.required = self.rewrite_dependencies(
                required,
                &mut resource.properties,
                &mut expansions,
            )?;
        }

        for (original, names) in &expansions {
            for module in &mut descriptor.modules {
                let mut expander = PropertiesExpander::new(original, names.clone());
                module.properties = expander.expand(&module.properties);
                self.expanded_properties
                    .extend(expander.expanded_properties().iter().cloned());
            }
            for resource in &mut descriptor.resources {
                let mut expander = PropertiesExpander::new(original, names.clone());
                resource.properties = expander.expand(&resource.properties);
                self.expanded_properties
                    .extend(expander.expanded_properties().iter().cloned());
            }
        }
        Ok(())
    }

    fn rewrite_dependencies(
        &self,
        required: Vec<RequiredDependency>,
        owner_properties: &mut Properties,
        expansions: &mut BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<RequiredDependency>, Error> {
        let mut kept = Vec::with_capacity(required.len());
        for dependency in required {
            let Some(reference) = self.resolved.get(&dependency.name) else {
                kept.push(dependency);
                continue;
            };
            if !reference.is_active() || (reference.resolved.is_empty() && reference.source.optional)
            {
                if let Some(list) = &dependency.list {
                    insert_empty_list(owner_properties, list);
                    expansions.insert(dependency.name.clone(), Vec::new());
                } else if reference.is_active() {
                    tracing::warn!(
                        dependency = %dependency.name,
                        "optional configuration reference matched nothing, dropping dependency"
                    );
                }
                continue;
            }
            if !dependency.permits_multiple() {
                match reference.resolved.len() {
                    1 => kept.push(dependency),
                    0 => {
                        return Err(ContentError::NoMatchingEntries {
                            dependency: dependency.name.clone(),
                        }
                        .into());
                    }
                    _ => {
                        return Err(ConflictError::AmbiguousMatch {
                            dependency: dependency.name.clone(),
                            entry_ids: reference.entry_ids.clone(),
                        }
                        .into());
                    }
                }
                continue;
            }
            if reference.resolved.is_empty() {
                if let Some(list) = &dependency.list {
                    insert_empty_list(owner_properties, list);
                }
                expansions.insert(dependency.name.clone(), Vec::new());
                continue;
            }
            let expanded: Vec<RequiredDependency> = reference
                .resolved
                .iter()
                .map(|resource| RequiredDependency {
                    name: resource.name.clone(),
                    group: dependency.group.clone(),
                    list: dependency.list.clone(),
                    parameters: dependency.parameters.clone(),
                    properties: dependency.properties.clone(),
                })
                .collect();
            expansions.insert(dependency.name.clone(), reference.resolved_names());
            kept.extend(expanded);
        }
        Ok(kept)
    }
}

/// Build one resource per matched entry. A single entry keeps the source
/// resource's name; several get indexed clone names.
fn materialize_resources(
    source: &Resource,
    entries: &[ConfigurationEntry],
) -> Result<Vec<Resource>, Error> {
    if let [entry] = entries {
        return Ok(vec![materialize_resource(source, entry, source.name.clone())?]);
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let name = format!("{}{}{}", source.name, CLONE_NAME_DELIMITER, index);
            materialize_resource(source, entry, name)
        })
        .collect()
}

fn materialize_resource(
    source: &Resource,
    entry: &ConfigurationEntry,
    name: String,
) -> Result<Resource, Error> {
    // Entry content wins over declared properties; the declared map only
    // supplies keys the published content lacks.
    let mut properties = source.properties.clone();
    properties.extend(entry.parsed_content()?);
    Ok(Resource {
        name,
        resource_type: None,
        parameters: strip_configuration_parameters(&source.parameters),
        properties,
        required: source.required.clone(),
        optional: source.optional,
        active: source.active,
    })
}

fn insert_empty_list(properties: &mut Properties, key: &str) {
    properties
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
}
