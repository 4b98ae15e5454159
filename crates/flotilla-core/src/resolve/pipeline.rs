//! End-to-end descriptor resolution.
//!
//! Orchestrates the full sequence: snapshot the descriptor, resolve
//! configuration references against the registry, substitute local and
//! external reference tokens, unescape literals, and build subscriptions
//! from the snapshot. Errors from any stage surface to the caller
//! unchanged.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::model::{DeploymentDescriptor, Properties};
use crate::registry::entry::CloudTarget;
use crate::registry::matcher::ConfigurationEntryMatcher;
use crate::registry::ConfigurationRegistry;
use crate::resolve::reference::unescape;
use crate::resolve::references::ConfigurationReferencesResolver;
use crate::resolve::resolver::ReferenceResolver;
use crate::subscription::{ConfigurationSubscription, SubscriptionFactory};

/// Where and how one descriptor is being resolved.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    /// Org and space the deployment targets.
    pub target: CloudTarget,
    /// Space GUID recorded on subscriptions.
    pub space_id: String,
    /// Fallback target for entries shared globally, if the installation
    /// has one.
    pub global_config_target: Option<CloudTarget>,
    /// Dependency names left unresolved for a later phase.
    pub ignored_dependencies: BTreeSet<String>,
}

impl ResolutionContext {
    pub fn new(target: CloudTarget, space_id: impl Into<String>) -> Self {
        Self {
            target,
            space_id: space_id.into(),
            global_config_target: None,
            ignored_dependencies: BTreeSet::new(),
        }
    }

    pub fn with_global_target(mut self, target: CloudTarget) -> Self {
        self.global_config_target = Some(target);
        self
    }

    pub fn with_ignored<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_dependencies = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Everything one resolution run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub descriptor: DeploymentDescriptor,
    pub subscriptions: Vec<ConfigurationSubscription>,
    /// Matched entry ids per configuration resource name.
    pub resolved_entries: BTreeMap<String, Vec<i64>>,
    /// Property keys whose values were expanded into lists.
    pub expanded_properties: Vec<String>,
    pub resolved_at: chrono::DateTime<chrono::Utc>,
}

pub struct DescriptorResolver<'r> {
    registry: &'r dyn ConfigurationRegistry,
    context: ResolutionContext,
}

impl<'r> DescriptorResolver<'r> {
    pub fn new(registry: &'r dyn ConfigurationRegistry, context: ResolutionContext) -> Self {
        Self { registry, context }
    }

    /// Run the full resolution sequence on `descriptor`.
    pub fn resolve(&self, mut descriptor: DeploymentDescriptor) -> Result<ResolutionReport, Error> {
        let mut matcher = ConfigurationEntryMatcher::new(self.registry);
        if let Some(global) = &self.context.global_config_target {
            matcher = matcher.with_global_target(global.clone());
        }

        // Subscriptions are built from the declared shape, not the
        // substituted one.
        let snapshot = descriptor.clone();

        let mut references =
            ConfigurationReferencesResolver::new(&matcher, self.context.target.clone());
        references.resolve(&mut descriptor)?;
        let expanded_properties = references.expanded_properties().to_vec();
        let resolved = references.into_resolved_references();

        ReferenceResolver::new()
            .with_ignored(self.context.ignored_dependencies.iter().cloned())
            .with_matcher(&matcher, self.context.target.clone())
            .resolve(&mut descriptor)?;

        unescape_descriptor(&mut descriptor);

        let subscriptions =
            SubscriptionFactory::create_subscriptions(&snapshot, &resolved, &self.context.space_id);
        tracing::info!(
            mta_id = %descriptor.id,
            references = resolved.len(),
            subscriptions = subscriptions.len(),
            "resolved deployment descriptor"
        );

        let resolved_entries = resolved
            .into_iter()
            .map(|(name, reference)| (name, reference.entry_ids))
            .collect();

        Ok(ResolutionReport {
            descriptor,
            subscriptions,
            resolved_entries,
            expanded_properties,
            resolved_at: chrono::Utc::now(),
        })
    }
}

/// Rewrite `\${...}` literals back to `${...}` once substitution is done.
fn unescape_descriptor(descriptor: &mut DeploymentDescriptor) {
    unescape_properties(&mut descriptor.parameters);
    for module in &mut descriptor.modules {
        unescape_properties(&mut module.parameters);
        unescape_properties(&mut module.properties);
        for provided in &mut module.provided {
            unescape_properties(&mut provided.properties);
        }
        for required in &mut module.required {
            unescape_properties(&mut required.parameters);
            unescape_properties(&mut required.properties);
        }
    }
    for resource in &mut descriptor.resources {
        unescape_properties(&mut resource.parameters);
        unescape_properties(&mut resource.properties);
        for required in &mut resource.required {
            unescape_properties(&mut required.parameters);
            unescape_properties(&mut required.properties);
        }
    }
}

fn unescape_properties(properties: &mut Properties) {
    for value in properties.values_mut() {
        unescape_value(value);
    }
}

fn unescape_value(value: &mut Value) {
    match value {
        Value::String(text) => *value = Value::String(unescape(text)),
        Value::Array(items) => items.iter_mut().for_each(unescape_value),
        Value::Object(map) => map.values_mut().for_each(unescape_value),
        _ => {}
    }
}
