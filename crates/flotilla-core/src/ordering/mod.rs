//! Processing order for interdependent service resources.
//!
//! Service creation happens layer by layer: each call to
//! [`next_ready_layer`] peels off every resource whose dependencies are
//! already processed, letting a scheduler provision one layer and wait for
//! it before asking for the next. The remainder map is owned by the
//! caller and shrunk in place, so a partially processed deployment can
//! resume from wherever it stopped.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ContentError;
use crate::model::DeploymentDescriptor;

/// Remaining dependencies per service resource name.
pub type DependencyMap = BTreeMap<String, BTreeSet<String>>;

/// Seed a dependency map from the descriptor's service resources.
///
/// Only dependencies pointing at another service resource become edges;
/// references to modules or configuration resources are not ordering
/// constraints.
pub fn dependency_map(descriptor: &DeploymentDescriptor) -> DependencyMap {
    let services: BTreeSet<&str> = descriptor
        .resources
        .iter()
        .filter(|resource| resource.is_service())
        .map(|resource| resource.name.as_str())
        .collect();

    descriptor
        .resources
        .iter()
        .filter(|resource| resource.is_service())
        .map(|resource| {
            let dependencies = resource
                .required
                .iter()
                .filter(|dependency| services.contains(dependency.name.as_str()))
                .map(|dependency| dependency.name.clone())
                .collect();
            (resource.name.clone(), dependencies)
        })
        .collect()
}

/// Remove and return every resource whose dependency set is empty, then
/// drop those resources from the remaining sets.
///
/// An empty map yields an empty layer. A non-empty map that yields no
/// ready resources is a dependency cycle and fails, naming the resources
/// involved.
pub fn next_ready_layer(remaining: &mut DependencyMap) -> Result<Vec<String>, ContentError> {
    let ready: Vec<String> = remaining
        .iter()
        .filter(|(_, dependencies)| dependencies.is_empty())
        .map(|(name, _)| name.clone())
        .collect();

    if ready.is_empty() {
        if remaining.is_empty() {
            return Ok(Vec::new());
        }
        return Err(ContentError::ServiceDependencyCycle {
            resources: remaining.keys().cloned().collect(),
        });
    }

    for name in &ready {
        remaining.remove(name);
    }
    for dependencies in remaining.values_mut() {
        for name in &ready {
            dependencies.remove(name);
        }
    }
    tracing::debug!(layer = ?ready, remaining = remaining.len(), "computed ready layer");
    Ok(ready)
}

/// Peel all layers at once. Convenience for callers that do not need to
/// interleave provisioning with ordering.
pub fn ready_layers(descriptor: &DeploymentDescriptor) -> Result<Vec<Vec<String>>, ContentError> {
    let mut remaining = dependency_map(descriptor);
    let mut layers = Vec::new();
    while !remaining.is_empty() {
        layers.push(next_ready_layer(&mut remaining)?);
    }
    Ok(layers)
}
