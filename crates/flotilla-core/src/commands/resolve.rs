//! Resolve command implementation.
//!
//! Parses a descriptor, loads a registry snapshot, and runs the full
//! resolution pipeline against a deployment target.

use std::path::PathBuf;

use anyhow::Context;

use crate::model;
use crate::registry::entry::CloudTarget;
use crate::registry::snapshot::RegistrySnapshot;
use crate::resolve::{DescriptorResolver, ResolutionContext, ResolutionReport};

/// Options for the resolve command
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Path to the deployment descriptor YAML
    pub descriptor: PathBuf,
    /// Path to a registry snapshot JSON (None = empty registry)
    pub entries: Option<PathBuf>,
    /// Deployment target org
    pub org: String,
    /// Deployment target space
    pub space: String,
    /// Space GUID recorded on subscriptions
    pub space_guid: Option<String>,
    /// Global configuration space fallback target
    pub global_target: Option<CloudTarget>,
    /// Dependency names to leave unresolved
    pub ignore: Vec<String>,
}

impl ResolveOptions {
    pub fn new(
        descriptor: impl Into<PathBuf>,
        org: impl Into<String>,
        space: impl Into<String>,
    ) -> Self {
        Self {
            descriptor: descriptor.into(),
            entries: None,
            org: org.into(),
            space: space.into(),
            space_guid: None,
            global_target: None,
            ignore: Vec::new(),
        }
    }

    pub fn with_entries(mut self, path: impl Into<PathBuf>) -> Self {
        self.entries = Some(path.into());
        self
    }

    pub fn with_space_guid(mut self, guid: impl Into<String>) -> Self {
        self.space_guid = Some(guid.into());
        self
    }

    pub fn with_global_target(mut self, target: CloudTarget) -> Self {
        self.global_target = Some(target);
        self
    }

    pub fn with_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Resolve command orchestrator
#[derive(Debug, Default)]
pub struct ResolveCommand;

impl ResolveCommand {
    pub fn new() -> Self {
        Self
    }

    /// Run resolution and return the full report.
    pub fn run(&self, options: &ResolveOptions) -> anyhow::Result<ResolutionReport> {
        let descriptor = model::parse_path(&options.descriptor)?;
        let registry = match &options.entries {
            Some(path) => RegistrySnapshot::from_path(path)?,
            None => RegistrySnapshot::new(),
        };

        let target = CloudTarget::new(&options.org, &options.space);
        let mut context = ResolutionContext::new(
            target,
            options.space_guid.clone().unwrap_or_default(),
        )
        .with_ignored(options.ignore.iter().cloned());
        if let Some(global) = &options.global_target {
            context = context.with_global_target(global.clone());
        }

        DescriptorResolver::new(&registry, context)
            .resolve(descriptor)
            .with_context(|| {
                format!("unable to resolve '{}'", options.descriptor.display())
            })
    }
}
