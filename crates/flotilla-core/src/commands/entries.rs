//! Entries command implementation.
//!
//! Inspects a registry snapshot: lists entries, optionally narrowed to one
//! provider, and shows the metadata criteria that provider filter compiles
//! to.

use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;

use crate::registry::entry::{CloudTarget, ConfigurationEntry};
use crate::registry::filter::ConfigurationFilter;
use crate::registry::matcher::{metadata_criteria, ConfigurationEntryMatcher, MatchCardinality};
use crate::registry::snapshot::RegistrySnapshot;

/// Options for the entries command
#[derive(Debug, Clone)]
pub struct EntriesOptions {
    /// Path to the registry snapshot JSON
    pub entries: PathBuf,
    /// Consumer org
    pub org: String,
    /// Consumer space
    pub space: String,
    /// Provider id to narrow to (None = list everything)
    pub provider_id: Option<String>,
    /// Version requirement applied with the provider filter
    pub version: Option<String>,
}

impl EntriesOptions {
    pub fn new(
        entries: impl Into<PathBuf>,
        org: impl Into<String>,
        space: impl Into<String>,
    ) -> Self {
        Self {
            entries: entries.into(),
            org: org.into(),
            space: space.into(),
            provider_id: None,
            version: None,
        }
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Result of a snapshot inspection
#[derive(Debug, Clone, Serialize)]
pub struct EntriesReport {
    /// Compiled metadata criteria, when a provider filter was given
    pub criteria: Option<String>,
    pub entries: Vec<ConfigurationEntry>,
}

/// Entries command orchestrator
#[derive(Debug, Default)]
pub struct EntriesCommand;

impl EntriesCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, options: &EntriesOptions) -> anyhow::Result<EntriesReport> {
        let snapshot = RegistrySnapshot::from_path(&options.entries)?;
        let target = CloudTarget::new(&options.org, &options.space);

        let Some(provider_id) = &options.provider_id else {
            return Ok(EntriesReport {
                criteria: None,
                entries: snapshot.entries().to_vec(),
            });
        };

        let mut filter = ConfigurationFilter::for_provider(provider_id, target.clone());
        filter.version = options.version.clone();

        let criteria = metadata_criteria(&filter)
            .with_context(|| format!("invalid provider id '{provider_id}'"))?;
        let matcher = ConfigurationEntryMatcher::new(&snapshot);
        let entries = matcher.match_entries(
            provider_id,
            &filter,
            &target,
            MatchCardinality::Multiple,
            true,
        )?;

        Ok(EntriesReport {
            criteria: Some(criteria.query().to_string()),
            entries,
        })
    }
}
