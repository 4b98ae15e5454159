//! In-memory configuration registry.
//!
//! The snapshot holds published entries for one resolution run. Lookups
//! apply the filter's provider coordinates, content pairs and visibility;
//! version matching stays with the matcher so it can prefer exact pins
//! over range satisfiers.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::error::ConflictError;
use crate::registry::ConfigurationRegistry;
use crate::registry::entry::{CloudTarget, ConfigurationEntry};
use crate::registry::filter::ConfigurationFilter;

#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: Vec<ConfigurationEntry>,
    next_id: i64,
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Build a snapshot from already-published entries, rejecting duplicates.
    pub fn from_entries(
        entries: impl IntoIterator<Item = ConfigurationEntry>,
    ) -> Result<Self, ConflictError> {
        let mut snapshot = Self::new();
        for entry in entries {
            snapshot.publish(entry)?;
        }
        Ok(snapshot)
    }

    /// Load a snapshot from a JSON array of entries.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let entries: Vec<ConfigurationEntry> =
            serde_json::from_str(raw).context("malformed configuration entry list")?;
        Self::from_entries(entries).context("conflicting configuration entries")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read entries from {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed to load entries from {}", path.display()))
    }

    /// Publish one entry. The provider coordinates (nid, id, version, target)
    /// must be unique within the registry; a zero id is replaced with the
    /// next free one.
    pub fn publish(
        &mut self,
        mut entry: ConfigurationEntry,
    ) -> Result<&ConfigurationEntry, ConflictError> {
        if let Some(existing) = self
            .entries
            .iter()
            .find(|candidate| candidate.provider_key() == entry.provider_key())
        {
            return Err(ConflictError::DuplicateEntry {
                provider_nid: existing.provider_nid.clone(),
                provider_id: existing.provider_id.clone(),
                provider_version: existing
                    .provider_version
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "none".to_string()),
                target: existing.target_space.to_string(),
            });
        }
        if entry.id == 0 {
            entry.id = self.next_id;
        }
        self.next_id = self.next_id.max(entry.id + 1);
        self.entries.push(entry);
        Ok(self.entries.last().unwrap_or_else(|| unreachable!()))
    }

    pub fn entries(&self) -> &[ConfigurationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigurationRegistry for RegistrySnapshot {
    fn find(
        &self,
        filter: &ConfigurationFilter,
        consumer_target: &CloudTarget,
    ) -> anyhow::Result<Vec<ConfigurationEntry>> {
        let matched = self
            .entries
            .iter()
            .filter(|entry| filter.matches_coordinates(entry))
            .filter(|entry| entry.visible_to(consumer_target))
            .cloned()
            .collect();
        Ok(matched)
    }
}
