//! Configuration registry: published entries, selection filters and the
//! matcher that picks the entries a dependency consumes.

pub mod entry;
pub mod filter;
pub mod matcher;
pub mod snapshot;

pub use entry::{
    CloudTarget, ConfigurationEntry, PROVIDER_ID_DELIMITER, PROVIDER_NAMESPACE_DEFAULT,
    PROVIDER_NID, TARGET_DELIMITER, compute_provider_id,
};
pub use filter::{
    CONFIGURATION_TYPE, ConfigurationFilter, LEGACY_CONFIGURATION_TYPE, VersionRequirement,
    parse_resource_filter,
};
pub use matcher::{ConfigurationEntryMatcher, MatchCardinality, metadata_criteria};
pub use snapshot::RegistrySnapshot;

/// Source of published configuration entries.
///
/// Implementations answer coordinate and visibility queries; version
/// requirements and selection preferences are the matcher's concern.
pub trait ConfigurationRegistry: Send + Sync {
    fn find(
        &self,
        filter: &ConfigurationFilter,
        consumer_target: &CloudTarget,
    ) -> anyhow::Result<Vec<ConfigurationEntry>>;
}
