#![allow(dead_code)]

use flotilla_core::model::{parse_str, DeploymentDescriptor};
use flotilla_core::registry::{CloudTarget, ConfigurationEntry, RegistrySnapshot};
use semver::Version;

pub fn descriptor(text: &str) -> DeploymentDescriptor {
    parse_str(text).expect("fixture descriptor should parse")
}

pub fn entry(id: i64, provider_id: &str, version: &str, content: &str) -> ConfigurationEntry {
    ConfigurationEntry::new(
        id,
        provider_id,
        Some(Version::parse(version).expect("fixture version should parse")),
        CloudTarget::new("org", "dev"),
        content,
    )
}

pub fn registry(entries: Vec<ConfigurationEntry>) -> RegistrySnapshot {
    RegistrySnapshot::from_entries(entries).expect("fixture entries should publish")
}
