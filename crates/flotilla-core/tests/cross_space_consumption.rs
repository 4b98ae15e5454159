//! Consuming configuration published in another org and space.
//!
//! Exercises the full path from a `configuration` resource through the
//! matcher's visibility checks to the materialized resource.

mod support;

use flotilla_core::error::{ConflictError, ContentError, Error};
use flotilla_core::registry::entry::{CloudTarget, ConfigurationEntry};
use flotilla_core::registry::matcher::ConfigurationEntryMatcher;
use flotilla_core::registry::snapshot::RegistrySnapshot;
use flotilla_core::resolve::ConfigurationReferencesResolver;
use semver::Version;
use serde_json::json;
use support::descriptor;

const DESCRIPTOR: &str = r#"
_schema-version: "3.3"
ID: storefront
version: 1.4.0
modules:
  - name: web
    type: javascript
    properties:
      metrics_url: ${metrics/url}
    requires:
      - name: metrics
resources:
  - name: metrics
    type: configuration
    parameters:
      provider-id: "central-monitoring:metrics-api"
      target: shared prod
"#;

fn entry_in(id: i64, org: &str, space: &str, content: &str) -> ConfigurationEntry {
    ConfigurationEntry::new(
        id,
        "central-monitoring:metrics-api",
        None,
        CloudTarget::new(org, space),
        content,
    )
}

#[test]
fn visible_entry_in_foreign_space_materializes() {
    let mut shared = entry_in(1, "shared", "prod", r#"{"url": "https://metrics.shared.test"}"#);
    shared.visibility = vec![CloudTarget::new("acme", "*")];
    let snapshot = RegistrySnapshot::from_entries([shared]).unwrap();
    let matcher = ConfigurationEntryMatcher::new(&snapshot);

    let mut parsed = descriptor(DESCRIPTOR);
    let mut resolver =
        ConfigurationReferencesResolver::new(&matcher, CloudTarget::new("acme", "dev"));
    resolver.resolve(&mut parsed).unwrap();

    // A single entry keeps the declared resource name.
    let metrics = parsed.resource("metrics").unwrap();
    assert_eq!(metrics.resource_type, None);
    assert_eq!(metrics.properties["url"], json!("https://metrics.shared.test"));
    assert_eq!(resolver.resolved_references()["metrics"].entry_ids, vec![1]);

    // The consuming dependency is still in place for reference resolution.
    let web = parsed.module("web").unwrap();
    assert_eq!(web.required[0].name, "metrics");
}

#[test]
fn invisible_entry_fails_a_mandatory_dependency() {
    let mut shared = entry_in(1, "shared", "prod", r#"{"url": "https://metrics.shared.test"}"#);
    shared.visibility = vec![CloudTarget::new("acme", "*")];
    let snapshot = RegistrySnapshot::from_entries([shared]).unwrap();
    let matcher = ConfigurationEntryMatcher::new(&snapshot);

    let mut parsed = descriptor(DESCRIPTOR);
    let mut resolver =
        ConfigurationReferencesResolver::new(&matcher, CloudTarget::new("intruder", "dev"));
    let err = resolver.resolve(&mut parsed).unwrap_err();
    assert!(matches!(
        err,
        Error::Content(ContentError::NoMatchingEntries { ref dependency }) if dependency == "metrics"
    ));
}

#[test]
fn default_visibility_spans_the_providing_org() {
    // No visibility list: the entry is readable from every space of its org.
    let own_org = entry_in(1, "acme", "prod", r#"{"url": "https://metrics.acme.test"}"#);
    let snapshot = RegistrySnapshot::from_entries([own_org]).unwrap();
    let matcher = ConfigurationEntryMatcher::new(&snapshot);

    let mut parsed = descriptor(DESCRIPTOR);
    parsed.resources[0]
        .parameters
        .insert("target".into(), json!("acme prod"));

    let mut resolver =
        ConfigurationReferencesResolver::new(&matcher, CloudTarget::new("acme", "dev"));
    resolver.resolve(&mut parsed).unwrap();
    assert_eq!(
        parsed.resource("metrics").unwrap().properties["url"],
        json!("https://metrics.acme.test")
    );
}

#[test]
fn content_filter_narrows_parallel_publications() {
    let mut gold = entry_in(1, "shared", "prod", r#"{"url": "https://gold.test", "tier": "gold"}"#);
    gold.visibility = vec![CloudTarget::new("*", "*")];
    gold.provider_version = Some(Version::new(1, 0, 0));
    let mut silver =
        entry_in(2, "shared", "prod", r#"{"url": "https://silver.test", "tier": "silver"}"#);
    silver.visibility = vec![CloudTarget::new("*", "*")];
    silver.provider_version = Some(Version::new(2, 0, 0));

    let snapshot = RegistrySnapshot::from_entries([gold, silver]).unwrap();
    let matcher = ConfigurationEntryMatcher::new(&snapshot);

    // Without a content filter the two publications are indistinguishable.
    let mut ambiguous = descriptor(DESCRIPTOR);
    let mut resolver =
        ConfigurationReferencesResolver::new(&matcher, CloudTarget::new("acme", "dev"));
    let err = resolver.resolve(&mut ambiguous).unwrap_err();
    assert!(matches!(err, Error::Conflict(ConflictError::AmbiguousMatch { .. })));

    let mut parsed = descriptor(DESCRIPTOR);
    parsed.resources[0]
        .parameters
        .insert("filter".into(), json!({"tier": "gold"}));

    let mut resolver =
        ConfigurationReferencesResolver::new(&matcher, CloudTarget::new("acme", "dev"));
    resolver.resolve(&mut parsed).unwrap();

    let metrics = parsed.resource("metrics").unwrap();
    assert_eq!(metrics.properties["url"], json!("https://gold.test"));
    assert_eq!(resolver.resolved_references()["metrics"].entry_ids, vec![1]);
}
