//! Durable records of cross-MTA configuration consumption.
//!
//! When a descriptor resolves an external configuration reference, a
//! subscription is recorded so change-notification logic can later find
//! every consumer of a provider and trigger re-resolution. Building is a
//! pure function over the pre-substitution descriptor snapshot and the
//! resolved reference map; same inputs produce the same subscription set.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::DeploymentDescriptor;
use crate::registry::filter::ConfigurationFilter;
use crate::resolve::references::ResolvedConfigurationReference;

/// Which descriptor element declared the consuming dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum SubscriptionOwner {
    /// A module; its name doubles as the application name.
    Module(String),
    Resource(String),
}

impl SubscriptionOwner {
    pub fn name(&self) -> &str {
        match self {
            SubscriptionOwner::Module(name) | SubscriptionOwner::Resource(name) => name,
        }
    }
}

/// One consumer's dependency on a provider's published configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigurationSubscription {
    pub mta_id: String,
    pub space_id: String,
    pub owner: SubscriptionOwner,
    /// Name of the configuration resource as declared in the descriptor.
    pub resource_name: String,
    pub filter: ConfigurationFilter,
    /// Ids of the entries the reference resolved to. Empty when the
    /// reference matched nothing (inactive or unprovided yet).
    pub entry_ids: BTreeSet<i64>,
    /// Inactive references keep their subscription but are not eligible
    /// for re-resolution until reactivated.
    pub active: bool,
}

/// Builds subscriptions from the descriptor as it looked before reference
/// substitution, so recorded dependency shapes match what was declared.
pub struct SubscriptionFactory;

impl SubscriptionFactory {
    pub fn create_subscriptions(
        descriptor: &DeploymentDescriptor,
        resolved: &BTreeMap<String, ResolvedConfigurationReference>,
        space_id: &str,
    ) -> Vec<ConfigurationSubscription> {
        let mut subscriptions = Vec::new();
        for module in &descriptor.modules {
            for dependency in &module.required {
                if let Some(reference) = resolved.get(&dependency.name) {
                    subscriptions.push(Self::subscription(
                        descriptor,
                        SubscriptionOwner::Module(module.name.clone()),
                        reference,
                        space_id,
                    ));
                }
            }
        }
        for resource in &descriptor.resources {
            for dependency in &resource.required {
                if let Some(reference) = resolved.get(&dependency.name) {
                    subscriptions.push(Self::subscription(
                        descriptor,
                        SubscriptionOwner::Resource(resource.name.clone()),
                        reference,
                        space_id,
                    ));
                }
            }
        }
        subscriptions
    }

    fn subscription(
        descriptor: &DeploymentDescriptor,
        owner: SubscriptionOwner,
        reference: &ResolvedConfigurationReference,
        space_id: &str,
    ) -> ConfigurationSubscription {
        ConfigurationSubscription {
            mta_id: descriptor.id.clone(),
            space_id: space_id.to_string(),
            owner,
            resource_name: reference.resource_name().to_string(),
            filter: reference.filter.clone(),
            entry_ids: reference.entry_ids.iter().copied().collect(),
            active: reference.is_active(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_str;
    use crate::registry::entry::CloudTarget;
    use crate::registry::filter::parse_resource_filter;

    const DESCRIPTOR: &str = r#"
_schema-version: "3"
ID: consumer
version: 1.0.0
modules:
  - name: web
    type: javascript
    requires:
      - name: central-api
      - name: local-db
  - name: worker
    type: javascript
    requires:
      - name: central-api
resources:
  - name: local-db
    type: org.cloudfoundry.managed-service
    requires:
      - name: central-api
  - name: central-api
    type: configuration
    parameters:
      provider-id: "provider:api"
"#;

    fn resolved_reference(
        descriptor: &DeploymentDescriptor,
        entry_ids: Vec<i64>,
    ) -> BTreeMap<String, ResolvedConfigurationReference> {
        let source = descriptor.resource("central-api").unwrap().clone();
        let filter = parse_resource_filter(&source, &CloudTarget::new("org", "dev"))
            .unwrap()
            .unwrap();
        BTreeMap::from([(
            source.name.clone(),
            ResolvedConfigurationReference {
                filter,
                source,
                resolved: Vec::new(),
                entry_ids,
            },
        )])
    }

    #[test]
    fn test_one_subscription_per_consuming_dependency() {
        let descriptor = parse_str(DESCRIPTOR).unwrap();
        let resolved = resolved_reference(&descriptor, vec![7, 3]);

        let subscriptions =
            SubscriptionFactory::create_subscriptions(&descriptor, &resolved, "space-guid");

        let owners: BTreeSet<_> = subscriptions.iter().map(|s| s.owner.clone()).collect();
        assert_eq!(
            owners,
            BTreeSet::from([
                SubscriptionOwner::Module("web".into()),
                SubscriptionOwner::Module("worker".into()),
                SubscriptionOwner::Resource("local-db".into()),
            ])
        );
        for subscription in &subscriptions {
            assert_eq!(subscription.mta_id, "consumer");
            assert_eq!(subscription.space_id, "space-guid");
            assert_eq!(subscription.resource_name, "central-api");
            assert_eq!(subscription.entry_ids, BTreeSet::from([3, 7]));
            assert!(subscription.active);
        }
    }

    #[test]
    fn test_local_dependencies_produce_no_subscription() {
        let descriptor = parse_str(DESCRIPTOR).unwrap();
        let resolved = resolved_reference(&descriptor, vec![1]);

        let subscriptions =
            SubscriptionFactory::create_subscriptions(&descriptor, &resolved, "space-guid");

        assert!(
            subscriptions
                .iter()
                .all(|s| s.resource_name == "central-api")
        );
        assert_eq!(subscriptions.len(), 3);
    }

    #[test]
    fn test_build_is_order_insensitive_as_a_set() {
        let descriptor = parse_str(DESCRIPTOR).unwrap();
        let resolved = resolved_reference(&descriptor, vec![1]);

        let first: BTreeSet<_> =
            SubscriptionFactory::create_subscriptions(&descriptor, &resolved, "space-guid")
                .into_iter()
                .collect();
        let second: BTreeSet<_> =
            SubscriptionFactory::create_subscriptions(&descriptor, &resolved, "space-guid")
                .into_iter()
                .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inactive_reference_keeps_inactive_subscription() {
        let descriptor = parse_str(DESCRIPTOR).unwrap();
        let mut resolved = resolved_reference(&descriptor, Vec::new());
        if let Some(reference) = resolved.get_mut("central-api") {
            reference.source.active = false;
        }

        let subscriptions =
            SubscriptionFactory::create_subscriptions(&descriptor, &resolved, "space-guid");

        assert!(!subscriptions.is_empty());
        assert!(subscriptions.iter().all(|s| !s.active));
        assert!(subscriptions.iter().all(|s| s.entry_ids.is_empty()));
    }
}
