//! Flotilla Core Library
//!
//! Provides the domain logic for MTA descriptor resolution: reference
//! substitution, shared-configuration matching, subscription building,
//! service ordering, and application lifecycle reconciliation.

pub mod commands;
pub mod criteria;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod ordering;
pub mod registry;
pub mod resolve;
pub mod subscription;

/// Re-exports of commonly used types
pub mod prelude {
    // Model
    pub use crate::model::{
        DeploymentDescriptor, Module, Properties, ProvidedDependency, RequiredDependency,
        Resource, SchemaVersion,
    };

    // Errors
    pub use crate::error::{
        ConflictError, ContentError, Error, IllegalStateError, ValidationError,
    };

    // Registry
    pub use crate::registry::{
        CloudTarget, ConfigurationEntry, ConfigurationEntryMatcher, ConfigurationFilter,
        ConfigurationRegistry, MatchCardinality, RegistrySnapshot,
    };

    // Criteria
    pub use crate::criteria::{MtaMetadataCriteria, MtaMetadataCriteriaBuilder};

    // Resolution
    pub use crate::resolve::{
        DescriptorResolver, ReferenceResolver, ResolutionContext, ResolutionReport,
    };

    // Subscriptions
    pub use crate::subscription::{
        ConfigurationSubscription, SubscriptionFactory, SubscriptionOwner,
    };

    // Lifecycle
    pub use crate::lifecycle::{
        actions_to_achieve, current_state, desired_state, ApplicationSnapshot,
        ApplicationStartupState, ApplicationStateAction, RequestedState, StartupIntent,
    };
}
