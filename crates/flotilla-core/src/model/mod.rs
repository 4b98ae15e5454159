//! Deployment descriptor model and boundary parser.

pub mod descriptor;
pub mod parser;

pub use descriptor::{
    DeploymentDescriptor, Module, Properties, ProvidedDependency, RequiredDependency, Resource,
    SchemaVersion, SERVICE_RESOURCE_TYPES,
};
pub use parser::{parse_path, parse_str};
