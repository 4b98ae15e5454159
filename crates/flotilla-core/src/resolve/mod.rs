//! Reference resolution over deployment descriptors.
//!
//! Layered bottom-up: `reference` knows the token syntax, `resolver`
//! substitutes tokens from descriptor scope chains, `expander` rewrites
//! values when one reference becomes several, `references` replaces
//! configuration resources with registry content, and `pipeline` runs the
//! whole sequence and reports the outcome.

pub mod expander;
pub mod pipeline;
pub mod reference;
pub mod references;
pub mod resolver;

pub use pipeline::{DescriptorResolver, ResolutionContext, ResolutionReport};
pub use reference::{contains_reference, find_tokens, unescape, ReferenceToken};
pub use references::{ConfigurationReferencesResolver, ResolvedConfigurationReference};
pub use resolver::ReferenceResolver;
