//! High-level commands for flotilla operations.
//!
//! This module provides the public API for resolving descriptors, ordering
//! services, calculating lifecycle actions, and inspecting registry
//! snapshots. These commands are designed to be called by CLI frontends.

pub mod actions;
pub mod entries;
pub mod order;
pub mod resolve;

pub use actions::{ActionsCommand, ActionsOptions, ActionsReport};
pub use entries::{EntriesCommand, EntriesOptions, EntriesReport};
pub use order::{OrderCommand, OrderOptions, OrderReport};
pub use resolve::{ResolveCommand, ResolveOptions};
