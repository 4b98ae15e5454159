//! Application lifecycle reconciliation.
//!
//! Derives where an application is ([`current_state`]) and where the
//! deployment wants it ([`desired_state`]), then computes the action set
//! bridging the two ([`actions_to_achieve`]).

pub mod actions;
pub mod state;

pub use actions::{actions_to_achieve, ApplicationStateAction};
pub use state::{
    current_state, desired_state, ApplicationSnapshot, ApplicationStartupState, RequestedState,
    StartupIntent,
};
