//! Actions command implementation.
//!
//! Derives current and desired application states from platform data and
//! intent flags, then computes the reconciliation actions.

use serde::Serialize;

use crate::lifecycle::{
    actions_to_achieve, current_state, desired_state, ApplicationSnapshot,
    ApplicationStartupState, ApplicationStateAction, StartupIntent,
};

/// Options for the actions command
#[derive(Debug, Clone)]
pub struct ActionsOptions {
    /// Live instance counts and requested state
    pub snapshot: ApplicationSnapshot,
    /// Intent flags from the deployment request
    pub intent: StartupIntent,
    /// Explicit desired state, overriding intent derivation
    pub desired: Option<ApplicationStartupState>,
}

impl ActionsOptions {
    pub fn new(snapshot: ApplicationSnapshot) -> Self {
        Self {
            snapshot,
            intent: StartupIntent::default(),
            desired: None,
        }
    }

    pub fn with_intent(mut self, intent: StartupIntent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_desired(mut self, desired: ApplicationStartupState) -> Self {
        self.desired = Some(desired);
        self
    }
}

/// Result of action calculation
#[derive(Debug, Clone, Serialize)]
pub struct ActionsReport {
    pub current: ApplicationStartupState,
    pub desired: ApplicationStartupState,
    /// Actions in execution order
    pub actions: Vec<ApplicationStateAction>,
}

/// Actions command orchestrator
#[derive(Debug, Default)]
pub struct ActionsCommand;

impl ActionsCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, options: &ActionsOptions) -> anyhow::Result<ActionsReport> {
        let current = current_state(&options.snapshot, &options.intent);
        let desired = match options.desired {
            Some(state) => state,
            None => desired_state(&options.intent),
        };

        // An execute intent is its own goal; reconciliation does not apply
        // unless the caller asked for a different target explicitly.
        let actions = if options.intent.execute_only && options.desired.is_none() {
            Vec::new()
        } else {
            actions_to_achieve(current, desired)?.into_iter().collect()
        };

        Ok(ActionsReport {
            current,
            desired,
            actions,
        })
    }
}
