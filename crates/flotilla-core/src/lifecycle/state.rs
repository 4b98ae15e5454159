//! Application startup states and their derivation from live data.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the platform was told the application should be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedState {
    Started,
    Stopped,
}

/// Lifecycle state of one application, observed or desired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStartupState {
    Started,
    Stopped,
    /// Ran one-off work to completion; only ever observed, never targeted.
    Executed,
    /// Partially scaled or contradicting the platform's requested state.
    Inconsistent,
}

impl fmt::Display for ApplicationStartupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationStartupState::Started => "STARTED",
            ApplicationStartupState::Stopped => "STOPPED",
            ApplicationStartupState::Executed => "EXECUTED",
            ApplicationStartupState::Inconsistent => "INCONSISTENT",
        };
        f.write_str(name)
    }
}

/// Instance counts and requested state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub requested_instances: u32,
    pub running_instances: u32,
    pub requested_state: RequestedState,
}

/// Startup intent declared for the deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupIntent {
    /// Run the application once and treat completion as the goal.
    #[serde(default)]
    pub execute_only: bool,
    /// Deploy without starting, per-app or installation default.
    #[serde(default)]
    pub no_start: bool,
}

/// Derive the current state from what the platform reports.
pub fn current_state(
    snapshot: &ApplicationSnapshot,
    intent: &StartupIntent,
) -> ApplicationStartupState {
    if intent.execute_only {
        return ApplicationStartupState::Executed;
    }
    let running = snapshot.running_instances;
    let requested = snapshot.requested_instances;
    match snapshot.requested_state {
        RequestedState::Started if running == requested && requested > 0 => {
            ApplicationStartupState::Started
        }
        RequestedState::Stopped if running == 0 => ApplicationStartupState::Stopped,
        _ => ApplicationStartupState::Inconsistent,
    }
}

/// Derive the state the deployment is driving toward.
pub fn desired_state(intent: &StartupIntent) -> ApplicationStartupState {
    if intent.execute_only {
        ApplicationStartupState::Executed
    } else if intent.no_start {
        ApplicationStartupState::Stopped
    } else {
        ApplicationStartupState::Started
    }
}
