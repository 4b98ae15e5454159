//! Reconciliation actions between observed and desired startup states.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IllegalStateError;
use crate::lifecycle::state::ApplicationStartupState;

/// One step of bringing an application to its desired state. Declared in
/// execution order, so an ordered set iterates as STOP, STAGE, START.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStateAction {
    Stop,
    Stage,
    Start,
}

impl fmt::Display for ApplicationStateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationStateAction::Stop => "STOP",
            ApplicationStateAction::Stage => "STAGE",
            ApplicationStateAction::Start => "START",
        };
        f.write_str(name)
    }
}

/// Actions needed to take an application from `current` to `desired`.
///
/// Only STARTED and STOPPED are legal targets; EXECUTED is reached through
/// the execute intent, not through this calculator, and INCONSISTENT is
/// never a goal.
pub fn actions_to_achieve(
    current: ApplicationStartupState,
    desired: ApplicationStartupState,
) -> Result<BTreeSet<ApplicationStateAction>, IllegalStateError> {
    use ApplicationStartupState::{Inconsistent, Started, Stopped};
    use ApplicationStateAction::{Stage, Start, Stop};

    if !matches!(desired, Started | Stopped) {
        return Err(IllegalStateError {
            state: desired.to_string(),
        });
    }
    if current == desired {
        return Ok(BTreeSet::new());
    }
    let actions = match (current, desired) {
        (Inconsistent, Started) => BTreeSet::from([Stop, Stage, Start]),
        (_, Started) => BTreeSet::from([Stage, Start]),
        (_, Stopped) => BTreeSet::from([Stop]),
        _ => BTreeSet::new(),
    };
    Ok(actions)
}
