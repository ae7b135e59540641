//! Refresh lifecycle state machine using rust-fsm.
//!
//! The client is either idle or has exactly one token refresh in flight.
//! Every 401 that reaches the coordinator consumes `Unauthorized`; the
//! state it was consumed in decides whether the caller leads the refresh
//! or queues behind it.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │      Idle       │ (initial)
//! └────────┬────────┘
//!          │ Unauthorized (caller becomes the leader)
//!          ▼
//! ┌─────────────────┐
//! │   Refreshing    │ ◄──┐ Unauthorized (caller queues)
//! └────────┬────────┘ ───┘
//!          │ RefreshSucceeded / RefreshFailed
//!          ▼
//!        Idle
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates module `refresh_machine` with State, Input and StateMachine.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub refresh_machine(Idle)

    Idle => {
        Unauthorized => Refreshing
    },
    Refreshing => {
        Unauthorized => Refreshing,
        RefreshSucceeded => Idle,
        RefreshFailed => Idle
    }
}

pub use refresh_machine::Input as RefreshMachineInput;
pub use refresh_machine::State as RefreshMachineState;
pub use refresh_machine::StateMachine as RefreshMachine;

/// Externally visible refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// No refresh in flight.
    Idle,
    /// A refresh is in flight; new 401s queue behind it.
    Refreshing,
}

impl RefreshState {
    pub fn is_refreshing(&self) -> bool {
        matches!(self, RefreshState::Refreshing)
    }
}

impl From<&RefreshMachineState> for RefreshState {
    fn from(state: &RefreshMachineState) -> Self {
        match state {
            RefreshMachineState::Idle => RefreshState::Idle,
            RefreshMachineState::Refreshing => RefreshState::Refreshing,
        }
    }
}
