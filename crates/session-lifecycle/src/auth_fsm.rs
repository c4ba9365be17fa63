//! Session phase state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │    Anonymous    │ (initial)
//! └────────┬────────┘
//!          │ SignedIn
//!          ▼
//! ┌─────────────────┐  RecoveryStarted   ┌─────────────────────────┐
//! │  Authenticated  │ ─────────────────► │ PasswordRecoveryPending │ ◄─┐ SignedIn
//! └────────┬────────┘ ◄───────────────── └────────────┬────────────┘ ──┘
//!          │            PasswordUpdated               │
//!          │ SignedOut                                │ SignedOut
//!          ▼                                          ▼
//!      Anonymous                                  Anonymous
//! ```
//!
//! A recovery event may also arrive while anonymous; the recovery phase then
//! survives the sign-in that completes the reset flow.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Anonymous)

    Anonymous => {
        SignedIn => Authenticated,
        RecoveryStarted => PasswordRecoveryPending,
        SignedOut => Anonymous
    },
    Authenticated => {
        SignedIn => Authenticated,
        RecoveryStarted => PasswordRecoveryPending,
        SignedOut => Anonymous
    },
    PasswordRecoveryPending => {
        // Interim sign-in during the reset flow keeps the recovery phase
        SignedIn => PasswordRecoveryPending,
        RecoveryStarted => PasswordRecoveryPending,
        PasswordUpdated => Authenticated,
        SignedOut => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session phase for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    Authenticated,
    PasswordRecoveryPending,
}

impl SessionPhase {
    pub fn is_password_recovery(&self) -> bool {
        matches!(self, SessionPhase::PasswordRecoveryPending)
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Anonymous => SessionPhase::Anonymous,
            SessionMachineState::Authenticated => SessionPhase::Authenticated,
            SessionMachineState::PasswordRecoveryPending => SessionPhase::PasswordRecoveryPending,
        }
    }
}

/// Payload delivered to session observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub is_authenticated: bool,
    pub is_password_recovery: bool,
}
