//! Session lifecycle state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌──────────────────┐  AttemptStarted   ┌──────────────────┐
//! │ Unauthenticated  │ ────────────────► │  AttemptPending  │
//! │    (initial)     │ ◄──────────────── │                  │
//! └───┬──────────▲───┘  AttemptDiscarded └────────┬─────────┘
//!     │          │                                │ SignedIn
//!     │ Restored │ LoggedOut / RefreshFailed      ▼
//!     │          │                       ┌──────────────────┐
//!     └──────────┼─────────────────────► │  Authenticated   │
//!                │                       └───┬──────────▲───┘
//!                │                           │          │
//!                │              TokenExpired │          │ Refreshed
//!                │                           ▼          │
//!                │                       ┌──────────────┴───┐
//!                └────────────────────── │     Expired      │
//!                                        └──────────────────┘
//! ```
//!
//! `RestoredStale` enters `Expired` directly from `Unauthenticated`.
//! Every state accepts `LoggedOut`, and every state accepts `AttemptStarted`
//! and `SignedIn` so a new sign-in can replace a live session.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        AttemptStarted => AttemptPending,
        SignedIn => Authenticated,
        Restored => Authenticated,
        RestoredStale => Expired,
        LoggedOut => Unauthenticated
    },
    AttemptPending => {
        AttemptStarted => AttemptPending,
        AttemptDiscarded => Unauthenticated,
        SignedIn => Authenticated,
        // An older credential may still be refreshed while a new attempt waits
        TokenExpired => AttemptPending,
        Refreshed => AttemptPending,
        RefreshFailed => Unauthenticated,
        LoggedOut => Unauthenticated
    },
    Authenticated => {
        AttemptStarted => AttemptPending,
        SignedIn => Authenticated,
        TokenExpired => Expired,
        Refreshed => Authenticated,
        LoggedOut => Unauthenticated
    },
    Expired => {
        AttemptStarted => AttemptPending,
        SignedIn => Authenticated,
        TokenExpired => Expired,
        Refreshed => Authenticated,
        RefreshFailed => Unauthenticated,
        LoggedOut => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Public view of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No credential and no sign-in attempt.
    Unauthenticated,
    /// First sign-in step done, waiting for confirmation.
    AttemptPending,
    /// Credential present and unexpired.
    Authenticated,
    /// Credential present but past its expiry; refresh is due.
    Expired,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => SessionState::Unauthenticated,
            SessionMachineState::AttemptPending => SessionState::AttemptPending,
            SessionMachineState::Authenticated => SessionState::Authenticated,
            SessionMachineState::Expired => SessionState::Expired,
        }
    }
}

/// Payload for session state change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateChanged {
    pub state: SessionState,
    /// Driver id of the live identity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<i64>,
}
