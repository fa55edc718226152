//! States of one remote portal session.
//!
//! A session starts `Disconnected` and walks a fixed linear path. Any step may
//! fail, in which case the session is abandoned in whatever state it reached;
//! there is no backwards transition.

use super::errors::{StateMachineError, StateMachineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Authenticated,
    ContextSelected,
    FormReady,
    Submitted,
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    Authenticate,
    SelectContext,
    OpenForm,
    Submit,
    Confirm,
    Reject,
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::SelectContext => "select_context",
            Self::OpenForm => "open_form",
            Self::Submit => "submit",
            Self::Confirm => "confirm",
            Self::Reject => "reject",
        }
    }
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Authenticated => "authenticated",
            Self::ContextSelected => "context_selected",
            Self::FormReady => "form_ready",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    /// The state reached when `event` succeeds from `self`.
    pub fn apply(self, event: SessionEvent) -> StateMachineResult<SessionState> {
        let target = match (self, event) {
            (Self::Disconnected, SessionEvent::Authenticate) => Self::Authenticated,
            (Self::Authenticated, SessionEvent::SelectContext) => Self::ContextSelected,
            (Self::ContextSelected, SessionEvent::OpenForm) => Self::FormReady,
            (Self::FormReady, SessionEvent::Submit) => Self::Submitted,
            (Self::Submitted, SessionEvent::Confirm) => Self::Confirmed,
            (Self::Submitted, SessionEvent::Reject) => Self::Rejected,
            (from, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };
        Ok(target)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
