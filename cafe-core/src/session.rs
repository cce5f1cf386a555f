//! Conversation state for the rejection follow-up.
//!
//! Rejecting a venue starts a short dialogue: the user is asked why, then
//! whether the venue should be blacklisted, and finally a re-search runs
//! with the rejection applied. The transitions here are pure; adapters
//! persist the [`SessionState`] between messages so a restart does not lose
//! an in-flight rejection.

use thiserror::Error;

/// Where a user is in the rejection dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No dialogue in progress.
    #[default]
    Idle,
    /// The user rejected `place_id`; waiting for a reason or a skip.
    AwaitingRejectReason {
        /// Rejected venue.
        place_id: String,
    },
    /// Waiting for the user to confirm or decline blacklisting.
    AwaitingBlacklistConfirm {
        /// Rejected venue.
        place_id: String,
        /// Reason given, if any.
        reason: Option<String>,
    },
}

/// Input to the dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user rejected a recommendation.
    Reject {
        /// Rejected venue.
        place_id: String,
    },
    /// The user explained the rejection, or skipped with `None`.
    GiveReason {
        /// Reason text.
        reason: Option<String>,
    },
    /// The user answered the blacklist prompt.
    ConfirmBlacklist {
        /// Whether to blacklist.
        blacklist: bool,
    },
    /// Abandon the dialogue.
    Reset,
}

/// What the caller should do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Nothing further.
    None,
    /// Ask the user why they rejected the venue.
    AskReason {
        /// Rejected venue.
        place_id: String,
    },
    /// Ask whether to blacklist the venue.
    AskBlacklist {
        /// Rejected venue.
        place_id: String,
        /// Reason given, if any.
        reason: Option<String>,
    },
    /// Record the outcome and run a follow-up search.
    ReSearch {
        /// Rejected venue, excluded from the follow-up.
        place_id: String,
        /// Reason given, injected into the follow-up query.
        reason: Option<String>,
        /// Whether the venue was blacklisted.
        blacklist: bool,
    },
}

/// Errors raised by session transitions and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The event does not apply in the current state.
    #[error("{event} is not expected while {state}")]
    UnexpectedEvent {
        /// Current state label.
        state: &'static str,
        /// Event label.
        event: &'static str,
    },
    /// A persisted state label was not recognised or lacked its venue.
    #[error("cannot restore session state {label:?}")]
    Corrupt {
        /// Persisted label.
        label: String,
    },
}

const IDLE: &str = "IDLE";
const AWAITING_REASON: &str = "AWAITING_REJECT_REASON";
const AWAITING_CONFIRM: &str = "AWAITING_BLACKLIST_CONFIRM";

impl SessionEvent {
    const fn label(&self) -> &'static str {
        match self {
            Self::Reject { .. } => "reject",
            Self::GiveReason { .. } => "reason",
            Self::ConfirmBlacklist { .. } => "blacklist confirmation",
            Self::Reset => "reset",
        }
    }
}

impl SessionState {
    /// Persisted label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => IDLE,
            Self::AwaitingRejectReason { .. } => AWAITING_REASON,
            Self::AwaitingBlacklistConfirm { .. } => AWAITING_CONFIRM,
        }
    }

    /// Venue the dialogue concerns.
    #[must_use]
    pub fn place_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::AwaitingRejectReason { place_id }
            | Self::AwaitingBlacklistConfirm { place_id, .. } => Some(place_id),
        }
    }

    /// Reason captured so far.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::AwaitingBlacklistConfirm { reason, .. } => reason.as_deref(),
            Self::Idle | Self::AwaitingRejectReason { .. } => None,
        }
    }

    /// Rebuild a state from its persisted parts.
    ///
    /// # Errors
    /// Returns [`SessionError::Corrupt`] for unknown labels or a missing
    /// venue.
    pub fn from_parts(
        label: &str,
        place_id: Option<String>,
        reason: Option<String>,
    ) -> Result<Self, SessionError> {
        let corrupt = || SessionError::Corrupt {
            label: label.to_owned(),
        };
        match label {
            IDLE => Ok(Self::Idle),
            AWAITING_REASON => Ok(Self::AwaitingRejectReason {
                place_id: place_id.ok_or_else(corrupt)?,
            }),
            AWAITING_CONFIRM => Ok(Self::AwaitingBlacklistConfirm {
                place_id: place_id.ok_or_else(corrupt)?,
                reason,
            }),
            _ => Err(corrupt()),
        }
    }

    /// Apply `event`, returning the next state and the effect to perform.
    ///
    /// A new rejection restarts the dialogue from any state.
    ///
    /// # Errors
    /// Returns [`SessionError::UnexpectedEvent`] when `event` does not apply.
    pub fn apply(self, event: SessionEvent) -> Result<(Self, SessionEffect), SessionError> {
        match (self, event) {
            (_, SessionEvent::Reset) => Ok((Self::Idle, SessionEffect::None)),
            (_, SessionEvent::Reject { place_id }) => Ok((
                Self::AwaitingRejectReason {
                    place_id: place_id.clone(),
                },
                SessionEffect::AskReason { place_id },
            )),
            (Self::AwaitingRejectReason { place_id }, SessionEvent::GiveReason { reason }) => {
                let cleaned = reason.filter(|text| !text.trim().is_empty());
                Ok((
                    Self::AwaitingBlacklistConfirm {
                        place_id: place_id.clone(),
                        reason: cleaned.clone(),
                    },
                    SessionEffect::AskBlacklist {
                        place_id,
                        reason: cleaned,
                    },
                ))
            }
            (
                Self::AwaitingBlacklistConfirm { place_id, reason },
                SessionEvent::ConfirmBlacklist { blacklist },
            ) => Ok((
                Self::Idle,
                SessionEffect::ReSearch {
                    place_id,
                    reason,
                    blacklist,
                },
            )),
            (state, unexpected) => Err(SessionError::UnexpectedEvent {
                state: state.label(),
                event: unexpected.label(),
            }),
        }
    }
}
