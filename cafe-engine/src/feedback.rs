//! The accept, keep, and reject dialogue.
//!
//! Rejecting a venue walks the user through two prompts (why, and whether
//! to blacklist) before a follow-up search runs. The dialogue state is
//! persisted through [`SessionStore`] after every step, so a restart
//! between prompts resumes where the user left off.

use std::collections::BTreeSet;
use std::sync::Arc;

use cafe_core::{
    Action, Clock, FeedbackLedger, Interaction, LedgerError, SessionEffect, SessionError,
    SessionEvent, SessionState, SessionStore, StoreError, SystemClock, UserList, VenueStore,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use thiserror::Error;

/// Reply code for skipping the reason prompt.
pub const SKIP_REASON: &str = "change_only";

const PRESET_REASONS: &[(&str, &str)] = &[
    ("expensive", "too expensive"),
    ("noisy", "too noisy"),
    ("no_plug", "no power sockets"),
];

/// Turn a reply to the reason prompt into the reason to record.
///
/// Preset button codes expand to their phrase, [`SKIP_REASON`] and blank
/// replies mean "no reason", and anything else is kept as free text.
///
/// # Examples
///
/// ```
/// use cafe_engine::feedback::reason_from_reply;
///
/// assert_eq!(reason_from_reply("noisy").as_deref(), Some("too noisy"));
/// assert_eq!(reason_from_reply("change_only"), None);
/// assert_eq!(reason_from_reply(" too dark ").as_deref(), Some("too dark"));
/// ```
#[must_use]
pub fn reason_from_reply(reply: &str) -> Option<String> {
    let trimmed = reply.trim();
    if trimmed.is_empty() || trimmed == SKIP_REASON {
        return None;
    }
    let phrase = PRESET_REASONS
        .iter()
        .find(|(code, _)| *code == trimmed)
        .map_or(trimmed, |(_, phrase)| *phrase);
    Some(phrase.to_owned())
}

/// What the next search should steer away from after a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NegativeConstraint {
    /// Nothing to avoid.
    #[default]
    None,
    /// The user's own words; appended to the semantic query.
    Reason(String),
    /// Tags of the rejected venue; matching venues are penalised.
    AvoidTags(BTreeSet<String>),
}

impl NegativeConstraint {
    /// Tags to penalise, empty unless this is [`Self::AvoidTags`].
    #[must_use]
    pub fn avoid_tags(&self) -> BTreeSet<String> {
        match self {
            Self::AvoidTags(tags) => tags.clone(),
            Self::None | Self::Reason(_) => BTreeSet::new(),
        }
    }
}

/// Work out what to avoid after `rejected_place_id` was turned down.
///
/// An explicit reason wins. Without one, the rejected venue's tags become
/// the avoid set. A store that cannot answer yields
/// [`NegativeConstraint::None`].
///
/// # Errors
/// Returns [`StoreError::Malformed`] when the venue lookup returns data
/// that violates the venue schema.
pub async fn rejected_features(
    store: &dyn VenueStore,
    rejected_place_id: Option<&str>,
    reason: Option<&str>,
) -> Result<NegativeConstraint, StoreError> {
    if let Some(text) = reason.map(str::trim).filter(|text| !text.is_empty()) {
        return Ok(NegativeConstraint::Reason(text.to_owned()));
    }
    let Some(place_id) = rejected_place_id else {
        return Ok(NegativeConstraint::None);
    };
    let venues = match store.get_many(&[place_id.to_owned()]).await {
        Ok(venues) => venues,
        Err(StoreError::Unavailable { message }) => {
            warn!("cannot look up rejected venue {place_id}: {message}");
            return Ok(NegativeConstraint::None);
        }
        Err(err) => return Err(err),
    };
    let tags: BTreeSet<String> = venues
        .into_iter()
        .find(|venue| venue.place_id == place_id)
        .map(|venue| venue.tags)
        .unwrap_or_default();
    if tags.is_empty() {
        Ok(NegativeConstraint::None)
    } else {
        Ok(NegativeConstraint::AvoidTags(tags))
    }
}

/// Append a negative reason to the semantic query.
///
/// Returns `None` when there is no query to steer.
#[must_use]
pub fn inject_reason(query: Option<&str>, reason: &str) -> Option<String> {
    query.map(|text| format!("{text}, but strictly avoid features like \"{reason}\""))
}

/// Parameters for the search that follows a completed rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    /// Venue the user turned down; excluded from the follow-up.
    pub rejected_place_id: String,
    /// Reason the user gave, if any.
    pub negative_reason: Option<String>,
}

/// Errors raised by [`FeedbackLoop`].
#[derive(Debug, Error)]
pub enum FeedbackError {
    /// Reading or writing the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// The reply does not fit the dialogue's current step.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Records feedback and drives the rejection dialogue.
#[derive(Clone)]
pub struct FeedbackLoop {
    ledger: Arc<dyn FeedbackLedger>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl FeedbackLoop {
    /// Record into `ledger` and keep dialogue state in `sessions`.
    #[must_use]
    pub fn new(ledger: Arc<dyn FeedbackLedger>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            ledger,
            sessions,
            clock: Arc::new(SystemClock::default()),
        }
    }

    /// Timestamp feedback with `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    fn log(
        &self,
        user_id: &str,
        action: Action,
        place_id: &str,
        reason: Option<String>,
    ) -> Result<(), FeedbackError> {
        let interaction = Interaction::new(user_id, action, self.now())
            .with_place(place_id)
            .with_reason(reason);
        self.ledger.record(&interaction)?;
        info!("recorded {action} for {user_id} on {place_id}");
        Ok(())
    }

    fn step(&self, user_id: &str, event: SessionEvent) -> Result<SessionEffect, FeedbackError> {
        let current = self.sessions.load_session(user_id)?;
        let (next, effect) = current.apply(event)?;
        self.sessions.save_session(user_id, &next, self.now())?;
        Ok(effect)
    }

    /// The user liked a recommendation.
    ///
    /// # Errors
    /// Returns [`FeedbackError::Ledger`] when the write fails.
    pub fn accept(&self, user_id: &str, place_id: &str) -> Result<(), FeedbackError> {
        self.log(user_id, Action::Yes, place_id, None)
    }

    /// The user bookmarked a recommendation.
    ///
    /// # Errors
    /// Returns [`FeedbackError::Ledger`] when the write fails.
    pub fn keep(&self, user_id: &str, place_id: &str) -> Result<(), FeedbackError> {
        self.log(user_id, Action::Keep, place_id, None)
    }

    /// Take `place_id` off one of the user's lists.
    ///
    /// # Errors
    /// Returns [`FeedbackError::Ledger`] when the write fails.
    pub fn remove_from_list(
        &self,
        user_id: &str,
        list: UserList,
        place_id: &str,
    ) -> Result<(), FeedbackError> {
        self.ledger.remove_from_list(user_id, list, place_id)?;
        info!("removed {place_id} from {list:?} of {user_id}");
        Ok(())
    }

    /// The user turned down `place_id`; ask why.
    ///
    /// # Errors
    /// Returns [`FeedbackError`] when the session cannot be read or saved.
    pub fn reject(&self, user_id: &str, place_id: &str) -> Result<SessionEffect, FeedbackError> {
        self.step(
            user_id,
            SessionEvent::Reject {
                place_id: place_id.to_owned(),
            },
        )
    }

    /// The user answered the reason prompt. The answer is logged as
    /// `NO_REASON` before asking about the blacklist.
    ///
    /// # Errors
    /// Returns [`FeedbackError::Session`] when no rejection is awaiting a
    /// reason, or [`FeedbackError::Ledger`] when a write fails.
    pub fn give_reason(
        &self,
        user_id: &str,
        reason: Option<String>,
    ) -> Result<SessionEffect, FeedbackError> {
        let effect = self.step(user_id, SessionEvent::GiveReason { reason })?;
        if let SessionEffect::AskBlacklist { place_id, reason } = &effect {
            self.log(user_id, Action::NoReason, place_id, reason.clone())?;
        }
        Ok(effect)
    }

    /// The user answered the blacklist prompt. Confirming logs `NO`, which
    /// blacklists the venue. Either way the dialogue ends and the returned
    /// [`FollowUp`] describes the search to run next.
    ///
    /// # Errors
    /// Returns [`FeedbackError::Session`] when no rejection is awaiting
    /// confirmation, or [`FeedbackError::Ledger`] when a write fails.
    pub fn confirm_blacklist(
        &self,
        user_id: &str,
        blacklist: bool,
    ) -> Result<FollowUp, FeedbackError> {
        let current = self.sessions.load_session(user_id)?;
        let (next, effect) = current.apply(SessionEvent::ConfirmBlacklist { blacklist })?;
        let SessionEffect::ReSearch {
            place_id,
            reason,
            blacklist: confirmed,
        } = effect
        else {
            return Err(SessionError::UnexpectedEvent {
                state: next.label(),
                event: "blacklist confirmation",
            }
            .into());
        };
        if confirmed {
            self.log(user_id, Action::No, &place_id, reason.clone())?;
        }
        self.sessions.save_session(user_id, &next, self.now())?;
        Ok(FollowUp {
            rejected_place_id: place_id,
            negative_reason: reason,
        })
    }

    /// Abandon any dialogue in progress.
    ///
    /// # Errors
    /// Returns [`FeedbackError::Ledger`] when the session cannot be saved.
    pub fn reset(&self, user_id: &str) -> Result<(), FeedbackError> {
        self.step(user_id, SessionEvent::Reset).map(|_| ())
    }

    /// Where the user is in the dialogue.
    ///
    /// # Errors
    /// Returns [`FeedbackError::Ledger`] when the session cannot be read.
    pub fn session(&self, user_id: &str) -> Result<SessionState, FeedbackError> {
        Ok(self.sessions.load_session(user_id)?)
    }
}
