//! Persistence contracts for user feedback and dialogue state.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use geo::Point;
use thiserror::Error;

use crate::{BehaviorCounts, Interaction, SessionError, SessionState, UserList};

/// Errors raised by a [`FeedbackLedger`] or [`SessionStore`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing store rejected a read or write.
    #[error("ledger {operation} failed: {message}")]
    Storage {
        /// Operation that failed.
        operation: &'static str,
        /// Detail.
        message: String,
    },
    /// A stored value could not be decoded.
    #[error("ledger holds an invalid {field}: {value}")]
    Corrupt {
        /// Column or field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A persisted session could not be restored.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Append-only interaction log with the derived per-user lists.
///
/// Implementations must make list updates atomic set operations and
/// location updates last-writer-wins.
pub trait FeedbackLedger: Send + Sync {
    /// Append `interaction` to the log. `KEEP` also adds the venue to the
    /// user's bookmarks and `NO` adds it to the blacklist.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the write fails.
    fn record(&self, interaction: &Interaction) -> Result<(), LedgerError>;

    /// Remove `place_id` from `list` and delete the log rows that put it
    /// there.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the write fails.
    fn remove_from_list(&self, user_id: &str, list: UserList, place_id: &str)
    -> Result<(), LedgerError>;

    /// Venues the user never wants to see.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the read fails.
    fn blacklist(&self, user_id: &str) -> Result<BTreeSet<String>, LedgerError>;

    /// Venues the user has saved.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the read fails.
    fn bookmarks(&self, user_id: &str) -> Result<BTreeSet<String>, LedgerError>;

    /// Aggregate clicks, keeps, and dislikes for one venue.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the read fails.
    fn behavior_counts(&self, place_id: &str) -> Result<BehaviorCounts, LedgerError>;

    /// Behaviour tallies for several venues; venues without rows are
    /// omitted.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when any read fails.
    fn behavior_counts_for(
        &self,
        place_ids: &[String],
    ) -> Result<HashMap<String, BehaviorCounts>, LedgerError> {
        let mut counts = HashMap::new();
        for place_id in place_ids {
            let tally = self.behavior_counts(place_id)?;
            if tally != BehaviorCounts::default() {
                counts.insert(place_id.clone(), tally);
            }
        }
        Ok(counts)
    }

    /// Whether the user has any logged interaction.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the read fails.
    fn is_returning_user(&self, user_id: &str) -> Result<bool, LedgerError>;

    /// Overwrite the user's last known location and log `UPDATE_LOCATION`.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the write fails.
    fn update_location(
        &self,
        user_id: &str,
        location: Point<f64>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// The user's last known location.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the read fails.
    fn last_known_location(&self, user_id: &str) -> Result<Option<Point<f64>>, LedgerError>;

    /// Record that `place_ids` were shown to the user at `at`.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the write fails.
    fn record_impressions(
        &self,
        user_id: &str,
        place_ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// Most recent time each of `place_ids` was shown to the user; venues
    /// never shown are omitted.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the read fails.
    fn last_shown(
        &self,
        user_id: &str,
        place_ids: &[String],
    ) -> Result<HashMap<String, DateTime<Utc>>, LedgerError>;
}

/// Durable per-user dialogue state.
pub trait SessionStore: Send + Sync {
    /// Current state; [`SessionState::Idle`] when none is stored.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the read fails or the row is corrupt.
    fn load_session(&self, user_id: &str) -> Result<SessionState, LedgerError>;

    /// Persist `state`, replacing any previous value.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the write fails.
    fn save_session(
        &self,
        user_id: &str,
        state: &SessionState,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;
}
