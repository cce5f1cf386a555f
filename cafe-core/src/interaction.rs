//! Interaction-log vocabulary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geo::Point;
use thiserror::Error;

/// A user action recorded in the interaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Action {
    /// The user opened or accepted a recommendation.
    Yes,
    /// The user confirmed they never want to see the venue again.
    No,
    /// The user rejected the venue and explained why.
    NoReason,
    /// The user bookmarked the venue.
    Keep,
    /// The user issued a free-text search.
    Search,
    /// The user picked a starting preference without free text.
    InitPref,
    /// The user shared a new location.
    UpdateLocation,
}

impl Action {
    /// Every action in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Yes,
        Self::No,
        Self::NoReason,
        Self::Keep,
        Self::Search,
        Self::InitPref,
        Self::UpdateLocation,
    ];

    /// Canonical upper-case label stored in the log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
            Self::NoReason => "NO_REASON",
            Self::Keep => "KEEP",
            Self::Search => "SEARCH",
            Self::InitPref => "INIT_PREF",
            Self::UpdateLocation => "UPDATE_LOCATION",
        }
    }

    /// Whether the action counts as a dislike in behaviour tallies.
    #[must_use]
    pub const fn is_dislike(self) -> bool {
        matches!(self, Self::No | Self::NoReason)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action label.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown interaction action: {0}")]
pub struct ParseActionError(pub String);

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseActionError(wanted.to_owned()))
    }
}

/// Per-user venue lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserList {
    /// Saved venues.
    Bookmarks,
    /// Venues the user never wants to see.
    Blacklist,
}

impl UserList {
    /// Action whose log rows populate this list.
    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Self::Bookmarks => Action::Keep,
            Self::Blacklist => Action::No,
        }
    }
}

/// One row of the append-only interaction log.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    /// Acting user.
    pub user_id: String,
    /// What happened.
    pub action: Action,
    /// Venue concerned, if any.
    pub place_id: Option<String>,
    /// Free-text rejection reason.
    pub reason: Option<String>,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Where the user was, if known.
    pub location: Option<Point<f64>>,
}

impl Interaction {
    /// Build an interaction with no venue, reason, or location.
    pub fn new(user_id: impl Into<String>, action: Action, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            action,
            place_id: None,
            reason: None,
            timestamp,
            location: None,
        }
    }

    /// Attach the venue concerned.
    #[must_use]
    pub fn with_place(mut self, place_id: impl Into<String>) -> Self {
        self.place_id = Some(place_id.into());
        self
    }

    /// Attach a rejection reason; blank reasons are dropped.
    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason.filter(|text| !text.trim().is_empty());
        self
    }

    /// Attach the user's location.
    #[must_use]
    pub const fn with_location(mut self, location: Point<f64>) -> Self {
        self.location = Some(location);
        self
    }
}

/// Aggregate behaviour for one venue across all users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BehaviorCounts {
    /// `YES` rows.
    pub clicks: u32,
    /// `KEEP` rows.
    pub keeps: u32,
    /// `NO` and `NO_REASON` rows.
    pub dislikes: u32,
}

impl BehaviorCounts {
    /// Fold one action into the tally.
    pub const fn observe(&mut self, action: Action) {
        match action {
            Action::Yes => self.clicks = self.clicks.saturating_add(1),
            Action::Keep => self.keeps = self.keeps.saturating_add(1),
            Action::No | Action::NoReason => self.dislikes = self.dislikes.saturating_add(1),
            Action::Search | Action::InitPref | Action::UpdateLocation => {}
        }
    }
}
