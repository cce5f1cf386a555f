//! `SQLite`-backed feedback ledger and session store.
//!
//! One database holds the interaction log, the per-user bookmark and
//! blacklist sets, last known locations, the recommendation impressions
//! used for cooldown, and the persisted rejection dialogue. Timestamps are
//! stored as Unix seconds.
//!
//! # Examples
//!
//! ```
//! use cafe_core::{Action, FeedbackLedger, Interaction};
//! use cafe_data::SqliteLedger;
//! use chrono::Utc;
//!
//! let ledger = SqliteLedger::open_in_memory().expect("open ledger");
//! let keep = Interaction::new("u1", Action::Keep, Utc::now()).with_place("p1");
//! ledger.record(&keep).expect("record keep");
//! assert!(ledger.bookmarks("u1").expect("bookmarks").contains("p1"));
//! ```

mod schema;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use cafe_core::{
    Action, BehaviorCounts, FeedbackLedger, Interaction, LedgerError, SessionState, SessionStore,
    UserList,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use geo::Point;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

pub use schema::LedgerSchemaError;

/// Errors raised while opening a [`SqliteLedger`].
#[derive(Debug, Error)]
pub enum LedgerOpenError {
    /// The database file could not be opened or created.
    #[error("failed to open ledger at {path}: {source}")]
    Open {
        /// Database location.
        path: Utf8PathBuf,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// The schema could not be created.
    #[error(transparent)]
    Schema(#[from] LedgerSchemaError),
}

/// Feedback ledger persisted in `SQLite`.
///
/// The connection sits behind a mutex so one ledger can serve concurrent
/// requests; each operation is a single statement or a short transaction.
#[derive(Debug)]
pub struct SqliteLedger {
    connection: Mutex<Connection>,
}

fn storage(operation: &'static str) -> impl Fn(rusqlite::Error) -> LedgerError {
    move |err| LedgerError::Storage {
        operation,
        message: err.to_string(),
    }
}

fn from_unix(field: &'static str, seconds: i64) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| LedgerError::Corrupt {
        field,
        value: seconds.to_string(),
    })
}

fn tally(field: &'static str, count: i64) -> Result<u32, LedgerError> {
    u32::try_from(count).map_err(|_| LedgerError::Corrupt {
        field,
        value: count.to_string(),
    })
}

const fn list_table(list: UserList) -> &'static str {
    match list {
        UserList::Bookmarks => "user_bookmarks",
        UserList::Blacklist => "user_blacklist",
    }
}

impl SqliteLedger {
    /// Open (or create) a ledger at `path`.
    ///
    /// # Errors
    /// Returns [`LedgerOpenError`] when the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Utf8Path) -> Result<Self, LedgerOpenError> {
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| LedgerOpenError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_connection(connection)
    }

    /// Open a private in-memory ledger.
    ///
    /// # Errors
    /// Returns [`LedgerOpenError`] when `SQLite` cannot allocate the
    /// database.
    pub fn open_in_memory() -> Result<Self, LedgerOpenError> {
        let connection = Connection::open_in_memory().map_err(|source| LedgerOpenError::Open {
            path: Utf8PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(mut connection: Connection) -> Result<Self, LedgerOpenError> {
        schema::initialise_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.connection.lock().map_err(|err| LedgerError::Storage {
            operation,
            message: err.to_string(),
        })
    }

    /// Every logged interaction for `user_id`, oldest first.
    ///
    /// # Errors
    /// Returns [`LedgerError`] when the read fails or a row is corrupt.
    pub fn history(&self, user_id: &str) -> Result<Vec<Interaction>, LedgerError> {
        const OPERATION: &str = "history";
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare(
                "SELECT action, place_id, reason, lat, lng, created_at
                 FROM interaction_logs WHERE user_id = ?1 ORDER BY id",
            )
            .map_err(storage(OPERATION))?;
        let rows = statement
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(storage(OPERATION))?;
        let mut history = Vec::new();
        for row in rows {
            let (action, place_id, reason, lat, lng, created_at) = row.map_err(storage(OPERATION))?;
            let parsed: Action = action.parse().map_err(|_| LedgerError::Corrupt {
                field: "interaction_logs.action",
                value: action.clone(),
            })?;
            let mut interaction =
                Interaction::new(user_id, parsed, from_unix("interaction_logs.created_at", created_at)?)
                    .with_reason(reason);
            if let Some(place) = place_id {
                interaction = interaction.with_place(place);
            }
            if let (Some(y), Some(x)) = (lat, lng) {
                interaction = interaction.with_location(Point::new(x, y));
            }
            history.push(interaction);
        }
        Ok(history)
    }
}

impl FeedbackLedger for SqliteLedger {
    fn record(&self, interaction: &Interaction) -> Result<(), LedgerError> {
        const OPERATION: &str = "record";
        let mut connection = self.lock(OPERATION)?;
        let transaction = connection.transaction().map_err(storage(OPERATION))?;
        let at = interaction.timestamp.timestamp();
        transaction
            .execute(
                "INSERT INTO interaction_logs (user_id, action, place_id, reason, lat, lng, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    interaction.user_id,
                    interaction.action.as_str(),
                    interaction.place_id,
                    interaction.reason,
                    interaction.location.map(|point| point.y()),
                    interaction.location.map(|point| point.x()),
                    at
                ],
            )
            .map_err(storage(OPERATION))?;
        let list = match interaction.action {
            Action::Keep => Some(UserList::Bookmarks),
            Action::No => Some(UserList::Blacklist),
            _ => None,
        };
        if let (Some(list), Some(place_id)) = (list, &interaction.place_id) {
            transaction
                .execute(
                    &format!(
                        "INSERT OR IGNORE INTO {} (user_id, place_id, added_at) VALUES (?1, ?2, ?3)",
                        list_table(list)
                    ),
                    params![interaction.user_id, place_id, at],
                )
                .map_err(storage(OPERATION))?;
        }
        transaction.commit().map_err(storage(OPERATION))
    }

    fn remove_from_list(
        &self,
        user_id: &str,
        list: UserList,
        place_id: &str,
    ) -> Result<(), LedgerError> {
        const OPERATION: &str = "remove_from_list";
        let mut connection = self.lock(OPERATION)?;
        let transaction = connection.transaction().map_err(storage(OPERATION))?;
        transaction
            .execute(
                &format!(
                    "DELETE FROM {} WHERE user_id = ?1 AND place_id = ?2",
                    list_table(list)
                ),
                params![user_id, place_id],
            )
            .map_err(storage(OPERATION))?;
        transaction
            .execute(
                "DELETE FROM interaction_logs WHERE user_id = ?1 AND action = ?2 AND place_id = ?3",
                params![user_id, list.action().as_str(), place_id],
            )
            .map_err(storage(OPERATION))?;
        transaction.commit().map_err(storage(OPERATION))
    }

    fn blacklist(&self, user_id: &str) -> Result<BTreeSet<String>, LedgerError> {
        const OPERATION: &str = "blacklist";
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare(
                "SELECT place_id FROM user_blacklist WHERE user_id = ?1
                 UNION
                 SELECT place_id FROM interaction_logs
                 WHERE user_id = ?1 AND action = ?2 AND place_id IS NOT NULL",
            )
            .map_err(storage(OPERATION))?;
        let rows = statement
            .query_map(params![user_id, Action::No.as_str()], |row| row.get(0))
            .map_err(storage(OPERATION))?;
        rows.collect::<Result<_, _>>().map_err(storage(OPERATION))
    }

    fn bookmarks(&self, user_id: &str) -> Result<BTreeSet<String>, LedgerError> {
        const OPERATION: &str = "bookmarks";
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare("SELECT place_id FROM user_bookmarks WHERE user_id = ?1")
            .map_err(storage(OPERATION))?;
        let rows = statement
            .query_map(params![user_id], |row| row.get(0))
            .map_err(storage(OPERATION))?;
        rows.collect::<Result<_, _>>().map_err(storage(OPERATION))
    }

    fn behavior_counts(&self, place_id: &str) -> Result<BehaviorCounts, LedgerError> {
        const OPERATION: &str = "behavior_counts";
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare(
                "SELECT action, COUNT(*) FROM interaction_logs
                 WHERE place_id = ?1 GROUP BY action",
            )
            .map_err(storage(OPERATION))?;
        let rows = statement
            .query_map(params![place_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(storage(OPERATION))?;
        let mut counts = BehaviorCounts::default();
        for row in rows {
            let (action, count) = row.map_err(storage(OPERATION))?;
            let Ok(parsed) = action.parse::<Action>() else {
                log::warn!("ignoring unknown action {action:?} in interaction log");
                continue;
            };
            let n = tally("interaction_logs.count", count)?;
            match parsed {
                Action::Yes => counts.clicks = counts.clicks.saturating_add(n),
                Action::Keep => counts.keeps = counts.keeps.saturating_add(n),
                Action::No | Action::NoReason => {
                    counts.dislikes = counts.dislikes.saturating_add(n);
                }
                Action::Search | Action::InitPref | Action::UpdateLocation => {}
            }
        }
        Ok(counts)
    }

    fn is_returning_user(&self, user_id: &str) -> Result<bool, LedgerError> {
        const OPERATION: &str = "is_returning_user";
        let connection = self.lock(OPERATION)?;
        connection
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM interaction_logs WHERE user_id = ?1)",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(storage(OPERATION))
    }

    fn update_location(
        &self,
        user_id: &str,
        location: Point<f64>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        const OPERATION: &str = "update_location";
        let mut connection = self.lock(OPERATION)?;
        let transaction = connection.transaction().map_err(storage(OPERATION))?;
        let seconds = at.timestamp();
        transaction
            .execute(
                "INSERT INTO user_state (user_id, lat, lng, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                    lat = excluded.lat, lng = excluded.lng, updated_at = excluded.updated_at",
                params![user_id, location.y(), location.x(), seconds],
            )
            .map_err(storage(OPERATION))?;
        transaction
            .execute(
                "INSERT INTO interaction_logs (user_id, action, lat, lng, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user_id,
                    Action::UpdateLocation.as_str(),
                    location.y(),
                    location.x(),
                    seconds
                ],
            )
            .map_err(storage(OPERATION))?;
        transaction.commit().map_err(storage(OPERATION))
    }

    fn last_known_location(&self, user_id: &str) -> Result<Option<Point<f64>>, LedgerError> {
        const OPERATION: &str = "last_known_location";
        let connection = self.lock(OPERATION)?;
        connection
            .query_row(
                "SELECT lat, lng FROM user_state WHERE user_id = ?1",
                params![user_id],
                |row| Ok(Point::new(row.get(1)?, row.get(0)?)),
            )
            .optional()
            .map_err(storage(OPERATION))
    }

    fn record_impressions(
        &self,
        user_id: &str,
        place_ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        const OPERATION: &str = "record_impressions";
        let mut connection = self.lock(OPERATION)?;
        let transaction = connection.transaction().map_err(storage(OPERATION))?;
        {
            let mut statement = transaction
                .prepare(
                    "INSERT INTO recommendation_log (user_id, place_id, shown_at)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(storage(OPERATION))?;
            for place_id in place_ids {
                statement
                    .execute(params![user_id, place_id, at.timestamp()])
                    .map_err(storage(OPERATION))?;
            }
        }
        transaction.commit().map_err(storage(OPERATION))
    }

    fn last_shown(
        &self,
        user_id: &str,
        place_ids: &[String],
    ) -> Result<HashMap<String, DateTime<Utc>>, LedgerError> {
        const OPERATION: &str = "last_shown";
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare(
                "SELECT MAX(shown_at) FROM recommendation_log
                 WHERE user_id = ?1 AND place_id = ?2",
            )
            .map_err(storage(OPERATION))?;
        let mut latest = HashMap::new();
        for place_id in place_ids {
            let shown: Option<i64> = statement
                .query_row(params![user_id, place_id], |row| row.get(0))
                .map_err(storage(OPERATION))?;
            if let Some(seconds) = shown {
                latest.insert(
                    place_id.clone(),
                    from_unix("recommendation_log.shown_at", seconds)?,
                );
            }
        }
        Ok(latest)
    }
}

impl SessionStore for SqliteLedger {
    fn load_session(&self, user_id: &str) -> Result<SessionState, LedgerError> {
        const OPERATION: &str = "load_session";
        let connection = self.lock(OPERATION)?;
        let row = connection
            .query_row(
                "SELECT state, place_id, reason FROM conversation_sessions WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(storage(OPERATION))?;
        match row {
            Some((label, place_id, reason)) => {
                Ok(SessionState::from_parts(&label, place_id, reason)?)
            }
            None => Ok(SessionState::Idle),
        }
    }

    fn save_session(
        &self,
        user_id: &str,
        state: &SessionState,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        const OPERATION: &str = "save_session";
        let connection = self.lock(OPERATION)?;
        connection
            .execute(
                "INSERT INTO conversation_sessions (user_id, state, place_id, reason, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                    state = excluded.state,
                    place_id = excluded.place_id,
                    reason = excluded.reason,
                    updated_at = excluded.updated_at",
                params![
                    user_id,
                    state.label(),
                    state.place_id(),
                    state.reason(),
                    at.timestamp()
                ],
            )
            .map(|_| ())
            .map_err(storage(OPERATION))
    }
}

#[cfg(test)]
mod tests;
